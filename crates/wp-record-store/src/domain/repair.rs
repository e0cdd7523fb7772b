//! Reconciliation of interrupted transitions.
//!
//! The commit step of a transition repoints the form pointer and then the
//! state pointer. A crash between the two leaves the store in a narrow
//! but observable inconsistency: the state pointer already names a form
//! submission whose own pointer still resolves to an older record. A
//! crash before either repoint leaves staged dated records that no
//! pointer and no committed state reference.
//!
//! The repair pass distinguishes the two:
//!
//! - a form record named by the *committed* current state is completed
//!   (its pointer is moved forward): the transition had already decided
//!   to commit;
//! - staged records referenced by nothing are reported as orphans and
//!   left on disk for the operator. Deleting them here could destroy
//!   evidence of what went wrong.

use std::collections::{BTreeMap, BTreeSet};

use shared_types::{DatedName, RecordKind, Timestamp, Uid};

/// Outcome of one user's repair pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepairReport {
    pub uid: Uid,
    /// Form pointers moved forward to the record the committed state
    /// already referenced.
    pub completed_pointers: Vec<DatedName>,
    /// Pointers whose stored target was rewritten to the relative form
    /// (left behind by a storage-directory relocation).
    pub normalized_pointers: Vec<RecordKind>,
    /// Staged dated records referenced by no pointer and no committed
    /// state record. Reported, never deleted.
    pub orphans: Vec<DatedName>,
}

impl RepairReport {
    pub fn clean(uid: Uid) -> Self {
        Self {
            uid,
            completed_pointers: Vec::new(),
            normalized_pointers: Vec::new(),
            orphans: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.completed_pointers.is_empty()
            && self.normalized_pointers.is_empty()
            && self.orphans.is_empty()
    }
}

/// Identify staged records left behind by an interrupted or crashed
/// transition.
///
/// A dated record is an orphan when it is newer than its kind's current
/// pointer (or the kind has no pointer at all) and no committed state
/// record names it as its form submission. State records themselves are
/// orphans when they are newer than the committed state pointer: the
/// state pointer commit is always last, so a newer dated state was never
/// visible.
pub fn orphan_scan(
    dated: &[DatedName],
    pointers: &BTreeMap<RecordKind, Timestamp>,
    referenced_forms: &BTreeSet<DatedName>,
) -> Vec<DatedName> {
    let mut orphans: Vec<DatedName> = dated
        .iter()
        .filter(|name| {
            let committed = pointers
                .get(&name.kind)
                .is_some_and(|current| name.timestamp <= *current);
            !committed && !referenced_forms.contains(*name)
        })
        .cloned()
        .collect();
    orphans.sort();
    orphans
}
