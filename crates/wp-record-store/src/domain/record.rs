//! Record entities: the generic dated record and the `_state` system
//! record with its transition provenance.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use shared_types::{DatedName, RecordKind, StateName, Timestamp};

/// Body type of every persisted record: a plain JSON object.
pub type RecordData = Map<String, Value>;

/// A record as returned by reads: the persisted body plus the provenance
/// resolved from the dated file name.
///
/// Callers rely on `kind` and `timestamp` to know what they are holding
/// without a second lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub kind: RecordKind,
    pub timestamp: Timestamp,
    pub data: RecordData,
}

impl Record {
    pub fn new(name: DatedName, data: RecordData) -> Self {
        Self {
            kind: name.kind,
            timestamp: name.timestamp,
            data,
        }
    }

    /// Identity of the dated record this was read from.
    pub fn dated_name(&self) -> DatedName {
        DatedName::new(self.kind.clone(), self.timestamp)
    }

    /// Convenience accessor into the body.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }
}

/// The `(state, timestamp)` pair a transition departed from.
///
/// Persisted as a two-element array, e.g. `["intake", "20260807_153000"]`.
/// The origin of a user's very first state record carries the
/// registration sentinel instead of a real prior state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin(pub StateName, pub Timestamp);

impl Origin {
    pub fn state(&self) -> &StateName {
        &self.0
    }

    pub fn timestamp(&self) -> Timestamp {
        self.1
    }

    /// Sentinel origin for a freshly registered user.
    pub fn register(at: Timestamp) -> Self {
        Self(StateName::register_sentinel(), at)
    }
}

/// Body of a `_state` record.
///
/// `origin` is optional only on the read side: deployments that predate
/// provenance tracking have state records without it, and the history
/// reader reconstructs a best-effort origin for those. New records always
/// carry one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    pub state: StateName,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<Origin>,

    /// The form submission that caused this transition, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub form_dated_tuple: Option<DatedName>,
}

impl StateRecord {
    pub fn new(state: StateName, origin: Origin, form: Option<DatedName>) -> Self {
        Self {
            state,
            origin: Some(origin),
            form_dated_tuple: form,
        }
    }
}

/// References returned by a successful `store`: the concrete dated record
/// and whether the kind's current pointer now resolves to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreReceipt {
    pub dated: DatedName,
    pub made_current: bool,
}

/// References returned by a committed transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionReceipt {
    /// The now-current `_state` dated record.
    pub state: DatedName,
    /// The now-current form dated record, when the transition carried one.
    pub form: Option<DatedName>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    #[test]
    fn test_state_record_wire_form() {
        let record = StateRecord::new(
            StateName::new("review").unwrap(),
            Origin(StateName::new("intake").unwrap(), ts("20260807_120000")),
            Some(DatedName::new(
                RecordKind::form("profile").unwrap(),
                ts("20260807_120101"),
            )),
        );
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"state":"review","origin":["intake","20260807_120000"],"form_dated_tuple":["profile","20260807_120101"]}"#
        );
    }

    #[test]
    fn test_state_record_tolerates_missing_origin() {
        // Shape written by deployments that predate provenance tracking.
        let record: StateRecord = serde_json::from_str(r#"{"state":"intake"}"#).unwrap();
        assert_eq!(record.state.as_str(), "intake");
        assert!(record.origin.is_none());
        assert!(record.form_dated_tuple.is_none());
    }

    #[test]
    fn test_register_origin_uses_sentinel() {
        let origin = Origin::register(ts("20260807_120000"));
        assert_eq!(origin.state().as_str(), "register");
    }
}
