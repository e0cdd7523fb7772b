//! # Integration Test Flows
//!
//! Drives the whole stack (service, filesystem backend, system layout)
//! the way a host application would: register a user, submit forms,
//! advance state, restart, audit. Every test runs against a fresh
//! temporary storage directory with the real symlink-pointer layout.

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::{Path, PathBuf};

    use serde_json::json;
    use shared_types::{DatedName, Email, RecordKind, StateName, Timestamp};
    use wp_record_store::{
        Dependencies, FilesystemBackend, FixedClock, HistoryApi, Origin, RecordData,
        RecordStoreApi, StateRecord, StateTransitionApi, StoreConfig, StoreError, WorkflowStore,
    };

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    type Service = WorkflowStore<FilesystemBackend, FixedClock>;

    fn config() -> StoreConfig {
        // Low iteration count: flows, not hashing cost, are under test.
        StoreConfig::new("integration-salt").with_hash_iterations(10)
    }

    fn ts(s: &str) -> Timestamp {
        Timestamp::parse(s).unwrap()
    }

    fn open_service(root: &Path, clock: &FixedClock) -> Service {
        let deps = Dependencies {
            backend: FilesystemBackend::open(root).unwrap(),
            time_source: clock.clone(),
        };
        WorkflowStore::new(deps, config()).unwrap()
    }

    fn fresh_service() -> (tempfile::TempDir, PathBuf, Service, FixedClock) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("store");
        let clock = FixedClock::at(ts("20260807_120000"));
        let service = open_service(&root, &clock);
        (dir, root, service, clock)
    }

    fn state(s: &str) -> StateName {
        StateName::new(s).unwrap()
    }

    fn kind(s: &str) -> RecordKind {
        RecordKind::form(s).unwrap()
    }

    fn profile_data() -> RecordData {
        let mut data = RecordData::new();
        data.insert("name".to_owned(), json!("Ana"));
        data
    }

    // =============================================================================
    // Registration and layout
    // =============================================================================

    #[test]
    fn test_register_creates_expected_files_on_disk() {
        let (_dir, root, mut service, _clock) = fresh_service();
        let uid = service
            .register(&Email::new("a@x.com").unwrap(), &state("intake"))
            .unwrap();

        let user_dir = root.join(uid.as_str());
        assert!(user_dir.is_dir());
        assert!(user_dir.join("_email_20260807_120000.json").is_file());
        assert!(user_dir.join("_state_20260807_120000.json").is_file());

        // Current pointers are relative symlinks next to their targets.
        let state_link = user_dir.join("_state.json");
        assert!(fs::symlink_metadata(&state_link).unwrap().is_symlink());
        assert_eq!(
            fs::read_link(&state_link).unwrap(),
            PathBuf::from("_state_20260807_120000.json")
        );

        // The shared upload area exists and is not a user.
        assert!(root.join("uploads").is_dir());
        assert_eq!(service.list_uids().unwrap(), vec![uid]);
    }

    #[test]
    fn test_state_record_body_matches_wire_format() {
        let (_dir, root, mut service, _clock) = fresh_service();
        let uid = service
            .register(&Email::new("a@x.com").unwrap(), &state("intake"))
            .unwrap();

        let path = root
            .join(uid.as_str())
            .join("_state_20260807_120000.json");
        let body: serde_json::Value = serde_json::from_slice(&fs::read(path).unwrap()).unwrap();
        assert_eq!(
            body,
            json!({"state": "intake", "origin": ["register", "20260807_120000"]})
        );
    }

    // =============================================================================
    // Full workflow: submit a form, advance, audit
    // =============================================================================

    #[test]
    fn test_form_transition_end_to_end() {
        let (_dir, _root, mut service, clock) = fresh_service();
        let uid = service
            .register(&Email::new("a@x.com").unwrap(), &state("intake"))
            .unwrap();

        clock.set(ts("20260807_120500"));
        let receipt = service
            .transition(
                &uid,
                &state("review"),
                Some((kind("profile"), profile_data())),
                |_token| Ok::<(), std::convert::Infallible>(()),
            )
            .unwrap();

        // The form is the current record for its kind.
        let profile = service.retrieve(&uid, &kind("profile")).unwrap();
        assert_eq!(profile.get("name"), Some(&json!("Ana")));

        // The committed state names the exact form submission.
        let (record, _) = service.current_state(&uid).unwrap();
        assert_eq!(record.state.as_str(), "review");
        assert_eq!(record.form_dated_tuple, receipt.form);
        assert_eq!(
            record.origin,
            Some(Origin(state("intake"), ts("20260807_120000")))
        );

        // The audit trail has exactly the one form submission.
        assert_eq!(
            service.form_index(&uid).unwrap(),
            vec![(ts("20260807_120500"), kind("profile"))]
        );
    }

    #[test]
    fn test_aborted_transition_rolls_back_files() {
        let (_dir, root, mut service, clock) = fresh_service();
        let uid = service
            .register(&Email::new("a@x.com").unwrap(), &state("intake"))
            .unwrap();
        let user_dir = root.join(uid.as_str());
        let files_before = fs::read_dir(&user_dir).unwrap().count();

        clock.set(ts("20260807_120500"));
        let result = service.transition(
            &uid,
            &state("review"),
            Some((kind("profile"), profile_data())),
            |_token| Err("smtp: connection refused"),
        );
        assert!(matches!(result, Err(StoreError::TransitionAborted { .. })));

        // Storage is byte-identical to before the attempt.
        assert_eq!(fs::read_dir(&user_dir).unwrap().count(), files_before);
        let (record, _) = service.current_state(&uid).unwrap();
        assert_eq!(record.state.as_str(), "intake");
        assert!(service.form_index(&uid).unwrap().is_empty());
    }

    #[test]
    fn test_capability_links_expire_on_advance() {
        let (_dir, _root, mut service, clock) = fresh_service();
        let uid = service
            .register(&Email::new("a@x.com").unwrap(), &state("intake"))
            .unwrap();

        // The host embeds this token in an action link.
        let mut mailed_token = None;
        clock.set(ts("20260807_120500"));
        service
            .transition(&uid, &state("review"), None, |token| {
                mailed_token = Some(token.clone());
                Ok::<(), std::convert::Infallible>(())
            })
            .unwrap();
        let mailed_token = mailed_token.unwrap();

        // The link is valid while the state pointer is unchanged...
        assert_eq!(service.current_capability(&uid).unwrap(), mailed_token);

        // ...and stale the moment the workflow advances again.
        clock.set(ts("20260807_121000"));
        service
            .transition(&uid, &state("approved"), None, |_| {
                Ok::<(), std::convert::Infallible>(())
            })
            .unwrap();
        assert_ne!(service.current_capability(&uid).unwrap(), mailed_token);
    }

    // =============================================================================
    // Restarts: everything must survive a fresh service over the same root
    // =============================================================================

    #[test]
    fn test_state_and_history_survive_restart() {
        let (_dir, root, mut service, clock) = fresh_service();
        let uid = service
            .register(&Email::new("a@x.com").unwrap(), &state("intake"))
            .unwrap();
        clock.set(ts("20260807_120500"));
        service
            .transition(
                &uid,
                &state("review"),
                Some((kind("profile"), profile_data())),
                |_| Ok::<(), std::convert::Infallible>(()),
            )
            .unwrap();
        drop(service);

        // Same directory, same salt, new process.
        let reopened = open_service(&root, &clock);
        assert_eq!(
            reopened.uid_for(&Email::new("a@x.com").unwrap()),
            uid,
            "uid derivation must be stable across restarts"
        );
        let (record, _) = reopened.current_state(&uid).unwrap();
        assert_eq!(record.state.as_str(), "review");

        let history = reopened.state_history(&uid).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(
            reopened.retrieve(&uid, &kind("profile")).unwrap().get("name"),
            Some(&json!("Ana"))
        );
    }

    #[test]
    fn test_changed_salt_refuses_to_open_existing_store() {
        let (_dir, root, service, clock) = fresh_service();
        drop(service);

        let deps = Dependencies {
            backend: FilesystemBackend::open(&root).unwrap(),
            time_source: clock,
        };
        let result = WorkflowStore::new(
            deps,
            StoreConfig::new("a-different-salt").with_hash_iterations(10),
        );
        assert!(matches!(result, Err(StoreError::Configuration { .. })));
    }

    // =============================================================================
    // Crash reconciliation over the real layout
    // =============================================================================

    #[test]
    fn test_repair_completes_interrupted_commit_after_restart() {
        let (_dir, root, mut service, clock) = fresh_service();
        let uid = service
            .register(&Email::new("a@x.com").unwrap(), &state("intake"))
            .unwrap();

        // Hand-craft the crash window: staged form and state records on
        // disk, state pointer committed, form pointer never repointed.
        let user_dir = root.join(uid.as_str());
        let form_name = DatedName::new(kind("profile"), ts("20260807_120500"));
        fs::write(user_dir.join(form_name.file_name()), b"{\"name\":\"Ana\"}").unwrap();
        let state_name = DatedName::new(RecordKind::state(), ts("20260807_120500"));
        let record = StateRecord::new(
            state("review"),
            Origin(state("intake"), ts("20260807_120000")),
            Some(form_name.clone()),
        );
        fs::write(
            user_dir.join(state_name.file_name()),
            serde_json::to_vec(&record).unwrap(),
        )
        .unwrap();
        let link = user_dir.join("_state.json");
        fs::remove_file(&link).unwrap();
        std::os::unix::fs::symlink(state_name.file_name(), &link).unwrap();
        drop(service);

        // Before repair, the form is not reachable through its pointer.
        let mut reopened = open_service(&root, &clock);
        assert!(matches!(
            reopened.retrieve(&uid, &kind("profile")),
            Err(StoreError::NotFound { .. })
        ));

        let report = reopened.repair_user(&uid).unwrap();
        assert_eq!(report.completed_pointers, vec![form_name]);
        assert!(report.orphans.is_empty());
        assert_eq!(
            reopened.retrieve(&uid, &kind("profile")).unwrap().get("name"),
            Some(&json!("Ana"))
        );
    }

    #[test]
    fn test_repair_normalizes_absolute_pointers() {
        let (_dir, root, mut service, _clock) = fresh_service();
        let uid = service
            .register(&Email::new("a@x.com").unwrap(), &state("intake"))
            .unwrap();

        // An absolute pointer target, as a pre-relocation deployment
        // would have left behind.
        let user_dir = root.join(uid.as_str());
        let link = user_dir.join("_state.json");
        let absolute = user_dir.join("_state_20260807_120000.json");
        fs::remove_file(&link).unwrap();
        std::os::unix::fs::symlink(&absolute, &link).unwrap();

        let report = service.repair_user(&uid).unwrap();
        assert_eq!(report.normalized_pointers, vec![RecordKind::state()]);
        assert_eq!(
            fs::read_link(&link).unwrap(),
            PathBuf::from("_state_20260807_120000.json")
        );
        // Still resolvable after normalization.
        let (record, _) = service.current_state(&uid).unwrap();
        assert_eq!(record.state.as_str(), "intake");
    }

    // =============================================================================
    // Multi-user flows
    // =============================================================================

    #[test]
    fn test_users_advance_independently() {
        let (_dir, _root, mut service, clock) = fresh_service();
        let ana = service
            .register(&Email::new("ana@x.com").unwrap(), &state("intake"))
            .unwrap();
        let bob = service
            .register(&Email::new("bob@x.com").unwrap(), &state("intake"))
            .unwrap();

        clock.set(ts("20260807_120500"));
        service
            .transition(&ana, &state("review"), None, |_| {
                Ok::<(), std::convert::Infallible>(())
            })
            .unwrap();

        let overview = service.users_with_state().unwrap();
        assert_eq!(overview.len(), 2);
        let by_email = |needle: &str| {
            overview
                .iter()
                .find(|row| row.email.as_str() == needle)
                .unwrap()
        };
        assert_eq!(by_email("ana@x.com").state.as_str(), "review");
        assert_eq!(by_email("bob@x.com").state.as_str(), "intake");
        assert_eq!(by_email("bob@x.com").timestamp, ts("20260807_120000"));
    }

    #[test]
    fn test_same_second_transitions_stay_ordered() {
        let (_dir, _root, mut service, _clock) = fresh_service();
        let uid = service
            .register(&Email::new("a@x.com").unwrap(), &state("intake"))
            .unwrap();

        // The clock never advances; the store must disambiguate.
        for next in ["review", "approved"] {
            service
                .transition(&uid, &state(next), None, |_| {
                    Ok::<(), std::convert::Infallible>(())
                })
                .unwrap();
        }

        let history = service.state_history(&uid).unwrap();
        assert_eq!(history.len(), 3);
        let states: Vec<_> = history.values().map(|r| r.state.as_str()).collect();
        assert_eq!(states, vec!["intake", "review", "approved"]);

        let (record, _) = service.current_state(&uid).unwrap();
        assert_eq!(record.state.as_str(), "approved");
    }
}
