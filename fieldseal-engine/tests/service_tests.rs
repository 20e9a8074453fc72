mod support;

use fieldseal_crypto::{KdfParams, MasterKeySource, encrypt_field, looks_like_ciphertext};
use fieldseal_engine::{
    DenialReason, EnableOutcome, EncryptionService, EncryptionStatus, EngineConfig, EngineError,
};
use fieldseal_storage::{DuckRecordStore, EncryptableRecord, MemoryKeyStore, MemoryRecordStore};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use support::*;

// ── Status / enable / disable ────────────────────────────────────

#[tokio::test]
async fn status_reflects_master_key_and_key_record() {
    let fx = Fixture::new();
    fx.seed_plain(WS, 3).await;

    assert_eq!(
        fx.service.status(WS, CALLER).await.unwrap(),
        EncryptionStatus {
            enabled: true,
            has_key: false,
            unencrypted_count: 3,
        }
    );

    fx.enable(WS).await;
    fx.service.migrate(WS, CALLER).await.unwrap();

    assert_eq!(
        fx.service.status(WS, CALLER).await.unwrap(),
        EncryptionStatus {
            enabled: true,
            has_key: true,
            unencrypted_count: 0,
        }
    );
}

#[tokio::test]
async fn enable_is_idempotent() {
    let fx = Fixture::new();
    assert_eq!(
        fx.service.enable(WS, CALLER).await.unwrap(),
        EnableOutcome {
            success: true,
            already_exists: false,
        }
    );
    assert_eq!(
        fx.service.enable(WS, CALLER).await.unwrap(),
        EnableOutcome {
            success: true,
            already_exists: true,
        }
    );
}

#[tokio::test]
async fn enable_without_master_key_is_a_configuration_error() {
    init_tracing();
    let service = EncryptionService::new(
        test_config(),
        MasterKeySource::from_passphrase("").with_kdf_params(KdfParams::test()),
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryKeyStore::new()),
    );

    assert!(!service.status(WS, CALLER).await.unwrap().enabled);

    let err = service.enable(WS, CALLER).await.unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)), "got {err:?}");
    assert!(!err.is_retryable());
    assert!(!service.status(WS, CALLER).await.unwrap().has_key);
}

#[tokio::test]
async fn unset_environment_variable_disables_encryption() {
    let config = EngineConfig {
        master_key_env: "FIELDSEAL_TEST_MASTER_KEY_NEVER_SET".into(),
        ..test_config()
    };
    let service = EncryptionService::from_config(
        config,
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryKeyStore::new()),
    )
    .unwrap();

    assert!(!service.status(WS, CALLER).await.unwrap().enabled);
    let err = service.enable(WS, CALLER).await.unwrap_err();
    assert!(
        err.to_string()
            .contains("FIELDSEAL_TEST_MASTER_KEY_NEVER_SET environment variable is not configured")
    );
}

#[tokio::test]
async fn invalid_config_is_rejected() {
    let config = EngineConfig {
        progress_interval: 0,
        ..test_config()
    };
    let result = EncryptionService::from_config(
        config,
        Arc::new(MemoryRecordStore::new()),
        Arc::new(MemoryKeyStore::new()),
    );
    assert!(matches!(result, Err(EngineError::Configuration(_))));
}

#[tokio::test]
async fn disable_destroys_the_key() {
    let fx = Fixture::new();
    fx.enable(WS).await;
    fx.seed_plain(WS, 1).await;

    assert!(fx.service.disable(WS, CALLER).await.unwrap().success);
    assert!(!fx.service.status(WS, CALLER).await.unwrap().has_key);
    assert!(matches!(
        fx.service.migrate(WS, CALLER).await,
        Err(EngineError::NotFound(_))
    ));

    // Disabling again is harmless.
    assert!(fx.service.disable(WS, CALLER).await.unwrap().success);
}

#[tokio::test]
async fn re_enabling_issues_a_new_key() {
    let fx = Fixture::new();
    let first = fx.enable(WS).await;
    fx.service.disable(WS, CALLER).await.unwrap();
    let second = fx.enable(WS).await;
    assert_ne!(first.as_bytes(), second.as_bytes());
}

// ── Authorization ────────────────────────────────────────────────

#[tokio::test]
async fn denied_callers_touch_nothing() {
    let fx = Fixture::new();
    let key = fx.enable(WS).await;
    fx.seed_plain(WS, 2).await;
    fx.seed_drifted(WS, 1).await;
    let before = fx.all(WS).await;

    let guarded = EncryptionService::new(
        test_config(),
        master(),
        fx.records.clone(),
        fx.keys.clone(),
    )
    .with_policy(Arc::new(MembersOnlyPolicy::new(
        &[CALLER],
        DenialReason::NotAMember,
    )));

    let outsider = "intruder";
    let reason = |err: EngineError| err.denial_reason();
    assert_eq!(
        reason(guarded.status(WS, outsider).await.unwrap_err()),
        Some(DenialReason::NotAMember)
    );
    assert_eq!(
        reason(guarded.enable(WS, outsider).await.unwrap_err()),
        Some(DenialReason::NotAMember)
    );
    assert_eq!(
        reason(guarded.disable(WS, outsider).await.unwrap_err()),
        Some(DenialReason::NotAMember)
    );
    assert_eq!(
        reason(guarded.verify(WS, outsider).await.unwrap_err()),
        Some(DenialReason::NotAMember)
    );
    assert_eq!(
        reason(guarded.migrate(WS, outsider).await.unwrap_err()),
        Some(DenialReason::NotAMember)
    );
    assert_eq!(
        reason(guarded.repair(WS, outsider).await.unwrap_err()),
        Some(DenialReason::NotAMember)
    );
    assert!(guarded.read_records(WS, outsider).await.is_err());

    assert_eq!(fx.all(WS).await, before);
    assert!(guarded.keyring().has_key(WS).await.unwrap());
    assert_eq!(
        guarded.keyring().unwrap(WS).await.unwrap().as_bytes(),
        key.as_bytes()
    );

    // Members still get through.
    assert_eq!(guarded.migrate(WS, CALLER).await.unwrap().migrated_count, 2);
}

#[tokio::test]
async fn no_permission_reason_is_surfaced() {
    let fx = Fixture::new();
    let guarded = EncryptionService::new(
        test_config(),
        master(),
        fx.records.clone(),
        fx.keys.clone(),
    )
    .with_policy(Arc::new(MembersOnlyPolicy::new(&[], DenialReason::NoPermission)));

    let err = guarded.enable(WS, CALLER).await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Authorization {
            reason: DenialReason::NoPermission,
            ..
        }
    ));
    assert!(!err.is_retryable());
}

// ── Verify ───────────────────────────────────────────────────────

#[tokio::test]
async fn verify_counts_and_samples() {
    let fx = Fixture::new();
    let key = fx.enable(WS).await;
    fx.seed_plain(WS, 2).await;
    fx.seed_encrypted(WS, &key, 3).await;
    fx.seed_drifted(WS, 2).await;

    let report = fx.service.verify(WS, CALLER).await.unwrap();
    assert_eq!(report.total, 7);
    assert_eq!(report.true_encrypted, 5);
    assert_eq!(report.false_encrypted, 2);
    assert_eq!(report.marked_encrypted_but_plaintext, 2);
    assert_eq!(report.samples.len(), 2);
    assert_eq!(report.samples[0].id, format!("{WS}-drift-000"));
    assert_eq!(report.samples[0].failing_fields, vec!["title", "description"]);
    assert_eq!(report.samples[0].title_len, "Drifted event 0".len());

    // Verify never writes.
    let again = fx.service.verify(WS, CALLER).await.unwrap();
    assert_eq!(again, report);
}

#[tokio::test]
async fn verify_sample_limit_is_configurable() {
    let fx = Fixture::with_config(EngineConfig {
        verify_sample_limit: 1,
        ..test_config()
    });
    fx.seed_drifted(WS, 4).await;

    let report = fx.service.verify(WS, CALLER).await.unwrap();
    assert_eq!(report.marked_encrypted_but_plaintext, 4);
    assert_eq!(report.samples.len(), 1);
}

#[tokio::test]
async fn verify_after_repair_is_clean() {
    let fx = Fixture::new();
    fx.enable(WS).await;
    fx.seed_drifted(WS, 3).await;

    fx.service.repair(WS, CALLER).await.unwrap().finish().await.unwrap();

    let report = fx.service.verify(WS, CALLER).await.unwrap();
    assert_eq!(report.marked_encrypted_but_plaintext, 0);
    assert!(report.samples.is_empty());
}

// ── Read path ────────────────────────────────────────────────────

#[tokio::test]
async fn read_records_decrypts_flagged_records() {
    let fx = Fixture::new();
    let key = fx.enable(WS).await;
    fx.records
        .insert(
            EncryptableRecord::new("a", WS, encrypt_field("Team Standup", &key).unwrap())
                .with_description("")
                .with_flag(true),
        )
        .await;
    fx.records
        .insert(EncryptableRecord::new("b", WS, "Legacy plaintext"))
        .await;

    let records = fx.service.read_records(WS, CALLER).await.unwrap();
    assert_eq!(records[0].title.as_deref(), Some("Team Standup"));
    assert_eq!(records[0].description.as_deref(), Some(""));
    assert_eq!(records[1].title.as_deref(), Some("Legacy plaintext"));
}

#[tokio::test]
async fn read_records_without_key_returns_stored_values() {
    let fx = Fixture::new();
    fx.seed_plain(WS, 2).await;
    let records = fx.service.read_records(WS, CALLER).await.unwrap();
    assert_eq!(records, fx.all(WS).await);
}

// ── DuckDB end to end ────────────────────────────────────────────

#[tokio::test]
async fn full_lifecycle_on_duckdb() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fieldseal.duckdb");
    let store = Arc::new(DuckRecordStore::open(&path).unwrap());

    for i in 0..6 {
        store
            .insert_record(&EncryptableRecord::new(format!("r{i}"), WS, format!("Event {i}")))
            .unwrap();
    }
    store
        .insert_record(&EncryptableRecord::new("drift", WS, "Drifted title").with_flag(true))
        .unwrap();

    let service = EncryptionService::new(test_config(), master(), store.clone(), store.clone());
    service.enable(WS, CALLER).await.unwrap();

    let status = service.status(WS, CALLER).await.unwrap();
    assert!(status.has_key);
    assert_eq!(status.unencrypted_count, 6);

    let migrated = service.migrate(WS, CALLER).await.unwrap();
    assert_eq!(migrated.migrated_count, 6);
    assert_eq!(service.migrate(WS, CALLER).await.unwrap().migrated_count, 0);

    let (_, repaired) = service.repair(WS, CALLER).await.unwrap().finish().await.unwrap();
    assert_eq!(repaired.total_scanned, 7);
    assert_eq!(repaired.fixed_count, 1);

    let verify = service.verify(WS, CALLER).await.unwrap();
    assert_eq!(verify.true_encrypted, 7);
    assert_eq!(verify.marked_encrypted_but_plaintext, 0);

    let stored = store.get_record("r3").unwrap().unwrap();
    assert!(looks_like_ciphertext(stored.title.as_deref()));

    let records = service.read_records(WS, CALLER).await.unwrap();
    let titles: Vec<&str> = records.iter().filter_map(|r| r.title.as_deref()).collect();
    assert!(titles.contains(&"Event 3"));
    assert!(titles.contains(&"Drifted title"));
}
