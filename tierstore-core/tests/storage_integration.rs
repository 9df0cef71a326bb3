mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FlakyCredentialStore;
use serde::{Deserialize, Serialize};
use tierstore_core::storage::{
    ErrorKind, KeyAccessibility, KeyFallbackPolicy, KeyOrigin, ManualClock,
    MemoryStorageProvider, Operation, PlatformStorageProvider, StorageConfig, StorageContext,
    StoragePaths, Theme, Tier, TierStore, REDACTED_PLACEHOLDER,
};
use tierstore_db::{KvEngine, PartitionConfig, PartitionLocation, SqliteEngine};

const KEY_NAME: &str = "tierstore.encryption_key";

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Session {
    id: u32,
}

fn context_with(provider: Arc<MemoryStorageProvider>) -> StorageContext {
    StorageContext::new(provider, StorageConfig::default())
}

#[tokio::test]
async fn test_concurrent_initialization_converges() {
    let credentials = Arc::new(FlakyCredentialStore::new());
    let provider = Arc::new(MemoryStorageProvider::new().with_credential_store(credentials.clone()));
    let context = context_with(provider);

    let (a, b, c) = tokio::join!(
        context.initialize_storage(),
        context.initialize_storage(),
        context.initialize_storage()
    );
    let a = a.expect("first");
    assert!(Arc::ptr_eq(&a, &b.expect("second")));
    assert!(Arc::ptr_eq(&a, &c.expect("third")));

    let later = context.initialize_storage().await.expect("later");
    assert!(Arc::ptr_eq(&a, &later));
    assert_eq!(credentials.reads(), 1);
    assert_eq!(credentials.writes(), 1);
    assert_eq!(
        credentials.accessibility(KEY_NAME),
        Some(KeyAccessibility::WhenUnlockedThisDeviceOnly)
    );
}

#[tokio::test]
async fn test_concurrent_initialization_across_tasks() {
    let credentials = Arc::new(FlakyCredentialStore::new());
    let provider = Arc::new(MemoryStorageProvider::new().with_credential_store(credentials.clone()));
    let context = Arc::new(context_with(provider));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let context = Arc::clone(&context);
            tokio::spawn(async move { context.initialize_storage().await })
        })
        .collect();

    let mut managers = Vec::new();
    for handle in handles {
        managers.push(handle.await.expect("join").expect("initialize"));
    }
    assert!(managers.iter().all(|m| Arc::ptr_eq(m, &managers[0])));
    assert_eq!(credentials.writes(), 1);
}

#[tokio::test]
async fn test_existing_key_is_reused_across_contexts() {
    let provider = Arc::new(MemoryStorageProvider::new());

    let first = context_with(provider.clone());
    let storage = first.initialize_storage().await.expect("initialize");
    assert_eq!(storage.secure().key_origin(), KeyOrigin::Generated);
    storage.secure().set_auth_token("token-1").expect("set");
    storage.preferences().set_theme(Theme::Dark).expect("set");
    storage.temp().set_session_data("step", &2).expect("set");

    let second = context_with(provider);
    let storage = second.initialize_storage().await.expect("initialize");
    assert_eq!(storage.secure().key_origin(), KeyOrigin::Stored);
    assert_eq!(
        storage.secure().auth_token().expect("get").as_deref(),
        Some("token-1")
    );
    assert_eq!(storage.preferences().theme().expect("get"), Theme::Dark);
    assert!(storage.temp().is_empty().expect("temp wiped on startup"));
}

#[tokio::test]
async fn test_seeded_key_is_used_verbatim() {
    let credentials = Arc::new(FlakyCredentialStore::new());
    credentials.seed(KEY_NAME, "c2VlZGVkLWtleS1tYXRlcmlhbA==").await;
    let provider = Arc::new(MemoryStorageProvider::new().with_credential_store(credentials.clone()));

    let storage = context_with(provider)
        .initialize_storage()
        .await
        .expect("initialize");

    assert_eq!(storage.secure().key_origin(), KeyOrigin::Stored);
    assert_eq!(credentials.writes(), 0);
    assert_eq!(
        credentials.stored(KEY_NAME).await.as_deref(),
        Some("c2VlZGVkLWtleS1tYXRlcmlhbA==")
    );
}

#[tokio::test]
async fn test_failed_initialization_is_retryable() {
    let credentials = Arc::new(FlakyCredentialStore::locked());
    let provider = Arc::new(MemoryStorageProvider::new().with_credential_store(credentials.clone()));
    let context = context_with(provider);

    let err = context.initialize_storage().await.expect_err("locked keychain");
    assert_eq!(err.kind(), ErrorKind::Initialization);
    assert_eq!(err.tier(), Some(Tier::Secure));
    let cause = err.inner().expect("wrapped cause");
    assert_eq!(cause.kind(), ErrorKind::Encryption);
    assert_eq!(cause.operation(), Some(Operation::KeyRetrieval));

    assert!(!context.is_initialized());
    assert_eq!(
        context.storage().expect_err("not initialized").kind(),
        ErrorKind::NotInitialized
    );

    credentials.set_locked(false);
    let storage = context.initialize_storage().await.expect("retry");
    assert!(Arc::ptr_eq(&storage, &context.storage().expect("storage")));
    assert_eq!(credentials.reads(), 2);
}

#[tokio::test]
async fn test_concurrent_callers_share_a_failed_initialization() {
    let credentials = Arc::new(FlakyCredentialStore::locked());
    let provider = Arc::new(MemoryStorageProvider::new().with_credential_store(credentials.clone()));
    let context = context_with(provider);

    let (a, b, c) = tokio::join!(
        context.initialize_storage(),
        context.initialize_storage(),
        context.initialize_storage()
    );
    for result in [a, b, c] {
        let err = result.expect_err("locked keychain");
        assert_eq!(err.kind(), ErrorKind::Initialization);
        assert_eq!(
            err.inner().and_then(|cause| cause.operation()),
            Some(Operation::KeyRetrieval)
        );
    }
    assert_eq!(credentials.reads(), 1);
    assert!(!context.is_initialized());

    context.initialize_storage().await.expect_err("still locked");
    assert_eq!(credentials.reads(), 2);

    credentials.set_locked(false);
    context.initialize_storage().await.expect("unlocked");
    assert_eq!(credentials.reads(), 3);
    assert!(context.is_initialized());
}

#[tokio::test]
async fn test_fail_hard_does_not_fall_back() {
    let provider = Arc::new(
        MemoryStorageProvider::new().with_credential_store(Arc::new(FlakyCredentialStore::locked())),
    );
    let context = context_with(provider);
    assert!(context.initialize_storage().await.is_err());
    assert!(context.storage().is_err());
}

#[tokio::test]
async fn test_ephemeral_key_fallback() {
    let provider = Arc::new(
        MemoryStorageProvider::new().with_credential_store(Arc::new(FlakyCredentialStore::locked())),
    );
    let config = StorageConfig {
        key_fallback: KeyFallbackPolicy::EphemeralKey,
        ..StorageConfig::default()
    };
    let storage = StorageContext::new(provider, config)
        .initialize_storage()
        .await
        .expect("initialize with fallback");

    assert!(storage.secure().is_ephemeral());
    storage.secure().set_auth_token("short-lived").expect("set");
    assert_eq!(
        storage.secure().auth_token().expect("get").as_deref(),
        Some("short-lived")
    );
}

#[tokio::test]
async fn test_ephemeral_fallback_over_existing_secrets() {
    let credentials = Arc::new(FlakyCredentialStore::new());
    let provider = Arc::new(MemoryStorageProvider::new().with_credential_store(credentials.clone()));

    let storage = context_with(provider.clone())
        .initialize_storage()
        .await
        .expect("initialize");
    storage.secure().set_auth_token("real-token").expect("set");
    storage.secure().set_api_key("maps", "k1").expect("set");

    credentials.set_locked(true);
    let config = StorageConfig {
        key_fallback: KeyFallbackPolicy::EphemeralKey,
        ..StorageConfig::default()
    };
    let fallback = StorageContext::new(provider.clone(), config)
        .initialize_storage()
        .await
        .expect("initialize with fallback");
    assert!(fallback.secure().is_ephemeral());

    assert!(fallback.total_size().expect("total size") > 0);
    assert!(!fallback.is_storage_full().expect("is full"));
    fallback.perform_maintenance().expect("maintenance");
    let stats = fallback.statistics().expect("statistics");
    assert!(stats.sizes.secure > 0);

    assert_eq!(fallback.secure().auth_token().expect("get"), None);
    fallback.secure().set_auth_token("short-lived").expect("set");

    credentials.set_locked(false);
    let restarted = context_with(provider)
        .initialize_storage()
        .await
        .expect("initialize after unlock");
    assert_eq!(restarted.secure().key_origin(), KeyOrigin::Stored);
    assert_eq!(
        restarted.secure().auth_token().expect("get").as_deref(),
        Some("real-token")
    );
    assert_eq!(
        restarted.secure().api_key("maps").expect("get").as_deref(),
        Some("k1")
    );
}

#[tokio::test]
async fn test_ttl_scenario_through_manager() {
    let clock = Arc::new(ManualClock::new(1_700_000_000_000));
    let provider = Arc::new(MemoryStorageProvider::new().with_clock(clock.clone()));
    let storage = context_with(provider)
        .initialize_storage()
        .await
        .expect("initialize");

    storage
        .cache()
        .set_with_ttl("session", &Session { id: 1 }, 60)
        .expect("set");
    assert_eq!(
        storage.cache().get::<Session>("session").expect("get"),
        Some(Session { id: 1 })
    );

    clock.advance(Duration::from_secs(61));
    assert_eq!(storage.cache().get::<Session>("session").expect("get"), None);
    assert!(storage.cache().all_keys().expect("keys").is_empty());
}

#[tokio::test]
async fn test_cyclic_like_value_reports_key_and_tier() {
    let storage = context_with(Arc::new(MemoryStorageProvider::new()))
        .initialize_storage()
        .await
        .expect("initialize");

    let mut value = std::collections::HashMap::new();
    value.insert(vec!["not", "a", "string"], 1);
    let err = storage.cache().set("that-key", &value).expect_err("unserializable");

    assert_eq!(err.name(), "SerializationError");
    assert_eq!(err.key(), Some("that-key"));
    assert_eq!(err.tier(), Some(Tier::Cache));
}

#[tokio::test]
async fn test_logout_then_factory_reset() {
    let storage = context_with(Arc::new(MemoryStorageProvider::new()))
        .initialize_storage()
        .await
        .expect("initialize");

    storage.cache().set("user_orders", &vec![1, 2]).expect("set");
    storage.cache().set("auth_state", "ok").expect("set");
    storage.cache().set("product_catalog", &vec!["a"]).expect("set");
    storage.secure().set_api_key("maps", "k").expect("set");
    storage.preferences().set_language("pt").expect("set");

    storage.clear_user_data().expect("logout");
    assert_eq!(
        storage.cache().all_keys().expect("keys"),
        vec!["product_catalog"]
    );
    assert!(storage.secure().is_empty().expect("secure"));
    assert_eq!(storage.preferences().language().expect("get"), "pt");

    let export = storage.export_all_data().expect("export");
    assert!(export.secure.is_empty());
    assert!(export.cache.contains_key("product_catalog"));

    storage.clear_all().expect("reset");
    assert_eq!(storage.total_size().expect("size"), 0);
    assert_eq!(storage.preferences().language().expect("default"), "en");
}

#[tokio::test]
async fn test_export_never_leaks_secrets() {
    let storage = context_with(Arc::new(MemoryStorageProvider::new()))
        .initialize_storage()
        .await
        .expect("initialize");
    storage.secure().set_refresh_token("refresh-secret").expect("set");

    let export = storage.export_all_data().expect("export");
    assert_eq!(export.secure["refresh_token"], REDACTED_PLACEHOLDER);
    let json = serde_json::to_string(&export).expect("serialize");
    assert!(!json.contains("refresh-secret"));
}

#[tokio::test]
async fn test_sqlite_storage_survives_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let paths = StoragePaths::new(dir.path().join("files"), dir.path().join("no_backup"));
    let credentials = Arc::new(FlakyCredentialStore::new());

    {
        let provider = Arc::new(PlatformStorageProvider::new(&paths, credentials.clone()));
        let storage = StorageContext::new(provider, StorageConfig::default())
            .initialize_storage()
            .await
            .expect("initialize");
        storage.preferences().set_onboarding_completed(true).expect("set");
        storage.cache().set("catalog", &vec![1, 2, 3]).expect("set");
        storage.secure().set_auth_token("persisted-token").expect("set");
        storage.temp().save_form_draft("signup", "half done").expect("set");
    }

    let secure_file = paths.engine_provider().partition_path(&PartitionConfig::new(
        "secure",
        PartitionLocation::Backed,
    ));
    assert!(secure_file.exists());
    let raw = SqliteEngine::open(&secure_file)
        .expect("open raw")
        .get_string("auth_token")
        .expect("raw read")
        .expect("present");
    assert!(!raw.contains("persisted-token"));

    let provider = Arc::new(PlatformStorageProvider::new(&paths, credentials.clone()));
    let storage = StorageContext::new(provider, StorageConfig::default())
        .initialize_storage()
        .await
        .expect("reinitialize");

    assert!(storage.preferences().onboarding_completed().expect("get"));
    assert_eq!(
        storage.cache().get::<Vec<u32>>("catalog").expect("get"),
        Some(vec![1, 2, 3])
    );
    assert_eq!(
        storage.secure().auth_token().expect("get").as_deref(),
        Some("persisted-token")
    );
    assert_eq!(storage.temp().form_draft::<String>("signup").expect("get"), None);
    assert_eq!(credentials.writes(), 1);
}

#[tokio::test]
async fn test_statistics_and_maintenance() {
    let clock = Arc::new(ManualClock::new(10_000));
    let provider = Arc::new(MemoryStorageProvider::new().with_clock(clock.clone()));
    let storage = context_with(provider)
        .initialize_storage()
        .await
        .expect("initialize");

    storage.cache().set_with_ttl("short", &1, 5).expect("set");
    storage.cache().set_with_ttl("long", &1, 50).expect("set");
    storage.cache().set("forever", &1).expect("set");

    let stats = storage.statistics().expect("stats");
    assert_eq!(stats.item_counts.cache, 3);
    assert_eq!(stats.earliest_cache_expiration, Some(15_000));

    clock.advance(Duration::from_secs(6));
    let report = storage.perform_maintenance().expect("maintenance");
    assert_eq!(report.expired.removed, vec!["short".to_string()]);
    assert!(report.evicted.is_none());

    let stats = storage.statistics().expect("stats");
    assert_eq!(stats.item_counts.cache, 2);
    assert_eq!(stats.earliest_cache_expiration, Some(60_000));
    assert_eq!(storage.cache().remaining_ttl("long").expect("ttl"), Some(44));
}

#[tokio::test]
async fn test_temp_partition_lives_outside_backups() {
    let root = common::temp_root();
    let paths = StoragePaths::new(root.join("files"), root.join("no_backup"));
    let provider = Arc::new(PlatformStorageProvider::new(
        &paths,
        Arc::new(FlakyCredentialStore::new()),
    ));
    let storage = StorageContext::new(provider, StorageConfig::default())
        .initialize_storage()
        .await
        .expect("initialize");
    storage.temp().set_ui_state("drawer", &true).expect("set");

    let engines = paths.engine_provider();
    let temp_file =
        engines.partition_path(&PartitionConfig::new("temp", PartitionLocation::NoBackup));
    assert!(temp_file.starts_with(paths.no_backup_dir()));
    assert!(temp_file.exists());
    for tier in ["preferences", "cache", "secure"] {
        let file = engines.partition_path(&PartitionConfig::new(tier, PartitionLocation::Backed));
        assert!(file.starts_with(paths.data_dir()));
        assert!(file.exists());
    }

    drop(storage);
    common::cleanup_storage(&root);
}
