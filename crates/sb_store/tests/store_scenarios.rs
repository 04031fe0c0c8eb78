use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use sb_crypto::KdfParams;
use sb_store::{db::open_pool, MasterState, SecretStore, StaticCredential, StoreConfig, StoreError};
use tempfile::{tempdir, TempDir};

const CHEAP: KdfParams = KdfParams::new(256, 1, 1);

async fn open_store() -> (TempDir, SecretStore) {
    let dir = tempdir().unwrap();
    let store = SecretStore::open(&config(&dir)).await.unwrap();
    (dir, store)
}

fn config(dir: &TempDir) -> StoreConfig {
    StoreConfig::new(dir.path()).with_kdf(CHEAP).with_idle_lock_secs(0)
}

async fn unlocked(password: &str) -> (TempDir, SecretStore) {
    let (dir, store) = open_store().await;
    store.set_master_password(password).await.unwrap();
    store.activate_session(password).await.unwrap();
    (dir, store)
}

#[tokio::test]
async fn create_then_get_by_label() {
    let (_dir, store) = unlocked("testpass").await;
    store.create_secret("label1", "mytoken", "token").await.unwrap();

    let secret = store.get_secret("label1").await.unwrap();
    assert_eq!(secret.value.as_str(), "mytoken");
    assert_eq!(secret.kind, "token");
}

#[tokio::test]
async fn get_accepts_id_or_label() {
    let (_dir, store) = unlocked("testpass").await;
    let id = store.create_secret("github", "ghp_x", "").await.unwrap();

    let by_id = store.get_secret(&id).await.unwrap();
    let by_label = store.get_secret("github").await.unwrap();
    assert_eq!(by_id.value.as_str(), "ghp_x");
    assert_eq!(by_label.value.as_str(), "ghp_x");
    assert_eq!(by_id.kind, "password");
}

#[tokio::test]
async fn rotation_keeps_every_secret() {
    let (_dir, store) = unlocked("oldpass").await;
    store.create_secret("label2", "secret2", "token").await.unwrap();

    store.rotate_master_password("oldpass", "newpass").await.unwrap();

    let secret = store.get_secret("label2").await.unwrap();
    assert_eq!(secret.value.as_str(), "secret2");
    assert_eq!(secret.kind, "token");
    assert!(!store.verify_master_password("oldpass").await.unwrap());
    assert!(store.verify_master_password("newpass").await.unwrap());
}

#[tokio::test]
async fn missing_and_invalid_inputs() {
    let (_dir, store) = unlocked("testpass").await;
    assert!(matches!(
        store.get_secret("missing").await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.create_secret("", "x", "password").await,
        Err(StoreError::InvalidInput(_))
    ));
    assert!(matches!(
        store.update_secret("missing", "x").await,
        Err(StoreError::NotFound(_))
    ));
    assert!(matches!(
        store.delete_secret("missing").await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn master_password_lifecycle() {
    let (_dir, store) = open_store().await;
    assert!(!store.is_master_configured().await.unwrap());
    assert_eq!(store.status().await.unwrap(), MasterState::Unset);
    assert!(matches!(
        store.verify_master_password("anything").await,
        Err(StoreError::NotConfigured)
    ));

    store.set_master_password("testpass").await.unwrap();
    assert!(store.is_master_configured().await.unwrap());
    assert!(store.verify_master_password("testpass").await.unwrap());
    assert!(!store.verify_master_password("wrongpass").await.unwrap());
    assert!(matches!(
        store.set_master_password("another").await,
        Err(StoreError::AlreadyInitialized)
    ));

    let err = store.activate_session("wrongpass").await.unwrap_err();
    assert!(err.is_auth_failure());
    assert_eq!(err.to_string(), "Authentication failed");
    assert_eq!(store.status().await.unwrap(), MasterState::Unauthenticated);
}

#[tokio::test]
async fn locked_store_refuses_secret_access() {
    let (_dir, store) = unlocked("testpass").await;
    let id = store.create_secret("label", "value", "note").await.unwrap();
    store.lock_session().await;

    assert!(matches!(store.list_secrets().await, Err(StoreError::Unauthenticated)));
    assert!(matches!(store.get_secret(&id).await, Err(StoreError::Unauthenticated)));
    assert!(matches!(
        store.search_secrets("").await,
        Err(StoreError::Unauthenticated)
    ));
    assert!(matches!(
        store.create_secret("x", "y", "").await,
        Err(StoreError::Unauthenticated)
    ));
}

#[tokio::test]
async fn list_and_search_never_expose_values() {
    let (_dir, store) = unlocked("testpass").await;
    store.create_secret("lab1", "hunter2", "password").await.unwrap();
    store.create_secret("Other", "s3cr3t", "token").await.unwrap();

    let listed = store.list_secrets().await.unwrap();
    assert_eq!(listed.len(), 2);
    let json = serde_json::to_string(&listed).unwrap();
    assert!(!json.contains("hunter2"));
    assert!(!json.contains("s3cr3t"));

    assert!(store.search_secrets("").await.unwrap().is_empty());
    let hits = store.search_secrets("LAB").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].label, "lab1");
}

#[tokio::test]
async fn update_and_delete() {
    let (_dir, store) = unlocked("testpass").await;
    let id = store.create_secret("db", "v1", "password").await.unwrap();

    store.update_secret(&id, "v2").await.unwrap();
    assert_eq!(store.get_secret(&id).await.unwrap().value.as_str(), "v2");
    assert!(matches!(
        store.update_secret(&id, "").await,
        Err(StoreError::InvalidInput(_))
    ));

    store.delete_secret(&id).await.unwrap();
    assert!(matches!(store.get_secret(&id).await, Err(StoreError::NotFound(_))));
}

#[tokio::test]
async fn failed_rotation_leaves_old_password_working() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir);
    let store = SecretStore::open(&cfg).await.unwrap();
    store.set_master_password("oldpass").await.unwrap();
    store.activate_session("oldpass").await.unwrap();
    let good = store.create_secret("good", "kept", "password").await.unwrap();
    let bad = store.create_secret("bad", "doomed", "password").await.unwrap();

    // Damage one ciphertext behind the store's back.
    let raw = open_pool(&cfg.db_path()).await.unwrap();
    sqlx::query("UPDATE secrets SET value_ciphertext = ? WHERE id = ?")
        .bind("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA")
        .bind(&bad)
        .execute(&raw)
        .await
        .unwrap();
    raw.close().await;

    let err = store
        .rotate_master_password("oldpass", "newpass")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::RotationFailed(_)));

    assert!(store.verify_master_password("oldpass").await.unwrap());
    assert!(!store.verify_master_password("newpass").await.unwrap());
    assert_eq!(store.get_secret(&good).await.unwrap().value.as_str(), "kept");
    assert!(matches!(store.get_secret(&bad).await, Err(StoreError::Integrity)));
    assert_eq!(store.status().await.unwrap(), MasterState::Authenticated);
}

#[tokio::test]
async fn rotation_while_locked_stays_locked() {
    let (_dir, store) = unlocked("oldpass").await;
    store.create_secret("k", "v", "").await.unwrap();
    store.lock_session().await;

    store.rotate_master_password("oldpass", "newpass").await.unwrap();
    assert_eq!(store.status().await.unwrap(), MasterState::Unauthenticated);

    store.activate_session("newpass").await.unwrap();
    assert_eq!(store.get_secret("k").await.unwrap().value.as_str(), "v");
}

#[tokio::test]
async fn rotation_rejects_wrong_old_password() {
    let (_dir, store) = unlocked("oldpass").await;
    assert!(matches!(
        store.rotate_master_password("nope", "newpass").await,
        Err(StoreError::Unauthorized)
    ));
    assert!(store.verify_master_password("oldpass").await.unwrap());
}

#[tokio::test]
async fn separate_stores_are_isolated() {
    let (_a_dir, a) = unlocked("alpha").await;
    let (_b_dir, b) = open_store().await;
    b.set_master_password("beta").await.unwrap();

    a.create_secret("only-in-a", "x", "").await.unwrap();
    assert!(matches!(b.list_secrets().await, Err(StoreError::Unauthenticated)));

    b.activate_session("beta").await.unwrap();
    assert!(b.list_secrets().await.unwrap().is_empty());
    assert!(!b.verify_master_password("alpha").await.unwrap());
}

#[tokio::test]
async fn reopened_store_needs_reactivation() {
    let dir = tempdir().unwrap();
    let cfg = config(&dir);
    {
        let store = SecretStore::open(&cfg).await.unwrap();
        store.set_master_password("testpass").await.unwrap();
        store.activate_session("testpass").await.unwrap();
        store.create_secret("persisted", "value", "").await.unwrap();
    }

    let store = SecretStore::open(&cfg).await.unwrap();
    assert_eq!(store.status().await.unwrap(), MasterState::Unauthenticated);
    store
        .activate_session_with(&StaticCredential::new("testpass"))
        .await
        .unwrap();
    assert_eq!(
        store.get_secret("persisted").await.unwrap().value.as_str(),
        "value"
    );
}

#[tokio::test]
async fn idle_session_expires() {
    let dir = tempdir().unwrap();
    let cfg = StoreConfig::new(dir.path()).with_kdf(CHEAP).with_idle_lock_secs(1);
    let store = SecretStore::open(&cfg).await.unwrap();
    store.set_master_password("testpass").await.unwrap();
    store.activate_session("testpass").await.unwrap();
    store.list_secrets().await.unwrap();

    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert!(matches!(store.list_secrets().await, Err(StoreError::Unauthenticated)));
    assert_eq!(store.status().await.unwrap(), MasterState::Unauthenticated);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn readers_and_writers_never_see_a_half_rotated_store() {
    let (_dir, store) = unlocked("pass-start").await;
    let store = Arc::new(store);
    let seed = store.create_secret("seed", "seed-value", "token").await.unwrap();
    let stop = Arc::new(AtomicBool::new(false));

    let workers: Vec<_> = (0..8)
        .map(|n| {
            let store = Arc::clone(&store);
            let stop = Arc::clone(&stop);
            let seed = seed.clone();
            tokio::spawn(async move {
                let mut written = Vec::new();
                let mut i = 0;
                while !stop.load(Ordering::Acquire) {
                    let value = format!("w{n}-{i}");
                    let id = store.create_secret(&format!("w{n}"), &value, "").await.unwrap();
                    written.push((id, value));
                    let secret = store.get_secret(&seed).await.unwrap();
                    assert_eq!(secret.value.as_str(), "seed-value");
                    i += 1;
                    tokio::task::yield_now().await;
                }
                written
            })
        })
        .collect();

    let mut password = "pass-start".to_string();
    for round in 0..10 {
        let next = format!("pass-{round}");
        store.rotate_master_password(&password, &next).await.unwrap();
        password = next;
    }
    stop.store(true, Ordering::Release);

    for worker in workers {
        for (id, value) in worker.await.unwrap() {
            assert_eq!(store.get_secret(&id).await.unwrap().value.as_str(), value);
        }
    }
    assert!(store.verify_master_password(&password).await.unwrap());
    assert_eq!(store.get_secret(&seed).await.unwrap().value.as_str(), "seed-value");
}
