mod mock_store;

use std::path::PathBuf;

use mock_store::InMemorySettingsStore;
use serde_json::{Value, json};
use settings::{
    EngineSettings, JsonFileSettingsStore, PersistenceError, SettingsStore, SqliteSettingsStore,
    load_enabled, open_store,
};
use sqlx::sqlite::SqlitePoolOptions;
use uuid::Uuid;

fn temp_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("settings-test-{}", Uuid::new_v4()))
        .join("settings.json")
}

#[tokio::test]
async fn json_store_missing_file_loads_none() -> anyhow::Result<()> {
    let store = JsonFileSettingsStore::new(temp_path(), "celebrations");
    assert_eq!(store.load().await?, None);
    assert!(load_enabled(&store, true).await);
    Ok(())
}

#[tokio::test]
async fn json_store_round_trip_preserves_other_keys() -> anyhow::Result<()> {
    let path = temp_path();
    tokio::fs::create_dir_all(path.parent().unwrap()).await?;
    tokio::fs::write(&path, r#"{"theme":{"crt":true}}"#).await?;

    let store = JsonFileSettingsStore::new(&path, "celebrations");
    store.save(&EngineSettings::new(false)).await?;

    assert_eq!(store.load().await?, Some(EngineSettings::new(false)));

    let root: Value = serde_json::from_str(&tokio::fs::read_to_string(&path).await?)?;
    assert_eq!(root["theme"], json!({ "crt": true }));
    assert_eq!(root["celebrations"], json!({ "eventsEnabled": false }));

    tokio::fs::remove_dir_all(path.parent().unwrap()).await?;
    Ok(())
}

#[tokio::test]
async fn json_store_reads_legacy_key() -> anyhow::Result<()> {
    let path = temp_path();
    tokio::fs::create_dir_all(path.parent().unwrap()).await?;
    tokio::fs::write(&path, r#"{"celebrations":{"enabledEffects":true}}"#).await?;

    let store = JsonFileSettingsStore::new(&path, "celebrations");
    assert!(load_enabled(&store, false).await);

    tokio::fs::remove_dir_all(path.parent().unwrap()).await?;
    Ok(())
}

#[tokio::test]
async fn json_store_corrupt_file_falls_back_to_default() -> anyhow::Result<()> {
    let path = temp_path();
    tokio::fs::create_dir_all(path.parent().unwrap()).await?;
    tokio::fs::write(&path, "{not json").await?;

    let store = JsonFileSettingsStore::new(&path, "celebrations");
    assert!(store.load().await.is_err());
    assert!(!load_enabled(&store, false).await);
    assert!(load_enabled(&store, true).await);

    // Saving over a corrupt file replaces it.
    store.save(&EngineSettings::new(true)).await?;
    assert_eq!(store.load().await?, Some(EngineSettings::new(true)));

    tokio::fs::remove_dir_all(path.parent().unwrap()).await?;
    Ok(())
}

#[tokio::test]
async fn sqlite_store_upserts() -> anyhow::Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = SqliteSettingsStore::from_pool(pool, "engine");
    store.ensure_schema().await?;

    assert_eq!(store.load().await?, None);

    store.save(&EngineSettings::new(true)).await?;
    store.save(&EngineSettings::new(false)).await?;
    assert_eq!(store.load().await?, Some(EngineSettings::new(false)));
    Ok(())
}

#[tokio::test]
async fn sqlite_connect_creates_schema() -> anyhow::Result<()> {
    let store = SqliteSettingsStore::connect("sqlite::memory:", "engine").await?;
    store.save(&EngineSettings::new(true)).await?;
    assert!(load_enabled(&store, false).await);
    Ok(())
}

#[tokio::test]
async fn sqlite_connect_fails_for_missing_directory() {
    let db = temp_path().with_file_name("settings.db");
    let url = format!("sqlite://{}", db.display());

    let result = SqliteSettingsStore::connect(&url, "engine").await;
    assert!(matches!(result, Err(PersistenceError::Database(_))));
}

#[tokio::test]
async fn open_store_falls_back_to_json_when_sqlite_fails() -> anyhow::Result<()> {
    let path = temp_path();
    let url = format!("sqlite://{}", path.with_file_name("settings.db").display());

    let store = open_store(Some(&url), path.clone(), "celebrations".into()).await;
    store.save(&EngineSettings::new(false)).await?;

    let file = JsonFileSettingsStore::new(&path, "celebrations");
    assert_eq!(file.load().await?, Some(EngineSettings::new(false)));

    tokio::fs::remove_dir_all(path.parent().unwrap()).await?;
    Ok(())
}

#[tokio::test]
async fn open_store_uses_sqlite_when_reachable() -> anyhow::Result<()> {
    let path = temp_path();
    let store = open_store(Some("sqlite::memory:"), path.clone(), "engine".into()).await;
    store.save(&EngineSettings::new(true)).await?;

    assert!(load_enabled(store.as_ref(), false).await);
    assert!(!path.exists());
    Ok(())
}

#[tokio::test]
async fn in_memory_store_counts_saves() -> anyhow::Result<()> {
    let store = InMemorySettingsStore::default();
    assert!(!load_enabled(&store, false).await);

    store.save(&EngineSettings::new(true)).await?;
    assert!(load_enabled(&store, false).await);
    assert_eq!(*store.saves.lock().await, 1);
    Ok(())
}
