use std::time::Duration;

use serde_json::json;

use jsondb::{path, JsonDb, StoreOptions};

#[tokio::test]
async fn umbrella_exposes_both_layers() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("db.json");
    let options =
        StoreOptions::from_json_str(r#"{"autoSaveInterval": 3600000, "compress": true}"#).unwrap();

    let db = JsonDb::open(&file, options).await.unwrap();
    db.set("user.name", "John").unwrap();
    db.close().await.unwrap();
    assert_eq!(std::fs::read_to_string(&file).unwrap(), r#"{"user":{"name":"John"}}"#);

    let mut doc = jsondb::Document::new();
    jsondb::core::accessor::resolve_for_write(&mut doc, &path!("user.name"), json!("John")).unwrap();
    assert_eq!(db.get("user").unwrap().as_ref(), doc.get("user"));
    assert_eq!(db.options().auto_save_interval, Duration::from_secs(3600));
}
