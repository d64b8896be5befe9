use super::*;
use antique_watchdog::store::QueryStore;
use antique_watchdog::{Constraint, Query, Relation};

#[test]
fn test_settings_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");

    let store = ConfigStore::open(&path).unwrap();
    assert!(!store.is_valid());
    store
        .set_keys(&[
            ("login", "watchdog@example.com"),
            ("password", "secret"),
            ("recipient", "reader@example.com"),
            ("server", "smtp.example.com"),
            ("port", "587"),
            ("time", "06:45"),
            ("period", "daily"),
        ])
        .unwrap();
    drop(store);

    let reopened = ConfigStore::open(&path).unwrap();
    assert!(reopened.is_valid());
    assert_eq!(reopened.get_mailer_keys().unwrap().port, 587);
    assert_eq!(reopened.get_scheduler_keys().time, "06:45");
}

#[test]
fn test_unknown_key_leaves_file_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.toml");
    let store = ConfigStore::open(&path).unwrap();
    store.set_key("time", "06:45").unwrap();
    let before = std::fs::read_to_string(&path).unwrap();

    assert!(store.set_keys(&[("period", "daily"), ("colour", "blue")]).is_err());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), before);
    assert_eq!(store.get_scheduler_keys().period, "");
}

#[tokio::test]
async fn test_queries_round_trip_through_yaml() {
    let dir = tempfile::tempdir().unwrap();
    let store = YamlQueryStore::new(dir.path().join("queries.yaml"));
    let queries = vec![Query::new(
        "greg egan",
        vec![
            Constraint::new("author", Relation::Contains, "egan"),
            Constraint::new("price", Relation::Less, "300").with_normalize(false),
        ],
    )];

    store.update_queries(queries.clone()).await.unwrap();
    assert_eq!(store.fetch_queries().await.unwrap(), queries);
}
