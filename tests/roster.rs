mod common;

use std::sync::Arc;

use tempfile::NamedTempFile;

use common::seed;
use studygroup_bot::members::MemberStore;
use studygroup_bot::roster::RosterResolver;

async fn store() -> (Arc<MemberStore>, NamedTempFile) {
    let db = NamedTempFile::new().unwrap();
    let store = Arc::new(MemberStore::new(db.path().to_str().unwrap()).await.unwrap());
    (store, db)
}

#[tokio::test]
async fn resolution_is_deterministic_for_a_fixed_snapshot() {
    let (members, _db) = store().await;
    members.upsert(42, "Zed").await.unwrap();
    members.upsert(7, "Ada").await.unwrap();

    let roster = RosterResolver::new(seed(&[(100, "Seeded")]), members);
    let first = roster.resolve_all().await;
    let second = roster.resolve_all().await;
    assert_eq!(first, second);
    assert_eq!(
        first,
        vec![
            (7, "Ada".to_string()),
            (42, "Zed".to_string()),
            (100, "Seeded".to_string()),
        ]
    );
}

#[tokio::test]
async fn store_entries_override_seed_names() {
    let (members, _db) = store().await;
    members.upsert(100, "Renamed").await.unwrap();

    let roster = RosterResolver::new(seed(&[(100, "Seeded"), (200, "Kept")]), members);
    let resolved = roster.resolve_all().await;
    assert_eq!(
        resolved,
        vec![(100, "Renamed".to_string()), (200, "Kept".to_string())]
    );
    assert_eq!(roster.member_count().await, 2);
}

#[tokio::test]
async fn repeat_sightings_refresh_the_stored_name() {
    let (members, _db) = store().await;
    members.upsert(1, "Old").await.unwrap();
    members.upsert(1, "New").await.unwrap();

    let listed = members.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].first_name, "New");
}
