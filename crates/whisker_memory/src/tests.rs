use crate::sqlite::SqliteStore;
use chrono::Utc;
use std::time::Duration;
use whisker_core::RecordStore;

const WINDOW: Duration = Duration::from_secs(300);

async fn memory_store() -> SqliteStore {
    SqliteStore::new(":memory:")
        .await
        .expect("Failed to create store")
}

#[tokio::test]
async fn test_user_create_or_fetch_is_idempotent() {
    let store = memory_store().await;

    let alice = store.find_or_create_user("alice").await.unwrap();
    let again = store.find_or_create_user("alice").await.unwrap();
    let bob = store.find_or_create_user("bob").await.unwrap();

    assert_eq!(alice, again);
    assert_ne!(alice, bob);
    assert_eq!(store.count_users().await.unwrap(), 2);
}

#[tokio::test]
async fn test_food_preference_fixed_at_creation() {
    let store = memory_store().await;

    let first = store.find_or_create_food("tuna", true).await.unwrap();
    assert!(first.preferred_by_cat);

    // A different "random" preference on a later lookup must not change the row
    let second = store.find_or_create_food("tuna", false).await.unwrap();
    assert_eq!(first, second);
    assert!(second.preferred_by_cat);

    let broccoli = store.find_or_create_food("broccoli", false).await.unwrap();
    assert!(!broccoli.preferred_by_cat);
    assert_eq!(store.count_foods().await.unwrap(), 2);
}

#[tokio::test]
async fn test_empty_history_reads() {
    let store = memory_store().await;

    assert!(store.eat_events_since(WINDOW).await.unwrap().is_empty());
    assert!(store.pet_success_flags_since(WINDOW).await.unwrap().is_empty());
    assert!(store.eat_events_for_user_since("nobody", WINDOW).await.unwrap().is_empty());
    assert!(store.pet_events_for_user_since("nobody", WINDOW).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pet_history_most_recent_first() {
    let store = memory_store().await;
    let alice = store.find_or_create_user("alice").await.unwrap();
    let bob = store.find_or_create_user("bob").await.unwrap();

    store.append_pet_event(alice, false).await.unwrap();
    store.append_pet_event(bob, false).await.unwrap();
    store.append_pet_event(alice, true).await.unwrap();

    let flags = store.pet_success_flags_since(WINDOW).await.unwrap();
    assert_eq!(flags, vec![true, false, false]);

    let events = store.pet_events_for_user_since("alice", WINDOW).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].is_success);
    assert!(!events[1].is_success);
    assert!(events[0].occurred_at >= events[1].occurred_at);
    assert!(events.iter().all(|e| e.user_id == alice));
}

#[tokio::test]
async fn test_eat_history_filters_by_user() {
    let store = memory_store().await;
    let alice = store.find_or_create_user("alice").await.unwrap();
    let bob = store.find_or_create_user("bob").await.unwrap();
    let tuna = store.find_or_create_food("tuna", true).await.unwrap();

    store.append_eat_event(alice, tuna.id, true, false).await.unwrap();
    store.append_eat_event(bob, tuna.id, false, true).await.unwrap();
    store.append_eat_event(alice, tuna.id, false, false).await.unwrap();

    let all = store.eat_events_since(WINDOW).await.unwrap();
    assert_eq!(all.len(), 3);

    let mine = store.eat_events_for_user_since("alice", WINDOW).await.unwrap();
    assert_eq!(mine.len(), 2);
    // Newest first
    assert!(!mine[0].is_success);
    assert!(mine[1].is_success);
    assert!(mine.iter().all(|e| e.food_id == tuna.id));

    let theirs = store.eat_events_for_user_since("bob", WINDOW).await.unwrap();
    assert_eq!(theirs.len(), 1);
    assert!(theirs[0].is_cat_fed);
}

#[tokio::test]
async fn test_window_excludes_old_events() {
    let store = memory_store().await;
    let alice = store.find_or_create_user("alice").await.unwrap();
    store.append_pet_event(alice, true).await.unwrap();

    tokio::time::sleep(Duration::from_millis(30)).await;

    // A window shorter than the event's age sees nothing
    let recent = store.pet_success_flags_since(Duration::from_millis(5)).await.unwrap();
    assert!(recent.is_empty());
    let wide = store.pet_success_flags_since(WINDOW).await.unwrap();
    assert_eq!(wide, vec![true]);
}

#[tokio::test]
async fn test_concurrent_first_use_creates_one_user() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = SqliteStore::new(dir.path().join("race.db")).await.unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.find_or_create_user("carol").await
        }));
    }

    let mut ids = Vec::new();
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);
    assert_eq!(store.count_users().await.unwrap(), 1);
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("cat.db");

    {
        let store = SqliteStore::new(&db_path).await.unwrap();
        let alice = store.find_or_create_user("alice").await.unwrap();
        store.append_pet_event(alice, true).await.unwrap();
    }

    let store = SqliteStore::new(&db_path).await.unwrap();
    let events = store.pet_events_for_user_since("alice", WINDOW).await.unwrap();
    assert_eq!(events.len(), 1);
    assert!(events[0].is_success);
}

#[tokio::test]
async fn test_stamps_never_go_backwards() {
    let store = memory_store().await;
    assert_eq!(store.stamp_at(1_000), 1_000);
    assert_eq!(store.stamp_at(900), 1_000);
    assert_eq!(store.stamp_at(1_100), 1_100);

    // Clones share the same clock
    assert_eq!(store.clone().stamp_at(0), 1_100);
}

#[tokio::test]
async fn test_clock_step_back_keeps_insertion_order() {
    let store = memory_store().await;
    let alice = store.find_or_create_user("alice").await.unwrap();

    // The last write happened a minute "ahead" of the current wall clock
    let ahead = Utc::now().timestamp_millis() + 60_000;
    store.stamp_at(ahead);

    store.append_pet_event(alice, false).await.unwrap();
    store.append_pet_event(alice, true).await.unwrap();

    let events = store.pet_events_for_user_since("alice", WINDOW).await.unwrap();
    assert_eq!(events.len(), 2);
    assert!(events[0].is_success);
    assert!(events[0].id > events[1].id);
    assert!(events.iter().all(|e| e.occurred_at.timestamp_millis() >= ahead));
}

#[tokio::test]
async fn test_reopen_resumes_from_latest_stamp() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("cat.db");
    let ahead = Utc::now().timestamp_millis() + 60_000;

    {
        let store = SqliteStore::new(&db_path).await.unwrap();
        let alice = store.find_or_create_user("alice").await.unwrap();
        let tuna = store.find_or_create_food("tuna", true).await.unwrap();
        store.stamp_at(ahead);
        store.append_eat_event(alice, tuna.id, true, false).await.unwrap();
    }

    let store = SqliteStore::new(&db_path).await.unwrap();
    assert!(store.stamp_at(0) >= ahead);
}
