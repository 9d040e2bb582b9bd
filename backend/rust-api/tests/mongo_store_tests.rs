//! Runs the MongoDB store against a live server.
//!
//! `cargo test --test mongo_store_tests -- --ignored` with `MONGO_URI`
//! pointing at a disposable instance (defaults to localhost). Each test works
//! in its own database and drops it afterwards.

use level_access_api::services::store::{AccessRequestStore, MongoAccessRequestStore, StoreError};
use mongodb::{
    bson::{doc, DateTime, Document},
    Database,
};
use uuid::Uuid;

async fn fresh_database() -> Database {
    let uri = std::env::var("MONGO_URI").unwrap_or_else(|_| "mongodb://localhost:27017".to_string());
    let client = mongodb::Client::with_uri_str(&uri)
        .await
        .expect("Failed to connect to test MongoDB");
    client.database(&format!("level_access_test_{}", Uuid::new_v4().simple()))
}

async fn seed_levels(db: &Database, levels: Vec<Document>) {
    db.collection::<Document>("levels")
        .insert_many(levels)
        .await
        .unwrap();
}

async fn seed_request(db: &Database, user_id: &str, level_id: &str, status: &str, created_ms: i64) {
    db.collection::<Document>("access_requests")
        .insert_one(doc! {
            "user_id": user_id,
            "level_id": level_id,
            "status": status,
            "createdAt": DateTime::from_millis(created_ms),
        })
        .await
        .unwrap();
}

#[tokio::test]
#[ignore = "requires MongoDB (MONGO_URI)"]
async fn test_level_lookup_is_case_insensitive() {
    let db = fresh_database().await;
    seed_levels(&db, vec![doc! { "_id": "L2", "name": "Flyers", "difficulty_level": 3 }]).await;
    let store = MongoAccessRequestStore::new(db.clone());

    let level = store.find_level_by_name("flyers").await.unwrap().unwrap();
    assert_eq!(level.id, "L2");
    assert_eq!(level.difficulty_level, 3);
    assert!(store.find_level_by_name("flyer").await.unwrap().is_none());

    db.drop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires MongoDB (MONGO_URI)"]
async fn test_level_lookup_treats_regex_characters_literally() {
    let db = fresh_database().await;
    seed_levels(
        &db,
        vec![
            doc! { "_id": "L2", "name": "Flyers", "difficulty_level": 3 },
            doc! { "_id": "L5", "name": "A+ (Advanced)", "difficulty_level": 5 },
        ],
    )
    .await;
    let store = MongoAccessRequestStore::new(db.clone());

    assert!(store.find_level_by_name("fl.ers").await.unwrap().is_none());
    assert!(store.find_level_by_name(".*").await.unwrap().is_none());
    let level = store
        .find_level_by_name("a+ (advanced)")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(level.id, "L5");

    db.drop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires MongoDB (MONGO_URI)"]
async fn test_approved_request_grants_access() {
    let db = fresh_database().await;
    seed_request(&db, "u1", "L2", "approved", 1_700_000_000_000).await;
    seed_request(&db, "u1", "L3", "pending", 1_700_000_000_000).await;
    let store = MongoAccessRequestStore::new(db.clone());

    assert!(store.has_access("u1", "L2").await.unwrap());
    assert!(!store.has_pending_request("u1", "L2").await.unwrap());
    assert!(!store.has_access("u1", "L3").await.unwrap());
    assert!(store.has_pending_request("u1", "L3").await.unwrap());
    assert!(!store.has_access("u2", "L2").await.unwrap());

    db.drop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires MongoDB (MONGO_URI)"]
async fn test_unique_index_rejects_second_pending_insert() {
    let db = fresh_database().await;
    let store = MongoAccessRequestStore::new(db.clone());
    store.ensure_indexes().await.unwrap();

    let first = store.insert_pending_request("u1", "L2").await.unwrap();
    let err = store.insert_pending_request("u1", "L2").await.unwrap_err();
    assert!(matches!(err, StoreError::DuplicatePending));

    let requests = db.collection::<Document>("access_requests");
    assert_eq!(
        requests
            .count_documents(doc! { "user_id": "u1", "level_id": "L2" })
            .await
            .unwrap(),
        1
    );

    // The index only covers pending rows, so a rejected request can be refiled.
    requests
        .update_one(
            doc! { "_id": mongodb::bson::oid::ObjectId::parse_str(&first).unwrap() },
            doc! { "$set": { "status": "rejected" } },
        )
        .await
        .unwrap();
    store.insert_pending_request("u1", "L2").await.unwrap();
    store.insert_pending_request("u2", "L2").await.unwrap();

    db.drop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires MongoDB (MONGO_URI)"]
async fn test_requests_listed_newest_first() {
    let db = fresh_database().await;
    seed_request(&db, "u1", "L2", "rejected", 1_700_000_000_000).await;
    seed_request(&db, "u1", "L3", "approved", 1_700_000_500_000).await;
    seed_request(&db, "u2", "L4", "pending", 1_700_000_900_000).await;
    let store = MongoAccessRequestStore::new(db.clone());
    store.insert_pending_request("u1", "L4").await.unwrap();

    let levels: Vec<String> = store
        .list_requests_for_user("u1")
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.level_id)
        .collect();
    assert_eq!(levels, vec!["L4", "L3", "L2"]);

    db.drop().await.unwrap();
}

#[tokio::test]
#[ignore = "requires MongoDB (MONGO_URI)"]
async fn test_list_levels_sorted_and_accepts_double_difficulty() {
    let db = fresh_database().await;
    seed_levels(
        &db,
        vec![
            doc! { "_id": "L2", "name": "Flyers", "difficulty_level": 3.0 },
            doc! { "_id": "L1", "name": "Beginner", "difficulty_level": 1_i64 },
            doc! { "_id": "L3", "name": "Movers", "difficulty_level": 2 },
        ],
    )
    .await;
    let store = MongoAccessRequestStore::new(db.clone());

    let levels = store.list_levels().await.unwrap();
    let names: Vec<&str> = levels.iter().map(|l| l.name.as_str()).collect();
    assert_eq!(names, vec!["Beginner", "Movers", "Flyers"]);
    assert_eq!(levels[2].difficulty_level, 3);

    db.drop().await.unwrap();
}
