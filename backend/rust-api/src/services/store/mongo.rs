use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, Bson, Document, Regex},
    error::{ErrorKind, WriteFailure},
    options::{FindOptions, IndexOptions},
    Database, IndexModel,
};
use serde::{Deserialize, Serialize};

use super::{AccessRequestStore, StoreError};
use crate::metrics::track_db_operation;
use crate::models::{AccessRequest, AccessRequestStatus, Level};

const LEVELS: &str = "levels";
const ACCESS_REQUESTS: &str = "access_requests";
const PENDING_UNIQUE_INDEX: &str = "user_level_pending_unique";
const DUPLICATE_KEY_CODE: i32 = 11000;

#[derive(Debug, Serialize, Deserialize)]
struct AccessRequestDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    user_id: String,
    level_id: String,
    status: String,
    #[serde(rename = "createdAt")]
    created_at: mongodb::bson::DateTime,
}

impl TryFrom<AccessRequestDocument> for AccessRequest {
    type Error = StoreError;

    fn try_from(doc: AccessRequestDocument) -> Result<Self, Self::Error> {
        let id = doc
            .id
            .ok_or_else(|| StoreError::Malformed("access request without _id".to_string()))?;
        let status = AccessRequestStatus::parse(&doc.status).ok_or_else(|| {
            StoreError::Malformed(format!("unknown access request status '{}'", doc.status))
        })?;
        let created_at = DateTime::<Utc>::from_timestamp_millis(doc.created_at.timestamp_millis())
            .ok_or_else(|| StoreError::Malformed("createdAt out of range".to_string()))?;

        Ok(AccessRequest {
            id: id.to_hex(),
            user_id: doc.user_id,
            level_id: doc.level_id,
            status,
            created_at,
        })
    }
}

pub struct MongoAccessRequestStore {
    mongo: Database,
}

impl MongoAccessRequestStore {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Creates the partial unique index that keeps at most one pending
    /// request per (user, level), even when two submissions race past the
    /// pending check.
    pub async fn ensure_indexes(&self) -> Result<(), StoreError> {
        let options = IndexOptions::builder()
            .name(PENDING_UNIQUE_INDEX.to_string())
            .unique(true)
            .partial_filter_expression(doc! { "status": AccessRequestStatus::Pending.as_str() })
            .build();
        let model = IndexModel::builder()
            .keys(doc! { "user_id": 1, "level_id": 1 })
            .options(options)
            .build();

        self.requests().create_index(model).await?;
        tracing::info!("Ensured index {} on {}", PENDING_UNIQUE_INDEX, ACCESS_REQUESTS);
        Ok(())
    }

    fn requests(&self) -> mongodb::Collection<AccessRequestDocument> {
        self.mongo.collection::<AccessRequestDocument>(ACCESS_REQUESTS)
    }

    fn levels(&self) -> mongodb::Collection<Document> {
        self.mongo.collection::<Document>(LEVELS)
    }

    async fn has_request_with_status(
        &self,
        user_id: &str,
        level_id: &str,
        status: AccessRequestStatus,
    ) -> Result<bool, StoreError> {
        let found = track_db_operation("find_one", ACCESS_REQUESTS, async {
            self.requests()
                .find_one(doc! {
                    "user_id": user_id,
                    "level_id": level_id,
                    "status": status.as_str(),
                })
                .await
                .map_err(StoreError::from)
        })
        .await?;

        Ok(found.is_some())
    }
}

fn level_from_document(doc: &Document) -> Result<Level, StoreError> {
    let id = match doc.get("_id") {
        Some(Bson::ObjectId(oid)) => oid.to_hex(),
        Some(Bson::String(value)) => value.clone(),
        _ => return Err(StoreError::Malformed("level has unsupported _id type".to_string())),
    };
    let name = doc
        .get_str("name")
        .map_err(|_| StoreError::Malformed(format!("level {} has no name", id)))?
        .to_string();
    let difficulty_level = doc
        .get("difficulty_level")
        .and_then(bson_to_i32)
        .ok_or_else(|| StoreError::Malformed(format!("level {} has no integer difficulty_level", id)))?;

    Ok(Level {
        id,
        name,
        difficulty_level,
    })
}

/// Accepts int32, int64 and whole-number doubles (what shells and JSON
/// imports tend to write for small integers).
fn bson_to_i32(value: &Bson) -> Option<i32> {
    match value {
        Bson::Int32(v) => Some(*v),
        Bson::Int64(v) => i32::try_from(*v).ok(),
        Bson::Double(v)
            if v.fract() == 0.0 && *v >= f64::from(i32::MIN) && *v <= f64::from(i32::MAX) =>
        {
            Some(*v as i32)
        }
        _ => None,
    }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    match *err.kind {
        ErrorKind::Write(WriteFailure::WriteError(ref write_error)) => {
            write_error.code == DUPLICATE_KEY_CODE
        }
        _ => false,
    }
}

#[async_trait]
impl AccessRequestStore for MongoAccessRequestStore {
    async fn find_level_by_name(&self, normalized_name: &str) -> Result<Option<Level>, StoreError> {
        let filter = doc! {
            "name": Regex {
                pattern: format!("^{}$", regex::escape(normalized_name)),
                options: "i".to_string(),
            }
        };

        let level = track_db_operation("find_one", LEVELS, async {
            self.levels().find_one(filter).await.map_err(StoreError::from)
        })
        .await?;

        level.as_ref().map(level_from_document).transpose()
    }

    async fn list_levels(&self) -> Result<Vec<Level>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "difficulty_level": 1, "name": 1 })
            .build();

        track_db_operation("find", LEVELS, async {
            let mut cursor = self.levels().find(doc! {}).with_options(options).await?;
            let mut levels = Vec::new();
            while let Some(doc) = cursor.try_next().await? {
                levels.push(level_from_document(&doc)?);
            }
            Ok::<_, StoreError>(levels)
        })
        .await
    }

    async fn has_access(&self, user_id: &str, level_id: &str) -> Result<bool, StoreError> {
        self.has_request_with_status(user_id, level_id, AccessRequestStatus::Approved)
            .await
    }

    async fn has_pending_request(
        &self,
        user_id: &str,
        level_id: &str,
    ) -> Result<bool, StoreError> {
        self.has_request_with_status(user_id, level_id, AccessRequestStatus::Pending)
            .await
    }

    async fn insert_pending_request(
        &self,
        user_id: &str,
        level_id: &str,
    ) -> Result<String, StoreError> {
        let document = AccessRequestDocument {
            id: None,
            user_id: user_id.to_string(),
            level_id: level_id.to_string(),
            status: AccessRequestStatus::Pending.as_str().to_string(),
            created_at: mongodb::bson::DateTime::now(),
        };

        let result = track_db_operation("insert_one", ACCESS_REQUESTS, async {
            self.requests().insert_one(&document).await.map_err(|err| {
                if is_duplicate_key(&err) {
                    StoreError::DuplicatePending
                } else {
                    StoreError::from(err)
                }
            })
        })
        .await?;

        result
            .inserted_id
            .as_object_id()
            .map(|oid| oid.to_hex())
            .ok_or_else(|| StoreError::Malformed("inserted access request has no ObjectId".to_string()))
    }

    async fn list_requests_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<AccessRequest>, StoreError> {
        let options = FindOptions::builder()
            .sort(doc! { "createdAt": -1 })
            .build();

        track_db_operation("find", ACCESS_REQUESTS, async {
            let mut cursor = self
                .requests()
                .find(doc! { "user_id": user_id })
                .with_options(options)
                .await?;
            let mut requests = Vec::new();
            while let Some(doc) = cursor.try_next().await? {
                requests.push(AccessRequest::try_from(doc)?);
            }
            Ok::<_, StoreError>(requests)
        })
        .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.mongo.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}
