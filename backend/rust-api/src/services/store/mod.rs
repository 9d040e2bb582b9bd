//! Persistence port for levels and access requests.
//!
//! The access-request workflow only talks to [`AccessRequestStore`]. MongoDB
//! backs it in production; the in-memory variant backs tests.

use async_trait::async_trait;

use crate::models::{AccessRequest, Level};

pub mod memory;
pub mod mongo;

pub use memory::MemoryAccessRequestStore;
pub use mongo::MongoAccessRequestStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A pending request for the same (user, level) pair already exists.
    #[error("pending access request already exists")]
    DuplicatePending,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("malformed record: {0}")]
    Malformed(String),
}

impl From<mongodb::error::Error> for StoreError {
    fn from(err: mongodb::error::Error) -> Self {
        StoreError::Unavailable(err.to_string())
    }
}

#[async_trait]
pub trait AccessRequestStore: Send + Sync {
    /// Case-insensitive exact match on the level catalog.
    ///
    /// `normalized_name` is expected to be trimmed and lower-cased already.
    async fn find_level_by_name(&self, normalized_name: &str) -> Result<Option<Level>, StoreError>;

    /// Every level, ordered by difficulty then name.
    async fn list_levels(&self) -> Result<Vec<Level>, StoreError>;

    /// Whether the user already holds access to the level.
    async fn has_access(&self, user_id: &str, level_id: &str) -> Result<bool, StoreError>;

    async fn has_pending_request(&self, user_id: &str, level_id: &str)
        -> Result<bool, StoreError>;

    /// Persists a new `pending` request and returns its identifier.
    ///
    /// Returns [`StoreError::DuplicatePending`] when the store's own
    /// uniqueness guarantee rejects the insert.
    async fn insert_pending_request(
        &self,
        user_id: &str,
        level_id: &str,
    ) -> Result<String, StoreError>;

    /// The user's requests, newest first.
    async fn list_requests_for_user(&self, user_id: &str)
        -> Result<Vec<AccessRequest>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}
