use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{AccessRequestStore, StoreError};
use crate::models::{normalize_level_name, AccessRequest, AccessRequestStatus, Level};

#[derive(Debug, Default)]
struct MemoryState {
    levels: Vec<Level>,
    requests: Vec<AccessRequest>,
    inserts: usize,
    unavailable: bool,
}

/// In-process store used by tests in place of MongoDB.
///
/// Enforces the same "one pending request per (user, level)" rule that the
/// partial unique index gives the MongoDB store.
#[derive(Debug, Default)]
pub struct MemoryAccessRequestStore {
    state: Mutex<MemoryState>,
}

impl MemoryAccessRequestStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_levels(levels: impl IntoIterator<Item = Level>) -> Self {
        Self {
            state: Mutex::new(MemoryState {
                levels: levels.into_iter().collect(),
                ..MemoryState::default()
            }),
        }
    }

    /// Records an approved request, as the admin review flow would.
    pub async fn grant_access(&self, user_id: &str, level_id: &str) -> String {
        let id = Uuid::new_v4().to_string();
        self.state.lock().await.requests.push(AccessRequest {
            id: id.clone(),
            user_id: user_id.to_string(),
            level_id: level_id.to_string(),
            status: AccessRequestStatus::Approved,
            created_at: Utc::now(),
        });
        id
    }

    /// Returns false when no request has the given id.
    pub async fn set_status(&self, request_id: &str, status: AccessRequestStatus) -> bool {
        let mut state = self.state.lock().await;
        match state.requests.iter_mut().find(|r| r.id == request_id) {
            Some(request) => {
                request.status = status;
                true
            }
            None => false,
        }
    }

    /// Number of successful `insert_pending_request` calls.
    pub async fn insert_count(&self) -> usize {
        self.state.lock().await.inserts
    }

    pub async fn request_count(&self, user_id: &str, level_id: &str) -> usize {
        self.state
            .lock()
            .await
            .requests
            .iter()
            .filter(|r| r.user_id == user_id && r.level_id == level_id)
            .count()
    }

    /// Makes every subsequent call fail with [`StoreError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().await.unavailable = unavailable;
    }
}

impl MemoryState {
    fn check_available(&self) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable(
                "in-memory store marked unavailable".to_string(),
            ));
        }
        Ok(())
    }

    fn has_request_with_status(
        &self,
        user_id: &str,
        level_id: &str,
        status: AccessRequestStatus,
    ) -> bool {
        self.requests
            .iter()
            .any(|r| r.user_id == user_id && r.level_id == level_id && r.status == status)
    }
}

#[async_trait]
impl AccessRequestStore for MemoryAccessRequestStore {
    async fn find_level_by_name(&self, normalized_name: &str) -> Result<Option<Level>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state
            .levels
            .iter()
            .find(|level| normalize_level_name(&level.name) == normalized_name)
            .cloned())
    }

    async fn list_levels(&self) -> Result<Vec<Level>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        let mut levels = state.levels.clone();
        levels.sort_by(|a, b| {
            a.difficulty_level
                .cmp(&b.difficulty_level)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(levels)
    }

    async fn has_access(&self, user_id: &str, level_id: &str) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state.has_request_with_status(user_id, level_id, AccessRequestStatus::Approved))
    }

    async fn has_pending_request(
        &self,
        user_id: &str,
        level_id: &str,
    ) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        Ok(state.has_request_with_status(user_id, level_id, AccessRequestStatus::Pending))
    }

    async fn insert_pending_request(
        &self,
        user_id: &str,
        level_id: &str,
    ) -> Result<String, StoreError> {
        let mut state = self.state.lock().await;
        state.check_available()?;
        if state.has_request_with_status(user_id, level_id, AccessRequestStatus::Pending) {
            return Err(StoreError::DuplicatePending);
        }

        let id = Uuid::new_v4().to_string();
        state.requests.push(AccessRequest {
            id: id.clone(),
            user_id: user_id.to_string(),
            level_id: level_id.to_string(),
            status: AccessRequestStatus::Pending,
            created_at: Utc::now(),
        });
        state.inserts += 1;
        Ok(id)
    }

    async fn list_requests_for_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<AccessRequest>, StoreError> {
        let state = self.state.lock().await;
        state.check_available()?;
        // Reverse insertion order, so ties on created_at still come out newest first.
        let mut requests: Vec<AccessRequest> = state
            .requests
            .iter()
            .rev()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.state.lock().await.check_available()
    }
}
