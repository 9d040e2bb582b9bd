use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::http::StatusCode;
use validator::ValidationErrors;

use crate::metrics::record_access_request_outcome;
use crate::models::{
    normalize_level_name, AccessRequest, AccessRequestStatus, LevelAccessView,
};
use crate::services::store::{AccessRequestStore, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum AccessRequestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("level '{0}' not found")]
    LevelNotFound(String),
    #[error("beginner level is always accessible")]
    BeginnerAlwaysAccessible,
    #[error("user already has access to this level")]
    AlreadyHasAccess,
    #[error("pending access request already exists")]
    DuplicatePendingRequest,
    #[error("store failure: {0}")]
    StoreFailure(#[source] StoreError),
}

impl AccessRequestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessRequestError::InvalidInput(_) | AccessRequestError::BeginnerAlwaysAccessible => {
                StatusCode::BAD_REQUEST
            }
            AccessRequestError::LevelNotFound(_) => StatusCode::NOT_FOUND,
            AccessRequestError::AlreadyHasAccess | AccessRequestError::DuplicatePendingRequest => {
                StatusCode::CONFLICT
            }
            AccessRequestError::StoreFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client. Store details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AccessRequestError::InvalidInput(msg) => msg.clone(),
            AccessRequestError::LevelNotFound(_) => "Level not found".to_string(),
            AccessRequestError::BeginnerAlwaysAccessible => {
                "The beginner level is always accessible and does not require a request"
                    .to_string()
            }
            AccessRequestError::AlreadyHasAccess => {
                "You already have access to this level".to_string()
            }
            AccessRequestError::DuplicatePendingRequest => {
                "You already have a pending request for this level".to_string()
            }
            AccessRequestError::StoreFailure(_) => "Internal server error".to_string(),
        }
    }

    fn outcome_label(&self) -> &'static str {
        match self {
            AccessRequestError::InvalidInput(_) => "invalid_input",
            AccessRequestError::LevelNotFound(_) => "level_not_found",
            AccessRequestError::BeginnerAlwaysAccessible => "beginner",
            AccessRequestError::AlreadyHasAccess => "already_has_access",
            AccessRequestError::DuplicatePendingRequest => "duplicate_pending",
            AccessRequestError::StoreFailure(_) => "store_failure",
        }
    }
}

impl From<StoreError> for AccessRequestError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicatePending => AccessRequestError::DuplicatePendingRequest,
            other => {
                tracing::error!("Access request store failure: {:?}", other);
                AccessRequestError::StoreFailure(other)
            }
        }
    }
}

pub struct AccessRequestService {
    store: Arc<dyn AccessRequestStore>,
}

impl AccessRequestService {
    pub fn new(store: Arc<dyn AccessRequestStore>) -> Self {
        Self { store }
    }

    /// Files a pending request for `user_id` to unlock the level named
    /// `level_name_raw`, returning the new request id.
    ///
    /// Checks run in a fixed order and stop at the first failure; only the
    /// final step writes. The pending check and the insert are not atomic,
    /// so a concurrent duplicate is caught by the store's uniqueness rule
    /// and reported as [`AccessRequestError::DuplicatePendingRequest`].
    pub async fn request_access(
        &self,
        user_id: &str,
        level_name_raw: &str,
    ) -> Result<String, AccessRequestError> {
        let result = self.try_request_access(user_id, level_name_raw).await;

        match &result {
            Ok(request_id) => {
                record_access_request_outcome("created");
                tracing::info!(
                    "Access request {} created for user {} (level '{}')",
                    request_id,
                    user_id,
                    level_name_raw.trim()
                );
            }
            Err(err) => record_rejection(user_id, level_name_raw, err),
        }

        result
    }

    /// Classifies a payload that failed schema validation as `InvalidInput`
    /// and records it like any other rejected request.
    pub fn reject_invalid_payload(
        &self,
        user_id: &str,
        level_name_raw: &str,
        errors: &ValidationErrors,
    ) -> AccessRequestError {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|errs| errs.iter())
            .find_map(|err| err.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| "Level name is required".to_string());

        let err = AccessRequestError::InvalidInput(message);
        record_rejection(user_id, level_name_raw, &err);
        err
    }

    async fn try_request_access(
        &self,
        user_id: &str,
        level_name_raw: &str,
    ) -> Result<String, AccessRequestError> {
        let level_name = normalize_level_name(level_name_raw);
        if level_name.is_empty() {
            return Err(AccessRequestError::InvalidInput(
                "Level name is required".to_string(),
            ));
        }

        let level = self
            .store
            .find_level_by_name(&level_name)
            .await?
            .ok_or_else(|| AccessRequestError::LevelNotFound(level_name.clone()))?;

        if level.is_beginner() {
            return Err(AccessRequestError::BeginnerAlwaysAccessible);
        }

        if self.store.has_access(user_id, &level.id).await? {
            return Err(AccessRequestError::AlreadyHasAccess);
        }

        if self.store.has_pending_request(user_id, &level.id).await? {
            return Err(AccessRequestError::DuplicatePendingRequest);
        }

        let request_id = self
            .store
            .insert_pending_request(user_id, &level.id)
            .await?;

        Ok(request_id)
    }

    pub async fn list_requests(
        &self,
        user_id: &str,
    ) -> Result<Vec<AccessRequest>, AccessRequestError> {
        Ok(self.store.list_requests_for_user(user_id).await?)
    }

    /// Level catalog annotated with what `user_id` can open.
    ///
    /// `request_status` is the status of the user's most recent request for
    /// the level, if any.
    pub async fn list_levels(
        &self,
        user_id: &str,
    ) -> Result<Vec<LevelAccessView>, AccessRequestError> {
        let levels = self.store.list_levels().await?;
        let requests = self.store.list_requests_for_user(user_id).await?;

        let mut latest: HashMap<&str, AccessRequestStatus> = HashMap::new();
        let mut approved: HashSet<&str> = HashSet::new();
        for request in &requests {
            latest
                .entry(request.level_id.as_str())
                .or_insert(request.status);
            if request.status == AccessRequestStatus::Approved {
                approved.insert(request.level_id.as_str());
            }
        }

        Ok(levels
            .into_iter()
            .map(|level| {
                let accessible =
                    level.is_beginner() || approved.contains(level.id.as_str());
                let request_status = latest.get(level.id.as_str()).copied();
                LevelAccessView {
                    id: level.id,
                    name: level.name,
                    difficulty_level: level.difficulty_level,
                    accessible,
                    request_status,
                }
            })
            .collect())
    }
}

fn record_rejection(user_id: &str, level_name_raw: &str, err: &AccessRequestError) {
    record_access_request_outcome(err.outcome_label());
    tracing::warn!(
        "Access request rejected for user {} (level '{}'): {}",
        user_id,
        level_name_raw.trim(),
        err
    );
}
