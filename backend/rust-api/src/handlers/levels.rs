use std::sync::Arc;

use axum::{extract::State, Extension, Json};
use serde::Serialize;

use crate::{
    middlewares::auth::JwtClaims,
    models::LevelAccessView,
    services::{
        access_request_service::{AccessRequestError, AccessRequestService},
        AppState,
    },
};

#[derive(Debug, Serialize)]
pub struct LevelsResponse {
    pub levels: Vec<LevelAccessView>,
}

/// Level catalog with per-user lock state.
pub async fn list_levels(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<LevelsResponse>, AccessRequestError> {
    let service = AccessRequestService::new(state.store.clone());
    let levels = service.list_levels(&claims.sub).await?;

    Ok(Json(LevelsResponse { levels }))
}
