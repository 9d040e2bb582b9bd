use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use serde_json::json;
use validator::Validate;

use crate::{
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::{AccessRequestView, CreateAccessRequestPayload, CreateAccessRequestResponse},
    services::{
        access_request_service::{AccessRequestError, AccessRequestService},
        AppState,
    },
};

#[derive(Debug, Serialize)]
pub struct AccessRequestsResponse {
    pub requests: Vec<AccessRequestView>,
}

impl IntoResponse for AccessRequestError {
    fn into_response(self) -> Response {
        (self.status_code(), Json(json!({ "error": self.public_message() }))).into_response()
    }
}

pub async fn create_access_request(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(payload): AppJson<CreateAccessRequestPayload>,
) -> Result<impl IntoResponse, AccessRequestError> {
    let service = AccessRequestService::new(state.store.clone());

    if let Err(errors) = payload.validate() {
        return Err(service.reject_invalid_payload(&claims.sub, &payload.level, &errors));
    }

    let request_id = service.request_access(&claims.sub, &payload.level).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateAccessRequestResponse {
            success: true,
            request_id,
            message: "Access request submitted and awaiting approval".to_string(),
        }),
    ))
}

pub async fn list_access_requests(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<Json<AccessRequestsResponse>, AccessRequestError> {
    let service = AccessRequestService::new(state.store.clone());
    let requests = service.list_requests(&claims.sub).await?;

    Ok(Json(AccessRequestsResponse {
        requests: requests.into_iter().map(AccessRequestView::from).collect(),
    }))
}
