#![allow(dead_code)]

use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use level_access_api::{
    config::Config,
    create_router,
    middlewares::auth::{JwtClaims, JwtService},
    models::Level,
    services::{store::MemoryAccessRequestStore, AppState},
};
use std::sync::Arc;
use tower::ServiceExt;

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryAccessRequestStore>,
    pub config: Config,
}

pub fn create_test_app() -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let config = Config::for_tests();
    let store = Arc::new(MemoryAccessRequestStore::with_levels(seed_levels()));
    let app_state = Arc::new(AppState::with_store(config.clone(), store.clone()));

    TestApp {
        router: create_router(app_state),
        store,
        config,
    }
}

fn seed_levels() -> Vec<Level> {
    [
        ("L1", "Beginner", 1),
        ("L2", "Flyers", 3),
        ("L3", "Movers", 2),
        ("L4", "Pet", 4),
    ]
    .into_iter()
    .map(|(id, name, difficulty_level)| Level {
        id: id.to_string(),
        name: name.to_string(),
        difficulty_level,
    })
    .collect()
}

impl TestApp {
    pub fn token_for(&self, user_id: &str) -> String {
        let now = chrono::Utc::now().timestamp();
        JwtService::new(&self.config.jwt_secret)
            .generate_token(&JwtClaims {
                sub: user_id.to_string(),
                role: "student".to_string(),
                exp: (now + 3600) as usize,
                iat: now as usize,
            })
            .unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or_else(|_| {
                serde_json::Value::String(String::from_utf8_lossy(&body).to_string())
            })
        };
        (status, json)
    }

    pub async fn request_access(
        &self,
        user_id: &str,
        body: serde_json::Value,
    ) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri("/api/v1/access-requests")
                .header("content-type", "application/json")
                .header("authorization", format!("Bearer {}", self.token_for(user_id)))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get_as(&self, user_id: &str, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::builder()
                .method("GET")
                .uri(uri)
                .header("authorization", format!("Bearer {}", self.token_for(user_id)))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}
