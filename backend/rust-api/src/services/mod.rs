use std::sync::Arc;

use crate::config::Config;
use mongodb::Client as MongoClient;

use store::{AccessRequestStore, MongoAccessRequestStore};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn AccessRequestStore>,
}

impl AppState {
    pub async fn new(config: Config, mongo_client: MongoClient) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);
        let store = MongoAccessRequestStore::new(mongo);

        tracing::info!("Checking MongoDB connection...");

        tokio::time::timeout(std::time::Duration::from_secs(5), store.ping())
            .await
            .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 5s"))??;

        store.ensure_indexes().await?;

        tracing::info!("MongoDB connection established successfully");

        Ok(Self::with_store(config, Arc::new(store)))
    }

    /// Builds state over an existing store, e.g. the in-memory one in tests.
    pub fn with_store(config: Config, store: Arc<dyn AccessRequestStore>) -> Self {
        Self { config, store }
    }
}

pub mod access_request_service;
pub mod store;
