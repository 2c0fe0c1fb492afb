use crate::config::ServerConfig;
use crate::service::AuthService;
use crate::store::{CredentialStore, PgCredentialStore};
use anyhow::Result;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<ServerConfig>,
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Create a new app state backed by PostgreSQL for credentials
    pub fn new(pool: PgPool, config: ServerConfig) -> Result<Self> {
        let store = Arc::new(PgCredentialStore::new(pool.clone()));
        Self::with_store(pool, config, store)
    }

    /// Create a new app state with a custom credential store
    pub fn with_store(
        pool: PgPool,
        config: ServerConfig,
        store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let auth = AuthService::new(store, &config.auth)?;
        Ok(Self {
            pool,
            config: Arc::new(config),
            auth: Arc::new(auth),
        })
    }
}
