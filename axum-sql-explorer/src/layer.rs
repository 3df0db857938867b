//! ExplorerLayer - Main Axum integration layer
//!
//! This module provides the main entry point for integrating axum-sql-explorer
//! into an Axum application.

use crate::api::create_api_router;
use crate::database::traits::DataSource;
use crate::explorer::Explorer;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

#[cfg(feature = "mysql")]
use crate::{config::DbConfiguration, database::mysql::MySqlSource, Result};

/// Main layer for integrating the explorer into an Axum application
///
/// # Example
///
/// ```rust,no_run
/// use axum::Router;
/// use axum_sql_explorer::{DbConfiguration, ExplorerLayer};
/// use sqlx::MySqlPool;
///
/// # async fn example() {
/// let pool = MySqlPool::connect("mysql://root@localhost/shop").await.unwrap();
/// let explorer = ExplorerLayer::mysql("/explorer", pool, DbConfiguration::mysql("root", "", "shop")).unwrap();
/// let app = Router::new().merge(explorer.into_router());
/// # }
/// ```
pub struct ExplorerLayer<S: DataSource> {
    base_path: String,
    explorer: Arc<Explorer<S>>,
}

impl<S: DataSource> ExplorerLayer<S> {
    /// Create a new explorer layer at the given base path
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path where the API will be mounted (e.g., "/explorer")
    /// * `explorer` - The explorer session
    pub fn new(base_path: impl Into<String>, explorer: Explorer<S>) -> Self {
        Self {
            base_path: base_path.into(),
            explorer: Arc::new(explorer),
        }
    }

    /// Shared explorer session, e.g. to warm the schema cache at startup
    pub fn explorer(&self) -> Arc<Explorer<S>> {
        self.explorer.clone()
    }

    /// Convert into an Axum Router that can be merged
    ///
    /// The returned router serves the API endpoints at `{base_path}/api/*`
    /// behind permissive CORS middleware for development.
    pub fn into_router(self) -> Router {
        Router::new()
            .nest(&format!("{}/api", self.base_path), create_api_router(self.explorer))
            .layer(CorsLayer::permissive())
    }
}

#[cfg(feature = "mysql")]
impl ExplorerLayer<MySqlSource> {
    /// Create a new explorer layer for MySQL
    ///
    /// # Arguments
    ///
    /// * `base_path` - The URL path where the API will be mounted
    /// * `pool` - The MySQL connection pool
    /// * `config` - Database name and label overrides
    pub fn mysql(base_path: impl Into<String>, pool: sqlx::MySqlPool, config: DbConfiguration) -> Result<Self> {
        Ok(Self::new(base_path, Explorer::new(MySqlSource::new(pool), config)?))
    }
}
