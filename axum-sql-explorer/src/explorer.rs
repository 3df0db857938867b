//! Explorer session
//!
//! An [`Explorer`] bundles the data source, its configuration and the cached
//! schema, and is threaded through every call instead of process globals.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::OnceCell;

use crate::config::DbConfiguration;
use crate::database::traits::DataSource;
use crate::planner::select_from_table;
use crate::query::{SelectQuery, SelectResult};
use crate::references::count_foreign_references;
use crate::reflect::reflect;
use crate::schema::Schema;
use crate::Result;

#[cfg(feature = "mysql")]
use crate::database::mysql::MySqlSource;

/// Explorer over one database
///
/// The schema is reflected on first use and cached for the lifetime of the
/// explorer. Concurrent first callers share a single reflection pass; a failed
/// pass caches nothing and the next caller retries.
pub struct Explorer<S: DataSource> {
    source: S,
    config: DbConfiguration,
    schema: OnceCell<Arc<Schema>>,
}

impl<S: DataSource> Explorer<S> {
    /// Create an explorer over a data source
    ///
    /// # Arguments
    ///
    /// * `source` - Data source executing statements
    /// * `config` - Connection parameters and label overrides
    pub fn new(source: S, config: DbConfiguration) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            source,
            config,
            schema: OnceCell::new(),
        })
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &DbConfiguration {
        &self.config
    }

    /// Cached schema, reflecting it on first access
    pub async fn schema(&self) -> Result<Arc<Schema>> {
        self.schema
            .get_or_try_init(|| async { reflect(&self.source, &self.config).await.map(Arc::new) })
            .await
            .cloned()
    }

    /// Run a descriptor-based select
    pub async fn select(&self, query: &SelectQuery) -> Result<SelectResult> {
        let schema = self.schema().await?;
        select_from_table(&self.source, &schema, query).await
    }

    /// Count the rows referencing `row_id` in `table_name`
    pub async fn count_references(&self, table_name: &str, row_id: &str) -> Result<BTreeMap<String, i64>> {
        let schema = self.schema().await?;
        count_foreign_references(&self.source, &schema, table_name, row_id).await
    }
}

#[cfg(feature = "mysql")]
impl Explorer<MySqlSource> {
    /// Open a MySQL pool from configuration and wrap it
    pub async fn connect(config: DbConfiguration) -> Result<Self> {
        let source = MySqlSource::connect(&config).await?;
        Self::new(source, config)
    }
}
