//! Data source trait
//!
//! This trait defines the interface that every database backend must provide.

use async_trait::async_trait;
use thiserror::Error;

/// A result row, columns in the order the database returned them
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Data source executing compiled statements
///
/// Implementations borrow a connection from their pool for every call. The
/// explorer never holds a connection across calls and never locks.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Execute a statement and fetch every row
    ///
    /// # Arguments
    ///
    /// * `sql` - Statement text with `?` placeholders
    /// * `params` - Values bound to the placeholders, in order
    ///
    /// # Returns
    ///
    /// All result rows as JSON objects
    async fn fetch_all(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, DatabaseError>;
}

/// Database error type
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Generic database error
    #[error("Database error: {0}")]
    Query(String),

    /// A row did not have the expected shape
    #[error("Unexpected row shape: {0}")]
    UnexpectedRow(String),

    /// Value could not be converted to JSON
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sqlx::Error> for DatabaseError {
    fn from(error: sqlx::Error) -> Self {
        DatabaseError::Query(error.to_string())
    }
}
