//! Schema endpoint

use axum::{extract::State, response::Response};
use std::sync::Arc;

use crate::api::envelope;
use crate::database::traits::DataSource;
use crate::explorer::Explorer;

/// Handler for GET /api/_dbSchema
///
/// Returns the reflected schema: tables, columns, primary and foreign keys,
/// label columns and row estimates. The first call reflects the database,
/// later calls are served from the cache.
///
/// # Arguments
///
/// * `explorer` - Explorer session from state
///
/// # Returns
///
/// Envelope containing the schema
pub async fn get_schema_handler<S: DataSource>(State(explorer): State<Arc<Explorer<S>>>) -> Response {
    envelope("get-schema", explorer.schema().await)
}
