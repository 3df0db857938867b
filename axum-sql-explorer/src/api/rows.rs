//! Select and reference count endpoints

use axum::{
    extract::{Path, State},
    response::{Json, Response},
};
use std::sync::Arc;

use crate::api::envelope;
use crate::database::traits::DataSource;
use crate::explorer::Explorer;
use crate::query::SelectQuery;

/// Handler for POST /api/select
///
/// Runs a query descriptor against one table.
///
/// Request body:
/// ```json
/// {
///   "from": "orders",
///   "where": [{ "field": "status", "op": "like", "value": "ship" }],
///   "orderBy": [{ "field": "id", "order": "desc" }],
///   "limit": 50
/// }
/// ```
///
/// Response:
/// ```json
/// {
///   "status": "ok",
///   "data": {
///     "columns": ["id", "user_id", "status", "$label$user_id"],
///     "rows": [...]
///   }
/// }
/// ```
pub async fn select_handler<S: DataSource>(
    State(explorer): State<Arc<Explorer<S>>>,
    Json(query): Json<SelectQuery>,
) -> Response {
    tracing::info!(table = %query.from, "select");
    envelope("run-select", explorer.select(&query).await)
}

/// Handler for GET /api/refCount/{table_name}/{row_id}
///
/// Counts the rows of every referencing table that point at `row_id`, keyed
/// `<table>.<column>`.
pub async fn count_references_handler<S: DataSource>(
    State(explorer): State<Arc<Explorer<S>>>,
    Path((table_name, row_id)): Path<(String, String)>,
) -> Response {
    envelope(
        "count-references",
        explorer.count_references(&table_name, &row_id).await,
    )
}
