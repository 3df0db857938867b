//! REST API endpoints
//!
//! Three operations cross the boundary: get-schema, run-select and
//! count-references. Every response uses the same envelope:
//!
//! ```json
//! { "status": "ok", "data": ... }
//! { "status": "error", "message": "Invalid tableName: 'nope'" }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::database::traits::DataSource;
use crate::explorer::Explorer;
use crate::Error;

pub mod rows;
pub mod tables;

// Re-export handlers for convenience
pub use rows::{count_references_handler, select_handler};
pub use tables::get_schema_handler;

/// Response envelope shared by every endpoint
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ApiResponse<T> {
    Ok { data: T },
    Error { message: String },
}

impl Error {
    /// HTTP status reported for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidTable(_) => StatusCode::NOT_FOUND,
            Error::Compilation(_) => StatusCode::BAD_REQUEST,
            Error::Configuration(_) | Error::DataSource(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Wrap an operation result in the envelope
pub(crate) fn envelope<T: Serialize>(operation: &str, result: crate::Result<T>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::Ok { data })).into_response(),
        Err(error) => {
            tracing::error!(%operation, %error, "api error");
            (
                error.status_code(),
                Json(ApiResponse::<T>::Error {
                    message: error.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Create the API router with all endpoints
///
/// # Arguments
///
/// * `explorer` - Arc-wrapped explorer session shared by all handlers
///
/// # Returns
///
/// An Axum Router configured with all API routes
pub fn create_api_router<S: DataSource>(explorer: Arc<Explorer<S>>) -> Router {
    Router::new()
        .route("/_dbSchema", get(tables::get_schema_handler::<S>))
        .route("/select", post(rows::select_handler::<S>))
        .route(
            "/refCount/{table_name}/{row_id}",
            get(rows::count_references_handler::<S>),
        )
        .with_state(explorer)
}
