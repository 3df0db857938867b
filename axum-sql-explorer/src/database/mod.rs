//! Database abstraction layer
//!
//! This module provides the seam between the explorer and the relational
//! database: statements go in as SQL text plus positional parameters, rows come
//! back as JSON objects.

pub mod traits;

#[cfg(feature = "mysql")]
pub mod mysql;

// Re-export the main trait
pub use traits::DataSource;
