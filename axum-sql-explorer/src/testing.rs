//! In-memory data source for unit tests
//!
//! Serves canned rows keyed on SQL fragments and records every statement with
//! its parameters.

use crate::config::DbConfiguration;
use crate::database::traits::{DataSource, DatabaseError, Row};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Mutex;
use std::time::Duration;

pub(crate) const TABLES_NEEDLE: &str = "`information_schema`.`tables`";
pub(crate) const COLUMNS_NEEDLE: &str = "`information_schema`.`columns`";
pub(crate) const REFERENCES_NEEDLE: &str = "`information_schema`.`key_column_usage`";
pub(crate) const ROW_COUNT_NEEDLE: &str = "(SELECT count(*) FROM";

#[derive(Default)]
pub(crate) struct RecordingSource {
    /// Later entries win when several needles match
    responses: Vec<(String, Vec<Row>)>,
    failures: Vec<String>,
    delay: Option<Duration>,
    statements: Mutex<Vec<(String, Vec<String>)>>,
}

impl RecordingSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn respond(mut self, needle: &str, rows: Vec<Value>) -> Self {
        self.responses
            .push((needle.to_string(), rows.into_iter().map(row).collect()));
        self
    }

    pub(crate) fn fail_on(mut self, needle: &str) -> Self {
        self.failures.push(needle.to_string());
        self
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn statements(&self) -> Vec<(String, Vec<String>)> {
        self.statements.lock().unwrap().clone()
    }

    pub(crate) fn count_matching(&self, needle: &str) -> usize {
        self.statements()
            .iter()
            .filter(|(sql, _)| sql.contains(needle))
            .count()
    }
}

#[async_trait]
impl DataSource for RecordingSource {
    async fn fetch_all(&self, sql: &str, params: &[String]) -> Result<Vec<Row>, DatabaseError> {
        self.statements
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(needle) = self.failures.iter().find(|needle| sql.contains(needle.as_str())) {
            return Err(DatabaseError::Query(format!("statement failed: {}", needle)));
        }

        Ok(self
            .responses
            .iter()
            .rev()
            .find(|(needle, _)| sql.contains(needle.as_str()))
            .map(|(_, rows)| rows.clone())
            .unwrap_or_default())
    }
}

pub(crate) fn row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        other => panic!("test row must be an object, got {}", other),
    }
}

pub(crate) fn shop_config() -> DbConfiguration {
    DbConfiguration::mysql("root", "secret", "shop").with_label_column("orders", "status")
}

/// Introspection fixture of a small shop database
///
/// - `order_items` has a composite key whose rows arrive out of ordinal order
/// - `users` has two label candidates, the later ordinal arriving first
/// - `order_summary` is a view and only shows up in columns and references
/// - `orders` is above the exact row count threshold
pub(crate) fn shop_source() -> RecordingSource {
    RecordingSource::new()
        .respond(
            TABLES_NEEDLE,
            vec![
                json!({ "TABLE_NAME": "users", "TABLE_ROWS": 3, "DATA_LENGTH": 16384, "INDEX_LENGTH": 0 }),
                json!({ "TABLE_NAME": "products", "TABLE_ROWS": 2, "DATA_LENGTH": 16384, "INDEX_LENGTH": 16384 }),
                json!({ "TABLE_NAME": "orders", "TABLE_ROWS": 50000, "DATA_LENGTH": 4194304, "INDEX_LENGTH": 1048576 }),
                json!({ "TABLE_NAME": "order_items", "TABLE_ROWS": 4, "DATA_LENGTH": 16384, "INDEX_LENGTH": 32768 }),
            ],
        )
        .respond(
            COLUMNS_NEEDLE,
            vec![
                column("users", "id", 1, "int", "PRI", "NO", "auto_increment"),
                column("users", "email", 2, "varchar(255)", "UNI", "NO", ""),
                column("users", "nickname", 4, "varchar(64)", "", "YES", ""),
                column("users", "full_name", 3, "varchar(255)", "", "NO", ""),
                column("products", "id", 1, "int", "PRI", "NO", "auto_increment"),
                column("products", "Title", 2, "varchar(255)", "", "NO", ""),
                column("products", "price", 3, "decimal(10,2)", "", "NO", ""),
                column("orders", "id", 1, "int", "PRI", "NO", "auto_increment"),
                column("orders", "user_id", 2, "int", "MUL", "YES", ""),
                column("orders", "product_id", 3, "int", "MUL", "YES", ""),
                column("orders", "status", 4, "varchar(32)", "", "NO", ""),
                column("orders", "total", 5, "decimal(10,2)", "", "NO", ""),
                column("order_items", "order_id", 2, "int", "PRI", "NO", ""),
                column("order_items", "product_id", 1, "int", "PRI", "NO", ""),
                column("order_items", "quantity", 3, "int", "", "NO", ""),
                column("order_summary", "user_id", 1, "int", "", "YES", ""),
            ],
        )
        .respond(
            REFERENCES_NEEDLE,
            vec![
                reference("orders", "user_id", "users", "id"),
                reference("orders", "product_id", "products", "id"),
                reference("order_items", "order_id", "orders", "id"),
                reference("order_items", "product_id", "products", "id"),
                reference("order_summary", "user_id", "users", "id"),
            ],
        )
        .respond(
            ROW_COUNT_NEEDLE,
            vec![json!({ "order_items": 9, "products": 7, "users": 5 })],
        )
}

fn column(
    table: &str,
    name: &str,
    ordinal: u32,
    column_type: &str,
    key: &str,
    nullable: &str,
    extra: &str,
) -> Value {
    json!({
        "TABLE_NAME": table,
        "COLUMN_NAME": name,
        "ORDINAL_POSITION": ordinal,
        "COLUMN_TYPE": column_type,
        "COLUMN_KEY": key,
        "COLUMN_DEFAULT": null,
        "IS_NULLABLE": nullable,
        "EXTRA": extra,
    })
}

fn reference(table: &str, column: &str, referenced_table: &str, referenced_column: &str) -> Value {
    json!({
        "TABLE_NAME": table,
        "COLUMN_NAME": column,
        "REFERENCED_TABLE_NAME": referenced_table,
        "REFERENCED_COLUMN_NAME": referenced_column,
    })
}
