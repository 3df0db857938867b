//! MySQL data source implementation

use crate::config::{DbConfiguration, DriverFlavor};
use crate::database::traits::{DataSource, DatabaseError, Row};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::mysql::{MySqlColumn, MySqlConnectOptions, MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// Connections kept by a pool opened through [`MySqlSource::connect`]
const MAX_CONNECTIONS: u32 = 10;

/// MySQL data source backed by a shared connection pool
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    /// Wrap an existing pool
    ///
    /// # Arguments
    ///
    /// * `pool` - MySQL connection pool
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Open a pool from configuration
    ///
    /// Any failure here is a configuration error: the parameters are wrong or
    /// the server cannot be reached at startup.
    pub async fn connect(config: &DbConfiguration) -> Result<Self> {
        config.validate()?;
        if config.db_type != DriverFlavor::Mysql {
            return Err(Error::Configuration(format!(
                "driver flavor {:?} is not supported by the MySQL data source",
                config.db_type
            )));
        }

        let mut options = MySqlConnectOptions::new()
            .host(&config.host)
            .username(&config.user)
            .password(&config.password)
            .database(&config.database);
        if let Some(port) = config.port {
            options = options.port(port);
        }

        let pool = MySqlPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .connect_with(options)
            .await
            .map_err(|error| Error::Configuration(format!("cannot open connection pool: {}", error)))?;

        tracing::info!(host = %config.host, database = %config.database, "connected to MySQL");
        Ok(Self::new(pool))
    }

    /// Underlying connection pool
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Convert a MySQL row to a JSON object
    fn row_to_json(row: &MySqlRow) -> std::result::Result<Row, DatabaseError> {
        let mut map = Row::new();

        for column in row.columns() {
            let value = Self::extract_column_value(row, column)?;
            map.insert(column.name().to_string(), value);
        }

        Ok(map)
    }

    /// Extract a column value from a MySQL row and convert to JSON
    fn extract_column_value(row: &MySqlRow, column: &MySqlColumn) -> std::result::Result<Value, DatabaseError> {
        let index = column.ordinal();

        if row.try_get_raw(index)?.is_null() {
            return Ok(Value::Null);
        }

        match column.type_info().name() {
            "BOOLEAN" => {
                if let Ok(value) = row.try_get::<bool, _>(index) {
                    return Ok(Value::Bool(value));
                }
            }
            "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
                if let Ok(value) = row.try_get::<i64, _>(index) {
                    return Ok(Value::Number(value.into()));
                }
            }
            "TINYINT UNSIGNED" | "SMALLINT UNSIGNED" | "MEDIUMINT UNSIGNED" | "INT UNSIGNED"
            | "BIGINT UNSIGNED" => {
                if let Ok(value) = row.try_get::<u64, _>(index) {
                    return Ok(Value::Number(value.into()));
                }
            }
            "FLOAT" | "DOUBLE" => {
                if let Ok(value) = row.try_get::<f64, _>(index) {
                    if let Some(number) = serde_json::Number::from_f64(value) {
                        return Ok(Value::Number(number));
                    }
                }
            }
            // Keep precision by passing decimals through as text
            "DECIMAL" => {
                if let Ok(value) = row.try_get_unchecked::<String, _>(index) {
                    return Ok(Value::String(value));
                }
            }
            "JSON" => {
                if let Ok(value) = row.try_get::<Value, _>(index) {
                    return Ok(value);
                }
            }
            "DATETIME" => {
                if let Ok(value) = row.try_get::<NaiveDateTime, _>(index) {
                    return Ok(Value::String(value.to_string()));
                }
            }
            "TIMESTAMP" => {
                if let Ok(value) = row.try_get::<DateTime<Utc>, _>(index) {
                    return Ok(Value::String(value.to_rfc3339()));
                }
            }
            "DATE" => {
                if let Ok(value) = row.try_get::<NaiveDate, _>(index) {
                    return Ok(Value::String(value.to_string()));
                }
            }
            "TIME" => {
                if let Ok(value) = row.try_get::<NaiveTime, _>(index) {
                    return Ok(Value::String(value.to_string()));
                }
            }
            _ => {
                if let Ok(value) = row.try_get::<String, _>(index) {
                    return Ok(Value::String(value));
                }
            }
        }

        // Fallback: try common types in order
        if let Ok(value) = row.try_get::<i64, _>(index) {
            return Ok(Value::Number(value.into()));
        }
        if let Ok(value) = row.try_get::<u64, _>(index) {
            return Ok(Value::Number(value.into()));
        }
        if let Ok(value) = row.try_get::<f64, _>(index) {
            if let Some(number) = serde_json::Number::from_f64(value) {
                return Ok(Value::Number(number));
            }
        }
        if let Ok(value) = row.try_get::<String, _>(index) {
            return Ok(Value::String(value));
        }
        if let Ok(value) = row.try_get::<Vec<u8>, _>(index) {
            return Ok(Value::String(match String::from_utf8(value) {
                Ok(text) => text,
                Err(error) => format!("[BLOB: {} bytes]", error.as_bytes().len()),
            }));
        }

        Err(DatabaseError::Serialization(format!(
            "unsupported value in column '{}' of type {}",
            column.name(),
            column.type_info().name()
        )))
    }
}

#[async_trait]
impl DataSource for MySqlSource {
    async fn fetch_all(&self, sql: &str, params: &[String]) -> std::result::Result<Vec<Row>, DatabaseError> {
        let mut query = sqlx::query(sql);
        for param in params {
            query = query.bind(param.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;

        rows.iter().map(Self::row_to_json).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_other_flavors() {
        let mut config = DbConfiguration::mysql("root", "secret", "shop");
        config.db_type = DriverFlavor::Postgresql;

        let result = MySqlSource::connect(&config).await;

        assert!(matches!(result, Err(Error::Configuration(ref message)) if message.contains("Postgresql")));
    }

    #[tokio::test]
    async fn test_connect_validates_before_connecting() {
        let config = DbConfiguration::mysql("", "secret", "shop");
        assert!(matches!(
            MySqlSource::connect(&config).await,
            Err(Error::Configuration(_))
        ));
    }
}
