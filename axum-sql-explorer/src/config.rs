//! Configuration consumed by the explorer
//!
//! Loading the file is left to the embedding server; these types only describe
//! its shape and validate it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::{Error, Result};

/// Database driver flavor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverFlavor {
    Mysql,
    Postgresql,
}

/// Data source connection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DbConfiguration {
    /// Driver flavor of the data source
    pub db_type: DriverFlavor,

    /// Host name (defaults to `localhost`)
    #[serde(default = "default_host")]
    pub host: String,

    /// Port (driver default when absent)
    #[serde(default)]
    pub port: Option<u16>,

    pub user: String,

    #[serde(default)]
    pub password: String,

    /// Database (schema) to reflect
    pub database: String,

    /// Label columns for tables whose label is not a `name|title|label` column
    #[serde(default)]
    pub table_label_columns: HashMap<String, String>,
}

fn default_host() -> String {
    "localhost".to_string()
}

impl DbConfiguration {
    /// Configuration for a MySQL database on localhost
    pub fn mysql(user: impl Into<String>, password: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            db_type: DriverFlavor::Mysql,
            host: default_host(),
            port: None,
            user: user.into(),
            password: password.into(),
            database: database.into(),
            table_label_columns: HashMap::new(),
        }
    }

    /// Add a label column override for a table
    pub fn with_label_column(mut self, table: impl Into<String>, column: impl Into<String>) -> Self {
        self.table_label_columns.insert(table.into(), column.into());
        self
    }

    /// Check the parameters that can be checked without connecting
    pub fn validate(&self) -> Result<()> {
        if self.database.trim().is_empty() {
            return Err(Error::Configuration("database name must not be empty".to_string()));
        }
        if self.user.trim().is_empty() {
            return Err(Error::Configuration("user must not be empty".to_string()));
        }
        if self.host.trim().is_empty() {
            return Err(Error::Configuration("host must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Address the example server listens on
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServeConfig {
    pub hostname: String,
    pub port: u16,
}

/// Complete server configuration file (`config.json`)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    pub serve: ServeConfig,
    pub db: DbConfiguration,
}

impl ServerConfig {
    /// Parse and validate a JSON configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        let config: ServerConfig = serde_json::from_str(text)
            .map_err(|error| Error::Configuration(format!("invalid configuration: {}", error)))?;
        config.db.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|error| {
            Error::Configuration(format!("cannot read {}: {}", path.display(), error))
        })?;
        Self::from_json(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_server_config() {
        let config = ServerConfig::from_json(
            r#"{
                "serve": { "hostname": "127.0.0.1", "port": 3000 },
                "db": {
                    "dbType": "mysql",
                    "user": "root",
                    "password": "secret",
                    "database": "shop",
                    "tableLabelColumns": { "orders": "reference" }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.serve.port, 3000);
        assert_eq!(config.db.db_type, DriverFlavor::Mysql);
        assert_eq!(config.db.host, "localhost");
        assert_eq!(config.db.port, None);
        assert_eq!(config.db.table_label_columns.get("orders").unwrap(), "reference");
    }

    #[test]
    fn test_empty_database_is_rejected() {
        let error = DbConfiguration::mysql("root", "", " ").validate().unwrap_err();
        assert!(matches!(error, Error::Configuration(_)));
    }

    #[test]
    fn test_malformed_json_is_configuration_error() {
        let error = ServerConfig::from_json("{ \"serve\": 1 }").unwrap_err();
        assert!(matches!(error, Error::Configuration(_)));
    }

    #[test]
    fn test_unknown_driver_flavor_is_rejected() {
        let error = ServerConfig::from_json(
            r#"{
                "serve": { "hostname": "127.0.0.1", "port": 3000 },
                "db": { "dbType": "oracle", "user": "root", "database": "shop" }
            }"#,
        )
        .unwrap_err();
        assert!(error.to_string().contains("invalid configuration"));
    }
}
