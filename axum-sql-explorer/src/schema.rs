//! Schema model built by reflection
//!
//! These types describe the tables, columns and keys of the reflected database.
//! They are immutable once reflection publishes them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Alias prefix of synthetic label columns; no real column may start with it
pub const LABEL_MARKER: &str = "$label$";

/// Reflected database schema
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Name of the database / project
    pub name: String,

    /// Driver flavor the schema was reflected from
    pub db_type: crate::DriverFlavor,

    /// Tables keyed by name
    pub tables: BTreeMap<String, Table>,
}

impl Schema {
    /// Look up a table by name
    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.get(name)
    }
}

/// A base table (views are never reflected)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub table_name: String,

    /// Columns keyed by name
    pub columns: BTreeMap<String, Column>,

    /// Primary key, a list for composite keys
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_column_name: Option<PrimaryKey>,

    pub meta: TableMeta,

    /// Column giving the row a human readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_column_name: Option<String>,

    /// Reverse foreign key mapping
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub referenced_by: Vec<ForeignKeyRef>,
}

impl Table {
    /// Columns in ascending ordinal position
    pub fn columns_by_ordinal(&self) -> Vec<&Column> {
        let mut columns: Vec<&Column> = self.columns.values().collect();
        columns.sort_by_key(|column| column.ordinal_position);
        columns
    }
}

/// Size and row estimates of a table
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMeta {
    /// Estimated number of rows, exact below the refinement threshold
    pub num_rows: Option<u64>,
    pub num_data_bytes: Option<u64>,
    pub num_index_bytes: Option<u64>,
    pub num_total_bytes: Option<u64>,
}

/// Primary key designation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Single(String),
    /// Composite key in ascending ordinal position
    Composite(Vec<String>),
}

impl PrimaryKey {
    /// Key column names in ordinal order
    pub fn columns(&self) -> Vec<&str> {
        match self {
            PrimaryKey::Single(name) => vec![name.as_str()],
            PrimaryKey::Composite(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

/// A column of a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub column_name: String,

    pub ordinal_position: u32,

    /// Declared type, e.g. `varchar(255)`
    pub column_type: String,

    /// Key flag as reported by the source (`PRI`, `UNI`, `MUL` or empty)
    pub column_key: String,

    pub column_default: Option<String>,

    pub is_nullable: bool,

    /// e.g. `auto_increment`
    pub extra: String,

    /// Table which the column belongs to
    pub table_name: String,

    /// Forward foreign key reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refers_to: Option<ForeignKeyRef>,
}

impl Column {
    pub fn is_primary(&self) -> bool {
        self.column_key == "PRI"
    }
}

/// One side of a foreign key constraint
///
/// On a column the source is that column and the destination is the referenced
/// table. In a table's `referenced_by` list the roles are inverted: the source is
/// the referenced column and the destination is the referencing table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub src_column_name: String,
    pub dest_table_name: String,
    pub dest_column_name: String,
}

impl ForeignKeyRef {
    /// The reference as seen from the other end of the constraint
    pub fn inverse(&self, src_table_name: &str) -> ForeignKeyRef {
        ForeignKeyRef {
            src_column_name: self.dest_column_name.clone(),
            dest_table_name: src_table_name.to_string(),
            dest_column_name: self.src_column_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_key_serializes_as_string_or_list() {
        let single = serde_json::to_value(PrimaryKey::Single("id".to_string())).unwrap();
        assert_eq!(single, serde_json::json!("id"));

        let composite =
            serde_json::to_value(PrimaryKey::Composite(vec!["a".to_string(), "b".to_string()])).unwrap();
        assert_eq!(composite, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_inverse_reference() {
        let forward = ForeignKeyRef {
            src_column_name: "user_id".to_string(),
            dest_table_name: "users".to_string(),
            dest_column_name: "id".to_string(),
        };
        let inverse = forward.inverse("orders");
        assert_eq!(inverse.src_column_name, "id");
        assert_eq!(inverse.dest_table_name, "orders");
        assert_eq!(inverse.dest_column_name, "user_id");
    }
}
