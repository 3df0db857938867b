//! Query descriptor types
//!
//! A `SelectQuery` is what the UI sends instead of SQL text. The planner turns
//! it into a compiled, parameterized statement.

use serde::{Deserialize, Serialize};

/// Declarative select over a single table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectQuery {
    /// Table to select from
    pub from: String,

    /// Explicit column list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,

    /// Filters, joined with AND
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filters: Option<Vec<WhereFilter>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_by: Option<Vec<OrderByField>>,

    /// Row limit, 300 when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,

    /// Row offset, used with limit to paginate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u64>,
}

impl SelectQuery {
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            from: table.into(),
            ..Self::default()
        }
    }
}

/// A single `field op value` predicate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhereFilter {
    pub field: String,
    pub op: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl WhereFilter {
    pub fn new(field: impl Into<String>, op: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value: Some(value.into()),
        }
    }

    /// Predicate without a value, e.g. `is null`
    pub fn nullary(field: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value: None,
        }
    }
}

/// Aggregate function over the table, optionally grouped
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregate {
    /// Function name, e.g. `count` or `sum`
    pub math: String,

    /// Target column, `*` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<String>,

    #[serde(default)]
    pub group_by: Vec<String>,
}

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderByField {
    pub field: String,
    pub order: SortOrder,
}

/// Rows returned by a planned select
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectResult {
    /// Column names in the result, taken from the first row
    pub columns: Vec<String>,

    pub rows: Vec<serde_json::Value>,
}
