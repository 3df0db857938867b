//! Reverse reference counts
//!
//! Counts, for one row, how many rows of every referencing table point at it,
//! using a single statement with one correlated `count(*)` per reference.

use std::collections::BTreeMap;

use crate::compiler::{compile, ColumnClause, Predicate, SelectClause};
use crate::database::traits::{DataSource, DatabaseError};
use crate::planner::{PlannedStatement, PLACEHOLDER};
use crate::schema::Schema;
use crate::{Error, Result};

/// Build the count statement, `None` when nothing references the table
pub fn plan_reference_count(
    schema: &Schema,
    table_name: &str,
    row_id: &str,
) -> Result<Option<PlannedStatement>> {
    let table = schema
        .table(table_name)
        .ok_or_else(|| Error::InvalidTable(table_name.to_string()))?;

    if table.referenced_by.is_empty() {
        return Ok(None);
    }

    let clause = SelectClause {
        columns: table
            .referenced_by
            .iter()
            .map(|reference| {
                ColumnClause::select_as(
                    SelectClause {
                        columns: vec![ColumnClause::expr("count(*)")],
                        filters: vec![Predicate::new(
                            reference.dest_column_name.as_str(),
                            "=",
                            PLACEHOLDER,
                        )],
                        ..SelectClause::from_table(reference.dest_table_name.as_str())
                    },
                    format!("{}.{}", reference.dest_table_name, reference.dest_column_name),
                )
            })
            .collect(),
        ..SelectClause::default()
    };

    Ok(Some(PlannedStatement {
        sql: compile(&clause, false)?,
        params: vec![row_id.to_string(); table.referenced_by.len()],
    }))
}

/// Count rows referencing `row_id`, keyed `<table>.<column>`
pub async fn count_foreign_references<S: DataSource + ?Sized>(
    source: &S,
    schema: &Schema,
    table_name: &str,
    row_id: &str,
) -> Result<BTreeMap<String, i64>> {
    let Some(statement) = plan_reference_count(schema, table_name, row_id)? else {
        return Ok(BTreeMap::new());
    };
    tracing::debug!(table = %table_name, sql = %statement.sql, "counting references");

    let rows = source.fetch_all(&statement.sql, &statement.params).await?;
    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| DatabaseError::UnexpectedRow("reference count returned no row".to_string()))?;

    row.into_iter()
        .map(|(key, value)| -> Result<(String, i64)> {
            let count = match &value {
                serde_json::Value::Number(number) => number.as_i64(),
                serde_json::Value::String(text) => text.parse().ok(),
                _ => None,
            }
            .ok_or_else(|| DatabaseError::UnexpectedRow(format!("count '{}' is not a number", key)))?;
            Ok((key, count))
        })
        .collect()
}
