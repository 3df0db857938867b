//! Query planning
//!
//! Turns a [`SelectQuery`] into a compiled statement with a parallel parameter
//! list, then runs it. Foreign key columns get an extra correlated sub-select
//! that looks up the label of the referenced row.

use crate::compiler::{
    compile, escape_identifier, escape_member_access, ColumnClause, FromClause, OrderClause,
    Predicate, SelectClause,
};
use crate::database::traits::DataSource;
use crate::query::{SelectQuery, SelectResult, WhereFilter};
use crate::schema::{Schema, Table, LABEL_MARKER};
use crate::{Error, Result};

/// Row limit when the descriptor gives none
pub const DEFAULT_LIMIT: u64 = 300;

/// Positional parameter placeholder
pub const PLACEHOLDER: &str = "?";

const NULLARY_OPERATORS: [&str; 2] = ["is null", "is not null"];

const BINARY_OPERATORS: [&str; 9] = ["=", "!=", "<>", "<", "<=", ">", ">=", "like", "not like"];

const AGGREGATE_FUNCTIONS: [&str; 5] = ["count", "sum", "avg", "min", "max"];

/// SQL text plus the values bound to its placeholders, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedStatement {
    pub sql: String,
    pub params: Vec<String>,
}

/// Plan and run a select, deriving result columns from the returned rows
///
/// An empty result carries no column names.
pub async fn select_from_table<S: DataSource + ?Sized>(
    source: &S,
    schema: &Schema,
    query: &SelectQuery,
) -> Result<SelectResult> {
    let statement = plan_select(schema, query)?;
    let rows = source.fetch_all(&statement.sql, &statement.params).await?;

    let columns = rows
        .first()
        .map(|row| row.keys().cloned().collect())
        .unwrap_or_default();

    Ok(SelectResult {
        columns,
        rows: rows.into_iter().map(serde_json::Value::Object).collect(),
    })
}

/// Compile a descriptor against the schema without touching the database
pub fn plan_select(schema: &Schema, query: &SelectQuery) -> Result<PlannedStatement> {
    let table = schema
        .table(&query.from)
        .ok_or_else(|| Error::InvalidTable(query.from.clone()))?;

    check_field_names(query)?;

    let mut group_by = Vec::new();
    let mut selected: Vec<String> = Vec::new();
    let mut columns = Vec::new();

    if let Some(aggregate) = &query.aggregate {
        let math = aggregate.math.trim().to_lowercase();
        if !AGGREGATE_FUNCTIONS.contains(&math.as_str()) {
            return Err(Error::Compilation(format!(
                "unsupported aggregate function '{}'",
                aggregate.math
            )));
        }

        let (target, alias) = match &aggregate.on {
            Some(on) => (escape_member_access(on)?, format!("{}_{}", math, on)),
            None => ("*".to_string(), math.clone()),
        };

        if !aggregate.group_by.is_empty() {
            selected.extend(aggregate.group_by.iter().cloned());
            group_by = aggregate.group_by.clone();
        }
        columns.extend(selected.iter().map(|name| ColumnClause::identifier(name.as_str())));
        columns.push(ColumnClause::expr_as(format!("{}({})", math, target), alias));
    } else {
        selected = match &query.select {
            Some(select) if !select.is_empty() => select.clone(),
            _ => table
                .columns_by_ordinal()
                .into_iter()
                .map(|column| column.column_name.clone())
                .collect(),
        };
        columns.extend(selected.iter().map(|name| ColumnClause::identifier(name.as_str())));
    }

    columns.extend(label_columns(schema, table, &selected));

    let mut params = Vec::new();
    let filters = query
        .filters
        .iter()
        .flatten()
        .map(|filter| translate_filter(filter, &mut params))
        .collect::<Result<Vec<_>>>()?;

    let order_by = query
        .order_by
        .iter()
        .flatten()
        .map(|order| OrderClause {
            field: order.field.clone(),
            order: order.order,
        })
        .collect();

    let clause = SelectClause {
        from: Some(FromClause::Table(table.table_name.clone())),
        columns,
        filters,
        group_by,
        order_by,
        limit: Some(query.limit.unwrap_or(DEFAULT_LIMIT)),
        offset: query.offset,
    };

    let sql = compile(&clause, false)?;
    tracing::debug!(table = %table.table_name, %sql, ?params, "planned select");

    Ok(PlannedStatement { sql, params })
}

/// One correlated label lookup per selected foreign key column
fn label_columns(schema: &Schema, table: &Table, selected: &[String]) -> Vec<ColumnClause> {
    let mut lookups = Vec::new();

    for name in selected {
        let Some(reference) = table
            .columns
            .get(name)
            .and_then(|column| column.refers_to.as_ref())
        else {
            continue;
        };
        let Some(label_column) = schema
            .table(&reference.dest_table_name)
            .and_then(|dest| dest.name_column_name.as_ref())
        else {
            continue;
        };

        let alias = format!("t{}", lookups.len() + 1);
        let lookup = SelectClause {
            from: Some(FromClause::Aliased {
                table: reference.dest_table_name.clone(),
                alias: alias.clone(),
            }),
            columns: vec![ColumnClause::identifier(format!("{}.{}", alias, label_column))],
            filters: vec![Predicate::new(
                format!("{}.{}", alias, reference.dest_column_name),
                "=",
                format!(
                    "{}.{}",
                    escape_identifier(&table.table_name),
                    escape_identifier(&reference.src_column_name)
                ),
            )],
            ..SelectClause::default()
        };

        lookups.push(ColumnClause::select_as(
            lookup,
            format!("{}{}", LABEL_MARKER, reference.src_column_name),
        ));
    }

    lookups
}

/// Turn a UI filter into a predicate, collecting its parameter
fn translate_filter(filter: &WhereFilter, params: &mut Vec<String>) -> Result<Predicate> {
    let op = filter.op.trim().to_lowercase();

    if let Some(nullary) = NULLARY_OPERATORS.iter().find(|candidate| **candidate == op) {
        return Ok(Predicate::nullary(filter.field.as_str(), *nullary));
    }

    let Some(binary) = BINARY_OPERATORS.iter().find(|candidate| **candidate == op) else {
        return Err(Error::Compilation(format!("unsupported operator '{}'", filter.op)));
    };

    let Some(value) = &filter.value else {
        return Err(Error::Compilation(format!(
            "operator '{}' on '{}' needs a value",
            filter.op, filter.field
        )));
    };

    if *binary == "like" && !value.contains('%') {
        params.push(format!("%{}%", value));
    } else {
        params.push(value.clone());
    }

    Ok(Predicate::new(filter.field.as_str(), *binary, PLACEHOLDER))
}

/// Names in the descriptor may never use the label marker
fn check_field_names(query: &SelectQuery) -> Result<()> {
    let aggregate_names = query.aggregate.iter().flat_map(|aggregate| {
        aggregate.on.iter().chain(aggregate.group_by.iter())
    });

    let names = query
        .select
        .iter()
        .flatten()
        .chain(query.filters.iter().flatten().map(|filter| &filter.field))
        .chain(query.order_by.iter().flatten().map(|order| &order.field))
        .chain(aggregate_names);

    for name in names {
        if name.starts_with(LABEL_MARKER) {
            return Err(Error::Compilation(format!(
                "'{}' uses the reserved prefix '{}'",
                name, LABEL_MARKER
            )));
        }
    }

    Ok(())
}
