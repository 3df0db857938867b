//! Schema reflection
//!
//! Builds a [`Schema`] from `information_schema`: base tables, their columns,
//! primary keys, foreign keys in both directions, label columns and row counts.
//! Reflection is all-or-nothing; any failing statement fails the whole pass.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

use crate::compiler::{compile, ColumnClause, Predicate, SelectClause};
use crate::config::DbConfiguration;
use crate::database::traits::{DataSource, DatabaseError, Row};
use crate::schema::{Column, ForeignKeyRef, PrimaryKey, Schema, Table, TableMeta, LABEL_MARKER};
use crate::{Error, Result};

/// Tables estimated below this many rows get an exact `count(*)`
pub const ACCURATE_ROW_COUNT_LIMIT: u64 = 10_000;

/// Column name suffixes that mark a human readable label
const LABEL_SUFFIXES: [&str; 3] = ["name", "title", "label"];

/// Introspect the configured database and build its schema
///
/// The three catalog statements run concurrently; the exact row count pass
/// runs after them since it needs the table list.
pub async fn reflect<S: DataSource + ?Sized>(source: &S, config: &DbConfiguration) -> Result<Schema> {
    tracing::info!(database = %config.database, "reflecting schema");

    let tables_sql = compile(&tables_clause(), false)?;
    let columns_sql = compile(&columns_clause(), false)?;
    let references_sql = compile(&references_clause(), false)?;
    let params = vec![config.database.clone()];
    // both ends of a foreign key must live in the reflected database
    let reference_params = vec![config.database.clone(), config.database.clone()];

    let (table_rows, column_rows, reference_rows) = tokio::try_join!(
        source.fetch_all(&tables_sql, &params),
        source.fetch_all(&columns_sql, &params),
        source.fetch_all(&references_sql, &reference_params),
    )?;

    let mut schema = build_schema(config, &table_rows, &column_rows, &reference_rows)?;
    refine_row_counts(source, &mut schema).await?;

    tracing::info!(
        database = %schema.name,
        tables = schema.tables.len(),
        "schema reflected"
    );
    Ok(schema)
}

fn tables_clause() -> SelectClause {
    SelectClause {
        columns: ["table_name", "table_rows", "data_length", "index_length"]
            .into_iter()
            .map(ColumnClause::identifier)
            .collect(),
        filters: vec![
            Predicate::new("table_schema", "=", "?"),
            Predicate::new("table_type", "=", "'BASE TABLE'"),
        ],
        ..SelectClause::from_table("information_schema.tables")
    }
}

fn columns_clause() -> SelectClause {
    SelectClause {
        columns: [
            "table_name",
            "column_name",
            "ordinal_position",
            "column_type",
            "column_key",
            "column_default",
            "is_nullable",
            "extra",
        ]
        .into_iter()
        .map(ColumnClause::identifier)
        .collect(),
        filters: vec![Predicate::new("table_schema", "=", "?")],
        ..SelectClause::from_table("information_schema.columns")
    }
}

fn references_clause() -> SelectClause {
    SelectClause {
        columns: [
            "table_name",
            "column_name",
            "referenced_table_name",
            "referenced_column_name",
        ]
        .into_iter()
        .map(ColumnClause::identifier)
        .collect(),
        filters: vec![
            Predicate::new("table_schema", "=", "?"),
            Predicate::new("referenced_table_schema", "=", "?"),
        ],
        ..SelectClause::from_table("information_schema.key_column_usage")
    }
}

/// Assemble the schema from the three catalog listings
pub fn build_schema(
    config: &DbConfiguration,
    table_rows: &[Row],
    column_rows: &[Row],
    reference_rows: &[Row],
) -> Result<Schema> {
    let mut tables = BTreeMap::new();

    for row in table_rows {
        let table_name = required_text(row, "table_name")?;
        let num_data_bytes = number(row, "data_length");
        let num_index_bytes = number(row, "index_length");
        let num_total_bytes = match (num_data_bytes, num_index_bytes) {
            (Some(data), Some(index)) => Some(data + index),
            (data, index) => data.or(index),
        };

        tables.insert(
            table_name.clone(),
            Table {
                columns: BTreeMap::new(),
                primary_column_name: None,
                meta: TableMeta {
                    num_rows: number(row, "table_rows"),
                    num_data_bytes,
                    num_index_bytes,
                    num_total_bytes,
                },
                name_column_name: config
                    .table_label_columns
                    .get(&table_name)
                    .filter(|label| !label.trim().is_empty())
                    .cloned(),
                referenced_by: Vec::new(),
                table_name,
            },
        );
    }

    let mut primary_columns: HashMap<String, Vec<(u32, String)>> = HashMap::new();

    for row in column_rows {
        let table_name = required_text(row, "table_name")?;
        let Some(table) = tables.get_mut(&table_name) else {
            // could be a view, skip it
            continue;
        };

        let column = Column {
            column_name: required_text(row, "column_name")?,
            ordinal_position: number(row, "ordinal_position").unwrap_or(0) as u32,
            column_type: text(row, "column_type").unwrap_or_default(),
            column_key: text(row, "column_key").unwrap_or_default(),
            column_default: text(row, "column_default"),
            is_nullable: is_nullable(field(row, "is_nullable")),
            extra: text(row, "extra").unwrap_or_default(),
            table_name: table_name.clone(),
            refers_to: None,
        };

        if column.column_name.starts_with(LABEL_MARKER) {
            return Err(Error::Compilation(format!(
                "column '{}.{}' uses the reserved prefix '{}'",
                table_name, column.column_name, LABEL_MARKER
            )));
        }

        if column.is_primary() {
            primary_columns
                .entry(table_name)
                .or_default()
                .push((column.ordinal_position, column.column_name.clone()));
        }

        table.columns.insert(column.column_name.clone(), column);
    }

    for table in tables.values_mut() {
        if let Some(mut keys) = primary_columns.remove(&table.table_name) {
            keys.sort();
            let mut names: Vec<String> = keys.into_iter().map(|(_, name)| name).collect();
            table.primary_column_name = Some(if names.len() == 1 {
                PrimaryKey::Single(names.remove(0))
            } else {
                PrimaryKey::Composite(names)
            });
        }

        if table.name_column_name.is_none() {
            table.name_column_name = table
                .columns_by_ordinal()
                .into_iter()
                .find(|column| is_label_column(&column.column_name))
                .map(|column| column.column_name.clone());
        } else if let Some(label) = table
            .name_column_name
            .as_ref()
            .filter(|label| !table.columns.contains_key(*label))
        {
            tracing::warn!(
                table = %table.table_name,
                column = %label,
                "label column override names no existing column"
            );
        }
    }

    for row in reference_rows {
        let src_table_name = required_text(row, "table_name")?;
        let dest_table_name = required_text(row, "referenced_table_name")?;
        if !tables.contains_key(&src_table_name) || !tables.contains_key(&dest_table_name) {
            tracing::debug!(
                table = %src_table_name,
                referenced_table = %dest_table_name,
                "skipping reference to or from a view"
            );
            continue;
        }

        let forward = ForeignKeyRef {
            src_column_name: required_text(row, "column_name")?,
            dest_table_name: dest_table_name.clone(),
            dest_column_name: required_text(row, "referenced_column_name")?,
        };

        let Some(src_column) = tables
            .get_mut(&src_table_name)
            .and_then(|table| table.columns.get_mut(&forward.src_column_name))
        else {
            tracing::warn!(
                table = %src_table_name,
                column = %forward.src_column_name,
                "foreign key on unknown column"
            );
            continue;
        };

        let inverse = forward.inverse(&src_table_name);
        src_column.refers_to = Some(forward);
        if let Some(dest_table) = tables.get_mut(&dest_table_name) {
            dest_table.referenced_by.push(inverse);
        }
    }

    for table in tables.values_mut() {
        table.referenced_by.sort_by(|a, b| {
            (&a.dest_table_name, &a.dest_column_name).cmp(&(&b.dest_table_name, &b.dest_column_name))
        });
    }

    Ok(Schema {
        name: config.database.clone(),
        db_type: config.db_type,
        tables,
    })
}

/// Replace estimates of small tables with exact counts in one statement
async fn refine_row_counts<S: DataSource + ?Sized>(source: &S, schema: &mut Schema) -> Result<()> {
    let small_tables: Vec<String> = schema
        .tables
        .values()
        .filter(|table| table.meta.num_rows.unwrap_or(0) < ACCURATE_ROW_COUNT_LIMIT)
        .map(|table| table.table_name.clone())
        .collect();

    if small_tables.is_empty() {
        return Ok(());
    }

    let clause = SelectClause {
        columns: small_tables
            .iter()
            .map(|table_name| {
                ColumnClause::select_as(
                    SelectClause {
                        columns: vec![ColumnClause::expr("count(*)")],
                        ..SelectClause::from_table(table_name.as_str())
                    },
                    table_name.as_str(),
                )
            })
            .collect(),
        ..SelectClause::default()
    };
    let sql = compile(&clause, false)?;
    tracing::debug!(%sql, "counting rows of small tables");

    let rows = source.fetch_all(&sql, &[]).await?;
    let counts = rows
        .first()
        .ok_or_else(|| DatabaseError::UnexpectedRow("row count statement returned no row".to_string()))?;

    for (table_name, value) in counts {
        if let (Some(table), Some(count)) = (schema.tables.get_mut(table_name), as_number(value)) {
            table.meta.num_rows = Some(count);
        }
    }

    Ok(())
}

/// Case-insensitive suffix match on `name`, `title` or `label`
pub fn is_label_column(column_name: &str) -> bool {
    let lower = column_name.to_lowercase();
    LABEL_SUFFIXES.iter().any(|suffix| lower.ends_with(suffix))
}

/// Catalog column headers differ in case between server versions
fn field<'a>(row: &'a Row, name: &str) -> Option<&'a Value> {
    row.get(name).or_else(|| {
        row.iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    })
}

fn text(row: &Row, name: &str) -> Option<String> {
    match field(row, name)? {
        Value::String(value) => Some(value.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn required_text(row: &Row, name: &str) -> std::result::Result<String, DatabaseError> {
    text(row, name).ok_or_else(|| DatabaseError::UnexpectedRow(format!("catalog row without {}", name)))
}

fn number(row: &Row, name: &str) -> Option<u64> {
    field(row, name).and_then(as_number)
}

fn as_number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|n| *n >= 0.0).map(|n| n as u64)),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Sources report nullability as `YES`/`NO`, some drivers as booleans
fn is_nullable(value: Option<&Value>) -> bool {
    match value {
        Some(Value::String(text)) => text.eq_ignore_ascii_case("YES"),
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_u64() == Some(1),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{
        row, shop_config, shop_source, COLUMNS_NEEDLE, REFERENCES_NEEDLE, ROW_COUNT_NEEDLE,
        TABLES_NEEDLE,
    };
    use serde_json::json;
    use std::time::{Duration, Instant};

    #[test]
    fn test_label_heuristic() {
        assert!(is_label_column("name"));
        assert!(is_label_column("full_name"));
        assert!(is_label_column("Title"));
        assert!(is_label_column("PRODUCT_LABEL"));
        assert!(!is_label_column("name_id"));
        assert!(!is_label_column("description"));
    }

    #[test]
    fn test_catalog_statements() {
        assert_eq!(
            compile(&tables_clause(), true).unwrap(),
            "SELECT `table_name`, `table_rows`, `data_length`, `index_length` \
             FROM `information_schema`.`tables` \
             WHERE `table_schema` = ? AND `table_type` = 'BASE TABLE'"
        );
        assert!(compile(&references_clause(), true)
            .unwrap()
            .ends_with("WHERE `table_schema` = ? AND `referenced_table_schema` = ?"));
    }

    #[tokio::test]
    async fn test_reflect_shop() {
        let source = shop_source();
        let schema = reflect(&source, &shop_config()).await.unwrap();

        assert_eq!(schema.name, "shop");
        assert_eq!(
            schema.tables.keys().collect::<Vec<_>>(),
            vec!["order_items", "orders", "products", "users"]
        );

        let users = schema.table("users").unwrap();
        assert_eq!(users.primary_column_name, Some(PrimaryKey::Single("id".to_string())));
        assert!(users.columns["nickname"].is_nullable);
        assert!(!users.columns["email"].is_nullable);
        assert_eq!(users.columns["id"].extra, "auto_increment");
        assert_eq!(users.meta.num_total_bytes, Some(16384));
    }

    #[tokio::test]
    async fn test_composite_key_is_ordinal_ordered() {
        let schema = reflect(&shop_source(), &shop_config()).await.unwrap();

        // order_id (ordinal 2) is delivered before product_id (ordinal 1)
        assert_eq!(
            schema.table("order_items").unwrap().primary_column_name,
            Some(PrimaryKey::Composite(vec![
                "product_id".to_string(),
                "order_id".to_string()
            ]))
        );
    }

    #[tokio::test]
    async fn test_label_columns() {
        let schema = reflect(&shop_source(), &shop_config()).await.unwrap();

        // first ordinal match wins even though nickname arrives first
        assert_eq!(schema.table("users").unwrap().name_column_name.as_deref(), Some("full_name"));
        assert_eq!(schema.table("products").unwrap().name_column_name.as_deref(), Some("Title"));
        // override
        assert_eq!(schema.table("orders").unwrap().name_column_name.as_deref(), Some("status"));
        assert_eq!(schema.table("order_items").unwrap().name_column_name, None);
    }

    #[tokio::test]
    async fn test_override_beats_heuristic() {
        let config = shop_config().with_label_column("users", "email");
        let schema = reflect(&shop_source(), &config).await.unwrap();
        assert_eq!(schema.table("users").unwrap().name_column_name.as_deref(), Some("email"));
    }

    #[tokio::test]
    async fn test_blank_override_falls_back_to_heuristic() {
        let config = shop_config()
            .with_label_column("users", "")
            .with_label_column("products", "  ");
        let schema = reflect(&shop_source(), &config).await.unwrap();

        assert_eq!(schema.table("users").unwrap().name_column_name.as_deref(), Some("full_name"));
        assert_eq!(schema.table("products").unwrap().name_column_name.as_deref(), Some("Title"));
    }

    #[tokio::test]
    async fn test_references_are_bidirectional() {
        let schema = reflect(&shop_source(), &shop_config()).await.unwrap();

        let mut forward_count = 0;
        for table in schema.tables.values() {
            for column in table.columns.values() {
                let Some(forward) = &column.refers_to else {
                    continue;
                };
                forward_count += 1;
                let dest = schema.table(&forward.dest_table_name).unwrap();
                assert!(dest.referenced_by.contains(&forward.inverse(&table.table_name)));
            }
        }
        assert_eq!(forward_count, 4);

        let reverse_count: usize = schema.tables.values().map(|t| t.referenced_by.len()).sum();
        assert_eq!(reverse_count, forward_count);

        // the view reference is skipped
        assert_eq!(schema.table("users").unwrap().referenced_by.len(), 1);
        assert_eq!(
            schema.table("products").unwrap().referenced_by,
            vec![
                ForeignKeyRef {
                    src_column_name: "id".to_string(),
                    dest_table_name: "order_items".to_string(),
                    dest_column_name: "product_id".to_string(),
                },
                ForeignKeyRef {
                    src_column_name: "id".to_string(),
                    dest_table_name: "orders".to_string(),
                    dest_column_name: "product_id".to_string(),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_exact_counts_for_small_tables() {
        let source = shop_source();
        let schema = reflect(&source, &shop_config()).await.unwrap();

        assert_eq!(schema.table("users").unwrap().meta.num_rows, Some(5));
        assert_eq!(schema.table("products").unwrap().meta.num_rows, Some(7));
        assert_eq!(schema.table("order_items").unwrap().meta.num_rows, Some(9));
        assert_eq!(schema.table("orders").unwrap().meta.num_rows, Some(50000));

        let statements = source.statements();
        let (count_sql, count_params) = statements
            .iter()
            .find(|(sql, _)| sql.contains(ROW_COUNT_NEEDLE))
            .unwrap();
        assert!(count_params.is_empty());
        assert!(!count_sql.contains("FROM `orders`"));
        assert_eq!(
            count_sql,
            "SELECT (SELECT count(*) FROM `order_items`) AS `order_items`, \
             (SELECT count(*) FROM `products`) AS `products`, \
             (SELECT count(*) FROM `users`) AS `users`"
        );
    }

    #[tokio::test]
    async fn test_catalog_statements_bind_database() {
        let source = shop_source();
        reflect(&source, &shop_config()).await.unwrap();

        let statements = source.statements();
        let params_of = |needle: &str| {
            statements
                .iter()
                .find(|(sql, _)| sql.contains(needle))
                .map(|(_, params)| params.clone())
                .unwrap()
        };
        assert_eq!(params_of(TABLES_NEEDLE), vec!["shop"]);
        assert_eq!(params_of(COLUMNS_NEEDLE), vec!["shop"]);
        assert_eq!(params_of(REFERENCES_NEEDLE), vec!["shop", "shop"]);
        assert_eq!(statements.len(), 4);
    }

    #[tokio::test]
    async fn test_references_are_scoped_on_both_ends() {
        let source = shop_source();
        reflect(&source, &shop_config()).await.unwrap();

        let statements = source.statements();
        let (sql, _) = statements
            .iter()
            .find(|(sql, _)| sql.contains(REFERENCES_NEEDLE))
            .unwrap();
        assert!(sql.contains("`table_schema` = ?"));
        assert!(sql.contains("`referenced_table_schema` = ?"));
    }

    #[tokio::test]
    async fn test_catalog_statements_run_concurrently() {
        let delay = Duration::from_millis(100);
        let source = shop_source().with_delay(delay);

        let started = Instant::now();
        reflect(&source, &shop_config()).await.unwrap();
        let elapsed = started.elapsed();

        // three catalog statements in parallel, then the count statement
        assert_eq!(source.statements().len(), 4);
        assert!(elapsed < delay * 3, "reflection took {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_reflect_is_idempotent() {
        let first = reflect(&shop_source(), &shop_config()).await.unwrap();
        let second = reflect(&shop_source(), &shop_config()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_failed_catalog_query_fails_reflection() {
        let source = shop_source().fail_on(REFERENCES_NEEDLE);
        let error = reflect(&source, &shop_config()).await.unwrap_err();
        assert!(matches!(error, Error::DataSource(DatabaseError::Query(_))));
        assert_eq!(source.count_matching(ROW_COUNT_NEEDLE), 0);
    }

    #[test]
    fn test_reserved_prefix_is_rejected() {
        let tables = vec![row(json!({ "table_name": "t", "table_rows": 1 }))];
        let columns = vec![row(json!({
            "table_name": "t",
            "column_name": "$label$x",
            "ordinal_position": 1,
            "is_nullable": "NO",
        }))];
        let error = build_schema(&shop_config(), &tables, &columns, &[]).unwrap_err();
        assert!(matches!(error, Error::Compilation(_)));
    }

    #[test]
    fn test_numeric_strings_and_missing_estimates() {
        let tables = vec![row(json!({ "table_name": "t", "table_rows": null, "data_length": "2048" }))];
        let schema = build_schema(&shop_config(), &tables, &[], &[]).unwrap();
        let meta = &schema.table("t").unwrap().meta;
        assert_eq!(meta.num_rows, None);
        assert_eq!(meta.num_data_bytes, Some(2048));
        assert_eq!(meta.num_total_bytes, Some(2048));
    }

    #[tokio::test]
    async fn test_no_count_statement_without_small_tables() {
        let source = shop_source().respond(
            TABLES_NEEDLE,
            vec![json!({ "table_name": "orders", "table_rows": 20000 })],
        );
        reflect(&source, &shop_config()).await.unwrap();
        assert_eq!(source.count_matching(ROW_COUNT_NEEDLE), 0);
    }
}
