//! SQL text from clause trees
//!
//! `compile` is pure: it renders a [`SelectClause`] into MySQL flavored SQL and
//! never touches the database.
//!
//! Escaping covers identifiers only. Raw expressions and predicate value tokens
//! are rendered verbatim and must come from the composing layer (the planner),
//! never from unchecked user input. Predicates are joined with `AND` only; the
//! clause language has no `OR` and no grouping.

use crate::query::SortOrder;
use crate::{Error, Result};

/// Table to select from, optionally aliased for self-referencing sub-selects
#[derive(Debug, Clone, PartialEq)]
pub enum FromClause {
    Table(String),
    Aliased { table: String, alias: String },
}

/// One entry of the select list
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnClause {
    /// Column reference, `x` or `x.y`
    Identifier(String),

    /// Trusted raw expression such as `count(*)`
    Expr { expr: String, alias: Option<String> },

    /// Parenthesized sub-select labelled as a virtual column
    SelectAs { select: Box<SelectClause>, alias: String },
}

impl ColumnClause {
    pub fn identifier(name: impl Into<String>) -> Self {
        ColumnClause::Identifier(name.into())
    }

    pub fn expr(expr: impl Into<String>) -> Self {
        ColumnClause::Expr {
            expr: expr.into(),
            alias: None,
        }
    }

    pub fn expr_as(expr: impl Into<String>, alias: impl Into<String>) -> Self {
        ColumnClause::Expr {
            expr: expr.into(),
            alias: Some(alias.into()),
        }
    }

    pub fn select_as(select: SelectClause, alias: impl Into<String>) -> Self {
        ColumnClause::SelectAs {
            select: Box::new(select),
            alias: alias.into(),
        }
    }
}

/// `<field> <op> [<value>]` with an already prepared value token
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub op: String,
    /// Placeholder, literal or escaped column; absent for nullary operators
    pub value: Option<String>,
}

impl Predicate {
    pub fn new(field: impl Into<String>, op: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value: Some(value.into()),
        }
    }

    pub fn nullary(field: impl Into<String>, op: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            op: op.into(),
            value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderClause {
    pub field: String,
    pub order: SortOrder,
}

/// Structured SELECT statement
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SelectClause {
    pub from: Option<FromClause>,

    /// Select list, `*` when empty
    pub columns: Vec<ColumnClause>,

    pub filters: Vec<Predicate>,

    pub group_by: Vec<String>,

    pub order_by: Vec<OrderClause>,

    pub limit: Option<u64>,

    pub offset: Option<u64>,
}

impl SelectClause {
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            from: Some(FromClause::Table(table.into())),
            ..Self::default()
        }
    }
}

/// Quote a single identifier segment, doubling embedded backticks
pub fn escape_identifier(identifier: &str) -> String {
    format!("`{}`", identifier.replace('`', "``"))
}

/// Quote `x.y` as `` `x`.`y` `` so qualified names survive reserved words
pub fn escape_member_access(identifier: &str) -> Result<String> {
    if identifier.is_empty() {
        return Err(Error::Compilation("empty identifier".to_string()));
    }

    identifier
        .split('.')
        .map(|segment| {
            if segment.is_empty() {
                Err(Error::Compilation(format!(
                    "malformed identifier '{}'",
                    identifier
                )))
            } else {
                Ok(escape_identifier(segment))
            }
        })
        .collect::<Result<Vec<_>>>()
        .map(|segments| segments.join("."))
}

fn compile_column(column: &ColumnClause) -> Result<String> {
    match column {
        ColumnClause::Identifier(name) => escape_member_access(name),
        ColumnClause::Expr { expr, alias: Some(alias) } => {
            Ok(format!("{} AS {}", expr, escape_identifier(alias)))
        }
        ColumnClause::Expr { expr, alias: None } => Ok(expr.clone()),
        ColumnClause::SelectAs { select, alias } => Ok(format!(
            "({}) AS {}",
            compile(select, true)?,
            escape_identifier(alias)
        )),
    }
}

fn compile_predicate(predicate: &Predicate) -> Result<String> {
    let field = escape_member_access(&predicate.field)?;
    Ok(match &predicate.value {
        Some(value) => format!("{} {} {}", field, predicate.op, value),
        None => format!("{} {}", field, predicate.op),
    })
}

/// Render a clause tree as SQL text
///
/// Segments are separated by newlines unless `single_line` is set. Nested
/// sub-selects are always rendered on a single line.
pub fn compile(clause: &SelectClause, single_line: bool) -> Result<String> {
    let mut segments = Vec::new();

    if clause.columns.is_empty() {
        segments.push("SELECT *".to_string());
    } else {
        let columns = clause
            .columns
            .iter()
            .map(compile_column)
            .collect::<Result<Vec<_>>>()?;
        segments.push(format!("SELECT {}", columns.join(", ")));
    }

    match &clause.from {
        Some(FromClause::Table(table)) => {
            segments.push(format!("FROM {}", escape_member_access(table)?));
        }
        Some(FromClause::Aliased { table, alias }) => {
            segments.push(format!(
                "FROM {} {}",
                escape_member_access(table)?,
                escape_identifier(alias)
            ));
        }
        None => {}
    }

    if !clause.filters.is_empty() {
        let predicates = clause
            .filters
            .iter()
            .map(compile_predicate)
            .collect::<Result<Vec<_>>>()?;
        segments.push(format!("WHERE {}", predicates.join(" AND ")));
    }

    if !clause.group_by.is_empty() {
        let fields = clause
            .group_by
            .iter()
            .map(|field| escape_member_access(field))
            .collect::<Result<Vec<_>>>()?;
        segments.push(format!("GROUP BY {}", fields.join(", ")));
    }

    if !clause.order_by.is_empty() {
        let fields = clause
            .order_by
            .iter()
            .map(|order| -> Result<String> {
                Ok(format!("{} {}", escape_member_access(&order.field)?, order.order.as_sql()))
            })
            .collect::<Result<Vec<_>>>()?;
        segments.push(format!("ORDER BY {}", fields.join(", ")));
    }

    if let Some(limit) = clause.limit {
        segments.push(format!("LIMIT {}", limit));
    }

    if let Some(offset) = clause.offset {
        segments.push(format!("OFFSET {}", offset));
    }

    Ok(segments.join(if single_line { " " } else { "\n" }))
}
