//! Renders a DataStore [`Query`] into parameterized SQLite.
//!
//! Identifiers are validated by the caller (`Query::validate`) and quoted
//! here; values are never interpolated, only bound.

use std::collections::HashSet;

use scholaris_core::datastore::{Predicate, Query, SortDirection, Value};

use crate::utils::{chunk_for_sqlite, SQLITE_MAX_PARAMS_CHUNK};

/// SQL text plus the values bound to its `?` placeholders, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub binds: Vec<Value>,
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident)
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

fn render_predicate(predicate: &Predicate, binds: &mut Vec<Value>) -> String {
    match predicate {
        Predicate::Eq { column, value } => compare(column, "=", value, binds),
        Predicate::NotEq { column, value } => compare(column, "<>", value, binds),
        Predicate::Lt { column, value } => compare(column, "<", value, binds),
        Predicate::Lte { column, value } => compare(column, "<=", value, binds),
        Predicate::Gt { column, value } => compare(column, ">", value, binds),
        Predicate::Gte { column, value } => compare(column, ">=", value, binds),
        Predicate::In { column, values } => {
            if values.is_empty() {
                return "0".to_string();
            }
            binds.extend(values.iter().cloned());
            format!("{} IN ({})", quote(column), placeholders(values.len()))
        }
        Predicate::NotIn { column, values } => {
            if values.is_empty() {
                return format!("{} IS NOT NULL", quote(column));
            }
            binds.extend(values.iter().cloned());
            format!("{} NOT IN ({})", quote(column), placeholders(values.len()))
        }
        Predicate::IsNull { column } => format!("{} IS NULL", quote(column)),
        Predicate::IsNotNull { column } => format!("{} IS NOT NULL", quote(column)),
        Predicate::Any { predicates } => {
            if predicates.is_empty() {
                return "0".to_string();
            }
            let parts: Vec<String> = predicates
                .iter()
                .map(|p| render_predicate(p, binds))
                .collect();
            format!("({})", parts.join(" OR "))
        }
    }
}

fn compare(column: &str, op: &str, value: &Value, binds: &mut Vec<Value>) -> String {
    binds.push(value.clone());
    format!("{} {} ?", quote(column), op)
}

fn render_where(query: &Query, sql: &mut String, binds: &mut Vec<Value>) {
    if query.predicates.is_empty() {
        return;
    }
    let parts: Vec<String> = query
        .predicates
        .iter()
        .map(|p| render_predicate(p, binds))
        .collect();
    sql.push_str(" WHERE ");
    sql.push_str(&parts.join(" AND "));
}

/// `SELECT COUNT(*) AS count FROM ...`; fields, order and limit are ignored.
pub fn render_count(query: &Query) -> Statement {
    let mut sql = format!("SELECT COUNT(*) AS count FROM {}", quote(&query.entity));
    let mut binds = Vec::new();
    render_where(query, &mut sql, &mut binds);
    Statement { sql, binds }
}

/// Selects each matching row as one JSON object over `columns`.
pub fn render_select(query: &Query, columns: &[String]) -> Statement {
    let pairs: Vec<String> = columns
        .iter()
        .map(|c| format!("'{}', {}", c, quote(c)))
        .collect();
    let mut sql = format!(
        "SELECT json_object({}) AS row FROM {}",
        pairs.join(", "),
        quote(&query.entity)
    );
    let mut binds = Vec::new();
    render_where(query, &mut sql, &mut binds);

    if !query.order.is_empty() {
        let order: Vec<String> = query
            .order
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("{} {}", quote(&o.column), dir)
            })
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&order.join(", "));
    }
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    Statement { sql, binds }
}

/// Splits a query whose first long top-level `IN` list would exceed the
/// parameter limit into one query per chunk of distinct values.
///
/// The chunks select disjoint rows, so counts add up and selected rows can
/// be concatenated.
pub fn split_long_in_list(query: &Query) -> Vec<Query> {
    let position = query.predicates.iter().position(
        |p| matches!(p, Predicate::In { values, .. } if values.len() > SQLITE_MAX_PARAMS_CHUNK),
    );
    let Some(index) = position else {
        return vec![query.clone()];
    };
    let Predicate::In { column, values } = &query.predicates[index] else {
        return vec![query.clone()];
    };

    let mut seen = HashSet::new();
    let distinct: Vec<Value> = values
        .iter()
        .filter(|v| seen.insert(v.to_json().to_string()))
        .cloned()
        .collect();

    chunk_for_sqlite(&distinct)
        .map(|chunk| {
            let mut part = query.clone();
            part.predicates[index] = Predicate::In {
                column: column.clone(),
                values: chunk.to_vec(),
            };
            part
        })
        .collect()
}
