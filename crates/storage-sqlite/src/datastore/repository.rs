//! SQLite implementation of the health engine's DataStore.

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Double, Nullable, Text};
use diesel::sqlite::Sqlite;
use diesel::SqliteConnection;
use log::debug;
use std::cmp::Ordering;
use std::sync::Arc;

use scholaris_core::datastore::{compare_json, DataStore, Deadline, Query, Row, SortDirection, Value};
use scholaris_core::errors::{DatabaseError, Result};

use super::render::{render_count, render_select, split_long_in_list, Statement};
use crate::db::{get_connection, DbPool};
use crate::errors::{IntoCore, StorageError};

#[derive(QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[derive(QueryableByName)]
struct JsonRow {
    #[diesel(sql_type = Text)]
    row: String,
}

#[derive(QueryableByName)]
struct ColumnName {
    #[diesel(sql_type = Text)]
    name: String,
}

fn bound(stmt: Statement) -> diesel::query_builder::BoxedSqlQuery<'static, Sqlite, diesel::query_builder::SqlQuery> {
    let mut query = diesel::sql_query(stmt.sql).into_boxed::<Sqlite>();
    for value in stmt.binds {
        query = match value {
            Value::Null => query.bind::<Nullable<Text>, _>(None::<String>),
            Value::Bool(b) => query.bind::<BigInt, _>(i64::from(b)),
            Value::Integer(i) => query.bind::<BigInt, _>(i),
            Value::Real(f) => query.bind::<Double, _>(f),
            Value::Text(s) => query.bind::<Text, _>(s),
        };
    }
    query
}

/// Column names of `table`; an unknown table is an error.
fn table_columns(conn: &mut SqliteConnection, table: &str) -> Result<Vec<String>> {
    let columns: Vec<String> = diesel::sql_query("SELECT name FROM pragma_table_info(?) ORDER BY cid")
        .bind::<Text, _>(table)
        .load::<ColumnName>(conn)
        .into_core()?
        .into_iter()
        .map(|c| c.name)
        .collect();
    if columns.is_empty() {
        return Err(DatabaseError::QueryFailed(format!("no such table: {}", table)).into());
    }
    Ok(columns)
}

fn count_rows(conn: &mut SqliteConnection, query: &Query) -> Result<u64> {
    let mut total = 0u64;
    for part in split_long_in_list(query) {
        let row = bound(render_count(&part))
            .get_result::<CountRow>(conn)
            .into_core()?;
        total += row.count.max(0) as u64;
    }
    Ok(total)
}

fn select_rows(conn: &mut SqliteConnection, query: &Query) -> Result<Vec<Row>> {
    let columns = if query.fields.is_empty() {
        table_columns(conn, &query.entity)?
    } else {
        query.fields.clone()
    };

    let parts = split_long_in_list(query);
    let chunked = parts.len() > 1;
    let mut rows = Vec::new();
    for part in parts {
        let loaded = bound(render_select(&part, &columns))
            .load::<JsonRow>(conn)
            .into_core()?;
        for json_row in loaded {
            let value: serde_json::Value =
                serde_json::from_str(&json_row.row).map_err(StorageError::from)?;
            rows.push(Row::from(value));
        }
    }

    if chunked {
        sort_rows(&mut rows, query);
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
    }
    Ok(rows)
}

/// Re-applies the query order after concatenating chunked results.
fn sort_rows(rows: &mut [Row], query: &Query) {
    if query.order.is_empty() {
        return;
    }
    let null = serde_json::Value::Null;
    rows.sort_by(|a, b| {
        for order in &query.order {
            let x = a.get(&order.column).unwrap_or(&null);
            let y = b.get(&order.column).unwrap_or(&null);
            let ord = sqlite_order(x, y);
            let ord = match order.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Orders two column values the way SQLite's `ORDER BY` does: NULL first,
/// then numbers, then text.
fn sqlite_order(a: &serde_json::Value, b: &serde_json::Value) -> Ordering {
    fn class(v: &serde_json::Value) -> u8 {
        match v {
            serde_json::Value::Null => 0,
            serde_json::Value::Bool(_) | serde_json::Value::Number(_) => 1,
            serde_json::Value::String(_) => 2,
            _ => 3,
        }
    }
    class(a)
        .cmp(&class(b))
        .then_with(|| compare_json(a, b).unwrap_or(Ordering::Equal))
}

/// Reads the school records through the connection pool.
///
/// Queries run on the blocking pool. A call that misses its deadline returns
/// `DatabaseError::Timeout`; the statement itself is left to finish in the
/// background.
pub struct SqliteDataStore {
    pool: Arc<DbPool>,
}

impl SqliteDataStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    async fn run<T, F>(&self, deadline: Deadline, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let budget_ms = deadline.remaining().as_millis() as u64;
        if deadline.is_expired() {
            return Err(DatabaseError::Timeout(budget_ms).into());
        }

        let pool = Arc::clone(&self.pool);
        let handle = tokio::task::spawn_blocking(move || {
            let mut conn = get_connection(&pool)?;
            job(&mut conn)
        });

        match tokio::time::timeout_at(deadline.instant(), handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(StorageError::TaskFailed(e.to_string()).into()),
            Err(_) => Err(DatabaseError::Timeout(budget_ms).into()),
        }
    }
}

#[async_trait]
impl DataStore for SqliteDataStore {
    async fn ping(&self, deadline: Deadline) -> Result<()> {
        self.run(deadline, |conn| {
            diesel::sql_query("SELECT 1 AS count")
                .get_result::<CountRow>(conn)
                .into_core()?;
            Ok(())
        })
        .await
    }

    async fn count(&self, query: &Query, deadline: Deadline) -> Result<u64> {
        query.validate()?;
        debug!("count {}", query.entity);
        let query = query.clone();
        self.run(deadline, move |conn| count_rows(conn, &query)).await
    }

    async fn select(&self, query: &Query, deadline: Deadline) -> Result<Vec<Row>> {
        query.validate()?;
        debug!("select {}", query.entity);
        let query = query.clone();
        self.run(deadline, move |conn| select_rows(conn, &query)).await
    }
}
