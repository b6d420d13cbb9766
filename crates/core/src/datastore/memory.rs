//! In-memory DataStore.
//!
//! Evaluates the full query language over JSON rows. Failures can be injected
//! per entity, store-wide, or as artificial latency, which makes it the
//! backing store for engine tests.

use async_trait::async_trait;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::RwLock;
use std::time::Duration;

use super::datastore_model::{compare_json, Deadline, Query, Row, SortDirection};
use super::datastore_traits::DataStore;
use crate::errors::{DatabaseError, Error, Result};

#[derive(Default)]
pub struct InMemoryDataStore {
    tables: RwLock<HashMap<String, Vec<Row>>>,
    failing: RwLock<HashSet<String>>,
    delays: RwLock<HashMap<String, Duration>>,
    offline: AtomicBool,
    calls: AtomicU64,
}

fn poisoned<T>(_: T) -> Error {
    Error::Unexpected("in-memory store lock poisoned".to_string())
}

impl InMemoryDataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a table (possibly empty), builder style.
    pub fn with_table(self, entity: &str, rows: Vec<Row>) -> Self {
        if let Ok(mut tables) = self.tables.write() {
            tables.insert(entity.to_string(), rows);
        }
        self
    }

    /// Appends a row, creating the table if needed.
    pub fn insert(&self, entity: &str, row: Row) -> Result<()> {
        self.tables
            .write()
            .map_err(poisoned)?
            .entry(entity.to_string())
            .or_default()
            .push(row);
        Ok(())
    }

    /// Makes every query against `entity` fail.
    pub fn fail_entity(&self, entity: &str) -> Result<()> {
        self.failing.write().map_err(poisoned)?.insert(entity.to_string());
        Ok(())
    }

    /// Delays every query against `entity`.
    pub fn delay_entity(&self, entity: &str, delay: Duration) -> Result<()> {
        self.delays.write().map_err(poisoned)?.insert(entity.to_string(), delay);
        Ok(())
    }

    /// Simulates losing the connection to the store.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    /// Number of calls served so far (including failed ones).
    pub fn call_count(&self) -> u64 {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    async fn prepare(&self, query: &Query, deadline: Deadline) -> Result<Vec<Row>> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(DatabaseError::ConnectionFailed("store is offline".to_string()).into());
        }
        query.validate()?;

        let delay = self.delays.read().map_err(poisoned)?.get(&query.entity).copied();
        if let Some(delay) = delay {
            let waited = deadline.remaining();
            if tokio::time::timeout_at(deadline.instant(), tokio::time::sleep(delay))
                .await
                .is_err()
            {
                return Err(DatabaseError::Timeout(waited.as_millis() as u64).into());
            }
        }

        if self.failing.read().map_err(poisoned)?.contains(&query.entity) {
            return Err(DatabaseError::QueryFailed(format!(
                "injected failure on {}",
                query.entity
            ))
            .into());
        }

        let tables = self.tables.read().map_err(poisoned)?;
        let rows = tables.get(&query.entity).ok_or_else(|| {
            Error::from(DatabaseError::QueryFailed(format!(
                "no such table: {}",
                query.entity
            )))
        })?;
        Ok(rows.iter().filter(|r| query.matches(r)).cloned().collect())
    }
}

#[async_trait]
impl DataStore for InMemoryDataStore {
    async fn ping(&self, _deadline: Deadline) -> Result<()> {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(DatabaseError::ConnectionFailed("store is offline".to_string()).into());
        }
        Ok(())
    }

    async fn count(&self, query: &Query, deadline: Deadline) -> Result<u64> {
        Ok(self.prepare(query, deadline).await?.len() as u64)
    }

    async fn select(&self, query: &Query, deadline: Deadline) -> Result<Vec<Row>> {
        let mut rows = self.prepare(query, deadline).await?;

        if !query.order.is_empty() {
            rows.sort_by(|a, b| {
                for order in &query.order {
                    let null = serde_json::Value::Null;
                    let left = a.get(&order.column).unwrap_or(&null);
                    let right = b.get(&order.column).unwrap_or(&null);
                    // NULLs sort first, as in SQLite
                    let ord = match (left.is_null(), right.is_null()) {
                        (true, true) => Ordering::Equal,
                        (true, false) => Ordering::Less,
                        (false, true) => Ordering::Greater,
                        _ => compare_json(left, right).unwrap_or(Ordering::Equal),
                    };
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

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        Ok(rows.iter().map(|r| r.project(&query.fields)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::Predicate;
    use serde_json::json;

    fn store() -> InMemoryDataStore {
        InMemoryDataStore::new().with_table(
            "students",
            vec![
                Row::from(json!({"id": "s1", "status": "active", "created_at": "2024-02-01"})),
                Row::from(json!({"id": "s2", "status": "inactive", "created_at": "2024-01-01"})),
                Row::from(json!({"id": "s3", "status": "active", "created_at": null})),
            ],
        )
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_count_and_select() {
        let store = store();
        let q = Query::table("students").filter(Predicate::eq("status", "active"));
        assert_eq!(store.count(&q, deadline()).await.unwrap(), 2);

        let rows = store
            .select(
                &Query::table("students")
                    .fields(&["id"])
                    .order_by("created_at", SortDirection::Desc)
                    .limit(2),
                deadline(),
            )
            .await
            .unwrap();
        let ids: Vec<_> = rows.iter().filter_map(|r| r.get_str("id")).collect();
        assert_eq!(ids, vec!["s1", "s2"]);
        assert!(rows[0].get("status").is_none());
    }

    #[tokio::test]
    async fn test_missing_table_and_injected_failures() {
        let store = store();
        assert!(store.count(&Query::table("grades"), deadline()).await.is_err());

        store.fail_entity("students").unwrap();
        assert!(store.select(&Query::table("students"), deadline()).await.is_err());

        store.set_offline(true);
        assert!(store.ping(deadline()).await.is_err());
    }

    #[tokio::test]
    async fn test_delay_respects_deadline() {
        let store = store();
        store.delay_entity("students", Duration::from_secs(30)).unwrap();
        let err = store
            .count(&Query::table("students"), Deadline::after(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
