use async_trait::async_trait;

use super::datastore_model::{Deadline, Query, Row};
use crate::errors::Result;

/// Read-only query interface over the school records store.
///
/// Implementations must return failures as `Err` (connection loss, missing
/// table, timeout) and must give up once `deadline` has passed.
#[async_trait]
pub trait DataStore: Send + Sync {
    /// Verifies the store is reachable.
    async fn ping(&self, deadline: Deadline) -> Result<()>;

    /// Counts rows matching the query predicates. `fields`, `order` and
    /// `limit` are ignored.
    async fn count(&self, query: &Query, deadline: Deadline) -> Result<u64>;

    /// Returns matching rows, projected onto `fields`.
    async fn select(&self, query: &Query, deadline: Deadline) -> Result<Vec<Row>>;
}
