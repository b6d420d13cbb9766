//! Utility functions for SQLite storage operations.
//!
//! Chunking keeps `IN (...)` lists under SQLite's bound-parameter limit.

/// Maximum number of parameters for SQLite IN (...) queries.
///
/// SQLite has a compile-time limit on the number of parameters in a SQL statement,
/// typically around 999 (SQLITE_MAX_VARIABLE_NUMBER). To stay safely under this limit
/// and leave room for other parameters in the query, we use 500 as our chunk size.
pub const SQLITE_MAX_PARAMS_CHUNK: usize = 500;

/// Chunk a slice into smaller slices for batch SQLite queries.
///
/// The SQLite DataStore issues one statement per chunk when a query filters
/// on a long key list (orphan parents, capacity counts).
pub fn chunk_for_sqlite<T>(items: &[T]) -> impl Iterator<Item = &[T]> {
    items.chunks(SQLITE_MAX_PARAMS_CHUNK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_for_sqlite_empty() {
        let items: Vec<i32> = vec![];
        assert_eq!(chunk_for_sqlite(&items).count(), 0);
    }

    #[test]
    fn test_chunk_for_sqlite_over_limit() {
        let items: Vec<i32> = (0..1200).collect();
        let chunks: Vec<_> = chunk_for_sqlite(&items).collect();
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), SQLITE_MAX_PARAMS_CHUNK);
        assert_eq!(chunks[2].len(), 200);
    }
}
