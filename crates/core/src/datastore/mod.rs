//! DataStore module - the query contract the health engine reads through.

mod datastore_model;
mod datastore_traits;
pub mod memory;

pub use datastore_model::{
    compare_json, is_valid_identifier, json_to_text, Deadline, OrderBy, Predicate, Query, Row,
    SortDirection, Value,
};
pub use datastore_traits::DataStore;
pub use memory::InMemoryDataStore;
