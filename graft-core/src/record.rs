//! Centralized row access for Neo4j query results.
//!
//! Isolates the `neo4rs::Row` API to a single location so that code generated
//! by `#[derive(FromRow)]` only depends on this module.

use neo4rs::{BoltType as Value, Row as Record};

/// Read a value from a [`Row`](neo4rs::Row) by column name.
///
/// Returns `None` if the column does not exist in the row.
pub fn get_value(record: &Record, key: &str) -> Option<Value> {
    record.get(key).ok()
}
