//! redb table definitions for the greenline state store.
//!
//! Each table uses `&str` keys and `&[u8]` values (JSON-serialized domain types).

use redb::TableDefinition;

/// Service records keyed by `{service}`.
pub const SERVICES: TableDefinition<&str, &[u8]> = TableDefinition::new("services");

/// Live task specifications keyed by `{service}:{revision:08}` so that
/// a service's revisions sort contiguously and in order.
pub const TASK_SPECS: TableDefinition<&str, &[u8]> = TableDefinition::new("task_specs");

/// Archived promotion attempts keyed by `{attempt_id}`.
pub const ATTEMPTS: TableDefinition<&str, &[u8]> = TableDefinition::new("attempts");
