//! redb table definitions for the sandbox resource store.
//!
//! Record tables use `&str` keys and `&[u8]` values (JSON-serialized domain
//! types). Keys are record names, so iteration order is name order.

use redb::TableDefinition;

/// Sandbox instances keyed by instance name.
pub const INSTANCES: TableDefinition<&str, &[u8]> = TableDefinition::new("instances");

/// Dialect pools keyed by pool name.
pub const POOLS: TableDefinition<&str, &[u8]> = TableDefinition::new("pools");

/// Store-wide counters keyed by counter name.
pub const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

/// META key for the instance name sequence.
pub const INSTANCE_SEQ: &str = "instance_seq";
