//! Database access layer.
//!
//! This module provides database access functionality:
//! - Lazily-established connection pool
//! - Statement execution with timeouts
//! - Row to JSON type mappings

pub mod executor;
pub mod pool;
pub mod types;

pub use executor::{StatementExecutor, command_tag};
pub use pool::{Backend, DbPool, PoolStats, PooledConnection, ResourcePool};
pub use types::{Row, RowToJson};
