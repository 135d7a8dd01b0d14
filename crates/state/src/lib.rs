//! `state` crate: namespaced key-value persistence for workflow runs.
//!
//! [`StateStore`] prefixes every key with its namespace and delegates to a
//! [`StateBackend`]: [`MemoryBackend`] in tests and local runs,
//! [`PostgresBackend`] in deployments. Each call is atomic on its own; there
//! are no multi-key transactions.

pub mod error;
pub mod backend;
pub mod memory;
pub mod pool;
pub mod postgres;
pub mod store;

pub use error::StateError;
pub use backend::StateBackend;
pub use memory::MemoryBackend;
pub use pool::{create_pool, run_migrations, StateConfig, StatePool};
pub use postgres::PostgresBackend;
pub use store::StateStore;
