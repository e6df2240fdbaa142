//! Generic repository over SQLite with an explicit unit-of-work boundary.
//! Callers stage changes through `Repository<E>` and commit them with
//! `save_changes`, without touching SQL.

pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod repo;
pub mod uow;

pub use db::{DbError, DbOptions, DbResult, Migration};
pub use logging::{default_log_level, init_logging, logging_status, LogConfig};
pub use model::entity::{Entity, EntityKey};
pub use query::{field, CompareOp, FieldRef, Filter, FilterValue, Query, SortDirection};
pub use repo::generic_repo::{RepoError, RepoResult, Repository, SqliteRepository};
pub use uow::{ChangeKind, PendingChange, UnitOfWork};

/// Minimal health-check API for smoke probes.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
