//! Unit-of-work context: one SQLite session plus the changes staged on it.
//!
//! # Responsibility
//! - Own the connection shared by every repository built on this context.
//! - Batch staged inserts/updates/deletes until `save_changes`.
//! - Release the connection exactly once on `dispose` or drop.
//!
//! # Invariants
//! - `save_changes` applies all staged changes in one transaction or none.
//! - After disposal every operation fails with `RepoError::Disposed`.
//! - The context is single-writer: it is `!Sync`, so sharing across threads
//!   requires the caller's own synchronization.

mod collection;

pub(crate) use collection::Collection;

use crate::db::{open_db, open_db_in_memory, Migration};
use crate::model::entity::Entity;
use crate::repo::generic_repo::{RepoError, RepoResult, SqliteRepository};
use log::{debug, error, info, warn};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Transaction, TransactionBehavior};
use std::cell::RefCell;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::Instant;

/// Kind of a staged change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

impl Display for ChangeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Read-only description of one staged change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingChange {
    pub kind: ChangeKind,
    pub collection: &'static str,
    /// Display form of the target key.
    pub key: String,
}

/// Pre-rendered statement waiting for `save_changes`.
#[derive(Debug)]
pub(crate) struct StagedChange {
    pub(crate) kind: ChangeKind,
    pub(crate) collection: &'static str,
    pub(crate) key: String,
    pub(crate) sql: String,
    pub(crate) params: Vec<Value>,
}

/// Session over one SQLite connection with explicit commit and release.
#[derive(Debug)]
pub struct UnitOfWork {
    conn: RefCell<Option<Connection>>,
    staged: RefCell<Vec<StagedChange>>,
}

impl UnitOfWork {
    /// Wraps an already open, migrated connection.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: RefCell::new(Some(conn)),
            staged: RefCell::new(Vec::new()),
        }
    }

    /// Opens a database file, applies `migrations` and wraps the connection.
    pub fn open(path: impl AsRef<Path>, migrations: &[Migration]) -> RepoResult<Self> {
        Ok(Self::new(open_db(path, migrations)?))
    }

    /// Opens a private in-memory database, applies `migrations` and wraps it.
    pub fn open_in_memory(migrations: &[Migration]) -> RepoResult<Self> {
        Ok(Self::new(open_db_in_memory(migrations)?))
    }

    /// Returns the collection handle for `E` without schema checks.
    pub(crate) fn collection<E: Entity>(&self) -> Collection<'_, E> {
        Collection::new(self)
    }

    /// Returns a repository for `E` after verifying its table and columns.
    pub fn repository<E: Entity>(&self) -> RepoResult<SqliteRepository<'_, E>> {
        SqliteRepository::try_new(self)
    }

    pub fn is_disposed(&self) -> bool {
        self.conn.borrow().is_none()
    }

    /// Number of staged changes not yet saved.
    pub fn pending_changes(&self) -> usize {
        self.staged.borrow().len()
    }

    /// Describes staged changes in the order they will be applied.
    pub fn pending(&self) -> Vec<PendingChange> {
        self.staged
            .borrow()
            .iter()
            .map(|change| PendingChange {
                kind: change.kind,
                collection: change.collection,
                key: change.key.clone(),
            })
            .collect()
    }

    /// Drops every staged change without touching the store.
    ///
    /// Returns how many changes were discarded.
    pub fn discard_changes(&self) -> usize {
        let discarded = self.staged.borrow_mut().drain(..).count();
        if discarded > 0 {
            info!("event=discard_changes module=uow status=ok discarded={discarded}");
        }
        discarded
    }

    /// Commits all staged changes atomically and returns affected rows.
    ///
    /// # Errors
    /// - `RepoError::ConstraintViolation` when the store rejects any change.
    /// - `RepoError::NotFound` when an update/delete matches no row.
    /// - `RepoError::Disposed` after `dispose`.
    ///
    /// On error the transaction is rolled back and the staged changes stay
    /// pending, so the caller can inspect or discard them.
    pub fn save_changes(&self) -> RepoResult<usize> {
        let started_at = Instant::now();
        let mut slot = self.conn.borrow_mut();
        let conn = slot.as_mut().ok_or(RepoError::Disposed)?;

        let staged = self.staged.borrow();
        if staged.is_empty() {
            debug!("event=save_changes module=uow status=ok changes=0 affected=0");
            return Ok(0);
        }

        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut affected = 0;
        for change in staged.iter() {
            match apply_change(&tx, change) {
                Ok(rows) => affected += rows,
                Err(err) => {
                    error!(
                        "event=save_changes module=uow status=error changes={} duration_ms={} error_code={} op={} collection={}",
                        staged.len(),
                        started_at.elapsed().as_millis(),
                        err.code(),
                        change.kind,
                        change.collection
                    );
                    return Err(err);
                }
            }
        }
        tx.commit()?;

        let changes = staged.len();
        drop(staged);
        self.staged.borrow_mut().clear();

        info!(
            "event=save_changes module=uow status=ok changes={} affected={} duration_ms={}",
            changes,
            affected,
            started_at.elapsed().as_millis()
        );
        Ok(affected)
    }

    /// Releases the connection. Calling it again is a no-op.
    ///
    /// Unsaved staged changes are discarded.
    pub fn dispose(&self) {
        let Some(conn) = self.conn.borrow_mut().take() else {
            return;
        };

        let discarded = self.staged.borrow_mut().drain(..).count();
        if discarded > 0 {
            warn!("event=uow_dispose module=uow status=ok discarded={discarded}");
        }

        match conn.close() {
            Ok(()) => info!("event=uow_dispose module=uow status=ok"),
            Err((_conn, err)) => error!(
                "event=uow_dispose module=uow status=error error_code=db_close_failed error={}",
                err
            ),
        }
    }

    pub(crate) fn ensure_active(&self) -> RepoResult<()> {
        if self.is_disposed() {
            return Err(RepoError::Disposed);
        }
        Ok(())
    }

    /// Runs `f` against the live connection.
    pub(crate) fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> RepoResult<T>,
    ) -> RepoResult<T> {
        let slot = self.conn.borrow();
        let conn = slot.as_ref().ok_or(RepoError::Disposed)?;
        f(conn)
    }

    pub(crate) fn stage(&self, change: StagedChange) -> RepoResult<()> {
        self.ensure_active()?;
        debug!(
            "event=stage_change module=uow status=ok op={} collection={}",
            change.kind, change.collection
        );
        self.staged.borrow_mut().push(change);
        Ok(())
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        self.dispose();
    }
}

fn apply_change(tx: &Transaction<'_>, change: &StagedChange) -> RepoResult<usize> {
    let rows = tx.execute(&change.sql, params_from_iter(change.params.iter()))?;
    if rows == 0 && change.kind != ChangeKind::Insert {
        return Err(RepoError::NotFound {
            collection: change.collection,
            key: change.key.clone(),
        });
    }
    Ok(rows)
}
