//! Generic repository contract and its SQLite implementation.
//!
//! # Invariants
//! - Every operation except `dispose` fails with `Disposed` once the
//!   underlying unit of work has been released.
//! - `add_or_update` checks committed store state, not staged changes.
//! - `remove` on an unknown id fails with `NotFound` when called.

use crate::db::DbError;
use crate::model::entity::{all_columns, validate_entity_schema, Entity, EntityKey};
use crate::query::{Filter, Query};
use crate::uow::{Collection, UnitOfWork};
use log::debug;
use rusqlite::{Connection, ErrorCode};
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors surfaced by repositories and the unit of work.
#[derive(Debug)]
pub enum RepoError {
    /// Absent id, entity or predicate, or a malformed filter/schema.
    InvalidArgument(String),
    /// Key-addressed target does not exist.
    NotFound {
        collection: &'static str,
        key: String,
    },
    /// Store rejected a staged change (uniqueness, foreign key, check...).
    ConstraintViolation(String),
    /// Operation attempted after the unit of work was disposed.
    Disposed,
    /// Collection table is missing from the connected database.
    MissingRequiredTable(&'static str),
    /// Declared column is missing from the collection table.
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted data cannot be decoded into a valid entity.
    InvalidData(String),
    Db(DbError),
}

impl RepoError {
    /// Stable short code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::NotFound { .. } => "not_found",
            Self::ConstraintViolation(_) => "constraint_violation",
            Self::Disposed => "disposed",
            Self::MissingRequiredTable(_) => "missing_table",
            Self::MissingRequiredColumn { .. } => "missing_column",
            Self::InvalidData(_) => "invalid_data",
            Self::Db(_) => "db_error",
        }
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::NotFound { collection, key } => {
                write!(f, "{collection} entity not found: {key}")
            }
            Self::ConstraintViolation(message) => write!(f, "constraint violation: {message}"),
            Self::Disposed => write!(f, "unit of work has been disposed"),
            Self::MissingRequiredTable(table) => {
                write!(f, "repository requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "repository requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::InvalidArgument(_)
            | Self::NotFound { .. }
            | Self::ConstraintViolation(_)
            | Self::Disposed
            | Self::MissingRequiredTable(_)
            | Self::MissingRequiredColumn { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        match value {
            DbError::Sqlite(err) => err.into(),
            other => Self::Db(other),
        }
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        if value.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) {
            return Self::ConstraintViolation(value.to_string());
        }
        Self::Db(DbError::Sqlite(value))
    }
}

/// Uniform CRUD and query surface over one entity collection.
///
/// Mutations are staged; `save_changes` is the single point where storage
/// failures such as constraint violations can appear.
pub trait Repository<E: Entity> {
    /// Looks up one entity by identity. Unknown ids return `Ok(None)`.
    fn get_by_id(&self, id: &E::Key) -> RepoResult<Option<E>>;
    /// Lazy, non-tracked view over the whole collection.
    fn get_all(&self) -> RepoResult<Query<'_, E>>;
    /// `get_all` narrowed by a store-translatable predicate.
    fn find(&self, predicate: Filter) -> RepoResult<Query<'_, E>>;
    fn add(&self, entity: &E) -> RepoResult<()>;
    /// Stages a full-record overwrite keyed by identity.
    fn update(&self, entity: &E) -> RepoResult<()>;
    /// Stages an insert when the id is not committed yet, else an update.
    ///
    /// The existence check is advisory under concurrent writers: a competing
    /// insert between this call and `save_changes` surfaces there as
    /// `ConstraintViolation`.
    fn add_or_update(&self, entity: &E) -> RepoResult<()>;
    /// Stages deletion of an existing entity; unknown ids fail with `NotFound`.
    fn remove(&self, id: &E::Key) -> RepoResult<()>;
    fn exists(&self, id: &E::Key) -> RepoResult<bool>;
    fn count(&self) -> RepoResult<u64>;
    /// Commits everything staged on the shared unit of work.
    fn save_changes(&self) -> RepoResult<usize>;
    /// Releases the unit of work. Idempotent.
    fn dispose(&self);
}

/// SQLite-backed generic repository borrowing a unit of work.
pub struct SqliteRepository<'uow, E: Entity> {
    uow: &'uow UnitOfWork,
    collection: Collection<'uow, E>,
}

impl<'uow, E: Entity> SqliteRepository<'uow, E> {
    /// Constructs a repository after checking the collection schema.
    ///
    /// # Errors
    /// - `Disposed` when `uow` is already released.
    /// - `InvalidArgument` when `E` declares non-identifier names.
    /// - `MissingRequiredTable` / `MissingRequiredColumn` when the
    ///   database does not match `E`.
    pub fn try_new(uow: &'uow UnitOfWork) -> RepoResult<Self> {
        uow.ensure_active()?;
        validate_entity_schema::<E>()?;
        uow.with_connection(ensure_collection_ready::<E>)?;
        Ok(Self {
            uow,
            collection: uow.collection::<E>(),
        })
    }

    pub fn is_disposed(&self) -> bool {
        self.uow.is_disposed()
    }

    fn require_key(&self, id: &E::Key) -> RepoResult<()> {
        self.uow.ensure_active()?;
        if id.is_absent() {
            return Err(RepoError::InvalidArgument(format!(
                "{} id must not be absent",
                E::COLLECTION
            )));
        }
        Ok(())
    }

    fn require_entity(&self, entity: &E) -> RepoResult<()> {
        self.uow.ensure_active()?;
        if entity.id().is_absent() {
            return Err(RepoError::InvalidArgument(format!(
                "{} entity must carry an identity",
                E::COLLECTION
            )));
        }
        Ok(())
    }
}

impl<E: Entity> Repository<E> for SqliteRepository<'_, E> {
    fn get_by_id(&self, id: &E::Key) -> RepoResult<Option<E>> {
        self.require_key(id)?;
        self.collection.find(id)
    }

    fn get_all(&self) -> RepoResult<Query<'_, E>> {
        self.uow.ensure_active()?;
        Ok(self.collection.query())
    }

    fn find(&self, predicate: Filter) -> RepoResult<Query<'_, E>> {
        self.uow.ensure_active()?;
        if predicate.is_empty() {
            return Err(RepoError::InvalidArgument(
                "predicate must contain at least one condition".to_string(),
            ));
        }

        let columns = all_columns::<E>().collect::<Vec<_>>();
        predicate.render(&columns, &mut String::new(), &mut Vec::new())?;
        Ok(self.collection.query().filter(predicate))
    }

    fn add(&self, entity: &E) -> RepoResult<()> {
        self.require_entity(entity)?;
        self.collection.stage_insert(entity)
    }

    fn update(&self, entity: &E) -> RepoResult<()> {
        self.require_entity(entity)?;
        self.collection.stage_update(entity)
    }

    fn add_or_update(&self, entity: &E) -> RepoResult<()> {
        self.require_entity(entity)?;
        if self.collection.contains(entity.id())? {
            debug!(
                "event=upsert module=repo status=ok path=update collection={}",
                E::COLLECTION
            );
            self.update(entity)
        } else {
            debug!(
                "event=upsert module=repo status=ok path=insert collection={}",
                E::COLLECTION
            );
            self.add(entity)
        }
    }

    fn remove(&self, id: &E::Key) -> RepoResult<()> {
        let entity = self.get_by_id(id)?.ok_or_else(|| RepoError::NotFound {
            collection: E::COLLECTION,
            key: id.to_string(),
        })?;
        self.collection.stage_delete(entity.id())
    }

    fn exists(&self, id: &E::Key) -> RepoResult<bool> {
        self.require_key(id)?;
        self.collection.contains(id)
    }

    fn count(&self) -> RepoResult<u64> {
        self.get_all()?.count()
    }

    fn save_changes(&self) -> RepoResult<usize> {
        self.uow.save_changes()
    }

    fn dispose(&self) {
        self.uow.dispose();
    }
}

fn ensure_collection_ready<E: Entity>(conn: &Connection) -> RepoResult<()> {
    if !table_exists(conn, E::COLLECTION)? {
        return Err(RepoError::MissingRequiredTable(E::COLLECTION));
    }

    let existing = table_columns(conn, E::COLLECTION)?;
    for column in all_columns::<E>() {
        if !existing.iter().any(|name| name == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: E::COLLECTION,
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> RepoResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info(\"{table}\");"))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}
