//! `Entity` / `EntityKey` traits and schema identifier checks.

use crate::repo::generic_repo::{RepoError, RepoResult};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;
use rusqlite::Row;
use std::collections::HashSet;
use std::fmt::{Debug, Display};
use uuid::Uuid;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex should compile")
});

/// Value type addressing exactly one entity inside its collection.
///
/// `is_absent` marks the sentinel that never identifies a stored record.
/// Repositories reject it with `RepoError::InvalidArgument`.
pub trait EntityKey: Clone + Eq + Debug + Display {
    /// Returns `true` for the "no key" sentinel.
    fn is_absent(&self) -> bool;
    /// Encodes the key for statement binding.
    fn to_sql_value(&self) -> Value;
}

/// Synthetic integer keys. `0` is the unassigned sentinel, matching
/// SQLite rowids which start at `1`.
impl EntityKey for i64 {
    fn is_absent(&self) -> bool {
        *self == 0
    }

    fn to_sql_value(&self) -> Value {
        Value::Integer(*self)
    }
}

impl EntityKey for i32 {
    fn is_absent(&self) -> bool {
        *self == 0
    }

    fn to_sql_value(&self) -> Value {
        Value::Integer(i64::from(*self))
    }
}

/// Natural string keys. Blank strings are absent.
impl EntityKey for String {
    fn is_absent(&self) -> bool {
        self.trim().is_empty()
    }

    fn to_sql_value(&self) -> Value {
        Value::Text(self.clone())
    }
}

/// UUID keys, stored as canonical hyphenated text. The nil UUID is absent.
impl EntityKey for Uuid {
    fn is_absent(&self) -> bool {
        self.is_nil()
    }

    fn to_sql_value(&self) -> Value {
        Value::Text(self.to_string())
    }
}

/// A record persisted in one collection (table) of the store.
///
/// Implementors list their non-key columns in `COLUMNS`; `to_values` must
/// return values in that same order. `from_row` receives rows selected as
/// `KEY_COLUMN` followed by `COLUMNS`, so it can read by name or index.
pub trait Entity: Sized {
    type Key: EntityKey;

    /// Table backing this entity type.
    const COLLECTION: &'static str;
    /// Identity column.
    const KEY_COLUMN: &'static str = "id";
    /// Non-key columns written on insert and full-record update.
    const COLUMNS: &'static [&'static str];

    fn id(&self) -> &Self::Key;

    fn to_values(&self) -> Vec<Value>;

    /// Decodes one stored row.
    ///
    /// # Errors
    /// - `RepoError::InvalidData` when persisted state cannot form a valid entity.
    fn from_row(row: &Row<'_>) -> RepoResult<Self>;
}

/// Returns whether `value` is safe to splice into SQL as an identifier.
pub fn is_valid_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

/// Quotes an already validated identifier.
pub(crate) fn quote_identifier(value: &str) -> String {
    format!("\"{value}\"")
}

/// Checks the static schema declared by `E`.
///
/// # Errors
/// - `RepoError::InvalidArgument` for non-identifier names or duplicate columns.
pub fn validate_entity_schema<E: Entity>() -> RepoResult<()> {
    let names = std::iter::once(E::COLLECTION)
        .chain(std::iter::once(E::KEY_COLUMN))
        .chain(E::COLUMNS.iter().copied());
    for name in names {
        if !is_valid_identifier(name) {
            return Err(RepoError::InvalidArgument(format!(
                "`{name}` is not a valid identifier for collection `{}`",
                E::COLLECTION
            )));
        }
    }

    let mut seen = HashSet::new();
    for column in std::iter::once(E::KEY_COLUMN).chain(E::COLUMNS.iter().copied()) {
        if !seen.insert(column) {
            return Err(RepoError::InvalidArgument(format!(
                "column `{column}` is declared twice for collection `{}`",
                E::COLLECTION
            )));
        }
    }

    Ok(())
}

/// Key column followed by the non-key columns, in select order.
pub(crate) fn all_columns<E: Entity>() -> impl Iterator<Item = &'static str> {
    std::iter::once(E::KEY_COLUMN).chain(E::COLUMNS.iter().copied())
}
