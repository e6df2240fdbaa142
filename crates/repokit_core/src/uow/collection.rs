//! Collection handle: typed access to one entity table inside a unit of work.

use super::{ChangeKind, StagedChange, UnitOfWork};
use crate::model::entity::{quote_identifier, Entity, EntityKey};
use crate::query::lazy::{key_lookup_sql, Query};
use crate::repo::generic_repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use std::marker::PhantomData;

/// Storage-level operations for entity type `E`.
///
/// Reads go to the live store; writes are staged on the owning
/// `UnitOfWork`. No argument validation happens here.
pub(crate) struct Collection<'uow, E: Entity> {
    uow: &'uow UnitOfWork,
    _entity: PhantomData<fn() -> E>,
}

impl<'uow, E: Entity> Collection<'uow, E> {
    pub(crate) fn new(uow: &'uow UnitOfWork) -> Self {
        Self {
            uow,
            _entity: PhantomData,
        }
    }

    /// Point lookup by primary key.
    pub fn find(&self, key: &E::Key) -> RepoResult<Option<E>> {
        let (sql, key_value) = key_lookup_sql::<E>(key);
        self.uow.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let mut rows = stmt.query([key_value])?;
            if let Some(row) = rows.next()? {
                return Ok(Some(E::from_row(row)?));
            }
            Ok(None)
        })
    }

    /// Checks committed store state only; staged changes are not consulted.
    pub fn contains(&self, key: &E::Key) -> RepoResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE {} = ?1);",
            quote_identifier(E::COLLECTION),
            quote_identifier(E::KEY_COLUMN)
        );
        self.uow.with_connection(|conn| {
            let exists: i64 = conn.query_row(&sql, [key.to_sql_value()], |row| row.get(0))?;
            Ok(exists == 1)
        })
    }

    /// Unfiltered lazy enumeration.
    pub fn query(&self) -> Query<'uow, E> {
        Query::new(self.uow)
    }

    pub fn stage_insert(&self, entity: &E) -> RepoResult<()> {
        let values = checked_values(entity)?;
        let columns = std::iter::once(E::KEY_COLUMN)
            .chain(E::COLUMNS.iter().copied())
            .map(quote_identifier)
            .collect::<Vec<_>>();
        let placeholders = (1..=columns.len())
            .map(|index| format!("?{index}"))
            .collect::<Vec<_>>();

        let mut params = Vec::with_capacity(values.len() + 1);
        params.push(entity.id().to_sql_value());
        params.extend(values);

        self.uow.stage(StagedChange {
            kind: ChangeKind::Insert,
            collection: E::COLLECTION,
            key: entity.id().to_string(),
            sql: format!(
                "INSERT INTO {} ({}) VALUES ({});",
                quote_identifier(E::COLLECTION),
                columns.join(", "),
                placeholders.join(", ")
            ),
            params,
        })
    }

    /// Stages a full-record overwrite keyed by identity.
    pub fn stage_update(&self, entity: &E) -> RepoResult<()> {
        let mut params = checked_values(entity)?;
        let assignments = if E::COLUMNS.is_empty() {
            // Key-only entity: touch the row so a missing id still reports zero rows.
            let key = quote_identifier(E::KEY_COLUMN);
            format!("{key} = {key}")
        } else {
            E::COLUMNS
                .iter()
                .enumerate()
                .map(|(index, column)| format!("{} = ?{}", quote_identifier(column), index + 1))
                .collect::<Vec<_>>()
                .join(", ")
        };
        params.push(entity.id().to_sql_value());

        self.uow.stage(StagedChange {
            kind: ChangeKind::Update,
            collection: E::COLLECTION,
            key: entity.id().to_string(),
            sql: format!(
                "UPDATE {} SET {assignments} WHERE {} = ?{};",
                quote_identifier(E::COLLECTION),
                quote_identifier(E::KEY_COLUMN),
                params.len()
            ),
            params,
        })
    }

    pub fn stage_delete(&self, key: &E::Key) -> RepoResult<()> {
        self.uow.stage(StagedChange {
            kind: ChangeKind::Delete,
            collection: E::COLLECTION,
            key: key.to_string(),
            sql: format!(
                "DELETE FROM {} WHERE {} = ?1;",
                quote_identifier(E::COLLECTION),
                quote_identifier(E::KEY_COLUMN)
            ),
            params: vec![key.to_sql_value()],
        })
    }
}

fn checked_values<E: Entity>(entity: &E) -> RepoResult<Vec<Value>> {
    let values = entity.to_values();
    if values.len() != E::COLUMNS.len() {
        return Err(RepoError::InvalidData(format!(
            "`{}` entity produced {} values for {} columns",
            E::COLLECTION,
            values.len(),
            E::COLUMNS.len()
        )));
    }
    Ok(values)
}
