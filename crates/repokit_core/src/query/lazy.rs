//! Deferred, read-only queries over one collection.

use super::filter::Filter;
use crate::model::entity::{all_columns, quote_identifier, Entity, EntityKey};
use crate::repo::generic_repo::{RepoError, RepoResult};
use crate::uow::UnitOfWork;
use log::debug;
use rusqlite::params_from_iter;
use rusqlite::types::Value;
use std::fmt;
use std::marker::PhantomData;

/// Result ordering for `Query::order_by`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Ascending,
    Descending,
}

impl SortDirection {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// A query description that runs only when a terminal method is called.
///
/// Results are plain values and are not tracked: persisting a change to a
/// returned entity requires `Repository::update` and `save_changes`.
/// Each terminal call re-executes against the current store state.
pub struct Query<'uow, E: Entity> {
    uow: &'uow UnitOfWork,
    filters: Vec<Filter>,
    order: Vec<(String, SortDirection)>,
    limit: Option<u32>,
    offset: u32,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for Query<'_, E> {
    fn clone(&self) -> Self {
        Self {
            uow: self.uow,
            filters: self.filters.clone(),
            order: self.order.clone(),
            limit: self.limit,
            offset: self.offset,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> fmt::Debug for Query<'_, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query")
            .field("collection", &E::COLLECTION)
            .field("filters", &self.filters)
            .field("order", &self.order)
            .field("limit", &self.limit)
            .field("offset", &self.offset)
            .finish()
    }
}

impl<'uow, E: Entity> Query<'uow, E> {
    pub(crate) fn new(uow: &'uow UnitOfWork) -> Self {
        Self {
            uow,
            filters: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: 0,
            _entity: PhantomData,
        }
    }

    /// Narrows the query; successive filters are AND-combined.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds an ordering key. Ties fall back to key ascending.
    pub fn order_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.order.push((column.into(), direction));
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    /// Executes the query and materializes every matching entity.
    pub fn to_vec(&self) -> RepoResult<Vec<E>> {
        let (sql, params) = self.select_sql()?;
        self.uow.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params_from_iter(params))?;
            let mut entities = Vec::new();
            while let Some(row) = rows.next()? {
                entities.push(E::from_row(row)?);
            }
            debug!(
                "event=query_execute module=query status=ok collection={} rows={}",
                E::COLLECTION,
                entities.len()
            );
            Ok(entities)
        })
    }

    /// Executes the query and returns the first match, if any.
    pub fn first(&self) -> RepoResult<Option<E>> {
        let mut single = self.clone();
        single.limit = Some(1);
        Ok(single.to_vec()?.into_iter().next())
    }

    /// Counts matches without decoding entities. Ignores `limit`/`offset`.
    pub fn count(&self) -> RepoResult<u64> {
        let (where_sql, params) = self.where_sql()?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}{where_sql};",
            quote_identifier(E::COLLECTION)
        );
        self.uow.with_connection(|conn| {
            let count: i64 =
                conn.query_row(&sql, params_from_iter(params), |row| row.get(0))?;
            u64::try_from(count)
                .map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
        })
    }

    pub fn exists(&self) -> RepoResult<bool> {
        Ok(self.first()?.is_some())
    }

    fn where_sql(&self) -> RepoResult<(String, Vec<Value>)> {
        let mut params = Vec::new();
        if self.filters.is_empty() {
            return Ok((String::new(), params));
        }

        let columns = all_columns::<E>().collect::<Vec<_>>();
        let mut sql = String::from(" WHERE ");
        for (index, filter) in self.filters.iter().enumerate() {
            if index > 0 {
                sql.push_str(" AND ");
            }
            filter.render(&columns, &mut sql, &mut params)?;
        }
        Ok((sql, params))
    }

    fn select_sql(&self) -> RepoResult<(String, Vec<Value>)> {
        let columns = all_columns::<E>().collect::<Vec<_>>();
        let select_list = columns
            .iter()
            .map(|column| quote_identifier(column))
            .collect::<Vec<_>>()
            .join(", ");
        let (where_sql, mut params) = self.where_sql()?;

        let mut sql = format!(
            "SELECT {select_list} FROM {}{where_sql}",
            quote_identifier(E::COLLECTION)
        );

        let mut order_terms = Vec::with_capacity(self.order.len() + 1);
        for (column, direction) in &self.order {
            if !columns.contains(&column.as_str()) {
                return Err(RepoError::InvalidArgument(format!(
                    "unknown order column `{column}`"
                )));
            }
            order_terms.push(format!("{} {}", quote_identifier(column), direction.as_sql()));
        }
        order_terms.push(format!("{} ASC", quote_identifier(E::KEY_COLUMN)));
        sql.push_str(" ORDER BY ");
        sql.push_str(&order_terms.join(", "));

        if let Some(limit) = self.limit {
            params.push(Value::Integer(i64::from(limit)));
            sql.push_str(&format!(" LIMIT ?{}", params.len()));
            if self.offset > 0 {
                params.push(Value::Integer(i64::from(self.offset)));
                sql.push_str(&format!(" OFFSET ?{}", params.len()));
            }
        } else if self.offset > 0 {
            params.push(Value::Integer(i64::from(self.offset)));
            sql.push_str(&format!(" LIMIT -1 OFFSET ?{}", params.len()));
        }

        sql.push(';');
        Ok((sql, params))
    }
}

/// Builds the single-row lookup used by identity fast paths.
pub(crate) fn key_lookup_sql<E: Entity>(key: &E::Key) -> (String, Value) {
    let select_list = all_columns::<E>()
        .map(quote_identifier)
        .collect::<Vec<_>>()
        .join(", ");
    (
        format!(
            "SELECT {select_list} FROM {} WHERE {} = ?1;",
            quote_identifier(E::COLLECTION),
            quote_identifier(E::KEY_COLUMN)
        ),
        key.to_sql_value(),
    )
}
