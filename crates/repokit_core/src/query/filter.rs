//! Filter expression tree and its SQL rendering.

use crate::model::entity::quote_identifier;
use crate::repo::generic_repo::{RepoError, RepoResult};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::ops::Not;
use uuid::Uuid;

/// Operand of a filter comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Null,
    Bool(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FilterValue {
    fn to_sql_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(value) => Value::Integer(i64::from(*value)),
            Self::Integer(value) => Value::Integer(*value),
            Self::Real(value) => Value::Real(*value),
            Self::Text(value) => Value::Text(value.clone()),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<Uuid> for FilterValue {
    fn from(value: Uuid) -> Self {
        Self::Text(value.to_string())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    fn as_sql(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
        }
    }
}

/// Predicate over one entity collection.
///
/// `Filter::default()` is an empty conjunction, i.e. no predicate at all.
/// Repositories reject it, along with empty `Or` and `In` nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Filter {
    Compare {
        column: String,
        op: CompareOp,
        value: FilterValue,
    },
    /// SQL `LIKE` with `%` / `_` wildcards.
    Like { column: String, pattern: String },
    IsNull { column: String },
    IsNotNull { column: String },
    In {
        column: String,
        values: Vec<FilterValue>,
    },
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

impl Default for Filter {
    fn default() -> Self {
        Self::And(Vec::new())
    }
}

impl Filter {
    /// Conjunction of all `filters`.
    pub fn all(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::And(filters.into_iter().collect())
    }

    /// Disjunction of all `filters`.
    pub fn any(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    pub fn and(self, other: Filter) -> Self {
        match self {
            Self::And(mut items) => {
                items.push(other);
                Self::And(items)
            }
            first => Self::And(vec![first, other]),
        }
    }

    pub fn or(self, other: Filter) -> Self {
        match self {
            Self::Or(mut items) => {
                items.push(other);
                Self::Or(items)
            }
            first => Self::Or(vec![first, other]),
        }
    }

    /// Returns `true` when the tree contains no condition anywhere.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::And(items) | Self::Or(items) => items.iter().all(Filter::is_empty),
            Self::Not(inner) => inner.is_empty(),
            _ => false,
        }
    }

    /// Renders the tree as a `WHERE` fragment, appending bound values to `params`.
    ///
    /// # Errors
    /// - `RepoError::InvalidArgument` for unknown columns, empty groups,
    ///   empty `IN` lists or ordering comparisons against `NULL`.
    pub(crate) fn render(
        &self,
        columns: &[&str],
        sql: &mut String,
        params: &mut Vec<Value>,
    ) -> RepoResult<()> {
        match self {
            Self::Compare { column, op, value } => {
                let column = checked_column(column, columns)?;
                match (op, value) {
                    (CompareOp::Eq, FilterValue::Null) => {
                        sql.push_str(&format!("{column} IS NULL"));
                    }
                    (CompareOp::Ne, FilterValue::Null) => {
                        sql.push_str(&format!("{column} IS NOT NULL"));
                    }
                    (_, FilterValue::Null) => {
                        return Err(RepoError::InvalidArgument(format!(
                            "operator `{}` cannot compare against null",
                            op.as_sql()
                        )));
                    }
                    (CompareOp::Ne, _) => {
                        // `IS NOT` keeps NULL columns: a missing value differs from any operand.
                        params.push(value.to_sql_value());
                        sql.push_str(&format!("{column} IS NOT ?{}", params.len()));
                    }
                    _ => {
                        params.push(value.to_sql_value());
                        sql.push_str(&format!("{column} {} ?{}", op.as_sql(), params.len()));
                    }
                }
            }
            Self::Like { column, pattern } => {
                let column = checked_column(column, columns)?;
                params.push(Value::Text(pattern.clone()));
                sql.push_str(&format!("{column} LIKE ?{}", params.len()));
            }
            Self::IsNull { column } => {
                let column = checked_column(column, columns)?;
                sql.push_str(&format!("{column} IS NULL"));
            }
            Self::IsNotNull { column } => {
                let column = checked_column(column, columns)?;
                sql.push_str(&format!("{column} IS NOT NULL"));
            }
            Self::In { column, values } => {
                let column = checked_column(column, columns)?;
                if values.is_empty() {
                    return Err(RepoError::InvalidArgument(format!(
                        "`in` filter on {column} has no values"
                    )));
                }
                let mut placeholders = Vec::with_capacity(values.len());
                for value in values {
                    params.push(value.to_sql_value());
                    placeholders.push(format!("?{}", params.len()));
                }
                sql.push_str(&format!("{column} IN ({})", placeholders.join(", ")));
            }
            Self::And(items) => render_group(items, " AND ", columns, sql, params)?,
            Self::Or(items) => render_group(items, " OR ", columns, sql, params)?,
            Self::Not(inner) => {
                // An inner test that evaluates to NULL counts as false, so its negation holds.
                sql.push('(');
                inner.render(columns, sql, params)?;
                sql.push_str(") IS NOT 1");
            }
        }
        Ok(())
    }
}

impl Not for Filter {
    type Output = Filter;

    fn not(self) -> Self::Output {
        Filter::Not(Box::new(self))
    }
}

/// Column reference used to build filters: `field("name").eq("A")`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRef {
    column: String,
}

/// Starts a filter on `column`.
pub fn field(column: impl Into<String>) -> FieldRef {
    FieldRef {
        column: column.into(),
    }
}

impl FieldRef {
    fn compare(self, op: CompareOp, value: impl Into<FilterValue>) -> Filter {
        Filter::Compare {
            column: self.column,
            op,
            value: value.into(),
        }
    }

    pub fn eq(self, value: impl Into<FilterValue>) -> Filter {
        self.compare(CompareOp::Eq, value)
    }

    pub fn ne(self, value: impl Into<FilterValue>) -> Filter {
        self.compare(CompareOp::Ne, value)
    }

    pub fn lt(self, value: impl Into<FilterValue>) -> Filter {
        self.compare(CompareOp::Lt, value)
    }

    pub fn le(self, value: impl Into<FilterValue>) -> Filter {
        self.compare(CompareOp::Le, value)
    }

    pub fn gt(self, value: impl Into<FilterValue>) -> Filter {
        self.compare(CompareOp::Gt, value)
    }

    pub fn ge(self, value: impl Into<FilterValue>) -> Filter {
        self.compare(CompareOp::Ge, value)
    }

    pub fn like(self, pattern: impl Into<String>) -> Filter {
        Filter::Like {
            column: self.column,
            pattern: pattern.into(),
        }
    }

    pub fn is_null(self) -> Filter {
        Filter::IsNull {
            column: self.column,
        }
    }

    pub fn is_not_null(self) -> Filter {
        Filter::IsNotNull {
            column: self.column,
        }
    }

    pub fn is_in<V: Into<FilterValue>>(self, values: impl IntoIterator<Item = V>) -> Filter {
        Filter::In {
            column: self.column,
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

fn render_group(
    items: &[Filter],
    separator: &str,
    columns: &[&str],
    sql: &mut String,
    params: &mut Vec<Value>,
) -> RepoResult<()> {
    if items.is_empty() {
        return Err(RepoError::InvalidArgument(
            "filter group has no conditions".to_string(),
        ));
    }

    sql.push('(');
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            sql.push_str(separator);
        }
        item.render(columns, sql, params)?;
    }
    sql.push(')');
    Ok(())
}

fn checked_column(column: &str, columns: &[&str]) -> RepoResult<String> {
    if columns.contains(&column) {
        Ok(quote_identifier(column))
    } else {
        Err(RepoError::InvalidArgument(format!(
            "unknown filter column `{column}`"
        )))
    }
}
