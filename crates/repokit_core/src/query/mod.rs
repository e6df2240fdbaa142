//! Store-translatable predicates and deferred queries.
//!
//! # Responsibility
//! - Represent filters as data (an expression tree), never as closures, so
//!   they are pushed down to SQLite as parameterized `WHERE` clauses.
//! - Defer execution until a terminal call consumes the query.
//!
//! # Invariants
//! - Column names are validated against the entity schema before rendering.
//! - Operand values are always bound, never spliced into SQL text.

pub mod filter;
pub mod lazy;

pub use filter::{field, CompareOp, FieldRef, Filter, FilterValue};
pub use lazy::{Query, SortDirection};
