//! Repository layer: one generic CRUD + query surface for every entity type.
//!
//! # Responsibility
//! - Validate caller input before it reaches the store.
//! - Decide upserts and removals, then stage them on the unit of work.
//!
//! # Invariants
//! - Nothing is persisted until `save_changes` succeeds.
//! - Absent keys/entities/predicates fail with `InvalidArgument`.
//! - Storage failures surface unchanged; there are no retries.

pub mod generic_repo;
