//! Entity and key contracts shared by every repository.
//!
//! # Responsibility
//! - Describe what a persistable record must expose: identity, collection
//!   name, column layout and row decoding.
//!
//! # Invariants
//! - Identity is immutable once assigned and unique within its collection.
//! - Every key type has one "absent" sentinel distinct from valid keys.

pub mod entity;
