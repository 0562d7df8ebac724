//! Domain model for the thing hierarchy.
//!
//! # Responsibility
//! - Define the stored record shape and its editable attributes.
//! - Own the materialized path codec that encodes hierarchy position.
//!
//! # Invariants
//! - Every thing is identified by a stable `ThingId`.
//! - Deletion is represented by soft-delete tombstones, not hard delete.

pub mod path;
pub mod thing;
