//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for the thing store.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository writes validate paths through the codec before persistence.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicatePath`) in
//!   addition to DB transport errors.

pub mod thing_repo;
