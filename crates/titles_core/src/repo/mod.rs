//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//!
//! # Invariants
//! - Repositories own no business rules beyond input normalization.
//! - Repository APIs return semantic errors (`NotFound`, `Constraint`) in
//!   addition to DB transport errors.

pub mod title_repo;
