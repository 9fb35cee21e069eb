//! Domain model for titles and paged results.
//!
//! # Responsibility
//! - Define canonical data structures used by core business logic.
//! - Keep pagination independent from any single entity type.
//!
//! # Invariants
//! - Every title is identified by a store-assigned `TitleId`.
//! - Deletion is a hard delete; there are no tombstones.

pub mod page;
pub mod title;
