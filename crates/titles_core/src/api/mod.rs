//! Request-boundary helpers shared by any transport.
//!
//! # Responsibility
//! - Translate failures into the uniform error payload.
//! - Decode request bodies and log request/response events.
//! - Expose the migration runner operation.
//!
//! # Invariants
//! - Nothing here holds per-request state; callers pass paths explicitly.

pub mod error;
pub mod maintenance;
pub mod payload;
pub mod request_log;
