//! Core domain logic for the titles registry.
//! This crate is the single source of truth for business invariants.

pub mod api;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use api::error::{translate, ApiErrorResponse, ApiFailure, FieldError};
pub use api::maintenance::{run_migrations, MigrationReport};
pub use api::payload::{parse_title_payload, TitlePayload};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::page::{Page, PageRequest};
pub use model::title::{Title, TitleDto, TitleId, TitleValidationError};
pub use repo::title_repo::{
    ConstraintKind, ConstraintViolation, RepoError, RepoResult, SqliteTitleRepository,
    TitleListQuery, TitleRepository, TitleSort,
};
pub use service::title_service::{TitleService, TitleServiceError};
