//! Operational maintenance endpoints.
//!
//! # Responsibility
//! - Apply pending schema migrations on demand and report the count.

use crate::api::error::{translate, ApiErrorResponse, ApiFailure};
use crate::db::migrations::apply_migrations;
use log::{error, warn};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// Request path of the migration runner route.
pub const RUN_MIGRATIONS_PATH: &str = "/maintenance/run-migrations";

/// Success descriptor of a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub message: String,
    pub migrations_executed: usize,
}

/// Applies pending migrations on `conn`.
///
/// Returns the report on success; any failure becomes an internal-error
/// payload whose message carries no database detail.
pub fn run_migrations(conn: &mut Connection) -> Result<MigrationReport, ApiErrorResponse> {
    warn!("event=migration_run module=api status=start");

    match apply_migrations(conn) {
        Ok(migrations_executed) => {
            warn!("event=migration_run module=api status=ok applied={migrations_executed}");
            Ok(MigrationReport {
                message: "migrations applied successfully".to_string(),
                migrations_executed,
            })
        }
        Err(err) => {
            error!("event=migration_run module=api status=error error={err}");
            Err(translate(
                &ApiFailure::Unexpected(Box::new(err)),
                RUN_MIGRATIONS_PATH,
            ))
        }
    }
}
