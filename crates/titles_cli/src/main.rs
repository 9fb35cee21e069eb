//! Command-line front end for the titles registry.
//!
//! # Responsibility
//! - Map each subcommand onto one title route and its service operation.
//! - Print the success body or the translated error payload as JSON.
//!
//! # Invariants
//! - Domain failures always produce an error payload and exit status 1.
//! - Only bootstrap failures (logging setup, stdout) escape as `anyhow` errors.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use titles_core::api::maintenance::RUN_MIGRATIONS_PATH;
use titles_core::api::request_log::{log_request, log_response, RequestContext};
use titles_core::db::{open_db, open_db_unmigrated};
use titles_core::{
    default_log_level, init_logging, logging_status, parse_title_payload, run_migrations, translate,
    ApiErrorResponse, ApiFailure, SqliteTitleRepository, TitleId, TitleRepository, TitleService,
    TitleSort,
};

const LOCAL_CLIENT: &str = "local";

#[derive(Parser, Debug)]
#[command(
    name = "titles",
    version,
    about = "Manage a registry of uniquely described titles",
    long_about = None,
)]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "TITLES_DB")]
    db: PathBuf,

    /// Log level: trace, debug, info, warn or error.
    #[arg(long, env = "TITLES_LOG_LEVEL", default_value_t = default_log_level().to_string())]
    log_level: String,

    /// Directory for rotated log files. Logging stays off when unset.
    #[arg(long, env = "TITLES_LOG_DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Apply pending schema migrations.
    Migrate,

    /// Create a title from a JSON body, e.g. `{"description":"Invoice"}`.
    Create { body: String },

    /// Fetch one title by id.
    Get { id: String },

    /// List titles one page at a time.
    List {
        /// Zero-based page number.
        #[arg(long, default_value_t = 0)]
        page: u32,

        /// Page size; defaults to 20, capped at 100.
        #[arg(long)]
        size: Option<u32>,

        /// `id` or `description`, optionally followed by `,asc` or `,desc`.
        #[arg(long)]
        sort: Option<String>,
    },

    /// Replace the description of an existing title.
    Update { id: String, body: String },

    /// Delete a title by id.
    Delete { id: String },
}

impl Commands {
    fn method(&self) -> &'static str {
        match self {
            Self::Migrate | Self::Create { .. } => "POST",
            Self::Get { .. } | Self::List { .. } => "GET",
            Self::Update { .. } => "PUT",
            Self::Delete { .. } => "DELETE",
        }
    }

    fn path(&self) -> String {
        match self {
            Self::Migrate => RUN_MIGRATIONS_PATH.to_string(),
            Self::Create { .. } | Self::List { .. } => "/titles".to_string(),
            Self::Get { id } | Self::Update { id, .. } | Self::Delete { id } => {
                format!("/titles/{id}")
            }
        }
    }
}

/// Rendered outcome of one command.
struct Response {
    status_code: u16,
    body: Option<Value>,
    /// Internal detail for the access log; set for unexpected failures only.
    failure: Option<String>,
}

impl Response {
    fn success(status_code: u16, body: Option<Value>) -> Self {
        Self {
            status_code,
            body,
            failure: None,
        }
    }

    fn from_failure(failure: &ApiFailure, path: &str) -> Result<Self> {
        let detail = match failure {
            ApiFailure::Unexpected(err) => Some(err.to_string()),
            _ => None,
        };
        Self::from_payload(translate(failure, path), detail)
    }

    fn from_payload(payload: ApiErrorResponse, failure: Option<String>) -> Result<Self> {
        Ok(Self {
            status_code: payload.status_code,
            body: Some(serde_json::to_value(&payload).context("failed to encode error payload")?),
            failure,
        })
    }

    fn is_success(&self) -> bool {
        self.status_code < 400
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let outcome = run(cli);
    log::logger().flush();
    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("titles: {err:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(log_dir) = cli.log_dir.as_deref() {
        let log_dir = absolute_dir(log_dir)?;
        init_logging(&cli.log_level, &log_dir.to_string_lossy())
            .context("failed to initialize logging")?;
    }
    if let Some((level, log_dir)) = logging_status() {
        info!(
            "event=cli_start module=cli status=ok level={level} log_dir={} db={}",
            log_dir.display(),
            cli.db.display()
        );
    }

    let request = RequestContext::new(cli.command.method(), cli.command.path(), LOCAL_CLIENT);
    log_request(&request);

    let response = match cli.command {
        Commands::Migrate => migrate(&cli.db)?,
        command => match open_db(&cli.db) {
            Ok(conn) => handle(&conn, command, &request.path)?,
            Err(err) => {
                Response::from_failure(&ApiFailure::Unexpected(Box::new(err)), &request.path)?
            }
        },
    };

    log_response(&request, response.status_code, response.failure.as_deref());
    if let Some(body) = &response.body {
        println!(
            "{}",
            serde_json::to_string_pretty(body).context("failed to render response")?
        );
    }

    Ok(if response.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

/// Resolves `--log-dir` against the working directory; the logger only
/// accepts absolute paths.
fn absolute_dir(raw: &str) -> Result<PathBuf> {
    let path = Path::new(raw.trim());
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    Ok(cwd.join(path))
}

fn migrate(db: &Path) -> Result<Response> {
    let mut conn = match open_db_unmigrated(db) {
        Ok(conn) => conn,
        Err(err) => {
            return Response::from_failure(
                &ApiFailure::Unexpected(Box::new(err)),
                RUN_MIGRATIONS_PATH,
            );
        }
    };

    match run_migrations(&mut conn) {
        Ok(report) => {
            let body = serde_json::to_value(&report).context("failed to encode migration report")?;
            Ok(Response::success(200, Some(body)))
        }
        Err(payload) => Response::from_payload(payload, Some("migration failed".to_string())),
    }
}

fn handle(conn: &Connection, command: Commands, path: &str) -> Result<Response> {
    let outcome = SqliteTitleRepository::try_new(conn)
        .map_err(|err| ApiFailure::Unexpected(Box::new(err)))
        .and_then(|repo| execute(&TitleService::new(repo), command));

    match outcome {
        Ok((status_code, body)) => Ok(Response::success(status_code, body)),
        Err(failure) => Response::from_failure(&failure, path),
    }
}

fn execute<R: TitleRepository>(
    service: &TitleService<R>,
    command: Commands,
) -> Result<(u16, Option<Value>), ApiFailure> {
    match command {
        Commands::Create { body } => {
            let description = parse_title_payload(&body)?;
            let created = service.create_title(&description)?;
            Ok((201, Some(to_json(&created)?)))
        }
        Commands::Get { id } => {
            let title = service.get_title(parse_id(&id)?)?;
            Ok((200, Some(to_json(&title)?)))
        }
        Commands::List { page, size, sort } => {
            let sort = sort.as_deref().map(str::parse::<TitleSort>).transpose()?;
            let titles = service.list_titles(page, size, sort)?;
            Ok((200, Some(to_json(&titles)?)))
        }
        Commands::Update { id, body } => {
            let id = parse_id(&id)?;
            let description = parse_title_payload(&body)?;
            let updated = service.update_title(id, &description)?;
            Ok((200, Some(to_json(&updated)?)))
        }
        Commands::Delete { id } => {
            service.delete_title(parse_id(&id)?)?;
            Ok((204, None))
        }
        Commands::Migrate => Err(ApiFailure::RouteNotFound),
    }
}

fn parse_id(raw: &str) -> Result<TitleId, ApiFailure> {
    raw.trim()
        .parse::<TitleId>()
        .map_err(|_| ApiFailure::InvalidParameter {
            name: "id".to_string(),
        })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, ApiFailure> {
    serde_json::to_value(value).map_err(|err| ApiFailure::Unexpected(Box::new(err)))
}
