//! Title repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide lookup, existence, insert, update, delete and paged listing over
//!   the `titles` table.
//! - Run caller-supplied work as one atomic unit of work.
//! - Classify store-level constraint rejections so callers can tell a
//!   uniqueness race apart from other integrity failures.
//!
//! # Invariants
//! - Write paths normalize descriptions before SQL mutations.
//! - Read paths reject invalid persisted state instead of masking it.
//! - Duplicate detection always goes through `description_key`.

use crate::db::migrations::{current_version, latest_version};
use crate::db::DbError;
use crate::model::page::PageRequest;
use crate::model::title::{
    description_key, normalize_description, Title, TitleId, TitleValidationError,
};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{ffi, params, Connection, ErrorCode, Row, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

const TITLE_SELECT_SQL: &str = "SELECT id, description FROM titles";

static CONSTRAINT_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"constraint failed: (?:index '([^']+)'|([A-Za-z_][A-Za-z0-9_]*))$")
        .expect("valid constraint name regex")
});

pub type RepoResult<T> = Result<T, RepoError>;

/// Constraint family reported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    Check,
    NotNull,
    ForeignKey,
    Other,
}

/// Store-level constraint rejection.
///
/// `constraint` holds the constraint name when the store reports one. SQLite
/// names CHECK constraints and expression indexes, but reports plain UNIQUE
/// indexes by their column list, in which case the name stays `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstraintViolation {
    pub kind: ConstraintKind,
    pub constraint: Option<String>,
    pub message: String,
}

impl ConstraintViolation {
    pub fn new(
        kind: ConstraintKind,
        constraint: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            constraint,
            message: message.into(),
        }
    }

    /// Extracts a constraint violation from a SQLite failure, if it is one.
    pub fn from_sqlite(err: &rusqlite::Error) -> Option<Self> {
        let rusqlite::Error::SqliteFailure(failure, message) = err else {
            return None;
        };
        if failure.code != ErrorCode::ConstraintViolation {
            return None;
        }

        let message = message.clone().unwrap_or_else(|| failure.to_string());
        let constraint = CONSTRAINT_NAME_RE.captures(&message).and_then(|caps| {
            caps.get(1)
                .or_else(|| caps.get(2))
                .map(|name| name.as_str().to_string())
        });

        Some(Self {
            kind: constraint_kind(failure.extended_code),
            constraint,
            message,
        })
    }

    pub fn is_unique(&self) -> bool {
        self.kind == ConstraintKind::Unique
    }
}

impl Display for ConstraintViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for ConstraintViolation {}

/// Repository error for title persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(TitleValidationError),
    Db(DbError),
    Constraint(ConstraintViolation),
    NotFound(TitleId),
    InvalidData(String),
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl RepoError {
    /// Whether the store rejected a write on a uniqueness constraint.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Self::Constraint(violation) if violation.is_unique())
    }
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::Constraint(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "title not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid persisted title data: {message}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "required table `{table}` is missing"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "required column `{table}.{column}` is missing")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Constraint(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TitleValidationError> for RepoError {
    fn from(value: TitleValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        match ConstraintViolation::from_sqlite(&value) {
            Some(violation) => Self::Constraint(violation),
            None => Self::Db(DbError::Sqlite(value)),
        }
    }
}

/// Sortable title columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TitleSortField {
    #[default]
    Id,
    Description,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// Ordering for title listings. Defaults to `id,asc`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TitleSort {
    pub field: TitleSortField,
    pub direction: SortDirection,
}

impl TitleSort {
    fn order_by_sql(&self) -> &'static str {
        match (self.field, self.direction) {
            (TitleSortField::Id, SortDirection::Asc) => "id ASC",
            (TitleSortField::Id, SortDirection::Desc) => "id DESC",
            (TitleSortField::Description, SortDirection::Asc) => "description_key ASC, id ASC",
            (TitleSortField::Description, SortDirection::Desc) => {
                "description_key DESC, id DESC"
            }
        }
    }
}

/// Rejected `sort` expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSortError(pub String);

impl Display for InvalidSortError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "invalid sort `{}`; expected id|description[,asc|desc]",
            self.0
        )
    }
}

impl Error for InvalidSortError {}

impl FromStr for TitleSort {
    type Err = InvalidSortError;

    /// Parses `field[,direction]`, e.g. `description,desc`.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidSortError(value.to_string());
        let mut parts = value.split(',').map(|part| part.trim().to_ascii_lowercase());

        let field = match parts.next().as_deref() {
            Some("id") => TitleSortField::Id,
            Some("description") => TitleSortField::Description,
            _ => return Err(invalid()),
        };
        let direction = match parts.next().as_deref() {
            None | Some("asc") => SortDirection::Asc,
            Some("desc") => SortDirection::Desc,
            Some(_) => return Err(invalid()),
        };
        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self { field, direction })
    }
}

/// Query options for listing titles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TitleListQuery {
    pub page: PageRequest,
    pub sort: TitleSort,
}

/// One fetched page of rows plus the total row count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleSlice {
    pub rows: Vec<Title>,
    pub total_elements: u64,
}

/// Repository interface for title persistence.
pub trait TitleRepository {
    fn get_title(&self, id: TitleId) -> RepoResult<Option<Title>>;
    /// Case-insensitive lookup on the normalized description.
    fn find_by_description(&self, description: &str) -> RepoResult<Option<Title>>;
    fn exists_by_description(&self, description: &str) -> RepoResult<bool>;
    /// Inserts a new title and returns it with its store-assigned id.
    fn insert_title(&self, description: &str) -> RepoResult<Title>;
    fn update_title(&self, title: &Title) -> RepoResult<()>;
    fn delete_title(&self, id: TitleId) -> RepoResult<()>;
    fn list_titles(&self, query: &TitleListQuery) -> RepoResult<TitleSlice>;
    /// Runs `work` atomically: all of its reads and writes commit together,
    /// or none of them is observable.
    fn in_unit_of_work<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>;
}

/// SQLite-backed title repository.
pub struct SqliteTitleRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteTitleRepository<'conn> {
    /// Constructs a repository from a migrated/ready connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_title_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl TitleRepository for SqliteTitleRepository<'_> {
    fn get_title(&self, id: TitleId) -> RepoResult<Option<Title>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TITLE_SELECT_SQL} WHERE id = ?1;"))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_title_row(row)?));
        }

        Ok(None)
    }

    fn find_by_description(&self, description: &str) -> RepoResult<Option<Title>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{TITLE_SELECT_SQL} WHERE description_key = ?1;"))?;
        let mut rows = stmt.query([description_key(description)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_title_row(row)?));
        }

        Ok(None)
    }

    fn exists_by_description(&self, description: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(
                SELECT 1 FROM titles WHERE description_key = ?1
            );",
            [description_key(description)],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn insert_title(&self, description: &str) -> RepoResult<Title> {
        let description = normalize_description(description)?;

        self.conn.execute(
            "INSERT INTO titles (description, description_key) VALUES (?1, ?2);",
            params![description.as_str(), description_key(&description)],
        )?;

        Ok(Title {
            id: self.conn.last_insert_rowid(),
            description,
        })
    }

    fn update_title(&self, title: &Title) -> RepoResult<()> {
        let description = normalize_description(&title.description)?;

        let changed = self.conn.execute(
            "UPDATE titles
             SET
                description = ?1,
                description_key = ?2,
                updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?3;",
            params![description.as_str(), description_key(&description), title.id],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(title.id));
        }

        Ok(())
    }

    fn delete_title(&self, id: TitleId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM titles WHERE id = ?1;", [id])?;

        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }

        Ok(())
    }

    fn list_titles(&self, query: &TitleListQuery) -> RepoResult<TitleSlice> {
        run_in_transaction(self.conn, TransactionBehavior::Deferred, || {
            let total: i64 = self
                .conn
                .query_row("SELECT COUNT(*) FROM titles;", [], |row| row.get(0))?;

            let limit = i64::from(query.page.page_size);
            let offset = i64::try_from(query.page.offset()).unwrap_or(i64::MAX);
            let mut stmt = self.conn.prepare(&format!(
                "{TITLE_SELECT_SQL} ORDER BY {} LIMIT ?1 OFFSET ?2;",
                query.sort.order_by_sql()
            ))?;
            let mut rows = stmt.query(params![limit, offset])?;
            let mut titles = Vec::new();
            while let Some(row) = rows.next()? {
                titles.push(parse_title_row(row)?);
            }

            Ok(TitleSlice {
                rows: titles,
                total_elements: u64::try_from(total).unwrap_or(0),
            })
        })
    }

    fn in_unit_of_work<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        run_in_transaction(self.conn, TransactionBehavior::Immediate, || work(self))
    }
}

/// Runs `work` inside a transaction unless the connection already has one
/// open, in which case the outer transaction owns atomicity.
///
/// `Immediate` takes the write lock up front, so two writers never both pass
/// a check before either one writes.
fn run_in_transaction<T, E, F>(
    conn: &Connection,
    behavior: TransactionBehavior,
    work: F,
) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: From<RepoError>,
{
    if !conn.is_autocommit() {
        return work();
    }

    let tx = Transaction::new_unchecked(conn, behavior).map_err(RepoError::from)?;
    // Dropping `tx` on the error path rolls the transaction back.
    let value = work()?;
    tx.commit().map_err(RepoError::from)?;
    Ok(value)
}

fn constraint_kind(extended_code: i32) -> ConstraintKind {
    match extended_code {
        ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
            ConstraintKind::Unique
        }
        ffi::SQLITE_CONSTRAINT_CHECK => ConstraintKind::Check,
        ffi::SQLITE_CONSTRAINT_NOTNULL => ConstraintKind::NotNull,
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
        _ => ConstraintKind::Other,
    }
}

fn parse_title_row(row: &Row<'_>) -> RepoResult<Title> {
    let id: TitleId = row.get("id")?;
    let description: String = row.get("description")?;
    Title::new(id, description.as_str()).map_err(|err| {
        RepoError::InvalidData(format!("invalid description for title {id}: {err}"))
    })
}

fn ensure_title_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version = current_version(conn)?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, "titles")? {
        return Err(RepoError::MissingRequiredTable("titles"));
    }

    for column in ["id", "description", "description_key"] {
        if !table_has_column(conn, "titles", column)? {
            return Err(RepoError::MissingRequiredColumn {
                table: "titles",
                column,
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current == column {
            return Ok(true);
        }
    }
    Ok(false)
}
