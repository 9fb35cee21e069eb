//! Title use-case service.
//!
//! # Responsibility
//! - Provide create/get/list/update/delete entry points for titles.
//! - Enforce description uniqueness and id existence above the repository.
//! - Translate repository outcomes into typed domain errors.
//!
//! # Invariants
//! - Every mutation runs inside one repository unit of work, so a failed
//!   check leaves no write behind.
//! - A store-level uniqueness rejection is reported exactly like the
//!   service's own duplicate pre-check.
//! - Updating a title to its own description (ignoring case) never reports a
//!   duplicate.

use crate::model::page::{Page, PageRequest};
use crate::model::title::{
    normalize_description, Title, TitleDto, TitleId, TitleValidationError,
};
use crate::repo::title_repo::{RepoError, TitleListQuery, TitleRepository, TitleSort};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Service error for title use-cases.
#[derive(Debug)]
pub enum TitleServiceError {
    /// Description input is blank or too long.
    Validation(TitleValidationError),
    /// Another title already uses this description (ignoring case).
    Duplicate { description: String },
    /// No title with this id exists.
    NotFound(TitleId),
    /// Persistence-layer failure.
    Repo(RepoError),
}

impl TitleServiceError {
    /// Stable code used in log events.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Duplicate { .. } => "duplicate",
            Self::NotFound(_) => "not_found",
            Self::Repo(_) => "repo",
        }
    }
}

impl Display for TitleServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Duplicate { description } => {
                write!(f, "title with description '{description}' already exists")
            }
            Self::NotFound(id) => write!(f, "title not found: {id}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for TitleServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<TitleValidationError> for TitleServiceError {
    fn from(value: TitleValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for TitleServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Title service facade over repository implementations.
pub struct TitleService<R: TitleRepository> {
    repo: R,
}

impl<R: TitleRepository> TitleService<R> {
    /// Creates a service using the provided repository implementation.
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Creates one title from raw description input.
    ///
    /// # Errors
    /// - `Validation` for blank or oversized input.
    /// - `Duplicate` when the description is taken, including when the store
    ///   rejects a concurrent insert that slipped past the pre-check.
    pub fn create_title(&self, description: &str) -> Result<TitleDto, TitleServiceError> {
        let result = normalize_description(description)
            .map_err(TitleServiceError::from)
            .and_then(|description| {
                self.repo.in_unit_of_work(|repo| -> Result<Title, TitleServiceError> {
                    if repo.exists_by_description(&description)? {
                        return Err(TitleServiceError::Duplicate {
                            description: description.clone(),
                        });
                    }
                    repo.insert_title(&description)
                        .map_err(|err| duplicate_or_repo(err, &description))
                })
            })
            .map(TitleDto::from);

        log_outcome("title_create", &result, |dto| dto.id);
        result
    }

    /// Gets one title by id.
    pub fn get_title(&self, id: TitleId) -> Result<TitleDto, TitleServiceError> {
        let title = self
            .repo
            .get_title(id)?
            .ok_or(TitleServiceError::NotFound(id))?;
        debug!("event=title_get module=service status=ok title_id={id}");
        Ok(TitleDto::from(title))
    }

    /// Lists one page of titles.
    ///
    /// An empty store yields an empty page with zero total pages.
    pub fn list_titles(
        &self,
        page_number: u32,
        page_size: Option<u32>,
        sort: Option<TitleSort>,
    ) -> Result<Page<TitleDto>, TitleServiceError> {
        let query = TitleListQuery {
            page: PageRequest::new(page_number, page_size),
            sort: sort.unwrap_or_default(),
        };
        let slice = self.repo.list_titles(&query)?;
        let page = Page::from_slice(slice.rows, slice.total_elements, query.page, TitleDto::from);

        debug!(
            "event=title_list module=service status=ok page={} size={} returned={} total={}",
            page.page_number,
            page.page_size,
            page.number_of_elements(),
            page.total_elements
        );
        Ok(page)
    }

    /// Replaces the description of an existing title.
    ///
    /// # Contract
    /// - `NotFound` when `id` does not exist.
    /// - Input is validated first: an invalid description reports
    ///   `Validation` even when `id` does not exist.
    /// - `Duplicate` only when the new description belongs to another title.
    /// - Writes only when the trimmed description actually changed.
    pub fn update_title(
        &self,
        id: TitleId,
        description: &str,
    ) -> Result<TitleDto, TitleServiceError> {
        let result = normalize_description(description)
            .map_err(TitleServiceError::from)
            .and_then(|description| {
                self.repo.in_unit_of_work(|repo| -> Result<TitleDto, TitleServiceError> {
                    let mut title = repo
                        .get_title(id)?
                        .ok_or(TitleServiceError::NotFound(id))?;

                    if !title.same_description(&description) {
                        if let Some(existing) = repo.find_by_description(&description)? {
                            if existing.id != id {
                                return Err(TitleServiceError::Duplicate {
                                    description: description.clone(),
                                });
                            }
                        }
                    }

                    if title.description != description {
                        title.description = description.clone();
                        repo.update_title(&title)
                            .map_err(|err| duplicate_or_repo(err, &description))?;
                    }

                    Ok(TitleDto::from(title))
                })
            });

        log_outcome("title_update", &result, |dto| dto.id);
        result
    }

    /// Deletes one title by id.
    pub fn delete_title(&self, id: TitleId) -> Result<(), TitleServiceError> {
        let result = self
            .repo
            .in_unit_of_work(|repo| -> Result<(), TitleServiceError> {
                repo.delete_title(id)?;
                Ok(())
            });

        log_outcome("title_delete", &result, |_| id);
        result
    }
}

fn duplicate_or_repo(err: RepoError, description: &str) -> TitleServiceError {
    if err.is_unique_violation() {
        warn!("event=title_unique_race module=service status=error error_code=duplicate");
        return TitleServiceError::Duplicate {
            description: description.to_string(),
        };
    }
    err.into()
}

fn log_outcome<T, F>(event: &str, result: &Result<T, TitleServiceError>, id_of: F)
where
    F: FnOnce(&T) -> TitleId,
{
    match result {
        Ok(value) => info!(
            "event={event} module=service status=ok title_id={}",
            id_of(value)
        ),
        Err(err) if matches!(err, TitleServiceError::Repo(_)) => warn!(
            "event={event} module=service status=error error_code={} error={err}",
            err.code()
        ),
        Err(err) => info!(
            "event={event} module=service status=rejected error_code={}",
            err.code()
        ),
    }
}
