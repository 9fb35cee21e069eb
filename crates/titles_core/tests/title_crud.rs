use rusqlite::Connection;
use titles_core::db::migrations::latest_version;
use titles_core::db::open_db_in_memory;
use titles_core::repo::title_repo::{SortDirection, TitleSlice, TitleSortField};
use titles_core::{
    RepoError, RepoResult, SqliteTitleRepository, Title, TitleId, TitleListQuery,
    TitleRepository, TitleService, TitleServiceError, TitleSort, TitleValidationError,
};

fn service(conn: &Connection) -> TitleService<SqliteTitleRepository<'_>> {
    TitleService::new(SqliteTitleRepository::try_new(conn).unwrap())
}

fn title_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM titles;", [], |row| row.get(0))
        .unwrap()
}

fn stored_description(conn: &Connection, id: TitleId) -> String {
    conn.query_row(
        "SELECT description FROM titles WHERE id = ?1;",
        [id],
        |row| row.get(0),
    )
    .unwrap()
}

/// Repository whose lookups never see existing rows, as if another writer
/// committed between the pre-check and the write.
struct RacingRepository<'conn> {
    inner: SqliteTitleRepository<'conn>,
}

impl TitleRepository for RacingRepository<'_> {
    fn get_title(&self, id: TitleId) -> RepoResult<Option<Title>> {
        self.inner.get_title(id)
    }

    fn find_by_description(&self, _description: &str) -> RepoResult<Option<Title>> {
        Ok(None)
    }

    fn exists_by_description(&self, _description: &str) -> RepoResult<bool> {
        Ok(false)
    }

    fn insert_title(&self, description: &str) -> RepoResult<Title> {
        self.inner.insert_title(description)
    }

    fn update_title(&self, title: &Title) -> RepoResult<()> {
        self.inner.update_title(title)
    }

    fn delete_title(&self, id: TitleId) -> RepoResult<()> {
        self.inner.delete_title(id)
    }

    fn list_titles(&self, query: &TitleListQuery) -> RepoResult<TitleSlice> {
        self.inner.list_titles(query)
    }

    fn in_unit_of_work<T, E, F>(&self, work: F) -> Result<T, E>
    where
        F: FnOnce(&Self) -> Result<T, E>,
        E: From<RepoError>,
    {
        self.inner.in_unit_of_work(|_| work(self))
    }
}

#[test]
fn create_then_get_returns_trimmed_description() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service.create_title("  Invoice \n").unwrap();
    assert_eq!(created.description, "Invoice");

    let fetched = service.get_title(created.id).unwrap();
    assert_eq!(fetched, created);
    assert_eq!(stored_description(&conn, created.id), "Invoice");
}

#[test]
fn second_create_with_case_or_whitespace_variant_is_duplicate() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    service.create_title("Invoice").unwrap();
    for variant in ["Invoice", "INVOICE", "  invoice  "] {
        let err = service.create_title(variant).unwrap_err();
        assert!(
            matches!(&err, TitleServiceError::Duplicate { description } if description == variant.trim()),
            "unexpected error for {variant:?}: {err}"
        );
    }

    assert_eq!(title_count(&conn), 1);
}

#[test]
fn duplicate_detection_folds_non_ascii_case() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    service.create_title("Título").unwrap();
    let err = service.create_title("TÍTULO").unwrap_err();
    assert!(matches!(err, TitleServiceError::Duplicate { .. }));
}

#[test]
fn invalid_description_is_rejected_without_write() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let blank = service.create_title("   ").unwrap_err();
    assert!(matches!(blank, TitleServiceError::Validation(_)));

    let oversized = service.create_title(&"x".repeat(151)).unwrap_err();
    assert!(matches!(oversized, TitleServiceError::Validation(_)));

    assert_eq!(title_count(&conn), 0);
}

#[test]
fn description_with_nul_is_validation_error_not_store_rejection() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let err = service.create_title("\u{0}Invoice").unwrap_err();
    assert!(
        matches!(err, TitleServiceError::Validation(TitleValidationError::ControlCharacter)),
        "unexpected error: {err}"
    );
    assert_eq!(title_count(&conn), 0);

    let created = service.create_title("Invoice").unwrap();
    let err = service.update_title(created.id, "Inv\u{0}oice").unwrap_err();
    assert!(matches!(err, TitleServiceError::Validation(_)));
    assert_eq!(stored_description(&conn, created.id), "Invoice");
}

#[test]
fn update_of_missing_id_with_invalid_description_reports_validation() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let err = service.update_title(9_999, "   ").unwrap_err();
    assert!(matches!(
        err,
        TitleServiceError::Validation(TitleValidationError::BlankDescription)
    ));
}

#[test]
fn update_to_own_description_in_other_case_succeeds() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service.create_title("invoice").unwrap();
    let updated = service.update_title(created.id, " INVOICE ").unwrap();

    assert_eq!(updated.id, created.id);
    assert_eq!(updated.description, "INVOICE");
    assert_eq!(stored_description(&conn, created.id), "INVOICE");
}

#[test]
fn update_with_identical_description_is_a_no_op() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service.create_title("Receipt").unwrap();
    let updated = service.update_title(created.id, "Receipt  ").unwrap();
    assert_eq!(updated, created);
}

#[test]
fn update_colliding_with_another_title_is_duplicate_and_writes_nothing() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let invoice = service.create_title("Invoice").unwrap();
    let receipt = service.create_title("Receipt").unwrap();

    let err = service.update_title(receipt.id, "iNvOiCe").unwrap_err();
    assert!(matches!(err, TitleServiceError::Duplicate { .. }));

    assert_eq!(stored_description(&conn, receipt.id), "Receipt");
    assert_eq!(stored_description(&conn, invoice.id), "Invoice");
}

#[test]
fn update_changes_description() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service.create_title("Draft").unwrap();
    let updated = service.update_title(created.id, "Final").unwrap();

    assert_eq!(updated.description, "Final");
    assert_eq!(service.get_title(created.id).unwrap().description, "Final");
    assert!(service.create_title("Draft").is_ok());
}

#[test]
fn missing_id_is_not_found_for_get_update_and_delete() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    service.create_title("Present").unwrap();

    let missing: TitleId = 9_999;
    let errors = [
        service.get_title(missing).unwrap_err(),
        service.update_title(missing, "Anything").unwrap_err(),
        service.delete_title(missing).unwrap_err(),
    ];

    for err in errors {
        assert!(matches!(err, TitleServiceError::NotFound(id) if id == missing));
        assert!(err.to_string().contains("9999"));
    }
    assert_eq!(title_count(&conn), 1);
}

#[test]
fn delete_removes_title() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let created = service.create_title("Temporary").unwrap();
    service.delete_title(created.id).unwrap();

    assert!(matches!(
        service.get_title(created.id).unwrap_err(),
        TitleServiceError::NotFound(_)
    ));
    assert_eq!(title_count(&conn), 0);
}

#[test]
fn ids_are_not_reused_after_delete() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let first = service.create_title("One").unwrap();
    service.delete_title(first.id).unwrap();
    let second = service.create_title("One").unwrap();

    assert!(second.id > first.id);
}

#[test]
fn list_pages_fifteen_titles_by_ten() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    for index in 1..=15 {
        service.create_title(&format!("Title {index:02}")).unwrap();
    }

    let first = service.list_titles(0, Some(10), None).unwrap();
    assert_eq!(first.content.len(), 10);
    assert_eq!(first.total_elements, 15);
    assert_eq!(first.total_pages, 2);
    assert!(first.has_next);
    assert!(!first.has_previous);
    assert_eq!(first.content[0].description, "Title 01");

    let second = service.list_titles(1, Some(10), None).unwrap();
    assert_eq!(second.content.len(), 5);
    assert!(!second.has_next);
    assert!(second.has_previous);
    assert_eq!(second.content[4].description, "Title 15");
}

#[test]
fn list_on_empty_store_is_an_empty_page() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);

    let page = service.list_titles(0, Some(10), None).unwrap();
    assert_eq!(page.total_elements, 0);
    assert_eq!(page.total_pages, 0);
    assert!(page.content.is_empty());
    assert!(!page.has_next);
    assert!(!page.has_previous);
}

#[test]
fn list_sorts_by_description_ignoring_case() {
    let conn = open_db_in_memory().unwrap();
    let service = service(&conn);
    for description in ["beta", "Alpha", "gamma"] {
        service.create_title(description).unwrap();
    }

    let sort = TitleSort {
        field: TitleSortField::Description,
        direction: SortDirection::Desc,
    };
    let page = service.list_titles(0, None, Some(sort)).unwrap();
    let order: Vec<_> = page
        .content
        .iter()
        .map(|dto| dto.description.as_str())
        .collect();
    assert_eq!(order, ["gamma", "beta", "Alpha"]);
}

#[test]
fn store_uniqueness_rejection_on_create_is_reported_as_duplicate() {
    let conn = open_db_in_memory().unwrap();
    service(&conn).create_title("Invoice").unwrap();

    let racing = TitleService::new(RacingRepository {
        inner: SqliteTitleRepository::try_new(&conn).unwrap(),
    });
    let err = racing.create_title("INVOICE").unwrap_err();

    assert!(matches!(err, TitleServiceError::Duplicate { description } if description == "INVOICE"));
    assert_eq!(title_count(&conn), 1);
}

#[test]
fn store_uniqueness_rejection_on_update_rolls_back() {
    let conn = open_db_in_memory().unwrap();
    let plain = service(&conn);
    plain.create_title("Invoice").unwrap();
    let receipt = plain.create_title("Receipt").unwrap();

    let racing = TitleService::new(RacingRepository {
        inner: SqliteTitleRepository::try_new(&conn).unwrap(),
    });
    let err = racing.update_title(receipt.id, "invoice").unwrap_err();

    assert!(matches!(err, TitleServiceError::Duplicate { .. }));
    assert_eq!(stored_description(&conn, receipt.id), "Receipt");
}

#[test]
fn failed_unit_of_work_leaves_no_write() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTitleRepository::try_new(&conn).unwrap();

    let result: Result<(), RepoError> = repo.in_unit_of_work(|repo| {
        repo.insert_title("Rolled back")?;
        Err(RepoError::InvalidData("abort".to_string()))
    });

    assert!(result.is_err());
    assert_eq!(title_count(&conn), 0);
    assert!(conn.is_autocommit());
}

#[test]
fn repository_insert_surfaces_unique_constraint() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteTitleRepository::try_new(&conn).unwrap();

    repo.insert_title("Invoice").unwrap();
    let err = repo.insert_title("invoice").unwrap_err();
    assert!(err.is_unique_violation(), "unexpected error: {err}");
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteTitleRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_missing_required_column() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(
        "CREATE TABLE titles (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            description TEXT NOT NULL
        );",
    )
    .unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteTitleRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredColumn {
            table: "titles",
            column: "description_key"
        })
    ));
}
