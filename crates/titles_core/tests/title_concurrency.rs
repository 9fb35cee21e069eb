use std::sync::{Arc, Barrier};
use std::thread;
use titles_core::db::open_db;
use titles_core::{SqliteTitleRepository, TitleService, TitleServiceError};

const WRITERS: usize = 8;

#[test]
fn concurrent_creates_of_same_description_admit_exactly_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("race.db");
    drop(open_db(&path).unwrap());

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|index| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = TitleService::new(SqliteTitleRepository::try_new(&conn).unwrap());
                let description = if index % 2 == 0 { "Invoice" } else { "INVOICE" };
                barrier.wait();
                service.create_title(description)
            })
        })
        .collect();

    let outcomes: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    let created = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    let duplicates = outcomes
        .iter()
        .filter(|outcome| matches!(outcome, Err(TitleServiceError::Duplicate { .. })))
        .count();
    assert_eq!(created, 1);
    assert_eq!(duplicates, WRITERS - 1);

    let conn = open_db(&path).unwrap();
    let rows: i64 = conn
        .query_row("SELECT COUNT(*) FROM titles;", [], |row| row.get(0))
        .unwrap();
    assert_eq!(rows, 1);
}

#[test]
fn concurrent_distinct_creates_all_succeed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("distinct.db");
    drop(open_db(&path).unwrap());

    let barrier = Arc::new(Barrier::new(WRITERS));
    let handles: Vec<_> = (0..WRITERS)
        .map(|index| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service = TitleService::new(SqliteTitleRepository::try_new(&conn).unwrap());
                barrier.wait();
                service.create_title(&format!("Title {index}")).map(|title| title.id)
            })
        })
        .collect();

    let mut ids: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), WRITERS);
}
