use gallery_index::config::Config;
use gallery_index::gallery::Gallery;
use gallery_index::index::{Index, RelocationRecord, SCHEMA_VERSION};
use rusqlite::Connection;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn record(n: u32) -> RelocationRecord {
    RelocationRecord {
        quarantine_path: PathBuf::from(format!("/g/trash/{n}.jpg")),
        original_path: PathBuf::from(format!("/g/{n}.jpg")),
        relocated_at: f64::from(n),
    }
}

#[test]
fn test_database_deleted_between_operations() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("index.db");
    let index = Index::open(&db_path).unwrap();
    index.ledger().insert(&record(1)).unwrap();

    fs::remove_file(&db_path).unwrap();

    // Reads see an empty, recreated index rather than an error.
    assert!(index.ledger().is_empty().unwrap());
    index.ledger().insert(&record(2)).unwrap();
    assert_eq!(index.ledger().len().unwrap(), 1);
    assert_eq!(index.schema_version().unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_database_overwritten_with_garbage() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("index.db");
    let index = Index::open(&db_path).unwrap();
    index.recency().record_access(Path::new("/g/a.jpg")).unwrap();

    fs::write(&db_path, b"this is not a sqlite database, not even close").unwrap();

    index.recency().record_access(Path::new("/g/b.jpg")).unwrap();
    assert_eq!(index.recency().len().unwrap(), 1);
}

#[test]
fn test_open_garbage_file_recreates_index() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("index.db");
    fs::write(&db_path, vec![0xAB; 4096]).unwrap();

    let index = Index::open(&db_path).unwrap();
    assert!(index.thumbnails().stats().unwrap().entries == 0);
    assert_eq!(index.schema_version().unwrap(), SCHEMA_VERSION);
}

#[test]
fn test_dropped_tables_are_reapplied() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("index.db");
    let index = Index::open(&db_path).unwrap();
    index.ledger().insert(&record(1)).unwrap();

    {
        let conn = Connection::open(&db_path).unwrap();
        conn.execute_batch("DROP TABLE ledger; DROP TABLE recency;")
            .unwrap();
    }

    assert!(index.ledger().list().unwrap().is_empty());
    index.recency().record_access(Path::new("/g/a.jpg")).unwrap();
    assert_eq!(index.recency().len().unwrap(), 1);
}

#[test]
fn test_gallery_survives_database_deletion() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    fs::write(root.join("a.jpg"), b"a").unwrap();
    let gallery = Gallery::open(Config {
        gallery_root: root.clone(),
        ..Config::default()
    })
    .unwrap();
    let moved = gallery.quarantine(&root.join("a.jpg")).unwrap();

    fs::remove_file(gallery.index().path()).unwrap();

    // The ledger is gone, but reconciliation rebuilds it from the layout.
    let report = gallery.reconcile().unwrap();
    assert_eq!(report.resynced, 1);
    assert_eq!(gallery.restore(&moved).unwrap(), root.join("a.jpg"));
}

#[test]
fn test_concurrent_writers_share_one_file() {
    let dir = tempdir().unwrap();
    let index = Index::open(&dir.path().join("index.db")).unwrap();

    std::thread::scope(|scope| {
        for t in 0..4u32 {
            let index = index.clone();
            scope.spawn(move || {
                for i in 0..25u32 {
                    index.ledger().insert(&record(t * 100 + i)).unwrap();
                }
            });
        }
    });

    assert_eq!(index.ledger().len().unwrap(), 100);
}
