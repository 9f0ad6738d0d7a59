use filetime::{set_file_mtime, FileTime};
use gallery_index::config::Config;
use gallery_index::gallery::Gallery;
use gallery_index::index::CacheEntry;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn config(root: &Path) -> Config {
    Config {
        gallery_root: root.to_path_buf(),
        quarantine_dir: PathBuf::from("quarantine"),
        reconcile_on_open: false,
        ..Config::default()
    }
}

fn gallery() -> (TempDir, PathBuf, Gallery) {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let gallery = Gallery::open(config(&root)).unwrap();
    (dir, root, gallery)
}

fn write(path: &Path) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, b"img").unwrap();
}

#[test]
fn test_ledger_rebuilt_after_database_deleted() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("a.jpg"));
    let moved = gallery.quarantine(&root.join("a.jpg")).unwrap();
    assert_eq!(moved, root.join("quarantine/a.jpg"));
    drop(gallery);

    fs::remove_file(root.join(".igallery.db")).unwrap();
    let reopened = Gallery::open(config(&root)).unwrap();
    assert!(reopened.ledger().unwrap().is_empty());

    let resynced = reopened.reconciler().resync_ledger_from_disk().unwrap();
    assert_eq!(resynced, 1);
    let ledger = reopened.ledger().unwrap();
    assert_eq!(ledger[0].quarantine_path, root.join("quarantine/a.jpg"));
    assert_eq!(ledger[0].original_path, root.join("a.jpg"));

    assert_eq!(reopened.restore(&moved).unwrap(), root.join("a.jpg"));
}

#[test]
fn test_resync_one_record_per_untracked_file() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("quarantine/x.jpg"));
    write(&root.join("quarantine/nested/y.png"));
    write(&root.join("quarantine/notes.txt"));

    assert_eq!(gallery.reconciler().resync_ledger_from_disk().unwrap(), 3);
    let mut originals: Vec<_> = gallery
        .ledger()
        .unwrap()
        .into_iter()
        .map(|r| r.original_path)
        .collect();
    originals.sort();
    assert_eq!(
        originals,
        vec![root.join("nested/y.png"), root.join("notes.txt"), root.join("x.jpg")]
    );
}

#[test]
fn test_resync_keeps_existing_mapping() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("deep/dir/a.jpg"));
    let moved = gallery.quarantine(&root.join("deep/dir/a.jpg")).unwrap();

    assert_eq!(gallery.reconciler().resync_ledger_from_disk().unwrap(), 0);
    let record = gallery.index().ledger().get(&moved).unwrap().unwrap();
    assert_eq!(record.original_path, root.join("deep/dir/a.jpg"));
}

#[test]
fn test_sweep_is_idempotent() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("live.jpg"));
    write(&root.join("doomed.jpg"));
    gallery.view(&root.join("live.jpg")).unwrap();
    gallery.view(&root.join("doomed.jpg")).unwrap();
    gallery
        .index()
        .thumbnails()
        .put(&CacheEntry {
            path: root.join("doomed.jpg"),
            data: vec![1, 2, 3],
            created_at: 1.0,
            source_mtime: 1.0,
            source_size: 3,
        })
        .unwrap();
    fs::remove_file(root.join("doomed.jpg")).unwrap();

    let reconciler = gallery.reconciler();
    let live = reconciler.collect_live().unwrap();
    let first = reconciler.sweep_orphans(&live).unwrap();
    assert_eq!(first.cache, 1);
    assert_eq!(first.recency, 1);

    let live = reconciler.collect_live().unwrap();
    let second = reconciler.sweep_orphans(&live).unwrap();
    assert_eq!(second.total(), 0);
    assert!(gallery.index().recency().get(&root.join("live.jpg")).unwrap().is_some());
}

#[test]
fn test_full_run_after_out_of_band_changes() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("a.jpg"));
    write(&root.join("b.jpg"));
    let qa = gallery.quarantine(&root.join("a.jpg")).unwrap();
    let qb = gallery.quarantine(&root.join("b.jpg")).unwrap();

    // Someone deletes one quarantined file and drops a new one in by hand.
    fs::remove_file(&qb).unwrap();
    write(&root.join("quarantine/manual.jpg"));

    let report = gallery.reconcile().unwrap();
    assert_eq!(report.quarantined_images, 2);
    assert_eq!(report.resynced, 1);
    assert_eq!(report.swept.ledger, 1);

    let mut tracked: Vec<_> = gallery
        .ledger()
        .unwrap()
        .into_iter()
        .map(|r| r.quarantine_path)
        .collect();
    tracked.sort();
    assert_eq!(tracked, vec![qa, root.join("quarantine/manual.jpg")]);
}

#[test]
fn test_reconcile_on_open_recovers_ledger() {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    write(&root.join("quarantine/old.jpg"));

    let gallery = Gallery::open(Config {
        reconcile_on_open: true,
        ..config(&root)
    })
    .unwrap();
    assert_eq!(gallery.ledger().unwrap().len(), 1);
}

#[test]
fn test_non_image_survives_reconcile_and_restores() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("docs/notes.txt"));
    let moved = gallery.quarantine(&root.join("docs/notes.txt")).unwrap();

    let report = gallery.reconcile().unwrap();
    assert_eq!(report.swept.ledger, 0);
    assert_eq!(report.quarantined_images, 1);

    assert_eq!(gallery.restore(&moved).unwrap(), root.join("docs/notes.txt"));
    assert!(root.join("docs/notes.txt").exists());
}

#[test]
fn test_non_image_is_purged_after_reconcile() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("raw.heic"));
    let moved = gallery.quarantine(&root.join("raw.heic")).unwrap();

    gallery.reconcile().unwrap();
    assert_eq!(gallery.purge_all().unwrap(), 1);
    assert!(!moved.exists());
}

#[test]
fn test_future_mtime_record_is_swept_once_file_is_gone() {
    let (_dir, root, gallery) = gallery();
    let path = root.join("quarantine/skewed.jpg");
    write(&path);
    // 2100-01-01
    set_file_mtime(&path, FileTime::from_unix_time(4_102_444_800, 0)).unwrap();

    assert_eq!(gallery.reconcile().unwrap().resynced, 1);
    assert_eq!(gallery.ledger().unwrap()[0].relocated_at, 4_102_444_800.0);
    fs::remove_file(&path).unwrap();

    let report = gallery.reconcile().unwrap();
    assert_eq!(report.swept.ledger, 1);
    assert!(gallery.ledger().unwrap().is_empty());
}
