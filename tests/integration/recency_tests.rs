use filetime::{set_file_mtime, FileTime};
use gallery_index::config::Config;
use gallery_index::gallery::Gallery;
use gallery_index::index::Index;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn image_with_mtime(dir: &Path, name: &str, secs: i64) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, name.as_bytes()).unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(secs, 0)).unwrap();
    fs::canonicalize(path).unwrap()
}

#[test]
fn test_oldest_mtime_first_then_next_oldest() {
    let dir = tempdir().unwrap();
    let a = image_with_mtime(dir.path(), "a.jpg", 1_000);
    let b = image_with_mtime(dir.path(), "b.jpg", 2_000);
    let index = Index::open(&dir.path().join("index.db")).unwrap();
    let recency = index.recency();
    let candidates = vec![a.clone(), b.clone()];

    assert_eq!(recency.sync(&candidates).unwrap(), 2);
    assert_eq!(recency.least_recently_accessed(&candidates).unwrap(), Some(a.clone()));

    recency.record_access(&a).unwrap();
    assert_eq!(recency.least_recently_accessed(&candidates).unwrap(), Some(b));
}

#[test]
fn test_unsynced_candidates_are_seeded_on_the_fly() {
    let dir = tempdir().unwrap();
    let newer = image_with_mtime(dir.path(), "newer.jpg", 5_000);
    let older = image_with_mtime(dir.path(), "older.jpg", 10);
    let index = Index::open(&dir.path().join("index.db")).unwrap();

    let picked = index
        .recency()
        .least_recently_accessed(&[newer, older.clone()])
        .unwrap();
    assert_eq!(picked, Some(older));
    assert_eq!(index.recency().len().unwrap(), 2);
}

#[test]
fn test_sync_never_overwrites_recorded_access() {
    let dir = tempdir().unwrap();
    let a = image_with_mtime(dir.path(), "a.jpg", 1_000);
    let index = Index::open(&dir.path().join("index.db")).unwrap();
    let recency = index.recency();

    recency.record_access_at(&a, 42.0).unwrap();
    assert_eq!(recency.sync(&[a.clone()]).unwrap(), 0);
    assert_eq!(recency.get(&a).unwrap().unwrap().last_access_at, 42.0);
}

#[test]
fn test_empty_candidates() {
    let dir = tempdir().unwrap();
    let index = Index::open(&dir.path().join("index.db")).unwrap();
    assert_eq!(index.recency().least_recently_accessed(&[]).unwrap(), None);
}

#[test]
fn test_slideshow_visits_oldest_first() {
    let dir = tempdir().unwrap();
    image_with_mtime(dir.path(), "late.jpg", 3_000);
    let first = image_with_mtime(dir.path(), "early.jpg", 1_000);
    let second = image_with_mtime(dir.path(), "middle.jpg", 2_000);
    let gallery = Gallery::open(Config {
        gallery_root: dir.path().to_path_buf(),
        ..Config::default()
    })
    .unwrap();

    assert_eq!(gallery.next_in_slideshow().unwrap(), Some(first));
    assert_eq!(gallery.next_in_slideshow().unwrap(), Some(second));
}
