use gallery_index::config::Config;
use gallery_index::error::Error;
use gallery_index::gallery::Gallery;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::{tempdir, TempDir};

fn gallery() -> (TempDir, PathBuf, Gallery) {
    let dir = tempdir().unwrap();
    let root = fs::canonicalize(dir.path()).unwrap();
    let gallery = Gallery::open(Config {
        gallery_root: root.clone(),
        quarantine_dir: PathBuf::from("quarantine"),
        reconcile_on_open: false,
        ..Config::default()
    })
    .unwrap();
    (dir, root, gallery)
}

fn write(path: &Path, content: &[u8]) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn test_quarantine_maps_into_quarantine_root() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("a.jpg"), b"a");

    let moved = gallery.quarantine(&root.join("a.jpg")).unwrap();

    assert_eq!(moved, root.join("quarantine/a.jpg"));
    let ledger = gallery.ledger().unwrap();
    assert_eq!(ledger.len(), 1);
    assert_eq!(ledger[0].original_path, root.join("a.jpg"));
}

#[test]
fn test_round_trip_restores_identical_bytes() {
    let (_dir, root, gallery) = gallery();
    let original = root.join("album/2024/beach.png");
    let content: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    write(&original, &content);

    let moved = gallery.quarantine(&original).unwrap();
    assert!(!original.exists());
    let restored = gallery.restore(&moved).unwrap();

    assert_eq!(restored, original);
    assert_eq!(fs::read(&original).unwrap(), content);
    assert!(gallery.ledger().unwrap().is_empty());
    assert!(!root.join("quarantine/album").exists());
}

#[test]
fn test_same_name_never_overwrites() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("cat.jpg"), b"first");
    let first = gallery.quarantine(&root.join("cat.jpg")).unwrap();

    write(&root.join("cat.jpg"), b"second");
    let second = gallery.quarantine(&root.join("cat.jpg")).unwrap();

    write(&root.join("cat.jpg"), b"third");
    let third = gallery.quarantine(&root.join("cat.jpg")).unwrap();

    assert_eq!(first, root.join("quarantine/cat.jpg"));
    assert_eq!(second, root.join("quarantine/cat_1.jpg"));
    assert_eq!(third, root.join("quarantine/cat_2.jpg"));
    assert_eq!(fs::read(&first).unwrap(), b"first");
    assert_eq!(fs::read(&second).unwrap(), b"second");
    assert_eq!(fs::read(&third).unwrap(), b"third");
    assert_eq!(gallery.ledger().unwrap().len(), 3);
}

#[test]
fn test_same_name_in_different_directories() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("one/cat.jpg"), b"1");
    write(&root.join("two/cat.jpg"), b"2");

    let a = gallery.quarantine(&root.join("one/cat.jpg")).unwrap();
    let b = gallery.quarantine(&root.join("two/cat.jpg")).unwrap();

    assert_eq!(a, root.join("quarantine/one/cat.jpg"));
    assert_eq!(b, root.join("quarantine/two/cat.jpg"));
}

#[test]
fn test_restore_without_record_is_not_found() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("quarantine/untracked.jpg"), b"u");

    let err = gallery.restore(&root.join("quarantine/untracked.jpg")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_restore_after_file_vanished_is_not_found() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("a.jpg"), b"a");
    let moved = gallery.quarantine(&root.join("a.jpg")).unwrap();
    fs::remove_file(&moved).unwrap();

    let err = gallery.restore(&moved).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[test]
fn test_purge_all_three_files() {
    let (_dir, root, gallery) = gallery();
    let names = ["a.jpg", "sub/b.png", "sub/deeper/c.gif"];
    let mut moved = Vec::new();
    for name in names {
        write(&root.join(name), name.as_bytes());
        let q = gallery.quarantine(&root.join(name)).unwrap();
        gallery.view(&q).unwrap();
        moved.push(q);
    }

    assert_eq!(gallery.purge_all().unwrap(), 3);

    let leftovers: Vec<_> = fs::read_dir(root.join("quarantine")).unwrap().collect();
    assert!(leftovers.is_empty(), "quarantine root should be empty");
    assert!(gallery.ledger().unwrap().is_empty());
    for q in &moved {
        assert!(gallery.index().recency().get(q).unwrap().is_none());
        assert!(gallery.index().thumbnails().get(q).unwrap().is_none());
    }
    assert_eq!(gallery.purge_all().unwrap(), 0);
}

#[test]
fn test_quarantined_image_leaves_tree_listing() {
    let (_dir, root, gallery) = gallery();
    write(&root.join("keep.jpg"), b"k");
    write(&root.join("drop.jpg"), b"d");

    gallery.quarantine(&root.join("drop.jpg")).unwrap();

    assert_eq!(gallery.images(), vec![root.join("keep.jpg")]);
    assert_eq!(gallery.quarantined_images(), vec![root.join("quarantine/drop.jpg")]);
}
