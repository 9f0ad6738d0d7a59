use filetime::{set_file_mtime, FileTime};
use gallery_index::config::Config;
use gallery_index::error::Error;
use gallery_index::gallery::Gallery;
use gallery_index::thumbnail::{
    Dimensions, OutputFormat, ThumbnailConfig, ThumbnailError, ThumbnailGenerator,
};
use image::{GenericImageView, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::{tempdir, TempDir};

fn config_for(root: &Path) -> Config {
    Config {
        gallery_root: root.to_path_buf(),
        reconcile_on_open: false,
        ..Config::default()
    }
}

fn write_png(path: &Path, width: u32, height: u32) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    RgbImage::from_pixel(width, height, image::Rgb([200, 40, 90]))
        .save(path)
        .unwrap();
}

fn counting_gallery() -> (TempDir, Gallery, Arc<AtomicUsize>) {
    let dir = tempdir().unwrap();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let generator: Arc<dyn ThumbnailGenerator> = Arc::new(
        move |path: &Path, _max: Dimensions| -> Result<Vec<u8>, ThumbnailError> {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            let content = fs::read(path).map_err(|e| ThumbnailError::Other {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            Ok(format!("{}:{}", n, content.len()).into_bytes())
        },
    );
    let gallery = Gallery::open_with_generator(config_for(dir.path()), generator).unwrap();
    (dir, gallery, calls)
}

#[test]
fn test_real_thumbnail_fits_bounding_box() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wide.png");
    write_png(&path, 900, 300);
    let gallery = Gallery::open(config_for(dir.path())).unwrap();

    let bytes = gallery.thumbnail(&path).unwrap();
    assert_eq!(&bytes[..2], &[0xFF, 0xD8], "default output is JPEG");

    let thumb = image::load_from_memory(&bytes).unwrap();
    assert_eq!(thumb.dimensions(), (300, 100));
}

#[test]
fn test_small_image_is_not_upscaled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tiny.png");
    write_png(&path, 40, 20);
    let mut config = config_for(dir.path());
    config.thumbnail = ThumbnailConfig {
        format: OutputFormat::Png,
        ..ThumbnailConfig::default()
    };
    let gallery = Gallery::open(config).unwrap();

    let bytes = gallery.thumbnail(&path).unwrap();
    let thumb = image::load_from_memory(&bytes).unwrap();
    assert_eq!(thumb.dimensions(), (40, 20));
}

#[test]
fn test_hit_requires_matching_mtime() {
    let (dir, gallery, calls) = counting_gallery();
    let path = dir.path().join("a.jpg");
    fs::write(&path, b"first").unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(1_000, 0)).unwrap();

    let first = gallery.thumbnail(&path).unwrap();
    let second = gallery.thumbnail(&path).unwrap();
    assert_eq!(first, second);
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    set_file_mtime(&path, FileTime::from_unix_time(2_000, 0)).unwrap();
    let third = gallery.thumbnail(&path).unwrap();
    assert_ne!(first, third);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_content_change_with_same_mtime_serves_stale_entry() {
    let (dir, gallery, calls) = counting_gallery();
    let path = dir.path().join("a.jpg");
    fs::write(&path, b"short").unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(1_000, 0)).unwrap();
    let before = gallery.thumbnail(&path).unwrap();

    fs::write(&path, b"much longer content").unwrap();
    set_file_mtime(&path, FileTime::from_unix_time(1_000, 0)).unwrap();
    let after = gallery.thumbnail(&path).unwrap();

    assert_eq!(before, after);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_undecodable_file_is_not_cached() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.jpg");
    fs::write(&path, b"definitely not a jpeg").unwrap();
    let gallery = Gallery::open(config_for(dir.path())).unwrap();

    let err = gallery.thumbnail(&path).unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert_eq!(gallery.cache_stats().unwrap().entries, 0);

    // Fixing the file makes the next request succeed.
    write_png(&path.with_extension("png"), 10, 10);
    fs::rename(path.with_extension("png"), &path).unwrap();
    assert!(gallery.thumbnail(&path).is_ok());
}

#[test]
fn test_missing_file_is_not_found() {
    let (dir, gallery, calls) = counting_gallery();
    let err = gallery.thumbnail(&dir.path().join("ghost.jpg")).unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_warm_then_stats() {
    let (dir, gallery, calls) = counting_gallery();
    for name in ["a.jpg", "b.jpg", "sub/c.png"] {
        let path = dir.path().join(name);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, name.as_bytes()).unwrap();
    }

    let report = gallery.warm();
    assert_eq!(report.generated, 3);
    assert_eq!(report.failed, 0);

    let again = gallery.warm();
    assert_eq!(again.hits, 3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(gallery.cache_stats().unwrap().entries, 3);

    let paths: Vec<PathBuf> = gallery.images();
    assert_eq!(paths.len(), 3);
}
