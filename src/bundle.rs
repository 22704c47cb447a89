//! Day-directory archiving.
//!
//! Packs one day's report directory into a zip archive next to it. The
//! archive never nests other archives, and a lightweight bundle leaves the
//! screenshot tree out so the email attachment stays small.

use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

/// Subdirectory excluded from lightweight bundles.
const SCREENSHOTS_DIR: &str = "Screenshots";

/// Placeholder entry written when the day directory has nothing to pack.
const EMPTY_PLACEHOLDER: &str = "README.txt";

/// What goes into the archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleMode {
    /// Every artifact, screenshots included.
    Full,
    /// Everything except the screenshots tree.
    Lightweight,
}

#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    #[error("day directory {0:?} does not exist")]
    MissingDayDir(PathBuf),
    #[error("archive io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("archive {path:?} failed verification: {reason}")]
    Verification { path: PathBuf, reason: String },
}

/// Path of the archive produced for `day` under `report_root`.
pub fn archive_path(report_root: &Path, day: &str) -> PathBuf {
    report_root.join(format!("vigil-report-{day}.zip"))
}

/// Pack the day directory into a zip archive and return its path.
///
/// An existing archive for the same day is overwritten. An empty day
/// directory still produces a valid archive containing a single
/// placeholder entry, so delivery always has something to attach.
pub fn bundle_day(report_root: &Path, day: &str, mode: BundleMode) -> Result<PathBuf, BundleError> {
    let day_dir = report_root.join(day);
    if !day_dir.is_dir() {
        return Err(BundleError::MissingDayDir(day_dir));
    }

    let out_path = archive_path(report_root, day);
    let file = File::create(&out_path)?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut entries = 0usize;
    let mut buf = Vec::new();
    for entry in WalkDir::new(&day_dir).min_depth(1) {
        let entry = entry.map_err(|e| {
            BundleError::Io(e.into_io_error().unwrap_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::Other, "walk error")
            }))
        })?;
        let rel = entry
            .path()
            .strip_prefix(&day_dir)
            .expect("walked path is under day dir");

        if mode == BundleMode::Lightweight
            && rel.components().next().map(|c| c.as_os_str()) == Some(SCREENSHOTS_DIR.as_ref())
        {
            debug!("lightweight bundle: skipping {:?}", rel);
            continue;
        }

        let name = rel.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() {
            writer.add_directory(&name, options)?;
            continue;
        }

        // Never pack archives, including the one being written.
        if entry.path().extension().is_some_and(|ext| ext == "zip") {
            continue;
        }

        buf.clear();
        File::open(entry.path())?.read_to_end(&mut buf)?;
        writer.start_file(&name, options)?;
        writer.write_all(&buf)?;
        entries += 1;
    }

    if entries == 0 {
        writer.start_file(EMPTY_PLACEHOLDER, options)?;
        writer.write_all(format!("No report artifacts were produced for {day}.\n").as_bytes())?;
    }

    writer.finish()?;
    info!("bundled {day} into {:?} ({entries} files)", out_path);
    Ok(out_path)
}

/// Check that the archive is readable and non-trivial before delivery.
pub fn verify_archive(path: &Path) -> Result<(), BundleError> {
    let fail = |reason: &str| BundleError::Verification {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let meta = std::fs::metadata(path)?;
    if meta.len() == 0 {
        return Err(fail("archive is zero bytes"));
    }

    let archive = ZipArchive::new(File::open(path)?).map_err(|e| BundleError::Verification {
        path: path.to_path_buf(),
        reason: format!("unreadable central directory: {e}"),
    })?;
    if archive.is_empty() {
        return Err(fail("archive contains no entries"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry_names(path: &Path) -> Vec<String> {
        let mut archive = ZipArchive::new(File::open(path).unwrap()).unwrap();
        (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect()
    }

    #[test]
    fn test_full_bundle_packs_everything() {
        let root = tempfile::tempdir().unwrap();
        let day = "13-07-2026";
        let day_dir = root.path().join(day);
        std::fs::create_dir_all(day_dir.join("Screenshots")).unwrap();
        std::fs::write(day_dir.join("activity_report.txt"), "Working Time: 10\n").unwrap();
        std::fs::write(day_dir.join("Screenshots/shot1.png"), b"png").unwrap();

        let path = bundle_day(root.path(), day, BundleMode::Full).unwrap();
        verify_archive(&path).unwrap();

        let names = entry_names(&path);
        assert!(names.iter().any(|n| n == "activity_report.txt"));
        assert!(names.iter().any(|n| n == "Screenshots/shot1.png"));
    }

    #[test]
    fn test_lightweight_bundle_excludes_screenshots() {
        let root = tempfile::tempdir().unwrap();
        let day = "13-07-2026";
        let day_dir = root.path().join(day);
        std::fs::create_dir_all(day_dir.join("Screenshots")).unwrap();
        std::fs::write(day_dir.join("keystroke_report.txt"), "Total Keystrokes: 5\n").unwrap();
        std::fs::write(day_dir.join("Screenshots/shot1.png"), b"png").unwrap();

        let path = bundle_day(root.path(), day, BundleMode::Lightweight).unwrap();
        verify_archive(&path).unwrap();

        let names = entry_names(&path);
        assert!(names.iter().any(|n| n == "keystroke_report.txt"));
        assert!(!names.iter().any(|n| n.starts_with("Screenshots")));
    }

    #[test]
    fn test_empty_day_gets_placeholder() {
        let root = tempfile::tempdir().unwrap();
        let day = "01-01-2026";
        std::fs::create_dir_all(root.path().join(day)).unwrap();

        let path = bundle_day(root.path(), day, BundleMode::Full).unwrap();
        verify_archive(&path).unwrap();

        let names = entry_names(&path);
        assert_eq!(names, vec![EMPTY_PLACEHOLDER.to_string()]);
    }

    #[test]
    fn test_rebundle_overwrites_and_skips_old_archive() {
        let root = tempfile::tempdir().unwrap();
        let day = "02-01-2026";
        let day_dir = root.path().join(day);
        std::fs::create_dir_all(&day_dir).unwrap();
        std::fs::write(day_dir.join("activity_report.txt"), "Working Time: 10\n").unwrap();
        // A stale archive inside the day dir must not be packed.
        std::fs::write(day_dir.join("old.zip"), b"stale").unwrap();

        let first = bundle_day(root.path(), day, BundleMode::Full).unwrap();
        let second = bundle_day(root.path(), day, BundleMode::Full).unwrap();
        assert_eq!(first, second);

        let names = entry_names(&second);
        assert!(names.iter().all(|n| !n.ends_with(".zip")));
    }

    #[test]
    fn test_missing_day_dir_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        let err = bundle_day(root.path(), "09-09-2026", BundleMode::Full).unwrap_err();
        assert!(matches!(err, BundleError::MissingDayDir(_)));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("bad.zip");
        std::fs::write(&path, b"not a zip at all").unwrap();
        assert!(verify_archive(&path).is_err());

        std::fs::write(&path, b"").unwrap();
        assert!(verify_archive(&path).is_err());
    }
}
