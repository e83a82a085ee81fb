//! Collision-free placement of renamed files
//!
//! # Concurrency
//!
//! Probing for a free name and the rename/copy that follows are separate
//! filesystem calls with no lock in between. Only one writer process per
//! target directory is supported; two processes working on the same
//! directory can pick the same name and one of them may overwrite the
//! other's file.

use std::fs::{self, FileTimes};
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::naming::{generate_filename, FieldMapping};

/// Filesystem failures while placing a file
#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("failed to create directory {path:?}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to move {from:?} to {to:?}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
    #[error("failed to copy {from:?} to {to:?}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Where a source file ended up
#[derive(Debug)]
pub enum Placement {
    /// Renamed; the source no longer exists at its old path
    Moved(PathBuf),
    /// Copied; the source is untouched
    Copied(PathBuf),
    /// Nothing happened on disk; `original` is the source path
    Unchanged {
        original: PathBuf,
        reason: PlacementError,
    },
}

impl Placement {
    /// Path to show the user: the new path, or the original on failure
    pub fn path(&self) -> &Path {
        match self {
            Placement::Moved(path) | Placement::Copied(path) => path,
            Placement::Unchanged { original, .. } => original,
        }
    }

    pub fn is_placed(&self) -> bool {
        !matches!(self, Placement::Unchanged { .. })
    }

    pub fn error(&self) -> Option<&PlacementError> {
        match self {
            Placement::Unchanged { reason, .. } => Some(reason),
            _ => None,
        }
    }
}

/// First name derived from `desired` for which `is_taken` returns false.
///
/// Tries `desired` itself, then `{stem} (1){ext}`, `{stem} (2){ext}`, ...
/// A leading dot does not start an extension, so `.jpg` has stem `.jpg`.
pub fn next_available_name<F>(desired: &str, mut is_taken: F) -> String
where
    F: FnMut(&str) -> bool,
{
    if !is_taken(desired) {
        return desired.to_string();
    }

    let (stem, ext) = split_extension(desired);
    let mut counter: u64 = 1;
    loop {
        let candidate = format!("{stem} ({counter}){ext}");
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

/// Split `name` into stem and extension (including the dot).
fn split_extension(name: &str) -> (&str, &str) {
    let base_start = name.rfind(['/', '\\']).map_or(0, |i| i + 1);
    match name[base_start..].rfind('.') {
        Some(dot) if !name[base_start..][..dot].trim_start_matches('.').is_empty() => {
            name.split_at(base_start + dot)
        }
        _ => (name, ""),
    }
}

/// Find a path in `directory` for `desired_filename` that does not exist yet.
///
/// `directory` is created first (with parents) if needed.
pub fn resolve_unique_path(directory: &Path, desired_filename: &str) -> Result<PathBuf, PlacementError> {
    fs::create_dir_all(directory).map_err(|source| PlacementError::CreateDir {
        path: directory.to_path_buf(),
        source,
    })?;

    let name = next_available_name(desired_filename, |candidate| directory.join(candidate).exists());
    Ok(directory.join(name))
}

/// Move `source` to `destination`
pub fn move_file(source: &Path, destination: &Path) -> Result<(), PlacementError> {
    fs::rename(source, destination).map_err(|e| PlacementError::Move {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: e,
    })
}

/// Copy `source` to `destination`, keeping the source's timestamps.
///
/// Once the content is copied the call succeeds; failing to restore the
/// timestamps is only logged.
pub fn copy_file(source: &Path, destination: &Path) -> Result<(), PlacementError> {
    fs::copy(source, destination).map_err(|e| PlacementError::Copy {
        from: source.to_path_buf(),
        to: destination.to_path_buf(),
        source: e,
    })?;

    if let Err(e) = restore_times(source, destination) {
        warn!(path = ?destination, error = %e, "Failed to keep file timestamps");
    }
    Ok(())
}

// The copy carries the source's permissions and may be read-only, so the
// handle is opened for reading; the owner can still set its times.
fn restore_times(source: &Path, destination: &Path) -> io::Result<()> {
    let metadata = fs::metadata(source)?;
    let mut times = FileTimes::new();
    if let Ok(modified) = metadata.modified() {
        times = times.set_modified(modified);
    }
    if let Ok(accessed) = metadata.accessed() {
        times = times.set_accessed(accessed);
    }
    fs::File::open(destination)?.set_times(times)
}

/// Extension of `path` with its leading dot, or empty
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{e}"))
        .unwrap_or_default()
}

/// Rename `source` inside its own directory according to `template`
pub fn rename_in_place(source: &Path, fields: &FieldMapping, template: &str) -> Placement {
    let directory = source.parent().unwrap_or(Path::new("."));
    let filename = generate_filename(fields, &dotted_extension(source), template);

    let result = resolve_unique_path(directory, &filename)
        .and_then(|destination| move_file(source, &destination).map(|()| destination));

    match result {
        Ok(destination) => {
            debug!(from = ?source, to = ?destination, "Renamed file");
            Placement::Moved(destination)
        }
        Err(reason) => {
            warn!(path = ?source, error = %reason, "Error renaming file");
            Placement::Unchanged {
                original: source.to_path_buf(),
                reason,
            }
        }
    }
}

/// Copy `source` into `directory` under a name built from `template`
pub fn copy_to(source: &Path, fields: &FieldMapping, directory: &Path, template: &str) -> Placement {
    let filename = generate_filename(fields, &dotted_extension(source), template);

    let result = resolve_unique_path(directory, &filename)
        .and_then(|destination| copy_file(source, &destination).map(|()| destination));

    match result {
        Ok(destination) => {
            debug!(from = ?source, to = ?destination, "Copied file");
            Placement::Copied(destination)
        }
        Err(reason) => {
            warn!(path = ?source, error = %reason, "Error copying file");
            Placement::Unchanged {
                original: source.to_path_buf(),
                reason,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::{sample_mapping, DEFAULT_TEMPLATE};
    use std::collections::HashSet;
    use std::time::{Duration, SystemTime};
    use tempfile::tempdir;

    const SAMPLE_NAME: &str = "2023-10-27 - Food - Starbucks - Coffee - 12345 - RM15.50.jpg";

    #[test]
    fn split_extension_cases() {
        assert_eq!(split_extension("a.jpg"), ("a", ".jpg"));
        assert_eq!(split_extension("a.tar.gz"), ("a.tar", ".gz"));
        assert_eq!(split_extension("noext"), ("noext", ""));
        assert_eq!(split_extension(".jpg"), (".jpg", ""));
        assert_eq!(split_extension("..jpg"), ("..jpg", ""));
        assert_eq!(split_extension("RM15.50.jpg"), ("RM15.50", ".jpg"));
        assert_eq!(split_extension("dir.v2/name"), ("dir.v2/name", ""));
    }

    #[test]
    fn next_available_name_counts_up() {
        let taken: HashSet<&str> = ["r.jpg", "r (1).jpg"].into_iter().collect();
        assert_eq!(next_available_name("r.jpg", |n| taken.contains(n)), "r (2).jpg");
        assert_eq!(next_available_name("s.jpg", |n| taken.contains(n)), "s.jpg");
    }

    #[test]
    fn free_name_is_returned_as_is() {
        let dir = tempdir().unwrap();
        let path = resolve_unique_path(dir.path(), SAMPLE_NAME).unwrap();
        assert_eq!(path, dir.path().join(SAMPLE_NAME));
    }

    #[test]
    fn collision_appends_counter() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SAMPLE_NAME), b"x").unwrap();

        let path = resolve_unique_path(dir.path(), SAMPLE_NAME).unwrap();
        assert_eq!(
            path,
            dir.path().join("2023-10-27 - Food - Starbucks - Coffee - 12345 - RM15.50 (1).jpg")
        );
    }

    #[test]
    fn no_hidden_counter_state() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("r.png"), b"x").unwrap();

        let first = resolve_unique_path(dir.path(), "r.png").unwrap();
        let second = resolve_unique_path(dir.path(), "r.png").unwrap();
        assert_eq!(first, second);

        fs::write(&first, b"y").unwrap();
        let third = resolve_unique_path(dir.path(), "r.png").unwrap();
        assert_eq!(third, dir.path().join("r (2).png"));
    }

    #[test]
    fn creates_missing_directory() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("Processed").join("2024");
        let path = resolve_unique_path(&target, "a.jpg").unwrap();
        assert!(target.is_dir());
        assert_eq!(path, target.join("a.jpg"));
    }

    #[test]
    fn directory_creation_failure_is_reported() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("file");
        fs::write(&blocker, b"x").unwrap();
        let err = resolve_unique_path(&blocker.join("sub"), "a.jpg").unwrap_err();
        assert!(matches!(err, PlacementError::CreateDir { .. }));
    }

    #[test]
    fn rename_in_place_moves_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("IMG_0001.jpg");
        fs::write(&source, b"receipt").unwrap();

        let placement = rename_in_place(&source, &sample_mapping(), DEFAULT_TEMPLATE);
        assert!(matches!(placement, Placement::Moved(_)));
        assert_eq!(placement.path(), dir.path().join(SAMPLE_NAME));
        assert!(!source.exists());
        assert_eq!(fs::read(placement.path()).unwrap(), b"receipt");
    }

    #[test]
    fn rename_in_place_skips_existing_names() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(SAMPLE_NAME), b"older").unwrap();
        let source = dir.path().join("IMG_0002.jpg");
        fs::write(&source, b"newer").unwrap();

        let placement = rename_in_place(&source, &sample_mapping(), DEFAULT_TEMPLATE);
        assert_eq!(
            placement.path().file_name().unwrap(),
            "2023-10-27 - Food - Starbucks - Coffee - 12345 - RM15.50 (1).jpg"
        );
        assert_eq!(fs::read(dir.path().join(SAMPLE_NAME)).unwrap(), b"older");
    }

    #[test]
    fn failed_move_returns_original_path() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("missing.jpg");

        let placement = rename_in_place(&source, &sample_mapping(), DEFAULT_TEMPLATE);
        assert!(!placement.is_placed());
        assert_eq!(placement.path(), source);
        assert!(matches!(placement.error(), Some(PlacementError::Move { .. })));
    }

    #[test]
    fn copy_to_keeps_source_and_mtime() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("IMG_0003.png");
        fs::write(&source, b"receipt").unwrap();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_600_000_000);
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let processed = dir.path().join("Processed");
        let placement = copy_to(&source, &sample_mapping(), &processed, "{Vendor Name}");
        assert!(matches!(placement, Placement::Copied(_)));
        assert_eq!(placement.path(), processed.join("Starbucks.png"));
        assert!(source.exists());
        assert_eq!(fs::metadata(placement.path()).unwrap().modified().unwrap(), mtime);
    }

    #[test]
    fn copy_of_read_only_source_is_reported_as_copied() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("scan.jpg");
        fs::write(&source, b"receipt").unwrap();
        let mtime = SystemTime::UNIX_EPOCH + Duration::from_secs(1_500_000_000);
        fs::File::options()
            .write(true)
            .open(&source)
            .unwrap()
            .set_modified(mtime)
            .unwrap();
        let mut perms = fs::metadata(&source).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&source, perms).unwrap();

        let processed = dir.path().join("Processed");
        let placement = copy_to(&source, &sample_mapping(), &processed, "{Vendor Name}");
        assert!(placement.is_placed(), "{:?}", placement.error());
        assert_eq!(placement.path(), processed.join("Starbucks.jpg"));
        assert_eq!(fs::read(placement.path()).unwrap(), b"receipt");
        #[cfg(unix)]
        assert_eq!(fs::metadata(placement.path()).unwrap().modified().unwrap(), mtime);

        // the copy is a real file, so a second copy is numbered after it
        let again = copy_to(&source, &sample_mapping(), &processed, "{Vendor Name}");
        assert_eq!(again.path(), processed.join("Starbucks (1).jpg"));

        for path in [source.as_path(), placement.path(), again.path()] {
            let mut perms = fs::metadata(path).unwrap().permissions();
            #[allow(clippy::permissions_set_readonly_false)]
            perms.set_readonly(false);
            fs::set_permissions(path, perms).unwrap();
        }
    }

    #[test]
    fn copy_to_uses_fallback_name_for_bad_template() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.jpg");
        fs::write(&source, b"x").unwrap();

        let placement = copy_to(&source, &sample_mapping(), dir.path(), "{Nonexistent}");
        assert_eq!(placement.path(), dir.path().join("Error_Renaming.jpg"));
    }

    #[test]
    fn dotted_extension_cases() {
        assert_eq!(dotted_extension(Path::new("a/b.JPG")), ".JPG");
        assert_eq!(dotted_extension(Path::new("a/b")), "");
    }
}
