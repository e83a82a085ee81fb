//! Batch processing of receipt images
//!
//! Files are handled one at a time. A failure on one file is recorded in
//! its [`ProcessResult`] and the loop moves on to the next file.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::naming::{generate_filename, FieldMapping, DEFAULT_TEMPLATE, FILE_NAME_KEY};
use crate::placement::{copy_file, copy_to, dotted_extension, rename_in_place, Placement};
use crate::report::ZipBundle;
use crate::vision::{is_supported_image, Extractor};

/// Subfolder receiving renamed copies
pub const PROCESSED_DIR: &str = "Processed";

/// Subfolder receiving untouched copies of the sources
pub const ORIGINAL_DIR: &str = "Original";

/// What happens to a source file after its fields are extracted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum FileHandling {
    /// Rename the file where it is
    Rename,
    /// Copy it under its new name into a 'Processed' subfolder
    #[default]
    Copy,
    /// Leave the file as it is
    Keep,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub handling: FileHandling,
    /// Copy every source into 'Original' first; sources that were copied
    /// elsewhere (or kept) are then removed
    pub archive_originals: bool,
    pub template: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            handling: FileHandling::default(),
            archive_originals: true,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

/// Stop request, checked between files
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    /// Request a stop. Returns `true` if one had already been requested.
    pub fn cancel(&self) -> bool {
        self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Per-file status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileStatus {
    Renamed,
    Copied,
    Kept,
    ExtractionFailed(String),
    PlacementFailed(String),
}

/// Result of processing one file
#[derive(Debug, Clone)]
pub struct ProcessResult {
    /// Path the file had when the batch started
    pub source: PathBuf,
    pub fields: FieldMapping,
    /// New path on success, `source` otherwise
    pub final_path: PathBuf,
    pub status: FileStatus,
}

impl ProcessResult {
    pub fn success(&self) -> bool {
        !matches!(
            self.status,
            FileStatus::ExtractionFailed(_) | FileStatus::PlacementFailed(_)
        )
    }

    /// Basename of the final path
    pub fn final_name(&self) -> String {
        file_name_of(&self.final_path)
    }

    pub fn error(&self) -> Option<&str> {
        match &self.status {
            FileStatus::ExtractionFailed(e) | FileStatus::PlacementFailed(e) => Some(e),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub results: Vec<ProcessResult>,
    /// Inputs that no longer existed when their turn came
    pub skipped: Vec<PathBuf>,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.success()).count()
    }

    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }
}

/// Runs extraction and file handling over a list of images
pub struct BatchRunner<'a> {
    extractor: &'a dyn Extractor,
    options: BatchOptions,
    cancel: CancelFlag,
    bundle: Option<ZipBundle>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(extractor: &'a dyn Extractor, options: BatchOptions) -> Self {
        Self {
            extractor,
            options,
            cancel: CancelFlag::default(),
            bundle: None,
        }
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Also add every successfully extracted image to `bundle` under its new name
    pub fn with_bundle(mut self, bundle: ZipBundle) -> Self {
        self.bundle = Some(bundle);
        self
    }

    /// Hand back the ZIP bundle, if any, so it can be finished
    pub fn take_bundle(&mut self) -> Option<ZipBundle> {
        self.bundle.take()
    }

    /// Process `files` in order. `on_result` is called after each file with
    /// its position, the total count and the result.
    pub async fn run<F>(&mut self, files: &[PathBuf], mut on_result: F) -> BatchSummary
    where
        F: FnMut(usize, usize, &ProcessResult),
    {
        let mut summary = BatchSummary::default();
        let total = files.len();
        info!(files = total, handling = ?self.options.handling, "Processing batch");

        for (i, path) in files.iter().enumerate() {
            if self.cancel.is_cancelled() {
                warn!(remaining = total - i, "Batch cancelled");
                summary.cancelled = true;
                break;
            }

            if !path.exists() {
                warn!(path = ?path, "Skipping file not found");
                summary.skipped.push(path.clone());
                continue;
            }

            let result = self.process_one(path).await;
            on_result(i + 1, total, &result);
            summary.results.push(result);
        }

        summary
    }

    async fn process_one(&mut self, source: &Path) -> ProcessResult {
        let file_name = file_name_of(source);
        let source_dir = source.parent().unwrap_or(Path::new(".")).to_path_buf();

        let archived = if self.options.archive_originals {
            archive_original(source, &source_dir.join(ORIGINAL_DIR), &file_name)
        } else {
            None
        };

        let mut fields = match self.extractor.extract(source).await {
            Ok(fields) => fields,
            Err(e) => {
                warn!(path = ?source, error = %e, "Extraction error");
                FieldMapping::extraction_failed(&file_name, e.to_string())
            }
        };
        if !fields.contains_key(FILE_NAME_KEY) {
            fields.insert(FILE_NAME_KEY, file_name.as_str());
        }

        if let Some(details) = fields.error_details() {
            let status = FileStatus::ExtractionFailed(details.to_string());
            return ProcessResult {
                source: source.to_path_buf(),
                fields,
                final_path: source.to_path_buf(),
                status,
            };
        }

        if let Some(bundle) = self.bundle.as_mut() {
            let name = generate_filename(&fields, &dotted_extension(source), &self.options.template);
            if let Err(e) = bundle.add_file(source, &name) {
                warn!(path = ?source, error = %e, "Error adding to zip");
            }
        }

        let template = self.options.template.as_str();
        let (final_path, status) = match self.options.handling {
            FileHandling::Rename => from_placement(rename_in_place(source, &fields, template), FileStatus::Renamed),
            FileHandling::Copy => {
                let placement = copy_to(source, &fields, &source_dir.join(PROCESSED_DIR), template);
                if placement.is_placed() && archived.is_some() {
                    remove_source(source);
                }
                from_placement(placement, FileStatus::Copied)
            }
            // with an archive copy the file now lives in 'Original'
            FileHandling::Keep => match archived {
                Some(archive_path) if remove_source(source) => (archive_path, FileStatus::Kept),
                _ => (source.to_path_buf(), FileStatus::Kept),
            },
        };

        ProcessResult {
            source: source.to_path_buf(),
            fields,
            final_path,
            status,
        }
    }
}

fn from_placement(placement: Placement, placed: FileStatus) -> (PathBuf, FileStatus) {
    let status = match placement.error() {
        Some(e) => FileStatus::PlacementFailed(e.to_string()),
        None => placed,
    };
    (placement.path().to_path_buf(), status)
}

/// Copy `source` into `archive_dir`, overwriting an earlier copy of the same
/// name. Returns the archive path, or `None` if the copy failed; the source
/// must then stay where it is.
fn archive_original(source: &Path, archive_dir: &Path, file_name: &str) -> Option<PathBuf> {
    let archive_path = archive_dir.join(file_name);
    let result = std::fs::create_dir_all(archive_dir)
        .map_err(|e| e.to_string())
        .and_then(|()| copy_file(source, &archive_path).map_err(|e| e.to_string()));
    match result {
        Ok(()) => {
            debug!(path = ?source, "Archived original");
            Some(archive_path)
        }
        Err(e) => {
            warn!(path = ?source, error = %e, "Error archiving file; keeping source");
            None
        }
    }
}

fn remove_source(source: &Path) -> bool {
    match std::fs::remove_file(source) {
        Ok(()) => true,
        Err(e) => {
            warn!(path = ?source, error = %e, "Error removing original file");
            false
        }
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Expand `inputs` into the list of images to process.
///
/// Folders contribute their supported images (not recursive, sorted by
/// name); files are taken as given if their extension is supported.
pub fn collect_images(inputs: &[PathBuf]) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = std::fs::read_dir(input)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| path.is_file() && is_supported_image(path))
                .collect();
            found.sort();
            files.extend(found);
        } else if is_supported_image(input) {
            files.push(input.clone());
        } else {
            warn!(path = ?input, "Skipping unsupported file");
        }
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn collects_supported_images_sorted() {
        let dir = tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.webp"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("sub.jpg")).unwrap();

        let files = collect_images(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = files.iter().map(|p| file_name_of(p)).collect();
        assert_eq!(names, ["a.jpg", "b.PNG", "c.webp"]);
    }

    #[test]
    fn explicit_files_are_filtered_by_extension() {
        let files = collect_images(&[PathBuf::from("x/receipt.jpeg"), PathBuf::from("x/receipt.pdf")]).unwrap();
        assert_eq!(files, [PathBuf::from("x/receipt.jpeg")]);
    }

    #[test]
    fn cancel_flag_is_shared() {
        let flag = CancelFlag::default();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        assert!(!clone.cancel());
        assert!(flag.is_cancelled());
        // a second request is reported as repeated
        assert!(flag.cancel());
    }
}
