//! Terminal output

use std::path::{Path, PathBuf};

use crate::batch::{BatchOptions, BatchSummary, FileHandling, FileStatus, ProcessResult};

/// Print one line per processed file
pub fn print_result(done: usize, total: usize, result: &ProcessResult) {
    let original = result
        .source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    match &result.status {
        FileStatus::Renamed | FileStatus::Copied => {
            println!("[{done}/{total}] ✓ {original} → {}", result.final_name());
        }
        FileStatus::Kept => println!("[{done}/{total}] ✓ {original}"),
        FileStatus::ExtractionFailed(e) | FileStatus::PlacementFailed(e) => {
            println!("[{done}/{total}] ✗ {original}: {e}");
        }
    }
}

/// Print the closing summary
pub fn print_summary(
    summary: &BatchSummary,
    options: &BatchOptions,
    report: Option<&(PathBuf, bool)>,
    bundle: Option<&Path>,
) {
    println!();
    if summary.cancelled {
        println!("Processing stopped.");
    } else {
        println!("Processing complete!");
    }
    println!(
        "{}/{} succeeded, {} failed",
        summary.succeeded(),
        summary.results.len(),
        summary.failed()
    );
    for path in &summary.skipped {
        println!("Skipped (not found): {}", path.display());
    }

    if let Some((path, appended)) = report {
        if *appended {
            println!("Appended data to {}", path.display());
        } else {
            println!("Saved compiled data to {}", path.display());
        }
    }
    if let Some(path) = bundle {
        println!("Renamed images written to {}", path.display());
    }

    match options.handling {
        FileHandling::Rename => println!("Files have been renamed."),
        FileHandling::Copy => println!("Files have been copied to 'Processed' folder."),
        FileHandling::Keep => {}
    }
    if options.archive_originals {
        println!("Original source files moved to 'Original' folder.");
    }
}
