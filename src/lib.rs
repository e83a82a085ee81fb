//! Receipt renamer - extracts receipt/invoice fields with the Gemini API
//!
//! # Features
//! - Field extraction (date, category, vendor, item, receipt no., amount) from images
//! - Template-based filenames with collision-free placement
//! - Rename in place, or copy into a 'Processed' folder with archiving of originals
//! - CSV report compilation and ZIP bundling of renamed images

pub mod batch;
pub mod cli;
pub mod naming;
pub mod placement;
pub mod report;
pub mod vision;

pub use naming::{generate_filename, sanitize, FieldMapping};
pub use placement::resolve_unique_path;
