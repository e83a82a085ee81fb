//! ZIP bundle of renamed images

use std::collections::HashSet;
use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::placement::next_available_name;

/// ZIP archive collecting copies of the images under their generated names
pub struct ZipBundle {
    path: PathBuf,
    writer: ZipWriter<File>,
    names: HashSet<String>,
}

impl ZipBundle {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).with_context(|| format!("Failed to create {path:?}"))?;
        Ok(Self {
            path,
            writer: ZipWriter::new(file),
            names: HashSet::new(),
        })
    }

    /// Add `source` as `name`; a name already in the archive gets a ` (n)`
    /// suffix. Returns the entry name used.
    pub fn add_file(&mut self, source: &Path, name: &str) -> Result<String> {
        let mut input = File::open(source).with_context(|| format!("Failed to open {source:?}"))?;

        let entry = next_available_name(name, |candidate| self.names.contains(candidate));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
        self.writer.start_file(entry.as_str(), options)?;
        std::io::copy(&mut input, &mut self.writer)
            .with_context(|| format!("Failed to add {source:?} to {:?}", self.path))?;

        self.names.insert(entry.clone());
        Ok(entry)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Write the central directory and close the archive
    pub fn finish(self) -> Result<PathBuf> {
        self.writer
            .finish()
            .with_context(|| format!("Failed to finish {:?}", self.path))?;
        Ok(self.path)
    }
}
