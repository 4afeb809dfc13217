//! Directory ingestion for retrieval pipelines.
//!
//! [`DirectoryReader`] finds every PDF under a directory, parses the files on
//! the rayon pool and turns each into a [`RagDocument`]: the flattened text
//! plus a little provenance metadata.

use std::path::{Path, PathBuf};
use std::thread;

use crossbeam_channel::{unbounded, Receiver};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::ninja::PdfNinja;
use crate::parser::ParseOptions;
use crate::render::{to_text, TextOptions};

/// One parsed file, ready for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RagDocument {
    pub text: String,
    pub metadata: RagMetadata,
}

/// Provenance of a [`RagDocument`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RagMetadata {
    pub file_path: String,
    pub file_name: String,
    pub page_count: u32,
}

/// Reads every `*.pdf` file (any case) below a directory.
#[derive(Debug, Clone)]
pub struct DirectoryReader {
    root: PathBuf,
    recursive: bool,
    options: ParseOptions,
    text: TextOptions,
}

impl DirectoryReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            recursive: true,
            // Files are already spread over the pool.
            options: ParseOptions::default().sequential(),
            text: TextOptions::default(),
        }
    }

    /// Descend into subdirectories (default) or only read the top level.
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Options used for every file.
    pub fn with_options(mut self, options: ParseOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_text_options(mut self, text: TextOptions) -> Self {
        self.text = text;
        self
    }

    /// PDF files under the root, sorted by path.
    pub fn files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root.display()),
            )));
        }

        let walker = WalkDir::new(&self.root)
            .max_depth(if self.recursive { usize::MAX } else { 1 })
            .sort_by_file_name();
        let files = walker
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("Skipping unreadable entry: {}", err);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_pdf_path(entry.path()))
            .map(|entry| entry.into_path())
            .collect();
        Ok(files)
    }

    /// Parse every file. Failures are logged and skipped, as are documents
    /// without text. Results are in path order.
    pub fn load_data(&self) -> Result<Vec<RagDocument>> {
        let files = self.files()?;
        log::debug!("Reading {} PDF files from {}", files.len(), self.root.display());
        Ok(files
            .par_iter()
            .filter_map(|path| self.load_file(path))
            .collect())
    }

    /// Parse every file on the rayon pool and deliver documents as they
    /// complete. The channel closes once all files are done.
    pub fn stream(&self) -> Result<Receiver<RagDocument>> {
        let files = self.files()?;
        let (tx, rx) = unbounded();
        let reader = self.clone();
        thread::spawn(move || {
            files.par_iter().for_each_with(tx, |tx, path| {
                if let Some(doc) = reader.load_file(path) {
                    // The receiver may have been dropped; nothing to do then.
                    let _ = tx.send(doc);
                }
            });
        });
        Ok(rx)
    }

    fn load_file(&self, path: &Path) -> Option<RagDocument> {
        let parsed = match PdfNinja::with_options(self.options.clone()).parse(path) {
            Ok(parsed) => parsed,
            Err(err) => {
                log::error!("Failed to parse {}: {}", path.display(), err);
                return None;
            }
        };

        let text = to_text(&parsed, &self.text);
        if text.trim().is_empty() {
            log::debug!("Skipping {}: no text", path.display());
            return None;
        }

        Some(RagDocument {
            text,
            metadata: RagMetadata {
                file_path: path.display().to_string(),
                file_name: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                page_count: parsed.page_count(),
            },
        })
    }
}

fn is_pdf_path(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("pdf"))
}
