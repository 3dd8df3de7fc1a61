// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Read-only view of one item directory. This is what the lending site asks
// of a final item: is it complete, and what is its manifest for a given pair
// of URIs.

use std::io;
use std::path::{Path, PathBuf};

use folio_core::error::{FolioError, Result};
use folio_core::paths::{self, ItemName};
use folio_document::manifest::{self, ManifestSource};
use folio_document::marc;
use folio_document::tiling::tileizer::image_files;
use tracing::{debug, instrument};

#[derive(Debug, Clone)]
pub struct ItemDirectory {
    path: PathBuf,
    name: ItemName,
}

impl ItemDirectory {
    /// Open an existing directory whose name parses as an item name.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if !path.is_dir() {
            return Err(FolioError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", path.display()),
            )));
        }
        let dir_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = ItemName::parse(&dir_name)?;
        Ok(Self { path, name })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &ItemName {
        &self.name
    }

    pub fn marc_path(&self) -> Option<PathBuf> {
        marc::locate_record(&self.path, &self.name.record_id)
    }

    /// Numbered page images, sorted by path.
    pub fn page_images(&self) -> Result<Vec<PathBuf>> {
        Ok(image_files(&self.path)?
            .into_iter()
            .filter(|p| paths::page_number(p).is_some())
            .collect())
    }

    /// OCR transcripts, sorted by path.
    pub fn transcripts(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&self.path)? {
            let path = entry?.path();
            if path.is_file() && paths::is_text(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn manifest_source(&self) -> ManifestSource {
        ManifestSource::detect(&self.path)
    }

    /// At least one page image, a MARC record, and a manifest source.
    #[instrument(skip_all, fields(item = %self.name))]
    pub fn is_complete(&self) -> bool {
        let pages = self.page_images().map(|p| p.len()).unwrap_or(0);
        let marc = self.marc_path().is_some();
        let manifest = self.manifest_source() != ManifestSource::Missing;
        debug!(pages, marc, manifest, "completeness check");
        self.path.is_dir() && pages > 0 && marc && manifest
    }

    /// The item's manifest with its placeholders replaced.
    pub fn render_manifest(&self, manifest_uri: &str, image_dir_uri: &str) -> Result<String> {
        manifest::render(&self.path, manifest_uri, image_dir_uri)
    }
}
