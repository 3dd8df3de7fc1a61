// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Processor: turns one item's raw scans into a servable item directory.
//
// Steps, in order: load the MARC record, tileize every page, copy the
// transcripts and the MARC record, write the manifest, verify it renders to
// JSON. Any failure leaves the processor in `Failed` and surfaces as
// `ProcessingFailed` wrapping the cause. The destination is never promoted
// here; that is the collector's job.

use std::path::{Path, PathBuf};

use folio_core::config::FolioConfig;
use folio_core::error::{FolioError, Result};
use folio_core::paths::{self, ItemName};
use folio_document::Tileizer;
use folio_document::manifest::{
    self, IMAGE_DIR_URI_PLACEHOLDER, MANIFEST_URI_PLACEHOLDER, ManifestInfo,
};
use folio_document::marc::{self, MarcMetadata};
use tracing::{debug, info, instrument, warn};

use crate::integrity::copy_verified;

/// Where a processor is in its run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Created,
    Identified,
    MetadataLoaded,
    Tileized,
    ManifestWritten,
    Verified,
    Failed,
}

pub struct Processor {
    source: PathBuf,
    dest: PathBuf,
    /// Directory name of the item, as found on disk.
    item: String,
    name: ItemName,
    tileizer: Tileizer,
    skip_existing_tiles: bool,
    state: ProcessorState,
}

impl Processor {
    /// Set up processing of the item directory `source` into `dest`.
    ///
    /// Fails with `InvalidDirectoryName` when `source` is not named like an
    /// item.
    pub fn new(
        source: impl Into<PathBuf>,
        dest: impl Into<PathBuf>,
        config: &FolioConfig,
    ) -> Result<Self> {
        let mut processor = Self::created(source.into(), dest.into(), config);
        processor.identify()?;
        Ok(processor)
    }

    fn created(source: PathBuf, dest: PathBuf, config: &FolioConfig) -> Self {
        let item = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            source,
            dest,
            item,
            name: ItemName::default(),
            tileizer: Tileizer::new(config.tiles),
            skip_existing_tiles: config.skip_existing_tiles,
            state: ProcessorState::Created,
        }
    }

    fn identify(&mut self) -> Result<()> {
        self.name = ItemName::parse(&self.item)?;
        self.advance(ProcessorState::Identified);
        info!(
            item = %self.item,
            record_id = %self.name.record_id,
            barcode = %self.name.barcode,
            "Item identified"
        );
        Ok(())
    }

    fn advance(&mut self, to: ProcessorState) {
        debug!(item = %self.item, from = ?self.state, to = ?to, "processor state");
        self.state = to;
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    pub fn name(&self) -> &ItemName {
        &self.name
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Run every step. Returns the path of the written manifest.
    #[instrument(skip_all, fields(item = %self.item))]
    pub fn process(&mut self) -> Result<PathBuf> {
        match self.run() {
            Ok(manifest) => Ok(manifest),
            Err(e) => {
                self.advance(ProcessorState::Failed);
                Err(FolioError::processing_failed(&self.item, e))
            }
        }
    }

    fn run(&mut self) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dest)?;

        let (metadata, marc_path) = self.load_metadata()?;
        self.advance(ProcessorState::MetadataLoaded);

        self.tileizer
            .tileize_all(&self.source, &self.dest, self.skip_existing_tiles);
        self.advance(ProcessorState::Tileized);

        self.copy_transcripts()?;
        if let Some(path) = &marc_path {
            self.copy_into_dest(path)?;
        }

        let info = ManifestInfo::from_metadata(&self.item, metadata.as_ref());
        let manifest = manifest::write_manifest(&self.source, &self.dest, &info)?;
        self.advance(ProcessorState::ManifestWritten);

        self.verify(&manifest)?;
        self.advance(ProcessorState::Verified);
        info!(manifest = %manifest.display(), "Item processed");
        Ok(manifest)
    }

    /// Render `manifest` with the placeholder URIs and parse the result. A
    /// parse failure is a `ProcessingFailed` carrying the parse error.
    pub fn verify(&self, manifest: &Path) -> Result<()> {
        let stored = std::fs::read_to_string(manifest)
            .map_err(|e| FolioError::processing_failed(&self.item, e.into()))?;
        let rendered = manifest::template::substitute(
            &stored,
            MANIFEST_URI_PLACEHOLDER,
            IMAGE_DIR_URI_PLACEHOLDER,
        );
        serde_json::from_str::<serde_json::Value>(&rendered)
            .map_err(|e| FolioError::processing_failed(&self.item, e.into()))?;
        Ok(())
    }

    /// A missing record is logged and tolerated; a record that cannot be
    /// parsed is an error.
    fn load_metadata(&self) -> Result<(Option<MarcMetadata>, Option<PathBuf>)> {
        let Some(path) = marc::locate_record(&self.source, &self.name.record_id) else {
            let missing = FolioError::MetadataUnavailable {
                path: self.source.join(marc::MARC_FILENAME),
                reason: "no MARC record in item directory".into(),
            };
            warn!(error = %missing, "continuing without bibliographic metadata");
            return Ok((None, None));
        };

        let metadata = MarcMetadata::load(&path)?;
        if metadata.is_none() {
            warn!(path = %path.display(), "MARC file holds no record; continuing without metadata");
        }
        Ok((metadata, Some(path)))
    }

    fn copy_transcripts(&self) -> Result<()> {
        let mut copied = 0usize;
        for entry in std::fs::read_dir(&self.source)? {
            let path = entry?.path();
            if path.is_file() && paths::is_text(&path) {
                self.copy_into_dest(&path)?;
                copied += 1;
            }
        }
        info!(copied, "Transcripts copied");
        Ok(())
    }

    fn copy_into_dest(&self, source: &Path) -> Result<()> {
        let Some(name) = source.file_name() else {
            return Ok(());
        };
        copy_verified(source, &self.dest.join(name))?;
        Ok(())
    }
}
