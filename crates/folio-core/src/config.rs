// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Settings for a pipeline run. Passed explicitly to the collector and each
/// processor; there is no global configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// Directory holding the `ready`, `processing`, and `final` stages.
    pub root: PathBuf,
    /// While this file exists, `collect` does nothing.
    pub stop_file: PathBuf,
    /// Leave already-tileized pages alone instead of re-encoding them.
    pub skip_existing_tiles: bool,
    /// Base URI of the external IIIF image server. An item's image directory
    /// URI is this base joined with the item directory name.
    pub image_server_base: String,
    /// Pyramid encoding parameters.
    pub tiles: TileConfig,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/var/lib/folio"),
            stop_file: PathBuf::from("/var/lib/folio/STOP"),
            skip_existing_tiles: false,
            image_server_base: "http://localhost:8182/iiif/2".into(),
            tiles: TileConfig::default(),
        }
    }
}

/// Fixed encoding parameters for pyramidal TIFF output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Edge length of the square tiles, in pixels.
    pub tile_size: u32,
    /// JPEG quality (1-100) used for every tile.
    pub jpeg_quality: u8,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            tile_size: 256,
            jpeg_quality: 75,
        }
    }
}

impl FolioConfig {
    /// Configuration rooted at `root`, with the stop file inside it.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            stop_file: root.join("STOP"),
            root,
            ..Self::default()
        }
    }

    /// Parse a TOML document. Missing keys take their default values.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| FolioError::Config(format!("parse: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            FolioError::Config(format!("read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.tiles.tile_size == 0 || self.tiles.tile_size % 16 != 0 {
            return Err(FolioError::Config(format!(
                "tiles.tile_size must be a positive multiple of 16, got {}",
                self.tiles.tile_size
            )));
        }
        if !(1..=100).contains(&self.tiles.jpeg_quality) {
            return Err(FolioError::Config(format!(
                "tiles.jpeg_quality must be within 1..=100, got {}",
                self.tiles.jpeg_quality
            )));
        }
        Ok(())
    }
}
