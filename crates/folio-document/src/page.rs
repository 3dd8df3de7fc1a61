// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pages: the tiled page images of one item, with the pyramid geometry the
// manifest advertises to image viewers.

use std::path::{Path, PathBuf};

use folio_core::error::{FolioError, Result};
use folio_core::paths;
use tracing::{debug, warn};

use crate::tiff::read_levels;

/// One tiled page image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Page number taken from the numeric file stem.
    pub number: u32,
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// `(width, height)` of every pyramid level, smallest first.
    pub sizes: Vec<(u32, u32)>,
    /// Full width divided by each level's width, ascending.
    pub scale_factors: Vec<u32>,
}

impl Page {
    /// Describe the tiled TIFF at `path`. Returns `Ok(None)` when the file
    /// name carries no page number.
    pub fn from_tiled_tiff(path: &Path) -> Result<Option<Self>> {
        let Some(number) = paths::page_number(path) else {
            return Ok(None);
        };
        let levels = read_levels(path)?;
        let full = &levels[0];
        if full.width == 0 || full.height == 0 {
            return Err(FolioError::Tiff(format!("{} has zero size", path.display())));
        }

        let mut sizes: Vec<(u32, u32)> = levels.iter().map(|l| (l.width, l.height)).collect();
        sizes.sort_unstable();
        sizes.dedup();

        let mut scale_factors: Vec<u32> = levels
            .iter()
            .filter(|l| l.width > 0)
            .map(|l| (f64::from(full.width) / f64::from(l.width)).round() as u32)
            .collect();
        scale_factors.sort_unstable();
        scale_factors.dedup();

        Ok(Some(Self {
            number,
            path: path.to_path_buf(),
            width: full.width,
            height: full.height,
            tile_width: full.tile_width.unwrap_or(full.width),
            tile_height: full.tile_height.unwrap_or(full.height),
            sizes,
            scale_factors,
        }))
    }

    /// All numbered tiled pages in `dir`, ordered by page number and then
    /// path. Files without a page number are ignored.
    pub fn collect(dir: &Path) -> Result<Vec<Self>> {
        let mut pages = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !paths::is_tiff(&path) {
                continue;
            }
            match Self::from_tiled_tiff(&path)? {
                Some(page) => pages.push(page),
                None => warn!(path = %path.display(), "ignoring image without a page number"),
            }
        }
        pages.sort_by(|a, b| a.number.cmp(&b.number).then_with(|| a.path.cmp(&b.path)));
        debug!(dir = %dir.display(), count = pages.len(), "pages collected");
        Ok(pages)
    }

    /// File name of the tiled image, as served from the item's image
    /// directory.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Where this page's OCR transcript lives, if it has one.
    pub fn transcript_path(&self) -> PathBuf {
        self.path.with_extension("txt")
    }
}
