// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tileizer: decode a page scan (TIFF or JPEG) and re-encode it as a
// pyramidal tiled TIFF for region/zoom serving by an IIIF image server.
//
// Every level is half the size of the one above it (rounding up) until the
// level fits inside a single tile. Each tile is a self-contained JPEG. Output
// is written to a `.part` sibling first, its tile frames are checked against
// the IFDs, and only then is it renamed into place, so a destination file
// that exists is always complete.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use folio_core::config::TileConfig;
use folio_core::error::{FolioError, Result};
use folio_core::paths;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageBuffer, Pixel, PixelWithColorType, RgbImage};
use tracing::{debug, error, info, instrument};

use crate::tiff::{EncodedLevel, Photometric, PyramidWriter, verify_tile_encoding};

/// Converts page scans into tiled pyramids with a fixed encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tileizer {
    config: TileConfig,
}

/// The decoded page, normalised to one of the two sample layouts we encode.
enum Raster {
    Gray(GrayImage),
    Rgb(RgbImage),
}

impl Tileizer {
    pub fn new(config: TileConfig) -> Self {
        Self { config }
    }

    /// Re-encode `source` as a pyramidal tiled TIFF at `dest`.
    ///
    /// Any decode, encode, or I/O failure is reported as
    /// `TileConversionFailed` naming `source`.
    #[instrument(skip_all, fields(source = %source.display()))]
    pub fn tileize(&self, source: &Path, dest: &Path) -> Result<()> {
        let failed = |reason: String| FolioError::TileConversionFailed {
            path: source.to_path_buf(),
            reason,
        };

        let decoded = image::open(source).map_err(|e| failed(format!("decode: {e}")))?;
        info!(width = decoded.width(), height = decoded.height(), "Image loaded");

        let levels = self.encode_pyramid(decoded).map_err(|e| failed(e.to_string()))?;
        let partial = partial_path(dest);
        let written = write_pyramid(&partial, &levels)
            .and_then(|()| verify_tile_encoding(&partial))
            .and_then(|()| std::fs::rename(&partial, dest).map_err(FolioError::from));
        if let Err(e) = written {
            let _ = std::fs::remove_file(&partial);
            return Err(failed(format!("write {}: {e}", dest.display())));
        }

        info!(dest = %dest.display(), levels = levels.len(), "Pyramid written");
        Ok(())
    }

    /// Tileize every recognised image in `source_dir` into `dest_dir`.
    ///
    /// With `skip_existing`, pages whose destination already exists are left
    /// alone. A page that fails is logged and the batch moves on; callers
    /// inspect the logs, not a return value.
    #[instrument(
        skip_all,
        fields(
            source_dir = %source_dir.display(),
            dest_dir = %dest_dir.display(),
            skip_existing = skip_existing
        )
    )]
    pub fn tileize_all(&self, source_dir: &Path, dest_dir: &Path, skip_existing: bool) {
        let sources = match image_files(source_dir) {
            Ok(sources) => sources,
            Err(e) => {
                error!(error = %e, "cannot list source images");
                return;
            }
        };

        for source in sources {
            let Some(name) = tiled_file_name(&source) else {
                continue;
            };
            let dest = dest_dir.join(name);
            if skip_existing && dest.exists() {
                info!(dest = %dest.display(), "skipping: tiled image already exists");
                continue;
            }
            if let Err(e) = self.tileize(&source, &dest) {
                error!(error = %e, "tile conversion failed; continuing with remaining images");
            }
        }
    }

    fn encode_pyramid(&self, decoded: DynamicImage) -> Result<Vec<EncodedLevel>> {
        let raster = if decoded.color().has_color() {
            Raster::Rgb(decoded.to_rgb8())
        } else {
            Raster::Gray(decoded.to_luma8())
        };
        drop(decoded);

        match raster {
            Raster::Gray(buffer) => self.encode_levels(buffer, Photometric::MinIsBlack),
            Raster::Rgb(buffer) => self.encode_levels(buffer, Photometric::YCbCr),
        }
    }

    fn encode_levels<P>(
        &self,
        full: ImageBuffer<P, Vec<u8>>,
        photometric: Photometric,
    ) -> Result<Vec<EncodedLevel>>
    where
        P: Pixel<Subpixel = u8> + PixelWithColorType + 'static,
    {
        let tile = self.config.tile_size;
        let mut levels = Vec::new();
        let mut current = full;
        loop {
            let (width, height) = current.dimensions();
            levels.push(EncodedLevel {
                width,
                height,
                tile_size: tile,
                photometric,
                tiles: encode_tiles(&current, tile, self.config.jpeg_quality)?,
            });
            if width <= tile && height <= tile {
                break;
            }
            let (next_w, next_h) = (width.div_ceil(2), height.div_ceil(2));
            current = imageops::resize(&current, next_w, next_h, FilterType::Triangle);
            debug!(width = next_w, height = next_h, "Downsampled level");
        }
        Ok(levels)
    }
}

/// Split `level` into `tile` x `tile` blocks in row-major order, padding the
/// right and bottom edges, and JPEG-encode each block.
fn encode_tiles<P>(level: &ImageBuffer<P, Vec<u8>>, tile: u32, quality: u8) -> Result<Vec<Vec<u8>>>
where
    P: Pixel<Subpixel = u8> + PixelWithColorType + 'static,
{
    let (width, height) = level.dimensions();
    let mut tiles = Vec::with_capacity((width.div_ceil(tile) * height.div_ceil(tile)) as usize);
    for y in (0..height).step_by(tile as usize) {
        for x in (0..width).step_by(tile as usize) {
            let w = tile.min(width - x);
            let h = tile.min(height - y);
            let region = imageops::crop_imm(level, x, y, w, h).to_image();
            let block = if w == tile && h == tile {
                region
            } else {
                let mut padded = ImageBuffer::<P, Vec<u8>>::new(tile, tile);
                imageops::replace(&mut padded, &region, 0, 0);
                padded
            };

            let mut encoded = Vec::new();
            block
                .write_with_encoder(JpegEncoder::new_with_quality(&mut encoded, quality))
                .map_err(|e| FolioError::Tiff(format!("JPEG tile encoding failed: {e}")))?;
            tiles.push(encoded);
        }
    }
    Ok(tiles)
}

fn write_pyramid(path: &Path, levels: &[EncodedLevel]) -> Result<()> {
    let mut writer = PyramidWriter::new(BufWriter::new(File::create(path)?))?;
    for level in levels {
        writer.write_level(level)?;
    }
    writer.finish()?;
    Ok(())
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

/// Destination file name for a source image: same stem, `.tif` extension.
pub fn tiled_file_name(source: &Path) -> Option<PathBuf> {
    let mut name = source.file_stem()?.to_os_string();
    name.push(".tif");
    Some(PathBuf::from(name))
}

/// Recognised page images directly inside `dir`, sorted by path.
pub fn image_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && paths::is_image(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
