// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pyramid writer: streams pre-encoded tile pyramids into a little-endian
// classic TIFF, one IFD per level.
//
// Layout per level: tile data, then the IFD, then the IFD's out-of-line
// values. The previous IFD's "next" pointer is patched once the new IFD's
// offset is known, so the file is written front to back with one short seek
// per level.

use std::io::{Seek, SeekFrom, Write};

use folio_core::error::{FolioError, Result};
use tracing::debug;

use super::{COMPRESSION_JPEG, PHOTOMETRIC_YCBCR, SUBFILE_REDUCED, field_type, tag};

/// Colour model of the encoded tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Photometric {
    /// One 8-bit sample per pixel, 0 is black.
    MinIsBlack,
    /// Three 8-bit samples, JPEG-encoded as YCbCr.
    YCbCr,
}

impl Photometric {
    fn samples_per_pixel(&self) -> u16 {
        match self {
            Self::MinIsBlack => 1,
            Self::YCbCr => 3,
        }
    }

    fn tag_value(&self) -> u16 {
        match self {
            Self::MinIsBlack => 1,
            Self::YCbCr => PHOTOMETRIC_YCBCR,
        }
    }
}

/// One pyramid level whose tiles are already JPEG-encoded, in row-major
/// order, each exactly `tile_size` square before compression.
#[derive(Debug, Clone)]
pub struct EncodedLevel {
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub photometric: Photometric,
    pub tiles: Vec<Vec<u8>>,
}

impl EncodedLevel {
    /// Number of tiles the level's dimensions call for.
    pub fn expected_tiles(&self) -> usize {
        let across = self.width.div_ceil(self.tile_size) as usize;
        let down = self.height.div_ceil(self.tile_size) as usize;
        across * down
    }
}

struct Entry {
    tag: u16,
    field_type: u16,
    count: u32,
    bytes: Vec<u8>,
}

impl Entry {
    fn shorts(tag: u16, values: &[u16]) -> Self {
        Self {
            tag,
            field_type: field_type::SHORT,
            count: values.len() as u32,
            bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }

    fn longs(tag: u16, values: &[u32]) -> Self {
        Self {
            tag,
            field_type: field_type::LONG,
            count: values.len() as u32,
            bytes: values.iter().flat_map(|v| v.to_le_bytes()).collect(),
        }
    }
}

/// Writes a tiled pyramid into any seekable sink.
///
/// ```ignore
/// let mut writer = PyramidWriter::new(BufWriter::new(File::create(path)?))?;
/// for level in &levels {
///     writer.write_level(level)?;
/// }
/// writer.finish()?;
/// ```
pub struct PyramidWriter<W: Write + Seek> {
    out: W,
    /// Current end-of-file offset.
    pos: u64,
    /// Offset of the pointer that must receive the next IFD's offset.
    link_at: u64,
    levels: usize,
}

impl<W: Write + Seek> PyramidWriter<W> {
    /// Write the TIFF header. The first-IFD pointer is filled in by the first
    /// `write_level`.
    pub fn new(mut out: W) -> Result<Self> {
        out.write_all(b"II")?;
        out.write_all(&42u16.to_le_bytes())?;
        out.write_all(&0u32.to_le_bytes())?;
        Ok(Self {
            out,
            pos: 8,
            link_at: 4,
            levels: 0,
        })
    }

    /// Append one level. The first level written is the full-resolution image;
    /// every later one is flagged as a reduced-resolution copy.
    pub fn write_level(&mut self, level: &EncodedLevel) -> Result<()> {
        if level.tiles.len() != level.expected_tiles() {
            return Err(FolioError::Tiff(format!(
                "level {}x{} needs {} tiles, got {}",
                level.width,
                level.height,
                level.expected_tiles(),
                level.tiles.len()
            )));
        }

        let mut offsets = Vec::with_capacity(level.tiles.len());
        let mut counts = Vec::with_capacity(level.tiles.len());
        for tile in &level.tiles {
            offsets.push(self.offset32()?);
            counts.push(u32::try_from(tile.len()).map_err(|_| {
                FolioError::Tiff("tile larger than 4 GiB".into())
            })?);
            self.emit(tile)?;
        }
        self.align()?;

        let spp = level.photometric.samples_per_pixel();
        let subfile = if self.levels == 0 { 0 } else { SUBFILE_REDUCED };
        let tile_size = u16::try_from(level.tile_size)
            .map_err(|_| FolioError::Tiff(format!("tile size {} too large", level.tile_size)))?;

        let mut entries = vec![
            Entry::longs(tag::NEW_SUBFILE_TYPE, &[subfile]),
            Entry::longs(tag::IMAGE_WIDTH, &[level.width]),
            Entry::longs(tag::IMAGE_LENGTH, &[level.height]),
            Entry::shorts(tag::BITS_PER_SAMPLE, &vec![8; spp as usize]),
            Entry::shorts(tag::COMPRESSION, &[COMPRESSION_JPEG]),
            Entry::shorts(tag::PHOTOMETRIC_INTERPRETATION, &[level.photometric.tag_value()]),
            Entry::shorts(tag::SAMPLES_PER_PIXEL, &[spp]),
            Entry::shorts(tag::PLANAR_CONFIGURATION, &[1]),
            Entry::shorts(tag::TILE_WIDTH, &[tile_size]),
            Entry::shorts(tag::TILE_LENGTH, &[tile_size]),
            Entry::longs(tag::TILE_OFFSETS, &offsets),
            Entry::longs(tag::TILE_BYTE_COUNTS, &counts),
        ];
        // The JPEG encoder writes full-resolution chroma; the tag's default
        // of 2x2 would not match.
        if level.photometric == Photometric::YCbCr {
            entries.push(Entry::shorts(tag::YCBCR_SUBSAMPLING, &[1, 1]));
        }

        let ifd_offset = self.offset32()?;
        self.write_ifd(&entries)?;
        self.patch_link(ifd_offset)?;
        self.link_at = u64::from(ifd_offset) + 2 + 12 * entries.len() as u64;
        self.levels += 1;

        debug!(
            level = self.levels - 1,
            width = level.width,
            height = level.height,
            tiles = level.tiles.len(),
            "pyramid level written"
        );
        Ok(())
    }

    /// Flush and return the sink. Fails if no level was written.
    pub fn finish(mut self) -> Result<W> {
        if self.levels == 0 {
            return Err(FolioError::Tiff("pyramid has no levels".into()));
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_ifd(&mut self, entries: &[Entry]) -> Result<()> {
        let ifd_len = 2 + 12 * entries.len() as u64 + 4;
        let mut overflow_at = self.pos + ifd_len;
        let mut ifd = Vec::with_capacity(ifd_len as usize);
        let mut overflow = Vec::new();

        ifd.extend_from_slice(&(entries.len() as u16).to_le_bytes());
        for entry in entries {
            ifd.extend_from_slice(&entry.tag.to_le_bytes());
            ifd.extend_from_slice(&entry.field_type.to_le_bytes());
            ifd.extend_from_slice(&entry.count.to_le_bytes());
            if entry.bytes.len() <= 4 {
                let mut inline = [0u8; 4];
                inline[..entry.bytes.len()].copy_from_slice(&entry.bytes);
                ifd.extend_from_slice(&inline);
            } else {
                let at = u32::try_from(overflow_at).map_err(|_| too_large())?;
                ifd.extend_from_slice(&at.to_le_bytes());
                overflow.extend_from_slice(&entry.bytes);
                if entry.bytes.len() % 2 == 1 {
                    overflow.push(0);
                }
                overflow_at = self.pos + ifd_len + overflow.len() as u64;
            }
        }
        ifd.extend_from_slice(&0u32.to_le_bytes());

        self.emit(&ifd)?;
        self.emit(&overflow)?;
        Ok(())
    }

    fn patch_link(&mut self, target: u32) -> Result<()> {
        self.out.seek(SeekFrom::Start(self.link_at))?;
        self.out.write_all(&target.to_le_bytes())?;
        self.out.seek(SeekFrom::Start(self.pos))?;
        Ok(())
    }

    fn emit(&mut self, bytes: &[u8]) -> Result<()> {
        self.out.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(())
    }

    /// IFDs and out-of-line values must start on a word boundary.
    fn align(&mut self) -> Result<()> {
        if self.pos % 2 == 1 {
            self.emit(&[0])?;
        }
        Ok(())
    }

    fn offset32(&self) -> Result<u32> {
        u32::try_from(self.pos).map_err(|_| too_large())
    }
}

fn too_large() -> FolioError {
    FolioError::Tiff("pyramid exceeds the 4 GiB classic TIFF limit".into())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::tiff::reader::{parse_levels, read_tile};

    fn level(width: u32, height: u32, photometric: Photometric) -> EncodedLevel {
        let mut level = EncodedLevel {
            width,
            height,
            tile_size: 16,
            photometric,
            tiles: Vec::new(),
        };
        // Odd-length payloads exercise word alignment.
        level.tiles = (0..level.expected_tiles()).map(|i| vec![i as u8; 3]).collect();
        level
    }

    #[test]
    fn writes_readable_pyramid() {
        let mut writer = PyramidWriter::new(Cursor::new(Vec::new())).expect("header");
        writer.write_level(&level(40, 20, Photometric::YCbCr)).expect("level 0");
        writer.write_level(&level(20, 10, Photometric::YCbCr)).expect("level 1");
        writer.write_level(&level(10, 5, Photometric::YCbCr)).expect("level 2");
        let mut cursor = writer.finish().expect("finish");

        cursor.set_position(0);
        let levels = parse_levels(&mut cursor).expect("parse");
        let dims: Vec<_> = levels.iter().map(|l| (l.width, l.height)).collect();
        assert_eq!(dims, vec![(40, 20), (20, 10), (10, 5)]);
        assert!(levels.iter().all(|l| l.tile_width == Some(16) && l.tile_height == Some(16)));
        assert!(!levels[0].reduced);
        assert!(levels[1].reduced && levels[2].reduced);
        assert!(levels.iter().all(|l| l.photometric == Some(6)));
        assert!(levels.iter().all(|l| l.ycbcr_subsampling == Some((1, 1))));
    }

    #[test]
    fn first_tile_points_at_first_payload() {
        let mut writer = PyramidWriter::new(Cursor::new(Vec::new())).expect("header");
        let mut first = level(40, 20, Photometric::YCbCr);
        first.tiles[0] = vec![0xAB; 5];
        writer.write_level(&first).expect("level 0");
        writer.write_level(&level(16, 16, Photometric::YCbCr)).expect("level 1");
        let mut cursor = writer.finish().expect("finish");

        let levels = parse_levels(&mut cursor).expect("parse");
        let tile = read_tile(&mut cursor, &levels[0]).expect("tile");
        assert_eq!(tile, vec![0xAB; 5]);
        // One tile per level keeps the offset inline in the IFD entry.
        assert_eq!(read_tile(&mut cursor, &levels[1]).expect("tile"), vec![0u8; 3]);
    }

    #[test]
    fn single_level_greyscale() {
        let mut writer = PyramidWriter::new(Cursor::new(Vec::new())).expect("header");
        writer.write_level(&level(16, 16, Photometric::MinIsBlack)).expect("level");
        let mut cursor = writer.finish().expect("finish");
        cursor.set_position(0);
        let levels = parse_levels(&mut cursor).expect("parse");
        assert_eq!(levels.len(), 1);
        assert_eq!(levels[0].samples_per_pixel, Some(1));
        assert_eq!(levels[0].photometric, Some(1));
        assert_eq!(levels[0].ycbcr_subsampling, None);
    }

    #[test]
    fn rejects_wrong_tile_count() {
        let mut bad = level(40, 20, Photometric::YCbCr);
        bad.tiles.pop();
        let mut writer = PyramidWriter::new(Cursor::new(Vec::new())).expect("header");
        assert!(matches!(writer.write_level(&bad), Err(FolioError::Tiff(_))));
    }

    #[test]
    fn empty_pyramid_is_an_error() {
        let writer = PyramidWriter::new(Cursor::new(Vec::new())).expect("header");
        assert!(writer.finish().is_err());
    }
}
