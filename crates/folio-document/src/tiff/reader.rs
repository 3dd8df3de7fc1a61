// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TIFF header reader: walks the IFD chain of a classic TIFF and reports the
// geometry of every image it holds. Pixel data is never decoded; tile payloads
// are only read to check their JPEG frame headers against the IFD.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use folio_core::error::{FolioError, Result};
use tracing::instrument;

use super::jpeg::{self, FrameHeader};
use super::{PHOTOMETRIC_YCBCR, SUBFILE_REDUCED, field_type, tag};

/// Upper bound on IFDs followed, guarding against cyclic chains.
const MAX_IFDS: usize = 64;

/// Geometry of one image (IFD) in a TIFF file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TiffLevel {
    pub width: u32,
    pub height: u32,
    /// `None` for strip-organised images.
    pub tile_width: Option<u32>,
    pub tile_height: Option<u32>,
    pub samples_per_pixel: Option<u16>,
    pub photometric: Option<u16>,
    /// `YCbCrSubsampling` as (horizontal, vertical), when present.
    pub ycbcr_subsampling: Option<(u16, u16)>,
    /// Offset and byte count of the first tile.
    pub first_tile: Option<(u32, u32)>,
    /// Flagged as a reduced-resolution copy of the main image.
    pub reduced: bool,
}

#[derive(Debug, Clone, Copy)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    fn u16(self, b: [u8; 2]) -> u16 {
        match self {
            Self::Little => u16::from_le_bytes(b),
            Self::Big => u16::from_be_bytes(b),
        }
    }

    fn u32(self, b: [u8; 4]) -> u32 {
        match self {
            Self::Little => u32::from_le_bytes(b),
            Self::Big => u32::from_be_bytes(b),
        }
    }
}

/// Read every level of the TIFF at `path`, in file order.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn read_levels(path: impl AsRef<Path>) -> Result<Vec<TiffLevel>> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    parse_levels(&mut reader)
}

/// Read every level from a seekable TIFF byte stream positioned anywhere.
pub fn parse_levels<R: Read + Seek>(reader: &mut R) -> Result<Vec<TiffLevel>> {
    reader.seek(SeekFrom::Start(0))?;
    let mut header = [0u8; 8];
    reader
        .read_exact(&mut header)
        .map_err(|_| FolioError::Tiff("truncated header".into()))?;

    let order = match &header[..2] {
        b"II" => ByteOrder::Little,
        b"MM" => ByteOrder::Big,
        _ => return Err(FolioError::Tiff("not a TIFF file".into())),
    };
    match order.u16([header[2], header[3]]) {
        42 => {}
        43 => return Err(FolioError::Tiff("BigTIFF is not supported".into())),
        other => return Err(FolioError::Tiff(format!("bad magic number {other}"))),
    }

    let mut next = order.u32([header[4], header[5], header[6], header[7]]);
    let mut levels = Vec::new();
    while next != 0 {
        if levels.len() == MAX_IFDS {
            return Err(FolioError::Tiff(format!("more than {MAX_IFDS} IFDs")));
        }
        let (level, following) = read_ifd(reader, order, next)?;
        levels.push(level);
        next = following;
    }

    if levels.is_empty() {
        return Err(FolioError::Tiff("no images in file".into()));
    }
    Ok(levels)
}

fn read_ifd<R: Read + Seek>(
    reader: &mut R,
    order: ByteOrder,
    offset: u32,
) -> Result<(TiffLevel, u32)> {
    let truncated = |_| FolioError::Tiff(format!("truncated IFD at offset {offset}"));

    reader.seek(SeekFrom::Start(u64::from(offset)))?;
    let mut count = [0u8; 2];
    reader.read_exact(&mut count).map_err(truncated)?;
    let count = order.u16(count) as usize;

    let mut raw = vec![0u8; count * 12 + 4];
    reader.read_exact(&mut raw).map_err(truncated)?;

    let mut width = None;
    let mut height = None;
    let mut tile_width = None;
    let mut tile_height = None;
    let mut samples_per_pixel = None;
    let mut photometric = None;
    let mut ycbcr_subsampling = None;
    let mut tile_offsets = None;
    let mut tile_byte_counts = None;
    let mut reduced = false;

    for entry in raw[..count * 12].chunks_exact(12) {
        let entry_tag = order.u16([entry[0], entry[1]]);
        let kind = order.u16([entry[2], entry[3]]);
        let values = order.u32([entry[4], entry[5], entry[6], entry[7]]);
        let value = [entry[8], entry[9], entry[10], entry[11]];
        let scalar = match kind {
            field_type::SHORT => u32::from(order.u16([value[0], value[1]])),
            field_type::LONG => order.u32(value),
            _ => continue,
        };
        match entry_tag {
            tag::IMAGE_WIDTH => width = Some(scalar),
            tag::IMAGE_LENGTH => height = Some(scalar),
            tag::TILE_WIDTH => tile_width = Some(scalar),
            tag::TILE_LENGTH => tile_height = Some(scalar),
            tag::SAMPLES_PER_PIXEL => samples_per_pixel = u16::try_from(scalar).ok(),
            tag::PHOTOMETRIC_INTERPRETATION => photometric = u16::try_from(scalar).ok(),
            tag::NEW_SUBFILE_TYPE => reduced = scalar & SUBFILE_REDUCED != 0,
            tag::YCBCR_SUBSAMPLING if kind == field_type::SHORT && values == 2 => {
                let vertical = order.u16([value[2], value[3]]);
                ycbcr_subsampling = u16::try_from(scalar).ok().map(|h| (h, vertical));
            }
            tag::TILE_OFFSETS => tile_offsets = Some((kind, values, value)),
            tag::TILE_BYTE_COUNTS => tile_byte_counts = Some((kind, values, value)),
            _ => {}
        }
    }

    let tail = &raw[count * 12..];
    let next = order.u32([tail[0], tail[1], tail[2], tail[3]]);

    let (Some(width), Some(height)) = (width, height) else {
        return Err(FolioError::Tiff(format!(
            "IFD at offset {offset} lacks image dimensions"
        )));
    };

    let first_tile = match (tile_offsets, tile_byte_counts) {
        (Some(offsets), Some(counts)) => Some((
            first_value(reader, order, offsets)?,
            first_value(reader, order, counts)?,
        )),
        _ => None,
    };

    Ok((
        TiffLevel {
            width,
            height,
            tile_width,
            tile_height,
            samples_per_pixel,
            photometric,
            ycbcr_subsampling,
            first_tile,
            reduced,
        },
        next,
    ))
}

/// First element of a SHORT or LONG array entry, following the value offset
/// when the array does not fit inline.
fn first_value<R: Read + Seek>(
    reader: &mut R,
    order: ByteOrder,
    (kind, count, value): (u16, u32, [u8; 4]),
) -> Result<u32> {
    let width = if kind == field_type::SHORT { 2 } else { 4 };
    if count == 0 {
        return Err(FolioError::Tiff("empty tile array".into()));
    }
    let bytes = if u64::from(count) * width <= 4 {
        value
    } else {
        let mut out = [0u8; 4];
        reader.seek(SeekFrom::Start(u64::from(order.u32(value))))?;
        reader
            .read_exact(&mut out[..width as usize])
            .map_err(|_| FolioError::Tiff("truncated tile array".into()))?;
        out
    };
    Ok(match kind {
        field_type::SHORT => u32::from(order.u16([bytes[0], bytes[1]])),
        _ => order.u32(bytes),
    })
}

/// Read the first tile's payload of `level`.
pub fn read_tile<R: Read + Seek>(reader: &mut R, level: &TiffLevel) -> Result<Vec<u8>> {
    let Some((offset, len)) = level.first_tile else {
        return Err(FolioError::Tiff(format!(
            "{}x{} image is not tiled",
            level.width, level.height
        )));
    };
    reader.seek(SeekFrom::Start(u64::from(offset)))?;
    let mut tile = vec![0u8; len as usize];
    reader
        .read_exact(&mut tile)
        .map_err(|_| FolioError::Tiff(format!("truncated tile at offset {offset}")))?;
    Ok(tile)
}

/// Check that the JPEG frame of the first tile of every level agrees with
/// the level's tile size, sample count and chroma subsampling.
#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn verify_tile_encoding(path: impl AsRef<Path>) -> Result<()> {
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let levels = parse_levels(&mut reader)?;
    for (index, level) in levels.iter().enumerate() {
        let frame = jpeg::frame_header(&read_tile(&mut reader, level)?)?;
        check_frame(level, &frame)
            .map_err(|reason| FolioError::Tiff(format!("level {index}: {reason}")))?;
    }
    Ok(())
}

fn check_frame(level: &TiffLevel, frame: &FrameHeader) -> std::result::Result<(), String> {
    let tile = (level.tile_width, level.tile_height);
    if tile != (Some(u32::from(frame.width)), Some(u32::from(frame.height))) {
        return Err(format!(
            "tile is {}x{} but the frame is {}x{}",
            level.tile_width.unwrap_or(0),
            level.tile_height.unwrap_or(0),
            frame.width,
            frame.height
        ));
    }

    let samples = level.samples_per_pixel.unwrap_or(1);
    if frame.components.len() != usize::from(samples) {
        return Err(format!(
            "{samples} samples per pixel but {} JPEG components",
            frame.components.len()
        ));
    }

    if level.photometric == Some(PHOTOMETRIC_YCBCR) {
        let [luma, cb, cr] = frame.components.as_slice() else {
            return Err("YCbCr tile without three components".into());
        };
        if cb.sampling() != cr.sampling() || cb.h == 0 || cb.v == 0 {
            return Err("chroma components sampled differently".into());
        }
        let actual = (u16::from(luma.h / cb.h), u16::from(luma.v / cb.v));
        let declared = level.ycbcr_subsampling.unwrap_or((2, 2));
        if actual != declared {
            return Err(format!(
                "YCbCrSubsampling is {declared:?} but the JPEG chroma is subsampled {actual:?}"
            ));
        }
    }
    Ok(())
}
