// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TIFF module: classic (32-bit offset) TIFF container support for pyramidal,
// tiled page images: a writer for JPEG-compressed tile pyramids and a header
// reader that recovers each level's geometry without decoding pixels.

pub mod jpeg;
pub mod reader;
pub mod writer;

pub use reader::{TiffLevel, read_levels, read_tile, verify_tile_encoding};
pub use writer::{EncodedLevel, Photometric, PyramidWriter};

/// Baseline and extension tags used by the pyramid writer and reader.
pub(crate) mod tag {
    pub const NEW_SUBFILE_TYPE: u16 = 254;
    pub const IMAGE_WIDTH: u16 = 256;
    pub const IMAGE_LENGTH: u16 = 257;
    pub const BITS_PER_SAMPLE: u16 = 258;
    pub const COMPRESSION: u16 = 259;
    pub const PHOTOMETRIC_INTERPRETATION: u16 = 262;
    pub const SAMPLES_PER_PIXEL: u16 = 277;
    pub const PLANAR_CONFIGURATION: u16 = 284;
    pub const TILE_WIDTH: u16 = 322;
    pub const TILE_LENGTH: u16 = 323;
    pub const TILE_OFFSETS: u16 = 324;
    pub const TILE_BYTE_COUNTS: u16 = 325;
    pub const YCBCR_SUBSAMPLING: u16 = 530;
}

/// IFD entry field types.
pub(crate) mod field_type {
    pub const SHORT: u16 = 3;
    pub const LONG: u16 = 4;
}

/// `Compression` value for JPEG ("new-style", TIFF Technical Note 2).
pub(crate) const COMPRESSION_JPEG: u16 = 7;

/// `PhotometricInterpretation` value for YCbCr.
pub(crate) const PHOTOMETRIC_YCBCR: u16 = 6;

/// `NewSubfileType` bit marking a reduced-resolution copy of the main image.
pub(crate) const SUBFILE_REDUCED: u32 = 1;
