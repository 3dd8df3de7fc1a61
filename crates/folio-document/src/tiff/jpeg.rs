// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// JPEG frame header scanning for tile payloads. Only the markers up to the
// first start-of-frame are walked; entropy-coded data is never read.

use folio_core::error::{FolioError, Result};

const SOI: u8 = 0xD8;
const SOS: u8 = 0xDA;
const EOI: u8 = 0xD9;

/// One component of a JPEG frame with its sampling factors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameComponent {
    pub id: u8,
    pub h: u8,
    pub v: u8,
}

impl FrameComponent {
    pub fn sampling(&self) -> (u8, u8) {
        (self.h, self.v)
    }
}

/// The start-of-frame segment of a JPEG stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameHeader {
    pub width: u16,
    pub height: u16,
    pub components: Vec<FrameComponent>,
}

/// Parse the frame header of the JPEG stream in `data`.
pub fn frame_header(data: &[u8]) -> Result<FrameHeader> {
    if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
        return Err(FolioError::Tiff("tile is not a JPEG stream".into()));
    }

    let mut pos = 2;
    loop {
        while data.get(pos) == Some(&0xFF) {
            pos += 1;
        }
        let Some(&marker) = data.get(pos) else {
            return Err(FolioError::Tiff("JPEG stream ends before its frame header".into()));
        };
        pos += 1;

        match marker {
            0x01 | 0xD0..=0xD7 => continue,
            SOS | EOI => {
                return Err(FolioError::Tiff("JPEG scan starts before any frame header".into()));
            }
            _ => {}
        }

        let len = segment_len(data, pos)?;
        let body = &data[pos + 2..pos + len];
        if is_start_of_frame(marker) {
            return parse_frame(body);
        }
        pos += len;
    }
}

fn segment_len(data: &[u8], pos: usize) -> Result<usize> {
    let truncated = || FolioError::Tiff("truncated JPEG segment".into());
    let bytes = data.get(pos..pos + 2).ok_or_else(truncated)?;
    let len = usize::from(u16::from_be_bytes([bytes[0], bytes[1]]));
    if len < 2 || pos + len > data.len() {
        return Err(truncated());
    }
    Ok(len)
}

/// SOF0 to SOF15, excluding DHT, JPG and DAC which share the range.
fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC)
}

fn parse_frame(body: &[u8]) -> Result<FrameHeader> {
    let bad = || FolioError::Tiff("malformed JPEG frame header".into());
    let [_precision, h0, h1, w0, w1, count, rest @ ..] = body else {
        return Err(bad());
    };
    let count = usize::from(*count);
    if rest.len() < count * 3 {
        return Err(bad());
    }

    let components = rest
        .chunks_exact(3)
        .take(count)
        .map(|c| FrameComponent {
            id: c[0],
            h: c[1] >> 4,
            v: c[1] & 0x0F,
        })
        .collect();
    Ok(FrameHeader {
        width: u16::from_be_bytes([*w0, *w1]),
        height: u16::from_be_bytes([*h0, *h1]),
        components,
    })
}

#[cfg(test)]
mod tests {
    use image::codecs::jpeg::JpegEncoder;

    use super::*;

    fn encode<P>(image: image::ImageBuffer<P, Vec<u8>>) -> Vec<u8>
    where
        P: image::Pixel<Subpixel = u8> + image::PixelWithColorType + 'static,
    {
        let mut out = Vec::new();
        image
            .write_with_encoder(JpegEncoder::new_with_quality(&mut out, 75))
            .expect("encode");
        out
    }

    #[test]
    fn reads_colour_frame() {
        let frame = frame_header(&encode(image::RgbImage::new(32, 16))).expect("frame");
        assert_eq!((frame.width, frame.height), (32, 16));
        assert_eq!(frame.components.len(), 3);
    }

    #[test]
    fn reads_greyscale_frame() {
        let frame = frame_header(&encode(image::GrayImage::new(8, 8))).expect("frame");
        assert_eq!(frame.components.len(), 1);
        assert_eq!(frame.components[0].sampling(), (1, 1));
    }

    #[test]
    fn hand_built_subsampled_frame() {
        let mut data = vec![0xFF, SOI];
        // APP0 with a two-byte body.
        data.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, b'J', b'F']);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 17, 8, 0x00, 0x10, 0x00, 0x20, 3]);
        data.extend_from_slice(&[1, 0x22, 0, 2, 0x11, 1, 3, 0x11, 1]);

        let frame = frame_header(&data).expect("frame");
        assert_eq!((frame.width, frame.height), (32, 16));
        assert_eq!(frame.components[0].sampling(), (2, 2));
        assert_eq!(frame.components[2], FrameComponent { id: 3, h: 1, v: 1 });
    }

    #[test]
    fn rejects_scan_without_frame() {
        let data = [0xFF, SOI, 0xFF, SOS, 0x00, 0x02];
        assert!(frame_header(&data).is_err());
        assert!(frame_header(b"GIF89a").is_err());
    }
}
