// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Item directory naming rules and file classification.
//
// An item directory is named `<record_id>_<barcode>`. The record id is the
// bibliographic record number and is case-insensitive; the barcode is the
// physical volume's barcode and keeps its case. Anything that does not parse
// is never treated as an item.

use std::path::Path;

use crate::error::{FolioError, Result};

/// Identifiers decomposed from an item directory name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ItemName {
    /// Bibliographic record id, lower-cased.
    pub record_id: String,
    /// Physical barcode, case preserved.
    pub barcode: String,
}

impl ItemName {
    /// Parse a directory name. See [`decompose`].
    pub fn parse(name: &str) -> Result<Self> {
        let (record_id, barcode) = decompose(name)?;
        Ok(Self { record_id, barcode })
    }

    /// The canonical directory name for these identifiers.
    pub fn dir_name(&self) -> String {
        format!("{}_{}", self.record_id, self.barcode)
    }
}

impl std::fmt::Display for ItemName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.record_id, self.barcode)
    }
}

/// Split an item directory name into `(record_id, barcode)`.
///
/// Splits on the first `_`. Fails with `InvalidDirectoryName` when there is
/// no separator, when either segment is empty, contains control characters,
/// or starts or ends with whitespace (Unicode space variants and zero-width
/// characters included).
pub fn decompose(name: &str) -> Result<(String, String)> {
    let invalid = |reason| FolioError::InvalidDirectoryName {
        name: name.to_owned(),
        reason,
    };

    let (record_id, barcode) = name
        .split_once('_')
        .ok_or_else(|| invalid("missing '_' between record id and barcode"))?;

    check_segment(record_id).map_err(invalid)?;
    check_segment(barcode).map_err(invalid)?;

    Ok((record_id.to_lowercase(), barcode.to_owned()))
}

fn check_segment(segment: &str) -> std::result::Result<(), &'static str> {
    let (Some(first), Some(last)) = (segment.chars().next(), segment.chars().last()) else {
        return Err("empty record id or barcode");
    };
    if segment.chars().any(char::is_control) {
        return Err("contains control characters");
    }
    if is_blank(first) || is_blank(last) {
        return Err("leading or trailing whitespace");
    }
    Ok(())
}

/// Whitespace per Unicode plus the invisible characters that render as
/// nothing at a segment boundary.
fn is_blank(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{180E}' | '\u{200B}' | '\u{2060}' | '\u{FEFF}')
}

/// True iff `path` is a directory whose name parses as an item name.
pub fn is_item_directory(path: &Path) -> bool {
    path.is_dir()
        && path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| decompose(n).is_ok())
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| extensions.iter().any(|x| e.eq_ignore_ascii_case(x)))
}

pub fn is_tiff(path: &Path) -> bool {
    has_extension(path, &["tif", "tiff"])
}

pub fn is_jpeg(path: &Path) -> bool {
    has_extension(path, &["jpg", "jpeg"])
}

pub fn is_xml(path: &Path) -> bool {
    has_extension(path, &["xml"])
}

/// Plain-text OCR transcript.
pub fn is_text(path: &Path) -> bool {
    has_extension(path, &["txt"])
}

/// Any page image format the tileizer accepts.
pub fn is_image(path: &Path) -> bool {
    is_tiff(path) || is_jpeg(path)
}

/// Page number encoded in a purely numeric file stem (`0007.tif` -> 7).
pub fn page_number(path: &Path) -> Option<u32> {
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decomposes_record_id_and_barcode() {
        let (record_id, barcode) = decompose("b12345678_c12345678").expect("valid");
        assert_eq!(record_id, "b12345678");
        assert_eq!(barcode, "c12345678");
    }

    #[test]
    fn record_id_is_lower_cased_but_barcode_is_not() {
        let (record_id, barcode) = decompose("B1234567X_AbC123").expect("valid");
        assert_eq!(record_id, "b1234567x");
        assert_eq!(barcode, "AbC123");
    }

    #[test]
    fn splits_on_first_underscore_only() {
        let (record_id, barcode) = decompose("b1_c2_v3").expect("valid");
        assert_eq!(record_id, "b1");
        assert_eq!(barcode, "c2_v3");
    }

    #[test]
    fn rejects_malformed_names() {
        for name in [
            " leading_space",
            "trailing_space ",
            "recordidandbarcodewithnounderscore",
            "_c12345678",
            "b12345678_",
            "b123\t_c123",
            "b123_c1\n23",
            "\u{00A0}b123_c123",
            "b123_c123\u{3000}",
            "b123_\u{200B}c123",
            "",
        ] {
            let err = decompose(name).expect_err(name);
            assert!(
                matches!(err, FolioError::InvalidDirectoryName { .. }),
                "{name:?} gave {err}"
            );
        }
    }

    #[test]
    fn interior_whitespace_is_allowed() {
        assert!(decompose("b123 4_c 56").is_ok());
    }

    #[test]
    fn item_directory_requires_a_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        let item = dir.path().join("b1_c1");
        std::fs::create_dir(&item).expect("mkdir");
        let file = dir.path().join("b2_c2");
        std::fs::write(&file, b"").expect("write");
        let bad = dir.path().join("nounderscore");
        std::fs::create_dir(&bad).expect("mkdir");

        assert!(is_item_directory(&item));
        assert!(!is_item_directory(&file));
        assert!(!is_item_directory(&bad));
    }

    #[test]
    fn classifies_extensions_case_insensitively() {
        assert!(is_tiff(Path::new("0001.TIF")));
        assert!(is_tiff(Path::new("0001.tiff")));
        assert!(is_jpeg(Path::new("0001.JPeG")));
        assert!(is_xml(Path::new("marc.XML")));
        assert!(is_image(Path::new("0001.jpg")));
        assert!(!is_image(Path::new("0001.txt")));
        assert!(is_text(Path::new("0001.txt")));
    }

    #[test]
    fn page_number_requires_numeric_stem() {
        assert_eq!(page_number(Path::new("0007.tif")), Some(7));
        assert_eq!(page_number(Path::new("12.jpg")), Some(12));
        assert_eq!(page_number(Path::new("cover.tif")), None);
        assert_eq!(page_number(Path::new("p1.tif")), None);
    }
}
