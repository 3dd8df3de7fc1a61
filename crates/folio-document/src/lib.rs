// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-document: Document processing for the Folio pipeline.
//
// Provides MARC-XML metadata extraction, pyramidal tiled TIFF encoding (and
// the header reader that recovers pyramid geometry), and IIIF Presentation
// manifest construction, update, and rendering.

pub mod manifest;
pub mod marc;
pub mod page;
pub mod tiff;
pub mod tiling;

// Re-export the primary types so callers can use `folio_document::Tileizer` etc.
pub use manifest::{ManifestInfo, ManifestSource};
pub use marc::MarcMetadata;
pub use page::Page;
pub use tiling::tileizer::Tileizer;
