// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Manifest builder: one canvas per page, in page order.

use folio_core::error::Result;
use tracing::{debug, instrument};
use uuid::Uuid;

use super::model::{
    Annotation, Canvas, IMAGE_CONTEXT, IMAGE_PROFILE, ImageResource, ImageService, Manifest,
    MetadataEntry, PRESENTATION_CONTEXT, Sequence, Size, Tiles,
};
use super::template::{IMAGE_DIR_URI_PLACEHOLDER, MANIFEST_URI_PLACEHOLDER, escape_transcript};
use super::{AUTHOR_LABEL, ManifestInfo, TITLE_LABEL, TRANSCRIPT_LABEL, canvas_label};
use crate::page::Page;

/// Builds a fresh manifest for a page set. All ids are expressed through the
/// placeholders, so the result is deployment-independent.
pub struct ManifestBuilder<'a> {
    info: &'a ManifestInfo,
    pages: &'a [Page],
}

impl<'a> ManifestBuilder<'a> {
    pub fn new(info: &'a ManifestInfo, pages: &'a [Page]) -> Self {
        Self { info, pages }
    }

    /// Assemble the manifest, reading each page's transcript if it has one.
    #[instrument(skip_all, fields(pages = self.pages.len()))]
    pub fn build(&self) -> Result<Manifest> {
        let canvases = self
            .pages
            .iter()
            .map(build_canvas)
            .collect::<Result<Vec<_>>>()?;
        debug!(canvases = canvases.len(), "Manifest assembled");

        Ok(Manifest {
            context: PRESENTATION_CONTEXT.into(),
            id: MANIFEST_URI_PLACEHOLDER.into(),
            kind: "sc:Manifest".into(),
            label: self.info.label.clone(),
            metadata: vec![
                MetadataEntry::new(TITLE_LABEL, &self.info.title),
                MetadataEntry::new(AUTHOR_LABEL, &self.info.author),
            ],
            sequences: vec![Sequence {
                id: format!("{MANIFEST_URI_PLACEHOLDER}/sequence/normal"),
                kind: "sc:Sequence".into(),
                canvases,
            }],
        })
    }
}

/// Canvas id for a page number.
pub fn canvas_id(page_number: u32) -> String {
    format!("{MANIFEST_URI_PLACEHOLDER}/canvas/p{page_number}")
}

fn build_canvas(page: &Page) -> Result<Canvas> {
    let id = canvas_id(page.number);
    let image_url = format!("{IMAGE_DIR_URI_PLACEHOLDER}/{}", page.file_name());
    let annotation_uuid =
        Uuid::new_v5(&Uuid::NAMESPACE_URL, format!("{id} {image_url}").as_bytes());

    let transcript_path = page.transcript_path();
    let metadata = if transcript_path.is_file() {
        let text = std::fs::read_to_string(&transcript_path)?;
        vec![MetadataEntry::new(TRANSCRIPT_LABEL, escape_transcript(&text))]
    } else {
        Vec::new()
    };

    Ok(Canvas {
        label: canvas_label(page.number),
        kind: "sc:Canvas".into(),
        width: page.width,
        height: page.height,
        images: vec![Annotation {
            id: format!("{MANIFEST_URI_PLACEHOLDER}/annotation/{annotation_uuid}"),
            kind: "oa:Annotation".into(),
            motivation: "sc:painting".into(),
            on: id.clone(),
            resource: ImageResource {
                id: format!("{image_url}/full/full/0/default.jpg"),
                kind: "dctypes:Image".into(),
                format: "image/jpeg".into(),
                width: page.width,
                height: page.height,
                service: ImageService {
                    context: IMAGE_CONTEXT.into(),
                    id: image_url,
                    profile: IMAGE_PROFILE.into(),
                    width: page.width,
                    height: page.height,
                    sizes: page
                        .sizes
                        .iter()
                        .map(|&(width, height)| Size { width, height })
                        .collect(),
                    tiles: vec![Tiles {
                        width: page.tile_width,
                        height: page.tile_height,
                        scale_factors: page.scale_factors.clone(),
                    }],
                },
            },
        }],
        metadata,
        id,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    fn page(number: u32, dir: &std::path::Path) -> Page {
        Page {
            number,
            path: dir.join(format!("{number:04}.tif")),
            width: 1000,
            height: 1500,
            tile_width: 256,
            tile_height: 256,
            sizes: vec![(250, 375), (500, 750), (1000, 1500)],
            scale_factors: vec![1, 2, 4],
        }
    }

    fn info() -> ManifestInfo {
        ManifestInfo {
            label: "The great Gatsby".into(),
            title: "The great Gatsby".into(),
            author: "Fitzgerald, F. Scott".into(),
        }
    }

    #[test]
    fn one_canvas_per_page_with_placeholder_ids() {
        let dir = PathBuf::from("/nonexistent");
        let pages = [page(1, &dir), page(2, &dir)];
        let info = info();
        let manifest = ManifestBuilder::new(&info, &pages).build().expect("build");

        let canvases = &manifest.sequences[0].canvases;
        assert_eq!(canvases.len(), 2);
        assert_eq!(canvases[0].id, "{{manifest_uri}}/canvas/p1");
        assert_eq!(canvases[1].label, "Image 2");

        let resource = &canvases[0].images[0].resource;
        assert_eq!(resource.service.id, "{{image_dir_uri}}/0001.tif");
        assert_eq!(resource.service.tiles[0].scale_factors, vec![1, 2, 4]);
        assert_eq!(resource.service.sizes.len(), 3);
        assert_eq!(manifest.metadata[0], MetadataEntry::new("Title", "The great Gatsby"));
    }

    #[test]
    fn annotation_ids_are_deterministic_and_distinct() {
        let dir = PathBuf::from("/nonexistent");
        let pages = [page(1, &dir), page(2, &dir)];
        let info = info();
        let first = ManifestBuilder::new(&info, &pages).build().expect("build");
        let second = ManifestBuilder::new(&info, &pages).build().expect("build");

        let ids = |m: &Manifest| -> Vec<String> {
            m.sequences[0].canvases.iter().map(|c| c.images[0].id.clone()).collect()
        };
        assert_eq!(ids(&first), ids(&second));
        assert_ne!(ids(&first)[0], ids(&first)[1]);
    }

    #[test]
    fn transcripts_are_embedded_escaped() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("0001.txt"), "Chapter {1}").expect("write");
        let pages = [page(1, dir.path()), page(2, dir.path())];
        let info = info();
        let manifest = ManifestBuilder::new(&info, &pages).build().expect("build");

        let canvases = &manifest.sequences[0].canvases;
        assert_eq!(canvases[0].metadata[0].label, "Transcript");
        assert_eq!(canvases[0].metadata[0].value, "Chapter {{lbrace}}1}");
        assert!(canvases[1].metadata.is_empty());
    }
}
