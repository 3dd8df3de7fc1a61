// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IIIF Presentation manifests for items.
//
// An item's manifest comes from one of three places, checked in order: an
// existing static `manifest.json` (updated in place), a legacy
// `manifest.json.erb` template (rendered, then updated as static JSON), or a
// fresh build from the item's tiled pages.

pub mod builder;
pub mod model;
pub mod template;
pub mod updater;

use std::io::Write;
use std::path::{Path, PathBuf};

use folio_core::error::{FolioError, Result};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::marc::MarcMetadata;
use crate::page::Page;

pub use builder::ManifestBuilder;
pub use template::{IMAGE_DIR_URI_PLACEHOLDER, MANIFEST_URI_PLACEHOLDER};
pub use updater::update_manifest;

pub const STATIC_MANIFEST_FILENAME: &str = "manifest.json";
pub const LEGACY_MANIFEST_FILENAME: &str = "manifest.json.erb";

pub(crate) const TITLE_LABEL: &str = "Title";
pub(crate) const AUTHOR_LABEL: &str = "Author";
pub(crate) const TRANSCRIPT_LABEL: &str = "Transcript";

pub(crate) fn canvas_label(page_number: u32) -> String {
    format!("Image {page_number}")
}

// -- Source selection --

/// Which manifest source an item directory holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Static(PathBuf),
    Legacy(PathBuf),
    Missing,
}

impl ManifestSource {
    pub fn detect(dir: &Path) -> Self {
        let static_path = dir.join(STATIC_MANIFEST_FILENAME);
        if static_path.is_file() {
            return Self::Static(static_path);
        }
        let legacy_path = dir.join(LEGACY_MANIFEST_FILENAME);
        if legacy_path.is_file() {
            return Self::Legacy(legacy_path);
        }
        Self::Missing
    }

    fn kind(&self) -> &'static str {
        match self {
            Self::Static(_) => "static",
            Self::Legacy(_) => "legacy",
            Self::Missing => "missing",
        }
    }
}

// -- Descriptive fields --

/// The descriptive fields a manifest carries, independent of its pages.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestInfo {
    pub label: String,
    pub title: String,
    pub author: String,
}

impl ManifestInfo {
    /// Title and author from the MARC record when there is one. The label is
    /// the title, else `fallback_label`.
    pub fn from_metadata(fallback_label: &str, metadata: Option<&MarcMetadata>) -> Self {
        let title = metadata.and_then(MarcMetadata::title).unwrap_or_default();
        let author = metadata.and_then(MarcMetadata::author).unwrap_or_default();
        let label = if title.is_empty() { fallback_label } else { title };
        Self {
            label: label.to_owned(),
            title: title.to_owned(),
            author: author.to_owned(),
        }
    }
}

// -- Write / render --

/// Produce `dest_dir/manifest.json` for an item whose original files are in
/// `source_dir` and whose tiled pages and transcripts are already in
/// `dest_dir`. Returns the path written.
#[instrument(skip_all, fields(source_dir = %source_dir.display()))]
pub fn write_manifest(source_dir: &Path, dest_dir: &Path, info: &ManifestInfo) -> Result<PathBuf> {
    let source = ManifestSource::detect(source_dir);
    info!(source = source.kind(), "Writing manifest");

    let manifest = match &source {
        ManifestSource::Static(path) => {
            let mut value: Value = serde_json::from_str(&std::fs::read_to_string(path)?)?;
            update_manifest(&mut value, info)?;
            value
        }
        ManifestSource::Legacy(path) => match migrate_legacy(path) {
            Ok(mut value) => {
                update_manifest(&mut value, info)?;
                value
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "legacy manifest unusable; building a new one"
                );
                build_fresh(dest_dir, info)?
            }
        },
        ManifestSource::Missing => build_fresh(dest_dir, info)?,
    };

    let dest = dest_dir.join(STATIC_MANIFEST_FILENAME);
    write_json(&dest, &manifest)?;
    info!(dest = %dest.display(), "Manifest written");
    Ok(dest)
}

/// The stored manifest in `dir` with its placeholders replaced by real URIs.
#[instrument(skip_all, fields(dir = %dir.display()))]
pub fn render(dir: &Path, manifest_uri: &str, image_dir_uri: &str) -> Result<String> {
    match ManifestSource::detect(dir) {
        ManifestSource::Static(path) => Ok(template::substitute(
            &std::fs::read_to_string(path)?,
            manifest_uri,
            image_dir_uri,
        )),
        ManifestSource::Legacy(path) => {
            template::render_legacy(&std::fs::read_to_string(path)?, manifest_uri, image_dir_uri)
        }
        ManifestSource::Missing => Err(FolioError::NoManifestFound {
            dir: dir.to_path_buf(),
        }),
    }
}

/// Render a legacy template back to placeholder form and parse it, escaping
/// any transcripts it carried.
fn migrate_legacy(path: &Path) -> Result<Value> {
    let rendered = template::render_legacy(
        &std::fs::read_to_string(path)?,
        MANIFEST_URI_PLACEHOLDER,
        IMAGE_DIR_URI_PLACEHOLDER,
    )?;
    let mut value: Value = serde_json::from_str(&rendered)
        .map_err(|e| FolioError::InvalidManifest(format!("rendered legacy manifest: {e}")))?;
    escape_transcripts(&mut value);
    Ok(value)
}

fn escape_transcripts(manifest: &mut Value) {
    let canvases = manifest
        .get_mut("sequences")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(|s| s.get_mut("canvases").and_then(Value::as_array_mut))
        .flatten();
    for canvas in canvases {
        let entries = canvas.get_mut("metadata").and_then(Value::as_array_mut);
        for entry in entries.into_iter().flatten() {
            if entry.get("label").and_then(Value::as_str) != Some(TRANSCRIPT_LABEL) {
                continue;
            }
            if let Some(Value::String(text)) = entry.get_mut("value") {
                *text = template::escape_transcript(text);
            }
        }
    }
}

fn build_fresh(dest_dir: &Path, info: &ManifestInfo) -> Result<Value> {
    let pages = Page::collect(dest_dir)?;
    let manifest = ManifestBuilder::new(info, &pages).build()?;
    Ok(serde_json::to_value(manifest)?)
}

/// Pretty JSON plus a trailing newline, written to a sibling temp file and
/// renamed into place.
fn write_json(path: &Path, value: &Value) -> Result<()> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(text.as_bytes())?;
        file.sync_all()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}
