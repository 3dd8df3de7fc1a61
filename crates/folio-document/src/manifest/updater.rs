// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-place manifest update. Works on untyped JSON so that anything a stored
// manifest carries beyond what the builder writes survives the update.

use folio_core::error::{FolioError, Result};
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{AUTHOR_LABEL, ManifestInfo, TITLE_LABEL, canvas_label};

/// Refresh the label, the Title/Author metadata entries, and every canvas
/// label. Page geometry and image references are left untouched.
///
/// Applying the same update twice leaves the document unchanged.
pub fn update_manifest(manifest: &mut Value, info: &ManifestInfo) -> Result<()> {
    let Some(root) = manifest.as_object_mut() else {
        return Err(FolioError::InvalidManifest(
            "top-level value is not an object".into(),
        ));
    };

    root.insert("label".into(), Value::String(info.label.clone()));
    set_metadata_entry(root, TITLE_LABEL, &info.title);
    set_metadata_entry(root, AUTHOR_LABEL, &info.author);

    let mut relabelled = 0usize;
    for canvas in canvases_mut(root) {
        let Some(number) = canvas
            .get("@id")
            .and_then(Value::as_str)
            .and_then(canvas_page_number)
        else {
            continue;
        };
        if let Some(canvas) = canvas.as_object_mut() {
            canvas.insert("label".into(), Value::String(canvas_label(number)));
            relabelled += 1;
        }
    }
    debug!(relabelled, "Manifest updated");
    Ok(())
}

/// Page number recovered from a canvas id ending in `/canvas/p<number>`.
pub fn canvas_page_number(id: &str) -> Option<u32> {
    let (_, digits) = id.rsplit_once("/canvas/p")?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn set_metadata_entry(root: &mut Map<String, Value>, label: &str, value: &str) {
    let metadata = root
        .entry("metadata")
        .or_insert_with(|| Value::Array(Vec::new()));
    if !metadata.is_array() {
        *metadata = Value::Array(Vec::new());
    }
    let Some(entries) = metadata.as_array_mut() else {
        return;
    };

    let existing = entries
        .iter_mut()
        .find(|entry| entry.get("label").and_then(Value::as_str) == Some(label));
    match existing {
        Some(entry) => {
            if let Some(entry) = entry.as_object_mut() {
                entry.insert("value".into(), Value::String(value.to_owned()));
            }
        }
        None => entries.push(json!({ "label": label, "value": value })),
    }
}

fn canvases_mut(root: &mut Map<String, Value>) -> impl Iterator<Item = &mut Value> {
    root.get_mut("sequences")
        .and_then(Value::as_array_mut)
        .into_iter()
        .flatten()
        .filter_map(|sequence| sequence.get_mut("canvases").and_then(Value::as_array_mut))
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> ManifestInfo {
        ManifestInfo {
            label: "Moby Dick".into(),
            title: "Moby Dick".into(),
            author: "Melville, Herman".into(),
        }
    }

    fn stored() -> Value {
        json!({
            "@id": "{{manifest_uri}}",
            "label": "old",
            "metadata": [{ "label": "Title", "value": "old title" }],
            "sequences": [{
                "canvases": [
                    { "@id": "{{manifest_uri}}/canvas/p2", "label": "page two", "width": 10 },
                    { "@id": "{{manifest_uri}}/canvas/p10", "label": "x" },
                    { "@id": "{{manifest_uri}}/canvas/cover", "label": "Cover" }
                ]
            }]
        })
    }

    #[test]
    fn relabels_canvases_from_their_ids() {
        let mut manifest = stored();
        update_manifest(&mut manifest, &info()).expect("update");

        let canvases = &manifest["sequences"][0]["canvases"];
        assert_eq!(canvases[0]["label"], "Image 2");
        assert_eq!(canvases[0]["width"], 10);
        assert_eq!(canvases[1]["label"], "Image 10");
        assert_eq!(canvases[2]["label"], "Cover");
        assert_eq!(manifest["label"], "Moby Dick");
    }

    #[test]
    fn missing_title_and_author_entries_are_added() {
        let mut manifest = json!({ "sequences": [] });
        update_manifest(&mut manifest, &info()).expect("update");
        assert_eq!(
            manifest["metadata"],
            json!([
                { "label": "Title", "value": "Moby Dick" },
                { "label": "Author", "value": "Melville, Herman" }
            ])
        );
    }

    #[test]
    fn existing_entries_are_overwritten_in_place() {
        let mut manifest = stored();
        update_manifest(&mut manifest, &info()).expect("update");
        let metadata = manifest["metadata"].as_array().expect("array");
        assert_eq!(metadata.len(), 2);
        assert_eq!(metadata[0]["value"], "Moby Dick");
    }

    #[test]
    fn second_update_is_byte_identical() {
        let mut manifest = stored();
        update_manifest(&mut manifest, &info()).expect("first");
        let first = serde_json::to_string_pretty(&manifest).expect("serialize");
        update_manifest(&mut manifest, &info()).expect("second");
        let second = serde_json::to_string_pretty(&manifest).expect("serialize");
        assert_eq!(first, second);
    }

    #[test]
    fn non_object_manifest_is_rejected() {
        let mut manifest = json!([1, 2]);
        match update_manifest(&mut manifest, &info()) {
            Err(FolioError::InvalidManifest(_)) => {}
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn page_numbers_need_a_numeric_suffix() {
        assert_eq!(canvas_page_number("https://x/m/canvas/p12"), Some(12));
        assert_eq!(canvas_page_number("https://x/m/canvas/p"), None);
        assert_eq!(canvas_page_number("https://x/m/canvas/p1a"), None);
        assert_eq!(canvas_page_number("https://x/m/page/1"), None);
    }
}
