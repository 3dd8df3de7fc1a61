// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IIIF Presentation API 2.1 document shapes, as written by the builder.

use serde::{Deserialize, Serialize};

pub const PRESENTATION_CONTEXT: &str = "http://iiif.io/api/presentation/2/context.json";
pub const IMAGE_CONTEXT: &str = "http://iiif.io/api/image/2/context.json";
pub const IMAGE_PROFILE: &str = "http://iiif.io/api/image/2/level1.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub label: String,
    pub metadata: Vec<MetadataEntry>,
    pub sequences: Vec<Sequence>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataEntry {
    pub label: String,
    pub value: String,
}

impl MetadataEntry {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sequence {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub canvases: Vec<Canvas>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub images: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataEntry>,
}

/// Painting annotation placing an image on a canvas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub motivation: String,
    pub on: String,
    pub resource: ImageResource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageResource {
    #[serde(rename = "@id")]
    pub id: String,
    #[serde(rename = "@type")]
    pub kind: String,
    pub format: String,
    pub width: u32,
    pub height: u32,
    pub service: ImageService,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageService {
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@id")]
    pub id: String,
    pub profile: String,
    pub width: u32,
    pub height: u32,
    pub sizes: Vec<Size>,
    pub tiles: Vec<Tiles>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tiles {
    pub width: u32,
    pub height: u32,
    pub scale_factors: Vec<u32>,
}
