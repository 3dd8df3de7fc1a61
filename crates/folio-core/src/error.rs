// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Folio.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for all Folio operations.
#[derive(Debug, Error)]
pub enum FolioError {
    // -- Item identity --
    #[error("invalid item directory name {name:?}: {reason}")]
    InvalidDirectoryName { name: String, reason: &'static str },

    // -- Document errors --
    #[error("bibliographic metadata unavailable at {}: {reason}", path.display())]
    MetadataUnavailable { path: PathBuf, reason: String },

    #[error("tile conversion failed for {}: {reason}", path.display())]
    TileConversionFailed { path: PathBuf, reason: String },

    #[error("TIFF structure error: {0}")]
    Tiff(String),

    // -- Manifest errors --
    #[error("no manifest found in {}", dir.display())]
    NoManifestFound { dir: PathBuf },

    #[error("template error: {0}")]
    Template(String),

    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    // -- Pipeline --
    #[error("processing failed for {item}: {source}")]
    ProcessingFailed {
        item: String,
        #[source]
        source: Box<FolioError>,
    },

    #[error("integrity check failed for {}: expected {expected}, got {actual}", path.display())]
    IntegrityMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    // -- Configuration / persistence --
    #[error("configuration error: {0}")]
    Config(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, FolioError>;

/// How far the damage of an error reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorScope {
    /// Confined to one item; the collector records it and moves on.
    Item,
    /// Environmental (filesystem, configuration); the whole run ends.
    Run,
}

impl FolioError {
    /// Wrap `cause` as a processing failure of `item`.
    ///
    /// An error that already is a `ProcessingFailed` is returned unchanged so
    /// the cause chain is never wrapped twice.
    pub fn processing_failed(item: impl Into<String>, cause: FolioError) -> Self {
        match cause {
            already @ FolioError::ProcessingFailed { .. } => already,
            other => FolioError::ProcessingFailed {
                item: item.into(),
                source: Box::new(other),
            },
        }
    }

    /// Classify this error for the collector's continue/abort decision.
    pub fn scope(&self) -> ErrorScope {
        match self {
            FolioError::InvalidDirectoryName { .. }
            | FolioError::MetadataUnavailable { .. }
            | FolioError::TileConversionFailed { .. }
            | FolioError::Tiff(_)
            | FolioError::NoManifestFound { .. }
            | FolioError::Template(_)
            | FolioError::InvalidManifest(_)
            | FolioError::ProcessingFailed { .. }
            | FolioError::IntegrityMismatch { .. }
            | FolioError::Serialization(_) => ErrorScope::Item,

            FolioError::Config(_) | FolioError::Io(_) => ErrorScope::Run,
        }
    }
}

/// Render `err` followed by each underlying cause, separated by `: `.
///
/// Causes already spelled out by a parent's `Display` are not repeated.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut cause = err.source();
    while let Some(inner) = cause {
        let text = inner.to_string();
        if !rendered.ends_with(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        cause = inner.source();
    }
    rendered
}
