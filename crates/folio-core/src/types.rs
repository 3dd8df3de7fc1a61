// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Folio pipeline.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Pipeline progress of an item, as expressed by the stage directory that
/// holds it. The derived ordering is the order items move through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Raw scans and MARC record waiting to be picked up.
    Ready,
    /// Output of an attempt in progress (or of a failed attempt).
    Processing,
    /// Complete, servable item.
    Final,
}

impl Stage {
    pub const ALL: [Stage; 3] = [Stage::Ready, Stage::Processing, Stage::Final];

    /// Name of the stage subdirectory under the pipeline root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Processing => "processing",
            Self::Final => "final",
        }
    }

    /// The stage an item is promoted into from this one.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::Ready => Some(Self::Processing),
            Self::Processing => Some(Self::Final),
            Self::Final => None,
        }
    }

    /// Resolve this stage's directory under `root`.
    pub fn dir(&self, root: &Path) -> PathBuf {
        root.join(self.dir_name())
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.dir_name())
    }
}
