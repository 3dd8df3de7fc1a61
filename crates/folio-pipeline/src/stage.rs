// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Stage directories under the pipeline root, and atomic promotion between
// them.
//
// Entries whose names start with `.` are never items; promotion uses such a
// name to park a replaced final directory while the new one is renamed in,
// and `processing/.inputs/` holds the raw input of each attempt.

use std::io;
use std::path::{Path, PathBuf};

use folio_core::error::{FolioError, Result};
use folio_core::paths;
use folio_core::types::Stage;
use tracing::{debug, info, instrument};

/// Directory under the processing stage that holds attempt inputs.
pub const INPUTS_DIR: &str = ".inputs";

/// Resolves stage and item directories under one pipeline root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageLayout {
    root: PathBuf,
}

impl StageLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn stage_dir(&self, stage: Stage) -> PathBuf {
        stage.dir(&self.root)
    }

    pub fn item_dir(&self, stage: Stage, name: &str) -> PathBuf {
        self.stage_dir(stage).join(name)
    }

    /// Where the raw input of an attempt on `name` is held while the attempt
    /// runs, and after it fails.
    pub fn input_dir(&self, name: &str) -> PathBuf {
        self.stage_dir(Stage::Processing).join(INPUTS_DIR).join(name)
    }

    /// Take `name` out of the ready stage for an attempt. A leftover input
    /// from an earlier attempt is replaced.
    #[instrument(skip(self))]
    pub fn take_input(&self, name: &str) -> Result<PathBuf> {
        let input = self.input_dir(name);
        if input.exists() {
            std::fs::remove_dir_all(&input)?;
            info!("replaced input left by an earlier attempt");
        }
        if let Some(parent) = input.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::rename(self.item_dir(Stage::Ready, name), &input)?;
        Ok(input)
    }

    /// Remove the held input of `name` if it is there.
    pub fn discard_input(&self, name: &str) -> Result<()> {
        let input = self.input_dir(name);
        if input.exists() {
            std::fs::remove_dir_all(&input)?;
            debug!(path = %input.display(), "discarded attempt input");
        }
        Ok(())
    }

    /// Fail with `NotFound` unless every stage directory exists.
    pub fn require(&self) -> Result<()> {
        for stage in Stage::ALL {
            let dir = self.stage_dir(stage);
            if !dir.is_dir() {
                return Err(FolioError::Io(io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("stage directory {} does not exist", dir.display()),
                )));
            }
        }
        Ok(())
    }

    /// Create the root and every stage directory.
    pub fn create_all(&self) -> Result<()> {
        for stage in Stage::ALL {
            std::fs::create_dir_all(self.stage_dir(stage))?;
        }
        Ok(())
    }

    /// Names of the item directories in `stage`, in lexicographic order.
    pub fn items(&self, stage: Stage) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(self.stage_dir(stage))? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            if paths::is_item_directory(&path) {
                names.push(name.to_owned());
            } else {
                debug!(path = %path.display(), "ignoring entry that is not an item directory");
            }
        }
        names.sort();
        Ok(names)
    }

    /// Move `name` from `from` to the next stage with a single rename. An
    /// item already present in the target stage is replaced.
    #[instrument(skip(self))]
    pub fn promote(&self, name: &str, from: Stage) -> Result<PathBuf> {
        let Some(to) = from.next() else {
            return Err(FolioError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{from} is the last stage"),
            )));
        };
        let source = self.item_dir(from, name);
        let target = self.item_dir(to, name);

        if target.exists() {
            let aside = self.stage_dir(to).join(format!(".{name}.replaced"));
            if aside.exists() {
                std::fs::remove_dir_all(&aside)?;
            }
            std::fs::rename(&target, &aside)?;
            std::fs::rename(&source, &target)?;
            std::fs::remove_dir_all(&aside)?;
            info!(stage = %to, "replaced existing item");
        } else {
            std::fs::rename(&source, &target)?;
        }
        Ok(target)
    }

    /// Remove `name` from `stage` if it is there.
    pub fn discard(&self, name: &str, stage: Stage) -> Result<()> {
        let dir = self.item_dir(stage, name);
        if dir.exists() {
            std::fs::remove_dir_all(&dir)?;
            debug!(path = %dir.display(), "discarded item directory");
        }
        Ok(())
    }
}
