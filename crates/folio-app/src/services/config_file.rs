// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Configuration file resolution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use folio_core::config::FolioConfig;
use folio_core::error::Result;
use tracing::{debug, info};

/// Default location of the configuration file, following XDG.
pub fn default_config_path() -> PathBuf {
    config_path_from(std::env::var_os("XDG_CONFIG_HOME"), std::env::var_os("HOME"))
}

fn config_path_from(xdg: Option<OsString>, home: Option<OsString>) -> PathBuf {
    let base = match (xdg, home) {
        (Some(xdg), _) if !xdg.is_empty() => PathBuf::from(xdg),
        (_, Some(home)) if !home.is_empty() => PathBuf::from(home).join(".config"),
        // Last resort
        _ => PathBuf::from("/etc"),
    };
    base.join("folio").join("config.toml")
}

/// Load configuration. An explicitly named file must exist; the default file
/// is optional and its absence yields the built-in defaults.
pub fn resolve(explicit: Option<&Path>) -> Result<FolioConfig> {
    if let Some(path) = explicit {
        info!(path = %path.display(), "loading configuration");
        return FolioConfig::load(path);
    }
    let path = default_config_path();
    if path.is_file() {
        info!(path = %path.display(), "loading configuration");
        FolioConfig::load(&path)
    } else {
        debug!(path = %path.display(), "no configuration file; using defaults");
        Ok(FolioConfig::default())
    }
}
