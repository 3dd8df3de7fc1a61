// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folio: Core types, errors, configuration, and path rules shared across all
// crates.

pub mod config;
pub mod error;
pub mod paths;
pub mod types;

pub use config::{FolioConfig, TileConfig};
pub use error::{ErrorScope, FolioError, Result};
pub use paths::ItemName;
pub use types::*;
