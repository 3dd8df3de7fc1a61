// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Tiling module: re-encode page scans as pyramidal tiled TIFFs.

pub mod tileizer;

pub use tileizer::{Tileizer, tiled_file_name};
