// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Service layer: configuration resolution and the collection driver used by
// the command handlers.

pub mod config_file;
pub mod runner;
