// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-pipeline: Moves items through the ready/processing/final stages.
//
// A `Collector` sweeps the ready stage in name order and drives one
// `Processor` per item. Successful output is promoted to the final stage by a
// single rename; failed output stays in the processing stage for inspection.

pub mod collector;
pub mod integrity;
pub mod item;
pub mod processor;
pub mod stage;

pub use collector::{CollectReport, Collector, CollectorState, StopHandle};
pub use item::ItemDirectory;
pub use processor::{Processor, ProcessorState};
pub use stage::StageLayout;
