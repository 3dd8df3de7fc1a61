// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Collector: sweeps the ready stage and drives one processor per item.
//
// Items are taken in lexicographic order and each is attempted at most once
// per sweep. A stop request (the stop file, `stop()`, or a `StopHandle`) is
// honoured between items, never during one. Item failures are logged and the
// sweep continues; the failed item stays under `processing` and later sweeps
// leave it alone. Environmental failures end the sweep.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use folio_core::config::FolioConfig;
use folio_core::error::{ErrorScope, FolioError, Result, error_chain};
use folio_core::types::Stage;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::processor::Processor;
use crate::stage::StageLayout;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectorState {
    Idle,
    Running,
    Stopped,
    Error,
}

/// Shared stop flag. Once set it stays set for the life of the collector.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of one `collect` sweep.
#[derive(Debug, Clone, Serialize)]
pub struct CollectReport {
    pub promoted: Vec<String>,
    pub failed: Vec<String>,
    pub state: CollectorState,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

pub struct Collector {
    config: FolioConfig,
    layout: StageLayout,
    state: CollectorState,
    stop: StopHandle,
}

impl Collector {
    pub fn new(config: FolioConfig) -> Self {
        let layout = StageLayout::new(&config.root);
        Self {
            config,
            layout,
            state: CollectorState::Idle,
            stop: StopHandle::default(),
        }
    }

    pub fn state(&self) -> CollectorState {
        self.state
    }

    pub fn layout(&self) -> &StageLayout {
        &self.layout
    }

    /// Handle for stopping this collector from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Stop this collector for the rest of the process lifetime.
    pub fn stop(&mut self) {
        self.stop.stop();
        self.state = CollectorState::Stopped;
        info!("collector stopped");
    }

    /// Process every item waiting in the ready stage.
    #[instrument(skip_all, fields(root = %self.config.root.display()))]
    pub fn collect(&mut self) -> CollectReport {
        let started_at = Utc::now();
        let mut promoted = Vec::new();
        let mut failed = Vec::new();
        info!("starting collection");

        if self.stop_requested() {
            info!("stop requested; not collecting");
            self.state = CollectorState::Stopped;
        } else {
            self.state = CollectorState::Running;
            self.state = self.sweep(&mut promoted, &mut failed);
        }

        info!(
            promoted = promoted.len(),
            failed = failed.len(),
            state = ?self.state,
            "collection finished"
        );
        CollectReport {
            promoted,
            failed,
            state: self.state,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn sweep(&self, promoted: &mut Vec<String>, failed: &mut Vec<String>) -> CollectorState {
        if let Err(e) = self.layout.require() {
            error!(error = %error_chain(&e), "exiting due to error");
            return CollectorState::Error;
        }

        let mut attempted = BTreeSet::new();
        loop {
            if self.stop_requested() {
                info!("stop requested");
                return CollectorState::Stopped;
            }

            let next = match self.next_item(&attempted) {
                Ok(Some(name)) => name,
                Ok(None) => {
                    info!("nothing left to process");
                    return CollectorState::Idle;
                }
                Err(e) => {
                    error!(error = %error_chain(&e), "exiting due to error");
                    return CollectorState::Error;
                }
            };
            attempted.insert(next.clone());

            let outcome = self.collect_item(&next);
            info!(item = %next, "triggering garbage collection");
            match outcome {
                Ok(()) => promoted.push(next),
                Err(e) if e.scope() == ErrorScope::Item => {
                    error!(
                        item = %next,
                        error = %error_chain(&e),
                        "item failed; output and input left in processing"
                    );
                    failed.push(next);
                }
                Err(e) => {
                    error!(item = %next, error = %error_chain(&e), "exiting due to error");
                    return CollectorState::Error;
                }
            }
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.is_stopped() || self.config.stop_file.exists()
    }

    fn next_item(&self, attempted: &BTreeSet<String>) -> Result<Option<String>> {
        Ok(self
            .layout
            .items(Stage::Ready)?
            .into_iter()
            .find(|name| !attempted.contains(name)))
    }

    /// Process one item into a fresh processing directory and promote it.
    ///
    /// The ready input is moved under `processing/.inputs/` before the
    /// attempt, so a failed item is not picked up again: its output and its
    /// input stay under `processing` until an operator moves the input back
    /// into `ready`. The processor is dropped before promotion so its buffers
    /// are released whatever the outcome.
    fn collect_item(&self, name: &str) -> Result<()> {
        let dest = self.layout.item_dir(Stage::Processing, name);
        if dest.exists() {
            info!(item = %name, "discarding stale processing directory");
            self.layout.discard(name, Stage::Processing)?;
        }
        let source = self.layout.take_input(name)?;

        info!(item = %name, "processing {name}");
        let mut processor = Processor::new(&source, &dest, &self.config)?;
        let outcome = processor.process();
        drop(processor);
        outcome?;

        info!(item = %name, "moving {name}");
        self.layout
            .promote(name, Stage::Processing)
            .map_err(|e| environmental(name, e))?;
        self.layout.discard_input(name)?;
        Ok(())
    }
}

/// Promotion failures are filesystem trouble, not a problem with the item.
fn environmental(name: &str, e: FolioError) -> FolioError {
    match e {
        FolioError::Io(io) => FolioError::Io(std::io::Error::new(
            io.kind(),
            format!("promoting {name}: {io}"),
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(root: &std::path::Path) -> FolioConfig {
        let config = FolioConfig::with_root(root);
        StageLayout::new(root).create_all().expect("stages");
        config
    }

    fn ready_item(config: &FolioConfig, name: &str) {
        let dir = Stage::Ready.dir(&config.root).join(name);
        std::fs::create_dir_all(&dir).expect("mkdir");
        image::GrayImage::new(64, 64)
            .save(dir.join("0001.tif"))
            .expect("save page");
    }

    #[test]
    fn empty_ready_stage_is_idle() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut collector = Collector::new(config(root.path()));
        let report = collector.collect();
        assert!(report.promoted.is_empty());
        assert_eq!(report.state, CollectorState::Idle);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn missing_stage_directories_end_the_run() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut collector = Collector::new(FolioConfig::with_root(root.path().join("absent")));
        assert_eq!(collector.collect().state, CollectorState::Error);
        assert_eq!(collector.state(), CollectorState::Error);
    }

    #[test]
    fn stop_file_prevents_any_work() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config(root.path());
        ready_item(&config, "b1_c1");
        std::fs::write(&config.stop_file, b"").expect("stop file");

        let mut collector = Collector::new(config.clone());
        let report = collector.collect();
        assert_eq!(report.state, CollectorState::Stopped);
        assert!(Stage::Ready.dir(&config.root).join("b1_c1").is_dir());
        assert!(!Stage::Processing.dir(&config.root).join("b1_c1").exists());

        std::fs::remove_file(&config.stop_file).expect("remove stop file");
        let report = collector.collect();
        assert_eq!(report.promoted, vec!["b1_c1"]);
    }

    #[test]
    fn stop_is_permanent() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config(root.path());
        ready_item(&config, "b1_c1");

        let mut collector = Collector::new(config);
        collector.stop();
        assert_eq!(collector.collect().state, CollectorState::Stopped);
        assert_eq!(collector.collect().state, CollectorState::Stopped);
    }

    #[test]
    fn stop_handle_is_shared() {
        let collector = Collector::new(FolioConfig::default());
        let handle = collector.stop_handle();
        handle.stop();
        assert!(collector.stop_handle().is_stopped());
    }

    #[test]
    fn promoted_item_leaves_ready_and_processing() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config(root.path());
        ready_item(&config, "b1_c1");

        let report = Collector::new(config.clone()).collect();
        assert_eq!(report.promoted, vec!["b1_c1"]);
        assert!(!Stage::Ready.dir(&config.root).join("b1_c1").exists());
        assert!(!Stage::Processing.dir(&config.root).join("b1_c1").exists());
        assert!(Stage::Final.dir(&config.root).join("b1_c1/manifest.json").is_file());
    }

    #[test]
    fn stale_processing_attempt_is_replaced() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config(root.path());
        ready_item(&config, "b1_c1");
        let stale = Stage::Processing.dir(&config.root).join("b1_c1");
        std::fs::create_dir_all(&stale).expect("mkdir");
        std::fs::write(stale.join("leftover.bin"), b"x").expect("write");

        let report = Collector::new(config.clone()).collect();
        assert_eq!(report.promoted, vec!["b1_c1"]);
        assert!(!Stage::Final.dir(&config.root).join("b1_c1/leftover.bin").exists());
    }

    #[test]
    fn stop_file_appearing_mid_sweep_halts_before_next_item() {
        let root = tempfile::tempdir().expect("tempdir");
        let mut config = config(root.path());
        ready_item(&config, "b1_c1");
        ready_item(&config, "b2_c2");
        // The first promotion creates the stop file.
        config.stop_file = Stage::Final.dir(&config.root).join("b1_c1");

        let report = Collector::new(config.clone()).collect();
        assert_eq!(report.promoted, vec!["b1_c1"]);
        assert!(report.failed.is_empty());
        assert_eq!(report.state, CollectorState::Stopped);
        assert!(Stage::Ready.dir(&config.root).join("b2_c2").is_dir());
        assert!(!Stage::Processing.dir(&config.root).join("b2_c2").exists());
    }

    #[test]
    fn failed_item_keeps_its_evidence_across_sweeps() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config(root.path());
        ready_item(&config, "b1_c1");
        let ready = Stage::Ready.dir(&config.root).join("b1_c1");
        std::fs::write(ready.join("marc.xml"), "<collection><record>").expect("marc");

        let mut collector = Collector::new(config.clone());
        let first = collector.collect();
        assert_eq!(first.failed, vec!["b1_c1"]);

        let evidence = Stage::Processing.dir(&config.root).join("b1_c1");
        std::fs::write(evidence.join("operator-note.txt"), b"bad MARC").expect("note");

        let second = collector.collect();
        assert!(second.failed.is_empty());
        assert!(second.promoted.is_empty());
        assert_eq!(second.state, CollectorState::Idle);
        assert!(evidence.join("operator-note.txt").is_file());
        assert!(!ready.exists());
        assert!(collector.layout().input_dir("b1_c1").join("marc.xml").is_file());
    }

    #[test]
    fn requeued_input_is_retried() {
        let root = tempfile::tempdir().expect("tempdir");
        let config = config(root.path());
        ready_item(&config, "b1_c1");
        let ready = Stage::Ready.dir(&config.root).join("b1_c1");
        std::fs::write(ready.join("marc.xml"), "<collection><record>").expect("marc");

        let mut collector = Collector::new(config.clone());
        assert_eq!(collector.collect().failed, vec!["b1_c1"]);

        let held = collector.layout().input_dir("b1_c1");
        std::fs::remove_file(held.join("marc.xml")).expect("fix input");
        std::fs::rename(&held, &ready).expect("requeue");

        let report = collector.collect();
        assert_eq!(report.promoted, vec!["b1_c1"]);
        assert!(!held.exists());
        assert!(!Stage::Processing.dir(&config.root).join("b1_c1").exists());
    }
}
