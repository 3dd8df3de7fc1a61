// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Drives the collector from the async runtime.
//
// Collection is blocking work and runs on the blocking pool. Ctrl+C sets the
// collector's stop flag, so the item in progress finishes and nothing after
// it starts. In watch mode the ready stage is swept again every interval
// until stopped.

use std::sync::Arc;
use std::time::Duration;

use folio_core::config::FolioConfig;
use folio_core::error::{FolioError, Result};
use folio_pipeline::{CollectReport, Collector, CollectorState, StopHandle};
use tokio::sync::Notify;
use tracing::info;

pub async fn collect(config: FolioConfig, watch: Option<Duration>) -> Result<CollectReport> {
    let mut collector = Collector::new(config);
    let stop = collector.stop_handle();
    let interrupted = Arc::new(Notify::new());
    spawn_signal_listener(stop.clone(), Arc::clone(&interrupted));

    loop {
        let (returned, report) = tokio::task::spawn_blocking(move || {
            let report = collector.collect();
            (collector, report)
        })
        .await
        .map_err(|e| FolioError::Io(std::io::Error::other(e)))?;
        collector = returned;

        let Some(interval) = watch else {
            return Ok(report);
        };
        if stop.is_stopped() || report.state == CollectorState::Error {
            return Ok(report);
        }
        info!(promoted = report.promoted.len(), failed = report.failed.len(), "sweep complete");

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = interrupted.notified() => return Ok(report),
        }
    }
}

fn spawn_signal_listener(stop: StopHandle, interrupted: Arc<Notify>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, stopping after the current item");
            stop.stop();
            interrupted.notify_one();
        }
    });
}
