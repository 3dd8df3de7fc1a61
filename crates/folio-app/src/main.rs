// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Folio: book digitization pipeline
//
// Entry point. Initialises logging, resolves configuration, and dispatches
// the subcommand.

mod services;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use folio_core::config::FolioConfig;
use folio_core::error::{Result, error_chain};
use folio_document::Tileizer;
use folio_document::tiling::tiled_file_name;
use folio_pipeline::{CollectorState, ItemDirectory};

/// Command-line arguments for folio.
#[derive(Parser, Debug)]
#[command(name = "folio")]
#[command(about = "Turn scanned books into IIIF-servable items")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $XDG_CONFIG_HOME/folio/config.toml)
    #[arg(short, long, global = true, env = "FOLIO_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process every item in the ready stage and promote the results
    Collect {
        /// Pipeline root holding ready/, processing/ and final/. The stop
        /// file moves to <root>/STOP unless --stop-file is given.
        #[arg(long, env = "FOLIO_ROOT")]
        root: Option<PathBuf>,

        /// While this file exists nothing is collected
        #[arg(long)]
        stop_file: Option<PathBuf>,

        /// Sweep again every SECS seconds until interrupted
        #[arg(long, value_name = "SECS")]
        watch: Option<u64>,
    },
    /// Convert page images to pyramidal tiled TIFF
    Tileize {
        /// Source image, or a directory of page images
        source: PathBuf,

        /// Destination file, or a directory for the tiled pages
        dest: PathBuf,

        /// Leave existing destination files alone
        #[arg(long)]
        skip_existing: bool,
    },
    /// Report whether an item directory is complete
    Check { item_dir: PathBuf },
    /// Print an item's manifest with real URIs substituted
    Render {
        item_dir: PathBuf,

        #[arg(long)]
        manifest_uri: String,

        /// Defaults to the configured image server base joined with the item
        /// directory name
        #[arg(long)]
        image_dir_uri: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!(error = %error_chain(&e), "folio failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = services::config_file::resolve(cli.config.as_deref())?;

    match cli.command {
        Command::Collect {
            root,
            stop_file,
            watch,
        } => {
            if let Some(root) = root {
                config.stop_file = root.join("STOP");
                config.root = root;
            }
            if let Some(stop_file) = stop_file {
                config.stop_file = stop_file;
            }
            tracing::info!(root = %config.root.display(), "Folio collecting");

            let report =
                services::runner::collect(config, watch.map(Duration::from_secs)).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.state == CollectorState::Error {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Command::Tileize {
            source,
            dest,
            skip_existing,
        } => {
            tileize(&config, &source, &dest, skip_existing)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Check { item_dir } => check(&item_dir),
        Command::Render {
            item_dir,
            manifest_uri,
            image_dir_uri,
        } => {
            let item = ItemDirectory::open(&item_dir)?;
            let image_dir_uri = image_dir_uri.unwrap_or_else(|| {
                format!(
                    "{}/{}",
                    config.image_server_base.trim_end_matches('/'),
                    item_dir_name(&item_dir)
                )
            });
            println!("{}", item.render_manifest(&manifest_uri, &image_dir_uri)?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn tileize(config: &FolioConfig, source: &Path, dest: &Path, skip_existing: bool) -> Result<()> {
    let tileizer = Tileizer::new(config.tiles);
    if source.is_dir() {
        std::fs::create_dir_all(dest)?;
        tileizer.tileize_all(source, dest, skip_existing);
        return Ok(());
    }

    let dest = match (dest.is_dir(), tiled_file_name(source)) {
        (true, Some(name)) => dest.join(name),
        _ => dest.to_path_buf(),
    };
    if skip_existing && dest.exists() {
        tracing::info!(dest = %dest.display(), "skipping: tiled image already exists");
        return Ok(());
    }
    tileizer.tileize(source, &dest)
}

fn check(item_dir: &Path) -> Result<ExitCode> {
    let item = ItemDirectory::open(item_dir)?;
    let complete = item.is_complete();
    let report = serde_json::json!({
        "item": item_dir_name(item_dir),
        "record_id": item.name().record_id,
        "barcode": item.name().barcode,
        "complete": complete,
        "pages": item.page_images()?.len(),
        "transcripts": item.transcripts()?.len(),
        "marc": item.marc_path().map(|p| p.display().to_string()),
        "manifest": format!("{:?}", item.manifest_source()),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(if complete {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn item_dir_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_collect_with_watch() {
        let cli = Cli::try_parse_from(["folio", "collect", "--root", "/srv/folio", "--watch", "30"])
            .expect("parse");
        match cli.command {
            Command::Collect { root, watch, stop_file } => {
                assert_eq!(root, Some(PathBuf::from("/srv/folio")));
                assert_eq!(watch, Some(30));
                assert!(stop_file.is_none());
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn tileize_into_directory_keeps_stem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = dir.path().join("0004.tif");
        let out = dir.path().join("out");
        std::fs::create_dir(&out).expect("mkdir");
        std::fs::write(&source, b"not an image").expect("write");

        let err = tileize(&FolioConfig::default(), &source, &out, false).unwrap_err();
        assert!(err.to_string().contains("0004.tif"));

        std::fs::write(out.join("0004.tif"), b"existing").expect("write");
        tileize(&FolioConfig::default(), &source, &out, true).expect("skipped");
    }
}
