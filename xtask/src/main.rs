// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Xtask utilities for Understory image snapshots.
//!
//! - `cargo xtask compare <image> --dir <dir> --id <id>` checks one image.
//! - `cargo xtask accept <image> --dir <dir> --id <id>` re-baselines it.
//! - `cargo xtask clean --dir <dir>` removes diff artifacts.
//! - `cargo xtask status --dir <dir>` lists baselines and pending diffs.
//! - `cargo xtask test [--accept]` runs the snapshot test suite.

use std::path::{Path, PathBuf};
use std::process::{Command, ExitCode};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use understory_image_snapshot::{
    DIFF_OUTPUT_DIR, DiffConfig, ImageSnapshotter, Outcome, SNAPSHOT_SUFFIX, SnapshotIdentifier,
    SnapshotRequest, UPDATE_ENV, classify,
};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand, Debug)]
enum CliCommand {
    /// Compare an image with its snapshot, capturing it if missing.
    Compare {
        #[command(flatten)]
        target: Target,
        /// Overwrite the baseline instead of comparing.
        #[arg(long)]
        update: bool,
        /// Largest mismatch percentage that still passes.
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,
        /// Ignore nothing: no tolerance for anti-aliasing or small deltas.
        #[arg(long)]
        exact: bool,
    },
    /// Replace the baseline with the given image.
    Accept {
        #[command(flatten)]
        target: Target,
    },
    /// Remove every diff artifact from a snapshot directory.
    Clean {
        /// Snapshot directory.
        #[arg(long)]
        dir: PathBuf,
    },
    /// List baselines and pending diff artifacts.
    Status {
        /// Snapshot directory.
        #[arg(long)]
        dir: PathBuf,
    },
    /// Run the snapshot test suite.
    Test {
        /// Regenerate every baseline instead of comparing.
        #[arg(long, alias = "bless")]
        accept: bool,
        /// Extra arguments passed to `cargo test`.
        #[arg(last = true)]
        extra_args: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
struct Target {
    /// Encoded image to check.
    image: PathBuf,
    /// Snapshot directory.
    #[arg(long)]
    dir: PathBuf,
    /// Snapshot identifier; defaults to the image file stem.
    #[arg(long)]
    id: Option<String>,
}

impl Target {
    fn identifier(&self) -> Result<SnapshotIdentifier> {
        let raw = match &self.id {
            Some(id) => id.clone(),
            None => self
                .image
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .with_context(|| format!("cannot derive an id from `{}`", self.image.display()))?,
        };
        Ok(SnapshotIdentifier::new(raw)?)
    }
}

async fn compare(target: &Target, update: bool, threshold: f64, exact: bool) -> Result<Outcome> {
    let image = tokio::fs::read(&target.image)
        .await
        .with_context(|| format!("reading `{}`", target.image.display()))?;
    let identifier = target.identifier()?;
    let snapshotter = ImageSnapshotter::with_config(DiffConfig::from_env().with_exact(exact));

    let result = snapshotter
        .diff_image_to_snapshot(SnapshotRequest {
            image_data: &image,
            snapshot_identifier: &identifier,
            snapshots_dir: &target.dir,
            update_snapshot: update,
        })
        .await?;

    let outcome = classify(&result, threshold);
    match (outcome, result.result()) {
        (Outcome::Failed, Some(diff)) => {
            diff.write_artifact().await?;
            bail!(
                "`{identifier}` differs by {}% (threshold {threshold}%); see {}",
                diff.details.mismatch_percentage,
                diff.details.diff_output_path.display()
            );
        }
        (_, Some(diff)) => {
            println!(
                "`{identifier}` matches ({}% different)",
                diff.details.mismatch_percentage
            );
        }
        (Outcome::Updated, None) => println!("`{identifier}` updated"),
        _ => println!("`{identifier}` added"),
    }
    Ok(outcome)
}

/// PNG files directly inside `dir`, sorted. A missing directory is empty.
fn list_png(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing `{}`", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "png") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

fn clean_dir(dir: &Path) -> Result<usize> {
    let output = dir.join(DIFF_OUTPUT_DIR);
    let paths = list_png(&output)?;
    for path in &paths {
        std::fs::remove_file(path).with_context(|| format!("removing `{}`", path.display()))?;
    }
    Ok(paths.len())
}

fn status(dir: &Path) -> Result<()> {
    let baselines: Vec<_> = list_png(dir)?
        .into_iter()
        .filter(|p| p.to_string_lossy().ends_with(SNAPSHOT_SUFFIX))
        .collect();
    let diffs = list_png(&dir.join(DIFF_OUTPUT_DIR))?;

    println!("{} baseline(s) in `{}`", baselines.len(), dir.display());
    for path in &baselines {
        println!("  {}", path.display());
    }
    if diffs.is_empty() {
        println!("No pending diffs.");
    } else {
        println!("{} pending diff(s):", diffs.len());
        for path in &diffs {
            println!("  {}", path.display());
        }
    }
    Ok(())
}

fn run_snapshot_tests(accept: bool, extra_args: Vec<String>) -> Result<()> {
    let cargo = std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string());
    let mut cmd = Command::new(cargo);
    cmd.args(["test", "-p", "understory_image_snapshot"]);
    if accept {
        cmd.env(UPDATE_ENV, "accept");
    }
    cmd.args(extra_args);
    let status = cmd.status().context("running cargo test")?;
    if !status.success() {
        bail!("snapshot tests failed ({status})");
    }
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        CliCommand::Compare {
            target,
            update,
            threshold,
            exact,
        } => compare(&target, update, threshold, exact).await.map(drop),
        CliCommand::Accept { target } => compare(&target, true, 0.0, false).await.map(drop),
        CliCommand::Clean { dir } => {
            let removed = clean_dir(&dir)?;
            println!("Removed {removed} diff artifact(s).");
            Ok(())
        }
        CliCommand::Status { dir } => status(&dir),
        CliCommand::Test { accept, extra_args } => run_snapshot_tests(accept, extra_args),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
