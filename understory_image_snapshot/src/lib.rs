// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_image_snapshot --heading-base-level=0

//! Understory Image Snapshot: visual regression matching for rendered images.
//!
//! Given freshly rendered image bytes and a snapshot identifier, this crate
//! decides whether a baseline exists, captures or regenerates it, or compares
//! against it and builds a composite review image of baseline, actual and
//! diff.
//!
//! - [`SnapshotResolver`]: baseline paths and the added / updated / compare
//!   [`Decision`].
//! - [`ComparisonOrchestrator`]: runs a [`PixelDiffer`], decodes the three
//!   images and stitches them with an [`ImageCompositor`].
//! - [`ImageSnapshotter`]: the two above behind one call, serialized per
//!   snapshot with [`IdentifierLocks`].
//! - [`ImageSnapshotMatcher`]: test-harness facing assertion with per-test
//!   counters, [`classify`] and diff artifact output on failure.
//!
//! ## Persisted layout
//!
//! - Baseline: `<snapshots_dir>/<identifier>-snap.png`
//! - Diff artifact (failing comparisons only):
//!   `<snapshots_dir>/__diff_output__/<identifier>-diff.png`
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::path::Path;
//! use understory_image_snapshot::{
//!     ImageSnapshotMatcher, MatchOptions, SnapshotState, TestContext, UpdateMode,
//! };
//!
//! # async fn run(rendered_png: Vec<u8>) -> Result<(), understory_image_snapshot::SnapshotError> {
//! let matcher = ImageSnapshotMatcher::from_env();
//! let mut state = SnapshotState::new(UpdateMode::from_env());
//! let ctx = TestContext {
//!     test_path: Path::new(file!()),
//!     current_test_name: "renders logo",
//!     is_not: false,
//! };
//! matcher
//!     .to_match_image_snapshot(&mut state, &ctx, &rendered_png, &MatchOptions::default())
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration
//!
//! The built-in [`RgbaDiffer`] takes a [`DiffConfig`] at construction.
//! [`DiffConfig::from_env`] applies the `EXACT_VR` toggle (ignore nothing);
//! [`UpdateMode::from_env`] reads `UNDERSTORY_IMAGE_SNAPSHOT=accept` to
//! regenerate every baseline. Both are read once, never during a comparison.
//!
//! ## Concurrency
//!
//! All I/O is async (Tokio). Within one call every step waits for the
//! previous one. Calls for the same snapshot are serialized process-wide
//! through [`IdentifierLocks::global`], even across matcher instances. There
//! is no timeout: a differ that never completes blocks its caller.

mod codec;
mod compositor;
mod config;
mod differ;
mod error;
mod identifier;
mod lock;
mod matcher;
mod orchestrator;
mod resolver;
mod snapshot;

pub use compositor::{ImageCompositor, Layout, PngCompositor};
pub use config::{ComparisonMode, DiffConfig, EXACT_ENV, MatchOptions, UPDATE_ENV, UpdateMode};
pub use differ::{DiffBounds, DimensionDifference, PixelDiff, PixelDiffer, RgbaDiffer};
pub use error::{ImageRole, Result, SnapshotError};
pub use identifier::SnapshotIdentifier;
pub use lock::IdentifierLocks;
pub use matcher::{ImageSnapshotMatcher, Outcome, SnapshotState, TestContext, classify};
pub use orchestrator::{ComparisonOrchestrator, Diff, DiffDetails};
pub use resolver::{
    DIFF_OUTPUT_DIR, DIFF_SUFFIX, Decision, SNAPSHOT_SUFFIX, SNAPSHOTS_DIR_NAME, SnapshotPaths,
    SnapshotResolver,
};
pub use snapshot::{DiffResult, ImageSnapshotter, SnapshotRequest};

pub use image;
