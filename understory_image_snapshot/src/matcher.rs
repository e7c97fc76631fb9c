// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Test-framework facing matcher: identifier bookkeeping and pass/fail.

use std::fmt;
use std::path::Path;

use hashbrown::HashMap;

use crate::compositor::{ImageCompositor, PngCompositor};
use crate::config::{MatchOptions, UpdateMode};
use crate::differ::{PixelDiffer, RgbaDiffer};
use crate::error::{Result, SnapshotError};
use crate::identifier::SnapshotIdentifier;
use crate::resolver::SnapshotResolver;
use crate::snapshot::{DiffResult, ImageSnapshotter, SnapshotRequest};

/// Snapshot bookkeeping owned by the test harness.
#[derive(Clone, Debug, Default)]
pub struct SnapshotState {
    counters: HashMap<String, u32>,
    update_mode: UpdateMode,
    /// Baselines captured for the first time.
    pub added: u32,
    /// Baselines overwritten in update mode.
    pub updated: u32,
    /// Comparisons within tolerance.
    pub matched: u32,
    /// Comparisons beyond tolerance.
    pub unmatched: u32,
}

impl SnapshotState {
    /// Fresh state with the given update mode.
    #[must_use]
    pub fn new(update_mode: UpdateMode) -> Self {
        Self {
            update_mode,
            ..Self::default()
        }
    }

    /// The update mode this run was started with.
    #[must_use]
    pub fn update_mode(&self) -> UpdateMode {
        self.update_mode
    }

    /// Number of image assertions already made by `test_name`.
    #[must_use]
    pub fn counter(&self, test_name: &str) -> u32 {
        self.counters.get(test_name).copied().unwrap_or(0)
    }

    /// Bump and return the assertion counter of `test_name` (starting at 1).
    pub fn next_counter(&mut self, test_name: &str) -> u32 {
        let counter = self.counters.entry_ref(test_name).or_insert(0);
        *counter += 1;
        *counter
    }

    fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Added => self.added += 1,
            Outcome::Updated => self.updated += 1,
            Outcome::Passed => self.matched += 1,
            Outcome::Failed => self.unmatched += 1,
        }
    }
}

/// The currently running test, as reported by the harness.
#[derive(Clone, Copy, Debug)]
pub struct TestContext<'a> {
    /// Source file of the test; snapshots live next to it.
    pub test_path: &'a Path,
    /// Full name of the running test.
    pub current_test_name: &'a str,
    /// Whether the assertion was negated. Not supported.
    pub is_not: bool,
}

/// Classification of one image assertion.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Outcome {
    /// First capture of the baseline.
    Added,
    /// Baseline regenerated.
    Updated,
    /// Compared within tolerance.
    Passed,
    /// Compared beyond tolerance.
    Failed,
}

impl Outcome {
    /// Whether the assertion passes.
    #[must_use]
    pub fn is_pass(self) -> bool {
        self != Self::Failed
    }
}

/// Classify `result` against a mismatch threshold (percent).
///
/// A comparison passes when its mismatch percentage is at most `threshold`.
#[must_use]
pub fn classify(result: &DiffResult, threshold: f64) -> Outcome {
    match result {
        DiffResult::Added => Outcome::Added,
        DiffResult::Updated => Outcome::Updated,
        DiffResult::Compared(diff) if diff.details.mismatch_percentage <= threshold => {
            Outcome::Passed
        }
        DiffResult::Compared(_) => Outcome::Failed,
    }
}

type IdentifierHook = Box<dyn Fn(&SnapshotIdentifier, &Path) + Send + Sync>;

/// Image snapshot assertion in the style of a test-framework matcher.
pub struct ImageSnapshotMatcher<D = RgbaDiffer, C = PngCompositor> {
    snapshotter: ImageSnapshotter<D, C>,
    on_identifier_assigned: Option<IdentifierHook>,
}

impl<D, C> fmt::Debug for ImageSnapshotMatcher<D, C>
where
    ImageSnapshotter<D, C>: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImageSnapshotMatcher")
            .field("snapshotter", &self.snapshotter)
            .field(
                "on_identifier_assigned",
                &self.on_identifier_assigned.as_ref().map(|_| ".."),
            )
            .finish()
    }
}

impl ImageSnapshotMatcher {
    /// Matcher with the built-in differ configured from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(ImageSnapshotter::from_env())
    }
}

impl<D: PixelDiffer, C: ImageCompositor> ImageSnapshotMatcher<D, C> {
    /// Wrap a snapshotter.
    pub fn new(snapshotter: ImageSnapshotter<D, C>) -> Self {
        Self {
            snapshotter,
            on_identifier_assigned: None,
        }
    }

    /// Call `hook` with the identifier and snapshot directory of every
    /// assertion, before any file is touched.
    #[must_use]
    pub fn with_identifier_hook(
        mut self,
        hook: impl Fn(&SnapshotIdentifier, &Path) + Send + Sync + 'static,
    ) -> Self {
        self.on_identifier_assigned = Some(Box::new(hook));
        self
    }

    /// Assert that `received` matches its snapshot.
    ///
    /// On failure the composite review image is written to the diff output
    /// path first, then [`SnapshotError::Mismatch`] is returned.
    pub async fn to_match_image_snapshot(
        &self,
        state: &mut SnapshotState,
        ctx: &TestContext<'_>,
        received: &[u8],
        options: &MatchOptions,
    ) -> Result<Outcome> {
        if ctx.is_not {
            return Err(SnapshotError::usage(
                "`.not` cannot be used with `to_match_image_snapshot`",
            ));
        }
        let threshold = options.mismatch_threshold;
        if !(0.0..=100.0).contains(&threshold) {
            return Err(SnapshotError::usage(format!(
                "mismatch threshold must be a percentage between 0 and 100, got {threshold}"
            )));
        }

        let counter = state.next_counter(ctx.current_test_name);
        let identifier = match options.custom_snapshot_identifier.as_deref() {
            Some(custom) if !custom.is_empty() => SnapshotIdentifier::new(custom)?,
            _ => SnapshotIdentifier::derive(ctx.test_path, ctx.current_test_name, counter)?,
        };
        let resolver = SnapshotResolver::for_test_file(ctx.test_path);
        let snapshots_dir = resolver.snapshots_dir();

        if let Some(hook) = &self.on_identifier_assigned {
            hook(&identifier, snapshots_dir);
        }

        let result = self
            .snapshotter
            .diff_image_to_snapshot(SnapshotRequest {
                image_data: received,
                snapshot_identifier: &identifier,
                snapshots_dir,
                update_snapshot: state.update_mode().forces_update(),
            })
            .await?;

        let outcome = classify(&result, threshold);
        state.record(outcome);

        match (&result, outcome) {
            (DiffResult::Compared(diff), Outcome::Failed) => {
                diff.write_artifact().await?;
                let err = SnapshotError::Mismatch {
                    diff_output_path: diff.details.diff_output_path.clone(),
                    mismatch_percentage: diff.details.mismatch_percentage,
                    threshold,
                };
                tracing::error!(%identifier, "{err}");
                Err(err)
            }
            _ => Ok(outcome),
        }
    }
}
