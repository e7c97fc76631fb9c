// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Runs a comparison against an existing baseline and builds the review image.

use std::path::PathBuf;
use std::time::Duration;

use tokio::fs;

use crate::codec::decode;
use crate::compositor::{ImageCompositor, Layout, PngCompositor};
use crate::differ::{DiffBounds, DimensionDifference, PixelDiffer, RgbaDiffer};
use crate::error::{ImageRole, Result, SnapshotError};
use crate::resolver::SnapshotPaths;

/// Details of one completed comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct DiffDetails {
    /// Whether baseline and actual have the same dimensions.
    pub is_same_dimensions: bool,
    /// Baseline dimensions minus actual dimensions.
    pub dimension_difference: DimensionDifference,
    /// Percentage (0..=100) of pixels that differ.
    pub mismatch_percentage: f64,
    /// Bounding box of the differing pixels.
    pub diff_bounds: DiffBounds,
    /// Time the differ spent on the analysis.
    pub analysis_time: Duration,
    /// Where the review image goes if the comparison fails.
    pub diff_output_path: PathBuf,
    /// The baseline that was compared against.
    pub baseline_snapshot_path: PathBuf,
}

/// A comparison result together with its composite review image.
#[derive(Clone, Debug, PartialEq)]
pub struct Diff {
    /// Comparison details.
    pub details: DiffDetails,
    /// Encoded composite of baseline, actual and diff, in that order.
    pub image: Vec<u8>,
}

impl Diff {
    /// Write the composite to `details.diff_output_path`.
    pub async fn write_artifact(&self) -> Result<()> {
        let path = &self.details.diff_output_path;
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| SnapshotError::storage(dir, e))?;
        }
        fs::write(path, &self.image)
            .await
            .map_err(|e| SnapshotError::storage(path, e))
    }
}

/// Drives a [`PixelDiffer`] and an [`ImageCompositor`] for one comparison.
#[derive(Clone, Debug, Default)]
pub struct ComparisonOrchestrator<D = RgbaDiffer, C = PngCompositor> {
    differ: D,
    compositor: C,
}

impl<D: PixelDiffer, C: ImageCompositor> ComparisonOrchestrator<D, C> {
    /// Create an orchestrator from its two collaborators.
    pub fn new(differ: D, compositor: C) -> Self {
        Self { differ, compositor }
    }

    /// The configured differ.
    pub fn differ(&self) -> &D {
        &self.differ
    }

    /// Compare `actual` against the baseline at `paths.baseline`.
    ///
    /// Does not write the diff artifact; that only happens once the outcome
    /// is known to be a failure.
    pub async fn compare(&self, paths: &SnapshotPaths, actual: &[u8]) -> Result<Diff> {
        fs::create_dir_all(&paths.diff_output_dir)
            .await
            .map_err(|e| SnapshotError::storage(&paths.diff_output_dir, e))?;

        let pixel_diff = self.differ.diff(&paths.baseline, actual).await?;
        tracing::debug!(
            baseline = %paths.baseline.display(),
            mismatch = pixel_diff.mismatch_percentage,
            same_dimensions = pixel_diff.is_same_dimensions,
            analysis_ms = pixel_diff.analysis_time.as_millis(),
            "diffing complete"
        );

        let baseline_bytes = fs::read(&paths.baseline)
            .await
            .map_err(|e| SnapshotError::storage(&paths.baseline, e))?;

        let images = [
            decode(&baseline_bytes, ImageRole::Baseline)?,
            decode(actual, ImageRole::Actual)?,
            decode(&pixel_diff.diff_image, ImageRole::Diff)?,
        ];
        let sizes = images.each_ref().map(|image| image.dimensions());
        let layout = Layout::choose(&sizes);
        let image = self.compositor.composite(&images, layout)?;

        Ok(Diff {
            details: DiffDetails {
                is_same_dimensions: pixel_diff.is_same_dimensions,
                dimension_difference: pixel_diff.dimension_difference,
                mismatch_percentage: pixel_diff.mismatch_percentage,
                diff_bounds: pixel_diff.diff_bounds,
                analysis_time: pixel_diff.analysis_time,
                diff_output_path: paths.diff_output.clone(),
                baseline_snapshot_path: paths.baseline.clone(),
            },
            image,
        })
    }
}
