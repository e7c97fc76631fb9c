// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Diffing one rendered image against its snapshot.

use std::path::Path;

use crate::compositor::{ImageCompositor, PngCompositor};
use crate::config::DiffConfig;
use crate::differ::{PixelDiffer, RgbaDiffer};
use crate::error::Result;
use crate::identifier::SnapshotIdentifier;
use crate::lock::IdentifierLocks;
use crate::orchestrator::{ComparisonOrchestrator, Diff};
use crate::resolver::{Decision, SnapshotResolver};

/// Input of [`ImageSnapshotter::diff_image_to_snapshot`].
#[derive(Clone, Copy, Debug)]
pub struct SnapshotRequest<'a> {
    /// Encoded image under test.
    pub image_data: &'a [u8],
    /// Slot the image is compared against.
    pub snapshot_identifier: &'a SnapshotIdentifier,
    /// Directory holding the baselines.
    pub snapshots_dir: &'a Path,
    /// Overwrite the baseline instead of comparing.
    pub update_snapshot: bool,
}

/// What happened to a snapshot.
#[derive(Clone, Debug, PartialEq)]
pub enum DiffResult {
    /// No baseline existed; the image became the baseline.
    Added,
    /// An update was forced; the image replaced the baseline.
    Updated,
    /// A baseline existed and was compared against.
    Compared(Diff),
}

impl DiffResult {
    /// Whether a new baseline was captured.
    #[must_use]
    pub fn added(&self) -> bool {
        matches!(self, Self::Added)
    }

    /// Whether an existing baseline was overwritten.
    #[must_use]
    pub fn updated(&self) -> bool {
        matches!(self, Self::Updated)
    }

    /// The comparison, if one ran.
    #[must_use]
    pub fn result(&self) -> Option<&Diff> {
        match self {
            Self::Compared(diff) => Some(diff),
            Self::Added | Self::Updated => None,
        }
    }
}

/// Entry point for comparing rendered images with stored snapshots.
///
/// Calls for the same snapshot are serialized process-wide, across
/// snapshotter instances; see [`IdentifierLocks::global`].
#[derive(Debug, Default)]
pub struct ImageSnapshotter<D = RgbaDiffer, C = PngCompositor> {
    orchestrator: ComparisonOrchestrator<D, C>,
}

impl ImageSnapshotter {
    /// Snapshotter using the built-in differ configured from the environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::with_config(DiffConfig::from_env())
    }

    /// Snapshotter using the built-in differ with `config`.
    #[must_use]
    pub fn with_config(config: DiffConfig) -> Self {
        Self::new(ComparisonOrchestrator::new(
            RgbaDiffer::new(config),
            PngCompositor,
        ))
    }
}

impl<D: PixelDiffer, C: ImageCompositor> ImageSnapshotter<D, C> {
    /// Wrap an orchestrator.
    pub fn new(orchestrator: ComparisonOrchestrator<D, C>) -> Self {
        Self { orchestrator }
    }

    /// The orchestrator used for comparisons.
    pub fn orchestrator(&self) -> &ComparisonOrchestrator<D, C> {
        &self.orchestrator
    }

    /// Capture, update or compare `request.image_data` against its baseline.
    ///
    /// A comparison never writes the diff artifact; the caller decides
    /// whether the result is a failure.
    pub async fn diff_image_to_snapshot(&self, request: SnapshotRequest<'_>) -> Result<DiffResult> {
        let identifier = request.snapshot_identifier;
        let resolver = SnapshotResolver::new(request.snapshots_dir);
        let baseline = resolver.paths(identifier).baseline;
        let _guard = IdentifierLocks::global().lock(&baseline).await;

        match resolver
            .resolve(identifier, request.image_data, request.update_snapshot)
            .await?
        {
            Decision::NoBaseline(paths) => {
                resolver.persist_baseline(&paths, request.image_data).await?;
                tracing::info!(%identifier, path = %paths.baseline.display(), "snapshot added");
                Ok(DiffResult::Added)
            }
            Decision::ForceUpdate(paths) => {
                resolver.persist_baseline(&paths, request.image_data).await?;
                tracing::info!(%identifier, path = %paths.baseline.display(), "snapshot updated");
                Ok(DiffResult::Updated)
            }
            Decision::Compare(paths) => {
                let diff = self.orchestrator.compare(&paths, request.image_data).await?;
                Ok(DiffResult::Compared(diff))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::codec::encode_png;

    fn png(w: u32, h: u32, value: u8) -> Vec<u8> {
        encode_png(&RgbaImage::from_pixel(w, h, Rgba([value, value, value, 255]))).unwrap()
    }

    #[tokio::test]
    async fn lifecycle() {
        let tmp = tempfile::tempdir().unwrap();
        let snapshotter = ImageSnapshotter::with_config(DiffConfig::default());
        let id = SnapshotIdentifier::new("logo").unwrap();
        let first = png(20, 10, 0);
        let request = SnapshotRequest {
            image_data: &first,
            snapshot_identifier: &id,
            snapshots_dir: tmp.path(),
            update_snapshot: false,
        };

        let result = snapshotter.diff_image_to_snapshot(request).await.unwrap();
        assert!(result.added() && !result.updated(), "{result:?}");
        assert!(result.result().is_none());

        let result = snapshotter.diff_image_to_snapshot(request).await.unwrap();
        let diff = result.result().expect("second run compares");
        assert_eq!(diff.details.mismatch_percentage, 0.0);
        assert!(!result.added() && !result.updated());

        let second = png(20, 10, 255);
        let result = snapshotter
            .diff_image_to_snapshot(SnapshotRequest {
                image_data: &second,
                update_snapshot: true,
                ..request
            })
            .await
            .unwrap();
        assert!(result.updated() && !result.added(), "{result:?}");
        assert_eq!(
            std::fs::read(tmp.path().join("logo-snap.png")).unwrap(),
            second
        );
    }
}
