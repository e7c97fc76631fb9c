// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Baseline location and the first-run / update / compare decision.

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{Result, SnapshotError};
use crate::identifier::SnapshotIdentifier;

/// Name of the directory (relative to a test file) holding its snapshots.
pub const SNAPSHOTS_DIR_NAME: &str = "__image_snapshots__";

/// Subdirectory of the snapshot directory that receives diff artifacts.
pub const DIFF_OUTPUT_DIR: &str = "__diff_output__";

/// File name suffix of a baseline snapshot.
pub const SNAPSHOT_SUFFIX: &str = "-snap.png";

/// File name suffix of a diff artifact.
pub const DIFF_SUFFIX: &str = "-diff.png";

/// On-disk locations belonging to one snapshot identifier.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SnapshotPaths {
    /// `<dir>/<id>-snap.png`
    pub baseline: PathBuf,
    /// `<dir>/__diff_output__`
    pub diff_output_dir: PathBuf,
    /// `<dir>/__diff_output__/<id>-diff.png`
    pub diff_output: PathBuf,
}

impl SnapshotPaths {
    /// Compute the paths for `identifier` inside `snapshots_dir`.
    #[must_use]
    pub fn new(snapshots_dir: &Path, identifier: &SnapshotIdentifier) -> Self {
        let diff_output_dir = snapshots_dir.join(DIFF_OUTPUT_DIR);
        Self {
            baseline: snapshots_dir.join(format!("{identifier}{SNAPSHOT_SUFFIX}")),
            diff_output: diff_output_dir.join(format!("{identifier}{DIFF_SUFFIX}")),
            diff_output_dir,
        }
    }
}

/// What the caller has to do with a freshly rendered image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    /// No baseline exists: persist the image and report it as added.
    NoBaseline(SnapshotPaths),
    /// An update was requested: overwrite the baseline and report it as updated.
    ForceUpdate(SnapshotPaths),
    /// A baseline exists: run the comparison.
    Compare(SnapshotPaths),
}

impl Decision {
    /// Paths of the snapshot this decision applies to.
    #[must_use]
    pub fn paths(&self) -> &SnapshotPaths {
        match self {
            Self::NoBaseline(paths) | Self::ForceUpdate(paths) | Self::Compare(paths) => paths,
        }
    }
}

/// Resolves baseline locations within one snapshot directory.
#[derive(Clone, Debug)]
pub struct SnapshotResolver {
    snapshots_dir: PathBuf,
}

impl SnapshotResolver {
    /// Create a resolver rooted at `snapshots_dir`.
    ///
    /// The directory is not touched until [`resolve`](Self::resolve).
    pub fn new(snapshots_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshots_dir: snapshots_dir.into(),
        }
    }

    /// Resolver for the conventional `__image_snapshots__` directory next to
    /// `test_path`.
    #[must_use]
    pub fn for_test_file(test_path: &Path) -> Self {
        let parent = test_path.parent().unwrap_or_else(|| Path::new(""));
        Self::new(parent.join(SNAPSHOTS_DIR_NAME))
    }

    /// The snapshot directory.
    #[must_use]
    pub fn snapshots_dir(&self) -> &Path {
        &self.snapshots_dir
    }

    /// Paths for `identifier` in this directory.
    #[must_use]
    pub fn paths(&self, identifier: &SnapshotIdentifier) -> SnapshotPaths {
        SnapshotPaths::new(&self.snapshots_dir, identifier)
    }

    /// Decide how to handle `image` for `identifier`.
    ///
    /// Creates the snapshot directory if needed. An update request wins over
    /// an existing baseline.
    pub async fn resolve(
        &self,
        identifier: &SnapshotIdentifier,
        image: &[u8],
        update_requested: bool,
    ) -> Result<Decision> {
        if image.is_empty() {
            return Err(SnapshotError::usage(format!(
                "image data for snapshot `{identifier}` is empty"
            )));
        }

        fs::create_dir_all(&self.snapshots_dir)
            .await
            .map_err(|e| SnapshotError::storage(&self.snapshots_dir, e))?;

        let paths = self.paths(identifier);
        if update_requested {
            tracing::debug!(%identifier, "snapshot update requested");
            return Ok(Decision::ForceUpdate(paths));
        }

        let exists = fs::try_exists(&paths.baseline)
            .await
            .map_err(|e| SnapshotError::storage(&paths.baseline, e))?;
        if exists {
            Ok(Decision::Compare(paths))
        } else {
            tracing::debug!(%identifier, "no baseline yet");
            Ok(Decision::NoBaseline(paths))
        }
    }

    /// Write `image` as the baseline for `paths`, replacing any existing file.
    pub async fn persist_baseline(&self, paths: &SnapshotPaths, image: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.snapshots_dir)
            .await
            .map_err(|e| SnapshotError::storage(&self.snapshots_dir, e))?;
        fs::write(&paths.baseline, image)
            .await
            .map_err(|e| SnapshotError::storage(&paths.baseline, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> SnapshotIdentifier {
        SnapshotIdentifier::new(raw).unwrap()
    }

    #[test]
    fn persisted_layout() {
        let paths = SnapshotPaths::new(Path::new("/tmp/snaps"), &id("logo"));
        assert_eq!(paths.baseline, Path::new("/tmp/snaps/logo-snap.png"));
        assert_eq!(paths.diff_output_dir, Path::new("/tmp/snaps/__diff_output__"));
        assert_eq!(
            paths.diff_output,
            Path::new("/tmp/snaps/__diff_output__/logo-diff.png")
        );
    }

    #[test]
    fn test_file_convention() {
        let resolver = SnapshotResolver::for_test_file(Path::new("/repo/tests/render.rs"));
        assert_eq!(
            resolver.snapshots_dir(),
            Path::new("/repo/tests/__image_snapshots__")
        );
    }

    #[tokio::test]
    async fn decisions() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("nested").join("snaps");
        let resolver = SnapshotResolver::new(&dir);
        let logo = id("logo");

        let decision = resolver.resolve(&logo, b"png", false).await.unwrap();
        assert!(dir.is_dir(), "directory should be created");
        assert!(matches!(decision, Decision::NoBaseline(_)), "{decision:?}");

        resolver.persist_baseline(decision.paths(), b"png").await.unwrap();
        let decision = resolver.resolve(&logo, b"png", false).await.unwrap();
        assert!(matches!(decision, Decision::Compare(_)), "{decision:?}");

        let decision = resolver.resolve(&logo, b"png", true).await.unwrap();
        assert!(matches!(decision, Decision::ForceUpdate(_)), "{decision:?}");

        let decision = resolver.resolve(&id("other"), b"png", true).await.unwrap();
        assert!(
            matches!(decision, Decision::ForceUpdate(_)),
            "update wins even without a baseline"
        );
    }

    #[tokio::test]
    async fn empty_image_is_rejected_before_io() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("snaps");
        let err = SnapshotResolver::new(&dir)
            .resolve(&id("logo"), &[], false)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Usage(_)), "{err:?}");
        assert!(!dir.exists(), "nothing should be created");
    }

    #[tokio::test]
    async fn unwritable_directory_is_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"not a dir").unwrap();
        let err = SnapshotResolver::new(blocker.join("snaps"))
            .resolve(&id("logo"), b"png", false)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Storage { .. }), "{err:?}");
    }
}
