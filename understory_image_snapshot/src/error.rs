// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for snapshot matching.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Which of the three images involved in a comparison a buffer belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ImageRole {
    /// The stored baseline snapshot.
    Baseline,
    /// The freshly rendered image under test.
    Actual,
    /// The diff image rendered by the pixel differ.
    Diff,
}

impl fmt::Display for ImageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Baseline => "baseline",
            Self::Actual => "actual",
            Self::Diff => "diff",
        })
    }
}

/// Errors produced while resolving, comparing or persisting snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A snapshot file or directory could not be read, written or created.
    #[error("snapshot storage failure at `{}`: {source}", .path.display())]
    Storage {
        /// Path of the file or directory involved.
        path: PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// An image buffer could not be decoded.
    #[error("failed to decode {role} image: {source}")]
    Decode {
        /// Which image was corrupt.
        role: ImageRole,
        /// Underlying codec failure.
        #[source]
        source: image::ImageError,
    },

    /// The composite review image could not be encoded.
    #[error("failed to encode composite image: {source}")]
    Encode {
        /// Underlying codec failure.
        #[source]
        source: image::ImageError,
    },

    /// The matcher was used in a way it does not support.
    #[error("{0}")]
    Usage(String),

    /// The pixel differ failed to produce a result.
    #[error("pixel differ failed: {0}")]
    Differ(String),

    /// The images differ by more than the allowed threshold.
    ///
    /// This is a test outcome rather than a system failure; the composite
    /// diff artifact has already been written to `diff_output_path`.
    #[error(
        "Expected image to match or be a close match to snapshot.\nSee diff for details: {}",
        .diff_output_path.display()
    )]
    Mismatch {
        /// Where the composite review image was written.
        diff_output_path: PathBuf,
        /// Mismatch percentage reported by the differ.
        mismatch_percentage: f64,
        /// Threshold the mismatch was checked against.
        threshold: f64,
    },
}

impl SnapshotError {
    pub(crate) fn storage(path: &Path, source: io::Error) -> Self {
        Self::Storage {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn usage(message: impl Into<String>) -> Self {
        Self::Usage(message.into())
    }

    /// Returns `true` for [`SnapshotError::Mismatch`].
    #[must_use]
    pub fn is_mismatch(&self) -> bool {
        matches!(self, Self::Mismatch { .. })
    }
}

/// Result alias used throughout this crate.
pub type Result<T, E = SnapshotError> = core::result::Result<T, E>;
