// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Comparison and matcher configuration.
//!
//! Everything that used to be ambient process state is a plain value here.
//! Environment overrides are resolved once with the `from_env` constructors
//! and then injected; nothing in the comparison path reads the environment.

/// Environment variable that switches the differ to [`ComparisonMode::Exact`].
pub const EXACT_ENV: &str = "EXACT_VR";

/// Environment variable carrying the [`UpdateMode`] (`accept`, `new` or `none`).
pub const UPDATE_ENV: &str = "UNDERSTORY_IMAGE_SNAPSHOT";

/// How strictly the pixel differ treats small differences.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ComparisonMode {
    /// Tolerate small per-channel deviations and anti-aliasing shifts.
    #[default]
    Movement,
    /// Ignore nothing: every channel difference counts.
    Exact,
}

/// Configuration for the built-in pixel differ.
///
/// Set once when the differ is constructed and immutable afterwards.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DiffConfig {
    /// RGB color used to highlight mismatching pixels in the diff image.
    pub error_color: [u8; 3],
    /// Sensitivity of the comparison.
    pub mode: ComparisonMode,
    /// Alpha weight applied to unchanged pixels in the diff image (0..=1).
    pub transparency: f32,
    /// Width or height (in pixels) above which images are sampled on a grid
    /// instead of compared pixel by pixel. `0` disables sampling, as does
    /// [`ComparisonMode::Exact`].
    pub large_image_threshold: u32,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            error_color: [255, 0, 255],
            mode: ComparisonMode::Movement,
            transparency: 0.5,
            large_image_threshold: 1200,
        }
    }
}

impl DiffConfig {
    /// Default configuration with the `EXACT_VR` override applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_exact(exact_from_var(std::env::var(EXACT_ENV).ok().as_deref()))
    }

    /// Select [`ComparisonMode::Exact`] when `exact` is set.
    #[must_use]
    pub fn with_exact(mut self, exact: bool) -> Self {
        if exact {
            self.mode = ComparisonMode::Exact;
        }
        self
    }

    /// Set the comparison mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ComparisonMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the error highlight color.
    #[must_use]
    pub fn with_error_color(mut self, error_color: [u8; 3]) -> Self {
        self.error_color = error_color;
        self
    }

    /// Set the transparency applied to unchanged pixels. Clamped to `0..=1`.
    #[must_use]
    pub fn with_transparency(mut self, transparency: f32) -> Self {
        self.transparency = transparency.clamp(0.0, 1.0);
        self
    }

    /// Set the large-image threshold.
    #[must_use]
    pub fn with_large_image_threshold(mut self, threshold: u32) -> Self {
        self.large_image_threshold = threshold;
        self
    }
}

fn exact_from_var(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.is_empty())
}

/// Which baselines the caller wants regenerated.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum UpdateMode {
    /// Never overwrite baselines. Missing ones are still captured, as with
    /// [`UpdateMode::New`].
    None,
    /// Write baselines that do not exist yet.
    #[default]
    New,
    /// Regenerate every baseline unconditionally.
    All,
}

impl UpdateMode {
    /// Parse the value of [`UPDATE_ENV`].
    ///
    /// `accept`/`all` map to [`UpdateMode::All`], `none` to
    /// [`UpdateMode::None`]; anything else (including unset) is
    /// [`UpdateMode::New`].
    #[must_use]
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("accept") || v.eq_ignore_ascii_case("all") => {
                Self::All
            }
            Some(v) if v.eq_ignore_ascii_case("none") => Self::None,
            _ => Self::New,
        }
    }

    /// Read [`UPDATE_ENV`] from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::parse(std::env::var(UPDATE_ENV).ok().as_deref())
    }

    /// Whether existing baselines should be overwritten.
    #[must_use]
    pub fn forces_update(self) -> bool {
        self == Self::All
    }
}

/// Per-assertion options.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MatchOptions {
    /// Use this identifier instead of deriving one from the test name.
    pub custom_snapshot_identifier: Option<String>,
    /// Largest mismatch percentage (0..=100) that still passes.
    pub mismatch_threshold: f64,
}

impl MatchOptions {
    /// Set an explicit snapshot identifier.
    #[must_use]
    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.custom_snapshot_identifier = Some(identifier.into());
        self
    }

    /// Set the tolerated mismatch percentage.
    #[must_use]
    pub fn with_threshold(mut self, mismatch_threshold: f64) -> Self {
        self.mismatch_threshold = mismatch_threshold;
        self
    }
}
