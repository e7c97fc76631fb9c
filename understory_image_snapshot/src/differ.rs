// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pixel-level comparison of a baseline against a rendered image.
//!
//! [`PixelDiffer`] is the seam the orchestrator talks to; [`RgbaDiffer`] is
//! the built-in CPU implementation.

use std::path::Path;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use tokio::fs;

use crate::codec::{decode, encode_png};
use crate::config::{ComparisonMode, DiffConfig};
use crate::error::{ImageRole, Result, SnapshotError};

/// Per-channel tolerance used by [`ComparisonMode::Movement`].
const MOVEMENT_TOLERANCE: u8 = 16;

/// Sampling step for images above the large-image threshold.
const LARGE_IMAGE_STEP: u32 = 6;

/// Largest diff canvas, in pixels, the differ will allocate (1 GiB of RGBA8).
const MAX_DIFF_PIXELS: u64 = 1 << 28;

/// Signed difference between baseline and actual dimensions.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct DimensionDifference {
    /// Baseline width minus actual width.
    pub width: i64,
    /// Baseline height minus actual height.
    pub height: i64,
}

/// Bounding box of the differing pixels, inclusive.
///
/// When nothing differs this holds the empty sentinel produced by
/// [`DiffBounds::empty`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DiffBounds {
    /// Topmost differing row.
    pub top: u32,
    /// Leftmost differing column.
    pub left: u32,
    /// Bottommost differing row.
    pub bottom: u32,
    /// Rightmost differing column.
    pub right: u32,
}

impl DiffBounds {
    /// Sentinel for a `width` x `height` comparison with no differences.
    #[must_use]
    pub fn empty(width: u32, height: u32) -> Self {
        Self {
            top: height,
            left: width,
            bottom: 0,
            right: 0,
        }
    }

    /// Whether no pixel was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.top > self.bottom || self.left > self.right
    }

    fn include(&mut self, x: u32, y: u32) {
        self.top = self.top.min(y);
        self.left = self.left.min(x);
        self.bottom = self.bottom.max(y);
        self.right = self.right.max(x);
    }
}

/// Everything a [`PixelDiffer`] reports about one comparison.
#[derive(Clone, Debug, PartialEq)]
pub struct PixelDiff {
    /// Whether both images have the same width and height.
    pub is_same_dimensions: bool,
    /// Baseline dimensions minus actual dimensions.
    pub dimension_difference: DimensionDifference,
    /// Percentage (0..=100) of compared pixels flagged as different.
    pub mismatch_percentage: f64,
    /// Bounding box of the flagged pixels.
    pub diff_bounds: DiffBounds,
    /// Time spent in the analysis.
    pub analysis_time: Duration,
    /// Encoded diff image.
    pub diff_image: Vec<u8>,
}

/// Compares a stored baseline with freshly rendered image bytes.
///
/// Implementations carry their own configuration; it is fixed when the
/// differ is constructed.
#[async_trait]
pub trait PixelDiffer: Send + Sync {
    /// Compare the baseline stored at `baseline` with the encoded `actual` image.
    async fn diff(&self, baseline: &Path, actual: &[u8]) -> Result<PixelDiff>;
}

/// CPU differ working on RGBA8 pixels.
#[derive(Clone, Debug, Default)]
pub struct RgbaDiffer {
    config: DiffConfig,
}

impl RgbaDiffer {
    /// Create a differ with the given configuration.
    #[must_use]
    pub fn new(config: DiffConfig) -> Self {
        Self { config }
    }

    /// The configuration this differ was built with.
    #[must_use]
    pub fn config(&self) -> &DiffConfig {
        &self.config
    }
}

#[async_trait]
impl PixelDiffer for RgbaDiffer {
    async fn diff(&self, baseline: &Path, actual: &[u8]) -> Result<PixelDiff> {
        let baseline_bytes = fs::read(baseline)
            .await
            .map_err(|e| SnapshotError::storage(baseline, e))?;
        let actual = actual.to_vec();
        let config = self.config;

        tokio::task::spawn_blocking(move || {
            let started = Instant::now();
            let baseline = decode(&baseline_bytes, ImageRole::Baseline)?;
            let actual = decode(&actual, ImageRole::Actual)?;
            let analysis = analyse(&baseline, &actual, &config)?;
            let diff_image = encode_png(&analysis.diff_image)?;
            Ok(PixelDiff {
                is_same_dimensions: baseline.dimensions() == actual.dimensions(),
                dimension_difference: DimensionDifference {
                    width: i64::from(baseline.width()) - i64::from(actual.width()),
                    height: i64::from(baseline.height()) - i64::from(actual.height()),
                },
                mismatch_percentage: analysis.mismatch_percentage,
                diff_bounds: analysis.bounds,
                analysis_time: started.elapsed(),
                diff_image,
            })
        })
        .await
        .map_err(|e| SnapshotError::Differ(e.to_string()))?
    }
}

/// Raw result of [`analyse`].
#[derive(Debug)]
pub(crate) struct Analysis {
    pub(crate) mismatch_percentage: f64,
    pub(crate) bounds: DiffBounds,
    pub(crate) diff_image: RgbaImage,
}

/// Compare two decoded images over the union of their extents.
///
/// Pixels that exist in only one of the images always count as different.
/// Large images are sampled on a grid in [`ComparisonMode::Movement`] only.
pub(crate) fn analyse(
    baseline: &RgbaImage,
    actual: &RgbaImage,
    config: &DiffConfig,
) -> Result<Analysis> {
    let width = baseline.width().max(actual.width());
    let height = baseline.height().max(actual.height());
    match u64::from(width).checked_mul(u64::from(height)) {
        Some(pixels) if pixels <= MAX_DIFF_PIXELS => {}
        _ => {
            return Err(SnapshotError::Differ(format!(
                "diff canvas of {width}x{height} pixels is too large"
            )));
        }
    }
    let threshold = config.large_image_threshold;
    let step = if config.mode == ComparisonMode::Movement
        && threshold > 0
        && (width > threshold || height > threshold)
    {
        LARGE_IMAGE_STEP
    } else {
        1
    };
    let tolerance = match config.mode {
        ComparisonMode::Movement => MOVEMENT_TOLERANCE,
        ComparisonMode::Exact => 0,
    };

    let mut diff_image = RgbaImage::new(width, height);
    let mut bounds = DiffBounds::empty(width, height);
    let mut compared = 0_u64;
    let mut mismatched = 0_u64;

    for y in 0..height {
        for x in 0..width {
            let base_px = baseline.get_pixel_checked(x, y);
            let actual_px = actual.get_pixel_checked(x, y);
            let shown = actual_px.or(base_px).copied().unwrap_or(Rgba([0, 0, 0, 0]));

            if x % step != 0 || y % step != 0 {
                diff_image.put_pixel(x, y, faded(shown, config.transparency));
                continue;
            }
            compared += 1;

            let same = match (base_px, actual_px) {
                (Some(a), Some(b)) => {
                    similar(a, b, tolerance)
                        || (config.mode == ComparisonMode::Movement
                            && is_shifted(baseline, actual, x, y, tolerance))
                }
                _ => false,
            };

            if same {
                diff_image.put_pixel(x, y, faded(shown, config.transparency));
            } else {
                mismatched += 1;
                bounds.include(x, y);
                diff_image.put_pixel(x, y, movement_error(shown, config.error_color));
            }
        }
    }

    let mismatch_percentage = if compared == 0 {
        0.0
    } else {
        round_hundredths(mismatched as f64 * 100.0 / compared as f64)
    };

    Ok(Analysis {
        mismatch_percentage,
        bounds,
        diff_image,
    })
}

fn similar(a: &Rgba<u8>, b: &Rgba<u8>, tolerance: u8) -> bool {
    a.0.iter().zip(b.0.iter()).all(|(&p, &q)| p.abs_diff(q) <= tolerance)
}

/// Whether the pixel at `(x, y)` only moved by one pixel between the images,
/// as anti-aliased edges tend to do.
fn is_shifted(baseline: &RgbaImage, actual: &RgbaImage, x: u32, y: u32, tolerance: u8) -> bool {
    let (Some(a), Some(b)) = (baseline.get_pixel_checked(x, y), actual.get_pixel_checked(x, y))
    else {
        return false;
    };
    neighbourhood_contains(baseline, x, y, b, tolerance)
        && neighbourhood_contains(actual, x, y, a, tolerance)
}

fn neighbourhood_contains(
    image: &RgbaImage,
    x: u32,
    y: u32,
    needle: &Rgba<u8>,
    tolerance: u8,
) -> bool {
    for ny in y.saturating_sub(1)..=y.saturating_add(1) {
        for nx in x.saturating_sub(1)..=x.saturating_add(1) {
            if (nx, ny) == (x, y) {
                continue;
            }
            if image
                .get_pixel_checked(nx, ny)
                .is_some_and(|p| similar(p, needle, tolerance))
            {
                return true;
            }
        }
    }
    false
}

/// Greyscale rendition of an unchanged pixel.
#[expect(
    clippy::cast_possible_truncation,
    reason = "values are clamped to the u8 range before casting"
)]
fn faded(pixel: Rgba<u8>, transparency: f32) -> Rgba<u8> {
    let [r, g, b, a] = pixel.0;
    let luma = 0.3 * f32::from(r) + 0.59 * f32::from(g) + 0.11 * f32::from(b);
    let luma = luma.round().clamp(0.0, 255.0) as u8;
    let alpha = (f32::from(a) * transparency).round().clamp(0.0, 255.0) as u8;
    Rgba([luma, luma, luma, alpha])
}

/// Error highlight blended with the underlying pixel so moved content stays
/// recognisable.
#[expect(
    clippy::cast_possible_truncation,
    reason = "values are clamped to the u8 range before casting"
)]
fn movement_error(pixel: Rgba<u8>, error: [u8; 3]) -> Rgba<u8> {
    let blend = |channel: u8, err: u8| -> u8 {
        let err = f32::from(err);
        ((f32::from(channel) * (err / 255.0) + err) / 2.0)
            .round()
            .clamp(0.0, 255.0) as u8
    };
    let [r, g, b, _] = pixel.0;
    Rgba([blend(r, error[0]), blend(g, error[1]), blend(b, error[2]), 255])
}

fn round_hundredths(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn exact() -> DiffConfig {
        DiffConfig::default().with_mode(ComparisonMode::Exact)
    }

    #[test]
    fn identical_images() {
        let image = RgbaImage::from_pixel(10, 4, WHITE);
        let analysis = analyse(&image, &image, &DiffConfig::default()).unwrap();
        assert_eq!(analysis.mismatch_percentage, 0.0);
        assert!(analysis.bounds.is_empty(), "{:?}", analysis.bounds);
        assert_eq!(analysis.diff_image.dimensions(), (10, 4));
    }

    #[test]
    fn counts_changed_rows() {
        let baseline = RgbaImage::from_pixel(10, 10, WHITE);
        let mut actual = baseline.clone();
        for x in 0..10 {
            actual.put_pixel(x, 4, BLACK);
        }
        let analysis = analyse(&baseline, &actual, &exact()).unwrap();
        assert_eq!(analysis.mismatch_percentage, 10.0);
        assert_eq!(
            analysis.bounds,
            DiffBounds {
                top: 4,
                left: 0,
                bottom: 4,
                right: 9
            }
        );
        let highlighted = analysis.diff_image.get_pixel(3, 4);
        assert_eq!(highlighted.0, [128, 0, 128, 255], "movement blend of black");
    }

    #[test]
    fn movement_tolerates_small_deltas() {
        let baseline = RgbaImage::from_pixel(4, 4, Rgba([100, 100, 100, 255]));
        let actual = RgbaImage::from_pixel(4, 4, Rgba([110, 92, 100, 255]));
        assert_eq!(
            analyse(&baseline, &actual, &DiffConfig::default()).unwrap().mismatch_percentage,
            0.0,
            "within tolerance"
        );
        assert_eq!(
            analyse(&baseline, &actual, &exact()).unwrap().mismatch_percentage,
            100.0,
            "exact ignores nothing"
        );
    }

    #[test]
    fn movement_tolerates_one_pixel_shift() {
        let mut baseline = RgbaImage::from_pixel(8, 8, WHITE);
        let mut actual = baseline.clone();
        baseline.put_pixel(3, 3, BLACK);
        actual.put_pixel(4, 3, BLACK);
        assert_eq!(
            analyse(&baseline, &actual, &DiffConfig::default()).unwrap().mismatch_percentage,
            0.0,
            "shifted edge pixel"
        );
        let strict = analyse(&baseline, &actual, &exact()).unwrap();
        assert!(strict.mismatch_percentage > 0.0, "exact flags the shift");
    }

    #[test]
    fn size_mismatch_counts_uncovered_area() {
        let baseline = RgbaImage::from_pixel(10, 10, WHITE);
        let actual = RgbaImage::from_pixel(10, 5, WHITE);
        let analysis = analyse(&baseline, &actual, &DiffConfig::default()).unwrap();
        assert_eq!(analysis.mismatch_percentage, 50.0);
        assert_eq!(analysis.diff_image.dimensions(), (10, 10));
        assert_eq!((analysis.bounds.top, analysis.bounds.bottom), (5, 9));
    }

    #[test]
    fn large_images_are_sampled() {
        let config = DiffConfig::default().with_large_image_threshold(8);
        let baseline = RgbaImage::from_pixel(12, 12, WHITE);
        let mut actual = baseline.clone();
        // Off the sampling grid: invisible to the fast path.
        actual.put_pixel(1, 1, BLACK);
        assert_eq!(analyse(&baseline, &actual, &config).unwrap().mismatch_percentage, 0.0);
        // On the grid: one of four samples.
        actual.put_pixel(6, 6, BLACK);
        assert_eq!(analyse(&baseline, &actual, &config).unwrap().mismatch_percentage, 25.0);
    }

    #[test]
    fn exact_mode_compares_every_pixel_of_large_images() {
        let baseline = RgbaImage::from_pixel(1300, 12, WHITE);
        let mut actual = baseline.clone();
        actual.put_pixel(1, 1, BLACK);
        assert_eq!(
            analyse(&baseline, &actual, &DiffConfig::default())
                .unwrap()
                .mismatch_percentage,
            0.0,
            "movement samples off-grid pixels away"
        );
        let strict = analyse(&baseline, &actual, &exact()).unwrap();
        assert!(strict.mismatch_percentage > 0.0, "exact ignores nothing");
        assert_eq!(
            strict.bounds,
            DiffBounds {
                top: 1,
                left: 1,
                bottom: 1,
                right: 1
            }
        );
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        let baseline = RgbaImage::from_pixel(100_000, 1, WHITE);
        let actual = RgbaImage::from_pixel(1, 100_000, WHITE);
        let err = analyse(&baseline, &actual, &DiffConfig::default()).unwrap_err();
        assert!(matches!(err, SnapshotError::Differ(_)), "{err:?}");
    }

    #[test]
    fn unchanged_pixels_are_faded() {
        let pixel = faded(Rgba([255, 255, 255, 255]), 0.5);
        assert_eq!(pixel.0, [255, 255, 255, 128]);
    }

    #[tokio::test]
    async fn differ_reads_baseline_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("logo-snap.png");
        let baseline = RgbaImage::from_pixel(6, 3, WHITE);
        std::fs::write(&path, encode_png(&baseline).unwrap()).unwrap();
        let actual = encode_png(&RgbaImage::from_pixel(6, 4, WHITE)).unwrap();

        let diff = RgbaDiffer::default().diff(&path, &actual).await.unwrap();
        assert!(!diff.is_same_dimensions);
        assert_eq!(
            diff.dimension_difference,
            DimensionDifference {
                width: 0,
                height: -1
            }
        );
        assert_eq!(diff.mismatch_percentage, 25.0);
        let rendered = decode(&diff.diff_image, ImageRole::Diff).unwrap();
        assert_eq!(rendered.dimensions(), (6, 4));
    }

    #[tokio::test]
    async fn missing_baseline_is_storage_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = RgbaDiffer::default()
            .diff(&tmp.path().join("absent.png"), b"x")
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::Storage { .. }), "{err:?}");
    }
}
