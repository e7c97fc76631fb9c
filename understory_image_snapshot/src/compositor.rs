// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stitching baseline, actual and diff into one review image.

use image::{RgbaImage, imageops};

use crate::codec::encode_png;
use crate::error::Result;

/// Stacking axis of a composite.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Layout {
    /// Images stacked top to bottom.
    Vertical,
    /// Images placed left to right.
    Horizontal,
}

impl Layout {
    /// Pick the axis that keeps the composite roughly landscape.
    ///
    /// Stacks vertically when the widest image is wider than every image is
    /// tall; otherwise lays them out horizontally. `sizes` are `(width, height)`.
    ///
    /// ```
    /// use understory_image_snapshot::Layout;
    ///
    /// assert_eq!(Layout::choose(&[(100, 50); 3]), Layout::Vertical);
    /// assert_eq!(Layout::choose(&[(50, 100); 3]), Layout::Horizontal);
    /// assert_eq!(Layout::choose(&[(80, 80); 3]), Layout::Horizontal);
    /// ```
    #[must_use]
    pub fn choose(sizes: &[(u32, u32)]) -> Self {
        let max_width = sizes.iter().map(|&(w, _)| w).max().unwrap_or(0);
        if !sizes.is_empty() && sizes.iter().all(|&(_, h)| max_width > h) {
            Self::Vertical
        } else {
            Self::Horizontal
        }
    }

    /// Canvas size needed to hold `sizes` along this axis.
    #[must_use]
    pub fn canvas_size(self, sizes: &[(u32, u32)]) -> (u32, u32) {
        let max_w = sizes.iter().map(|&(w, _)| w).max().unwrap_or(0);
        let max_h = sizes.iter().map(|&(_, h)| h).max().unwrap_or(0);
        match self {
            Self::Vertical => (max_w, sizes.iter().map(|&(_, h)| h).sum()),
            Self::Horizontal => (sizes.iter().map(|&(w, _)| w).sum(), max_h),
        }
    }

    /// Top-left corner of each image: accumulated along the axis, zero across it.
    #[must_use]
    pub fn offsets(self, sizes: &[(u32, u32)]) -> Vec<(u32, u32)> {
        let mut along = 0;
        sizes
            .iter()
            .map(|&(w, h)| {
                let offset = match self {
                    Self::Vertical => (0, along),
                    Self::Horizontal => (along, 0),
                };
                along += match self {
                    Self::Vertical => h,
                    Self::Horizontal => w,
                };
                offset
            })
            .collect()
    }
}

/// Combines decoded images into one encoded image.
pub trait ImageCompositor: Send + Sync {
    /// Draw `images` in order along `layout` and encode the result.
    fn composite(&self, images: &[RgbaImage], layout: Layout) -> Result<Vec<u8>>;
}

/// Composites onto a transparent RGBA canvas and encodes PNG.
#[derive(Copy, Clone, Debug, Default)]
pub struct PngCompositor;

impl PngCompositor {
    /// Compose without encoding.
    #[must_use]
    pub fn canvas(images: &[RgbaImage], layout: Layout) -> RgbaImage {
        let sizes: Vec<_> = images.iter().map(RgbaImage::dimensions).collect();
        let (width, height) = layout.canvas_size(&sizes);
        let mut canvas = RgbaImage::new(width, height);
        for (image, (x, y)) in images.iter().zip(layout.offsets(&sizes)) {
            imageops::replace(&mut canvas, image, i64::from(x), i64::from(y));
        }
        canvas
    }
}

impl ImageCompositor for PngCompositor {
    fn composite(&self, images: &[RgbaImage], layout: Layout) -> Result<Vec<u8>> {
        encode_png(&Self::canvas(images, layout))
    }
}
