// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shared helpers for snapshot integration tests.

#![allow(
    missing_docs,
    reason = "Integration-test helper module; not part of the public API."
)]
#![allow(
    dead_code,
    reason = "Not every integration test uses every helper."
)]

use std::io::Cursor;
use std::path::{Path, PathBuf};

use understory_image_snapshot::image::{self, ImageFormat, Rgba, RgbaImage};
use understory_image_snapshot::{DIFF_OUTPUT_DIR, SnapshotIdentifier};

pub(crate) const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub(crate) const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

pub(crate) fn encode(image: &RgbaImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub(crate) fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes)
        .expect("decode png")
        .to_rgba8()
}

/// Solid `width` x `height` PNG.
pub(crate) fn solid_png(width: u32, height: u32, color: Rgba<u8>) -> Vec<u8> {
    encode(&RgbaImage::from_pixel(width, height, color))
}

/// White PNG with the first `rows` rows painted black.
pub(crate) fn banded_png(width: u32, height: u32, rows: u32) -> Vec<u8> {
    let mut image = RgbaImage::from_pixel(width, height, WHITE);
    for y in 0..rows.min(height) {
        for x in 0..width {
            image.put_pixel(x, y, BLACK);
        }
    }
    encode(&image)
}

pub(crate) fn id(raw: &str) -> SnapshotIdentifier {
    SnapshotIdentifier::new(raw).expect("valid identifier")
}

pub(crate) fn baseline_path(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(format!("{identifier}-snap.png"))
}

pub(crate) fn diff_path(dir: &Path, identifier: &str) -> PathBuf {
    dir.join(DIFF_OUTPUT_DIR)
        .join(format!("{identifier}-diff.png"))
}

/// Files currently present in the diff output directory of `dir`.
pub(crate) fn diff_artifacts(dir: &Path) -> Vec<PathBuf> {
    match std::fs::read_dir(dir.join(DIFF_OUTPUT_DIR)) {
        Ok(entries) => entries
            .map(|entry| entry.expect("dir entry").path())
            .collect(),
        Err(_) => Vec::new(),
    }
}
