// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};

use crate::error::{ImageRole, Result, SnapshotError};

/// Decode an encoded image buffer into RGBA8 pixels.
pub(crate) fn decode(bytes: &[u8], role: ImageRole) -> Result<RgbaImage> {
    image::load_from_memory(bytes)
        .map(|image| image.to_rgba8())
        .map_err(|source| SnapshotError::Decode { role, source })
}

/// Encode RGBA8 pixels as PNG.
pub(crate) fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|source| SnapshotError::Encode { source })?;
    Ok(bytes)
}
