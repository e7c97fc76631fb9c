// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Snapshot identifiers.

use std::fmt;
use std::path::Path;

use crate::error::{Result, SnapshotError};

/// Characters no file name may contain on Windows.
const RESERVED: [char; 7] = ['<', '>', ':', '"', '|', '?', '*'];

/// Opaque, filesystem-safe key naming one snapshot slot inside a directory.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SnapshotIdentifier(String);

impl SnapshotIdentifier {
    /// Validate `raw` as an identifier.
    ///
    /// Rejects empty strings, `.`/`..`, path separators, control characters
    /// and the characters Windows reserves in file names (`<>:"|?*`).
    pub fn new(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        if raw.is_empty() {
            return Err(SnapshotError::usage("snapshot identifier must not be empty"));
        }
        if raw == "." || raw == ".." || raw.contains("..") {
            return Err(SnapshotError::usage(format!(
                "snapshot identifier `{raw}` must not contain `..`"
            )));
        }
        if raw.chars().any(|c| matches!(c, '/' | '\\')) {
            return Err(SnapshotError::usage(format!(
                "snapshot identifier `{raw}` must not contain path separators"
            )));
        }
        if let Some(c) = raw.chars().find(|&c| c.is_control() || RESERVED.contains(&c)) {
            return Err(SnapshotError::usage(format!(
                "snapshot identifier `{}` must not contain {c:?}",
                raw.escape_debug()
            )));
        }
        Ok(Self(raw))
    }

    /// Derive an identifier from the test file, test name and the per-test
    /// assertion counter.
    ///
    /// ```
    /// use std::path::Path;
    /// use understory_image_snapshot::SnapshotIdentifier;
    ///
    /// let id = SnapshotIdentifier::derive(
    ///     Path::new("tests/widget_rendering.rs"),
    ///     "renders toolbar",
    ///     1,
    /// )
    /// .unwrap();
    /// assert_eq!(id.as_str(), "widget-rendering-rs-renders-toolbar-1");
    /// ```
    pub fn derive(test_path: &Path, test_name: &str, counter: u32) -> Result<Self> {
        let file = test_path
            .file_name()
            .map(|name| name.to_string_lossy())
            .unwrap_or_default();
        Self::new(dashify(&format!("{file}-{test_name}-{counter}")))
    }

    /// The identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SnapshotIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SnapshotIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Kebab-case a free-form name.
///
/// Splits camelCase boundaries, maps every non-alphanumeric character
/// (underscores included) to `-`, trims dashes from both ends and lowercases.
/// Runs of dashes are kept as-is.
pub(crate) fn dashify(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut prev_lower = false;
    for c in input.trim().chars() {
        if c.is_uppercase() && prev_lower {
            out.push('-');
        }
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else {
            out.push('-');
        }
        prev_lower = c.is_lowercase();
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dashify_cases() {
        assert_eq!(dashify("can write image snapshot"), "can-write-image-snapshot");
        assert_eq!(dashify("renderButton"), "render-button");
        assert_eq!(dashify("snake_case_name"), "snake-case-name");
        assert_eq!(dashify("  --Edge case!-- "), "edge-case");
        assert_eq!(dashify("a  b"), "a--b");
    }

    #[test]
    fn derive_uses_file_name_only() {
        let id = SnapshotIdentifier::derive(Path::new("/repo/tests/render.rs"), "draws logo", 3)
            .unwrap();
        assert_eq!(id.as_str(), "render-rs-draws-logo-3");
    }

    #[test]
    fn rejects_unsafe_identifiers() {
        for bad in [
            "", ".", "..", "a/b", "a\\b", "../escape", "nul\0", "a:b", "x?", "<tag>", "pipe|",
            "star*", "quote\"", "tab\t", "bell\u{7}",
        ] {
            let err = SnapshotIdentifier::new(bad).unwrap_err();
            assert!(
                matches!(err, SnapshotError::Usage(_)),
                "`{bad}` should be a usage error"
            );
        }
        assert_eq!(SnapshotIdentifier::new("logo").unwrap().as_str(), "logo");
    }
}
