// Copyright (c) The nextest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for jvm-runner.

use camino::{Utf8Path, Utf8PathBuf};

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "file" if `count` is 1, otherwise "files".
    pub fn files_str(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }

    /// Returns "snapshot" if `count` is 1, otherwise "snapshots".
    pub fn snapshots_str(count: usize) -> &'static str {
        if count == 1 { "snapshot" } else { "snapshots" }
    }
}

/// Returns true for directories owned by version control systems.
pub(crate) fn is_vcs_dir(name: &str) -> bool {
    matches!(name, ".git" | ".svn" | ".hg" | "CVS" | ".bzr")
}

/// Converts a relative path to use forward slashes, as tarballs expect.
#[cfg(windows)]
pub(crate) fn convert_rel_path_to_forward_slash(rel_path: &Utf8Path) -> Utf8PathBuf {
    if !rel_path.is_relative() {
        panic!("path for conversion to forward slash '{rel_path}' is not relative");
    }
    rel_path.as_str().replace('\\', "/").into()
}

#[cfg(not(windows))]
pub(crate) fn convert_rel_path_to_forward_slash(rel_path: &Utf8Path) -> Utf8PathBuf {
    rel_path.to_path_buf()
}

/// Resolves `path` relative to `base` unless it is already absolute.
pub(crate) fn resolve_path(base: &Utf8Path, path: &Utf8Path) -> Utf8PathBuf {
    if path.is_absolute() {
        path.to_owned()
    } else {
        base.join(path)
    }
}
