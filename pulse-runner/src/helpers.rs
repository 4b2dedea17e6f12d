// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for pulse-runner.

use crate::errors::OutputDirCreateError;
use camino::Utf8Path;
use std::io;

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "test" if `count` is 1, otherwise "tests".
    pub fn tests_str(count: usize) -> &'static str {
        if count == 1 { "test" } else { "tests" }
    }

    /// Returns "attempt" if `count` is 1, otherwise "attempts".
    pub fn attempts_str(count: usize) -> &'static str {
        if count == 1 { "attempt" } else { "attempts" }
    }

    /// Returns "file" if `count` is 1, otherwise "files".
    pub fn files_str(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }
}

/// Replaces every character outside `[A-Za-z0-9_-]` with `_`.
pub(crate) fn sanitize_path_component(input: &str) -> String {
    input
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Creates `dir` and its parents. A directory that already exists is not an error.
pub(crate) fn create_dir_all(dir: &Utf8Path) -> Result<(), OutputDirCreateError> {
    match std::fs::create_dir_all(dir) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(error) => Err(OutputDirCreateError::new(dir, error)),
    }
}

/// Async version of [`create_dir_all`].
pub(crate) async fn create_dir_all_async(dir: &Utf8Path) -> Result<(), OutputDirCreateError> {
    match tokio::fs::create_dir_all(dir).await {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(()),
        Err(error) => Err(OutputDirCreateError::new(dir, error)),
    }
}

/// Rounds a millisecond count reported by a host runner, clamping negative and non-finite
/// values to zero.
pub(crate) fn non_negative_millis(millis: Option<f64>) -> u64 {
    match millis {
        // Float-to-int `as` saturates at u64::MAX.
        Some(ms) if ms.is_finite() && ms > 0.0 => ms.round() as u64,
        _ => 0,
    }
}
