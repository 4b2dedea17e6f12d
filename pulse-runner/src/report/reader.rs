// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use pulse_metadata::PulseReport;
use std::io;
use thiserror::Error;
use tracing::debug;

/// The result of [`read_report`].
#[derive(Debug)]
pub enum ReportLoad {
    /// The report was read.
    Loaded(Box<PulseReport>),

    /// There is no usable report.
    NoReport {
        /// The path that was read.
        path: Utf8PathBuf,
        /// Why there is no report.
        reason: NoReportReason,
    },
}

impl ReportLoad {
    /// Returns the report, if one was loaded.
    pub fn into_report(self) -> Option<PulseReport> {
        match self {
            Self::Loaded(report) => Some(*report),
            Self::NoReport { .. } => None,
        }
    }
}

/// Why [`read_report`] found no report.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NoReportReason {
    /// Nothing exists at the path.
    #[error("no report has been written yet")]
    Missing,

    /// The path exists but couldn't be read.
    #[error("the report could not be read")]
    Unreadable(#[source] io::Error),

    /// The file isn't a valid report.
    #[error("the report is malformed")]
    Malformed(#[source] serde_json::Error),
}

/// Reads the report artifact at `path`.
///
/// A missing, unreadable or malformed artifact is reported as [`ReportLoad::NoReport`] so that
/// callers can show an empty state rather than an error.
pub fn read_report(path: &Utf8Path) -> ReportLoad {
    let no_report = |reason| {
        debug!("no report at `{path}`: {reason}");
        ReportLoad::NoReport {
            path: path.to_owned(),
            reason,
        }
    };

    let contents = match std::fs::read(path) {
        Ok(contents) => contents,
        Err(error) if error.kind() == io::ErrorKind::NotFound => {
            return no_report(NoReportReason::Missing);
        }
        Err(error) => return no_report(NoReportReason::Unreadable(error)),
    };

    match serde_json::from_slice(&contents) {
        Ok(report) => ReportLoad::Loaded(Box::new(report)),
        Err(error) => no_report(NoReportReason::Malformed(error)),
    }
}
