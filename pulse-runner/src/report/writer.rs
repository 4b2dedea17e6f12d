// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    errors::{DisplayErrorChain, ReportWriteError},
    helpers::create_dir_all,
};
use atomicwrites::{AllowOverwrite, AtomicFile};
use camino::{Utf8Path, Utf8PathBuf};
use pulse_metadata::PulseReport;
use std::io::Write;
use tracing::{debug, error, warn};

/// Writes the report artifact.
#[derive(Clone, Debug)]
pub struct ReportWriter {
    path: Utf8PathBuf,
}

/// What [`ReportWriter::write`] did.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[must_use]
pub enum ReportWriteOutcome {
    /// The report was written.
    Written,

    /// The report could not be written, and the artifact from an earlier run was left in place.
    ///
    /// The failure has been logged.
    PreservedPrevious,
}

impl ReportWriter {
    /// Creates a writer for the artifact at `path`.
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the path of the artifact.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Writes `report`, replacing any existing artifact.
    ///
    /// The artifact is replaced atomically, so readers see either the old or the new report and
    /// never a partial one. Writing the same report twice produces identical files.
    ///
    /// If the output directory can't be created, this fails. If the report itself can't be
    /// written but an artifact from an earlier run exists, that artifact is kept and the failure
    /// is only logged.
    pub fn write(&self, report: &PulseReport) -> Result<ReportWriteOutcome, ReportWriteError> {
        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_str().is_empty()) {
            create_dir_all(dir)?;
        }

        match self.write_impl(report) {
            Ok(()) => {
                debug!("wrote report to `{}`", self.path);
                Ok(ReportWriteOutcome::Written)
            }
            Err(err) => self.handle_failure(err),
        }
    }

    fn handle_failure(&self, err: ReportWriteError) -> Result<ReportWriteOutcome, ReportWriteError> {
        if self.path.is_file() {
            warn!(
                "keeping previous report at `{}`: {}",
                self.path,
                DisplayErrorChain::new(&err)
            );
            Ok(ReportWriteOutcome::PreservedPrevious)
        } else {
            error!("{}", DisplayErrorChain::new(&err));
            Err(err)
        }
    }

    fn write_impl(&self, report: &PulseReport) -> Result<(), ReportWriteError> {
        let contents =
            serde_json::to_vec_pretty(report).map_err(|error| ReportWriteError::Serialize {
                path: self.path.clone(),
                error,
            })?;

        AtomicFile::new(&self.path, AllowOverwrite)
            .write(|file| file.write_all(&contents))
            .map_err(|error| ReportWriteError::Write {
                path: self.path.clone(),
                error,
            })
    }
}
