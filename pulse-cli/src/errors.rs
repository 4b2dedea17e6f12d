// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use pulse_metadata::PulseExitCode;
use pulse_runner::{
    errors::{ConfigOverrideError, ConfigParseError, RunFinishError},
    report::NoReportReason,
};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders. Errors are meant to be printed with
// display_to_stderr, which adds context and colors.

/// An error that pulse expects to happen and knows how to report.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDir {
        #[source]
        err: std::io::Error,
    },
    #[error("config parse error")]
    ConfigParse {
        #[from]
        err: ConfigParseError,
    },
    #[error("invalid command-line override")]
    ConfigOverride {
        #[from]
        err: ConfigOverrideError,
    },
    #[error("failed to create the async runtime")]
    RuntimeCreate {
        #[source]
        err: std::io::Error,
    },
    #[error("failed to read the event stream")]
    EventStreamRead {
        path: Option<Utf8PathBuf>,
        #[source]
        err: std::io::Error,
    },
    #[error("failed to finish the run")]
    RunFinish {
        #[from]
        err: RunFinishError,
    },
    #[error("no report at {path}")]
    NoReport {
        path: Utf8PathBuf,
        #[source]
        reason: NoReportReason,
    },
    #[error("tests failed")]
    TestsFailed,
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDir { .. }
            | Self::ConfigParse { .. }
            | Self::ConfigOverride { .. }
            | Self::RuntimeCreate { .. } => PulseExitCode::SETUP_ERROR,
            Self::EventStreamRead { .. } => PulseExitCode::EVENT_STREAM_ERROR,
            Self::RunFinish { err } => match err {
                RunFinishError::ShardWrite(_) => PulseExitCode::SHARD_WRITE_FAILED,
                _ => PulseExitCode::REPORT_WRITE_FAILED,
            },
            Self::NoReport { .. } => PulseExitCode::NO_REPORT,
            Self::TestsFailed => PulseExitCode::TESTS_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDir { err } => {
                error!("could not determine the current directory");
                Some(err as &dyn Error)
            }
            Self::ConfigParse { err } => {
                error!(
                    "failed to parse pulse config at `{}`",
                    err.config_file().style(styles.bold)
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ConfigOverride { err } => {
                error!("{err}");
                None
            }
            Self::RuntimeCreate { err } => {
                error!("failed to create the async runtime");
                Some(err as &dyn Error)
            }
            Self::EventStreamRead { path, err } => {
                match path {
                    Some(path) => error!(
                        "failed to read events from `{}`",
                        path.style(styles.bold)
                    ),
                    None => error!("failed to read events from standard input"),
                }
                Some(err as &dyn Error)
            }
            Self::RunFinish { err } => {
                error!("{err}");
                err.source()
            }
            Self::NoReport { path, reason } => {
                error!("no report at `{}`: {reason}", path.style(styles.bold));
                reason.source()
            }
            Self::TestsFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}
