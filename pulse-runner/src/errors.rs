// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by pulse.

use camino::Utf8PathBuf;
use config::ConfigError;
use std::{borrow::Cow, error, fmt, io};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse pulse config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// A value was well-formed but not usable.
    #[error("invalid value for `{key}`: {message}")]
    InvalidValue {
        /// The config key.
        key: &'static str,
        /// A description of the problem.
        message: String,
    },
}

/// A command-line override has an unusable value.
#[derive(Debug, Error)]
#[error("invalid override for `{key}`: {message}")]
pub struct ConfigOverrideError {
    key: &'static str,
    message: String,
}

impl ConfigOverrideError {
    pub(crate) fn new(key: &'static str, message: String) -> Self {
        Self { key, message }
    }

    /// Returns the config key the override applies to.
    pub fn key(&self) -> &'static str {
        self.key
    }
}

/// The output directory could not be created.
///
/// This is fatal: no report can be produced without it.
#[derive(Debug, Error)]
#[error("failed to create output directory `{dir}`")]
pub struct OutputDirCreateError {
    dir: Utf8PathBuf,
    #[source]
    error: io::Error,
}

impl OutputDirCreateError {
    pub(crate) fn new(dir: impl Into<Utf8PathBuf>, error: io::Error) -> Self {
        Self {
            dir: dir.into(),
            error,
        }
    }

    /// Returns the directory that could not be created.
    pub fn dir(&self) -> &Utf8PathBuf {
        &self.dir
    }
}

/// An error that occurred while writing a shard file.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ShardWriteError {
    /// The output directory could not be created.
    #[error(transparent)]
    OutputDir(#[from] OutputDirCreateError),

    /// The attempts could not be serialized.
    #[error("failed to serialize shard file `{path}`")]
    Serialize {
        /// The shard file path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The shard file could not be written.
    #[error("failed to write shard file `{path}`")]
    Write {
        /// The shard file path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: io::Error,
    },
}

/// An error that occurred while writing the report artifact.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReportWriteError {
    /// The report directory could not be created.
    #[error(transparent)]
    OutputDir(#[from] OutputDirCreateError),

    /// The report could not be serialized.
    #[error("failed to serialize report `{path}`")]
    Serialize {
        /// The report path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },

    /// The report could not be written.
    #[error("failed to write report `{path}`")]
    Write {
        /// The report path.
        path: Utf8PathBuf,
        /// The underlying error.
        #[source]
        error: atomicwrites::Error<io::Error>,
    },
}

/// An error that prevented a run from producing its output.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RunFinishError {
    /// This process is a shard worker and its shard file could not be written.
    #[error("failed to flush shard results")]
    ShardWrite(#[from] ShardWriteError),

    /// The report artifact could not be written.
    #[error("failed to write report")]
    ReportWrite(#[from] ReportWriteError),
}

/// An error that occurs while parsing a [`ShardSpec`](crate::shard::ShardSpec) input.
#[derive(Clone, Debug, Error)]
pub struct ShardSpecParseError {
    input: String,
    message: Cow<'static, str>,
}

impl ShardSpecParseError {
    pub(crate) fn new(input: impl Into<String>, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            input: input.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ShardSpecParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "shard `{}` must be in the format \"M/N\": {}",
            self.input, self.message
        )
    }
}

/// An error saving a single attachment. Always logged, never returned.
#[derive(Debug, Error)]
pub(crate) enum AttachmentError {
    #[error("attachment `{name}` has neither a path nor a body")]
    NoContent { name: String },

    #[error("attachment source `{path}` does not exist")]
    SourceMissing { path: Utf8PathBuf },

    #[error("failed to read attachment source `{path}`")]
    Read {
        path: Utf8PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("failed to create attachment directory")]
    CreateDir(#[source] OutputDirCreateError),

    #[error("failed to copy `{from}` to `{to}`")]
    Copy {
        from: Utf8PathBuf,
        to: Utf8PathBuf,
        #[source]
        error: io::Error,
    },

    #[error("failed to write attachment `{path}`")]
    Write {
        path: Utf8PathBuf,
        #[source]
        error: io::Error,
    },
}

/// Displays an error along with its chain of sources.
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;

        let mut source = self.error.source();
        while let Some(error) = source {
            write!(f, "\n  caused by:\n  - {error}")?;
            source = error.source();
        }

        Ok(())
    }
}
