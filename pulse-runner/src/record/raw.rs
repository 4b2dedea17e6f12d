// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Raw payloads as emitted by a host test runner.
//!
//! The shape of these payloads varies between runner versions, so every field is optional or
//! defaulted. A field that is `null` or has an unexpected shape is treated as if it were
//! missing, so that one odd field never costs a test its attempt. Nothing here validates; the
//! recorder decides what a missing field means.

use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;

/// A test case descriptor.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTestCase {
    /// The stable test identifier assigned by the host runner.
    #[serde(deserialize_with = "lenient")]
    pub id: String,
    /// The title path, outermost suite first.
    #[serde(deserialize_with = "lenient_seq")]
    pub title_path: Vec<String>,
    /// Tags declared on the test.
    #[serde(deserialize_with = "lenient_seq")]
    pub tags: Vec<String>,
    /// Where the test is declared.
    #[serde(deserialize_with = "lenient")]
    pub location: Option<RawLocation>,
    /// The project (or suite) the test belongs to.
    #[serde(deserialize_with = "lenient")]
    pub project: Option<RawProject>,
    /// The status the test is declared to have.
    #[serde(deserialize_with = "lenient")]
    pub expected_status: Option<ExpectedStatus>,
}

/// The status a test is declared to have.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExpectedStatus {
    /// The test is expected to pass.
    Passed,
    /// The test is declared to fail.
    Failed,
    /// The test is declared to be skipped.
    Skipped,
    /// The test is expected to time out.
    TimedOut,
    /// The test is expected to be interrupted.
    Interrupted,
    /// A status this version of pulse doesn't know about.
    #[serde(other)]
    Unknown,
}

/// A project, as configured in the host runner.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawProject {
    /// The project name.
    #[serde(deserialize_with = "lenient")]
    pub name: Option<String>,
    /// The browser engine, e.g. `chromium`.
    #[serde(deserialize_with = "lenient")]
    pub browser_name: Option<String>,
    /// The browser channel, e.g. `chrome` or `msedge`.
    #[serde(deserialize_with = "lenient")]
    pub channel: Option<String>,
    /// The user agent override, if any.
    #[serde(deserialize_with = "lenient")]
    pub user_agent: Option<String>,
}

/// A source location.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawLocation {
    /// The source file.
    #[serde(deserialize_with = "lenient")]
    pub file: String,
    /// The 1-based line.
    #[serde(deserialize_with = "lenient")]
    pub line: Option<u32>,
    /// The 1-based column.
    #[serde(deserialize_with = "lenient")]
    pub column: Option<u32>,
}

/// The outcome of one attempt, as reported by the host runner.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawTestResult {
    /// The raw outcome.
    #[serde(deserialize_with = "lenient")]
    pub status: Option<RawStatus>,
    /// The duration in milliseconds, possibly fractional. Negative values mean unknown.
    #[serde(deserialize_with = "lenient_millis")]
    pub duration: Option<f64>,
    /// The retry ordinal; 0 is the first try.
    #[serde(deserialize_with = "lenient")]
    pub retry: u32,
    /// When the attempt started.
    #[serde(deserialize_with = "lenient")]
    pub start_time: Option<DateTime<Utc>>,
    /// The top-level steps.
    #[serde(deserialize_with = "lenient_seq")]
    pub steps: Vec<RawStep>,
    /// Captured standard output, one entry per chunk.
    #[serde(deserialize_with = "lenient_seq")]
    pub stdout: Vec<String>,
    /// Captured standard error, one entry per chunk.
    #[serde(deserialize_with = "lenient_seq")]
    pub stderr: Vec<String>,
    /// The primary error, if the attempt failed.
    #[serde(deserialize_with = "lenient")]
    pub error: Option<RawError>,
    /// Attachments produced by the attempt.
    #[serde(deserialize_with = "lenient_seq")]
    pub attachments: Vec<RawAttachment>,
}

/// A raw outcome.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RawStatus {
    /// The attempt passed.
    Passed,
    /// The attempt failed.
    Failed,
    /// The attempt exceeded its timeout.
    TimedOut,
    /// The attempt was skipped.
    Skipped,
    /// The run was interrupted while the attempt was in flight.
    Interrupted,
    /// An outcome this version of pulse doesn't know about.
    #[serde(other)]
    Unknown,
}

/// A step in the execution trace.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawStep {
    /// The step title.
    #[serde(deserialize_with = "lenient")]
    pub title: String,
    /// The step category, e.g. `hook`, `test.step` or `expect`.
    #[serde(deserialize_with = "lenient")]
    pub category: Option<String>,
    /// When the step started.
    #[serde(deserialize_with = "lenient")]
    pub start_time: Option<DateTime<Utc>>,
    /// The duration in milliseconds, possibly fractional. Negative values mean unknown.
    #[serde(deserialize_with = "lenient_millis")]
    pub duration: Option<f64>,
    /// The error, if the step failed.
    #[serde(deserialize_with = "lenient")]
    pub error: Option<RawError>,
    /// Where the step is declared.
    #[serde(deserialize_with = "lenient")]
    pub location: Option<RawLocation>,
    /// Nested steps.
    #[serde(deserialize_with = "lenient_seq")]
    pub steps: Vec<RawStep>,
}

/// An error reported by the host runner.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawError {
    /// The error message. May contain terminal escapes.
    #[serde(deserialize_with = "lenient")]
    pub message: Option<String>,
    /// The stack trace.
    #[serde(deserialize_with = "lenient")]
    pub stack: Option<String>,
    /// A snippet of the source around the error.
    #[serde(deserialize_with = "lenient")]
    pub snippet: Option<String>,
    /// Where the error was raised.
    #[serde(deserialize_with = "lenient")]
    pub location: Option<RawLocation>,
}

/// An attachment produced by an attempt.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawAttachment {
    /// The logical name, e.g. `screenshot`, `video` or `trace`.
    #[serde(deserialize_with = "lenient")]
    pub name: String,
    /// The MIME type.
    #[serde(deserialize_with = "lenient")]
    pub content_type: String,
    /// The file the attachment was written to, if it lives on disk.
    #[serde(deserialize_with = "lenient")]
    pub path: Option<Utf8PathBuf>,
    /// The attachment contents, if held in memory. Base64 encoded in JSON.
    #[serde(deserialize_with = "deserialize_body")]
    pub body: Option<Vec<u8>>,
}

fn deserialize_body<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
where
    D: Deserializer<'de>,
{
    use base64::Engine;

    let encoded: Option<String> = lenient(deserializer)?;
    let Some(encoded) = encoded else {
        return Ok(None);
    };
    match base64::engine::general_purpose::STANDARD.decode(encoded.as_bytes()) {
        Ok(body) => Ok(Some(body)),
        Err(error) => {
            warn!("ignoring attachment body that isn't valid base64: {error}");
            Ok(None)
        }
    }
}

/// Deserializes `T`, falling back to its default for `null` or a value of the wrong shape.
pub(crate) fn lenient<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).unwrap_or_default())
}

/// Like [`lenient`], but drops individual elements that can't be read instead of the whole list.
fn lenient_seq<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    match Value::deserialize(deserializer)? {
        Value::Array(items) => Ok(items
            .into_iter()
            .filter_map(|item| T::deserialize(item).ok())
            .collect()),
        _ => Ok(Vec::new()),
    }
}

/// Reads a millisecond count from any JSON number.
fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Value::deserialize(deserializer)?.as_f64())
}
