// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    RunUuid,
    serde_helpers::{iso8601, safe_u64},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The status of a test, either for a single attempt or consolidated across retries.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum TestStatus {
    /// The test passed.
    Passed,
    /// The test failed, timed out or was interrupted.
    Failed,
    /// The test was skipped.
    Skipped,
    /// The test passed, but not cleanly.
    ///
    /// On an attempt this marks a pass on retry or an unexpected pass of a
    /// test declared to fail. On a consolidated result it means the retries
    /// contain both a pass and a failure.
    Flaky,
}

impl TestStatus {
    /// Returns the underlying outcome, folding [`TestStatus::Flaky`] into a pass.
    pub fn outcome(self) -> TestOutcome {
        match self {
            TestStatus::Passed | TestStatus::Flaky => TestOutcome::Pass,
            TestStatus::Failed => TestOutcome::Fail,
            TestStatus::Skipped => TestOutcome::Skip,
        }
    }

    /// Returns the string used for this status on disk.
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::Flaky => "flaky",
        }
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The pass/fail/skip outcome behind a [`TestStatus`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TestOutcome {
    /// The attempt passed.
    Pass,
    /// The attempt failed.
    Fail,
    /// The attempt did not run.
    Skip,
}

/// The status of a single step.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    /// The step completed without an error.
    Passed,
    /// The step reported an error.
    Failed,
    /// The step was skipped.
    Skipped,
}

/// Whether a hook step runs before or after the test body.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum HookPhase {
    /// A setup hook.
    Before,
    /// A teardown hook.
    After,
}

/// A node in the execution trace of an attempt.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// The identifier of this step, unique within its attempt.
    pub id: String,
    /// The step title.
    pub title: String,
    /// The status, computed from this step's own error only.
    pub status: StepStatus,
    /// The duration in milliseconds.
    #[serde(with = "safe_u64")]
    pub duration_ms: u64,
    /// When the step started.
    #[serde(with = "iso8601")]
    pub start_time: DateTime<Utc>,
    /// When the step ended. Never earlier than `start_time`.
    #[serde(with = "iso8601")]
    pub end_time: DateTime<Utc>,
    /// The error message, if the step failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The error stack, if available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
    /// The source location of the step, as `file:line:column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_location: Option<String>,
    /// Whether this step is a setup or teardown hook.
    #[serde(default)]
    pub is_hook: bool,
    /// The hook phase, set only for hooks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook_phase: Option<HookPhase>,
    /// Child steps, in execution order.
    #[serde(default)]
    pub steps: Vec<Step>,
}

impl Step {
    /// Iterates over this step and all of its descendants, depth first.
    pub fn walk(&self) -> impl Iterator<Item = &Step> + '_ {
        let mut stack = vec![self];
        std::iter::from_fn(move || {
            let step = stack.pop()?;
            stack.extend(step.steps.iter().rev());
            Some(step)
        })
    }
}

/// A generic attachment saved alongside an attempt.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentRef {
    /// The logical name of the attachment.
    pub name: String,
    /// The path of the saved file, relative to the output directory.
    pub path: String,
    /// The MIME type of the attachment.
    pub content_type: String,
}

/// One execution of one test case.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestRunAttempt {
    /// The attempt identifier, `{test_id}-{retry}`.
    pub id: String,
    /// The logical test identifier shared by all retries.
    pub test_id: String,
    /// The run this attempt was recorded in.
    pub run_id: RunUuid,
    /// The full title path, joined with ` > `.
    pub name: String,
    /// The suite or project name.
    pub suite: String,
    /// The attempt status.
    pub status: TestStatus,
    /// The duration in milliseconds.
    #[serde(with = "safe_u64")]
    pub duration_ms: u64,
    /// When the attempt started.
    #[serde(with = "iso8601")]
    pub start_time: DateTime<Utc>,
    /// When the attempt ended. Never earlier than `start_time`.
    #[serde(with = "iso8601")]
    pub end_time: DateTime<Utc>,
    /// The retry ordinal; 0 is the first try.
    pub retry: u32,
    /// The source location of the test, as `file:line:column`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// The execution trace.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// The error message, with terminal escapes removed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// The error stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
    /// A snippet of the source around the failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code_snippet: Option<String>,
    /// Tags declared on the test.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Captured standard output lines.
    #[serde(default)]
    pub stdout: Vec<String>,
    /// Captured standard error lines.
    #[serde(default)]
    pub stderr: Vec<String>,
    /// An opaque description of the browser or environment.
    pub browser: String,
    /// Screenshot paths relative to the output directory, or `data:` URIs.
    #[serde(default)]
    pub screenshots: Vec<String>,
    /// Video paths relative to the output directory.
    #[serde(default)]
    pub videos: Vec<String>,
    /// The trace archive path relative to the output directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace: Option<String>,
    /// Other attachments.
    #[serde(default)]
    pub attachments: Vec<AttachmentRef>,
}

impl TestRunAttempt {
    /// Returns the logical test identifier derived from the attempt identifier.
    pub fn logical_test_id(&self) -> &str {
        crate::logical_test_id(&self.id)
    }
}
