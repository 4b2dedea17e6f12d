// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::raw::{
    ExpectedStatus, RawError, RawLocation, RawProject, RawStatus, RawStep, RawTestCase,
    RawTestResult,
};
use crate::helpers::non_negative_millis;
use chrono::{DateTime, TimeDelta, Utc};
use pulse_metadata::{HookPhase, RunUuid, Step, StepStatus, TestRunAttempt, TestStatus};
use swrite::{SWrite, swrite};

/// The separator used to join a test's title path into its display name.
pub const TITLE_SEPARATOR: &str = " > ";

/// Converts raw test-end callbacks into [`TestRunAttempt`]s.
///
/// The recorder holds no per-attempt state, so it can be shared across concurrently finishing
/// tests.
#[derive(Clone, Copy, Debug)]
pub struct AttemptRecorder {
    run_id: RunUuid,
}

impl AttemptRecorder {
    /// Creates a recorder for the given run.
    pub fn new(run_id: RunUuid) -> Self {
        Self { run_id }
    }

    /// Records one attempt.
    ///
    /// `fallback_start` is used as the start time when the result doesn't carry one, typically
    /// the time the matching test-begin callback fired.
    ///
    /// The returned attempt has no attachment references yet; those are filled in by the
    /// [`AttachmentVault`](crate::attachments::AttachmentVault).
    pub fn record_attempt(
        &self,
        test: &RawTestCase,
        result: &RawTestResult,
        fallback_start: DateTime<Utc>,
    ) -> TestRunAttempt {
        let id = pulse_metadata::attempt_id(&test.id, result.retry);
        let start_time = result.start_time.unwrap_or(fallback_start);
        let (duration_ms, end_time) = timing(start_time, result.duration);
        let status = convert_status(test.expected_status, result.status, result.retry);

        let steps = record_steps(&result.steps, &format!("{id}:"), start_time);
        let error = result.error.as_ref();

        TestRunAttempt {
            test_id: test.id.clone(),
            run_id: self.run_id,
            name: display_name(test),
            suite: suite_name(test.project.as_ref()),
            status,
            duration_ms,
            start_time,
            end_time,
            retry: result.retry,
            location: test.location.as_ref().map(format_location),
            steps,
            error_message: error.and_then(error_message),
            error_stack: error.and_then(|e| e.stack.clone()),
            code_snippet: error.and_then(|e| e.snippet.clone()),
            tags: test.tags.clone(),
            stdout: result.stdout.clone(),
            stderr: result.stderr.clone(),
            browser: browser_descriptor(test.project.as_ref()),
            screenshots: Vec::new(),
            videos: Vec::new(),
            trace: None,
            attachments: Vec::new(),
            id,
        }
    }
}

/// Derives the status of an attempt from its declared and raw outcomes.
///
/// * A test declared to be skipped is skipped, whatever happened.
/// * A test declared to fail that passed is flaky: the unexpected pass is worth surfacing.
/// * A test declared to fail that failed is a plain failure.
/// * Otherwise the raw outcome maps directly, with time-outs and interruptions counting as
///   failures. An outcome pulse doesn't recognize also counts as a failure, since it can't be
///   shown to have passed. A missing outcome means the attempt never ran, so it counts as
///   skipped. An unrecognized declared status is treated as no declaration.
///
/// Finally, an attempt that passed on a retry is marked flaky. This only tags the attempt; the
/// status of the test as a whole is decided at consolidation time.
pub fn convert_status(
    expected: Option<ExpectedStatus>,
    raw: Option<RawStatus>,
    retry: u32,
) -> TestStatus {
    let status = match (expected, raw) {
        (Some(ExpectedStatus::Skipped), _) => TestStatus::Skipped,
        (Some(ExpectedStatus::Failed), Some(RawStatus::Passed)) => TestStatus::Flaky,
        (Some(ExpectedStatus::Failed), Some(RawStatus::Failed)) => TestStatus::Failed,
        (_, Some(RawStatus::Passed)) => TestStatus::Passed,
        (
            _,
            Some(
                RawStatus::Failed
                | RawStatus::TimedOut
                | RawStatus::Interrupted
                | RawStatus::Unknown,
            ),
        ) => TestStatus::Failed,
        (_, Some(RawStatus::Skipped) | None) => TestStatus::Skipped,
    };

    if status == TestStatus::Passed && retry > 0 {
        TestStatus::Flaky
    } else {
        status
    }
}

fn timing(start_time: DateTime<Utc>, duration: Option<f64>) -> (u64, DateTime<Utc>) {
    let duration_ms = non_negative_millis(duration);
    // Durations too large to represent are treated like missing ones.
    match i64::try_from(duration_ms)
        .ok()
        .and_then(TimeDelta::try_milliseconds)
        .and_then(|delta| start_time.checked_add_signed(delta))
    {
        Some(end_time) => (duration_ms, end_time),
        None => (0, start_time),
    }
}

/// Records a list of sibling steps. Each step's id is `id_prefix` followed by its index.
fn record_steps(raw_steps: &[RawStep], id_prefix: &str, parent_start: DateTime<Utc>) -> Vec<Step> {
    raw_steps
        .iter()
        .enumerate()
        .map(|(index, raw)| record_step(raw, &format!("{id_prefix}{index}"), parent_start))
        .collect()
}

fn record_step(raw: &RawStep, id: &str, parent_start: DateTime<Utc>) -> Step {
    let start_time = raw.start_time.unwrap_or(parent_start);
    let (duration_ms, end_time) = timing(start_time, raw.duration);
    let hook_phase = hook_phase(raw);
    let error = raw.error.as_ref();

    Step {
        id: id.to_owned(),
        title: raw.title.clone(),
        // Computed from this step alone: a failing parent doesn't fail its children.
        status: if error.is_some() {
            StepStatus::Failed
        } else {
            StepStatus::Passed
        },
        duration_ms,
        start_time,
        end_time,
        error_message: error.and_then(error_message),
        error_stack: error.and_then(|e| e.stack.clone()),
        code_location: raw.location.as_ref().map(format_location),
        is_hook: hook_phase.is_some() || raw.category.as_deref() == Some("hook"),
        hook_phase,
        steps: record_steps(&raw.steps, &format!("{id}."), start_time),
    }
}

fn hook_phase(raw: &RawStep) -> Option<HookPhase> {
    let title = raw.title.to_ascii_lowercase();
    let is_hook = raw.category.as_deref() == Some("hook") || title.contains("hook");
    if !is_hook {
        return None;
    }
    if title.starts_with("before") {
        Some(HookPhase::Before)
    } else if title.starts_with("after") {
        Some(HookPhase::After)
    } else {
        None
    }
}

fn error_message(error: &RawError) -> Option<String> {
    let message = error.message.as_deref().or(error.stack.as_deref())?;
    Some(strip_ansi_escapes::strip_str(message))
}

fn display_name(test: &RawTestCase) -> String {
    let name = test
        .title_path
        .iter()
        .filter(|part| !part.is_empty())
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(TITLE_SEPARATOR);
    if name.is_empty() {
        test.id.clone()
    } else {
        name
    }
}

fn suite_name(project: Option<&RawProject>) -> String {
    project
        .and_then(|p| p.name.as_deref())
        .filter(|name| !name.is_empty())
        .unwrap_or("default")
        .to_owned()
}

/// Returns an opaque description of the browser a project runs in.
fn browser_descriptor(project: Option<&RawProject>) -> String {
    let Some(project) = project else {
        return "unknown".to_owned();
    };
    match (&project.browser_name, &project.channel) {
        (Some(browser), Some(channel)) => format!("{browser} ({channel})"),
        (Some(browser), None) => browser.clone(),
        (None, _) => project
            .user_agent
            .clone()
            .or_else(|| project.name.clone())
            .unwrap_or_else(|| "unknown".to_owned()),
    }
}

fn format_location(location: &RawLocation) -> String {
    let mut out = location.file.clone();
    if let Some(line) = location.line {
        swrite!(out, ":{line}");
        if let Some(column) = location.column {
            swrite!(out, ":{column}");
        }
    }
    out
}
