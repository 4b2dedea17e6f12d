// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Grouping attempts into one result per logical test.
//!
//! A logical test is identified by its attempt identifiers with the retry suffix stripped. The
//! consolidated status of a test is decided here, from the outcomes of all its attempts: a mix of
//! passes and failures makes the test flaky, whatever the attempts were individually tagged as.

use chrono::{DateTime, Utc};
use pulse_metadata::{ConsolidatedTestResult, RunCounts, TestOutcome, TestRunAttempt, TestStatus};
use std::collections::{BTreeMap, btree_map::Entry};
use tracing::debug;

/// The output of [`consolidate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Consolidation {
    /// One result per logical test, ordered by logical test id.
    pub results: Vec<ConsolidatedTestResult>,
    /// A tally of the consolidated statuses.
    pub counts: RunCounts,
}

impl Consolidation {
    /// Returns the earliest start time across all results, if there are any.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.results.iter().map(|result| result.start_time).min()
    }

    /// Returns the latest end time across all results, if there are any.
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.results.iter().map(|result| result.end_time).max()
    }
}

/// Groups `attempts` by logical test and computes one [`ConsolidatedTestResult`] per group.
///
/// The output doesn't depend on the order of `attempts`: groups are ordered by logical test id
/// and attempts within a group by retry ordinal.
pub fn consolidate(attempts: impl IntoIterator<Item = TestRunAttempt>) -> Consolidation {
    let mut groups: BTreeMap<String, Vec<TestRunAttempt>> = BTreeMap::new();
    for attempt in attempts {
        groups
            .entry(attempt.logical_test_id().to_owned())
            .or_default()
            .push(attempt);
    }

    let mut counts = RunCounts::default();
    let results = groups
        .into_iter()
        .filter_map(|(id, attempts)| {
            let result = consolidate_group(id, attempts)?;
            counts.add(result.status);
            Some(result)
        })
        .collect();

    Consolidation { results, counts }
}

/// Computes the consolidated status of a group of attempts of the same test.
///
/// * At least one pass and at least one failure: [`TestStatus::Flaky`].
/// * Otherwise, any failure: [`TestStatus::Failed`].
/// * Otherwise, any pass: [`TestStatus::Passed`].
/// * Otherwise: [`TestStatus::Skipped`].
///
/// An attempt tagged [`TestStatus::Flaky`] counts as a pass.
pub fn consolidated_status<'a>(
    attempts: impl IntoIterator<Item = &'a TestRunAttempt>,
) -> TestStatus {
    let mut any_passed = false;
    let mut any_failed = false;
    for attempt in attempts {
        match attempt.status.outcome() {
            TestOutcome::Pass => any_passed = true,
            TestOutcome::Fail => any_failed = true,
            TestOutcome::Skip => {}
        }
    }

    match (any_passed, any_failed) {
        (true, true) => TestStatus::Flaky,
        (false, true) => TestStatus::Failed,
        (true, false) => TestStatus::Passed,
        (false, false) => TestStatus::Skipped,
    }
}

/// Merges attempts from an earlier report with the attempts of the current run.
///
/// Where both contain an attempt with the same identifier, the one from `current` wins. The
/// relative order of the remaining attempts is preserved, earlier ones first.
pub fn merge_attempts(
    previous: impl IntoIterator<Item = TestRunAttempt>,
    current: impl IntoIterator<Item = TestRunAttempt>,
) -> Vec<TestRunAttempt> {
    let mut merged = Vec::new();
    let mut positions: BTreeMap<String, usize> = BTreeMap::new();

    for attempt in previous.into_iter().chain(current) {
        match positions.entry(attempt.id.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(merged.len());
                merged.push(attempt);
            }
            Entry::Occupied(entry) => {
                debug!("replacing earlier attempt `{}`", attempt.id);
                merged[*entry.get()] = attempt;
            }
        }
    }

    merged
}

fn consolidate_group(
    id: String,
    mut attempts: Vec<TestRunAttempt>,
) -> Option<ConsolidatedTestResult> {
    attempts.sort_by(|a, b| {
        a.retry
            .cmp(&b.retry)
            .then_with(|| a.start_time.cmp(&b.start_time))
            .then_with(|| a.id.cmp(&b.id))
    });

    let start_time = attempts.iter().map(|attempt| attempt.start_time).min()?;
    let end_time = attempts
        .iter()
        .map(|attempt| attempt.end_time)
        .max()?
        .max(start_time);
    let duration_ms = u64::try_from((end_time - start_time).num_milliseconds()).unwrap_or(0);
    let status = consolidated_status(&attempts);

    let first = attempts.first()?;
    Some(ConsolidatedTestResult {
        name: first.name.clone(),
        suite: first.suite.clone(),
        browser: first.browser.clone(),
        tags: first.tags.clone(),
        id,
        status,
        duration_ms,
        start_time,
        end_time,
        attempts,
    })
}
