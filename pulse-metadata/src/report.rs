// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ConsolidatedTestResult, RunUuid, TestRunAttempt, TestStatus,
    serde_helpers::{iso8601, safe_u64},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The persisted report artifact.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PulseReport {
    /// The run-level summary.
    pub run: RunSummary,
    /// Per-test results.
    pub results: ReportResults,
    /// Information about the artifact itself.
    pub metadata: ReportMetadata,
}

impl PulseReport {
    /// Returns every attempt in the report, regardless of the results layout.
    pub fn attempts(&self) -> Vec<&TestRunAttempt> {
        match &self.results {
            ReportResults::Consolidated(results) => {
                results.iter().flat_map(|result| &result.attempts).collect()
            }
            ReportResults::Attempts(attempts) => attempts.iter().collect(),
        }
    }

    /// Consumes the report, returning every attempt in it.
    pub fn into_attempts(self) -> Vec<TestRunAttempt> {
        match self.results {
            ReportResults::Consolidated(results) => results
                .into_iter()
                .flat_map(|result| result.attempts)
                .collect(),
            ReportResults::Attempts(attempts) => attempts,
        }
    }
}

/// The per-test section of a [`PulseReport`].
///
/// On disk this is a bare JSON array; the element shape tells the layouts apart.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ReportResults {
    /// One record per logical test, each carrying its attempts.
    Consolidated(Vec<ConsolidatedTestResult>),
    /// Every attempt as its own record.
    Attempts(Vec<TestRunAttempt>),
}

impl ReportResults {
    /// Returns true if there are no results.
    pub fn is_empty(&self) -> bool {
        match self {
            ReportResults::Consolidated(results) => results.is_empty(),
            ReportResults::Attempts(attempts) => attempts.is_empty(),
        }
    }
}

/// Information about the artifact.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    /// When the artifact was generated.
    #[serde(with = "iso8601")]
    pub generated_at: DateTime<Utc>,
}

/// One test-execution session.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    /// The run identifier.
    pub id: RunUuid,
    /// When the run started.
    #[serde(with = "iso8601")]
    pub start_time: DateTime<Utc>,
    /// Total wall-clock duration of the run in milliseconds.
    #[serde(with = "safe_u64")]
    pub duration_ms: u64,
    /// Counts of consolidated results by status.
    #[serde(flatten)]
    pub counts: RunCounts,
    /// The machine the run executed on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<EnvironmentInfo>,
}

/// Counts of consolidated test results by status.
///
/// Each logical test contributes exactly one unit to exactly one bucket.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCounts {
    /// The number of logical tests.
    pub total_tests: usize,
    /// Tests that passed cleanly.
    pub passed: usize,
    /// Tests whose attempts all failed.
    pub failed: usize,
    /// Tests that did not run.
    pub skipped: usize,
    /// Tests with both passing and failing attempts.
    pub flaky: usize,
}

impl RunCounts {
    /// Adds one test with the given consolidated status.
    pub fn add(&mut self, status: TestStatus) {
        self.total_tests += 1;
        match status {
            TestStatus::Passed => self.passed += 1,
            TestStatus::Failed => self.failed += 1,
            TestStatus::Skipped => self.skipped += 1,
            TestStatus::Flaky => self.flaky += 1,
        }
    }

    /// Returns true if any test failed.
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }
}

/// A description of the machine a run executed on.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentInfo {
    /// The host name.
    pub host: String,
    /// The operating system and version.
    pub os: String,
    /// The CPU.
    pub cpu: CpuInfo,
    /// Total memory, human readable.
    pub memory: String,
    /// The version of the test runtime.
    pub runtime: String,
}

/// A description of the CPU a run executed on.
#[derive(Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuInfo {
    /// The CPU model.
    pub model: String,
    /// The number of logical cores.
    pub cores: usize,
}
