// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    TestRunAttempt, TestStatus,
    serde_helpers::{iso8601, safe_u64},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logical test case across all of its retries.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedTestResult {
    /// The logical test identifier.
    pub id: String,
    /// The full title path of the first attempt.
    pub name: String,
    /// The suite or project name of the first attempt.
    pub suite: String,
    /// The status across all attempts.
    pub status: TestStatus,
    /// Wall-clock span from the earliest start to the latest end, in milliseconds.
    #[serde(with = "safe_u64")]
    pub duration_ms: u64,
    /// The earliest attempt start.
    #[serde(with = "iso8601")]
    pub start_time: DateTime<Utc>,
    /// The latest attempt end.
    #[serde(with = "iso8601")]
    pub end_time: DateTime<Utc>,
    /// The browser descriptor of the first attempt.
    pub browser: String,
    /// The tags of the first attempt.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Every attempt, sorted by retry ordinal. Never empty.
    pub attempts: Vec<TestRunAttempt>,
}

impl ConsolidatedTestResult {
    /// Returns the number of times the test was executed.
    pub fn attempt_count(&self) -> usize {
        self.attempts.len()
    }

    /// Returns the final attempt.
    pub fn last_attempt(&self) -> Option<&TestRunAttempt> {
        self.attempts.last()
    }
}
