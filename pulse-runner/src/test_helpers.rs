// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Builders shared by unit tests.

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use pulse_metadata::{RunUuid, TestRunAttempt, TestStatus};

pub(crate) fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
}

/// An attempt of `test_id` starting `offset_ms` after [`epoch`] and lasting `duration_ms`.
pub(crate) fn make_attempt(
    test_id: &str,
    retry: u32,
    status: TestStatus,
    offset_ms: i64,
    duration_ms: u64,
) -> TestRunAttempt {
    let start_time = epoch() + TimeDelta::milliseconds(offset_ms);
    TestRunAttempt {
        id: pulse_metadata::attempt_id(test_id, retry),
        test_id: test_id.to_owned(),
        run_id: RunUuid::from_u128(0x5eed),
        name: format!("suite > {test_id}"),
        suite: "chromium".to_owned(),
        status,
        duration_ms,
        start_time,
        end_time: start_time + TimeDelta::milliseconds(duration_ms as i64),
        retry,
        location: None,
        steps: Vec::new(),
        error_message: None,
        error_stack: None,
        code_snippet: None,
        tags: Vec::new(),
        stdout: Vec::new(),
        stderr: Vec::new(),
        browser: "chromium".to_owned(),
        screenshots: Vec::new(),
        videos: Vec::new(),
        trace: None,
        attachments: Vec::new(),
    }
}
