// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `pulse` failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum PulseExitCode {}

impl PulseExitCode {
    /// No errors occurred and pulse exited normally.
    pub const OK: i32 = 0;

    /// A report was written, and at least one test in it failed.
    pub const TESTS_FAILED: i32 = 100;

    /// The report artifact could not be written.
    pub const REPORT_WRITE_FAILED: i32 = 101;

    /// A shard file could not be written.
    pub const SHARD_WRITE_FAILED: i32 = 102;

    /// No report artifact was found, or it could not be parsed.
    pub const NO_REPORT: i32 = 4;

    /// Reading the host event stream produced an error.
    pub const EVENT_STREAM_ERROR: i32 = 103;

    /// A user issue happened while setting up a pulse invocation.
    pub const SETUP_ERROR: i32 = 96;
}
