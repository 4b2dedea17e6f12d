// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Recording raw host-runner callbacks as typed attempts.
//!
//! [`raw`] describes the payloads a host test runner hands over when a test finishes, and
//! [`AttemptRecorder`] turns them into [`TestRunAttempt`](pulse_metadata::TestRunAttempt)s.

pub mod raw;
mod recorder;

pub use recorder::*;
