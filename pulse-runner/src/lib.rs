// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for [pulse](https://crates.io/crates/pulse-cli), a consolidating reporter
//! for browser test runs.
//!
//! The data flow through this crate is:
//!
//! 1. [`record`] turns each finished test attempt into a
//!    [`TestRunAttempt`](pulse_metadata::TestRunAttempt).
//! 2. [`attachments`] saves the screenshots, videos, traces and other files of the attempt.
//! 3. [`shard`] persists the attempts of a worker process, when the run is partitioned.
//! 4. [`consolidate`] groups attempts into one result per logical test.
//! 5. [`report`] writes the report artifact.
//!
//! [`reporter::PulseReporter`] drives all of these from the callbacks of a host test runner.

pub mod attachments;
pub mod config;
pub mod consolidate;
pub mod environment;
pub mod errors;
mod helpers;
pub mod record;
pub mod report;
pub mod reporter;
pub mod shard;
#[cfg(test)]
mod test_helpers;

pub use helpers::plural;
