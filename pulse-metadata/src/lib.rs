// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Structured access to the artifacts produced by pulse.
//!
//! The main artifact is a [`PulseReport`]: a run-level [`RunSummary`] plus one
//! [`ConsolidatedTestResult`] per logical test, each of which keeps every retry
//! as a [`TestRunAttempt`]. All dates are written as ISO-8601 strings with
//! millisecond precision (see [`serde_helpers::iso8601`]).
//!
//! The types in this crate are meant to be consumed by dashboards and other
//! downstream tools, so they only depend on serde and chrono.

mod attempt;
mod consolidated;
mod exit_codes;
mod ids;
mod report;
pub mod serde_helpers;

pub use attempt::*;
pub use consolidated::*;
pub use exit_codes::*;
pub use ids::*;
pub use report::*;
