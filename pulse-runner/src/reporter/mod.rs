// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turning the callbacks of a host test runner into a report.
//!
//! The main type here is [`PulseReporter`], which is created from a [`RunContext`] and fed
//! [`HostEvent`]s.

mod context;
mod events;
mod imp;

pub use context::*;
pub use events::*;
pub use imp::*;
