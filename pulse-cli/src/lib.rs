// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command-line front end for pulse.
//!
//! `pulse ingest` consumes the events of a host test runner as JSON lines and writes a
//! consolidated report. Partitioned runs write one shard file per worker, which
//! `pulse merge` combines.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
pub use output::{OutputContext, StderrStyles};
