// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support for runs partitioned across several worker processes.
//!
//! Workers can't share memory, so each one persists its attempts to a shard file in the output
//! directory when it finishes. A coordinating process later merges the shard files into one
//! report and deletes them.

mod spec;
mod store;

pub use spec::ShardSpec;
pub use store::{ShardMerge, ShardStore};
