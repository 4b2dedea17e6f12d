// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::ShardSpecParseError;
use std::{fmt, str::FromStr};

/// Identifies one shard of a partitioned run, as `M/N` with `M` counting up from 1.
///
/// Shard files on disk are indexed from 0; use [`index`](Self::index) for those.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ShardSpec {
    shard: u32,
    total: u32,
}

impl ShardSpec {
    /// Creates a new `ShardSpec`, returning `None` unless `1 <= shard <= total`.
    pub fn new(shard: u32, total: u32) -> Option<Self> {
        (shard >= 1 && shard <= total).then_some(Self { shard, total })
    }

    /// Returns the shard number, counting up from 1.
    pub fn shard(&self) -> u32 {
        self.shard
    }

    /// Returns the zero-based shard index.
    pub fn index(&self) -> u32 {
        self.shard - 1
    }

    /// Returns the total number of shards.
    pub fn total(&self) -> u32 {
        self.total
    }
}

impl fmt::Display for ShardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.shard, self.total)
    }
}

impl FromStr for ShardSpec {
    type Err = ShardSpecParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((shard_str, total_str)) = s.split_once('/') else {
            return Err(ShardSpecParseError::new(s, "missing `/`"));
        };

        let shard: u32 = shard_str.trim().parse().map_err(|err| {
            ShardSpecParseError::new(s, format!("failed to parse shard `{shard_str}`: {err}"))
        })?;
        let total: u32 = total_str.trim().parse().map_err(|err| {
            ShardSpecParseError::new(s, format!("failed to parse total `{total_str}`: {err}"))
        })?;

        Self::new(shard, total).ok_or_else(|| {
            ShardSpecParseError::new(s, format!("shard {shard} must be between 1 and {total}"))
        })
    }
}
