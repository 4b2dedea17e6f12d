// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{config::PulseConfig, shard::ShardSpec};
use chrono::{DateTime, Utc};
use pulse_metadata::RunUuid;
use std::fmt;

/// The role this process plays in a run.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RunMode {
    /// The only process in the run: writes the report directly.
    Unsharded,

    /// One of several worker processes: writes its attempts to a shard file.
    ShardWorker {
        /// The zero-based shard index.
        index: u32,
        /// The total number of shards.
        total: u32,
    },

    /// Merges the shard files written by workers into the report.
    ShardCoordinator {
        /// The total number of shards.
        total: u32,
    },
}

impl RunMode {
    /// Returns the mode for a worker running `shard`.
    ///
    /// A run with a single shard isn't partitioned, so this returns [`RunMode::Unsharded`] for
    /// it.
    pub fn worker(shard: ShardSpec) -> Self {
        if shard.total() < 2 {
            Self::Unsharded
        } else {
            Self::ShardWorker {
                index: shard.index(),
                total: shard.total(),
            }
        }
    }

    /// Returns the mode for a process merging `total` shards.
    ///
    /// Fewer than two shards means there is nothing to merge, so this returns
    /// [`RunMode::Unsharded`] for those.
    pub fn coordinator(total: u32) -> Self {
        if total < 2 {
            Self::Unsharded
        } else {
            Self::ShardCoordinator { total }
        }
    }

    /// Returns true if this process writes the report artifact.
    pub fn writes_report(self) -> bool {
        !matches!(self, Self::ShardWorker { .. })
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsharded => write!(f, "unsharded"),
            Self::ShardWorker { index, total } => write!(f, "shard worker {}/{total}", index + 1),
            Self::ShardCoordinator { total } => write!(f, "coordinator for {total} shards"),
        }
    }
}

/// Everything about a run that is fixed when it starts.
///
/// A `RunContext` is created once per run and handed to the components that need it.
#[derive(Clone, Debug)]
pub struct RunContext {
    run_id: RunUuid,
    started_at: DateTime<Utc>,
    config: PulseConfig,
    mode: RunMode,
}

impl RunContext {
    /// Creates a context for a run starting now, with a fresh run id.
    pub fn new(config: PulseConfig, mode: RunMode) -> Self {
        Self::with_identity(config, mode, RunUuid::new_v4(), Utc::now())
    }

    /// Creates a context with the given run id and start time.
    pub fn with_identity(
        config: PulseConfig,
        mode: RunMode,
        run_id: RunUuid,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            config,
            mode,
        }
    }

    /// Returns the run id.
    pub fn run_id(&self) -> RunUuid {
        self.run_id
    }

    /// Returns when the run started.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the config.
    pub fn config(&self) -> &PulseConfig {
        &self.config
    }

    /// Returns the role of this process.
    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub(super) fn set_mode(&mut self, mode: RunMode) {
        self.mode = mode;
    }
}
