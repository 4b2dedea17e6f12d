// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::record::raw::{RawError, RawTestCase, RawTestResult, lenient};
use serde::Deserialize;

/// A callback from the host test runner.
///
/// Events are serialized as JSON objects tagged with an `event` field, for example
/// `{"event": "test-end", "test": {...}, "result": {...}}`.
#[derive(Clone, Debug, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum HostEvent {
    /// The run is starting.
    Begin {
        /// The run configuration.
        #[serde(default, deserialize_with = "lenient")]
        config: RawRunConfig,
    },

    /// A test attempt is starting.
    TestBegin {
        /// The test.
        test: RawTestCase,
        /// The retry ordinal of the attempt that is starting.
        #[serde(default, deserialize_with = "lenient")]
        retry: u32,
    },

    /// A test attempt finished.
    TestEnd {
        /// The test.
        test: RawTestCase,
        /// The result of the attempt.
        #[serde(default, deserialize_with = "lenient")]
        result: RawTestResult,
    },

    /// An error not associated with any test.
    Error {
        /// The error.
        #[serde(default, deserialize_with = "lenient")]
        error: RawError,
    },

    /// The run finished.
    End {
        /// The overall result.
        #[serde(default, deserialize_with = "lenient")]
        result: RawRunEnd,
    },
}

/// The configuration of a run, as reported by the host runner.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRunConfig {
    /// The shard this process runs, if the run is partitioned.
    #[serde(deserialize_with = "lenient")]
    pub shard: Option<RawShard>,
    /// The version of the host runner.
    #[serde(deserialize_with = "lenient")]
    pub version: Option<String>,
}

/// A shard, counting up from 1.
#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawShard {
    /// The 1-based shard number.
    pub current: u32,
    /// The total number of shards.
    pub total: u32,
}

/// The end of a run, as reported by the host runner.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawRunEnd {
    /// The overall status, e.g. `passed`, `failed` or `interrupted`.
    #[serde(deserialize_with = "lenient")]
    pub status: Option<String>,
}
