// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, ensure};
use pretty_assertions::assert_eq;
use pulse_metadata::{RunCounts, TestStatus};
use pulse_runner::{
    config::{ConfigOverrides, PulseConfig},
    record::raw::RawStatus,
    reporter::{RawRunEnd, RunArtifact, RunMode},
    shard::ShardStore,
};

/// Runs one shard worker. `tests` are `(id, status, retry, offset)` tuples.
async fn run_worker(
    config: &PulseConfig,
    shard: (u32, u32),
    tests: &[(&str, RawStatus, u32, i64)],
) -> Result<()> {
    let reporter = begin(config.clone(), RunMode::Unsharded, Some(shard)).await;
    ensure!(
        reporter.context().mode()
            == RunMode::ShardWorker {
                index: shard.0 - 1,
                total: shard.1
            },
        "process became a shard worker"
    );
    for &(id, status, retry, offset) in tests {
        reporter
            .on_test_end(&test_case(id, id), &result(status, retry, offset, 100))
            .await;
    }
    let output = reporter.on_end(&RawRunEnd::default()).await?;
    ensure!(
        matches!(output.artifact, RunArtifact::Shard { .. }),
        "workers write shard files"
    );
    Ok(())
}

#[tokio::test]
async fn coordinator_merges_worker_shards() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(dir.path(), ConfigOverrides::default());
    let coordinator = begin(config.clone(), RunMode::coordinator(3), None).await;

    run_worker(
        &config,
        (1, 3),
        &[("a", RawStatus::Passed, 0, 0), ("b", RawStatus::Failed, 0, 0)],
    )
    .await?;
    // The retry of `b` ran on a different shard than its first attempt.
    run_worker(
        &config,
        (2, 3),
        &[("b", RawStatus::Passed, 1, 500), ("c", RawStatus::Failed, 0, 0)],
    )
    .await?;
    run_worker(&config, (3, 3), &[("d", RawStatus::Skipped, 0, 0)]).await?;

    let store = ShardStore::from_config(&config);
    for index in 0..3 {
        ensure!(store.shard_path(index).exists(), "shard {index} was written");
    }
    ensure!(
        !config.report_path().exists(),
        "workers don't write the report"
    );

    let output = coordinator.on_end(&RawRunEnd::default()).await?;
    let expected = RunCounts {
        total_tests: 4,
        passed: 1,
        failed: 1,
        skipped: 1,
        flaky: 1,
    };
    assert_eq!(output.counts, expected);

    let report = load(&config)?;
    assert_eq!(report.run.counts, expected);
    let results = consolidated(&report)?;
    let b = results.iter().find(|r| r.id == "b").expect("b is present");
    assert_eq!(b.status, TestStatus::Flaky);
    let retries: Vec<_> = b.attempts.iter().map(|a| a.retry).collect();
    assert_eq!(retries, [0, 1]);

    for index in 0..3 {
        ensure!(
            !store.shard_path(index).exists(),
            "shard {index} was cleaned up"
        );
    }
    Ok(())
}

#[tokio::test]
async fn missing_shard_is_tolerated() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(dir.path(), ConfigOverrides::default());
    let coordinator = begin(config.clone(), RunMode::coordinator(3), None).await;

    run_worker(&config, (1, 3), &[("a", RawStatus::Passed, 0, 0)]).await?;
    run_worker(&config, (2, 3), &[("b", RawStatus::Failed, 0, 0)]).await?;
    // Shard 3 never reports.

    let output = coordinator.on_end(&RawRunEnd::default()).await?;
    assert_eq!(output.counts.total_tests, 2);
    let report = load(&config)?;
    let ids: Vec<_> = consolidated(&report)?
        .iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(ids, ["a", "b"]);
    Ok(())
}

#[tokio::test]
async fn coordinator_sweeps_stale_shards_on_begin() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(dir.path(), ConfigOverrides::default());

    // Left behind by an aborted run.
    run_worker(&config, (2, 2), &[("stale", RawStatus::Failed, 0, 0)]).await?;

    let coordinator = begin(config.clone(), RunMode::coordinator(2), None).await;
    run_worker(&config, (1, 2), &[("fresh", RawStatus::Passed, 0, 0)]).await?;
    coordinator.on_end(&RawRunEnd::default()).await?;

    let report = load(&config)?;
    let ids: Vec<_> = consolidated(&report)?
        .iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(ids, ["fresh"]);
    Ok(())
}

#[tokio::test]
async fn merge_is_independent_of_shard_assignment() -> Result<()> {
    let tests = [
        ("a", RawStatus::Passed, 0, 0),
        ("b", RawStatus::Failed, 0, 0),
        ("b", RawStatus::Passed, 1, 300),
        ("c", RawStatus::Failed, 0, 0),
        ("c", RawStatus::Failed, 1, 300),
    ];

    let mut outcomes = Vec::new();
    for split in [[0, 1, 2, 3, 4], [4, 3, 2, 1, 0], [2, 0, 4, 1, 3]] {
        let dir = Utf8TempDir::new()?;
        let config = config(dir.path(), ConfigOverrides::default());
        let coordinator = begin(config.clone(), RunMode::coordinator(2), None).await;

        let (first, second) = split.split_at(2);
        let pick = |indexes: &[usize]| indexes.iter().map(|&i| tests[i]).collect::<Vec<_>>();
        run_worker(&config, (1, 2), &pick(second)).await?;
        run_worker(&config, (2, 2), &pick(first)).await?;
        coordinator.on_end(&RawRunEnd::default()).await?;

        let report = load(&config)?;
        let results: Vec<_> = consolidated(&report)?
            .iter()
            .map(|r| {
                let retries: Vec<_> = r.attempts.iter().map(|a| (a.retry, a.status)).collect();
                (r.id.clone(), r.status, r.duration_ms, retries)
            })
            .collect();
        outcomes.push((report.run.counts, results));
    }

    assert_eq!(outcomes[0], outcomes[1]);
    assert_eq!(outcomes[0], outcomes[2]);
    Ok(())
}
