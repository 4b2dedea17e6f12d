// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use camino_tempfile::Utf8TempDir;
use color_eyre::eyre::{Result, bail, ensure};
use pretty_assertions::assert_eq;
use pulse_metadata::{ReportResults, RunCounts, TestStatus};
use pulse_runner::{
    config::{ConfigOverrides, ResultsFormat},
    record::raw::{RawAttachment, RawError, RawStatus},
    report::ReportWriteOutcome,
    reporter::{RawRunEnd, RunArtifact, RunMode},
};
use std::{collections::BTreeSet, sync::Arc};

#[tokio::test]
async fn unsharded_run_consolidates_retries() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(dir.path(), ConfigOverrides::default());
    let reporter = begin(config.clone(), RunMode::Unsharded, None).await;

    let pays = test_case("t1", "pays with card");
    reporter.on_test_begin(&pays, 0).await;
    reporter
        .on_test_end(&pays, &result(RawStatus::Failed, 0, 0, 1_000))
        .await;
    reporter.on_test_begin(&pays, 1).await;
    reporter
        .on_test_end(&pays, &result(RawStatus::Passed, 1, 1_500, 500))
        .await;

    let refunds = test_case("t2", "refunds");
    reporter
        .on_test_end(&refunds, &result(RawStatus::Passed, 0, 100, 200))
        .await;
    let skipped = test_case("t3", "pays with voucher");
    reporter
        .on_test_end(&skipped, &result(RawStatus::Skipped, 0, 0, 0))
        .await;

    let output = reporter.on_end(&RawRunEnd::default()).await?;
    let RunArtifact::Report { path, outcome } = &output.artifact else {
        panic!("expected a report, got {:?}", output.artifact);
    };
    assert_eq!(*path, config.report_path());
    assert_eq!(*outcome, ReportWriteOutcome::Written);

    let expected_counts = RunCounts {
        total_tests: 3,
        passed: 1,
        failed: 0,
        skipped: 1,
        flaky: 1,
    };
    assert_eq!(output.counts, expected_counts);

    let report = load(&config)?;
    assert_eq!(report.run.counts, expected_counts);
    assert_eq!(report.run.start_time, run_start());
    let environment = report.run.environment.as_ref().expect("environment captured");
    assert_eq!(environment.runtime, "1.45.0");

    let results = consolidated(&report)?;
    let summary: Vec<_> = results
        .iter()
        .map(|r| (r.id.as_str(), r.status, r.attempt_count()))
        .collect();
    assert_eq!(
        summary,
        [
            ("t1", TestStatus::Flaky, 2),
            ("t2", TestStatus::Passed, 1),
            ("t3", TestStatus::Skipped, 1),
        ]
    );

    let t1 = &results[0];
    assert_eq!(t1.name, "checkout.spec.ts > pays with card");
    assert_eq!(t1.duration_ms, 2_000);
    assert_eq!(t1.attempts[0].id, "t1-0");
    assert_eq!(t1.attempts[0].status, TestStatus::Failed);
    assert_eq!(t1.attempts[1].status, TestStatus::Flaky);
    Ok(())
}

#[tokio::test]
async fn zero_tests_still_writes_a_report() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(dir.path(), ConfigOverrides::default());
    let reporter = begin(config.clone(), RunMode::Unsharded, None).await;

    let output = reporter.on_end(&RawRunEnd::default()).await?;
    assert_eq!(output.counts, RunCounts::default());

    let report = load(&config)?;
    assert_eq!(report.run.counts, RunCounts::default());
    assert!(report.results.is_empty());

    let raw: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(config.report_path())?)?;
    assert_eq!(raw["results"], serde_json::json!([]));
    assert_eq!(raw["run"]["totalTests"], 0);
    ensure!(
        raw["metadata"]["generatedAt"]
            .as_str()
            .is_some_and(|s| s.ends_with('Z')),
        "generatedAt is an ISO-8601 UTC string"
    );
    Ok(())
}

#[tokio::test]
async fn accumulate_merges_with_previous_report() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let overrides = ConfigOverrides {
        reset_each_run: Some(false),
        ..Default::default()
    };

    let first = begin(config(dir.path(), overrides.clone()), RunMode::Unsharded, None).await;
    first
        .on_test_end(
            &test_case("t1", "pays with card"),
            &result(RawStatus::Failed, 0, 0, 100),
        )
        .await;
    first
        .on_test_end(&test_case("t2", "refunds"), &result(RawStatus::Passed, 0, 0, 100))
        .await;
    first.on_end(&RawRunEnd::default()).await?;

    let config = config(dir.path(), overrides);
    let second = begin(config.clone(), RunMode::Unsharded, None).await;
    // Retry 0 of t1 replaces the earlier attempt; t3 is new.
    second
        .on_test_end(
            &test_case("t1", "pays with card"),
            &result(RawStatus::Passed, 0, 60_000, 100),
        )
        .await;
    second
        .on_test_end(&test_case("t3", "voids"), &result(RawStatus::Failed, 0, 60_000, 100))
        .await;
    let output = second.on_end(&RawRunEnd::default()).await?;

    assert_eq!(
        output.counts,
        RunCounts {
            total_tests: 3,
            passed: 2,
            failed: 1,
            skipped: 0,
            flaky: 0,
        }
    );
    let report = load(&config)?;
    let results = consolidated(&report)?;
    let ids: Vec<_> = results.iter().map(|r| r.id.as_str()).collect();
    assert_eq!(ids, ["t1", "t2", "t3"]);
    assert_eq!(results[0].attempt_count(), 1);
    assert_eq!(results[0].status, TestStatus::Passed);
    Ok(())
}

#[tokio::test]
async fn reset_each_run_discards_previous_report() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(dir.path(), ConfigOverrides::default());

    let first = begin(config.clone(), RunMode::Unsharded, None).await;
    first
        .on_test_end(&test_case("t1", "old"), &result(RawStatus::Passed, 0, 0, 100))
        .await;
    first.on_end(&RawRunEnd::default()).await?;

    let second = begin(config.clone(), RunMode::Unsharded, None).await;
    second
        .on_test_end(&test_case("t2", "new"), &result(RawStatus::Passed, 0, 0, 100))
        .await;
    second.on_end(&RawRunEnd::default()).await?;

    let report = load(&config)?;
    let ids: Vec<_> = consolidated(&report)?
        .iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(ids, ["t2"]);
    Ok(())
}

#[tokio::test]
async fn screenshots_are_copied_by_default() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let source = dir.path().join("shot.png");
    std::fs::write(&source, b"\x89PNG")?;
    let config = config(dir.path(), ConfigOverrides::default());

    let reporter = begin(config.clone(), RunMode::Unsharded, None).await;
    let raw = with_attachments(
        result(RawStatus::Failed, 0, 0, 100),
        vec![RawAttachment {
            name: "shot.png".to_owned(),
            content_type: "image/png".to_owned(),
            path: Some(source),
            body: None,
        }],
    );
    reporter.on_test_end(&test_case("t1", "pays"), &raw).await;
    reporter.on_end(&RawRunEnd::default()).await?;

    let report = load(&config)?;
    let screenshots = &consolidated(&report)?[0].attempts[0].screenshots;
    assert_eq!(screenshots.len(), 1);
    let screenshot = &screenshots[0];
    ensure!(
        screenshot.starts_with("attachments/t1-0-retry-0/shot-"),
        "unexpected screenshot path {screenshot}"
    );
    assert_eq!(std::fs::read(config.output_dir().join(screenshot))?, b"\x89PNG");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_test_ends_keep_their_own_attachments() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(dir.path(), ConfigOverrides::default());
    let reporter = Arc::new(begin(config.clone(), RunMode::Unsharded, None).await);

    // The last two ids sanitize to the same attachment directory.
    let ids: Vec<String> = (0..6)
        .map(|i| format!("t{i}"))
        .chain(["spec.a.b".to_owned(), "spec.a_b".to_owned()])
        .collect();
    let mut handles = Vec::new();
    for (i, id) in ids.iter().enumerate() {
        let reporter = Arc::clone(&reporter);
        let test = test_case(id, &format!("worker test {i}"));
        let raw = with_attachments(
            result(RawStatus::Passed, 0, 0, 10),
            vec![RawAttachment {
                name: "log".to_owned(),
                content_type: "text/plain".to_owned(),
                path: None,
                body: Some(format!("output of {id}").into_bytes()),
            }],
        );
        handles.push(tokio::spawn(async move {
            reporter.on_test_end(&test, &raw).await;
        }));
    }
    for handle in handles {
        handle.await?;
    }

    let Some(reporter) = Arc::into_inner(reporter) else {
        bail!("reporter is still shared");
    };
    let output = reporter.on_end(&RawRunEnd::default()).await?;
    assert_eq!(output.counts.total_tests, ids.len());

    let report = load(&config)?;
    let results = consolidated(&report)?;
    assert_eq!(results.len(), ids.len());
    let mut paths = BTreeSet::new();
    for test in results {
        let attachments = &test.attempts[0].attachments;
        assert_eq!(attachments.len(), 1, "attachments of {}", test.id);
        let path = &attachments[0].path;
        ensure!(paths.insert(path.clone()), "`{path}` is shared by several attempts");
        assert_eq!(
            std::fs::read_to_string(config.output_dir().join(path))?,
            format!("output of {}", test.id),
        );
    }
    Ok(())
}

#[tokio::test]
async fn screenshots_are_inlined_with_base64_images() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(
        dir.path(),
        ConfigOverrides {
            base64_images: Some(true),
            ..Default::default()
        },
    );

    let reporter = begin(config.clone(), RunMode::Unsharded, None).await;
    let raw = with_attachments(
        result(RawStatus::Failed, 0, 0, 100),
        vec![RawAttachment {
            name: "shot.png".to_owned(),
            content_type: "image/png".to_owned(),
            path: None,
            body: Some(b"png".to_vec()),
        }],
    );
    reporter.on_test_end(&test_case("t1", "pays"), &raw).await;
    reporter.on_end(&RawRunEnd::default()).await?;

    let report = load(&config)?;
    assert_eq!(
        consolidated(&report)?[0].attempts[0].screenshots,
        ["data:image/png;base64,cG5n"]
    );
    ensure!(
        !config.attachments_dir().exists(),
        "no attachment files are written"
    );
    Ok(())
}

#[tokio::test]
async fn attempts_results_format() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(
        dir.path(),
        ConfigOverrides {
            results_format: Some(ResultsFormat::Attempts),
            ..Default::default()
        },
    );

    let reporter = begin(config.clone(), RunMode::Unsharded, None).await;
    let test = test_case("t1", "pays");
    reporter
        .on_test_end(&test, &result(RawStatus::Passed, 1, 500, 100))
        .await;
    reporter
        .on_test_end(&test, &result(RawStatus::Failed, 0, 0, 100))
        .await;
    let output = reporter.on_end(&RawRunEnd::default()).await?;
    assert_eq!(output.counts.flaky, 1);

    let report = load(&config)?;
    let ReportResults::Attempts(attempts) = &report.results else {
        panic!("expected attempts, got {:?}", report.results);
    };
    let ids: Vec<_> = attempts.iter().map(|a| a.id.as_str()).collect();
    assert_eq!(ids, ["t1-0", "t1-1"]);
    assert_eq!(report.run.counts.flaky, 1);
    Ok(())
}

#[tokio::test]
async fn global_errors_are_retained() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    let config = config(dir.path(), ConfigOverrides::default());
    let reporter = begin(config, RunMode::Unsharded, None).await;

    reporter
        .on_error(&RawError {
            message: Some("\u{1b}[31mworker process exited unexpectedly\u{1b}[39m".to_owned()),
            ..Default::default()
        })
        .await;
    let output = reporter.on_end(&RawRunEnd::default()).await?;
    assert_eq!(output.errors, ["worker process exited unexpectedly"]);
    Ok(())
}

#[tokio::test]
async fn unwritable_output_dir_is_fatal() -> Result<()> {
    let dir = Utf8TempDir::new()?;
    // A file where the output directory should be.
    std::fs::write(dir.path().join("blocked"), "")?;
    let config = config(
        dir.path(),
        ConfigOverrides {
            output_dir: Some("blocked/out".into()),
            ..Default::default()
        },
    );

    let reporter = begin(config, RunMode::Unsharded, None).await;
    reporter
        .on_test_end(&test_case("t1", "pays"), &result(RawStatus::Passed, 0, 0, 100))
        .await;
    let error = reporter.on_end(&RawRunEnd::default()).await.unwrap_err();
    ensure!(
        error.to_string() == "failed to write report",
        "unexpected error: {error}"
    );
    Ok(())
}
