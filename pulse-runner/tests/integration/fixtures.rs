// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::Utf8Path;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use color_eyre::eyre::{Result, bail};
use pulse_metadata::{ConsolidatedTestResult, PulseReport, ReportResults, RunUuid};
use pulse_runner::{
    config::{ConfigOverrides, PulseConfig},
    record::raw::{
        ExpectedStatus, RawAttachment, RawProject, RawStatus, RawTestCase, RawTestResult,
    },
    report::{ReportLoad, read_report},
    reporter::{PulseReporter, RawRunConfig, RawShard, RunContext, RunMode},
};

pub(crate) fn run_start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 9, 30, 0).unwrap()
}

pub(crate) fn config(dir: &Utf8Path, overrides: ConfigOverrides) -> PulseConfig {
    PulseConfig::default_config(dir)
        .with_overrides(&overrides)
        .expect("fixture overrides are valid")
}

pub(crate) fn test_case(id: &str, title: &str) -> RawTestCase {
    RawTestCase {
        id: id.to_owned(),
        title_path: vec![
            String::new(),
            "checkout.spec.ts".to_owned(),
            title.to_owned(),
        ],
        project: Some(RawProject {
            name: Some("chromium".to_owned()),
            browser_name: Some("chromium".to_owned()),
            ..Default::default()
        }),
        expected_status: Some(ExpectedStatus::Passed),
        ..Default::default()
    }
}

/// A result starting `offset_ms` after [`run_start`].
pub(crate) fn result(status: RawStatus, retry: u32, offset_ms: i64, duration: i64) -> RawTestResult {
    RawTestResult {
        status: Some(status),
        duration: Some(duration as f64),
        retry,
        start_time: Some(run_start() + TimeDelta::milliseconds(offset_ms)),
        ..Default::default()
    }
}

pub(crate) fn with_attachments(
    mut result: RawTestResult,
    attachments: Vec<RawAttachment>,
) -> RawTestResult {
    result.attachments = attachments;
    result
}

/// Creates a reporter with a fixed run id and start time, and starts the run.
pub(crate) async fn begin(
    config: PulseConfig,
    mode: RunMode,
    shard: Option<(u32, u32)>,
) -> PulseReporter {
    let context = RunContext::with_identity(config, mode, RunUuid::from_u128(0xbeef), run_start());
    let mut reporter = PulseReporter::new(context);
    reporter
        .on_begin(&RawRunConfig {
            shard: shard.map(|(current, total)| RawShard { current, total }),
            version: Some("1.45.0".to_owned()),
        })
        .await;
    reporter
}

pub(crate) fn load(config: &PulseConfig) -> Result<PulseReport> {
    match read_report(&config.report_path()) {
        ReportLoad::Loaded(report) => Ok(*report),
        ReportLoad::NoReport { path, reason } => bail!("no report at `{path}`: {reason}"),
    }
}

pub(crate) fn consolidated(report: &PulseReport) -> Result<&[ConsolidatedTestResult]> {
    match &report.results {
        ReportResults::Consolidated(results) => Ok(results),
        ReportResults::Attempts(_) => bail!("expected consolidated results"),
    }
}
