// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    context::{RunContext, RunMode},
    events::{HostEvent, RawRunConfig, RawRunEnd},
};
use crate::{
    attachments::AttachmentVault,
    config::ResultsFormat,
    consolidate::{Consolidation, consolidate, merge_attempts},
    environment::capture_environment,
    errors::{DisplayErrorChain, RunFinishError},
    helpers::plural,
    record::{
        AttemptRecorder,
        raw::{RawError, RawTestCase, RawTestResult},
    },
    report::{ReportLoad, ReportWriteOutcome, ReportWriter, read_report},
    shard::{ShardSpec, ShardStore},
};
use camino::Utf8PathBuf;
use chrono::{DateTime, Utc};
use pulse_metadata::{
    PulseReport, ReportMetadata, ReportResults, RunCounts, RunSummary, TestRunAttempt,
};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Collects the events of a run and produces its report.
///
/// `on_begin` and `on_end` bracket the run and take exclusive access. In between,
/// `on_test_begin`, `on_test_end` and `on_error` take `&self` and may be called concurrently,
/// e.g. for tests running on different host workers.
#[derive(Debug)]
pub struct PulseReporter {
    context: RunContext,
    recorder: AttemptRecorder,
    vault: AttachmentVault,
    shards: ShardStore,
    runtime: Option<String>,
    begin_times: Mutex<HashMap<String, DateTime<Utc>>>,
    attempts: Mutex<Vec<TestRunAttempt>>,
    errors: Mutex<Vec<String>>,
}

/// The outcome of a finished run.
#[derive(Clone, Debug)]
pub struct RunOutput {
    /// What this process wrote.
    pub artifact: RunArtifact,
    /// Counts of the tests in the artifact.
    pub counts: RunCounts,
    /// Errors the host runner reported outside of any test.
    pub errors: Vec<String>,
}

/// The artifact a finished run produced.
#[derive(Clone, Debug)]
pub enum RunArtifact {
    /// This process is a shard worker and wrote its shard file.
    Shard {
        /// The shard file.
        path: Utf8PathBuf,
    },

    /// This process wrote the report.
    Report {
        /// The report file.
        path: Utf8PathBuf,
        /// Whether the report was written or an earlier one was kept.
        outcome: ReportWriteOutcome,
    },
}

impl PulseReporter {
    /// Creates a reporter for the run described by `context`.
    pub fn new(context: RunContext) -> Self {
        let config = context.config();
        Self {
            recorder: AttemptRecorder::new(context.run_id()),
            vault: AttachmentVault::from_config(config),
            shards: ShardStore::from_config(config),
            runtime: None,
            begin_times: Mutex::new(HashMap::new()),
            attempts: Mutex::new(Vec::new()),
            errors: Mutex::new(Vec::new()),
            context,
        }
    }

    /// Returns the context of the run.
    pub fn context(&self) -> &RunContext {
        &self.context
    }

    /// Called when the run starts.
    ///
    /// If the host runner is running one shard of a partitioned run, this process becomes a
    /// shard worker. A coordinator sweeps shard files left behind by earlier runs.
    pub async fn on_begin(&mut self, run: &RawRunConfig) {
        self.runtime.clone_from(&run.version);

        if let Some(shard) = run.shard {
            match (self.context.mode(), ShardSpec::new(shard.current, shard.total)) {
                (RunMode::Unsharded, Some(spec)) => {
                    self.context.set_mode(RunMode::worker(spec));
                }
                (RunMode::Unsharded, None) => warn!(
                    "ignoring invalid shard {}/{} reported by the host runner",
                    shard.current, shard.total
                ),
                (mode, _) => warn!(
                    "ignoring shard {}/{} reported by the host runner: this process is already \
                     a {mode}",
                    shard.current, shard.total
                ),
            }
        }

        info!(
            "run {} started ({}), writing to `{}`",
            self.context.run_id(),
            self.context.mode(),
            self.context.config().output_dir(),
        );

        if let RunMode::ShardCoordinator { .. } = self.context.mode() {
            self.shards.sweep_stale().await;
        }
    }

    /// Called when an attempt of `test` starts.
    pub async fn on_test_begin(&self, test: &RawTestCase, retry: u32) {
        let id = pulse_metadata::attempt_id(&test.id, retry);
        self.begin_times.lock().await.insert(id, Utc::now());
    }

    /// Called when an attempt of `test` finishes.
    ///
    /// The attempt is recorded and its attachments saved before it is added to the run's
    /// results.
    pub async fn on_test_end(&self, test: &RawTestCase, result: &RawTestResult) {
        let id = pulse_metadata::attempt_id(&test.id, result.retry);
        let begin_time = self.begin_times.lock().await.remove(&id);

        let mut attempt =
            self.recorder
                .record_attempt(test, result, begin_time.unwrap_or_else(Utc::now));
        self.vault.attach(&mut attempt, &result.attachments).await;

        debug!("recorded attempt `{}`: {}", attempt.id, attempt.status);
        self.attempts.lock().await.push(attempt);
    }

    /// Called when the host runner reports an error outside of any test.
    pub async fn on_error(&self, error: &RawError) {
        let message = error
            .message
            .as_deref()
            .or(error.stack.as_deref())
            .map_or_else(|| "unknown error".to_owned(), strip_ansi_escapes::strip_str);
        warn!("host runner reported an error: {message}");
        self.errors.lock().await.push(message);
    }

    /// Dispatches `event` to the matching callback, except for [`HostEvent::End`].
    ///
    /// Returns the end-of-run payload if `event` is [`HostEvent::End`]; pass it to
    /// [`on_end`](Self::on_end).
    pub async fn handle_event(&mut self, event: HostEvent) -> Option<RawRunEnd> {
        match event {
            HostEvent::Begin { config } => self.on_begin(&config).await,
            HostEvent::TestBegin { test, retry } => self.on_test_begin(&test, retry).await,
            HostEvent::TestEnd { test, result } => self.on_test_end(&test, &result).await,
            HostEvent::Error { error } => self.on_error(&error).await,
            HostEvent::End { result } => return Some(result),
        }
        None
    }

    /// Called when the run finishes.
    ///
    /// A shard worker writes its shard file. Otherwise, shard files are merged in (when
    /// coordinating), the previous report is folded in (when not resetting each run), and the
    /// consolidated report is written.
    ///
    /// If the report can't be produced, a minimal empty report is written in its place if there
    /// is no report yet, and the error is returned.
    pub async fn on_end(self, end: &RawRunEnd) -> Result<RunOutput, RunFinishError> {
        if let Some(status) = &end.status {
            debug!("host runner finished with status `{status}`");
        }

        let Self {
            context,
            shards,
            runtime,
            attempts,
            errors,
            ..
        } = self;
        let attempts = attempts.into_inner();
        let errors = errors.into_inner();

        match context.mode() {
            RunMode::ShardWorker { index, total } => {
                let counts = consolidate(attempts.iter().cloned()).counts;
                let path = shards.write_shard(index, &attempts).await?;
                info!(
                    "shard {}/{total}: wrote {} {} to `{path}`",
                    index + 1,
                    attempts.len(),
                    plural::attempts_str(attempts.len()),
                );
                Ok(RunOutput {
                    artifact: RunArtifact::Shard { path },
                    counts,
                    errors,
                })
            }
            RunMode::Unsharded | RunMode::ShardCoordinator { .. } => {
                let finisher = ReportFinisher {
                    context: &context,
                    shards: &shards,
                    runtime: runtime.as_deref(),
                };
                match finisher.finish(attempts).await {
                    Ok((artifact, counts)) => Ok(RunOutput {
                        artifact,
                        counts,
                        errors,
                    }),
                    Err(err) => {
                        finisher.write_empty_report();
                        Err(err)
                    }
                }
            }
        }
    }
}

/// Produces the report for the processes that write one.
struct ReportFinisher<'a> {
    context: &'a RunContext,
    shards: &'a ShardStore,
    runtime: Option<&'a str>,
}

impl ReportFinisher<'_> {
    async fn finish(
        &self,
        mut attempts: Vec<TestRunAttempt>,
    ) -> Result<(RunArtifact, RunCounts), RunFinishError> {
        let config = self.context.config();
        let mut start_time = self.context.started_at();

        if let RunMode::ShardCoordinator { total } = self.context.mode() {
            let merge = self.shards.read_all_shards(total).await;
            info!(
                "merged {} {} from {total} shards",
                merge.attempts.len(),
                plural::attempts_str(merge.attempts.len()),
            );
            attempts.extend(merge.attempts);
        }

        let writer = ReportWriter::new(config.report_path());
        if !config.reset_each_run() {
            match read_report(writer.path()) {
                ReportLoad::Loaded(previous) => {
                    start_time = start_time.min(previous.run.start_time);
                    let previous = previous.into_attempts();
                    debug!(
                        "accumulating {} {} from the previous report",
                        previous.len(),
                        plural::attempts_str(previous.len()),
                    );
                    attempts = merge_attempts(previous, attempts);
                }
                ReportLoad::NoReport { reason, .. } => {
                    debug!("no previous report to accumulate: {reason}");
                }
            }
        }

        let consolidation = consolidate(attempts);
        let counts = consolidation.counts;
        let report = self.build_report(consolidation, start_time);
        let outcome = writer.write(&report)?;

        match (outcome, self.context.mode()) {
            (ReportWriteOutcome::Written, RunMode::ShardCoordinator { total }) => {
                self.shards.cleanup(total).await;
            }
            (ReportWriteOutcome::PreservedPrevious, RunMode::ShardCoordinator { .. }) => {
                warn!("keeping shard files since the merged report could not be written");
            }
            _ => {}
        }

        info!(
            "{} {}: {} passed, {} failed, {} flaky, {} skipped",
            counts.total_tests,
            plural::tests_str(counts.total_tests),
            counts.passed,
            counts.failed,
            counts.flaky,
            counts.skipped,
        );
        Ok((
            RunArtifact::Report {
                path: writer.path().to_owned(),
                outcome,
            },
            counts,
        ))
    }

    fn build_report(&self, consolidation: Consolidation, start_time: DateTime<Utc>) -> PulseReport {
        let now = Utc::now();
        let start_time = consolidation
            .start_time()
            .map_or(start_time, |first| first.min(start_time));
        let end_time = consolidation.end_time().map_or(now, |last| last.max(now));
        let duration_ms = u64::try_from((end_time - start_time).num_milliseconds()).unwrap_or(0);

        let results = match self.context.config().results_format() {
            ResultsFormat::Consolidated => ReportResults::Consolidated(consolidation.results),
            ResultsFormat::Attempts => ReportResults::Attempts(
                consolidation
                    .results
                    .into_iter()
                    .flat_map(|result| result.attempts)
                    .collect(),
            ),
        };

        PulseReport {
            run: RunSummary {
                id: self.context.run_id(),
                start_time,
                duration_ms,
                counts: consolidation.counts,
                environment: Some(capture_environment(self.runtime)),
            },
            results,
            metadata: ReportMetadata { generated_at: now },
        }
    }

    /// Writes an empty report so consumers find a parseable artifact, unless one exists already.
    fn write_empty_report(&self) {
        let writer = ReportWriter::new(self.context.config().report_path());
        if writer.path().exists() {
            return;
        }

        let report = self.build_report(Consolidation::default(), self.context.started_at());
        match writer.write(&report) {
            Ok(_) => warn!("wrote an empty report to `{}`", writer.path()),
            Err(err) => error!(
                "failed to write an empty report: {}",
                DisplayErrorChain::new(err)
            ),
        }
    }
}
