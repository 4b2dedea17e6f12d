// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError, Result,
    output::{OutputContext, OutputOpts, StdoutStyles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use pulse_metadata::{PulseExitCode, PulseReport, RunCounts};
use pulse_runner::{
    config::{ConfigOverrides, PulseConfig, ResultsFormat},
    plural,
    report::{NoReportReason, ReportLoad, ReportWriteOutcome, read_report},
    reporter::{
        HostEvent, PulseReporter, RawRunConfig, RawRunEnd, RunArtifact, RunContext, RunMode,
        RunOutput,
    },
    shard::ShardStore,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Consolidated test reports for retried and sharded test runs.
///
/// Reads the events of a host test runner and produces a single report with one record per
/// test, every retry preserved, and flaky tests detected.
#[derive(Debug, Parser)]
#[command(
    name = "pulse",
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct PulseApp {
    #[command(flatten)]
    output: OutputOpts,

    #[command(flatten)]
    config_opts: ConfigOpts,

    #[command(subcommand)]
    command: Command,
}

impl PulseApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code.
    pub fn exec(self, output: OutputContext) -> Result<i32> {
        let config = self.config_opts.make_config()?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|err| ExpectedError::RuntimeCreate { err })?;

        let styles = output.stdout_styles();
        match self.command {
            Command::Ingest {
                events,
                coordinate_shards,
            } => {
                let mode = coordinate_shards.map_or(RunMode::Unsharded, RunMode::coordinator);
                let reporter = PulseReporter::new(RunContext::new(config, mode));
                let run_output = runtime.block_on(ingest(reporter, events.as_deref()))?;
                finish_run(&run_output, &styles)
            }
            Command::Merge { total_shards } => {
                let reporter =
                    PulseReporter::new(RunContext::new(config, RunMode::coordinator(total_shards)));
                let run_output = runtime.block_on(reporter.on_end(&RawRunEnd::default()))?;
                finish_run(&run_output, &styles)
            }
            Command::Sweep => {
                let store = ShardStore::from_config(&config);
                let removed = runtime.block_on(store.sweep_stale());
                println!(
                    "removed {} shard {} from {}",
                    removed.style(styles.count),
                    plural::files_str(removed),
                    store.dir(),
                );
                Ok(PulseExitCode::OK)
            }
            Command::Show => show(&config, &styles),
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Directory that relative paths are resolved against [default: current directory]
    #[arg(long, global = true, value_name = "DIR")]
    base_dir: Option<Utf8PathBuf>,

    /// Config file [default: base-dir/.config/pulse.toml]
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Directory to write the report and attachments to
    #[arg(long, global = true, value_name = "DIR", env = "PULSE_OUTPUT_DIR")]
    output_dir: Option<Utf8PathBuf>,

    /// File name of the report within the output directory
    #[arg(long, global = true, value_name = "NAME")]
    output_file: Option<String>,

    /// Inline screenshots into the report as base64 data URIs
    #[arg(long, global = true)]
    base64_images: bool,

    /// Merge this run into the existing report instead of replacing it
    #[arg(long, global = true)]
    accumulate: bool,

    /// Layout of the results in the report
    #[arg(long, global = true, value_enum, value_name = "FORMAT")]
    results_format: Option<ResultsFormatOpt>,
}

impl ConfigOpts {
    fn make_config(&self) -> Result<PulseConfig> {
        let base_dir = match &self.base_dir {
            Some(dir) => dir.clone(),
            None => current_dir()?,
        };
        let overrides = ConfigOverrides {
            output_dir: self.output_dir.clone(),
            output_file: self.output_file.clone(),
            base64_images: self.base64_images.then_some(true),
            reset_each_run: self.accumulate.then_some(false),
            results_format: self.results_format.map(ResultsFormat::from),
        };
        let config = PulseConfig::from_sources(&base_dir, self.config_file.as_deref())?
            .with_overrides(&overrides)?;
        debug!("writing reports to `{}`", config.output_dir());
        Ok(config)
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|err| ExpectedError::CurrentDir { err })?;
    Utf8PathBuf::try_from(dir).map_err(|err| ExpectedError::CurrentDir {
        err: err.into_io_error(),
    })
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResultsFormatOpt {
    /// One record per test, with its attempts nested
    Consolidated,
    /// One record per attempt
    Attempts,
}

impl From<ResultsFormatOpt> for ResultsFormat {
    fn from(opt: ResultsFormatOpt) -> Self {
        match opt {
            ResultsFormatOpt::Consolidated => ResultsFormat::Consolidated,
            ResultsFormatOpt::Attempts => ResultsFormat::Attempts,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Build a report from a stream of host runner events
    ///
    /// Events are read as JSON lines, one event per line. Lines that can't be parsed are
    /// skipped with a warning.
    Ingest {
        /// File to read events from [default: standard input]
        #[arg(long, value_name = "FILE")]
        events: Option<Utf8PathBuf>,

        /// Merge the shard files of N workers after the run
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(2..))]
        coordinate_shards: Option<u32>,
    },

    /// Merge the shard files of a partitioned run into the report
    ///
    /// Merge reads whatever shard files are in the output directory and does not remove stale
    /// ones first. Run `pulse sweep` before the workers start so that files left behind by an
    /// earlier run aren't merged into this one.
    Merge {
        /// The number of shards the run was split into
        #[arg(long, value_name = "N", value_parser = clap::value_parser!(u32).range(2..))]
        total_shards: u32,
    },

    /// Delete shard files left behind by earlier runs
    Sweep,

    /// Print the counts of the current report
    Show,
}

async fn ingest(mut reporter: PulseReporter, events: Option<&Utf8Path>) -> Result<RunOutput> {
    let read_error = |err| ExpectedError::EventStreamRead {
        path: events.map(Utf8Path::to_owned),
        err,
    };

    let end = match events {
        Some(path) => {
            let file = tokio::fs::File::open(path).await.map_err(read_error)?;
            feed_events(&mut reporter, BufReader::new(file)).await
        }
        None => feed_events(&mut reporter, BufReader::new(tokio::io::stdin())).await,
    }
    .map_err(read_error)?;

    Ok(reporter.on_end(&end).await?)
}

/// Feeds JSON-lines events to `reporter` until an `end` event or the end of the input.
async fn feed_events(
    reporter: &mut PulseReporter,
    reader: impl AsyncBufRead + Unpin,
) -> std::io::Result<RawRunEnd> {
    let mut lines = reader.lines();
    let mut begun = false;
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event = match serde_json::from_str::<HostEvent>(line) {
            Ok(event) => event,
            Err(error) => {
                warn!("skipping malformed event on line {line_number}: {error}");
                continue;
            }
        };

        match &event {
            HostEvent::Begin { .. } => begun = true,
            _ if !begun => {
                debug!("event stream has no begin event, starting the run");
                reporter.on_begin(&RawRunConfig::default()).await;
                begun = true;
            }
            _ => {}
        }
        if let Some(end) = reporter.handle_event(event).await {
            return Ok(end);
        }
    }

    if !begun {
        reporter.on_begin(&RawRunConfig::default()).await;
    }
    debug!("event stream ended without an end event");
    Ok(RawRunEnd::default())
}

fn finish_run(output: &RunOutput, styles: &StdoutStyles) -> Result<i32> {
    match &output.artifact {
        RunArtifact::Shard { path } => {
            println!("wrote shard file {path}");
        }
        RunArtifact::Report { path, outcome } => {
            print_counts(&output.counts, styles);
            match outcome {
                ReportWriteOutcome::Written => println!("wrote report to {path}"),
                ReportWriteOutcome::PreservedPrevious => {
                    warn!("kept the previous report at `{path}`");
                    return Ok(PulseExitCode::REPORT_WRITE_FAILED);
                }
            }
        }
    }

    if !output.errors.is_empty() {
        info!(
            "the host runner reported {} {} outside of tests",
            output.errors.len(),
            if output.errors.len() == 1 { "error" } else { "errors" },
        );
    }

    if output.counts.has_failures() {
        Err(ExpectedError::TestsFailed)
    } else {
        Ok(PulseExitCode::OK)
    }
}

fn show(config: &PulseConfig, styles: &StdoutStyles) -> Result<i32> {
    match read_report(&config.report_path()) {
        ReportLoad::Loaded(report) => {
            print_report(&report, styles);
            Ok(PulseExitCode::OK)
        }
        ReportLoad::NoReport {
            reason: NoReportReason::Missing,
            ..
        } => {
            println!("no test results yet: run `pulse ingest` to produce a report");
            Ok(PulseExitCode::NO_REPORT)
        }
        ReportLoad::NoReport { path, reason } => Err(ExpectedError::NoReport { path, reason }),
    }
}

fn print_report(report: &PulseReport, styles: &StdoutStyles) {
    let run = &report.run;
    println!(
        "run {} started {} ({} ms)",
        run.id,
        run.start_time.format("%Y-%m-%d %H:%M:%S UTC"),
        run.duration_ms,
    );
    print_counts(&run.counts, styles);
    if let Some(environment) = &run.environment {
        println!(
            "environment: {} on {}, {} ({} cores), {} memory, runtime {}",
            environment.host,
            environment.os,
            environment.cpu.model,
            environment.cpu.cores,
            environment.memory,
            environment.runtime,
        );
    }
}

fn print_counts(counts: &RunCounts, styles: &StdoutStyles) {
    println!(
        "{} {}: {} passed, {} failed, {} flaky, {} skipped",
        counts.total_tests.style(styles.count),
        plural::tests_str(counts.total_tests),
        counts.passed.style(styles.pass),
        counts.failed.style(styles.fail),
        counts.flaky.style(styles.flaky),
        counts.skipped.style(styles.skip),
    );
}
