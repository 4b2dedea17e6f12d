// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration for pulse.
//!
//! Configuration is layered: the defaults in `default-config.toml` are embedded in the binary,
//! and a user config file, if present, is applied on top. Command-line overrides are applied last
//! via [`PulseConfig::with_overrides`].

use crate::errors::{ConfigOverrideError, ConfigParseError, ConfigParseErrorKind};
use camino::{Utf8Path, Utf8PathBuf};
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, builder::DefaultState};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::BTreeSet;
use tracing::warn;

/// The default location of the user config file, relative to the base directory.
pub const CONFIG_PATH: &str = ".config/pulse.toml";

/// The name of the directory within the output directory that attachments are saved to.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Pulse configuration.
#[derive(Clone, Debug)]
pub struct PulseConfig {
    base_dir: Utf8PathBuf,
    output_dir: Utf8PathBuf,
    inner: PulseConfigImpl,
}

impl PulseConfig {
    /// The default config, embedded in pulse.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.toml");

    /// Reads the config, resolving relative paths against `base_dir`.
    ///
    /// If `config_file` is `None`, the file at [`CONFIG_PATH`] under `base_dir` is used if it
    /// exists.
    pub fn from_sources(
        base_dir: &Utf8Path,
        config_file: Option<&Utf8Path>,
    ) -> Result<Self, ConfigParseError> {
        let (config_file, required) = match config_file {
            Some(file) => (base_dir.join(file), true),
            None => (base_dir.join(CONFIG_PATH), false),
        };

        let builder = Self::make_default_config()
            .add_source(File::new(config_file.as_str(), FileFormat::Toml).required(required));
        let (inner, ignored) = Self::build_and_deserialize_config(&builder)
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;
        if !ignored.is_empty() {
            warn!(
                "ignoring unknown configuration keys in `{config_file}`: {}",
                ignored.iter().join(", ")
            );
        }
        inner
            .validate()
            .map_err(|kind| ConfigParseError::new(&config_file, kind))?;

        Ok(Self {
            base_dir: base_dir.to_owned(),
            output_dir: base_dir.join(&inner.report.output_dir),
            inner,
        })
    }

    /// Returns the default config, with relative paths resolved against `base_dir`.
    pub fn default_config(base_dir: &Utf8Path) -> Self {
        let (inner, ignored) = Self::build_and_deserialize_config(&Self::make_default_config())
            .expect("default config is always valid");
        // The default config is embedded in this binary, so it must not contain unknown keys.
        assert!(
            ignored.is_empty(),
            "found unknown keys in default config: {}",
            ignored.iter().join(", ")
        );
        Self {
            base_dir: base_dir.to_owned(),
            output_dir: base_dir.join(&inner.report.output_dir),
            inner,
        }
    }

    /// Applies command-line overrides on top of the file-based config.
    ///
    /// Overrides are held to the same rules as the config file.
    pub fn with_overrides(
        mut self,
        overrides: &ConfigOverrides,
    ) -> Result<Self, ConfigOverrideError> {
        if let Some(output_dir) = &overrides.output_dir {
            self.output_dir = self.base_dir.join(output_dir);
        }
        if let Some(output_file) = &overrides.output_file {
            validate_output_file(output_file)
                .map_err(|message| ConfigOverrideError::new(OUTPUT_FILE_KEY, message))?;
            self.inner.report.output_file.clone_from(output_file);
        }
        if let Some(base64_images) = overrides.base64_images {
            self.inner.report.base64_images = base64_images;
        }
        if let Some(reset_each_run) = overrides.reset_each_run {
            self.inner.report.reset_each_run = reset_each_run;
        }
        if let Some(results_format) = overrides.results_format {
            self.inner.report.results_format = results_format;
        }
        Ok(self)
    }

    /// Returns the absolute output directory.
    pub fn output_dir(&self) -> &Utf8Path {
        &self.output_dir
    }

    /// Returns the path the report artifact is written to.
    pub fn report_path(&self) -> Utf8PathBuf {
        self.output_dir.join(&self.inner.report.output_file)
    }

    /// Returns the directory attachments are saved to.
    pub fn attachments_dir(&self) -> Utf8PathBuf {
        self.output_dir.join(ATTACHMENTS_DIR)
    }

    /// Returns true if screenshots are embedded as `data:` URIs.
    pub fn base64_images(&self) -> bool {
        self.inner.report.base64_images
    }

    /// Returns true if each run overwrites the previous report.
    pub fn reset_each_run(&self) -> bool {
        self.inner.report.reset_each_run
    }

    /// Returns the layout of the report's results.
    pub fn results_format(&self) -> ResultsFormat {
        self.inner.report.results_format
    }

    /// Returns the prefix shard files are named with.
    pub fn shard_file_prefix(&self) -> &str {
        &self.inner.shard.file_prefix
    }

    fn make_default_config() -> ConfigBuilder<DefaultState> {
        Config::builder().add_source(File::from_str(Self::DEFAULT_CONFIG, FileFormat::Toml))
    }

    fn build_and_deserialize_config(
        builder: &ConfigBuilder<DefaultState>,
    ) -> Result<(PulseConfigImpl, BTreeSet<String>), ConfigParseErrorKind> {
        let config = builder
            .build_cloned()
            .map_err(|error| ConfigParseErrorKind::BuildError(Box::new(error)))?;

        let mut ignored = BTreeSet::new();
        let mut cb = |path: serde_ignored::Path| {
            ignored.insert(path.to_string());
        };
        let ignored_de = serde_ignored::Deserializer::new(config, &mut cb);
        let config: PulseConfigImpl =
            serde_path_to_error::deserialize(ignored_de).map_err(|error| {
                // The config crate reports the key as well; drop it so the path only
                // appears once.
                let path = error.path().clone();
                let error = match error.into_inner() {
                    ConfigError::At { error, .. } => *error,
                    other => other,
                };
                ConfigParseErrorKind::DeserializeError(Box::new(serde_path_to_error::Error::new(
                    path, error,
                )))
            })?;

        Ok((config, ignored))
    }
}

/// Overrides for config values, typically from the command line.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    /// Overrides `report.output-dir`.
    pub output_dir: Option<Utf8PathBuf>,
    /// Overrides `report.output-file`.
    pub output_file: Option<String>,
    /// Overrides `report.base64-images`.
    pub base64_images: Option<bool>,
    /// Overrides `report.reset-each-run`.
    pub reset_each_run: Option<bool>,
    /// Overrides `report.results-format`.
    pub results_format: Option<ResultsFormat>,
}

/// The layout of the results in a report.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultsFormat {
    /// One record per logical test, with attempts nested.
    #[default]
    Consolidated,
    /// One record per attempt.
    Attempts,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PulseConfigImpl {
    report: ReportConfigImpl,
    shard: ShardConfigImpl,
}

impl PulseConfigImpl {
    fn validate(&self) -> Result<(), ConfigParseErrorKind> {
        validate_output_file(&self.report.output_file).map_err(|message| {
            ConfigParseErrorKind::InvalidValue {
                key: OUTPUT_FILE_KEY,
                message,
            }
        })?;
        if self.shard.file_prefix.is_empty() || self.shard.file_prefix.contains(['/', '\\']) {
            return Err(ConfigParseErrorKind::InvalidValue {
                key: "shard.file-prefix",
                message: format!(
                    "`{}` must be non-empty and contain no path separators",
                    self.shard.file_prefix
                ),
            });
        }
        Ok(())
    }
}

const OUTPUT_FILE_KEY: &str = "report.output-file";

/// The report must land directly inside the output directory.
fn validate_output_file(output_file: &str) -> Result<(), String> {
    if output_file.is_empty() || Utf8Path::new(output_file).file_name() != Some(output_file) {
        return Err(format!("`{output_file}` must be a plain file name"));
    }
    Ok(())
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ReportConfigImpl {
    output_dir: Utf8PathBuf,
    output_file: String,
    base64_images: bool,
    reset_each_run: bool,
    results_format: ResultsFormat,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct ShardConfigImpl {
    file_prefix: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use indoc::indoc;
    use test_case::test_case;

    fn write_config(dir: &Utf8TempDir, contents: &str) {
        let config_dir = dir.path().join(".config");
        std::fs::create_dir_all(&config_dir).unwrap();
        std::fs::write(config_dir.join("pulse.toml"), contents).unwrap();
    }

    #[test]
    fn defaults_without_user_config() {
        let dir = Utf8TempDir::new().unwrap();
        let config = PulseConfig::from_sources(dir.path(), None).unwrap();

        assert_eq!(config.output_dir(), dir.path().join("pulse-report"));
        assert_eq!(
            config.report_path(),
            dir.path().join("pulse-report/playwright-pulse-report.json")
        );
        assert!(!config.base64_images());
        assert!(config.reset_each_run());
        assert_eq!(config.results_format(), ResultsFormat::Consolidated);
        assert_eq!(config.shard_file_prefix(), ".pulse-shard-");
    }

    #[test]
    fn user_config_overrides_defaults() {
        let dir = Utf8TempDir::new().unwrap();
        write_config(
            &dir,
            indoc! {r#"
                [report]
                output-dir = "reports/e2e"
                base64-images = true
                reset-each-run = false
                results-format = "attempts"
            "#},
        );

        let config = PulseConfig::from_sources(dir.path(), None).unwrap();
        assert_eq!(config.output_dir(), dir.path().join("reports/e2e"));
        assert!(config.base64_images());
        assert!(!config.reset_each_run());
        assert_eq!(config.results_format(), ResultsFormat::Attempts);
        // Unspecified keys keep their defaults.
        assert_eq!(config.shard_file_prefix(), ".pulse-shard-");
    }

    #[test]
    fn invalid_values_report_their_path() {
        let dir = Utf8TempDir::new().unwrap();
        write_config(
            &dir,
            indoc! {r#"
                [report]
                base64-images = "sometimes"
            "#},
        );

        let error = PulseConfig::from_sources(dir.path(), None).unwrap_err();
        match error.kind() {
            ConfigParseErrorKind::DeserializeError(error) => {
                assert_eq!(error.path().to_string(), "report.base64-images");
            }
            other => panic!("unexpected error kind: {other:?}"),
        }
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let dir = Utf8TempDir::new().unwrap();
        write_config(
            &dir,
            indoc! {r#"
                [report]
                output-dri = "typo"
            "#},
        );

        let config = PulseConfig::from_sources(dir.path(), None).unwrap();
        assert_eq!(config.output_dir(), dir.path().join("pulse-report"));
    }

    #[test]
    fn output_file_must_be_a_file_name() {
        let dir = Utf8TempDir::new().unwrap();
        write_config(
            &dir,
            indoc! {r#"
                [report]
                output-file = "nested/report.json"
            "#},
        );

        let error = PulseConfig::from_sources(dir.path(), None).unwrap_err();
        assert!(
            matches!(
                error.kind(),
                ConfigParseErrorKind::InvalidValue {
                    key: "report.output-file",
                    ..
                }
            ),
            "{error:?}"
        );
    }

    #[test]
    fn explicit_config_file_must_exist() {
        let dir = Utf8TempDir::new().unwrap();
        let error =
            PulseConfig::from_sources(dir.path(), Some(Utf8Path::new("missing.toml"))).unwrap_err();
        assert!(matches!(error.kind(), ConfigParseErrorKind::BuildError(_)));
    }

    #[test]
    fn overrides_apply_last() {
        let dir = Utf8TempDir::new().unwrap();
        let config = PulseConfig::default_config(dir.path()).with_overrides(&ConfigOverrides {
            output_dir: Some("out".into()),
            output_file: Some("report.json".to_owned()),
            base64_images: Some(true),
            reset_each_run: None,
            results_format: None,
        })
        .unwrap();
        assert_eq!(config.report_path(), dir.path().join("out/report.json"));
        assert!(config.base64_images());
        assert!(config.reset_each_run());
    }

    #[test_case("../escaped.json" ; "parent directory")]
    #[test_case("nested/report.json" ; "subdirectory")]
    #[test_case("/tmp/report.json" ; "absolute")]
    #[test_case("" ; "empty")]
    fn output_file_override_must_be_a_file_name(output_file: &str) {
        let dir = Utf8TempDir::new().unwrap();
        let error = PulseConfig::default_config(dir.path())
            .with_overrides(&ConfigOverrides {
                output_file: Some(output_file.to_owned()),
                ..ConfigOverrides::default()
            })
            .unwrap_err();
        assert_eq!(error.key(), "report.output-file");
    }
}
