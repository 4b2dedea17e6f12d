// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    config::PulseConfig,
    errors::{DisplayErrorChain, ShardWriteError},
    helpers::{create_dir_all_async, plural},
};
use camino::{Utf8Path, Utf8PathBuf};
use pulse_metadata::TestRunAttempt;
use std::io;
use tracing::{debug, info, warn};

/// Reads and writes the per-shard files of a partitioned run.
///
/// Each worker writes all of its attempts to `<dir>/<prefix><index>.json` once, at the end of
/// its run. The coordinator then reads every file back, merges them and deletes them.
#[derive(Clone, Debug)]
pub struct ShardStore {
    dir: Utf8PathBuf,
    prefix: String,
}

impl ShardStore {
    /// Creates a store for shard files named `<prefix><index>.json` in `dir`.
    pub fn new(dir: impl Into<Utf8PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Creates a store in the output directory of `config`.
    pub fn from_config(config: &PulseConfig) -> Self {
        Self::new(config.output_dir(), config.shard_file_prefix())
    }

    /// Returns the directory shard files live in.
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the path of the file for the zero-based shard `index`.
    pub fn shard_path(&self, index: u32) -> Utf8PathBuf {
        self.dir.join(format!("{}{index}.json", self.prefix))
    }

    /// Writes `attempts` as the file for shard `index`, replacing any existing file.
    ///
    /// The file is written next to its destination and renamed into place, so a reader never
    /// sees a partial shard.
    pub async fn write_shard(
        &self,
        index: u32,
        attempts: &[TestRunAttempt],
    ) -> Result<Utf8PathBuf, ShardWriteError> {
        create_dir_all_async(&self.dir).await?;

        let path = self.shard_path(index);
        let contents =
            serde_json::to_vec(attempts).map_err(|error| ShardWriteError::Serialize {
                path: path.clone(),
                error,
            })?;

        let tmp_path = Utf8PathBuf::from(format!("{path}.tmp"));
        let write = async {
            tokio::fs::write(&tmp_path, &contents).await?;
            tokio::fs::rename(&tmp_path, &path).await
        };
        if let Err(error) = write.await {
            // Best effort: don't leave the temporary file behind.
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ShardWriteError::Write { path, error });
        }

        debug!(
            "wrote {} {} to shard file `{path}`",
            attempts.len(),
            plural::attempts_str(attempts.len()),
        );
        Ok(path)
    }

    /// Reads the files for shards `0..total` and concatenates their attempts in shard order.
    ///
    /// A missing file is expected (a shard may have run no tests) and is only logged. A file
    /// that can't be read or parsed is logged and dropped.
    pub async fn read_all_shards(&self, total: u32) -> ShardMerge {
        let mut merge = ShardMerge::default();

        for index in 0..total {
            let path = self.shard_path(index);
            let contents = match tokio::fs::read(&path).await {
                Ok(contents) => contents,
                Err(error) if error.kind() == io::ErrorKind::NotFound => {
                    warn!("shard file `{path}` not found, assuming shard {index} ran no tests");
                    merge.missing.push(index);
                    continue;
                }
                Err(error) => {
                    warn!("failed to read shard file `{path}`, skipping it: {error}");
                    merge.malformed.push(index);
                    continue;
                }
            };

            match serde_json::from_slice::<Vec<TestRunAttempt>>(&contents) {
                Ok(attempts) => {
                    debug!(
                        "read {} {} from shard file `{path}`",
                        attempts.len(),
                        plural::attempts_str(attempts.len()),
                    );
                    merge.attempts.extend(attempts);
                }
                Err(error) => {
                    warn!("failed to parse shard file `{path}`, skipping it: {error}");
                    merge.malformed.push(index);
                }
            }
        }

        merge
    }

    /// Deletes the files for shards `0..total`, returning the number of files deleted.
    ///
    /// Failures are logged and otherwise ignored.
    pub async fn cleanup(&self, total: u32) -> usize {
        let mut deleted = 0;
        for index in 0..total {
            if remove_logged(&self.shard_path(index)).await {
                deleted += 1;
            }
        }
        deleted
    }

    /// Deletes every shard file, including temporary ones, left behind by an earlier run.
    ///
    /// Returns the number of files deleted. Failures are logged and otherwise ignored.
    pub async fn sweep_stale(&self) -> usize {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(error) if error.kind() == io::ErrorKind::NotFound => return 0,
            Err(error) => {
                warn!("failed to list `{}` for stale shard files: {error}", self.dir);
                return 0;
            }
        };

        let mut deleted = 0;
        loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(error) => {
                    warn!("failed to list `{}` for stale shard files: {error}", self.dir);
                    break;
                }
            };
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if self.is_shard_file_name(file_name) && remove_logged(&self.dir.join(file_name)).await
            {
                deleted += 1;
            }
        }

        if deleted > 0 {
            info!(
                "removed {deleted} stale shard {} from `{}`",
                plural::files_str(deleted),
                self.dir,
            );
        }
        deleted
    }

    fn is_shard_file_name(&self, file_name: &str) -> bool {
        let Some(rest) = file_name.strip_prefix(self.prefix.as_str()) else {
            return false;
        };
        let index = rest
            .strip_suffix(".json.tmp")
            .or_else(|| rest.strip_suffix(".json"));
        index.is_some_and(|index| !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// The result of [`ShardStore::read_all_shards`].
#[derive(Clone, Debug, Default)]
pub struct ShardMerge {
    /// The attempts from every readable shard, in shard order.
    pub attempts: Vec<TestRunAttempt>,
    /// The shard indexes with no file.
    pub missing: Vec<u32>,
    /// The shard indexes whose file couldn't be read or parsed.
    pub malformed: Vec<u32>,
}

impl ShardMerge {
    /// Returns true if every shard file was read.
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty() && self.malformed.is_empty()
    }
}

async fn remove_logged(path: &Utf8Path) -> bool {
    match tokio::fs::remove_file(path).await {
        Ok(()) => true,
        Err(error) if error.kind() == io::ErrorKind::NotFound => false,
        Err(error) => {
            warn!(
                "failed to remove shard file `{path}`: {}",
                DisplayErrorChain::new(error)
            );
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::make_attempt;
    use camino_tempfile::Utf8TempDir;
    use pretty_assertions::assert_eq;
    use pulse_metadata::TestStatus;

    fn store(dir: &Utf8TempDir) -> ShardStore {
        ShardStore::new(dir.path().join("out"), ".pulse-shard-")
    }

    #[test]
    fn shard_paths() {
        let store = ShardStore::new("out", ".pulse-shard-");
        assert_eq!(store.shard_path(0), Utf8PathBuf::from("out/.pulse-shard-0.json"));
        assert_eq!(store.shard_path(11), Utf8PathBuf::from("out/.pulse-shard-11.json"));
    }

    #[tokio::test]
    async fn writes_and_reads_in_shard_order() {
        let dir = Utf8TempDir::new().unwrap();
        let store = store(&dir);

        let shard0 = vec![make_attempt("a", 0, TestStatus::Passed, 0, 10)];
        let shard1 = vec![
            make_attempt("b", 0, TestStatus::Failed, 5, 10),
            make_attempt("b", 1, TestStatus::Flaky, 20, 10),
        ];
        // Write out of order; reads still follow shard indexes.
        store.write_shard(1, &shard1).await.unwrap();
        store.write_shard(0, &shard0).await.unwrap();

        let merge = store.read_all_shards(2).await;
        assert!(merge.is_complete());
        let ids: Vec<_> = merge.attempts.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, ["a-0", "b-0", "b-1"]);
        assert_eq!(merge.attempts[1], shard1[0]);
    }

    #[tokio::test]
    async fn missing_and_malformed_shards_are_tolerated() {
        let dir = Utf8TempDir::new().unwrap();
        let store = store(&dir);

        store
            .write_shard(0, &[make_attempt("a", 0, TestStatus::Passed, 0, 10)])
            .await
            .unwrap();
        store
            .write_shard(1, &[make_attempt("b", 0, TestStatus::Passed, 0, 10)])
            .await
            .unwrap();
        std::fs::write(store.shard_path(3), "[{\"id\": ").unwrap();

        let merge = store.read_all_shards(4).await;
        assert_eq!(merge.attempts.len(), 2);
        assert_eq!(merge.missing, [2]);
        assert_eq!(merge.malformed, [3]);
        assert!(!merge.is_complete());
    }

    #[tokio::test]
    async fn cleanup_removes_shard_files() {
        let dir = Utf8TempDir::new().unwrap();
        let store = store(&dir);
        store.write_shard(0, &[]).await.unwrap();
        store.write_shard(2, &[]).await.unwrap();

        assert_eq!(store.cleanup(3).await, 2);
        assert!(!store.shard_path(0).exists());
        assert!(!store.shard_path(2).exists());
        // Nothing left to delete.
        assert_eq!(store.cleanup(3).await, 0);
    }

    #[tokio::test]
    async fn sweep_removes_only_shard_files() {
        let dir = Utf8TempDir::new().unwrap();
        let store = store(&dir);
        let out = store.dir().to_owned();
        std::fs::create_dir_all(&out).unwrap();
        for name in [
            ".pulse-shard-0.json",
            ".pulse-shard-7.json",
            ".pulse-shard-1.json.tmp",
            ".pulse-shard-notes.json",
            "playwright-pulse-report.json",
        ] {
            std::fs::write(out.join(name), "[]").unwrap();
        }

        assert_eq!(store.sweep_stale().await, 3);
        let mut remaining: Vec<_> = std::fs::read_dir(&out)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        remaining.sort();
        assert_eq!(
            remaining,
            [".pulse-shard-notes.json", "playwright-pulse-report.json"]
        );
    }

    #[tokio::test]
    async fn sweep_without_output_dir() {
        let dir = Utf8TempDir::new().unwrap();
        assert_eq!(store(&dir).sweep_stale().await, 0);
    }
}
