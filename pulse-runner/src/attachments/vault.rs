// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::content_type::{AttachmentKind, extension_for};
use crate::{
    config::{ATTACHMENTS_DIR, PulseConfig},
    errors::{AttachmentError, DisplayErrorChain},
    helpers::{create_dir_all_async, sanitize_path_component},
    record::raw::RawAttachment,
};
use base64::Engine;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use pulse_metadata::{AttachmentRef, TestRunAttempt};
use std::io;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Persists the attachments of attempts under an output directory.
///
/// Each attempt gets its own subdirectory of `<output-dir>/attachments`. References recorded on
/// the attempt are relative to the output directory and always use `/` as the separator.
///
/// The vault holds no per-attempt state: attachments for different attempts can be saved
/// concurrently.
#[derive(Clone, Debug)]
pub struct AttachmentVault {
    output_dir: Utf8PathBuf,
    base64_images: bool,
}

impl AttachmentVault {
    /// Creates a vault rooted at `output_dir`.
    ///
    /// If `base64_images` is true, images are embedded into the attempt as `data:` URIs instead
    /// of being saved to disk.
    pub fn new(output_dir: impl Into<Utf8PathBuf>, base64_images: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            base64_images,
        }
    }

    /// Creates a vault from the output settings in `config`.
    pub fn from_config(config: &PulseConfig) -> Self {
        Self::new(config.output_dir(), config.base64_images())
    }

    /// Returns the name of the subdirectory an attempt's attachments are saved to.
    pub fn attempt_subdir(attempt_id: &str, retry: u32) -> String {
        sanitize_path_component(&format!("{attempt_id}-retry-{retry}"))
    }

    /// Saves `raw` and records references to the saved attachments on `attempt`.
    ///
    /// Attachments that cannot be saved are logged and skipped; this never fails.
    pub async fn attach(&self, attempt: &mut TestRunAttempt, raw: &[RawAttachment]) {
        if raw.is_empty() {
            return;
        }

        let subdir = Self::attempt_subdir(&attempt.id, attempt.retry);
        let timestamp = Utc::now().timestamp_millis();

        for (index, attachment) in raw.iter().enumerate() {
            let kind = AttachmentKind::classify(&attachment.name, &attachment.content_type);
            let result = if kind == AttachmentKind::Screenshot && self.base64_images {
                self.inline_image(attachment).await
            } else {
                let file_name = file_name(attachment, timestamp, index);
                self.save(attachment, &subdir, &file_name).await
            };

            let reference = match result {
                Ok(reference) => reference,
                Err(error) => {
                    warn!(
                        "skipping attachment `{}` of attempt `{}`: {}",
                        attachment.name,
                        attempt.id,
                        DisplayErrorChain::new(error),
                    );
                    continue;
                }
            };

            match kind {
                AttachmentKind::Screenshot => attempt.screenshots.push(reference),
                AttachmentKind::Video => attempt.videos.push(reference),
                AttachmentKind::Trace => {
                    if let Some(previous) = attempt.trace.replace(reference) {
                        debug!("attempt `{}` has several traces, dropping `{previous}`", attempt.id);
                    }
                }
                AttachmentKind::Other => attempt.attachments.push(AttachmentRef {
                    name: attachment.name.clone(),
                    path: reference,
                    content_type: attachment.content_type.clone(),
                }),
            }
        }
    }

    async fn inline_image(&self, attachment: &RawAttachment) -> Result<String, AttachmentError> {
        let data = match Source::of(attachment)? {
            Source::Body(body) => body.to_vec(),
            Source::Path(path) => tokio::fs::read(path)
                .await
                .map_err(|error| source_error(path, error))?,
        };

        let encoded = base64::engine::general_purpose::STANDARD.encode(data);
        Ok(format!("data:{};base64,{encoded}", attachment.content_type.trim()))
    }

    async fn save(
        &self,
        attachment: &RawAttachment,
        subdir: &str,
        file_name: &str,
    ) -> Result<String, AttachmentError> {
        // Open the source first so that a missing source leaves nothing behind.
        let mut contents = match Source::of(attachment)? {
            Source::Body(body) => Contents::Body(body),
            Source::Path(path) => Contents::File {
                path,
                file: tokio::fs::File::open(path)
                    .await
                    .map_err(|error| source_error(path, error))?,
            },
        };

        let dest_dir = self.output_dir.join(ATTACHMENTS_DIR).join(subdir);
        create_dir_all_async(&dest_dir)
            .await
            .map_err(AttachmentError::CreateDir)?;
        let (mut dest_file, file_name) = create_unique(&dest_dir, file_name)
            .await
            .map_err(|error| AttachmentError::Write {
                path: dest_dir.join(file_name),
                error,
            })?;
        let dest = dest_dir.join(&file_name);

        let mut written = match &mut contents {
            Contents::Body(body) => dest_file.write_all(*body).await,
            Contents::File { file, .. } => tokio::io::copy(file, &mut dest_file).await.map(|_| ()),
        };
        if written.is_ok() {
            written = dest_file.flush().await;
        }
        if let Err(error) = written {
            drop(dest_file);
            if let Err(remove_error) = tokio::fs::remove_file(&dest).await {
                debug!("failed to remove partial attachment `{dest}`: {remove_error}");
            }
            return Err(match contents {
                Contents::Body(_) => AttachmentError::Write { path: dest, error },
                Contents::File { path, .. } => AttachmentError::Copy {
                    from: path.to_owned(),
                    to: dest,
                    error,
                },
            });
        }

        Ok(format!("{ATTACHMENTS_DIR}/{subdir}/{file_name}"))
    }
}

/// Where an attachment's contents come from. An in-memory body wins over a path.
enum Source<'a> {
    Body(&'a [u8]),
    Path(&'a Utf8Path),
}

impl<'a> Source<'a> {
    fn of(attachment: &'a RawAttachment) -> Result<Self, AttachmentError> {
        match (&attachment.body, &attachment.path) {
            (Some(body), _) => Ok(Self::Body(body)),
            (None, Some(path)) => Ok(Self::Path(path)),
            (None, None) => Err(AttachmentError::NoContent {
                name: attachment.name.clone(),
            }),
        }
    }
}

/// A [`Source`] that is ready to be copied.
enum Contents<'a> {
    Body(&'a [u8]),
    File {
        path: &'a Utf8Path,
        file: tokio::fs::File,
    },
}

fn source_error(path: &Utf8Path, error: io::Error) -> AttachmentError {
    if error.kind() == io::ErrorKind::NotFound {
        AttachmentError::SourceMissing {
            path: path.to_owned(),
        }
    } else {
        AttachmentError::Read {
            path: path.to_owned(),
            error,
        }
    }
}

const MAX_NAME_CANDIDATES: usize = 100;

/// Creates `file_name` in `dir`, or `{stem}-{n}.{ext}` if that name is already taken.
///
/// Attempt identifiers that differ only in characters lost to sanitizing share a subdirectory,
/// so the name may already be held by another attempt's attachment.
async fn create_unique(
    dir: &Utf8Path,
    file_name: &str,
) -> io::Result<(tokio::fs::File, String)> {
    let (stem, ext) = match file_name.rsplit_once('.') {
        Some((stem, ext)) => (stem, Some(ext)),
        None => (file_name, None),
    };

    let mut candidate = file_name.to_owned();
    for n in 1..=MAX_NAME_CANDIDATES {
        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(dir.join(&candidate))
            .await;
        match opened {
            Ok(file) => return Ok((file, candidate)),
            Err(error) if error.kind() == io::ErrorKind::AlreadyExists => {
                candidate = match ext {
                    Some(ext) => format!("{stem}-{n}.{ext}"),
                    None => format!("{stem}-{n}"),
                };
            }
            Err(error) => return Err(error),
        }
    }

    Err(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("no free name for `{file_name}` after {MAX_NAME_CANDIDATES} tries"),
    ))
}

/// Returns `{stem}-{timestamp}-{index}.{ext}`.
///
/// The stem comes from the source file if there is one and from the logical name otherwise. The
/// index keeps names unique among attachments saved in the same call.
fn file_name(attachment: &RawAttachment, timestamp: i64, index: usize) -> String {
    let stem = attachment
        .path
        .as_deref()
        .and_then(Utf8Path::file_stem)
        .unwrap_or(attachment.name.as_str());
    let mut stem = sanitize_path_component(stem);
    if stem.is_empty() {
        stem.push_str("attachment");
    }
    let ext = extension_for(&attachment.content_type);
    format!("{stem}-{timestamp}-{index}.{ext}")
}
