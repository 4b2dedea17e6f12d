// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Extensions for common attachment MIME types.
static EXTENSIONS: &[(&str, &str)] = &[
    ("application/json", "json"),
    ("application/pdf", "pdf"),
    ("application/xml", "xml"),
    ("application/zip", "zip"),
    ("image/gif", "gif"),
    ("image/jpeg", "jpg"),
    ("image/png", "png"),
    ("image/svg+xml", "svg"),
    ("image/webp", "webp"),
    ("text/csv", "csv"),
    ("text/html", "html"),
    ("text/markdown", "md"),
    ("text/plain", "txt"),
    ("video/mp4", "mp4"),
    ("video/quicktime", "mov"),
    ("video/webm", "webm"),
];

/// The kind of an attachment, which decides where its reference goes in an attempt.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AttachmentKind {
    /// An image, recorded in `screenshots`.
    Screenshot,
    /// A video recording, recorded in `videos`.
    Video,
    /// A trace archive, recorded as the attempt's `trace`.
    Trace,
    /// Anything else, recorded in `attachments`.
    Other,
}

impl AttachmentKind {
    /// Classifies an attachment by its content type, falling back to its logical name.
    pub fn classify(name: &str, content_type: &str) -> Self {
        let essence = essence(content_type);
        if essence.starts_with("image/") {
            Self::Screenshot
        } else if essence.starts_with("video/") || name == "video" {
            Self::Video
        } else if essence == "application/zip" || name == "trace" {
            Self::Trace
        } else {
            Self::Other
        }
    }
}

/// Returns the file extension (without the dot) to use for `content_type`.
///
/// Unknown types use the MIME subtype if it is usable as an extension, and `bin` otherwise.
pub fn extension_for(content_type: &str) -> String {
    let essence = essence(content_type);
    if let Some((_, ext)) = EXTENSIONS.iter().find(|(mime, _)| *mime == essence) {
        return (*ext).to_owned();
    }

    match essence.split_once('/') {
        Some((_, subtype))
            if !subtype.is_empty()
                && subtype
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') =>
        {
            subtype.to_owned()
        }
        _ => "bin".to_owned(),
    }
}

/// Strips parameters such as `; charset=utf-8` and normalizes case.
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}
