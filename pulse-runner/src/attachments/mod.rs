// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Saving screenshots, videos, traces and other files produced by attempts.

mod content_type;
mod vault;

pub use content_type::{AttachmentKind, extension_for};
pub use vault::AttachmentVault;
