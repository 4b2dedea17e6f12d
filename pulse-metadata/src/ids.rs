// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use newtype_uuid::{TypedUuid, TypedUuidKind, TypedUuidTag};

/// The kind tag for [`RunUuid`].
pub enum RunKind {}

impl TypedUuidKind for RunKind {
    fn tag() -> TypedUuidTag {
        const TAG: TypedUuidTag = TypedUuidTag::new("pulse_run");
        TAG
    }
}

/// A unique identifier for one reporting session.
pub type RunUuid = TypedUuid<RunKind>;

/// Returns the stable identifier for attempt `retry` of the logical test `test_id`.
///
/// The result has the form `{test_id}-{retry}`; [`logical_test_id`] inverts it.
pub fn attempt_id(test_id: &str, retry: u32) -> String {
    format!("{test_id}-{retry}")
}

/// Strips the retry suffix from an attempt identifier.
///
/// A suffix is a trailing `-` followed by one or more ASCII digits. Identifiers
/// without one are returned unchanged.
pub fn logical_test_id(attempt_id: &str) -> &str {
    match attempt_id.rsplit_once('-') {
        Some((test_id, retry))
            if !retry.is_empty() && retry.bytes().all(|b| b.is_ascii_digit()) =>
        {
            test_id
        }
        _ => attempt_id,
    }
}
