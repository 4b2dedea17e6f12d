// Copyright (c) The pulse Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Serde codecs shared by every on-disk artifact.
//!
//! Reports and shard files are read by tooling that parses JSON numbers as
//! IEEE 754 doubles, and that recovers dates by matching ISO-8601 strings. The
//! codecs here keep both of those readers lossless.

/// Serializes a `DateTime<Utc>` as an RFC 3339 string with millisecond precision.
///
/// Deserialization accepts any RFC 3339 timestamp, including ones with a
/// non-UTC offset, and normalizes it to UTC.
pub mod iso8601 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// Formats a timestamp the way it appears on disk.
    pub fn format(timestamp: &DateTime<Utc>) -> String {
        timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Parses an on-disk timestamp.
    pub fn parse(input: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
        DateTime::parse_from_rfc3339(input).map(|dt| dt.with_timezone(&Utc))
    }

    /// Serializer entry point for `#[serde(with = "iso8601")]`.
    pub fn serialize<S>(timestamp: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format(timestamp))
    }

    /// Deserializer entry point for `#[serde(with = "iso8601")]`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let input = String::deserialize(deserializer)?;
        parse(&input).map_err(|error| {
            de::Error::custom(format_args!("invalid ISO-8601 timestamp `{input}`: {error}"))
        })
    }
}

/// Serializes a `u64` as a JSON number when it is exactly representable as a
/// double, and as a decimal string otherwise.
pub mod safe_u64 {
    use serde::{Deserialize, Deserializer, Serializer, de};

    /// The largest integer that survives a round trip through an IEEE 754 double.
    pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

    /// Serializer entry point for `#[serde(with = "safe_u64")]`.
    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if *value <= MAX_SAFE_INTEGER {
            serializer.serialize_u64(*value)
        } else {
            serializer.collect_str(value)
        }
    }

    /// Deserializer entry point for `#[serde(with = "safe_u64")]`.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum NumberOrString {
            Number(u64),
            String(String),
        }

        match NumberOrString::deserialize(deserializer)? {
            NumberOrString::Number(value) => Ok(value),
            NumberOrString::String(value) => value.parse().map_err(|error| {
                de::Error::custom(format_args!("invalid integer string `{value}`: {error}"))
            }),
        }
    }
}
