//! RFC 1123 timestamps, the date format Eve uses on the wire.
//!
//! The [`serde`] submodules can be used with `#[serde(with = "...")]` on
//! document fields holding `DateTime<Utc>` values.

use chrono::{DateTime, NaiveDateTime, Utc};

const FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Formats a timestamp as `Mon, 01 Jan 2024 00:00:00 GMT`.
pub fn format(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(FORMAT).to_string()
}

/// Parses an RFC 1123 timestamp. Sub-second precision is not representable.
pub fn parse(text: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(text.trim(), FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Serde adapters for RFC 1123 timestamps.
pub mod serde {
    use chrono::{DateTime, Utc};
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serializes a timestamp as an RFC 1123 string.
    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format(value))
    }

    /// Deserializes a timestamp from an RFC 1123 string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse(&text).ok_or_else(|| D::Error::custom(format!("invalid RFC 1123 date: {text}")))
    }

    /// Adapters for optional timestamps.
    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::de::Error as _;
        use serde::{Deserialize, Deserializer, Serializer};

        /// Serializes an optional timestamp; `None` becomes null.
        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(ts) => serializer.serialize_str(&super::super::format(ts)),
                None => serializer.serialize_none(),
            }
        }

        /// Deserializes an optional timestamp.
        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            match Option::<String>::deserialize(deserializer)? {
                Some(text) => super::super::parse(&text)
                    .map(Some)
                    .ok_or_else(|| D::Error::custom(format!("invalid RFC 1123 date: {text}"))),
                None => Ok(None),
            }
        }
    }
}
