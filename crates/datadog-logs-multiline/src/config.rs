// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Codec configuration.
//!
//! Codec options arrive as a loosely typed option map (the `codec` section of
//! a file stanza) and are deserialized once into [`MultilineConfig`]. Keys use
//! the spaced names of the stanza, with snake_case aliases:
//!
//! ```yaml
//! codec:
//!   name: multiline
//!   pattern: "^[[:space:]]"
//!   what: previous
//!   negate: false
//!   previous timeout: 5s
//!   max multiline bytes: 1048576
//! ```
//!
//! Unknown keys are rejected so that a typo fails the pipeline at startup
//! instead of silently falling back to a default.

use serde::{Deserialize, Deserializer};
use serde_aux::prelude::deserialize_bool_from_anything;
use serde_json::{Map, Value};
use std::fmt;
use std::time::Duration;

use crate::constants::DEFAULT_SPOOL_MAX_BYTES;
use crate::errors::Creation;

/// Which neighbour a continuation line attaches to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// A continuing line belongs to the event before it.
    #[default]
    Previous,
    /// A continuing line announces that the next line belongs to it.
    Next,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Previous => write!(f, "previous"),
            Mode::Next => write!(f, "next"),
        }
    }
}

/// Pipeline-wide settings a codec inherits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GeneralConfig {
    /// Upper bound for a single spool, and therefore for one aggregated event.
    pub spool_max_bytes: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        GeneralConfig {
            spool_max_bytes: DEFAULT_SPOOL_MAX_BYTES,
        }
    }
}

/// Raw multiline options as they appear in the configuration.
///
/// Nothing here is validated beyond its type; see
/// [`MultilineFactory::new`](crate::factory::MultilineFactory::new).
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MultilineConfig {
    /// Regular expression tested against every line.
    #[serde(default)]
    pub pattern: Option<String>,

    #[serde(default)]
    pub what: Mode,

    /// Invert the pattern: non-matching lines become the continuations.
    #[serde(default, deserialize_with = "deserialize_bool_from_anything")]
    pub negate: bool,

    /// Inactivity window after which a pending event is flushed.
    #[serde(
        default,
        rename = "previous timeout",
        alias = "previous_timeout",
        alias = "timeout",
        deserialize_with = "deserialize_optional_duration"
    )]
    pub previous_timeout: Option<Duration>,

    /// Ceiling on the size of one aggregated event, separators included.
    #[serde(
        default,
        rename = "max multiline bytes",
        alias = "max_multiline_bytes",
        alias = "max_bytes"
    )]
    pub max_multiline_bytes: Option<i64>,
}

impl MultilineConfig {
    /// Deserializes the options of a codec stanza.
    pub fn from_options(options: &Map<String, Value>) -> Result<Self, Creation> {
        Ok(serde_json::from_value(Value::Object(options.clone()))?)
    }
}

/// Accepts integer or float seconds, or a string carrying a unit suffix
/// (`ms`, `s`, `m`, `h`). A bare numeric string is read as seconds.
pub fn deserialize_optional_duration<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Duration>, D::Error> {
    struct DurationVisitor;
    impl<'de> serde::de::Visitor<'de> for DurationVisitor {
        type Value = Option<Duration>;
        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            write!(f, "a duration in seconds or a string such as \"3s\"")
        }
        fn visit_none<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_unit<E: serde::de::Error>(self) -> Result<Self::Value, E> {
            Ok(None)
        }
        fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Self::Value, D::Error> {
            d.deserialize_any(DurationVisitor)
        }
        fn visit_u64<E: serde::de::Error>(self, v: u64) -> Result<Self::Value, E> {
            Ok(Some(Duration::from_secs(v)))
        }
        fn visit_i64<E: serde::de::Error>(self, v: i64) -> Result<Self::Value, E> {
            u64::try_from(v)
                .map(|v| Some(Duration::from_secs(v)))
                .map_err(|_| E::custom("negative durations are not allowed"))
        }
        fn visit_f64<E: serde::de::Error>(self, v: f64) -> Result<Self::Value, E> {
            if !v.is_finite() || v < 0f64 {
                return Err(E::custom("negative durations are not allowed"));
            }
            Duration::try_from_secs_f64(v).map(Some).map_err(E::custom)
        }
        fn visit_str<E: serde::de::Error>(self, v: &str) -> Result<Self::Value, E> {
            parse_duration(v).map(Some).map_err(E::custom)
        }
    }
    deserializer.deserialize_any(DurationVisitor)
}

fn parse_duration(value: &str) -> Result<Duration, String> {
    let value = value.trim();
    let split = value
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);

    let number: f64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {value:?}"))?;
    let seconds = match unit.trim() {
        "ms" => number / 1_000f64,
        "" | "s" => number,
        "m" => number * 60f64,
        "h" => number * 3_600f64,
        other => return Err(format!("unknown duration unit {other:?} in {value:?}")),
    };

    Duration::try_from_secs_f64(seconds).map_err(|e| format!("invalid duration {value:?}: {e}"))
}
