// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::time::Duration;

/// Errors raised while building a codec.
///
/// Every variant is a configuration problem: once a codec exists it has no
/// failure path, so nothing here is ever produced at runtime.
#[derive(Debug, thiserror::Error)]
pub enum Creation {
    #[error("multiline codec requires a pattern")]
    MissingPattern,

    #[error("failed to compile pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid codec option: {0}")]
    InvalidOption(String),

    #[error("previous timeout must be greater than zero")]
    NonPositiveTimeout,

    #[error("previous timeout ({timeout:?}) cannot be greater than {max:?}")]
    TimeoutTooLarge { timeout: Duration, max: Duration },

    #[error("max multiline bytes must be greater than zero, got {0}")]
    NonPositiveMaxBytes(i64),

    #[error("max multiline bytes ({max_bytes}) cannot be greater than spool max bytes ({spool_max_bytes})")]
    MaxBytesExceedsSpool {
        max_bytes: u64,
        spool_max_bytes: u64,
    },

    #[error("unknown codec: {0}")]
    UnknownCodec(String),

    #[error("failed to start inactivity timer: {0}")]
    Timer(#[from] std::io::Error),
}

impl From<serde_json::Error> for Creation {
    fn from(e: serde_json::Error) -> Self {
        Creation::InvalidOption(e.to_string())
    }
}
