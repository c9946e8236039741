// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Default limits for the codecs.
//!
//! The multiline ceiling falls back to the spool limit of the surrounding
//! pipeline, so an aggregated event always fits in a single spool.

use std::time::Duration;

/// Maximum bytes the pipeline spools before shipping, 10MB.
///
/// Used as the default (and the upper bound) for `max multiline bytes`.
pub const DEFAULT_SPOOL_MAX_BYTES: u64 = 10 * 1_024 * 1_024;

/// How long a `previous` buffer waits for a continuation before it is
/// flushed anyway.
pub const DEFAULT_PREVIOUS_TIMEOUT: Duration = Duration::from_secs(5);

/// Longest accepted inactivity timeout, one day.
pub const MAX_PREVIOUS_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Separator placed between aggregated lines.
pub(crate) const LINE_SEPARATOR: char = '\n';
