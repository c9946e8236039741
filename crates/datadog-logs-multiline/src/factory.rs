// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Codec factories.
//!
//! A factory validates a codec stanza once, when the pipeline is configured,
//! and then builds one codec per tailed file. Every configuration problem
//! surfaces here as a [`Creation`] error, so a misconfigured pipeline never
//! starts.
//!
//! ```rust
//! use datadog_logs_multiline::{Codec, CodecFactory, GeneralConfig};
//! use serde_json::json;
//!
//! let stanza = json!({"name": "multiline", "pattern": "^[[:space:]]"});
//! let factory = CodecFactory::from_stanza(
//!     &GeneralConfig::default(),
//!     stanza.as_object().unwrap(),
//! )
//! .unwrap();
//!
//! let codec = factory
//!     .new_codec(|start: i64, end: i64, text: String| println!("{start}-{end}: {text}"), 0)
//!     .unwrap();
//! codec.event(0, 9, "Exception");
//! codec.event(10, 20, "  at main");
//! let resume_from = codec.teardown();
//! # assert_eq!(resume_from, 0);
//! ```

use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::debug;

use crate::codec::{Codec, Deliver};
use crate::config::{GeneralConfig, Mode, MultilineConfig};
use crate::constants::{DEFAULT_PREVIOUS_TIMEOUT, MAX_PREVIOUS_TIMEOUT};
use crate::errors::Creation;
use crate::matcher::Matcher;
use crate::multiline::{MultilineCodec, MultilineSettings};
use crate::plain::PlainCodec;

/// Builds [`MultilineCodec`]s sharing one validated configuration.
#[derive(Clone, Debug)]
pub struct MultilineFactory {
    settings: Arc<MultilineSettings>,
    runtime: Option<Handle>,
}

impl MultilineFactory {
    /// Validates `config` against the pipeline limits in `general`.
    ///
    /// # Defaults
    ///
    /// - `what`: `previous`
    /// - `previous timeout`: [`DEFAULT_PREVIOUS_TIMEOUT`] in `previous` mode;
    ///   in `next` mode the timer only runs when a timeout is given
    /// - `max multiline bytes`: `general.spool_max_bytes`
    pub fn new(general: &GeneralConfig, config: MultilineConfig) -> Result<Self, Creation> {
        let pattern = config.pattern.ok_or(Creation::MissingPattern)?;
        let matcher = Matcher::new(&pattern, config.negate)?;

        match config.previous_timeout {
            Some(timeout) if timeout.is_zero() => return Err(Creation::NonPositiveTimeout),
            Some(timeout) if timeout > MAX_PREVIOUS_TIMEOUT => {
                return Err(Creation::TimeoutTooLarge {
                    timeout,
                    max: MAX_PREVIOUS_TIMEOUT,
                })
            }
            _ => {}
        }
        let timeout = match config.what {
            Mode::Previous => Some(config.previous_timeout.unwrap_or(DEFAULT_PREVIOUS_TIMEOUT)),
            Mode::Next => config.previous_timeout,
        };

        let max_bytes = match config.max_multiline_bytes {
            Some(max) if max <= 0 => return Err(Creation::NonPositiveMaxBytes(max)),
            Some(max) => max.unsigned_abs(),
            None => general.spool_max_bytes,
        };
        if max_bytes > general.spool_max_bytes {
            return Err(Creation::MaxBytesExceedsSpool {
                max_bytes,
                spool_max_bytes: general.spool_max_bytes,
            });
        }

        debug!(
            "Multiline codec configured: pattern={:?} what={} negate={} timeout={:?} max_bytes={}",
            matcher.pattern(),
            config.what,
            matcher.negate(),
            timeout,
            max_bytes
        );

        Ok(MultilineFactory {
            settings: Arc::new(MultilineSettings {
                matcher,
                mode: config.what,
                timeout,
                max_bytes: usize::try_from(max_bytes).unwrap_or(usize::MAX),
            }),
            runtime: None,
        })
    }

    pub fn from_options(
        general: &GeneralConfig,
        options: &Map<String, Value>,
    ) -> Result<Self, Creation> {
        Self::new(general, MultilineConfig::from_options(options)?)
    }

    /// Runs inactivity timers on `handle` instead of the runtime current at
    /// codec creation.
    #[must_use]
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Builds a codec delivering to `deliver`. `offset` is where reading of
    /// the file starts, and what teardown reports if nothing gets delivered.
    pub fn new_codec(
        &self,
        deliver: impl Deliver + 'static,
        offset: i64,
    ) -> Result<MultilineCodec, Creation> {
        MultilineCodec::new(
            Arc::clone(&self.settings),
            Box::new(deliver),
            offset,
            self.runtime.clone(),
        )
    }

    #[must_use]
    pub fn mode(&self) -> Mode {
        self.settings.mode
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.settings.timeout
    }

    #[must_use]
    pub fn max_bytes(&self) -> usize {
        self.settings.max_bytes
    }
}

/// Factory for any codec, selected by name.
#[derive(Clone, Debug)]
pub enum CodecFactory {
    Plain,
    Multiline(MultilineFactory),
}

impl CodecFactory {
    pub fn new(
        name: &str,
        general: &GeneralConfig,
        options: &Map<String, Value>,
    ) -> Result<Self, Creation> {
        match name {
            "plain" => match options.keys().next() {
                Some(key) => Err(Creation::InvalidOption(format!(
                    "plain codec takes no options, got {key:?}"
                ))),
                None => Ok(CodecFactory::Plain),
            },
            "multiline" => Ok(CodecFactory::Multiline(MultilineFactory::from_options(
                general, options,
            )?)),
            other => Err(Creation::UnknownCodec(other.to_string())),
        }
    }

    /// Builds a factory from a whole codec stanza, whose `name` key selects
    /// the codec (`plain` when absent).
    pub fn from_stanza(
        general: &GeneralConfig,
        stanza: &Map<String, Value>,
    ) -> Result<Self, Creation> {
        let mut options = stanza.clone();
        let name = match options.remove("name") {
            None => "plain".to_string(),
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(Creation::InvalidOption(format!(
                    "codec name must be a string, got {other}"
                )))
            }
        };
        Self::new(&name, general, &options)
    }

    pub fn new_codec(
        &self,
        deliver: impl Deliver + 'static,
        offset: i64,
    ) -> Result<Box<dyn Codec>, Creation> {
        match self {
            CodecFactory::Plain => Ok(Box::new(PlainCodec::new(Box::new(deliver), offset))),
            CodecFactory::Multiline(factory) => Ok(Box::new(factory.new_codec(deliver, offset)?)),
        }
    }
}
