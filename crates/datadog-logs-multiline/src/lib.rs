// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Line codecs for tailed log files.
//!
//! A codec sits between the file tailer, which produces one offset-tagged
//! line at a time, and the shipper. The [`plain`] codec forwards lines as
//! they are. The [`multiline`] codec joins stack traces and other wrapped
//! messages into single events, bounded in size and flushed after a period
//! of inactivity.

#![deny(clippy::all)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(unused_extern_crates)]

mod buffer;
pub mod codec;
pub mod config;
pub mod constants;
pub mod errors;
pub mod factory;
pub mod matcher;
pub mod multiline;
pub mod plain;
mod timer;

pub use codec::{Codec, CodecSnapshot, Deliver};
pub use config::{GeneralConfig, Mode, MultilineConfig};
pub use errors::Creation;
pub use factory::{CodecFactory, MultilineFactory};
pub use multiline::MultilineCodec;
pub use plain::PlainCodec;
