// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The codec interface between the file tailer and the shipper.
//!
//! The tailer feeds one [`Codec::event`] per physical line, in strictly
//! increasing offset order. The codec hands zero or more events to its
//! [`Deliver`] port for each line, and on shutdown reports the offset up to
//! which everything has been delivered so the tailer can resume from there.

/// Downstream port receiving decoded events.
///
/// A codec may call it from the ingesting thread or from its timer task, so
/// implementations must tolerate concurrent calls. A delivery runs inside the
/// codec's critical section. It must not call back into the same codec and
/// should return promptly.
pub trait Deliver: Send + Sync {
    fn deliver(&self, start_offset: i64, end_offset: i64, text: String);
}

impl<F> Deliver for F
where
    F: Fn(i64, i64, String) + Send + Sync,
{
    fn deliver(&self, start_offset: i64, end_offset: i64, text: String) {
        self(start_offset, end_offset, text);
    }
}

/// Point-in-time view of a codec, for status reporting.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CodecSnapshot {
    /// Lines held back waiting for the rest of their event.
    pub pending_lines: usize,
    /// Bytes held back, separators included.
    pub pending_bytes: usize,
    /// End offset of the last delivered content.
    pub last_offset: i64,
    /// Whether the codec has been torn down.
    pub drained: bool,
}

pub trait Codec: Send + Sync {
    /// Feeds one line. `text` holds no line terminator.
    fn event(&self, start_offset: i64, end_offset: i64, text: &str);

    /// Stops the codec and returns the resume offset.
    ///
    /// Content still buffered is not delivered. The caller is expected to
    /// re-read from the returned offset on restart. Calling it again returns
    /// the same offset.
    ///
    /// The offset is at most the end of the last delivered event, and equal
    /// to it whenever nothing is pending. After a size split the delivered
    /// head reports the end of the split line, but the offset stays at the
    /// end of the last whole line until the line's remainder is delivered
    /// too. A restart then reads the split line again rather than losing its
    /// tail.
    fn teardown(&self) -> i64;

    fn snapshot(&self) -> CodecSnapshot;
}
