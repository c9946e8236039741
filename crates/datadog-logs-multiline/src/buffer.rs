// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pending multiline event and delivery watermark.
//!
//! The buffer accumulates the lines of one logical event as a single string,
//! already joined by `\n`, so its byte size is exactly what will be delivered.
//!
//! # Offsets
//!
//! - `start_offset`: first byte of the first buffered line, set only when the
//!   buffer goes from empty to non-empty
//! - `pending_end_offset`: end of the most recently appended line
//! - `last_flushed_end_offset`: watermark, the end of the last content handed
//!   downstream. It only moves forward and never covers buffered content.

use crate::constants::LINE_SEPARATOR;

/// A completed event taken out of the buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Flushed {
    pub start_offset: i64,
    pub end_offset: i64,
    pub text: String,
}

#[derive(Debug, Default)]
pub(crate) struct Buffer {
    /// Lines joined by [`LINE_SEPARATOR`].
    text: String,

    /// Number of lines (or line fragments) in `text`.
    lines: usize,

    start_offset: i64,

    pending_end_offset: i64,

    /// Resume point reported on teardown.
    last_flushed_end_offset: i64,
}

impl Buffer {
    /// Creates an empty buffer whose watermark starts at `offset`, the point
    /// the file is being read from.
    pub fn new(offset: i64) -> Self {
        Buffer {
            last_flushed_end_offset: offset,
            ..Buffer::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lines == 0
    }

    /// Buffered bytes, separators included.
    pub fn byte_size(&self) -> usize {
        self.text.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines
    }

    pub fn watermark(&self) -> i64 {
        self.last_flushed_end_offset
    }

    /// Appends a line without any ceiling check.
    pub fn push(&mut self, start_offset: i64, end_offset: i64, line: &str) {
        if self.is_empty() {
            self.start_offset = start_offset;
        } else {
            self.text.push(LINE_SEPARATOR);
        }
        self.text.push_str(line);
        self.lines += 1;
        self.pending_end_offset = end_offset;
    }

    /// Appends a line, never letting the joined text grow past `max_bytes`.
    ///
    /// When the line does not fit, as many of its bytes as fit (cut back to a
    /// character boundary) complete the current event, which is handed to
    /// `flush`, and the rest of the line opens the next event. Both parts carry
    /// the line's own offsets. If not even one character fits, the current
    /// event is flushed whole and the line opens the next one.
    ///
    /// Only the head of the line is split off: a remainder that is itself
    /// larger than `max_bytes` stays buffered as is.
    ///
    /// # Watermark
    ///
    /// A split flush advances the watermark only to the end of the last whole
    /// line it delivered, because the tail of the split line is still pending.
    pub fn push_bounded(
        &mut self,
        start_offset: i64,
        end_offset: i64,
        line: &str,
        max_bytes: usize,
        mut flush: impl FnMut(Flushed),
    ) {
        let separator = usize::from(!self.is_empty());
        let used = self.text.len() + separator;
        if used + line.len() <= max_bytes {
            self.push(start_offset, end_offset, line);
            return;
        }

        let cut = floor_char_boundary(line, max_bytes.saturating_sub(used));
        if cut == 0 {
            if let Some(flushed) = self.take() {
                flush(flushed);
                // The line now starts an empty buffer and may still need splitting.
                self.push_bounded(start_offset, end_offset, line, max_bytes, flush);
            } else {
                self.push(start_offset, end_offset, line);
            }
            return;
        }

        let whole_lines_end = (!self.is_empty()).then_some(self.pending_end_offset);
        let (head, tail) = line.split_at(cut);
        self.push(start_offset, end_offset, head);
        flush(self.take_split(whole_lines_end));
        self.push(start_offset, end_offset, tail);
    }

    /// Takes the buffered event and advances the watermark to its end.
    pub fn take(&mut self) -> Option<Flushed> {
        if self.is_empty() {
            return None;
        }
        let end_offset = self.pending_end_offset;
        let flushed = self.drain();
        self.advance(end_offset);
        Some(flushed)
    }

    /// Drops the buffered event, returning how many lines and bytes were lost.
    pub fn discard(&mut self) -> (usize, usize) {
        let dropped = (self.lines, self.text.len());
        self.drain();
        dropped
    }

    fn take_split(&mut self, whole_lines_end: Option<i64>) -> Flushed {
        let flushed = self.drain();
        if let Some(end_offset) = whole_lines_end {
            self.advance(end_offset);
        }
        flushed
    }

    fn drain(&mut self) -> Flushed {
        self.lines = 0;
        Flushed {
            start_offset: self.start_offset,
            end_offset: self.pending_end_offset,
            text: std::mem::take(&mut self.text),
        }
    }

    fn advance(&mut self, end_offset: i64) {
        self.last_flushed_end_offset = self.last_flushed_end_offset.max(end_offset);
    }
}

/// Largest index `<= index` that lies on a character boundary of `s`.
fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
