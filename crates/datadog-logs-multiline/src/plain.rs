// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::warn;

use crate::codec::{Codec, CodecSnapshot, Deliver};

#[derive(Debug)]
struct State {
    last_offset: i64,
    drained: bool,
}

/// Forwards every line as its own event.
pub struct PlainCodec {
    state: Mutex<State>,
    deliver: Box<dyn Deliver>,
}

impl PlainCodec {
    pub fn new(deliver: Box<dyn Deliver>, offset: i64) -> Self {
        PlainCodec {
            state: Mutex::new(State {
                last_offset: offset,
                drained: false,
            }),
            deliver,
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Codec for PlainCodec {
    fn event(&self, start_offset: i64, end_offset: i64, text: &str) {
        let mut state = self.lock();
        if state.drained {
            warn!("Plain codec received a line after teardown, dropping it");
            return;
        }
        self.deliver.deliver(start_offset, end_offset, text.to_string());
        state.last_offset = state.last_offset.max(end_offset);
    }

    fn teardown(&self) -> i64 {
        let mut state = self.lock();
        state.drained = true;
        state.last_offset
    }

    fn snapshot(&self) -> CodecSnapshot {
        let state = self.lock();
        CodecSnapshot {
            pending_lines: 0,
            pending_bytes: 0,
            last_offset: state.last_offset,
            drained: state.drained,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;

    type Received = Arc<Mutex<Vec<(i64, i64, String)>>>;

    fn codec(offset: i64) -> (PlainCodec, Received) {
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let codec = PlainCodec::new(
            Box::new(move |start: i64, end: i64, text: String| {
                sink.lock().unwrap().push((start, end, text));
            }),
            offset,
        );
        (codec, received)
    }

    #[test]
    fn test_passes_lines_through() {
        let (codec, received) = codec(0);

        codec.event(0, 1, "DEBUG First line");
        codec.event(2, 3, "NEXT line");

        assert_eq!(
            *received.lock().unwrap(),
            vec![
                (0, 1, "DEBUG First line".to_string()),
                (2, 3, "NEXT line".to_string()),
            ]
        );
        assert_eq!(codec.snapshot().last_offset, 3);
        assert_eq!(codec.teardown(), 3);
    }

    #[test]
    fn test_teardown_without_lines_returns_resume_offset() {
        let (codec, _) = codec(42);
        assert_eq!(codec.teardown(), 42);
    }

    #[test]
    fn test_event_after_teardown_ignored() {
        let (codec, received) = codec(0);
        codec.event(0, 1, "a");
        assert_eq!(codec.teardown(), 1);

        codec.event(2, 3, "b");

        assert_eq!(received.lock().unwrap().len(), 1);
        assert!(codec.snapshot().drained);
        assert_eq!(codec.teardown(), 1);
    }
}
