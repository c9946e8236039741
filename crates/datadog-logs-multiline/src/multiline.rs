// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Multiline aggregation engine.
//!
//! Groups consecutive physical lines into one logical event (a stack trace, a
//! wrapped message) before shipping.
//!
//! # Modes
//!
//! - **previous**: a continuing line is appended to the event before it. A
//!   line that does not continue flushes the pending event and starts a new
//!   one. Since the end of an event is only known once the next one begins, an
//!   inactivity timer flushes the pending event when no line arrives in time.
//! - **next**: every line is appended. A line that does not continue closes
//!   the event, itself included, which is flushed immediately.
//!
//! A line "continues" when it matches the pattern, or, with `negate`, when it
//! does not. See [`Matcher`].
//!
//! # Concurrency
//!
//! Two paths drive the engine: [`Codec::event`] on the tailer's thread and
//! the inactivity timer task. Both take the same mutex for the whole
//! transition, and deliveries run inside it, so events are delivered in file
//! order whichever path flushes them.
//!
//! ```text
//!   tailer ── event() ──┐
//!                       ├──> Mutex<State> ──> Deliver
//!   timer task ─ expire()┘
//! ```
//!
//! # Offsets
//!
//! [`Codec::teardown`] returns the end offset of the last content delivered.
//! Lines still pending are not part of it and are read again after a restart.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::buffer::{Buffer, Flushed};
use crate::codec::{Codec, CodecSnapshot, Deliver};
use crate::config::Mode;
use crate::errors::Creation;
use crate::matcher::Matcher;
use crate::timer::{Deadline, Expire, InactivityTimer};

/// Validated settings shared by every codec built from one factory.
#[derive(Debug)]
pub(crate) struct MultilineSettings {
    pub matcher: Matcher,
    pub mode: Mode,
    /// Inactivity window. `None` disables the timer.
    pub timeout: Option<Duration>,
    pub max_bytes: usize,
}

#[derive(Debug)]
struct State {
    buffer: Buffer,
    deadline: Deadline,
    drained: bool,
}

struct Shared {
    state: Mutex<State>,
    settings: Arc<MultilineSettings>,
    deliver: Box<dyn Deliver>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        // Every transition leaves the state consistent before delivering, so
        // a panicking deliverer does not corrupt it.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn deliver(&self, flushed: Flushed) {
        self.deliver
            .deliver(flushed.start_offset, flushed.end_offset, flushed.text);
    }

    fn flush(&self, state: &mut State) {
        state.deadline.disarm();
        if let Some(flushed) = state.buffer.take() {
            self.deliver(flushed);
        }
    }
}

impl Expire for Shared {
    fn deadline(&self) -> Option<Instant> {
        self.lock().deadline.get()
    }

    fn expire(&self) {
        let mut state = self.lock();
        // Re-armed by a newer line, flushed by a terminating line, or torn down.
        if state.drained || !state.deadline.expired(Instant::now()) {
            return;
        }
        debug!(
            "Multiline event idle for {:?}, flushing {} lines",
            self.settings.timeout.unwrap_or_default(),
            state.buffer.line_count()
        );
        self.flush(&mut state);
    }
}

/// Codec aggregating lines into multiline events.
///
/// Built by [`MultilineFactory::new_codec`](crate::factory::MultilineFactory::new_codec).
pub struct MultilineCodec {
    shared: Arc<Shared>,
    timer: Option<InactivityTimer>,
}

impl MultilineCodec {
    pub(crate) fn new(
        settings: Arc<MultilineSettings>,
        deliver: Box<dyn Deliver>,
        offset: i64,
        runtime: Option<Handle>,
    ) -> Result<Self, Creation> {
        let with_timer = settings.timeout.is_some();
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                buffer: Buffer::new(offset),
                deadline: Deadline::default(),
                drained: false,
            }),
            settings,
            deliver,
        });

        let timer = if with_timer {
            Some(InactivityTimer::start(Arc::clone(&shared), runtime)?)
        } else {
            None
        };

        Ok(MultilineCodec { shared, timer })
    }

    fn arm(&self, state: &mut State) {
        if let (Some(timeout), Some(timer)) = (self.shared.settings.timeout, &self.timer) {
            if state.deadline.arm(timeout) {
                timer.armed();
            }
        }
    }
}

impl Codec for MultilineCodec {
    fn event(&self, start_offset: i64, end_offset: i64, text: &str) {
        let shared = &*self.shared;
        let settings = &*shared.settings;
        let mut state = shared.lock();

        if state.drained {
            warn!("Multiline codec received a line after teardown, dropping it");
            return;
        }

        let continues = settings.matcher.continues(text);
        if settings.mode == Mode::Previous && !continues {
            shared.flush(&mut state);
        }

        state
            .buffer
            .push_bounded(start_offset, end_offset, text, settings.max_bytes, |flushed| {
                debug!(
                    "Multiline event reached {} bytes, flushing {} bytes early",
                    settings.max_bytes,
                    flushed.text.len()
                );
                shared.deliver(flushed);
            });

        if settings.mode == Mode::Next && !continues {
            shared.flush(&mut state);
        } else {
            self.arm(&mut state);
        }
    }

    fn teardown(&self) -> i64 {
        let mut state = self.shared.lock();
        if let Some(timer) = &self.timer {
            timer.stop();
        }
        state.deadline.disarm();

        if !state.drained {
            state.drained = true;
            let (lines, bytes) = state.buffer.discard();
            if lines > 0 {
                debug!(
                    "Multiline codec torn down with {} pending lines ({} bytes), resuming from offset {}",
                    lines,
                    bytes,
                    state.buffer.watermark()
                );
            }
        }

        state.buffer.watermark()
    }

    fn snapshot(&self) -> CodecSnapshot {
        let state = self.shared.lock();
        CodecSnapshot {
            pending_lines: state.buffer.line_count(),
            pending_bytes: state.buffer.byte_size(),
            last_offset: state.buffer.watermark(),
            drained: state.drained,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    type Received = Arc<Mutex<Vec<(i64, i64, String)>>>;

    fn codec(
        pattern: &str,
        negate: bool,
        mode: Mode,
        timeout: Option<Duration>,
        max_bytes: usize,
    ) -> (MultilineCodec, Received) {
        let settings = Arc::new(MultilineSettings {
            matcher: Matcher::new(pattern, negate).unwrap(),
            mode,
            timeout,
            max_bytes,
        });
        let received: Received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let codec = MultilineCodec::new(
            settings,
            Box::new(move |start: i64, end: i64, text: String| {
                sink.lock().unwrap().push((start, end, text));
            }),
            0,
            None,
        )
        .unwrap();
        (codec, received)
    }

    fn send_sample(codec: &MultilineCodec) {
        codec.event(0, 1, "DEBUG First line");
        codec.event(2, 3, "NEXT line");
        codec.event(4, 5, "ANOTHER line");
        codec.event(6, 7, "DEBUG Next line");
    }

    fn first_event() -> (i64, i64, String) {
        (0, 5, "DEBUG First line\nNEXT line\nANOTHER line".to_string())
    }

    #[test]
    fn test_previous() {
        let (codec, received) = codec("^(ANOTHER|NEXT) ", false, Mode::Previous, None, 1024);

        send_sample(&codec);

        assert_eq!(*received.lock().unwrap(), vec![first_event()]);
        assert_eq!(
            codec.snapshot(),
            CodecSnapshot {
                pending_lines: 1,
                pending_bytes: "DEBUG Next line".len(),
                last_offset: 5,
                drained: false,
            }
        );
        assert_eq!(codec.teardown(), 5);
    }

    #[test]
    fn test_next() {
        let (codec, received) = codec("^(DEBUG|NEXT) ", false, Mode::Next, None, 1024);

        send_sample(&codec);

        assert_eq!(*received.lock().unwrap(), vec![first_event()]);
        assert_eq!(codec.teardown(), 5);
    }

    #[test]
    fn test_next_single_terminating_line() {
        let (codec, received) = codec("\\\\$", false, Mode::Next, None, 1024);

        codec.event(0, 9, "plain line");

        assert_eq!(
            *received.lock().unwrap(),
            vec![(0, 9, "plain line".to_string())]
        );
        assert_eq!(codec.snapshot().pending_lines, 0);
        assert_eq!(codec.teardown(), 9);
    }

    #[test]
    fn test_previous_first_line_continuing_starts_event() {
        let (codec, received) = codec("^ ", false, Mode::Previous, None, 1024);

        codec.event(0, 9, "  at frame");
        codec.event(10, 19, "Exception");

        assert_eq!(
            *received.lock().unwrap(),
            vec![(0, 9, "  at frame".to_string())]
        );
    }

    #[test]
    #[traced_test]
    fn test_max_bytes_split() {
        let (codec, received) = codec("^DEBUG ", true, Mode::Previous, None, 32);

        codec.event(0, 1, "DEBUG First line");
        codec.event(2, 3, "second line");
        codec.event(4, 5, "third line");

        assert_eq!(
            *received.lock().unwrap(),
            vec![(0, 5, "DEBUG First line\nsecond line\nthi".to_string())]
        );
        // "rd line" is still pending.
        assert_eq!(codec.snapshot().last_offset, 3);
        assert!(logs_contain("Multiline event reached 32 bytes"));

        codec.event(6, 7, "DEBUG Next line");

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[1], (4, 5, "rd line".to_string()));
        assert_eq!(codec.teardown(), 5);
    }

    #[test]
    fn test_max_bytes_next_mode_flushes_remainder() {
        let (codec, received) = codec("^x", false, Mode::Next, None, 8);

        codec.event(0, 5, "xaaaa");
        codec.event(6, 15, "bbbbbbbbb");

        let texts: Vec<String> = received.lock().unwrap().iter().map(|r| r.2.clone()).collect();
        assert_eq!(texts, vec!["xaaaa\nbb".to_string(), "bbbbbbb".to_string()]);
        assert_eq!(codec.teardown(), 15);
    }

    #[test]
    #[traced_test]
    fn test_teardown_discards_pending() {
        let (codec, received) = codec("^ ", false, Mode::Previous, None, 1024);

        codec.event(0, 9, "Exception");
        codec.event(10, 19, "  at frame");

        assert_eq!(codec.teardown(), 0);
        assert!(received.lock().unwrap().is_empty());
        assert!(logs_contain("torn down with 2 pending lines"));

        let snapshot = codec.snapshot();
        assert!(snapshot.drained);
        assert_eq!(snapshot.pending_lines, 0);
    }

    #[test]
    #[traced_test]
    fn test_event_after_teardown_ignored() {
        let (codec, received) = codec("^ ", false, Mode::Next, None, 1024);

        assert_eq!(codec.teardown(), 0);
        codec.event(0, 9, "too late");

        assert!(received.lock().unwrap().is_empty());
        assert!(logs_contain("after teardown"));
        assert_eq!(codec.teardown(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_previous_timeout_flushes() {
        let (codec, received) = codec(
            "^(ANOTHER|NEXT) ",
            false,
            Mode::Previous,
            Some(Duration::from_secs(3)),
            1024,
        );

        send_sample(&codec);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(received.lock().unwrap().len(), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            received.lock().unwrap().last(),
            Some(&(6, 7, "DEBUG Next line".to_string()))
        );
        assert_eq!(codec.snapshot().pending_lines, 0);
        assert_eq!(codec.teardown(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_continuations_postpone_timeout() {
        let (codec, received) =
            codec("^ ", false, Mode::Previous, Some(Duration::from_secs(3)), 1024);

        codec.event(0, 9, "Exception");
        for i in 1..=4 {
            tokio::time::sleep(Duration::from_secs(2)).await;
            codec.event(i * 10, i * 10 + 9, "  at frame");
        }
        assert!(received.lock().unwrap().is_empty());

        tokio::time::sleep(Duration::from_secs(4)).await;
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!((received[0].0, received[0].1), (0, 49));
        assert_eq!(received[0].2.lines().count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_teardown_stops_timer() {
        let (codec, received) =
            codec("^ ", false, Mode::Previous, Some(Duration::from_secs(3)), 1024);

        codec.event(0, 9, "Exception");
        assert_eq!(codec.teardown(), 0);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(received.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_mode_timeout_when_configured() {
        let (codec, received) = codec("\\\\$", false, Mode::Next, Some(Duration::from_secs(2)), 1024);

        codec.event(0, 9, "wrapped \\");

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(
            *received.lock().unwrap(),
            vec![(0, 9, "wrapped \\".to_string())]
        );
        assert_eq!(codec.teardown(), 9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timer_after_line_flush_is_noop() {
        let (codec, received) = codec("\\\\$", false, Mode::Next, Some(Duration::from_secs(2)), 1024);

        codec.event(0, 9, "wrapped \\");
        codec.event(10, 19, "end");

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(
            *received.lock().unwrap(),
            vec![(0, 19, "wrapped \\\nend".to_string())]
        );
    }
}
