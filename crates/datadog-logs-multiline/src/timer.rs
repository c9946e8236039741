// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Inactivity timer.
//!
//! The deadline itself is plain data ([`Deadline`]) that the owner keeps under
//! its own lock. A background task sleeps until that deadline and then asks
//! the owner to expire it. The owner re-checks the deadline under the lock, so
//! a wake-up that raced with a re-arm or a flush is harmless.
//!
//! The task runs on the caller's tokio runtime when there is one. Otherwise it
//! gets a dedicated thread driving a current-thread runtime.

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// A re-armable single-shot deadline.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Deadline(Option<Instant>);

impl Deadline {
    /// Moves the deadline to `timeout` from now.
    ///
    /// Returns `true` if the deadline was disarmed before, in which case the
    /// timer task has to be woken up to notice it.
    pub fn arm(&mut self, timeout: Duration) -> bool {
        let was_disarmed = self.0.is_none();
        self.0 = Some(Instant::now() + timeout);
        was_disarmed
    }

    pub fn disarm(&mut self) {
        self.0 = None;
    }

    pub fn get(&self) -> Option<Instant> {
        self.0
    }

    pub fn expired(&self, now: Instant) -> bool {
        self.0.is_some_and(|deadline| deadline <= now)
    }
}

/// Owner of a [`Deadline`] driven by an [`InactivityTimer`].
pub(crate) trait Expire: Send + Sync + 'static {
    /// The currently armed deadline.
    fn deadline(&self) -> Option<Instant>;

    /// Called when the deadline returned last has been reached. Implementations
    /// must re-check the deadline, it may have moved in the meantime.
    fn expire(&self);
}

/// Background task servicing one [`Deadline`].
///
/// Dropping the timer stops the task.
#[derive(Debug)]
pub(crate) struct InactivityTimer {
    wake: Arc<Notify>,
    cancel: CancellationToken,
}

impl InactivityTimer {
    pub fn start<T: Expire>(target: Arc<T>, runtime: Option<Handle>) -> std::io::Result<Self> {
        let wake = Arc::new(Notify::new());
        let cancel = CancellationToken::new();
        let task = run(target, Arc::clone(&wake), cancel.clone());

        match runtime.or_else(|| Handle::try_current().ok()) {
            Some(handle) => {
                handle.spawn(task);
            }
            None => {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()?;
                std::thread::Builder::new()
                    .name("multiline-timer".to_string())
                    .spawn(move || runtime.block_on(task))?;
            }
        }

        Ok(InactivityTimer { wake, cancel })
    }

    /// Tells the task a deadline was armed while it was idle.
    pub fn armed(&self) {
        self.wake.notify_one();
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

impl Drop for InactivityTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run<T: Expire>(target: Arc<T>, wake: Arc<Notify>, cancel: CancellationToken) {
    loop {
        let deadline = target.deadline();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = wake.notified() => continue,
            () = sleep_until(deadline) => target.expire(),
        }
    }
    debug!("Inactivity timer stopped");
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
