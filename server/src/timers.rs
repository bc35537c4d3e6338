//! Deferred session events
//!
//! Every timer is identified by a `TimerKey` that captures the session epoch
//! and the round (or disconnect serial) it was scheduled for. The coordinator
//! re-checks the key against live state when it fires, so cancelling here is
//! an optimisation: a timer that slips through is still a no-op.

use log::debug;
use shared::ClientId;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Pre-game countdown; the first question follows
    Countdown,
    QuestionTimeout { round: usize },
    /// Pause between grading a round and showing the next question
    GradingPause { round: usize },
    /// Hard cap on the length of a running game
    SessionTimeout,
    /// Removal of a disconnected player
    Grace { connection_id: ClientId, serial: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub epoch: u64,
    pub kind: TimerKind,
}

impl TimerKey {
    pub fn new(epoch: u64, kind: TimerKind) -> Self {
        Self { epoch, kind }
    }
}

/// Pending timers backed by tokio tasks.
///
/// A fired timer is reported by sending `wrap(key)` on the channel given at
/// scheduling time.
#[derive(Debug, Default)]
pub struct TimerSet {
    tasks: HashMap<TimerKey, JoinHandle<()>>,
}

impl TimerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a timer; an existing timer with the same key is replaced
    pub fn schedule<T>(
        &mut self,
        key: TimerKey,
        after: Duration,
        tx: mpsc::UnboundedSender<T>,
        wrap: fn(TimerKey) -> T,
    ) where
        T: Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(wrap(key));
        });

        if let Some(previous) = self.tasks.insert(key, handle) {
            previous.abort();
        }
        debug!("Scheduled {:?} in {:?}", key, after);
    }

    /// Aborts a pending timer. Returns false if it was unknown or already fired.
    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        match self.tasks.remove(key) {
            Some(handle) => {
                handle.abort();
                debug!("Cancelled {:?}", key);
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (_, handle) in self.tasks.drain() {
            handle.abort();
        }
    }

    /// Forgets a timer whose firing has been received
    pub fn complete(&mut self, key: &TimerKey) {
        self.tasks.remove(key);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
