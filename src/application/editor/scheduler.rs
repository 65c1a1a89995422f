//! Trailing-edge debounce for background commits.

use std::time::Duration;

use tokio::{
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
    task::JoinHandle,
    time::sleep,
};

/// Token emitted when the quiet period elapses. Tokens carry the generation
/// of the timer that produced them so expiries from superseded timers can be
/// told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitDue {
    generation: u64,
}

/// Owns the single autosave timer of an editing session.
///
/// Re-arming cancels the previous timer, so a burst of edits yields exactly
/// one expiry once input has been quiet for the full period. Expiries arrive
/// on the receiver returned by [`CommitScheduler::new`]; the holder drains it
/// and asks [`CommitScheduler::accepts`] whether a token is still current
/// before acting on it.
#[derive(Debug)]
pub struct CommitScheduler {
    quiet_period: Duration,
    generation: u64,
    timer: Option<JoinHandle<()>>,
    fire_tx: UnboundedSender<CommitDue>,
}

impl CommitScheduler {
    pub fn new(quiet_period: Duration) -> (Self, UnboundedReceiver<CommitDue>) {
        let (fire_tx, fire_rx) = mpsc::unbounded_channel();
        let scheduler = Self {
            quiet_period,
            generation: 0,
            timer: None,
            fire_tx,
        };
        (scheduler, fire_rx)
    }

    /// Arm the timer, replacing any timer already armed.
    pub fn schedule(&mut self) {
        self.disarm();
        self.generation += 1;
        let generation = self.generation;
        let quiet_period = self.quiet_period;
        let fire_tx = self.fire_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            sleep(quiet_period).await;
            // The receiver outlives the scheduler only in teardown races.
            let _ = fire_tx.send(CommitDue { generation });
        }));
    }

    /// Disarm the timer and invalidate any expiry already in flight.
    pub fn cancel(&mut self) {
        self.disarm();
        self.generation += 1;
    }

    /// Disarm the timer and hand back a token for an immediate commit,
    /// invalidating any expiry already in flight.
    pub fn fire_now(&mut self) -> CommitDue {
        self.disarm();
        self.generation += 1;
        CommitDue {
            generation: self.generation,
        }
    }

    /// Whether this token came from the newest timer.
    pub fn accepts(&self, due: CommitDue) -> bool {
        due.generation == self.generation
    }

    pub fn is_armed(&self) -> bool {
        self.timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    fn disarm(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for CommitScheduler {
    fn drop(&mut self) {
        self.disarm();
    }
}
