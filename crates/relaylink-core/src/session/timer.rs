// ── Background poll timer ──
//
// A timer never runs an exchange itself. Each tick asks the worker for a
// poll, and only when the previous poll has finished: the shared
// in-flight flag is set here and cleared by the worker.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use super::request::Envelope;

/// Handle to a running poll task. Dropping it stops the task.
pub(crate) struct PollTimer {
    id: u64,
    period: Duration,
    cancel: CancellationToken,
}

impl PollTimer {
    /// Spawn a timer that requests `Poll(id)` every `period`. The first
    /// request comes one full period after arming.
    pub(crate) fn arm(
        id: u64,
        period: Duration,
        parent: &CancellationToken,
        tx: mpsc::WeakSender<Envelope>,
        in_flight: Arc<AtomicBool>,
    ) -> Self {
        let cancel = parent.child_token();
        tokio::spawn(poll_task(id, period, cancel.clone(), tx, in_flight));
        Self { id, period, cancel }
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for PollTimer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_task(
    id: u64,
    period: Duration,
    cancel: CancellationToken,
    tx: mpsc::WeakSender<Envelope>,
    in_flight: Arc<AtomicBool>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if in_flight.swap(true, Ordering::AcqRel) {
                    trace!(timer = id, "previous poll still running, tick skipped");
                    continue;
                }
                let Some(tx) = tx.upgrade() else { break };
                if tx.try_send(Envelope::poll(id)).is_err() {
                    in_flight.store(false, Ordering::Release);
                }
            }
        }
    }
    trace!(timer = id, "poll timer stopped");
}
