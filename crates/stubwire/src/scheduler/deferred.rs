//! Awaitable handles for scheduled work.

use super::{Scheduler, TimerRecord};
use crate::client::Outcome;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::sync::oneshot;

/// Value produced by a scheduled task.
///
/// Awaiting a `Deferred` drives the virtual clock up to the task's deadline,
/// firing everything due before it, so `.await` behaves like waiting out the
/// delay without any real time passing.
pub struct Deferred<T> {
    receiver: oneshot::Receiver<T>,
    scheduler: Scheduler,
    timer: TimerRecord,
}

/// Completes once the wait delay has elapsed.
pub type Wait = Deferred<()>;

/// Completes once a response (or timeout) has been delivered to the caller.
pub type Delivery = Deferred<Outcome>;

impl<T: Send + 'static> Deferred<T> {
    /// Schedule `produce` to run after `delay` and hand back its result.
    pub(crate) fn schedule<F>(scheduler: &Scheduler, delay: Duration, produce: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let timer = scheduler.schedule(delay, move || {
            let _ = tx.send(produce());
        });
        Self {
            receiver: rx,
            scheduler: scheduler.clone(),
            timer,
        }
    }
}

impl<T> Deferred<T> {
    /// Virtual time at which the value becomes available
    pub fn deadline(&self) -> Duration {
        self.timer.deadline
    }

    pub fn timer(&self) -> TimerRecord {
        self.timer
    }

    /// Take the value if its task already fired, without moving the clock.
    pub fn try_take(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

impl<T> Future for Deferred<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        if let Poll::Ready(Ok(value)) = Pin::new(&mut this.receiver).poll(cx) {
            return Poll::Ready(value);
        }

        this.scheduler.advance_to(this.timer.deadline);
        match Pin::new(&mut this.receiver).poll(cx) {
            Poll::Ready(Ok(value)) => Poll::Ready(value),
            // The producing task never sends only if it panicked; stay pending.
            _ => Poll::Pending,
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("timer", &self.timer)
            .finish()
    }
}
