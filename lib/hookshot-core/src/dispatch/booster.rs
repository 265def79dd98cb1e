use std::sync::{
    atomic::{
        AtomicUsize,
        Ordering::{AcqRel, Acquire, Relaxed},
    },
    Arc,
};

use metrics::Gauge;
use tracing::debug;

use super::{deliver, metrics::DispatcherMetrics, DeliveryOrigin};
use crate::{buffer::DispatchBuffer, target::DeliveryTarget};

/// Bounded count of active boosters.
pub(crate) struct BoostCounter {
    active: AtomicUsize,
    max: usize,
    gauge: Gauge,
}

impl BoostCounter {
    pub fn new(max: usize, gauge: Gauge) -> Self {
        Self {
            active: AtomicUsize::new(0),
            max,
            gauge,
        }
    }

    pub fn active(&self) -> usize {
        self.active.load(Acquire)
    }

    /// Claims a booster slot, if one is free.
    ///
    /// The slot is released when the returned permit is dropped.
    pub fn try_acquire(self: &Arc<Self>) -> Option<BoostPermit> {
        let mut active = self.active.load(Relaxed);
        loop {
            if active >= self.max {
                return None;
            }

            // Only the caller whose increment lands is allowed to spawn a booster.
            match self.active.compare_exchange_weak(active, active + 1, AcqRel, Relaxed) {
                Ok(_) => {
                    self.gauge.increment(1.0);
                    return Some(BoostPermit {
                        counter: Arc::clone(self),
                    });
                }
                Err(current) => active = current,
            }
        }
    }
}

/// A claimed booster slot.
pub(crate) struct BoostPermit {
    counter: Arc<BoostCounter>,
}

impl Drop for BoostPermit {
    fn drop(&mut self) {
        self.counter.active.fetch_sub(1, AcqRel);
        self.counter.gauge.decrement(1.0);
    }
}

/// A short-lived task that helps drain the buffer while it is full.
///
/// A booster is spawned carrying the message that could not be buffered. It keeps taking messages off the buffer and
/// delivering them itself, pushing its own message into the space it freed, until its message has been handed off and
/// the buffer is empty.
pub(crate) struct Booster<M, T> {
    buffer: Arc<DispatchBuffer<M>>,
    target: Arc<T>,
    metrics: Arc<DispatcherMetrics>,
    pending: Option<M>,
    permit: BoostPermit,
}

impl<M, T> Booster<M, T>
where
    M: Send + Sync,
    T: DeliveryTarget<M>,
{
    pub fn new(
        buffer: Arc<DispatchBuffer<M>>, target: Arc<T>, metrics: Arc<DispatcherMetrics>, message: M,
        permit: BoostPermit,
    ) -> Self {
        Self {
            buffer,
            target,
            metrics,
            pending: Some(message),
            permit,
        }
    }

    pub async fn run(mut self) {
        debug!(active = self.permit.counter.active(), "Booster started.");

        let mut delivered = 0usize;
        loop {
            let drained = self.buffer.try_dequeue();
            if drained.is_none() && self.pending.is_none() {
                break;
            }

            if let Some(pending) = self.pending.take() {
                if let Err(pending) = self.buffer.try_enqueue(pending) {
                    if drained.is_none() {
                        // The buffer has no room to give us, either because it has no capacity at all or because
                        // producers keep refilling it, so deliver the message ourselves.
                        deliver(&*self.target, &self.metrics, pending, DeliveryOrigin::Booster).await;
                        delivered += 1;
                    } else {
                        self.pending = Some(pending);
                    }
                }
            }

            if let Some(message) = drained {
                deliver(&*self.target, &self.metrics, message, DeliveryOrigin::Booster).await;
                delivered += 1;
            }
        }

        debug!(delivered, "Booster finished.");
    }
}
