use std::sync::Arc;

use tracing::debug;

use super::{deliver, metrics::DispatcherMetrics, DeliveryOrigin};
use crate::{buffer::DispatchBuffer, target::DeliveryTarget};

/// Drains the buffer until it is closed and empty, delivering each message in turn.
pub(crate) async fn run_worker<M, T>(
    worker_id: usize, buffer: Arc<DispatchBuffer<M>>, target: Arc<T>, metrics: Arc<DispatcherMetrics>,
) where
    M: Send + Sync,
    T: DeliveryTarget<M>,
{
    debug!(worker_id, "Worker started.");

    let mut delivered = 0usize;
    while let Some(message) = buffer.dequeue().await {
        deliver(&*target, &metrics, message, DeliveryOrigin::Worker).await;
        delivered += 1;
    }

    debug!(worker_id, delivered, "Worker stopped.");
}
