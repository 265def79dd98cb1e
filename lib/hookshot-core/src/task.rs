//! Helpers for working with asynchronous tasks.
use std::future::Future;

use tokio::{runtime::Handle, task::JoinHandle};
use tokio_util::task::TaskTracker;
use tracing::{debug_span, Instrument as _};

/// Helper trait for providing traced, tracked spawning when using `Handle`.
pub trait HandleExt<T> {
    /// Spawns a new named asynchronous task, returning a [`JoinHandle`] for it.
    ///
    /// The task runs inside a `task` span carrying `name`, nested under whatever span is current at the call site, and
    /// is registered with `tracker` so that it can be waited on as part of a group.
    fn spawn_tracked_named<S, F>(&self, tracker: &TaskTracker, name: S, f: F) -> JoinHandle<T>
    where
        S: Into<String>,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static;
}

impl<T> HandleExt<T> for Handle {
    fn spawn_tracked_named<S, F>(&self, tracker: &TaskTracker, name: S, f: F) -> JoinHandle<T>
    where
        S: Into<String>,
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let span = debug_span!("task", name = name.into());
        self.spawn(tracker.track_future(f.instrument(span)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn tracker_waits_for_spawned_tasks() {
        let tracker = TaskTracker::new();
        let completed = Arc::new(AtomicUsize::new(0));
        let handle = Handle::current();

        for i in 0..8 {
            let completed = Arc::clone(&completed);
            handle.spawn_tracked_named(&tracker, format!("test-{}", i), async move {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
                completed.fetch_add(1, Ordering::SeqCst);
            });
        }

        tracker.close();
        tracker.wait().await;

        assert_eq!(completed.load(Ordering::SeqCst), 8);
    }
}
