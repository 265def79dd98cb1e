//! Asynchronous dispatch engine.
//!
//! [`AsyncDispatcher`] sits between producers and a [`DeliveryTarget`], accepting messages without blocking and
//! delivering them in the background. Messages first go into a bounded [`DispatchBuffer`] which a fixed pool of
//! workers drains. When the buffer is full, the dispatcher spawns short-lived boosters (up to a configured maximum)
//! that help drain it, and only rejects a message once every booster slot is taken.
use std::{
    panic::AssertUnwindSafe,
    sync::{Arc, PoisonError, RwLock},
    time::Instant,
};

use async_trait::async_trait;
use futures::FutureExt as _;
use hookshot_error::GenericError;
use snafu::{OptionExt as _, Snafu};
use tokio::runtime::Handle;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::{
    buffer::DispatchBuffer,
    target::{Chain, DeliveryTarget, Levels},
    task::HandleExt as _,
};

mod booster;
use self::booster::{BoostCounter, Booster};

mod config;
pub use self::config::AsyncDispatcherConfiguration;

mod metrics;
use self::metrics::DispatcherMetrics;

mod worker;
use self::worker::run_worker;

/// Dispatcher error.
#[derive(Clone, Debug, Eq, PartialEq, Snafu)]
#[snafu(context(suffix(false)))]
pub enum DispatchError {
    /// The dispatcher is not running.
    ///
    /// Returned by `submit` before `start`, after `stop`, or while a stop is in progress, and by `stop` when there is
    /// nothing to stop.
    #[snafu(display("dispatcher is not running"))]
    NotRunning,

    /// The buffer is full and every booster slot is taken.
    #[snafu(display("buffer is full and all {} boosters are busy", boosters))]
    BufferFull {
        /// Maximum number of concurrently active boosters.
        boosters: usize,
    },

    /// The dispatcher has already been started.
    #[snafu(display("dispatcher is already running"))]
    AlreadyRunning,

    /// The dispatcher is in the middle of stopping.
    #[snafu(display("dispatcher is shutting down"))]
    ShutdownInProgress,

    /// The dispatcher was started outside of a Tokio runtime.
    #[snafu(display("dispatcher must be started from within a Tokio runtime"))]
    NoRuntime,
}

/// Where a delivery attempt was made from.
#[derive(Clone, Copy, Debug)]
pub(crate) enum DeliveryOrigin {
    Worker,
    Booster,
    Shutdown,
}

impl DeliveryOrigin {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Worker => "worker",
            Self::Booster => "booster",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Makes a single delivery attempt and records its outcome.
///
/// Failures, including a panicking target, are logged and counted here and go no further. The message is dropped once
/// the attempt is over.
pub(crate) async fn deliver<M, T>(target: &T, metrics: &DispatcherMetrics, message: M, origin: DeliveryOrigin)
where
    M: Send + Sync,
    T: DeliveryTarget<M> + ?Sized,
{
    let started = Instant::now();
    let result = AssertUnwindSafe(target.fire(&message)).catch_unwind().await;
    metrics.delivery_latency().record(started.elapsed().as_secs_f64());
    drop(message);

    match result {
        Ok(Ok(())) => metrics.delivered().increment(1),
        Ok(Err(e)) => {
            metrics.delivery_errors().increment(1);
            error!(origin = origin.as_str(), "Failed to deliver message: {:#}", e);
        }
        Err(_) => {
            metrics.delivery_errors().increment(1);
            error!(origin = origin.as_str(), "Delivery target panicked while delivering message.");
        }
    }
}

struct Session<M> {
    buffer: Arc<DispatchBuffer<M>>,
    workers: TaskTracker,
    boosters: TaskTracker,
    runtime: Handle,
}

enum State<M> {
    Stopped,
    Running(Session<M>),

    /// Holds the tracker of the task running the shutdown phases.
    Stopping(TaskTracker),
}

/// Runs the shutdown phases for `session`, then marks the dispatcher as stopped.
async fn shut_down<M, T>(
    name: String, session: Session<M>, target: Arc<T>, metrics: Arc<DispatcherMetrics>, state: Arc<RwLock<State<M>>>,
) where
    M: Send + Sync,
    T: DeliveryTarget<M>,
{
    session.boosters.close();
    session.boosters.wait().await;

    session.buffer.close();
    session.workers.wait().await;

    let mut leftover = 0usize;
    while let Some(message) = session.buffer.try_dequeue() {
        deliver(&*target, &metrics, message, DeliveryOrigin::Shutdown).await;
        leftover += 1;
    }

    *state.write().unwrap_or_else(PoisonError::into_inner) = State::Stopped;

    info!(dispatcher = %name, leftover, "Dispatcher stopped.");
}

/// Asynchronous dispatcher.
///
/// Accepts messages through [`submit`][Self::submit], which never waits, and delivers them to the wrapped target from
/// background tasks. Between [`start`][Self::start] and [`stop`][Self::stop], every accepted message is delivered
/// exactly once; `stop` does not return until that has happened.
///
/// No ordering is guaranteed between messages delivered concurrently, and delivery failures are only reported
/// through logs and metrics, never to the submitter.
///
/// A dispatcher is itself a [`DeliveryTarget`], so it can be placed anywhere in a hook chain.
pub struct AsyncDispatcher<M, T> {
    name: String,
    config: AsyncDispatcherConfiguration,
    target: Arc<T>,
    boost_counter: Arc<BoostCounter>,
    metrics: Arc<DispatcherMetrics>,
    state: Arc<RwLock<State<M>>>,
}

impl<M, T> AsyncDispatcher<M, T>
where
    M: Send + Sync + 'static,
    T: DeliveryTarget<M> + 'static,
{
    /// Creates a new, stopped `AsyncDispatcher` delivering to `target`.
    pub fn new(target: T, config: AsyncDispatcherConfiguration) -> Self {
        Self::with_name("default", target, config)
    }

    /// Creates a new, stopped `AsyncDispatcher` delivering to `target`.
    ///
    /// `name` is attached to the dispatcher's logs and metrics.
    pub fn with_name<S>(name: S, target: T, config: AsyncDispatcherConfiguration) -> Self
    where
        S: Into<String>,
    {
        let name = name.into();
        let metrics = Arc::new(DispatcherMetrics::new(&name));
        let boost_counter = Arc::new(BoostCounter::new(config.boosters(), metrics.active_boosters().clone()));

        Self {
            name,
            config,
            target: Arc::new(target),
            boost_counter,
            metrics,
            state: Arc::new(RwLock::new(State::Stopped)),
        }
    }

    /// Returns the name of this dispatcher.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the configuration of this dispatcher.
    pub fn config(&self) -> &AsyncDispatcherConfiguration {
        &self.config
    }

    /// Returns `true` if the dispatcher is accepting messages.
    pub fn is_running(&self) -> bool {
        matches!(*self.state.read().unwrap_or_else(PoisonError::into_inner), State::Running(_))
    }

    /// Returns the number of boosters currently active.
    pub fn active_boosters(&self) -> usize {
        self.boost_counter.active()
    }

    /// Submits a message for delivery.
    ///
    /// This never waits: the message is either handed to the buffer or to a newly spawned booster, or rejected.
    /// Callable from any thread, including ones outside of the runtime the dispatcher was started in.
    ///
    /// # Errors
    ///
    /// If the dispatcher is not running, `NotRunning` is returned. If the buffer is full and no booster slot is free,
    /// `BufferFull` is returned. In both cases the message is dropped.
    pub fn submit(&self, message: M) -> Result<(), DispatchError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        let session = match &*state {
            State::Running(session) => session,
            State::Stopped | State::Stopping(_) => {
                self.metrics.rejected_not_running().increment(1);
                return NotRunning.fail();
            }
        };

        let message = match session.buffer.try_enqueue(message) {
            Ok(()) => {
                self.metrics.accepted().increment(1);
                return Ok(());
            }
            Err(message) => message,
        };

        let Some(permit) = self.boost_counter.try_acquire() else {
            self.metrics.rejected_buffer_full().increment(1);
            debug!(
                dispatcher = %self.name,
                boosters = self.config.boosters(),
                "Rejected message: buffer is full and no booster slot is free."
            );
            return BufferFull {
                boosters: self.config.boosters(),
            }
            .fail();
        };

        let booster = Booster::new(
            Arc::clone(&session.buffer),
            Arc::clone(&self.target),
            Arc::clone(&self.metrics),
            message,
            permit,
        );
        session
            .runtime
            .spawn_tracked_named(&session.boosters, format!("{}-booster", self.name), booster.run());

        self.metrics.accepted().increment(1);
        self.metrics.boosted().increment(1);
        Ok(())
    }

    /// Starts the dispatcher.
    ///
    /// Allocates a fresh buffer and launches the fixed workers on the current Tokio runtime. Boosters spawned later by
    /// `submit` run on the same runtime.
    ///
    /// # Errors
    ///
    /// If called outside of a Tokio runtime, `NoRuntime` is returned. If the dispatcher is already running or is
    /// stopping, `AlreadyRunning` or `ShutdownInProgress` is returned, respectively.
    pub fn start(&self) -> Result<(), DispatchError> {
        let runtime = Handle::try_current().ok().context(NoRuntime)?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        match &*state {
            State::Stopped => {}
            State::Running(_) => return AlreadyRunning.fail(),
            State::Stopping(_) => return ShutdownInProgress.fail(),
        }

        let buffer = Arc::new(DispatchBuffer::with_capacity(self.config.buffer_capacity()));
        let workers = TaskTracker::new();
        for worker_id in 0..self.config.workers() {
            runtime.spawn_tracked_named(
                &workers,
                format!("{}-worker-{}", self.name, worker_id),
                run_worker(
                    worker_id,
                    Arc::clone(&buffer),
                    Arc::clone(&self.target),
                    Arc::clone(&self.metrics),
                ),
            );
        }
        workers.close();

        *state = State::Running(Session {
            buffer,
            workers,
            boosters: TaskTracker::new(),
            runtime,
        });

        info!(
            dispatcher = %self.name,
            workers = self.config.workers(),
            boosters = self.config.boosters(),
            buffer_capacity = self.config.buffer_capacity(),
            "Dispatcher started."
        );

        Ok(())
    }

    /// Stops the dispatcher, waiting until every accepted message has been delivered.
    ///
    /// New submissions are rejected as soon as this is called. Active boosters are waited on first, since they may
    /// still push messages into the buffer; the buffer is then closed and the workers are waited on as they drain it.
    /// Anything left in the buffer after that, which only happens when there are no workers, is delivered before
    /// returning.
    ///
    /// The shutdown itself runs as a task on the dispatcher's runtime, so dropping the returned future does not
    /// interrupt it. Calling `stop` while a shutdown is underway waits for that shutdown to finish.
    ///
    /// # Errors
    ///
    /// If the dispatcher is neither running nor stopping, `NotRunning` is returned.
    pub async fn stop(&self) -> Result<(), DispatchError> {
        let shutdown = {
            let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
            match std::mem::replace(&mut *state, State::Stopped) {
                State::Running(session) => {
                    info!(dispatcher = %self.name, boosters = self.boost_counter.active(), "Stopping dispatcher.");

                    let runtime = session.runtime.clone();
                    let shutdown = TaskTracker::new();
                    runtime.spawn_tracked_named(
                        &shutdown,
                        format!("{}-shutdown", self.name),
                        shut_down(
                            self.name.clone(),
                            session,
                            Arc::clone(&self.target),
                            Arc::clone(&self.metrics),
                            Arc::clone(&self.state),
                        ),
                    );
                    shutdown.close();

                    *state = State::Stopping(shutdown.clone());
                    shutdown
                }
                State::Stopping(shutdown) => {
                    *state = State::Stopping(shutdown.clone());
                    shutdown
                }
                State::Stopped => return NotRunning.fail(),
            }
        };

        shutdown.wait().await;

        Ok(())
    }
}

#[async_trait]
impl<M, T> DeliveryTarget<M> for AsyncDispatcher<M, T>
where
    M: Clone + Send + Sync + 'static,
    T: DeliveryTarget<M> + 'static,
{
    async fn fire(&self, message: &M) -> Result<(), GenericError> {
        Ok(self.submit(message.clone())?)
    }

    fn levels(&self) -> Levels {
        self.target.levels()
    }
}

impl<M, T> Chain<M> for AsyncDispatcher<M, T>
where
    M: Clone + Send + Sync + 'static,
    T: DeliveryTarget<M> + 'static,
{
    type Next = T;

    fn next(&self) -> &T {
        &self.target
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
        time::Duration,
    };

    use hookshot_error::generic_error;
    use proptest::prelude::*;
    use tokio::{sync::Semaphore, time::timeout};

    use super::*;

    const STOP_TIMEOUT: Duration = Duration::from_secs(10);

    #[derive(Default)]
    struct RecordingTarget {
        delivered: Mutex<Vec<u32>>,
        delay: Option<Duration>,
    }

    impl RecordingTarget {
        fn slow(delay: Duration) -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
                delay: Some(delay),
            }
        }

        fn sorted(&self) -> Vec<u32> {
            let mut delivered = self.delivered.lock().unwrap().clone();
            delivered.sort_unstable();
            delivered
        }
    }

    #[async_trait]
    impl DeliveryTarget<u32> for RecordingTarget {
        async fn fire(&self, message: &u32) -> Result<(), GenericError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.delivered.lock().unwrap().push(*message);
            Ok(())
        }

        fn levels(&self) -> Levels {
            Levels::Error | Levels::Warn
        }
    }

    /// Blocks every delivery until a permit is handed out.
    struct GatedTarget {
        gate: Semaphore,
        delivered: Mutex<Vec<u32>>,
    }

    impl GatedTarget {
        fn closed() -> Self {
            Self {
                gate: Semaphore::new(0),
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl DeliveryTarget<u32> for GatedTarget {
        async fn fire(&self, message: &u32) -> Result<(), GenericError> {
            self.gate.acquire().await?.forget();
            self.delivered.lock().unwrap().push(*message);
            Ok(())
        }
    }

    struct FailingTarget {
        attempts: AtomicUsize,
        panic: bool,
    }

    #[async_trait]
    impl DeliveryTarget<u32> for FailingTarget {
        async fn fire(&self, message: &u32) -> Result<(), GenericError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("target blew up on {}", message);
            }
            Err(generic_error!("cannot deliver {}", message))
        }
    }

    fn config(workers: usize, boosters: usize, buffer_capacity: usize) -> AsyncDispatcherConfiguration {
        AsyncDispatcherConfiguration::default()
            .with_workers(workers)
            .with_boosters(boosters)
            .with_buffer_capacity(buffer_capacity)
    }

    /// Submits `per_producer` messages from each of `producers` threads, returning the sorted accepted messages.
    fn submit_concurrently<T>(
        dispatcher: &AsyncDispatcher<u32, T>, producers: usize, per_producer: usize,
    ) -> Vec<u32>
    where
        T: DeliveryTarget<u32> + 'static,
    {
        let mut accepted = std::thread::scope(|s| {
            let handles = (0..producers)
                .map(|producer| {
                    s.spawn(move || {
                        let mut accepted = Vec::new();
                        for i in 0..per_producer {
                            let message = (producer * per_producer + i) as u32;
                            match dispatcher.submit(message) {
                                Ok(()) => accepted.push(message),
                                Err(DispatchError::BufferFull { .. }) => {}
                                Err(e) => panic!("unexpected submit error: {}", e),
                            }
                        }
                        accepted
                    })
                })
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect::<Vec<_>>()
        });
        accepted.sort_unstable();
        accepted
    }

    async fn stop_within_timeout<T>(dispatcher: &AsyncDispatcher<u32, T>)
    where
        T: DeliveryTarget<u32> + 'static,
    {
        timeout(STOP_TIMEOUT, dispatcher.stop())
            .await
            .expect("dispatcher should stop in time")
            .expect("dispatcher should be running");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn full_buffer_without_boosters_rejects() {
        let dispatcher = AsyncDispatcher::new(RecordingTarget::default(), config(0, 0, 4));
        dispatcher.start().unwrap();

        for i in 0..4 {
            assert_eq!(dispatcher.submit(i), Ok(()));
        }
        assert_eq!(dispatcher.submit(4), Err(DispatchError::BufferFull { boosters: 0 }));
        assert_eq!(dispatcher.active_boosters(), 0);

        // Nothing drains the buffer while running, so everything is delivered on stop.
        stop_within_timeout(&dispatcher).await;
        assert_eq!(dispatcher.next().sorted(), vec![0, 1, 2, 3]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn stopped_dispatcher_rejects_everything() {
        let dispatcher = AsyncDispatcher::new(RecordingTarget::default(), config(2, 4, 0));

        for i in 0..8 {
            assert_eq!(dispatcher.submit(i), Err(DispatchError::NotRunning));
        }
        assert_eq!(dispatcher.active_boosters(), 0);
        assert_eq!(dispatcher.stop().await, Err(DispatchError::NotRunning));

        dispatcher.start().unwrap();
        stop_within_timeout(&dispatcher).await;

        assert_eq!(dispatcher.submit(99), Err(DispatchError::NotRunning));
        assert!(dispatcher.next().sorted().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn booster_count_is_capped() {
        let dispatcher = AsyncDispatcher::new(GatedTarget::closed(), config(0, 3, 0));
        dispatcher.start().unwrap();

        for i in 0..3 {
            assert_eq!(dispatcher.submit(i), Ok(()));
        }
        assert_eq!(dispatcher.active_boosters(), 3);
        assert_eq!(dispatcher.submit(3), Err(DispatchError::BufferFull { boosters: 3 }));

        dispatcher.next().gate.add_permits(3);
        stop_within_timeout(&dispatcher).await;

        assert_eq!(dispatcher.active_boosters(), 0);
        let mut delivered = dispatcher.next().delivered.lock().unwrap().clone();
        delivered.sort_unstable();
        assert_eq!(delivered, vec![0, 1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn slow_booster_finishes_before_stop_returns() {
        let dispatcher = AsyncDispatcher::new(RecordingTarget::slow(Duration::from_millis(50)), config(0, 4, 1));
        dispatcher.start().unwrap();

        // The first message fills the buffer, the second one has to go through a booster which can only hand it off
        // after delivering the first one.
        assert_eq!(dispatcher.submit(1), Ok(()));
        assert_eq!(dispatcher.submit(2), Ok(()));
        assert_eq!(dispatcher.active_boosters(), 1);

        stop_within_timeout(&dispatcher).await;

        assert_eq!(dispatcher.active_boosters(), 0);
        assert_eq!(dispatcher.next().sorted(), vec![1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn zero_capacity_delivers_through_boosters() {
        const BOOSTERS: usize = 16;

        let dispatcher = AsyncDispatcher::new(RecordingTarget::default(), config(0, BOOSTERS, 0));
        dispatcher.start().unwrap();

        let accepted = submit_concurrently(&dispatcher, BOOSTERS, 1);
        assert_eq!(accepted.len(), BOOSTERS);

        stop_within_timeout(&dispatcher).await;
        assert_eq!(dispatcher.next().sorted(), accepted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn default_shape_delivers_everything_accepted() {
        let dispatcher = AsyncDispatcher::with_name("default-shape", RecordingTarget::default(), config(4, 64, 32));
        dispatcher.start().unwrap();

        let accepted = submit_concurrently(&dispatcher, 8, 128);
        assert!(!accepted.is_empty());

        stop_within_timeout(&dispatcher).await;
        assert_eq!(dispatcher.next().sorted(), accepted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn enough_boosters_accept_everything() {
        let dispatcher = AsyncDispatcher::new(RecordingTarget::default(), config(4, 1024, 32));
        dispatcher.start().unwrap();

        let accepted = submit_concurrently(&dispatcher, 8, 128);
        assert_eq!(accepted, (0..1024).collect::<Vec<_>>());

        stop_within_timeout(&dispatcher).await;
        assert_eq!(dispatcher.next().sorted(), accepted);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dropped_stop_keeps_shutting_down() {
        let dispatcher = AsyncDispatcher::new(GatedTarget::closed(), config(1, 1, 0));
        dispatcher.start().unwrap();
        assert_eq!(dispatcher.submit(1), Ok(()));

        // The booster is held at the gate, so this stop cannot finish before it is dropped.
        assert!(timeout(Duration::from_millis(50), dispatcher.stop()).await.is_err());
        assert!(!dispatcher.is_running());
        assert_eq!(dispatcher.submit(2), Err(DispatchError::NotRunning));
        assert_eq!(dispatcher.start(), Err(DispatchError::ShutdownInProgress));

        // A second stop joins the shutdown already underway.
        let (stopped, ()) = tokio::join!(timeout(STOP_TIMEOUT, dispatcher.stop()), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            dispatcher.next().gate.add_permits(1);
        });
        assert_eq!(stopped.expect("dispatcher should stop in time"), Ok(()));
        assert_eq!(*dispatcher.next().delivered.lock().unwrap(), vec![1]);

        dispatcher.start().unwrap();
        dispatcher.next().gate.add_permits(1);
        assert_eq!(dispatcher.submit(3), Ok(()));
        stop_within_timeout(&dispatcher).await;

        assert_eq!(*dispatcher.next().delivered.lock().unwrap(), vec![1, 3]);
        assert_eq!(dispatcher.active_boosters(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn lifecycle_transitions() {
        let dispatcher = AsyncDispatcher::new(RecordingTarget::default(), config(1, 1, 1));
        assert!(!dispatcher.is_running());

        dispatcher.start().unwrap();
        assert!(dispatcher.is_running());
        assert_eq!(dispatcher.start(), Err(DispatchError::AlreadyRunning));
        assert_eq!(dispatcher.submit(1), Ok(()));

        stop_within_timeout(&dispatcher).await;
        assert!(!dispatcher.is_running());
        assert_eq!(dispatcher.stop().await, Err(DispatchError::NotRunning));

        // Restarting gets a fresh buffer and fresh workers.
        dispatcher.start().unwrap();
        assert_eq!(dispatcher.submit(2), Ok(()));
        stop_within_timeout(&dispatcher).await;

        assert_eq!(dispatcher.next().sorted(), vec![1, 2]);
    }

    #[test]
    fn start_requires_runtime() {
        let dispatcher = AsyncDispatcher::new(RecordingTarget::default(), AsyncDispatcherConfiguration::default());
        assert_eq!(dispatcher.start(), Err(DispatchError::NoRuntime));
        assert!(!dispatcher.is_running());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn delivery_failures_stay_internal() {
        for panic in [false, true] {
            let target = FailingTarget {
                attempts: AtomicUsize::new(0),
                panic,
            };
            let dispatcher = AsyncDispatcher::new(target, config(1, 2, 2));
            dispatcher.start().unwrap();

            let accepted = (0..10).filter(|i| dispatcher.submit(*i).is_ok()).count();
            assert!(accepted > 0);

            stop_within_timeout(&dispatcher).await;
            assert_eq!(dispatcher.next().attempts.load(Ordering::SeqCst), accepted);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispatcher_is_a_chained_target() {
        let dispatcher = AsyncDispatcher::new(RecordingTarget::default(), config(1, 1, 4));

        assert_eq!(dispatcher.levels(), Levels::Error | Levels::Warn);
        assert!(dispatcher.fire(&1).await.is_err());

        dispatcher.start().unwrap();
        dispatcher.fire(&2).await.unwrap();
        stop_within_timeout(&dispatcher).await;

        assert_eq!(dispatcher.next().sorted(), vec![2]);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn property_delivered_matches_accepted(
            workers in 0usize..4,
            boosters in 0usize..8,
            buffer_capacity in 0usize..8,
            producers in 1usize..4,
            per_producer in 0usize..64,
        ) {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .unwrap();

            let (accepted, delivered) = runtime.block_on(async {
                let dispatcher = AsyncDispatcher::new(
                    RecordingTarget::default(),
                    config(workers, boosters, buffer_capacity),
                );
                dispatcher.start().unwrap();

                let accepted = submit_concurrently(&dispatcher, producers, per_producer);
                stop_within_timeout(&dispatcher).await;

                (accepted, dispatcher.next().sorted())
            });

            prop_assert_eq!(accepted, delivered);
        }
    }
}
