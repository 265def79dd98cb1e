use std::time::Duration;

use async_trait::async_trait;
use hookshot_core::{Chain, DeliveryTarget, Levels};
use hookshot_error::GenericError;
use rand::Rng as _;
use tracing::debug;

const DEFAULT_RETRIES: usize = 3;
const DEFAULT_FACTOR_PCT: u64 = 100;
const DEFAULT_JITTER_PCT: u64 = 10;

/// Returns how much a retry delay grows by, given as a percentage of the delay.
pub fn increase_delay(delay: Duration, factor_pct: u64) -> Duration {
    percent_of(delay, factor_pct)
}

/// Returns the largest jitter that may be added to a retry delay, given as a percentage of the delay.
pub fn max_jitter(delay: Duration, jitter_pct: u64) -> Duration {
    percent_of(delay, jitter_pct)
}

fn percent_of(delay: Duration, pct: u64) -> Duration {
    let nanos = delay.as_nanos().saturating_mul(u128::from(pct)) / 100;
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn random_jitter(delay: Duration, jitter_pct: u64) -> Duration {
    let max_nanos = u64::try_from(max_jitter(delay, jitter_pct).as_nanos()).unwrap_or(u64::MAX);
    if max_nanos == 0 {
        return Duration::ZERO;
    }

    Duration::from_nanos(rand::rng().random_range(0..=max_nanos))
}

/// A hook that retries failed deliveries with exponential backoff.
///
/// Each call to `fire` makes up to `1 + retries` attempts against the wrapped target. After the first failure, the
/// hook pauses for the base delay. After every later failure it pauses for the current delay plus a random jitter, and
/// then grows the delay by `factor_pct` percent of itself.
///
/// Pausing happens inside `fire`, so this hook is best placed behind an [`AsyncDispatcher`][hookshot_core::AsyncDispatcher]
/// rather than in front of one.
pub struct RetryHook<T> {
    next: T,
    delay: Duration,
    factor_pct: u64,
    jitter_pct: u64,
    retries: usize,
}

impl<T> RetryHook<T> {
    /// Creates a new `RetryHook` wrapping `next`, with the given base delay between attempts.
    ///
    /// Defaults to 3 retries, doubling the delay after each retry, with up to 10% jitter.
    pub fn new(next: T, delay: Duration) -> Self {
        Self {
            next,
            delay,
            factor_pct: DEFAULT_FACTOR_PCT,
            jitter_pct: DEFAULT_JITTER_PCT,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Sets how much the delay grows after each retry, as a percentage of the current delay.
    pub fn with_factor_pct(mut self, factor_pct: u64) -> Self {
        self.factor_pct = factor_pct;
        self
    }

    /// Sets the maximum random jitter added to each pause, as a percentage of the current delay.
    pub fn with_jitter_pct(mut self, jitter_pct: u64) -> Self {
        self.jitter_pct = jitter_pct;
        self
    }

    /// Sets the maximum number of retries.
    ///
    /// Zero disables retrying entirely.
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries;
        self
    }
}

#[async_trait]
impl<M, T> DeliveryTarget<M> for RetryHook<T>
where
    M: Send + Sync,
    T: DeliveryTarget<M>,
{
    async fn fire(&self, message: &M) -> Result<(), GenericError> {
        let mut delay = self.delay;
        let mut attempt = 0;

        loop {
            let error = match self.next.fire(message).await {
                Ok(()) => return Ok(()),
                Err(e) => e,
            };

            if attempt == self.retries {
                return Err(error.context(format!("failed after {} retries", self.retries)));
            }

            let mut pause = delay;
            if attempt > 0 {
                pause += random_jitter(delay, self.jitter_pct);
                delay += increase_delay(delay, self.factor_pct);
            }

            attempt += 1;
            debug!(
                attempt,
                retries = self.retries,
                pause = ?pause,
                error = %error,
                "Delivery attempt failed. Retrying."
            );

            tokio::time::sleep(pause).await;
        }
    }

    fn levels(&self) -> Levels {
        self.next.levels()
    }
}

impl<M, T> Chain<M> for RetryHook<T>
where
    M: Send + Sync,
    T: DeliveryTarget<M>,
{
    type Next = T;

    fn next(&self) -> &T {
        &self.next
    }
}
