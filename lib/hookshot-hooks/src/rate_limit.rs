use std::num::NonZeroU32;

use async_trait::async_trait;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use hookshot_core::{Chain, DeliveryTarget, Levels};
use hookshot_error::{generic_error, GenericError};
use snafu::{OptionExt as _, Snafu};

const DEFAULT_PER_SECOND: u32 = 10;
const DEFAULT_BURST: u32 = 3;

/// Rate limit error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum RateLimitError {
    /// The rate was zero.
    #[snafu(display("rate limit must allow at least one message per second"))]
    ZeroRate,

    /// The burst size was zero.
    #[snafu(display("rate limit burst must be at least one message"))]
    ZeroBurst,
}

/// A hook that caps how often messages are passed on.
///
/// Uses a token bucket refilled at `per_second` tokens per second and holding at most `burst` tokens. A message that
/// finds the bucket empty is not delivered: `fire` fails immediately rather than waiting for a token.
pub struct RateLimitHook<T> {
    next: T,
    limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
    per_second: NonZeroU32,
    burst: NonZeroU32,
}

impl<T> RateLimitHook<T> {
    /// Creates a new `RateLimitHook` wrapping `next`, allowing 10 messages per second with a burst of 3.
    pub fn new(next: T) -> Self {
        let per_second = NonZeroU32::MIN.saturating_add(DEFAULT_PER_SECOND - 1);
        let burst = NonZeroU32::MIN.saturating_add(DEFAULT_BURST - 1);
        Self::from_quota(next, per_second, burst)
    }

    /// Creates a new `RateLimitHook` wrapping `next` with the given rate and burst size.
    ///
    /// # Errors
    ///
    /// If either `per_second` or `burst` is zero, an error is returned.
    pub fn with_rate(next: T, per_second: u32, burst: u32) -> Result<Self, RateLimitError> {
        let per_second = NonZeroU32::new(per_second).context(ZeroRate)?;
        let burst = NonZeroU32::new(burst).context(ZeroBurst)?;
        Ok(Self::from_quota(next, per_second, burst))
    }

    fn from_quota(next: T, per_second: NonZeroU32, burst: NonZeroU32) -> Self {
        let quota = Quota::per_second(per_second).allow_burst(burst);
        Self {
            next,
            limiter: RateLimiter::direct(quota),
            per_second,
            burst,
        }
    }

    /// Returns the number of messages allowed per second.
    pub fn per_second(&self) -> u32 {
        self.per_second.get()
    }

    /// Returns the burst size.
    pub fn burst(&self) -> u32 {
        self.burst.get()
    }
}

#[async_trait]
impl<M, T> DeliveryTarget<M> for RateLimitHook<T>
where
    M: Send + Sync,
    T: DeliveryTarget<M>,
{
    async fn fire(&self, message: &M) -> Result<(), GenericError> {
        if self.limiter.check().is_err() {
            return Err(generic_error!(
                "rate limit [{}/sec, burst={}] exceeded",
                self.per_second,
                self.burst
            ));
        }

        self.next.fire(message).await
    }

    fn levels(&self) -> Levels {
        self.next.levels()
    }
}

impl<M, T> Chain<M> for RateLimitHook<T>
where
    M: Send + Sync,
    T: DeliveryTarget<M>,
{
    type Next = T;

    fn next(&self) -> &T {
        &self.next
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Default)]
    struct CountingTarget {
        delivered: AtomicUsize,
    }

    #[async_trait]
    impl DeliveryTarget<()> for CountingTarget {
        async fn fire(&self, _: &()) -> Result<(), GenericError> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn levels(&self) -> Levels {
            Levels::Error | Levels::Info
        }
    }

    #[tokio::test]
    async fn default_burst_then_limited() {
        let hook = RateLimitHook::new(CountingTarget::default());
        assert_eq!(hook.per_second(), 10);
        assert_eq!(hook.burst(), 3);

        for i in 0..3 {
            assert!(hook.fire(&()).await.is_ok(), "limited too early: {}", i);
        }

        let error = hook.fire(&()).await.unwrap_err();
        assert_eq!(error.to_string(), "rate limit [10/sec, burst=3] exceeded");
        assert_eq!(hook.next.delivered.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn burst_sizes() {
        for burst in [1, 10, 50, 100] {
            let hook = RateLimitHook::with_rate(CountingTarget::default(), 1, burst).unwrap();

            for i in 0..burst {
                assert!(hook.fire(&()).await.is_ok(), "limited too early [burst={}]: {}", burst, i);
            }
            assert!(hook.fire(&()).await.is_err(), "not limited [burst={}]", burst);
            assert_eq!(hook.next.delivered.load(Ordering::SeqCst), burst as usize);
        }
    }

    #[test]
    fn zero_rate_or_burst_rejected() {
        assert!(matches!(
            RateLimitHook::with_rate(CountingTarget::default(), 0, 3),
            Err(RateLimitError::ZeroRate)
        ));
        assert!(matches!(
            RateLimitHook::with_rate(CountingTarget::default(), 10, 0),
            Err(RateLimitError::ZeroBurst)
        ));
    }

    #[test]
    fn delegates_levels() {
        let hook = RateLimitHook::new(CountingTarget::default());
        assert_eq!(DeliveryTarget::<()>::levels(&hook), Levels::Error | Levels::Info);
    }
}
