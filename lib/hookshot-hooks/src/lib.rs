//! Hooks that add behavior in front of another delivery target.
//!
//! Every hook here wraps exactly one downstream [`DeliveryTarget`][hookshot_core::DeliveryTarget] and implements
//! [`Chain`][hookshot_core::Chain], so hooks can be stacked in any order, together with an
//! [`AsyncDispatcher`][hookshot_core::AsyncDispatcher].
#![deny(warnings)]
#![deny(missing_docs)]

mod rate_limit;
pub use self::rate_limit::{RateLimitError, RateLimitHook};

mod retry;
pub use self::retry::{increase_delay, max_jitter, RetryHook};
