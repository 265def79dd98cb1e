//! Delivery targets and hook chains.
use std::{fmt, sync::Arc};

use async_trait::async_trait;
use bitmask_enum::bitmask;
use hookshot_error::GenericError;
use tracing::Level;

/// Set of log levels a delivery target is interested in.
///
/// Purely advisory: the dispatcher never filters on it, but producers such as the logging layer consult it before
/// building a message at all. Chained hooks report the levels of the target they wrap.
#[bitmask(u8)]
#[bitmask_config(vec_debug)]
pub enum Levels {
    /// Error.
    Error,

    /// Warn.
    Warn,

    /// Info.
    Info,

    /// Debug.
    Debug,

    /// Trace.
    Trace,
}

impl Levels {
    /// Returns the levels that are at least as severe as `level`.
    ///
    /// `Levels::at_least(&Level::WARN)` is `Error | Warn`.
    pub fn at_least(level: &Level) -> Self {
        let mut levels = Self::Error;
        for (candidate, bit) in [
            (Level::WARN, Self::Warn),
            (Level::INFO, Self::Info),
            (Level::DEBUG, Self::Debug),
            (Level::TRACE, Self::Trace),
        ] {
            if candidate <= *level {
                levels = levels | bit;
            }
        }
        levels
    }

    /// Returns `true` if `level` is part of this set.
    pub fn accepts(&self, level: &Level) -> bool {
        self.contains(Self::from(*level))
    }
}

impl From<Level> for Levels {
    fn from(level: Level) -> Self {
        if level == Level::ERROR {
            Self::Error
        } else if level == Level::WARN {
            Self::Warn
        } else if level == Level::INFO {
            Self::Info
        } else if level == Level::DEBUG {
            Self::Debug
        } else {
            Self::Trace
        }
    }
}

impl Default for Levels {
    fn default() -> Self {
        Self::all_bits()
    }
}

impl fmt::Display for Levels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Self::Error, "error"),
            (Self::Warn, "warn"),
            (Self::Info, "info"),
            (Self::Debug, "debug"),
            (Self::Trace, "trace"),
        ]
        .into_iter()
        .filter(|(bit, _)| self.contains(*bit))
        .map(|(_, name)| name)
        .collect::<Vec<_>>();

        write!(f, "{}", names.join("|"))
    }
}

/// A component that delivers messages somewhere.
///
/// This is the only contract the dispatcher has with its downstream: attempt delivery of one message and report
/// whether it worked. The message is borrowed so that wrappers, such as a retrying hook, can make several attempts
/// without cloning it.
#[async_trait]
pub trait DeliveryTarget<M>: Send + Sync
where
    M: Send + Sync,
{
    /// Attempts to deliver `message`.
    ///
    /// # Errors
    ///
    /// If the message could not be delivered, an error is returned.
    async fn fire(&self, message: &M) -> Result<(), GenericError>;

    /// Returns the levels this target accepts.
    ///
    /// Defaults to all levels.
    fn levels(&self) -> Levels {
        Levels::all_bits()
    }
}

/// A delivery target that wraps another one.
///
/// Hooks that add behavior (retries, rate limiting, asynchronous dispatch) hold exactly one downstream target and
/// expose it through `next`, so that a stack of hooks forms a singly-linked chain ending at the actual sink.
pub trait Chain<M>: DeliveryTarget<M>
where
    M: Send + Sync,
{
    /// The wrapped target.
    type Next: DeliveryTarget<M> + ?Sized;

    /// Returns the target that follows this one in the chain.
    fn next(&self) -> &Self::Next;
}

#[async_trait]
impl<M, T> DeliveryTarget<M> for Arc<T>
where
    M: Send + Sync,
    T: DeliveryTarget<M> + ?Sized,
{
    async fn fire(&self, message: &M) -> Result<(), GenericError> {
        (**self).fire(message).await
    }

    fn levels(&self) -> Levels {
        (**self).levels()
    }
}

#[async_trait]
impl<M, T> DeliveryTarget<M> for Box<T>
where
    M: Send + Sync,
    T: DeliveryTarget<M> + ?Sized,
{
    async fn fire(&self, message: &M) -> Result<(), GenericError> {
        (**self).fire(message).await
    }

    fn levels(&self) -> Levels {
        (**self).levels()
    }
}
