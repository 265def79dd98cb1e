//! Core primitives for asynchronous, chainable delivery hooks.
//!
//! A [`DeliveryTarget`] is anything that can attempt to deliver a message. Targets can wrap one another through
//! [`Chain`], and an [`AsyncDispatcher`] decouples producers from a (possibly slow) target by delivering messages from
//! background tasks.
#![deny(warnings)]
#![deny(missing_docs)]

pub mod buffer;
pub mod dispatch;
pub mod target;
pub mod task;

pub use self::buffer::DispatchBuffer;
pub use self::dispatch::{AsyncDispatcher, AsyncDispatcherConfiguration, DispatchError};
pub use self::target::{Chain, DeliveryTarget, Levels};
