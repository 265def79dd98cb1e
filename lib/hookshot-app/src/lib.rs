//! Application-level helpers: logging bootstrap, and forwarding of log events into a hook chain.
#![deny(warnings)]
#![deny(missing_docs)]

mod layer;
pub use self::layer::{HookLayer, LogRecord};

pub mod logging;
