//! Error primitives shared across hookshot crates.
//!
//! Components with a small, closed set of failure modes (the dispatcher, configuration loading) define their own
//! `snafu` error enums. Everything else, most notably the result of a delivery attempt, is reported as a
//! [`GenericError`], which can wrap any error type and carry additional context.
#![deny(warnings)]
#![deny(missing_docs)]

use std::fmt::Display;

/// A type-erased error.
///
/// Delivery targets return this from `fire`, which lets decorators wrap whatever their downstream target failed with
/// without needing to know its concrete type.
pub type GenericError = anyhow::Error;

/// Creates a [`GenericError`].
///
/// Accepts a string literal, a format string followed by its arguments (as with `std::format!`), or any value that
/// implements both `Debug` and `Display`. When given an existing `std::error::Error`, its source chain is preserved.
#[macro_export]
macro_rules! generic_error {
    ($msg:literal $(,)?) => { $crate::__private_anyhow!($msg) };
    ($err:expr $(,)?) => { $crate::__private_anyhow!($err) };
    ($fmt:expr, $($arg:tt)*) => { $crate::__private_anyhow!($fmt, $($arg)*) };
}

#[doc(hidden)]
pub use anyhow::anyhow as __private_anyhow;

mod sealed {
    pub trait Sealed {}

    impl<T, E> Sealed for Result<T, E> {}
}

/// Extension methods for attaching context to fallible results.
///
/// `anyhow::Context` is not used directly so that these methods do not collide with `snafu::ResultExt` in modules
/// that import both.
pub trait ErrorContext<T, E>: sealed::Sealed {
    /// Wraps the error value, if any, with the given context.
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static;

    /// Wraps the error value, if any, with context produced by `f`.
    ///
    /// `f` is only called when an error is actually present.
    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}

impl<T, E> ErrorContext<T, E> for Result<T, E>
where
    Result<T, E>: anyhow::Context<T, E>,
{
    fn error_context<C>(self, context: C) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
    {
        anyhow::Context::context(self, context)
    }

    fn with_error_context<C, F>(self, f: F) -> Result<T, GenericError>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C,
    {
        anyhow::Context::with_context(self, f)
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn context_wraps_source_error() {
        let result: Result<(), io::Error> = Err(io::Error::new(io::ErrorKind::BrokenPipe, "pipe closed"));
        let err = result.error_context("Failed to write log record.").unwrap_err();

        assert_eq!(err.to_string(), "Failed to write log record.");
        assert_eq!(err.root_cause().to_string(), "pipe closed");
    }

    #[test]
    fn lazy_context_only_evaluated_on_error() {
        let result: Result<u32, io::Error> = Ok(42);
        let value = result
            .with_error_context(|| -> String { panic!("context should not be evaluated") })
            .unwrap();

        assert_eq!(value, 42);
    }

    #[test]
    fn macro_formats_arguments() {
        let err = generic_error!("rate limit [{}/sec, burst={}] exceeded", 10, 3);
        assert_eq!(err.to_string(), "rate limit [10/sec, burst=3] exceeded");
    }
}
