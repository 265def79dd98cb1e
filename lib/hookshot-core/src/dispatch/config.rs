use hookshot_config::GenericConfiguration;
use hookshot_error::GenericError;
use serde::Deserialize;

const fn default_workers() -> usize {
    4
}

const fn default_boosters() -> usize {
    64
}

const fn default_buffer_capacity() -> usize {
    32
}

/// Async dispatcher configuration.
///
/// Controls the shape of the dispatch engine: how many fixed workers drain the buffer, how large the buffer is, and
/// how many short-lived boosters may run at once when the buffer is full. All values may be zero.
///
/// Once handed to an [`AsyncDispatcher`][super::AsyncDispatcher], the configuration can no longer be changed.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub struct AsyncDispatcherConfiguration {
    /// Number of fixed workers launched on start.
    ///
    /// Defaults to 4.
    #[serde(rename = "dispatch_workers", default = "default_workers")]
    workers: usize,

    /// Maximum number of concurrently active boosters.
    ///
    /// Defaults to 64.
    #[serde(rename = "dispatch_boosters", default = "default_boosters")]
    boosters: usize,

    /// Capacity of the dispatch buffer.
    ///
    /// Defaults to 32.
    #[serde(rename = "dispatch_buffer_capacity", default = "default_buffer_capacity")]
    buffer_capacity: usize,
}

impl AsyncDispatcherConfiguration {
    /// Creates a new `AsyncDispatcherConfiguration` from the given configuration.
    ///
    /// Every setting is optional and falls back to its default.
    ///
    /// # Errors
    ///
    /// If any of the settings are present but not valid unsigned integers, an error is returned.
    pub fn from_configuration(config: &GenericConfiguration) -> Result<Self, GenericError> {
        Ok(config.as_typed()?)
    }

    /// Sets the number of fixed workers.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Sets the maximum number of concurrently active boosters.
    pub fn with_boosters(mut self, boosters: usize) -> Self {
        self.boosters = boosters;
        self
    }

    /// Sets the capacity of the dispatch buffer.
    pub fn with_buffer_capacity(mut self, buffer_capacity: usize) -> Self {
        self.buffer_capacity = buffer_capacity;
        self
    }

    /// Returns the number of fixed workers.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Returns the maximum number of concurrently active boosters.
    pub fn boosters(&self) -> usize {
        self.boosters
    }

    /// Returns the capacity of the dispatch buffer.
    pub fn buffer_capacity(&self) -> usize {
        self.buffer_capacity
    }
}

impl Default for AsyncDispatcherConfiguration {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            boosters: default_boosters(),
            buffer_capacity: default_buffer_capacity(),
        }
    }
}
