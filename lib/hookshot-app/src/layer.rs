use std::{
    fmt::Write as _,
    sync::{
        atomic::{
            AtomicBool,
            Ordering::{AcqRel, Release},
        },
        Arc,
    },
};

use chrono::{DateTime, Utc};
use hookshot_core::{AsyncDispatcher, DeliveryTarget, Levels};
use metrics::{counter, Counter};
use serde::Serialize;
use tracing::{field::Field, Event, Subscriber};
use tracing_subscriber::{layer::Context, Layer};

/// Targets whose events are never forwarded, since they are emitted while delivering records.
const IGNORED_TARGET_PREFIXES: &[&str] = &["hookshot_core", "hookshot_hooks"];

/// A log event, captured for delivery through a hook chain.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct LogRecord {
    /// When the event was logged.
    pub timestamp: DateTime<Utc>,

    /// Log level (e.g., "INFO", "WARN", "ERROR").
    pub level: &'static str,

    /// Target module or component that generated the event.
    pub target: &'static str,

    /// The main log message.
    pub message: String,

    /// Additional structured fields as key-value pairs.
    pub fields: Vec<(&'static str, String)>,

    /// Source file where the event was logged.
    pub file: Option<&'static str>,

    /// Line number where the event was logged.
    pub line: Option<u32>,
}

impl LogRecord {
    /// Creates a `LogRecord` from a `tracing::Event`.
    pub fn from_event(event: &Event<'_>) -> Self {
        let metadata = event.metadata();
        let mut record = Self {
            timestamp: Utc::now(),
            level: metadata.level().as_str(),
            target: metadata.target(),
            message: String::new(),
            fields: Vec::new(),
            file: metadata.file(),
            line: metadata.line(),
        };

        event.record(&mut record);
        record
    }

    /// Returns the value of the structured field `name`, if present.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field_name, _)| *field_name == name)
            .map(|(_, value)| value.as_str())
    }
}

impl tracing::field::Visit for LogRecord {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            self.fields.push((field.name(), format!("{:?}", value)));
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            self.fields.push((field.name(), value.to_string()));
        }
    }
}

/// A `Layer` that forwards log events to an [`AsyncDispatcher`].
///
/// Every event whose level is accepted by the dispatcher's hook chain is captured as a [`LogRecord`] and submitted
/// without waiting. Events emitted by the dispatch machinery itself are skipped, as forwarding them could produce an
/// endless stream of records about delivering records.
///
/// Records the dispatcher rejects are counted, and reported on standard error, since logging them would only feed more
/// events into the same dispatcher. Only the first rejection in an unbroken run of them is reported.
pub struct HookLayer<T> {
    dispatcher: Arc<AsyncDispatcher<LogRecord, T>>,
    levels: Levels,
    rejected: Counter,
    rejecting: AtomicBool,
}

impl<T> HookLayer<T>
where
    T: DeliveryTarget<LogRecord> + 'static,
{
    /// Creates a new `HookLayer` submitting to `dispatcher`.
    ///
    /// The set of forwarded levels is taken from the dispatcher's hook chain when the layer is created.
    pub fn new(dispatcher: Arc<AsyncDispatcher<LogRecord, T>>) -> Self {
        let levels = dispatcher.levels();
        let rejected = counter!("hook_layer_records_rejected_total", "dispatcher" => dispatcher.name().to_string());

        Self {
            dispatcher,
            levels,
            rejected,
            rejecting: AtomicBool::new(false),
        }
    }

    /// Returns the dispatcher this layer submits to.
    pub fn dispatcher(&self) -> &Arc<AsyncDispatcher<LogRecord, T>> {
        &self.dispatcher
    }

    fn submit(&self, event: &Event<'_>) {
        match self.dispatcher.submit(LogRecord::from_event(event)) {
            Ok(()) => self.rejecting.store(false, Release),
            Err(e) => {
                self.rejected.increment(1);
                if !self.rejecting.swap(true, AcqRel) {
                    eprintln!("Failed to submit log record to hook: {}", e);
                }
            }
        }
    }
}

fn is_ignored_target(target: &str) -> bool {
    IGNORED_TARGET_PREFIXES.iter().any(|prefix| {
        target
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
    })
}

impl<S, T> Layer<S> for HookLayer<T>
where
    S: Subscriber,
    T: DeliveryTarget<LogRecord> + 'static,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !self.levels.accepts(metadata.level()) || is_ignored_target(metadata.target()) {
            return;
        }

        self.submit(event);
    }
}
