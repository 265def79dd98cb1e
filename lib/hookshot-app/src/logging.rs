//! Logging.
use hookshot_core::DeliveryTarget;
use hookshot_error::GenericError;
use tracing::{level_filters::LevelFilter, Subscriber};
use tracing_subscriber::{
    layer::SubscriberExt as _, registry::LookupSpan, util::SubscriberInitExt as _, EnvFilter, Layer,
};

use crate::layer::{HookLayer, LogRecord};

const LOG_LEVEL_ENV_VAR: &str = "HOOKSHOT_LOG_LEVEL";
const LOG_FORMAT_JSON_ENV_VAR: &str = "HOOKSHOT_LOG_FORMAT_JSON";

/// Initializes the logging subsystem for `tracing`.
///
/// This function reads the `HOOKSHOT_LOG_LEVEL` environment variable to determine the log level to use. If the
/// environment variable is not set, `default_level` is used, or `INFO` if no default level is given. Additionally, it
/// reads the `HOOKSHOT_LOG_FORMAT_JSON` environment variable to determine which output format to use. If it is set to
/// `true` or `1`, the logs will be formatted as JSON. Otherwise, the logs will default to a human-readable format.
///
/// # Errors
///
/// If the logging subsystem was already initialized, an error will be returned.
pub fn initialize_logging(default_level: Option<LevelFilter>) -> Result<(), GenericError> {
    tracing_subscriber::registry()
        .with(build_console_layer(default_level))
        .try_init()?;

    Ok(())
}

/// Initializes the logging subsystem for `tracing`, additionally forwarding log events to a hook chain.
///
/// Console output is configured exactly as in [`initialize_logging`], and its level filtering does not apply to
/// `hook`: the hook layer forwards whatever levels its dispatcher's hook chain accepts.
///
/// The dispatcher behind `hook` must be started separately, and events logged while it is not running are dropped.
///
/// # Errors
///
/// If the logging subsystem was already initialized, an error will be returned.
pub fn initialize_logging_with_hook<T>(default_level: Option<LevelFilter>, hook: HookLayer<T>) -> Result<(), GenericError>
where
    T: DeliveryTarget<LogRecord> + 'static,
{
    tracing_subscriber::registry()
        .with(build_console_layer(default_level))
        .with(hook)
        .try_init()?;

    Ok(())
}

fn build_console_layer<S>(default_level: Option<LevelFilter>) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    // Load our level filtering directives from the environment, or fallback to the default level if the environment
    // variable is not specified.
    let level_filter = EnvFilter::builder()
        .with_default_directive(default_level.unwrap_or(LevelFilter::INFO).into())
        .with_env_var(LOG_LEVEL_ENV_VAR)
        .from_env_lossy();

    if is_json_format(std::env::var(LOG_FORMAT_JSON_ENV_VAR).ok().as_deref()) {
        tracing_subscriber::fmt::Layer::new()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(level_filter)
            .boxed()
    } else {
        tracing_subscriber::fmt::Layer::new()
            .with_target(true)
            .with_filter(level_filter)
            .boxed()
    }
}

fn is_json_format(value: Option<&str>) -> bool {
    value
        .map(|s| s.trim().to_lowercase())
        .is_some_and(|s| s == "true" || s == "1")
}
