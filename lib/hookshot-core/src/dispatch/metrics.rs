use metrics::{counter, gauge, histogram, Counter, Gauge, Histogram};

/// Telemetry for a single dispatcher, tagged with its name.
pub(crate) struct DispatcherMetrics {
    accepted: Counter,
    boosted: Counter,
    rejected_not_running: Counter,
    rejected_buffer_full: Counter,
    delivered: Counter,
    delivery_errors: Counter,
    active_boosters: Gauge,
    delivery_latency: Histogram,
}

impl DispatcherMetrics {
    pub fn new(dispatcher_name: &str) -> Self {
        Self {
            accepted: counter!("dispatcher_messages_accepted_total", "dispatcher" => dispatcher_name.to_string()),
            boosted: counter!("dispatcher_boosters_spawned_total", "dispatcher" => dispatcher_name.to_string()),
            rejected_not_running: counter!(
                "dispatcher_messages_rejected_total",
                "dispatcher" => dispatcher_name.to_string(),
                "reason" => "not_running"
            ),
            rejected_buffer_full: counter!(
                "dispatcher_messages_rejected_total",
                "dispatcher" => dispatcher_name.to_string(),
                "reason" => "buffer_full"
            ),
            delivered: counter!("dispatcher_messages_delivered_total", "dispatcher" => dispatcher_name.to_string()),
            delivery_errors: counter!("dispatcher_delivery_errors_total", "dispatcher" => dispatcher_name.to_string()),
            active_boosters: gauge!("dispatcher_boosters_active", "dispatcher" => dispatcher_name.to_string()),
            delivery_latency: histogram!(
                "dispatcher_delivery_latency_seconds",
                "dispatcher" => dispatcher_name.to_string()
            ),
        }
    }

    pub fn accepted(&self) -> &Counter {
        &self.accepted
    }

    pub fn boosted(&self) -> &Counter {
        &self.boosted
    }

    pub fn rejected_not_running(&self) -> &Counter {
        &self.rejected_not_running
    }

    pub fn rejected_buffer_full(&self) -> &Counter {
        &self.rejected_buffer_full
    }

    pub fn delivered(&self) -> &Counter {
        &self.delivered
    }

    pub fn delivery_errors(&self) -> &Counter {
        &self.delivery_errors
    }

    pub fn active_boosters(&self) -> &Gauge {
        &self.active_boosters
    }

    pub fn delivery_latency(&self) -> &Histogram {
        &self.delivery_latency
    }
}
