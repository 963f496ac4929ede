/// Prometheus metrics for the party server.
///
/// Counters only observe; nothing in here can alter a request outcome.
use crate::commands::CommandType;
use crate::model::ModuleId;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use prometheus_client::encoding::{EncodeLabelSet, text::encode};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;
use std::sync::Arc;

/// Global metrics registry instance
pub static METRICS: Lazy<Arc<MetricsCollector>> = Lazy::new(|| Arc::new(MetricsCollector::new()));

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    /// Module name (e.g. "locations", "tokens")
    pub module: String,
    /// Request outcome ("success", "error")
    pub outcome: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    /// Error category from the status taxonomy
    pub category: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct CommandLabels {
    pub command: String,
    /// "responded", "not_supported", "timeout", "failed"
    pub outcome: String,
}

pub struct MetricsCollector {
    registry: RwLock<Registry>,
    pub requests_total: Family<RequestLabels, Counter>,
    pub errors_total: Family<ErrorLabels, Counter>,
    pub commands_total: Family<CommandLabels, Counter>,
    pub stale_writes_total: Counter,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let requests_total = Family::<RequestLabels, Counter>::default();
        registry.register(
            "ocpi_requests",
            "Module requests by outcome",
            requests_total.clone(),
        );

        let errors_total = Family::<ErrorLabels, Counter>::default();
        registry.register(
            "ocpi_errors",
            "Request errors by category",
            errors_total.clone(),
        );

        let commands_total = Family::<CommandLabels, Counter>::default();
        registry.register(
            "ocpi_commands",
            "Dispatched commands by outcome",
            commands_total.clone(),
        );

        let stale_writes_total = Counter::default();
        registry.register(
            "ocpi_stale_writes",
            "Writes rejected by the downgrade rule",
            stale_writes_total.clone(),
        );

        Self {
            registry: RwLock::new(registry),
            requests_total,
            errors_total,
            commands_total,
            stale_writes_total,
        }
    }

    pub fn record_request(&self, module: ModuleId, outcome: &str) {
        self.requests_total
            .get_or_create(&RequestLabels {
                module: module.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    pub fn record_error(&self, category: &str) {
        if category == "stale_write" {
            self.stale_writes_total.inc();
        }
        self.errors_total
            .get_or_create(&ErrorLabels {
                category: category.to_string(),
            })
            .inc();
    }

    pub fn record_command(&self, command: CommandType, outcome: &str) {
        self.commands_total
            .get_or_create(&CommandLabels {
                command: command.to_string(),
                outcome: outcome.to_string(),
            })
            .inc();
    }

    /// Encode all metrics in Prometheus text format
    pub fn encode(&self) -> String {
        let registry = self.registry.read();
        let mut buffer = String::new();
        if encode(&mut buffer, &registry).is_err() {
            return String::new();
        }
        buffer
    }
}
