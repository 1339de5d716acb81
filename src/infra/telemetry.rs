use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Logs go to stderr; stdout carries rendered fragments.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "catalog_fragment_cache_hit_total",
            Unit::Count,
            "Total number of fragment cache hits."
        );
        describe_counter!(
            "catalog_fragment_cache_miss_total",
            Unit::Count,
            "Total number of fragment cache misses."
        );
        describe_counter!(
            "catalog_fragment_cache_store_total",
            Unit::Count,
            "Total number of fragments written to the cache."
        );
        describe_counter!(
            "catalog_fragment_cache_degraded_total",
            Unit::Count,
            "Total number of fragments rendered as degraded pages."
        );
        describe_counter!(
            "catalog_fragment_cache_evict_total",
            Unit::Count,
            "Total number of fragment cache evictions due to capacity."
        );
        describe_counter!(
            "catalog_fragment_cache_invalidated_total",
            Unit::Count,
            "Total number of fragments removed by tag invalidation or flush."
        );
        describe_gauge!(
            "catalog_fragment_event_queue_len",
            Unit::Count,
            "Current number of pending catalog change events in the queue."
        );
        describe_counter!(
            "catalog_fragment_event_dropped_total",
            Unit::Count,
            "Total number of catalog change events dropped due to queue overflow."
        );
        describe_histogram!(
            "catalog_fragment_cache_consume_ms",
            Unit::Milliseconds,
            "Invalidation batch latency in milliseconds."
        );
    });
}
