//! Prometheus metrics for the APIService operator
//!
//! # Exported metrics
//! The `/metrics` endpoint (when built with `--features metrics`) exports the following metrics:
//! - `apiservice_sync_duration_seconds` (histogram): sync cycle duration labeled by controller.
//! - `apiservice_sync_errors_total` (counter): failed sync cycles labeled by controller and kind.
//! - `apiservice_condition_status` (gauge): 1 when the operator condition is True, 0 otherwise.
//! - `apiservice_apply_total` (counter): applies labeled by whether the stored object changed.
//! - `apiservice_delete_total` (counter): delete calls issued for disabled registrations.

use std::sync::atomic::{AtomicI64, AtomicU64};

use once_cell::sync::Lazy;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::{exponential_buckets, Histogram};
use prometheus_client::registry::Registry;

/// Labels for sync metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct SyncLabels {
    /// Controller name, e.g. "apiservice"
    pub controller: String,
}

/// Labels for sync error metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ErrorLabels {
    pub controller: String,
    /// Error kind, e.g. "kube", "aggregate", "shutdown"
    pub kind: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ConditionLabels {
    pub condition: String,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ApplyLabels {
    pub changed: String,
}

/// Histogram tracking sync duration (seconds)
pub static SYNC_DURATION_SECONDS: Lazy<Family<SyncLabels, Histogram>> = Lazy::new(|| {
    fn sync_histogram() -> Histogram {
        // 1ms .. ~32s across 16 buckets.
        Histogram::new(exponential_buckets(0.001, 2.0, 16))
    }

    Family::new_with_constructor(sync_histogram)
});

pub static SYNC_ERRORS_TOTAL: Lazy<Family<ErrorLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static CONDITION_STATUS: Lazy<Family<ConditionLabels, Gauge<i64, AtomicI64>>> =
    Lazy::new(Family::default);

pub static APPLY_TOTAL: Lazy<Family<ApplyLabels, Counter<u64, AtomicU64>>> =
    Lazy::new(Family::default);

pub static DELETE_TOTAL: Lazy<Counter<u64, AtomicU64>> = Lazy::new(Counter::default);

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let mut registry = Registry::default();

    registry.register(
        "apiservice_sync_duration_seconds",
        "Duration of APIService sync cycles in seconds",
        SYNC_DURATION_SECONDS.clone(),
    );
    registry.register(
        "apiservice_sync_errors",
        "Total number of failed APIService sync cycles",
        SYNC_ERRORS_TOTAL.clone(),
    );
    registry.register(
        "apiservice_condition_status",
        "Operator condition status (1 = True, 0 = False or Unknown)",
        CONDITION_STATUS.clone(),
    );
    registry.register(
        "apiservice_apply",
        "APIService applies, labeled by whether the stored object changed",
        APPLY_TOTAL.clone(),
    );
    registry.register(
        "apiservice_delete",
        "Delete calls issued for disabled APIServices",
        DELETE_TOTAL.clone(),
    );

    registry
});

pub fn observe_sync_duration_seconds(controller: &str, seconds: f64) {
    SYNC_DURATION_SECONDS
        .get_or_create(&SyncLabels {
            controller: controller.to_string(),
        })
        .observe(seconds);
}

pub fn inc_sync_error(controller: &str, kind: &str) {
    SYNC_ERRORS_TOTAL
        .get_or_create(&ErrorLabels {
            controller: controller.to_string(),
            kind: kind.to_string(),
        })
        .inc();
}

pub fn set_condition_status(condition: &str, is_true: bool) {
    CONDITION_STATUS
        .get_or_create(&ConditionLabels {
            condition: condition.to_string(),
        })
        .set(i64::from(is_true));
}

pub fn inc_apply(changed: bool) {
    APPLY_TOTAL
        .get_or_create(&ApplyLabels {
            changed: changed.to_string(),
        })
        .inc();
}

pub fn inc_delete() {
    DELETE_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::encoding::text::encode;

    fn condition_gauge(condition: &str) -> i64 {
        CONDITION_STATUS
            .get_or_create(&ConditionLabels {
                condition: condition.to_string(),
            })
            .get()
    }

    #[test]
    fn test_set_condition_status() {
        set_condition_status("MetricsTestCondition", true);
        assert_eq!(condition_gauge("MetricsTestCondition"), 1);

        set_condition_status("MetricsTestCondition", false);
        assert_eq!(condition_gauge("MetricsTestCondition"), 0);
    }

    #[test]
    fn test_sync_error_counter() {
        inc_sync_error("apiservice-test", "kube");
        inc_sync_error("apiservice-test", "kube");
        let count = SYNC_ERRORS_TOTAL
            .get_or_create(&ErrorLabels {
                controller: "apiservice-test".to_string(),
                kind: "kube".to_string(),
            })
            .get();
        assert!(count >= 2);
    }

    #[test]
    fn test_registry_registration() {
        observe_sync_duration_seconds("apiservice", 0.25);
        let mut buffer = String::new();
        encode(&mut buffer, &REGISTRY).unwrap();
        assert!(buffer.contains("apiservice_sync_duration_seconds"));
        assert!(buffer.contains("apiservice_condition_status"));
    }
}
