//! Per-service call counters.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
struct Counters {
    calls: u64,
    errors: u64,
    total_time: Duration,
    last_call: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ServiceMetrics {
    pub calls: u64,
    pub errors: u64,
    pub average_time_ms: f64,
    pub error_rate: f64,
    pub last_call: DateTime<Utc>,
}

impl From<Counters> for ServiceMetrics {
    fn from(counters: Counters) -> Self {
        let (average_time_ms, error_rate) = if counters.calls > 0 {
            (
                counters.total_time.as_secs_f64() * 1000.0 / counters.calls as f64,
                counters.errors as f64 / counters.calls as f64,
            )
        } else {
            (0.0, 0.0)
        };

        Self {
            calls: counters.calls,
            errors: counters.errors,
            average_time_ms,
            error_rate,
            last_call: counters.last_call,
        }
    }
}

#[derive(Debug, Default)]
pub struct ServiceMetricsCollector {
    metrics: Mutex<HashMap<String, Counters>>,
}

impl ServiceMetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_call(&self, service: &str, success: bool, duration: Duration) {
        let mut metrics = self.metrics.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = metrics.entry(service.to_string()).or_insert(Counters {
            calls: 0,
            errors: 0,
            total_time: Duration::ZERO,
            last_call: Utc::now(),
        });

        entry.calls += 1;
        entry.total_time += duration;
        entry.last_call = Utc::now();
        if !success {
            entry.errors += 1;
        }
    }

    pub fn service_metrics(&self, service: &str) -> Option<ServiceMetrics> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(service)
            .copied()
            .map(ServiceMetrics::from)
    }

    pub fn all_metrics(&self) -> BTreeMap<String, ServiceMetrics> {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, counters)| (name.clone(), ServiceMetrics::from(*counters)))
            .collect()
    }

    pub fn reset(&self) {
        self.metrics
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn averages_and_error_rate() {
        let collector = ServiceMetricsCollector::new();
        collector.record_call("chat", true, Duration::from_millis(100));
        collector.record_call("chat", false, Duration::from_millis(300));
        collector.record_call("mcp", true, Duration::from_millis(10));

        let chat = collector.service_metrics("chat").unwrap();
        assert_eq!(chat.calls, 2);
        assert_eq!(chat.errors, 1);
        assert!((chat.average_time_ms - 200.0).abs() < f64::EPSILON);
        assert!((chat.error_rate - 0.5).abs() < f64::EPSILON);

        assert_eq!(collector.all_metrics().len(), 2);
        assert!(collector.service_metrics("providers").is_none());
    }

    #[test]
    fn reset_forgets_everything() {
        let collector = ServiceMetricsCollector::new();
        collector.record_call("chat", true, Duration::from_millis(5));
        collector.reset();
        assert!(collector.all_metrics().is_empty());
    }
}
