//! Service health checks and the periodic monitor built on them.

use crate::api::{ApiClient, ServiceError};
use crate::services::factory::ServiceFactory;
use crate::services::{ChatService, McpService, ProviderService, SystemPromptService};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(60);

/// A component that can report whether its backend surface is reachable.
#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check_health(&self) -> Result<bool, ServiceError>;
}

#[async_trait::async_trait]
impl HealthCheck for ApiClient {
    async fn check_health(&self) -> Result<bool, ServiceError> {
        let response = self.health().await?;
        Ok(response.success)
    }
}

#[async_trait::async_trait]
impl HealthCheck for ChatService {
    async fn check_health(&self) -> Result<bool, ServiceError> {
        self.get_chat_list(1, 1).await.map(|_| true)
    }
}

#[async_trait::async_trait]
impl HealthCheck for ProviderService {
    async fn check_health(&self) -> Result<bool, ServiceError> {
        self.get_providers().await.map(|_| true)
    }
}

#[async_trait::async_trait]
impl HealthCheck for McpService {
    async fn check_health(&self) -> Result<bool, ServiceError> {
        self.get_status().await.map(|_| true)
    }
}

#[async_trait::async_trait]
impl HealthCheck for SystemPromptService {
    async fn check_health(&self) -> Result<bool, ServiceError> {
        self.get_active_prompt().await.map(|_| true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceHealthReport {
    pub healthy: bool,
    pub last_check: DateTime<Utc>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HealthSummary {
    pub overall: bool,
    pub services: BTreeMap<String, ServiceHealthReport>,
}

/// Runs registered health checks and remembers the latest result per service.
#[derive(Default)]
pub struct ServiceHealthMonitor {
    checks: Vec<(String, Arc<dyn HealthCheck>)>,
    reports: Mutex<BTreeMap<String, ServiceHealthReport>>,
}

impl ServiceHealthMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Monitor covering the transport and every domain service of `factory`.
    pub fn for_factory(factory: &ServiceFactory) -> Self {
        let mut monitor = Self::new();
        monitor.register("api", factory.api_client());
        monitor.register("chat", factory.chat_service());
        monitor.register("provider", factory.provider_service());
        monitor.register("mcp", factory.mcp_service());
        monitor.register("systemPrompt", factory.system_prompt_service());
        monitor
    }

    pub fn register(&mut self, name: impl Into<String>, check: Arc<dyn HealthCheck>) {
        self.checks.push((name.into(), check));
    }

    /// Checks every registered service concurrently.
    ///
    /// `overall` is true only when every service reported healthy.
    pub async fn check_all_services(&self) -> HealthSummary {
        let results = futures_util::future::join_all(self.checks.iter().map(
            |(name, check)| async move { (name.clone(), check.check_health().await) },
        ))
        .await;

        let mut services = BTreeMap::new();
        for (name, result) in results {
            let report = match result {
                Ok(healthy) => ServiceHealthReport {
                    healthy,
                    last_check: Utc::now(),
                    error: None,
                },
                Err(err) => {
                    warn!(service = %name, error = %err, "Health check failed");
                    ServiceHealthReport {
                        healthy: false,
                        last_check: Utc::now(),
                        error: Some(err.to_string()),
                    }
                }
            };
            services.insert(name, report);
        }

        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(services.clone());

        HealthSummary {
            overall: services.values().all(|report| report.healthy),
            services,
        }
    }

    pub fn health_status(&self) -> BTreeMap<String, bool> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, report)| (name.clone(), report.healthy))
            .collect()
    }

    pub fn last_health_checks(&self) -> BTreeMap<String, DateTime<Utc>> {
        self.reports
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(name, report)| (name.clone(), report.last_check))
            .collect()
    }

    /// Re-runs all checks every `interval` until the returned token is cancelled.
    pub fn start_periodic_checks(self: &Arc<Self>, interval: Duration) -> CancellationToken {
        let token = CancellationToken::new();
        let cancel = token.clone();
        let monitor = Arc::clone(self);

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Periodic health checks stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        let summary = monitor.check_all_services().await;
                        debug!(overall = summary.overall, "Periodic health check finished");
                    }
                }
            }
        });

        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Fixed(bool);

    #[async_trait::async_trait]
    impl HealthCheck for Fixed {
        async fn check_health(&self) -> Result<bool, ServiceError> {
            Ok(self.0)
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl HealthCheck for Failing {
        async fn check_health(&self) -> Result<bool, ServiceError> {
            Err(ServiceError::Server)
        }
    }

    struct Counting(Arc<AtomicU32>);

    #[async_trait::async_trait]
    impl HealthCheck for Counting {
        async fn check_health(&self) -> Result<bool, ServiceError> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(true)
        }
    }

    #[tokio::test]
    async fn overall_requires_every_service_healthy() {
        let mut monitor = ServiceHealthMonitor::new();
        monitor.register("api", Arc::new(Fixed(true)));
        monitor.register("chat", Arc::new(Fixed(true)));

        let summary = monitor.check_all_services().await;
        assert!(summary.overall);

        monitor.register("mcp", Arc::new(Failing));
        let summary = monitor.check_all_services().await;
        assert!(!summary.overall);
        let mcp = &summary.services["mcp"];
        assert!(!mcp.healthy);
        assert_eq!(
            mcp.error.as_deref(),
            Some("Server error - please try again later")
        );

        let status = monitor.health_status();
        assert_eq!(status.get("api"), Some(&true));
        assert_eq!(status.get("mcp"), Some(&false));
        assert_eq!(monitor.last_health_checks().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_checks_stop_when_cancelled() {
        let calls = Arc::new(AtomicU32::new(0));
        let mut monitor = ServiceHealthMonitor::new();
        monitor.register("api", Arc::new(Counting(Arc::clone(&calls))));
        let monitor = Arc::new(monitor);

        let token = monitor.start_periodic_checks(Duration::from_secs(10));
        tokio::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        token.cancel();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
