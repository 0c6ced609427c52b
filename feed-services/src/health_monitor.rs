//! Upstream health monitoring
//!
//! Every monitored endpoint gets its own probe task. Probe failures,
//! timeouts and panics all become unhealthy results; a monitoring pass
//! itself never fails.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use feed_core::{AggregateHealth, HealthBand, HealthPolicy, HealthProbeResult, ProbeSpec};
use futures::stream::{self, StreamExt};
use reqwest::{Client, Method};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Executes a single health probe
#[async_trait]
pub trait Probe: Send + Sync {
    async fn probe(&self, spec: &ProbeSpec) -> HealthProbeResult;
}

/// Probe that issues the configured HTTP request
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn probe(&self, spec: &ProbeSpec) -> HealthProbeResult {
        let method = match Method::from_bytes(spec.method.to_uppercase().as_bytes()) {
            Ok(method) => method,
            Err(_) => {
                return HealthProbeResult::failed(
                    &spec.name,
                    format!("invalid method {}", spec.method),
                )
            }
        };

        let start = Instant::now();
        match self.client.request(method, &spec.url).send().await {
            Ok(response) => {
                let latency_ms = start.elapsed().as_secs_f64() * 1000.0;
                HealthProbeResult::responded(
                    &spec.name,
                    response.status().as_u16(),
                    spec.expected_status,
                    latency_ms,
                )
            }
            Err(e) if e.is_timeout() => HealthProbeResult::timed_out(&spec.name),
            Err(e) => HealthProbeResult::failed(&spec.name, e.to_string()),
        }
    }
}

/// Configuration for the HealthMonitor
#[derive(Debug, Clone, Copy)]
pub struct HealthMonitorConfig {
    pub probe_timeout: Duration,
    /// Maximum probes in flight; `None` runs every probe at once
    pub max_concurrency: Option<usize>,
    pub policy: HealthPolicy,
}

impl Default for HealthMonitorConfig {
    fn default() -> Self {
        Self {
            probe_timeout: Duration::from_secs(10),
            max_concurrency: None,
            policy: HealthPolicy::default(),
        }
    }
}

/// Fans out probes over the monitored endpoints and aggregates the results
pub struct HealthMonitor {
    probe: Arc<dyn Probe>,
    endpoints: Vec<ProbeSpec>,
    config: HealthMonitorConfig,
}

impl HealthMonitor {
    pub fn new(client: Client, endpoints: Vec<ProbeSpec>, config: HealthMonitorConfig) -> Self {
        Self::with_probe(Arc::new(HttpProbe::new(client)), endpoints, config)
    }

    pub fn with_probe(
        probe: Arc<dyn Probe>,
        endpoints: Vec<ProbeSpec>,
        config: HealthMonitorConfig,
    ) -> Self {
        Self {
            probe,
            endpoints,
            config,
        }
    }

    pub fn endpoints(&self) -> &[ProbeSpec] {
        &self.endpoints
    }

    pub fn classify(&self, health: &AggregateHealth) -> HealthBand {
        self.config.policy.classify(health)
    }

    /// Probe every configured endpoint
    pub async fn check_all(&self) -> AggregateHealth {
        self.check_endpoints(&self.endpoints, self.config.probe_timeout)
            .await
    }

    /// Probe the given endpoints concurrently and wait for all of them
    pub async fn check_endpoints(
        &self,
        endpoints: &[ProbeSpec],
        per_probe_timeout: Duration,
    ) -> AggregateHealth {
        let limit = self
            .config
            .max_concurrency
            .unwrap_or(endpoints.len())
            .max(1);

        let results: Vec<HealthProbeResult> = stream::iter(endpoints.iter().cloned())
            .map(|spec| run_probe(Arc::clone(&self.probe), spec, per_probe_timeout))
            .buffer_unordered(limit)
            .collect()
            .await;

        for result in results.iter().filter(|r| !r.healthy) {
            warn!(
                "[HEALTH] {} unhealthy: {}",
                result.service_name,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        let health = AggregateHealth::from_results(results);
        info!(
            "[HEALTH] {}/{} services healthy ({:.1}%)",
            health.healthy, health.total, health.percentage
        );
        health
    }

    /// Run a pass now and then every `every`, publishing each snapshot
    ///
    /// The receiver holds `None` until the first pass completes.
    pub fn spawn_periodic(
        self: Arc<Self>,
        every: Duration,
    ) -> (watch::Receiver<Option<AggregateHealth>>, JoinHandle<()>) {
        let (tx, rx) = watch::channel(None);

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                let health = self.check_all().await;
                let band = self.classify(&health);
                debug!("[HEALTH] periodic pass complete: {:?}", band);
                tx.send_replace(Some(health));
            }
        });

        (rx, handle)
    }
}

/// Run one probe in its own task so a panic only affects its own result
async fn run_probe(
    probe: Arc<dyn Probe>,
    spec: ProbeSpec,
    per_probe_timeout: Duration,
) -> HealthProbeResult {
    let name = spec.name.clone();

    let task = tokio::spawn(async move {
        match tokio::time::timeout(per_probe_timeout, probe.probe(&spec)).await {
            Ok(result) => result,
            Err(_) => HealthProbeResult::timed_out(&spec.name),
        }
    });

    match task.await {
        Ok(result) => result,
        Err(e) => HealthProbeResult::failed(name, format!("probe task failed: {}", e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn upstream() -> Router {
        Router::new()
            .route("/ok", get(|| async { "ok" }))
            .route(
                "/slow",
                get(|| async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    "late"
                }),
            )
            .route("/down", get(|| async { StatusCode::SERVICE_UNAVAILABLE }))
    }

    fn monitor(endpoints: Vec<ProbeSpec>) -> HealthMonitor {
        HealthMonitor::new(
            Client::new(),
            endpoints,
            HealthMonitorConfig {
                probe_timeout: Duration::from_millis(500),
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_fast_and_timed_out_probe() {
        let base = serve(upstream()).await;
        let monitor = monitor(vec![
            ProbeSpec::get("svcA", format!("{}/ok", base)),
            ProbeSpec::get("svcB", format!("{}/slow", base)),
        ]);

        let health = monitor.check_all().await;

        assert_eq!(health.total, 2);
        assert_eq!(health.healthy, 1);
        assert_eq!(health.percentage, 50.0);
        assert!(!health.overall_healthy);
        assert!(health.results["svcA"].healthy);
        assert_eq!(health.results["svcA"].status_code, Some(200));
        assert!(health.results["svcA"].latency_ms.is_some());
        assert!(!health.results["svcB"].healthy);
        assert_eq!(health.results["svcB"].error.as_deref(), Some("timeout"));
        assert_eq!(monitor.classify(&health), HealthBand::Degraded);
    }

    #[tokio::test]
    async fn test_unexpected_status_and_refused_connection() {
        let base = serve(upstream()).await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let closed = listener.local_addr().unwrap();
        drop(listener);

        let monitor = monitor(vec![
            ProbeSpec::get("down", format!("{}/down", base)),
            ProbeSpec::get("gone", format!("http://{}/", closed)),
            ProbeSpec {
                name: "teapot".to_string(),
                url: format!("{}/down", base),
                method: "GET".to_string(),
                expected_status: 503,
            },
        ]);

        let health = monitor.check_all().await;
        assert_eq!(health.total, 3);
        assert_eq!(health.healthy, 1);
        assert_eq!(health.results["down"].status_code, Some(503));
        assert!(health.results["gone"].status_code.is_none());
        assert!(health.results["gone"].error.is_some());
        assert!(health.results["teapot"].healthy);
    }

    #[tokio::test]
    async fn test_empty_endpoint_set() {
        let health = monitor(Vec::new()).check_all().await;
        assert_eq!(health.total, 0);
        assert_eq!(health.percentage, 0.0);
        assert!(!health.overall_healthy);
    }

    struct Panicky;

    #[async_trait]
    impl Probe for Panicky {
        async fn probe(&self, spec: &ProbeSpec) -> HealthProbeResult {
            if spec.name == "boom" {
                panic!("probe exploded");
            }
            HealthProbeResult::responded(&spec.name, 200, 200, 1.0)
        }
    }

    #[tokio::test]
    async fn test_probe_panic_becomes_unhealthy_result() {
        let monitor = HealthMonitor::with_probe(
            Arc::new(Panicky),
            vec![
                ProbeSpec::get("boom", "http://unused"),
                ProbeSpec::get("fine", "http://unused"),
            ],
            HealthMonitorConfig::default(),
        );

        let health = monitor.check_all().await;
        assert_eq!(health.total, 2);
        assert_eq!(health.healthy, 1);
        assert!(!health.results["boom"].healthy);
        assert!(health.results["boom"].error.is_some());
    }

    struct Counting {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl Probe for Counting {
        async fn probe(&self, spec: &ProbeSpec) -> HealthProbeResult {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(50)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            HealthProbeResult::responded(&spec.name, 200, 200, 50.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound() {
        let probe = Arc::new(Counting {
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });
        let endpoints = (0..6)
            .map(|i| ProbeSpec::get(format!("svc{}", i), "http://unused"))
            .collect();
        let monitor = HealthMonitor::with_probe(
            probe.clone(),
            endpoints,
            HealthMonitorConfig {
                max_concurrency: Some(2),
                ..Default::default()
            },
        );

        let health = monitor.check_all().await;
        assert_eq!(health.healthy, 6);
        assert!(health.overall_healthy);
        assert_eq!(probe.peak.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_periodic_publishes_snapshots() {
        let monitor = Arc::new(HealthMonitor::with_probe(
            Arc::new(Panicky),
            vec![ProbeSpec::get("fine", "http://unused")],
            HealthMonitorConfig::default(),
        ));

        let (mut rx, handle) = monitor.spawn_periodic(Duration::from_secs(60));
        assert!(rx.borrow().is_none());

        rx.changed().await.unwrap();
        let first = rx.borrow().clone().unwrap();
        assert!(first.overall_healthy);

        rx.changed().await.unwrap();
        let second = rx.borrow().clone().unwrap();
        assert!(second.checked_at >= first.checked_at);

        handle.abort();
    }
}
