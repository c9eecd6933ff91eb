//! Prometheus metrics for the conference service.
//!
//! The service records through the `metrics` facade; [`MetricsServer`]
//! installs the Prometheus recorder and renders the scrape payload. The
//! HTTP listener that serves it lives in the web crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use conference_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let payload = server.render();
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

/// Errors from metrics setup.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build the exporter.
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install the recorder.
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its scrape endpoint is served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a server for `addr`. Nothing is installed until [`start`](Self::start).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should be served on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe all metrics and install the Prometheus recorder.
    ///
    /// A recorder that is already installed (several servers in one test
    /// process) is tolerated; [`render`](Self::render) then returns `None`.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError`] if the exporter cannot be built or installed.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// The installed recorder handle.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Current metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_counter!(
        "conference_registrations_total",
        "Registration attempts by outcome"
    );
    describe_counter!(
        "conference_unregistrations_total",
        "Unregistration attempts by outcome"
    );
    describe_counter!(
        "conference_transaction_conflicts_total",
        "Optimistic commits rejected because an entity changed concurrently"
    );
    describe_histogram!(
        "conference_registration_duration_seconds",
        "Time to complete a registration including retries"
    );
    describe_counter!(
        "conference_wishlist_additions_total",
        "Wishlist additions by outcome"
    );
    describe_counter!(
        "conference_notifications_enqueued_total",
        "Background notifications accepted by the queue"
    );
    describe_counter!(
        "conference_notifications_dropped_total",
        "Background notifications the queue refused"
    );
    describe_gauge!(
        "conference_nearly_sold_out",
        "Conferences with between one and five seats left at the last refresh"
    );
}

/// Registration engine metrics.
pub struct RegistrationMetrics;

impl RegistrationMetrics {
    /// Record a finished registration.
    pub fn record_registration(outcome: &'static str, duration: Duration) {
        counter!("conference_registrations_total", "outcome" => outcome).increment(1);
        histogram!("conference_registration_duration_seconds").record(duration.as_secs_f64());
    }

    /// Record a finished unregistration.
    pub fn record_unregistration(outcome: &'static str) {
        counter!("conference_unregistrations_total", "outcome" => outcome).increment(1);
    }

    /// Record a commit rejected by a concurrent write.
    pub fn record_conflict(operation: &'static str) {
        counter!("conference_transaction_conflicts_total", "operation" => operation).increment(1);
    }
}

/// Wishlist metrics.
pub struct WishlistMetrics;

impl WishlistMetrics {
    /// Record a wishlist addition attempt.
    pub fn record_addition(outcome: &'static str) {
        counter!("conference_wishlist_additions_total", "outcome" => outcome).increment(1);
    }
}

/// Background notification metrics.
pub struct NotificationMetrics;

impl NotificationMetrics {
    /// Record an accepted notification.
    pub fn record_enqueued(kind: &'static str) {
        counter!("conference_notifications_enqueued_total", "kind" => kind).increment(1);
    }

    /// Record a refused notification.
    pub fn record_dropped() {
        counter!("conference_notifications_dropped_total").increment(1);
    }
}

/// Announcement metrics.
pub struct AnnouncementMetrics;

impl AnnouncementMetrics {
    /// Record how many conferences are nearly sold out.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_nearly_sold_out(count: usize) {
        gauge!("conference_nearly_sold_out").set(count as f64);
    }
}
