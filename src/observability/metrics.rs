//! Metrics collection and exposition.
//!
//! # Metrics
//! - `site_pages_served_total` (counter): rendered pages by path
//! - `site_csp_reports_total` (counter): CSP violation reports by directive
//! - `site_consent_choices_total` (counter): no-JS consent submissions by choice
//!
//! # Design Decisions
//! - Recording is a no-op until an exporter is installed
//! - Labels are low-cardinality (fixed directive vocabulary, fixed choices)

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_page_served(path: &str) {
    counter!("site_pages_served_total", "path" => path.to_string()).increment(1);
}

pub fn record_csp_report(directive: &str) {
    counter!("site_csp_reports_total", "directive" => directive.to_string()).increment(1);
}

pub fn record_consent_choice(choice: &'static str) {
    counter!("site_consent_choices_total", "choice" => choice).increment(1);
}
