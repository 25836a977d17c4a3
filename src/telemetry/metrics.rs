//! Prometheus metrics setup and metric definitions

use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use sqlx::MySqlPool;
use std::time::Duration;

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let buckets = [
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so the
/// exposition includes HELP/TYPE lines from startup.
pub fn describe_metrics() {
    describe_counter!("payroll_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "payroll_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "payroll_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    describe_counter!(
        "payroll_mediator_dispatch_total",
        "Mediator dispatches by request type and outcome"
    );
    describe_counter!(
        "payroll_transactions_total",
        "Outermost transactions by outcome"
    );
    describe_counter!(
        "payroll_post_commit_hooks_total",
        "Post-commit hook executions by outcome"
    );
    describe_counter!(
        "payroll_events_delivered_total",
        "Event deliveries to subscribers by event and outcome"
    );
    describe_counter!("payroll_auth_login_total", "Login attempts by result");

    describe_gauge!(
        "payroll_db_pool_connections_active",
        "Number of active database connections"
    );
    describe_gauge!(
        "payroll_db_pool_connections_idle",
        "Number of idle database connections"
    );

    counter!("payroll_auth_login_total", "result" => "success").absolute(0);
    counter!("payroll_auth_login_total", "result" => "failure").absolute(0);
    gauge!("payroll_http_requests_in_flight").set(0.0);
}

/// Sample pool usage every `interval` until the pool is closed.
pub fn spawn_pool_metrics(pool: MySqlPool, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            if pool.is_closed() {
                break;
            }
            let size = pool.size() as f64;
            let idle = pool.num_idle() as f64;
            gauge!("payroll_db_pool_connections_active").set(size - idle);
            gauge!("payroll_db_pool_connections_idle").set(idle);
        }
    });
}
