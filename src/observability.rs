use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: appointments committed.
pub const BOOKINGS_TOTAL: &str = "chairside_bookings_total";

/// Counter: booking attempts rejected for a scheduling conflict
/// (block overlap, appointment overlap, or exact-start collision).
pub const BOOKING_CONFLICTS_TOTAL: &str = "chairside_booking_conflicts_total";

/// Counter: appointments canceled.
pub const CANCELLATIONS_TOTAL: &str = "chairside_cancellations_total";

/// Counter: availability queries served.
pub const AVAILABILITY_QUERIES_TOTAL: &str = "chairside_availability_queries_total";

/// Counter: schedule upserts committed.
pub const SCHEDULE_UPSERTS_TOTAL: &str = "chairside_schedule_upserts_total";

/// Counter: blocks committed.
pub const BLOCKS_ADDED_TOTAL: &str = "chairside_blocks_added_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "chairside_tenants_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "chairside_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "chairside_wal_flush_batch_size";

/// Install the global fmt tracing subscriber. Embedding binaries call this
/// once at startup, before any engine is created.
pub fn init_tracing() {
    tracing_subscriber::fmt::init();
}

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
