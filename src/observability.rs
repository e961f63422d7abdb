use std::net::SocketAddr;

use crate::model::BookingStatus;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: bookings created. Labels: status.
pub const BOOKINGS_CREATED_TOTAL: &str = "lodgic_bookings_created_total";

/// Counter: create attempts rejected because the dates were taken.
pub const BOOKING_CONFLICTS_TOTAL: &str = "lodgic_booking_conflicts_total";

/// Counter: status transitions applied. Labels: to.
pub const STATUS_TRANSITIONS_TOTAL: &str = "lodgic_status_transitions_total";

// ── Store metrics ───────────────────────────────────────────────

/// Histogram: journal group-commit flush duration in seconds.
pub const JOURNAL_FLUSH_DURATION_SECONDS: &str = "lodgic_journal_flush_duration_seconds";

/// Histogram: journal group-commit batch size (events per flush).
pub const JOURNAL_FLUSH_BATCH_SIZE: &str = "lodgic_journal_flush_batch_size";

/// Install the Prometheus metrics exporter on the given port. No-op if
/// `port` is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}

/// Map a booking status to a static label for metrics.
pub fn status_label(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "pending",
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::Cancelled => "cancelled",
        BookingStatus::Completed => "completed",
        BookingStatus::Rejected => "rejected",
    }
}
