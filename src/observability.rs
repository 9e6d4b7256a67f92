use std::net::SocketAddr;

use crate::engine::BookingError;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: reservations committed.
pub const BOOKINGS_TOTAL: &str = "gymslot_bookings_total";

/// Counter: booking requests rejected. Labels: reason.
pub const BOOKING_REJECTIONS_TOTAL: &str = "gymslot_booking_rejections_total";

/// Counter: reservations cancelled.
pub const CANCELLATIONS_TOTAL: &str = "gymslot_cancellations_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: reservations currently held in the store.
pub const RESERVATIONS_ACTIVE: &str = "gymslot_reservations_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "gymslot_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "gymslot_wal_flush_batch_size";

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

/// Map a rejection to a short label for metrics.
pub fn rejection_label(err: &BookingError) -> &'static str {
    match err {
        BookingError::InvalidReference(_) => "invalid_reference",
        BookingError::MalformedRequest(_) => "malformed_request",
        BookingError::DateOutOfRange { .. } => "date_out_of_range",
        BookingError::DailyLimitExceeded { .. } => "daily_limit_exceeded",
        BookingError::ConsecutiveLimitExceeded { .. } => "consecutive_limit_exceeded",
        BookingError::EquipmentUnavailable { .. } => "equipment_unavailable",
        BookingError::Conflict { .. } => "conflict",
        BookingError::NotFound(_) => "not_found",
        BookingError::Storage(_) => "storage",
    }
}
