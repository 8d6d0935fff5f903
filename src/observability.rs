use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::sql::Command;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total queries executed. Labels: command, status.
pub const QUERIES_TOTAL: &str = "chairtime_queries_total";

/// Histogram: query latency in seconds. Labels: command.
pub const QUERY_DURATION_SECONDS: &str = "chairtime_query_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: active TCP connections.
pub const CONNECTIONS_ACTIVE: &str = "chairtime_connections_active";

/// Counter: total connections accepted.
pub const CONNECTIONS_TOTAL: &str = "chairtime_connections_total";

/// Counter: connections rejected due to limit.
pub const CONNECTIONS_REJECTED_TOTAL: &str = "chairtime_connections_rejected_total";

/// Gauge: number of active tenants (loaded engines).
pub const TENANTS_ACTIVE: &str = "chairtime_tenants_active";

/// Histogram: WAL append + fsync duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "chairtime_wal_flush_duration_seconds";

// ── Booking flow ────────────────────────────────────────────────

/// Counter: holds placed.
pub const HOLDS_PLACED_TOTAL: &str = "chairtime_holds_placed_total";

/// Counter: hold attempts rejected because the slot was taken.
pub const HOLD_CONFLICTS_TOTAL: &str = "chairtime_hold_conflicts_total";

/// Counter: expired holds deleted by the reaper.
pub const HOLDS_REAPED_TOTAL: &str = "chairtime_holds_reaped_total";

/// Counter: bookings created from holds.
pub const BOOKINGS_CONFIRMED_TOTAL: &str = "chairtime_bookings_confirmed_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a Command variant to a short label for metrics.
pub fn command_label(cmd: &Command) -> &'static str {
    match cmd {
        Command::InsertStaff { .. } => "insert_staff",
        Command::InsertService { .. } => "insert_service",
        Command::InsertAssignment { .. } => "insert_assignment",
        Command::InsertSchedule { .. } => "insert_schedule",
        Command::DeleteSchedule { .. } => "delete_schedule",
        Command::InsertHold { .. } => "insert_hold",
        Command::DeleteHold { .. } => "delete_hold",
        Command::InsertBooking { .. } => "insert_booking",
        Command::SelectSlots { .. } => "select_slots",
        Command::SelectCalendar { .. } => "select_calendar",
    }
}
