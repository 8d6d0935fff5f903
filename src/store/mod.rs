//! The schedule store: staff, working hours, services, clients, bookings and
//! holds for a single tenant. Query/insert/delete only; availability rules
//! live in the engine.

mod tables;
mod wal_store;

pub use wal_store::WalStore;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use ulid::Ulid;

use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    Wal(std::io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Wal(e)
    }
}

/// Tenant-scoped handle. Every row read or written through one handle belongs
/// to `tenant_id()`; there is no way to name another tenant's rows.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    fn tenant_id(&self) -> &str;

    // ── Staff & services ─────────────────────────────────────

    async fn get_staff(&self, id: Ulid) -> Result<Option<StaffMember>, StoreError>;
    async fn list_staff(&self) -> Result<Vec<StaffMember>, StoreError>;
    async fn save_staff(&self, staff: StaffMember) -> Result<(), StoreError>;

    async fn get_service(&self, id: Ulid) -> Result<Option<ServiceBookingPolicy>, StoreError>;
    async fn save_service(&self, service: ServiceBookingPolicy) -> Result<(), StoreError>;

    async fn assignments_for_service(
        &self,
        service_id: Ulid,
    ) -> Result<Vec<StaffServiceAssignment>, StoreError>;
    async fn save_assignment(&self, assignment: StaffServiceAssignment) -> Result<(), StoreError>;

    // ── Working hours ────────────────────────────────────────

    async fn schedules_for_staff(&self, staff_id: Ulid)
    -> Result<Vec<StaffScheduleEntry>, StoreError>;
    async fn save_schedule(&self, entry: StaffScheduleEntry) -> Result<(), StoreError>;
    async fn remove_schedule(&self, id: Ulid) -> Result<bool, StoreError>;

    // ── Bookings ─────────────────────────────────────────────

    /// Bookings of `staff_id` (any status) whose span intersects `window`.
    async fn bookings_for_staff(
        &self,
        staff_id: Ulid,
        window: Span,
    ) -> Result<Vec<Booking>, StoreError>;
    async fn get_booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError>;
    /// Insert `booking` and, in the same write, delete `consumed_hold`.
    async fn insert_booking(
        &self,
        booking: Booking,
        consumed_hold: Option<Ulid>,
    ) -> Result<(), StoreError>;
    async fn set_booking_status(&self, id: Ulid, status: BookingStatus)
    -> Result<bool, StoreError>;

    // ── Holds ────────────────────────────────────────────────

    /// All holds for the staff member's day, expired ones included.
    async fn holds_for_staff_on(
        &self,
        staff_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<BookingHold>, StoreError>;
    async fn holds_for_session(&self, session_id: &str) -> Result<Vec<BookingHold>, StoreError>;
    async fn get_hold(&self, id: Ulid) -> Result<Option<BookingHold>, StoreError>;
    /// Insert `hold` and, in the same write, drop every other hold of its
    /// session. Returns how many were dropped.
    async fn place_hold(&self, hold: BookingHold) -> Result<usize, StoreError>;
    async fn delete_hold(&self, id: Ulid) -> Result<bool, StoreError>;
    /// Delete holds with `expires_at <= now`.
    async fn delete_expired_holds(&self, now: NaiveDateTime) -> Result<usize, StoreError>;

    // ── Clients ──────────────────────────────────────────────

    async fn get_client(&self, id: Ulid) -> Result<Option<Client>, StoreError>;
    /// Lookup by normalized email.
    async fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, StoreError>;
    async fn save_client(&self, client: Client) -> Result<(), StoreError>;
    async fn list_clients(&self) -> Result<Vec<Client>, StoreError>;
}
