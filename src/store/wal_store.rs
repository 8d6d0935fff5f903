use std::path::Path;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use tokio::sync::Mutex;
use tracing::debug;
use ulid::Ulid;

use crate::model::*;

use super::tables::Tables;
use super::{ScheduleStore, StoreError};

/// `ScheduleStore` backed by in-memory tables and a per-tenant WAL.
///
/// Each mutation is appended and fsynced before it is applied, while the WAL
/// lock is held, so the log order always matches the order rows changed in.
pub struct WalStore {
    tenant_id: TenantId,
    wal: Mutex<crate::wal::Wal>,
    tables: Tables,
}

impl WalStore {
    /// Replay `wal_path` (if present) and open it for appending.
    pub fn open(tenant_id: impl Into<TenantId>, wal_path: &Path) -> std::io::Result<Self> {
        let (events, wal) = crate::wal::Wal::recover(wal_path)?;
        let tables = Tables::default();
        for event in &events {
            tables.apply(event);
        }
        let tenant_id = tenant_id.into();
        debug!("tenant {tenant_id}: replayed {} WAL records", events.len());
        Ok(Self {
            tenant_id,
            wal: Mutex::new(wal),
            tables,
        })
    }

    async fn commit(&self, event: Event) -> Result<(), StoreError> {
        let mut wal = self.wal.lock().await;
        let flush_start = std::time::Instant::now();
        wal.append(&event)?;
        metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
            .record(flush_start.elapsed().as_secs_f64());
        self.tables.apply(&event);
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> u64 {
        self.wal.lock().await.appends_since_compact()
    }

    /// Rewrite the WAL as a snapshot of the current rows.
    pub async fn compact(&self) -> Result<usize, StoreError> {
        let mut wal = self.wal.lock().await;
        let events = self.tables.snapshot();
        wal.compact(&events)?;
        Ok(events.len())
    }
}

#[async_trait]
impl ScheduleStore for WalStore {
    fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    async fn get_staff(&self, id: Ulid) -> Result<Option<StaffMember>, StoreError> {
        Ok(self.tables.staff.get(&id).map(|e| e.value().clone()))
    }

    async fn list_staff(&self) -> Result<Vec<StaffMember>, StoreError> {
        let mut staff: Vec<_> = self.tables.staff.iter().map(|e| e.value().clone()).collect();
        staff.sort_by_key(|s| s.id);
        Ok(staff)
    }

    async fn save_staff(&self, staff: StaffMember) -> Result<(), StoreError> {
        self.commit(Event::StaffSaved(staff)).await
    }

    async fn get_service(&self, id: Ulid) -> Result<Option<ServiceBookingPolicy>, StoreError> {
        Ok(self.tables.services.get(&id).map(|e| e.value().clone()))
    }

    async fn save_service(&self, service: ServiceBookingPolicy) -> Result<(), StoreError> {
        self.commit(Event::ServiceSaved(service)).await
    }

    async fn assignments_for_service(
        &self,
        service_id: Ulid,
    ) -> Result<Vec<StaffServiceAssignment>, StoreError> {
        let mut found: Vec<_> = self
            .tables
            .assignments
            .iter()
            .filter(|e| e.service_id == service_id)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|a| a.staff_id);
        Ok(found)
    }

    async fn save_assignment(&self, assignment: StaffServiceAssignment) -> Result<(), StoreError> {
        self.commit(Event::AssignmentSaved(assignment)).await
    }

    async fn schedules_for_staff(
        &self,
        staff_id: Ulid,
    ) -> Result<Vec<StaffScheduleEntry>, StoreError> {
        let mut found: Vec<_> = self
            .tables
            .schedules
            .iter()
            .filter(|e| e.staff_id == staff_id)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|e| (e.day_of_week, e.start_time));
        Ok(found)
    }

    async fn save_schedule(&self, entry: StaffScheduleEntry) -> Result<(), StoreError> {
        self.commit(Event::ScheduleSaved(entry)).await
    }

    async fn remove_schedule(&self, id: Ulid) -> Result<bool, StoreError> {
        if !self.tables.schedules.contains_key(&id) {
            return Ok(false);
        }
        self.commit(Event::ScheduleRemoved { id }).await?;
        Ok(true)
    }

    async fn bookings_for_staff(
        &self,
        staff_id: Ulid,
        window: Span,
    ) -> Result<Vec<Booking>, StoreError> {
        let mut found: Vec<_> = self
            .tables
            .bookings
            .iter()
            .filter(|e| e.staff_id == staff_id && e.span().overlaps(&window))
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|b| b.scheduled_at);
        Ok(found)
    }

    async fn get_booking(&self, id: Ulid) -> Result<Option<Booking>, StoreError> {
        Ok(self.tables.bookings.get(&id).map(|e| e.value().clone()))
    }

    async fn insert_booking(
        &self,
        booking: Booking,
        consumed_hold: Option<Ulid>,
    ) -> Result<(), StoreError> {
        self.commit(Event::BookingCreated {
            booking,
            consumed_hold,
        })
        .await
    }

    async fn set_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<bool, StoreError> {
        if !self.tables.bookings.contains_key(&id) {
            return Ok(false);
        }
        self.commit(Event::BookingStatusChanged { id, status }).await?;
        Ok(true)
    }

    async fn holds_for_staff_on(
        &self,
        staff_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<BookingHold>, StoreError> {
        let mut found: Vec<_> = self
            .tables
            .holds
            .iter()
            .filter(|e| e.staff_id == staff_id && e.slot_date == date)
            .map(|e| e.value().clone())
            .collect();
        found.sort_by_key(|h| h.slot_time);
        Ok(found)
    }

    async fn holds_for_session(&self, session_id: &str) -> Result<Vec<BookingHold>, StoreError> {
        Ok(self
            .tables
            .holds
            .iter()
            .filter(|e| e.session_id == session_id)
            .map(|e| e.value().clone())
            .collect())
    }

    async fn get_hold(&self, id: Ulid) -> Result<Option<BookingHold>, StoreError> {
        Ok(self.tables.holds.get(&id).map(|e| e.value().clone()))
    }

    async fn place_hold(&self, hold: BookingHold) -> Result<usize, StoreError> {
        let replaced = self.tables.session_hold_ids(&hold.session_id).len();
        self.commit(Event::HoldPlaced(hold)).await?;
        Ok(replaced)
    }

    async fn delete_hold(&self, id: Ulid) -> Result<bool, StoreError> {
        if !self.tables.holds.contains_key(&id) {
            return Ok(false);
        }
        self.commit(Event::HoldReleased { id }).await?;
        Ok(true)
    }

    async fn delete_expired_holds(&self, now: NaiveDateTime) -> Result<usize, StoreError> {
        let expired = self.tables.expired_hold_ids(now);
        let mut removed = 0;
        for id in expired {
            if self.delete_hold(id).await? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn get_client(&self, id: Ulid) -> Result<Option<Client>, StoreError> {
        Ok(self.tables.clients.get(&id).map(|e| e.value().clone()))
    }

    async fn find_client_by_email(&self, email: &str) -> Result<Option<Client>, StoreError> {
        Ok(self
            .tables
            .client_id_for_email(email)
            .and_then(|id| self.tables.clients.get(&id).map(|e| e.value().clone())))
    }

    async fn save_client(&self, client: Client) -> Result<(), StoreError> {
        self.commit(Event::ClientSaved(client)).await
    }

    async fn list_clients(&self) -> Result<Vec<Client>, StoreError> {
        let mut clients: Vec<_> = self
            .tables
            .clients
            .iter()
            .map(|e| e.value().clone())
            .collect();
        clients.sort_by_key(|c| c.id);
        Ok(clients)
    }
}
