mod admin;
mod calendar;
mod confirm;
mod error;
mod holds;
mod slots;

pub use error::EngineError;
pub use slots::{
    SlotShape, booking_conflict, candidate_starts, hold_conflict, is_past, padded_span,
    within_advance_window,
};

use std::sync::Arc;

use chrono::NaiveDateTime;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ulid::Ulid;

use crate::clock::Clock;
use crate::model::*;
use crate::store::ScheduleStore;

/// Availability and hold engine for one tenant.
///
/// Holds no state of its own besides write locks: every call reads the store,
/// computes, and returns.
pub struct Engine {
    store: Arc<dyn ScheduleStore>,
    clock: Arc<dyn Clock>,
    /// Serializes check-then-write sequences (hold, confirm) per staff member.
    staff_locks: DashMap<Ulid, Arc<Mutex<()>>>,
    /// Serializes holds per session, so one session never ends up holding two
    /// slots on different staff. Taken before the staff lock.
    session_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Engine {
    pub fn new(store: Arc<dyn ScheduleStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            staff_locks: DashMap::new(),
            session_locks: DashMap::new(),
        }
    }

    pub fn tenant_id(&self) -> &str {
        self.store.tenant_id()
    }

    pub fn store(&self) -> &Arc<dyn ScheduleStore> {
        &self.store
    }

    pub fn now(&self) -> NaiveDateTime {
        self.clock.now()
    }

    pub(super) async fn lock_staff(&self, staff_id: Ulid) -> OwnedMutexGuard<()> {
        let lock = self
            .staff_locks
            .entry(staff_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.lock_owned().await
    }

    pub(super) async fn lock_session(&self, session_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .session_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone();
        lock.lock_owned().await
    }

    pub(super) async fn service(&self, id: Ulid) -> Result<ServiceBookingPolicy, EngineError> {
        self.store
            .get_service(id)
            .await?
            .ok_or(EngineError::NotFound("service", id))
    }

    pub(super) async fn staff(&self, id: Ulid) -> Result<StaffMember, EngineError> {
        self.store
            .get_staff(id)
            .await?
            .ok_or(EngineError::NotFound("staff", id))
    }
}
