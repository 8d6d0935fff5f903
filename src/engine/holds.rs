use chrono::Duration;
use tracing::{debug, info};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::{HOLD_CONFLICTS_TOTAL, HOLDS_PLACED_TOTAL};

use super::slots::{
    SlotShape, booking_conflict, hold_conflict, is_past, padded_span, within_advance_window,
};
use super::{Engine, EngineError};

fn validate_request(req: &HoldRequest) -> Result<(), EngineError> {
    if req.session_id.trim().is_empty() {
        return Err(EngineError::invalid("session_id must not be empty"));
    }
    if req.session_id.len() > MAX_SESSION_ID_LEN {
        return Err(EngineError::LimitExceeded("session_id too long"));
    }
    if req.duration_minutes == 0 {
        return Err(EngineError::invalid("duration_minutes must be positive"));
    }
    if req.duration_minutes > MAX_DURATION_MINUTES {
        return Err(EngineError::LimitExceeded("duration too long"));
    }
    Ok(())
}

impl Engine {
    /// Claim a slot for a session, replacing whatever the session held before.
    pub async fn hold_slot(&self, req: HoldRequest) -> Result<BookingHold, EngineError> {
        validate_request(&req)?;
        let service = self.service(req.service_id).await?;
        self.staff(req.staff_id).await?;
        if self.roster(&service, Some(req.staff_id)).await?.is_empty() {
            return Err(EngineError::invalid("staff does not offer this service"));
        }

        // Session before staff, everywhere both are taken.
        let _session = self.lock_session(&req.session_id).await;
        let _lock = self.lock_staff(req.staff_id).await;
        let now = self.now();
        if is_past(req.date, req.time, now) {
            return Err(EngineError::invalid("slot is in the past"));
        }
        if !within_advance_window(req.date, &service, now) {
            return Err(EngineError::invalid("slot is outside the booking window"));
        }

        let shape = SlotShape::with_duration(&service, req.duration_minutes);
        let starts = self.staff_starts(req.staff_id, req.date, &shape).await?;
        if !starts.contains(&req.time) {
            return Err(EngineError::invalid("time is not a bookable slot"));
        }
        let span = padded_span(req.date, req.time, &shape);
        let bookings = self.store.bookings_for_staff(req.staff_id, span).await?;
        let holds = self.store.holds_for_staff_on(req.staff_id, req.date).await?;
        let taken_by = booking_conflict(&span, &bookings)
            .or_else(|| hold_conflict(req.time, &holds, now, Some(req.session_id.as_str())));
        if let Some(id) = taken_by {
            metrics::counter!(HOLD_CONFLICTS_TOTAL).increment(1);
            return Err(EngineError::Conflict(id));
        }

        let hold = BookingHold {
            id: Ulid::new(),
            tenant_id: self.tenant_id().to_string(),
            client_id: req.client_id,
            session_id: req.session_id,
            staff_id: req.staff_id,
            service_id: req.service_id,
            slot_date: req.date,
            slot_time: req.time,
            duration_minutes: req.duration_minutes,
            created_at: now,
            expires_at: now + Duration::minutes(HOLD_TTL_MINUTES),
        };
        let replaced = self.store.place_hold(hold.clone()).await?;
        metrics::counter!(HOLDS_PLACED_TOTAL).increment(1);
        info!(
            "tenant {}: hold {} on {} {} for staff {} (replaced {replaced})",
            self.tenant_id(),
            hold.id,
            hold.slot_date,
            hold.slot_time.format("%H:%M"),
            hold.staff_id
        );
        Ok(hold)
    }

    /// Delete a hold. Returns false if it was already gone.
    pub async fn release_slot(&self, hold_id: Ulid) -> Result<bool, EngineError> {
        let removed = self.store.delete_hold(hold_id).await?;
        debug!("tenant {}: release {hold_id} removed={removed}", self.tenant_id());
        Ok(removed)
    }

    /// Purge holds that no longer block anything.
    pub async fn cleanup_expired_holds(&self) -> Result<usize, EngineError> {
        Ok(self.store.delete_expired_holds(self.now()).await?)
    }

    pub async fn holds_for_session(
        &self,
        session_id: &str,
    ) -> Result<Vec<BookingHold>, EngineError> {
        let now = self.now();
        let mut holds = self.store.holds_for_session(session_id).await?;
        holds.retain(|h| h.is_live(now));
        Ok(holds)
    }
}
