use tracing::info;
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;
use crate::observability::BOOKINGS_CONFIRMED_TOTAL;

use super::slots::booking_conflict;
use super::{Engine, EngineError};

fn validate_client(data: &ClientData) -> Result<(), EngineError> {
    if data.first_name.trim().is_empty() {
        return Err(EngineError::invalid("first_name must not be empty"));
    }
    if data.last_name.trim().is_empty() {
        return Err(EngineError::invalid("last_name must not be empty"));
    }
    if !data.email.contains('@') {
        return Err(EngineError::invalid("email must contain '@'"));
    }
    if data.first_name.len() > MAX_NAME_LEN || data.last_name.len() > MAX_NAME_LEN {
        return Err(EngineError::LimitExceeded("client name too long"));
    }
    if data.email.len() > MAX_EMAIL_LEN {
        return Err(EngineError::LimitExceeded("email too long"));
    }
    if data.phone.len() > MAX_PHONE_LEN {
        return Err(EngineError::LimitExceeded("phone too long"));
    }
    if let Some(ref notes) = data.notes
        && notes.len() > MAX_NOTES_LEN
    {
        return Err(EngineError::LimitExceeded("notes too long"));
    }
    Ok(())
}

impl Engine {
    /// Turn a live hold into a confirmed booking. The hold is consumed in the
    /// same store write that creates the booking.
    pub async fn confirm_booking(
        &self,
        hold_id: Ulid,
        data: ClientData,
    ) -> Result<Ulid, EngineError> {
        let staff_id = self
            .store
            .get_hold(hold_id)
            .await?
            .ok_or(EngineError::NotFound("hold", hold_id))?
            .staff_id;

        let _lock = self.lock_staff(staff_id).await;
        // Re-read under the lock: a release or another confirm may have won.
        let hold = self
            .store
            .get_hold(hold_id)
            .await?
            .ok_or(EngineError::NotFound("hold", hold_id))?;
        if hold.expires_at < self.now() {
            return Err(EngineError::Expired(hold_id));
        }
        validate_client(&data)?;

        let span = Span::starting_at(hold.scheduled_at(), hold.duration_minutes);
        let existing = self.store.bookings_for_staff(hold.staff_id, span).await?;
        if let Some(id) = booking_conflict(&span, &existing) {
            return Err(EngineError::Conflict(id));
        }

        let client_id = match hold.client_id {
            Some(id) => id,
            None => self.upsert_client(&data).await?,
        };
        let booking = Booking {
            id: Ulid::new(),
            tenant_id: self.tenant_id().to_string(),
            client_id,
            service_id: hold.service_id,
            staff_id: hold.staff_id,
            scheduled_at: hold.scheduled_at(),
            duration_minutes: hold.duration_minutes,
            status: BookingStatus::Confirmed,
            notes: data.notes,
        };
        let booking_id = booking.id;
        self.store.insert_booking(booking, Some(hold.id)).await?;
        metrics::counter!(BOOKINGS_CONFIRMED_TOTAL).increment(1);
        info!(
            "tenant {}: booking {booking_id} confirmed from hold {hold_id}",
            self.tenant_id()
        );
        Ok(booking_id)
    }

    /// Reuse the tenant's client with this email, refreshing name and phone,
    /// or create one.
    async fn upsert_client(&self, data: &ClientData) -> Result<Ulid, EngineError> {
        let email = normalize_email(&data.email);
        let client = match self.store.find_client_by_email(&email).await? {
            Some(existing) => Client {
                first_name: data.first_name.clone(),
                last_name: data.last_name.clone(),
                phone: data.phone.clone(),
                ..existing
            },
            None => Client {
                id: Ulid::new(),
                tenant_id: self.tenant_id().to_string(),
                email,
                first_name: data.first_name.clone(),
                last_name: data.last_name.clone(),
                phone: data.phone.clone(),
            },
        };
        let id = client.id;
        self.store.save_client(client).await?;
        Ok(id)
    }
}
