use chrono::{Duration, NaiveDate, NaiveTime};
use ulid::Ulid;

use crate::limits::*;
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub async fn save_staff(&self, id: Ulid, name: String, active: bool) -> Result<(), EngineError> {
        if name.trim().is_empty() {
            return Err(EngineError::invalid("staff name must not be empty"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(EngineError::LimitExceeded("staff name too long"));
        }
        let staff = StaffMember {
            id,
            tenant_id: self.tenant_id().to_string(),
            name,
            active,
        };
        Ok(self.store.save_staff(staff).await?)
    }

    /// Create or replace a service. The incoming `tenant_id` is ignored.
    pub async fn save_service(&self, mut service: ServiceBookingPolicy) -> Result<(), EngineError> {
        if service.duration_minutes == 0 {
            return Err(EngineError::invalid("duration_minutes must be positive"));
        }
        if service.duration_minutes > MAX_DURATION_MINUTES
            || service.buffer_time_before > MAX_DURATION_MINUTES
            || service.buffer_time_after > MAX_DURATION_MINUTES
        {
            return Err(EngineError::LimitExceeded("service duration too long"));
        }
        if service.max_advance_days > MAX_ADVANCE_DAYS
            || service.min_advance_hours > MAX_ADVANCE_DAYS * 24
        {
            return Err(EngineError::LimitExceeded("advance window too long"));
        }
        service.tenant_id = self.tenant_id().to_string();
        Ok(self.store.save_service(service).await?)
    }

    pub async fn save_assignment(
        &self,
        staff_id: Ulid,
        service_id: Ulid,
        active: bool,
        custom_duration_minutes: Option<u32>,
    ) -> Result<(), EngineError> {
        self.staff(staff_id).await?;
        self.service(service_id).await?;
        match custom_duration_minutes {
            Some(0) => return Err(EngineError::invalid("custom duration must be positive")),
            Some(m) if m > MAX_DURATION_MINUTES => {
                return Err(EngineError::LimitExceeded("custom duration too long"));
            }
            _ => {}
        }
        let assignment = StaffServiceAssignment {
            tenant_id: self.tenant_id().to_string(),
            staff_id,
            service_id,
            active,
            custom_duration_minutes,
        };
        Ok(self.store.save_assignment(assignment).await?)
    }

    pub async fn save_schedule(
        &self,
        id: Ulid,
        staff_id: Ulid,
        day_of_week: u8,
        start_time: NaiveTime,
        end_time: NaiveTime,
        is_active: bool,
    ) -> Result<(), EngineError> {
        if day_of_week > 6 {
            return Err(EngineError::invalid("day_of_week must be 0..=6"));
        }
        if is_active && start_time >= end_time {
            return Err(EngineError::invalid("start_time must be before end_time"));
        }
        self.staff(staff_id).await?;
        let entry = StaffScheduleEntry {
            id,
            tenant_id: self.tenant_id().to_string(),
            staff_id,
            day_of_week,
            start_time,
            end_time,
            is_active,
        };
        Ok(self.store.save_schedule(entry).await?)
    }

    pub async fn remove_schedule(&self, id: Ulid) -> Result<bool, EngineError> {
        Ok(self.store.remove_schedule(id).await?)
    }

    pub async fn set_booking_status(
        &self,
        id: Ulid,
        status: BookingStatus,
    ) -> Result<(), EngineError> {
        if self.store.set_booking_status(id, status).await? {
            Ok(())
        } else {
            Err(EngineError::NotFound("booking", id))
        }
    }

    pub async fn get_booking(&self, id: Ulid) -> Result<Booking, EngineError> {
        self.store
            .get_booking(id)
            .await?
            .ok_or(EngineError::NotFound("booking", id))
    }

    pub async fn get_client(&self, id: Ulid) -> Result<Client, EngineError> {
        self.store
            .get_client(id)
            .await?
            .ok_or(EngineError::NotFound("client", id))
    }

    pub async fn list_clients(&self) -> Result<Vec<Client>, EngineError> {
        Ok(self.store.list_clients().await?)
    }

    /// Bookings of any status starting on `date`.
    pub async fn bookings_for_staff_on(
        &self,
        staff_id: Ulid,
        date: NaiveDate,
    ) -> Result<Vec<Booking>, EngineError> {
        let start = date.and_time(NaiveTime::MIN);
        let window = Span::new(start, start + Duration::days(1));
        let mut bookings = self.store.bookings_for_staff(staff_id, window).await?;
        bookings.retain(|b| b.scheduled_at.date() == date);
        Ok(bookings)
    }
}
