use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use ulid::Ulid;

use crate::model::*;

use super::{Engine, EngineError};

// ── Slot algorithm ────────────────────────────────────────────────

/// Time footprint of one appointment for a given staff member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotShape {
    pub duration_minutes: u32,
    pub buffer_before: u32,
    pub buffer_after: u32,
}

impl SlotShape {
    /// Per-staff duration override wins over the service's base duration.
    pub fn for_staff(service: &ServiceBookingPolicy, assignment: &StaffServiceAssignment) -> Self {
        Self {
            duration_minutes: assignment
                .custom_duration_minutes
                .unwrap_or(service.duration_minutes),
            buffer_before: service.buffer_time_before,
            buffer_after: service.buffer_time_after,
        }
    }

    pub fn with_duration(service: &ServiceBookingPolicy, duration_minutes: u32) -> Self {
        Self {
            duration_minutes,
            buffer_before: service.buffer_time_before,
            buffer_after: service.buffer_time_after,
        }
    }
}

/// `date` lies in `[(now + min_advance_hours).date(), (now + max_advance_days).date()]`.
pub fn within_advance_window(
    date: NaiveDate,
    service: &ServiceBookingPolicy,
    now: NaiveDateTime,
) -> bool {
    let earliest = (now + Duration::hours(service.min_advance_hours as i64)).date();
    let latest = (now + Duration::days(service.max_advance_days as i64)).date();
    earliest <= date && date <= latest
}

/// Start times stepping by `SLOT_STEP_MINUTES` from `open`, keeping only
/// those whose duration plus trailing buffer still ends by `close`.
pub fn candidate_starts(open: NaiveTime, close: NaiveTime, shape: &SlotShape) -> Vec<NaiveTime> {
    let open = minute_of_day(open);
    let close = minute_of_day(close);
    let needed = shape.duration_minutes + shape.buffer_after;
    let mut starts = Vec::new();
    let mut t = open;
    while t + needed <= close {
        if let Some(time) = time_from_minutes(t) {
            starts.push(time);
        }
        t += SLOT_STEP_MINUTES;
    }
    starts
}

/// `[t - buffer_before, t + duration + buffer_after)` on `date`.
pub fn padded_span(date: NaiveDate, t: NaiveTime, shape: &SlotShape) -> Span {
    let start = date.and_time(t);
    Span::new(
        start - Duration::minutes(shape.buffer_before as i64),
        start + Duration::minutes((shape.duration_minutes + shape.buffer_after) as i64),
    )
}

/// First occupying booking whose own span intersects `span`.
pub fn booking_conflict(span: &Span, bookings: &[Booking]) -> Option<Ulid> {
    bookings
        .iter()
        .find(|b| b.status.occupies_slot() && b.span().overlaps(span))
        .map(|b| b.id)
}

/// First live hold at exactly `t`. Holds are always placed on the slot grid,
/// so an exact start match is the whole test. Holds of `except_session` are
/// ignored.
pub fn hold_conflict(
    t: NaiveTime,
    holds: &[BookingHold],
    now: NaiveDateTime,
    except_session: Option<&str>,
) -> Option<Ulid> {
    holds
        .iter()
        .filter(|h| except_session.is_none_or(|s| h.session_id != s))
        .find(|h| h.slot_time == t && h.is_live(now))
        .map(|h| h.id)
}

/// Start is at or before now.
pub fn is_past(date: NaiveDate, t: NaiveTime, now: NaiveDateTime) -> bool {
    date.and_time(t) <= now
}

impl Engine {
    /// Every candidate slot for `date`, taken ones included, ordered by time.
    pub async fn get_available_slots(
        &self,
        date: NaiveDate,
        service_id: Ulid,
        staff_id: Option<Ulid>,
    ) -> Result<Vec<TimeSlot>, EngineError> {
        let service = self.service(service_id).await?;
        let now = self.now();
        if !within_advance_window(date, &service, now) {
            return Ok(Vec::new());
        }

        let mut slots = Vec::new();
        for (staff, shape) in self.roster(&service, staff_id).await? {
            let starts = self.staff_starts(staff.id, date, &shape).await?;
            if starts.is_empty() {
                continue;
            }

            let day_start = date.and_time(NaiveTime::MIN);
            let lookup = Span::new(
                day_start - Duration::minutes(shape.buffer_before as i64),
                day_start
                    + Duration::days(1)
                    + Duration::minutes((shape.duration_minutes + shape.buffer_after) as i64),
            );
            let bookings = self.store.bookings_for_staff(staff.id, lookup).await?;
            let holds = self.store.holds_for_staff_on(staff.id, date).await?;

            for t in starts {
                let span = padded_span(date, t, &shape);
                let available = !is_past(date, t, now)
                    && booking_conflict(&span, &bookings).is_none()
                    && hold_conflict(t, &holds, now, None).is_none();
                slots.push(TimeSlot {
                    date,
                    time: t,
                    available,
                    staff_id: staff.id,
                    staff_name: staff.name.clone(),
                });
            }
        }

        slots.sort_by_key(|s| s.time);
        Ok(slots)
    }

    /// Grid start times for one staff member on `date`, unioned over every
    /// active window that day and ordered by time.
    pub(super) async fn staff_starts(
        &self,
        staff_id: Ulid,
        date: NaiveDate,
        shape: &SlotShape,
    ) -> Result<Vec<NaiveTime>, EngineError> {
        let dow = day_of_week(date);
        let mut starts: Vec<NaiveTime> = self
            .store
            .schedules_for_staff(staff_id)
            .await?
            .into_iter()
            .filter(|e| e.is_active && e.day_of_week == dow)
            .flat_map(|e| candidate_starts(e.start_time, e.end_time, shape))
            .collect();
        starts.sort();
        starts.dedup();
        Ok(starts)
    }

    /// Active, existing staff linked to the service by an active assignment,
    /// each with its effective slot shape.
    pub(super) async fn roster(
        &self,
        service: &ServiceBookingPolicy,
        staff_id: Option<Ulid>,
    ) -> Result<Vec<(StaffMember, SlotShape)>, EngineError> {
        let mut roster = Vec::new();
        for assignment in self.store.assignments_for_service(service.id).await? {
            if !assignment.active || staff_id.is_some_and(|id| id != assignment.staff_id) {
                continue;
            }
            let Some(staff) = self.store.get_staff(assignment.staff_id).await? else {
                continue;
            };
            if staff.active {
                roster.push((staff, SlotShape::for_staff(service, &assignment)));
            }
        }
        Ok(roster)
    }
}
