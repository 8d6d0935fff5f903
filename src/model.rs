use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Tenant = database name of the connection.
pub type TenantId = String;

/// Fixed step of the slot grid, independent of service duration.
pub const SLOT_STEP_MINUTES: u32 = 30;

/// Lifetime of a hold from the moment it is placed.
pub const HOLD_TTL_MINUTES: i64 = 5;

/// Half-open wall-clock interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl Span {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Self {
        debug_assert!(start <= end, "Span start must not be after end");
        Self { start, end }
    }

    pub fn starting_at(start: NaiveDateTime, minutes: u32) -> Self {
        Self::new(start, start + Duration::minutes(minutes as i64))
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Minutes since midnight. Slot arithmetic stays in integers so a window
/// close to midnight never wraps.
pub fn minute_of_day(t: NaiveTime) -> u32 {
    t.hour() * 60 + t.minute()
}

pub fn time_from_minutes(minutes: u32) -> Option<NaiveTime> {
    NaiveTime::from_hms_opt(minutes / 60, minutes % 60, 0)
}

/// 0 = Sunday .. 6 = Saturday.
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffMember {
    pub id: Ulid,
    pub tenant_id: TenantId,
    pub name: String,
    pub active: bool,
}

/// One weekly recurring working window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffScheduleEntry {
    pub id: Ulid,
    pub tenant_id: TenantId,
    pub staff_id: Ulid,
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceBookingPolicy {
    pub id: Ulid,
    pub tenant_id: TenantId,
    pub duration_minutes: u32,
    pub min_advance_hours: u32,
    pub max_advance_days: u32,
    pub buffer_time_before: u32,
    pub buffer_time_after: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaffServiceAssignment {
    pub tenant_id: TenantId,
    pub staff_id: Ulid,
    pub service_id: Ulid,
    pub active: bool,
    pub custom_duration_minutes: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    /// Only scheduled and confirmed bookings block their time range.
    pub fn occupies_slot(self) -> bool {
        matches!(self, BookingStatus::Scheduled | BookingStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Scheduled => "scheduled",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(BookingStatus::Scheduled),
            "confirmed" => Some(BookingStatus::Confirmed),
            "in_progress" => Some(BookingStatus::InProgress),
            "completed" => Some(BookingStatus::Completed),
            "cancelled" => Some(BookingStatus::Cancelled),
            "no_show" => Some(BookingStatus::NoShow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Ulid,
    pub tenant_id: TenantId,
    pub client_id: Ulid,
    pub service_id: Ulid,
    pub staff_id: Ulid,
    pub scheduled_at: NaiveDateTime,
    pub duration_minutes: u32,
    pub status: BookingStatus,
    pub notes: Option<String>,
}

impl Booking {
    pub fn span(&self) -> Span {
        Span::starting_at(self.scheduled_at, self.duration_minutes)
    }
}

/// Short-lived exclusive claim on a (staff, date, time) slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingHold {
    pub id: Ulid,
    pub tenant_id: TenantId,
    pub client_id: Option<Ulid>,
    pub session_id: String,
    pub staff_id: Ulid,
    pub service_id: Ulid,
    pub slot_date: NaiveDate,
    pub slot_time: NaiveTime,
    pub duration_minutes: u32,
    pub created_at: NaiveDateTime,
    pub expires_at: NaiveDateTime,
}

impl BookingHold {
    pub fn is_live(&self, now: NaiveDateTime) -> bool {
        self.expires_at > now
    }

    pub fn scheduled_at(&self) -> NaiveDateTime {
        self.slot_date.and_time(self.slot_time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub id: Ulid,
    pub tenant_id: TenantId,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: String,
}

/// Contact details collected at checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientData {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub notes: Option<String>,
}

/// Email as used for client identity within a tenant.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HoldRequest {
    pub session_id: String,
    pub staff_id: Ulid,
    pub service_id: Ulid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub client_id: Option<Ulid>,
}

/// The event types, flat, one per store mutation. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    StaffSaved(StaffMember),
    ServiceSaved(ServiceBookingPolicy),
    AssignmentSaved(StaffServiceAssignment),
    ScheduleSaved(StaffScheduleEntry),
    ScheduleRemoved {
        id: Ulid,
    },
    /// Replaces any other hold of the same session.
    HoldPlaced(BookingHold),
    HoldReleased {
        id: Ulid,
    },
    ClientSaved(Client),
    /// Booking insert and hold consumption land in one record.
    BookingCreated {
        booking: Booking,
        consumed_hold: Option<Ulid>,
    },
    BookingStatusChanged {
        id: Ulid,
        status: BookingStatus,
    },
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeSlot {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub available: bool,
    pub staff_id: Ulid,
    pub staff_name: String,
}
