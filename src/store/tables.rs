use chrono::NaiveDateTime;
use dashmap::DashMap;
use ulid::Ulid;

use crate::model::*;

/// In-memory rows of one tenant. Only `apply` mutates them.
#[derive(Default)]
pub(super) struct Tables {
    pub staff: DashMap<Ulid, StaffMember>,
    pub services: DashMap<Ulid, ServiceBookingPolicy>,
    /// Keyed by (staff_id, service_id).
    pub assignments: DashMap<(Ulid, Ulid), StaffServiceAssignment>,
    pub schedules: DashMap<Ulid, StaffScheduleEntry>,
    pub bookings: DashMap<Ulid, Booking>,
    pub holds: DashMap<Ulid, BookingHold>,
    pub clients: DashMap<Ulid, Client>,
    /// Normalized email → client id.
    client_by_email: DashMap<String, Ulid>,
}

impl Tables {
    pub fn client_id_for_email(&self, email: &str) -> Option<Ulid> {
        self.client_by_email
            .get(&normalize_email(email))
            .map(|e| *e.value())
    }

    pub fn session_hold_ids(&self, session_id: &str) -> Vec<Ulid> {
        self.holds
            .iter()
            .filter(|h| h.session_id == session_id)
            .map(|h| h.id)
            .collect()
    }

    pub fn expired_hold_ids(&self, now: NaiveDateTime) -> Vec<Ulid> {
        self.holds
            .iter()
            .filter(|h| !h.is_live(now))
            .map(|h| h.id)
            .collect()
    }

    // ── Event application ────────────────────────────────────

    pub fn apply(&self, event: &Event) {
        match event {
            Event::StaffSaved(staff) => {
                self.staff.insert(staff.id, staff.clone());
            }
            Event::ServiceSaved(service) => {
                self.services.insert(service.id, service.clone());
            }
            Event::AssignmentSaved(a) => {
                self.assignments.insert((a.staff_id, a.service_id), a.clone());
            }
            Event::ScheduleSaved(entry) => {
                self.schedules.insert(entry.id, entry.clone());
            }
            Event::ScheduleRemoved { id } => {
                self.schedules.remove(id);
            }
            Event::HoldPlaced(hold) => {
                self.holds.retain(|_, h| h.session_id != hold.session_id);
                self.holds.insert(hold.id, hold.clone());
            }
            Event::HoldReleased { id } => {
                self.holds.remove(id);
            }
            Event::ClientSaved(client) => {
                let email = normalize_email(&client.email);
                if let Some(previous) = self.clients.insert(client.id, client.clone()) {
                    let old_email = normalize_email(&previous.email);
                    if old_email != email {
                        self.client_by_email.remove(&old_email);
                    }
                }
                self.client_by_email.insert(email, client.id);
            }
            Event::BookingCreated {
                booking,
                consumed_hold,
            } => {
                self.bookings.insert(booking.id, booking.clone());
                if let Some(hold_id) = consumed_hold {
                    self.holds.remove(hold_id);
                }
            }
            Event::BookingStatusChanged { id, status } => {
                if let Some(mut booking) = self.bookings.get_mut(id) {
                    booking.status = *status;
                }
            }
        }
    }

    /// Minimal event list that rebuilds the current rows. Status changes fold
    /// into the saved rows.
    pub fn snapshot(&self) -> Vec<Event> {
        let mut events = Vec::new();
        events.extend(self.staff.iter().map(|e| Event::StaffSaved(e.value().clone())));
        events.extend(
            self.services
                .iter()
                .map(|e| Event::ServiceSaved(e.value().clone())),
        );
        events.extend(
            self.assignments
                .iter()
                .map(|e| Event::AssignmentSaved(e.value().clone())),
        );
        events.extend(
            self.schedules
                .iter()
                .map(|e| Event::ScheduleSaved(e.value().clone())),
        );
        events.extend(
            self.clients
                .iter()
                .map(|e| Event::ClientSaved(e.value().clone())),
        );
        events.extend(self.bookings.iter().map(|e| Event::BookingCreated {
            booking: e.value().clone(),
            consumed_hold: None,
        }));
        events.extend(self.holds.iter().map(|e| Event::HoldPlaced(e.value().clone())));
        events
    }
}
