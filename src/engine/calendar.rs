use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use ulid::Ulid;

use crate::limits::MAX_CALENDAR_DAYS;
use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    /// Coarse per-day open/closed flags for `[start, end]`. A day is open if
    /// any active staff member (or the given one) works that weekday; bookings
    /// and holds are not consulted.
    pub async fn get_staff_availability(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        staff_id: Option<Ulid>,
    ) -> Result<BTreeMap<NaiveDate, bool>, EngineError> {
        if start > end {
            return Err(EngineError::invalid("start date is after end date"));
        }
        if (end - start).num_days() >= MAX_CALENDAR_DAYS {
            return Err(EngineError::LimitExceeded("calendar range too long"));
        }

        let staff = match staff_id {
            Some(id) => vec![self.staff(id).await?],
            None => self.store.list_staff().await?,
        };
        let mut open_days: HashSet<u8> = HashSet::new();
        for member in staff.iter().filter(|s| s.active) {
            for entry in self.store.schedules_for_staff(member.id).await? {
                if entry.is_active {
                    open_days.insert(entry.day_of_week);
                }
            }
        }

        Ok(start
            .iter_days()
            .take_while(|d| *d <= end)
            .map(|d| (d, open_days.contains(&day_of_week(d))))
            .collect())
    }
}
