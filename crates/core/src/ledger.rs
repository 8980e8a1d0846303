//! Capacity ledger: read-time booked counts per slot.
//!
//! This is a projection over the existing reservations of a date, used to
//! annotate the generated calendar for slot pickers. It is advisory only;
//! the binding capacity check runs inside the booking transaction. Both use
//! the same counting rule, so the annotation never disagrees with what a
//! commit would decide against the same data.

use crate::config::CoreConfig;
use crate::reservations::{Reservation, ReservationKind};
use crate::schedule;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use std::collections::BTreeMap;

/// One generated slot annotated with its current booking load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct SlotAvailability {
    pub slot: NaiveTime,
    pub booked: u32,
    pub at_capacity: bool,
}

/// Booked counts per slot for a date.
///
/// Counts active reservation-kind records only; inquiries and other dates
/// never contribute. Slots with no bookings are absent from the map.
pub fn booked_counts<'a>(
    date: NaiveDate,
    reservations: impl IntoIterator<Item = &'a Reservation>,
) -> BTreeMap<NaiveTime, u32> {
    let mut counts = BTreeMap::new();
    for reservation in reservations {
        if reservation.kind != ReservationKind::Reservation
            || !reservation.status.is_active()
            || reservation.date != Some(date)
        {
            continue;
        }
        if let Some(slot) = reservation.slot {
            *counts.entry(slot).or_insert(0) += 1;
        }
    }
    counts
}

/// Generate the calendar for a date and annotate every slot.
///
/// A slot is at capacity once its booked count reaches the configured
/// maximum. Deterministic: same date and same reservations, same output.
pub fn annotate<'a>(
    date: NaiveDate,
    reservations: impl IntoIterator<Item = &'a Reservation>,
    config: &CoreConfig,
) -> Vec<SlotAvailability> {
    let counts = booked_counts(date, reservations);
    schedule::generate(date, config.schedule())
        .into_iter()
        .map(|slot| {
            let booked = counts.get(&slot).copied().unwrap_or(0);
            SlotAvailability {
                slot,
                booked,
                at_capacity: booked >= config.slot_capacity(),
            }
        })
        .collect()
}
