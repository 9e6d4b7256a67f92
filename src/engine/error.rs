use chrono::NaiveDate;

use crate::model::{EquipmentId, MemberId, ReservationId, SlotId};

/// Which referenced entity failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Member(MemberId),
    Equipment(EquipmentId),
    Slot(SlotId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    /// A member, equipment, or slot id that does not exist.
    InvalidReference(Reference),
    /// Structurally bad slot set: empty, more than two, duplicate, or a
    /// pair that is not adjacent in the catalog.
    MalformedRequest(&'static str),
    /// Outside today ..= today + booking window.
    DateOutOfRange { date: NaiveDate },
    DailyLimitExceeded {
        member_id: MemberId,
        date: NaiveDate,
        held: u32,
    },
    /// Booking would extend a run of consecutive slots past the limit.
    ConsecutiveLimitExceeded { slot: SlotId },
    EquipmentUnavailable {
        equipment_id: EquipmentId,
        date: NaiveDate,
        slot: SlotId,
    },
    /// Lost the commit race for a slot, after the automatic revalidation.
    Conflict { slot: SlotId },
    NotFound(ReservationId),
    /// Transient persistence failure, surfaced after bounded retries.
    Storage(String),
}

impl std::fmt::Display for BookingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingError::InvalidReference(r) => match r {
                Reference::Member(id) => write!(f, "unknown member: {id}"),
                Reference::Equipment(id) => write!(f, "unknown equipment: {id}"),
                Reference::Slot(id) => write!(f, "unknown time slot: {id}"),
            },
            BookingError::MalformedRequest(msg) => write!(f, "malformed request: {msg}"),
            BookingError::DateOutOfRange { date } => {
                write!(f, "date {date} outside the booking window")
            }
            BookingError::DailyLimitExceeded { member_id, date, held } => {
                write!(f, "member {member_id} already holds {held} slots on {date}")
            }
            BookingError::ConsecutiveLimitExceeded { slot } => {
                write!(f, "slot {slot} would exceed the consecutive-slot limit")
            }
            BookingError::EquipmentUnavailable { equipment_id, date, slot } => {
                write!(f, "equipment {equipment_id} is taken for slot {slot} on {date}")
            }
            BookingError::Conflict { slot } => {
                write!(f, "conflict: slot {slot} was claimed concurrently")
            }
            BookingError::NotFound(id) => write!(f, "reservation not found: {id}"),
            BookingError::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for BookingError {}
