use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Minutes since midnight — the only time-of-day type.
pub type Minutes = u16;

pub type MemberId = u32;
pub type EquipmentId = u32;
pub type SlotId = u32;
pub type ReservationId = Ulid;

/// The slot ids owned by one reservation: one slot, or two catalog-adjacent
/// slots booked as a single aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotSpan {
    Single(SlotId),
    Pair(SlotId, SlotId),
}

impl SlotSpan {
    pub fn single(slot: SlotId) -> Self {
        Self::Single(slot)
    }

    /// `a` and `b` in ascending id order. Catalog adjacency is checked at
    /// request normalization, not here.
    pub fn pair(a: SlotId, b: SlotId) -> Self {
        debug_assert!(a < b, "pair slots must be in ascending id order");
        Self::Pair(a, b)
    }

    pub fn ids(self) -> impl Iterator<Item = SlotId> {
        let (a, b) = match self {
            Self::Single(a) => (a, None),
            Self::Pair(a, b) => (a, Some(b)),
        };
        std::iter::once(a).chain(b)
    }

    /// Slot-units this span counts toward the daily cap.
    pub fn units(self) -> u32 {
        match self {
            Self::Single(_) => 1,
            Self::Pair(..) => 2,
        }
    }

    pub fn first(self) -> SlotId {
        match self {
            Self::Single(a) | Self::Pair(a, _) => a,
        }
    }

    pub fn contains(self, slot: SlotId) -> bool {
        self.ids().any(|s| s == slot)
    }
}

/// A committed reservation. Immutable once created; the only transition out
/// is full deletion via cancel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub member_id: MemberId,
    pub equipment_id: EquipmentId,
    pub date: NaiveDate,
    pub slots: SlotSpan,
}

/// The booking request shape accepted from a transport layer.
///
/// `slots` holds one or two slot ids; with `include_next_slot` set the
/// catalog's next consecutive slot is added and the pair books as ONE
/// reservation, or the whole request fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingRequest {
    pub member_id: MemberId,
    pub equipment_id: EquipmentId,
    pub date: NaiveDate,
    pub slots: Vec<SlotId>,
    pub include_next_slot: bool,
}

/// The event types — flat, no nesting. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    ReservationBooked {
        id: ReservationId,
        member_id: MemberId,
        equipment_id: EquipmentId,
        date: NaiveDate,
        slots: SlotSpan,
    },
    ReservationCancelled {
        id: ReservationId,
    },
}

// ── Per-equipment schedule ───────────────────────────────────────

/// All slot claims for one piece of equipment, keyed (date, slot id).
/// The uniqueness invariant lives here: one claim per key, ever.
#[derive(Debug, Clone, Default)]
pub struct EquipmentSchedule {
    claims: BTreeMap<(NaiveDate, SlotId), ReservationId>,
}

impl EquipmentSchedule {
    pub fn is_free(&self, date: NaiveDate, slot: SlotId) -> bool {
        !self.claims.contains_key(&(date, slot))
    }

    pub fn reservation_at(&self, date: NaiveDate, slot: SlotId) -> Option<ReservationId> {
        self.claims.get(&(date, slot)).copied()
    }

    pub fn claim_span(&mut self, date: NaiveDate, span: SlotSpan, id: ReservationId) {
        for slot in span.ids() {
            let prev = self.claims.insert((date, slot), id);
            debug_assert!(prev.is_none(), "claim over an existing claim");
        }
    }

    pub fn release_span(&mut self, date: NaiveDate, span: SlotSpan) {
        for slot in span.ids() {
            self.claims.remove(&(date, slot));
        }
    }

    pub fn claimed_slots_on(&self, date: NaiveDate) -> BTreeSet<SlotId> {
        self.claims
            .range((date, SlotId::MIN)..=(date, SlotId::MAX))
            .map(|((_, slot), _)| *slot)
            .collect()
    }

    /// Reservation ids holding any claim on or after `date`, deduplicated
    /// (a two-slot reservation claims two keys).
    pub fn reservations_from(&self, date: NaiveDate) -> BTreeSet<ReservationId> {
        self.claims
            .range((date, SlotId::MIN)..)
            .map(|(_, id)| *id)
            .collect()
    }

    pub fn claim_count(&self) -> usize {
        self.claims.len()
    }
}

// ── Per-member ledger ────────────────────────────────────────────

/// A member's slot-unit usage per date, maintained alongside the store.
/// Slot ids are refcounted: the same slot may be held on two different
/// machines, which costs two units but is one distinct slot id.
#[derive(Debug, Clone, Default)]
pub struct MemberLedger {
    days: BTreeMap<NaiveDate, BTreeMap<SlotId, u32>>,
}

impl MemberLedger {
    /// Total slot-units held on `date` (a two-slot reservation counts 2).
    pub fn units_on(&self, date: NaiveDate) -> u32 {
        self.days
            .get(&date)
            .map(|slots| slots.values().sum())
            .unwrap_or(0)
    }

    /// Distinct slot ids held on `date`, for the consecutive-run check.
    pub fn slots_on(&self, date: NaiveDate) -> BTreeSet<SlotId> {
        self.days
            .get(&date)
            .map(|slots| slots.keys().copied().collect())
            .unwrap_or_default()
    }

    pub fn add_span(&mut self, date: NaiveDate, span: SlotSpan) {
        let day = self.days.entry(date).or_default();
        for slot in span.ids() {
            *day.entry(slot).or_insert(0) += 1;
        }
    }

    pub fn remove_span(&mut self, date: NaiveDate, span: SlotSpan) {
        if let Some(day) = self.days.get_mut(&date) {
            for slot in span.ids() {
                if let Some(count) = day.get_mut(&slot) {
                    *count -= 1;
                    if *count == 0 {
                        day.remove(&slot);
                    }
                }
            }
            if day.is_empty() {
                self.days.remove(&date);
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}

// ── Query result types ───────────────────────────────────────────

/// Outward reservation summary: labels rendered, ids resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReservationView {
    pub reservation_id: ReservationId,
    pub date: NaiveDate,
    pub equipment_label: String,
    pub slot_labels: Vec<String>,
}
