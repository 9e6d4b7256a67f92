use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::catalog::TimeSlot;
use crate::model::*;

use super::Engine;
use super::validate::today;

impl Engine {
    /// True iff no stored reservation claims (equipment, date, slot).
    pub async fn is_available(
        &self,
        equipment_id: EquipmentId,
        slot: SlotId,
        date: NaiveDate,
    ) -> bool {
        match self.schedule(equipment_id) {
            Some(sched) => sched.read().await.is_free(date, slot),
            None => true,
        }
    }

    /// Total slot-units the member holds on `date` (a two-slot reservation
    /// counts 2).
    pub async fn daily_reservation_count(&self, member_id: MemberId, date: NaiveDate) -> u32 {
        match self.ledger(member_id) {
            Some(ledger) => ledger.read().await.units_on(date),
            None => 0,
        }
    }

    /// Distinct slot ids the member holds on `date`.
    pub async fn same_day_slots(&self, member_id: MemberId, date: NaiveDate) -> BTreeSet<SlotId> {
        match self.ledger(member_id) {
            Some(ledger) => ledger.read().await.slots_on(date),
            None => BTreeSet::new(),
        }
    }

    /// Catalog slots with no claim on the given equipment and date, in
    /// start-time order.
    pub async fn available_slots(
        &self,
        equipment_id: EquipmentId,
        date: NaiveDate,
    ) -> Vec<TimeSlot> {
        let claimed = match self.schedule(equipment_id) {
            Some(sched) => sched.read().await.claimed_slots_on(date),
            None => BTreeSet::new(),
        };
        self.catalog
            .all_slots()
            .iter()
            .filter(|slot| !claimed.contains(&slot.id))
            .copied()
            .collect()
    }

    pub fn get_reservation(&self, id: ReservationId) -> Option<Reservation> {
        self.reservations.get(&id).map(|e| e.value().clone())
    }

    /// A member's reservations, ordered by date then earliest slot.
    pub fn reservations_for_member(&self, member_id: MemberId) -> Vec<Reservation> {
        let mut out: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| e.value().member_id == member_id)
            .map(|e| e.value().clone())
            .collect();
        // slot ids ascend with start times, so first id orders by start
        out.sort_by_key(|r| (r.date, r.slots.first()));
        out
    }

    /// All reservations on one date, ordered by slot then equipment.
    pub fn reservations_on(&self, date: NaiveDate) -> Vec<Reservation> {
        let mut out: Vec<Reservation> = self
            .reservations
            .iter()
            .filter(|e| e.value().date == date)
            .map(|e| e.value().clone())
            .collect();
        out.sort_by_key(|r| (r.slots.first(), r.equipment_id));
        out
    }

    /// Reservations for the equipment with date >= today, ordered by date
    /// then slot start. A read helper with no validation logic.
    pub async fn list_future_reservations(&self, equipment_id: EquipmentId) -> Vec<Reservation> {
        let Some(sched) = self.schedule(equipment_id) else {
            return Vec::new();
        };
        let ids = sched.read().await.reservations_from(today());
        let mut out: Vec<Reservation> = ids
            .into_iter()
            .filter_map(|id| self.get_reservation(id))
            .collect();
        out.sort_by_key(|r| (r.date, r.slots.first()));
        out
    }

    /// Outward summary with the equipment label and `HH:MM–HH:MM
    /// (PartOfDay)` slot labels resolved.
    pub async fn reservation_view(&self, reservation: &Reservation) -> ReservationView {
        let equipment_label = self
            .equipment
            .label(reservation.equipment_id)
            .await
            .unwrap_or_else(|| "unknown equipment".into());
        let slot_labels = reservation
            .slots
            .ids()
            .map(|slot| {
                self.catalog
                    .slot_label(slot)
                    .unwrap_or_else(|| "unknown slot".into())
            })
            .collect();
        ReservationView {
            reservation_id: reservation.id,
            date: reservation.date,
            equipment_label,
            slot_labels,
        }
    }

    /// A member's reservations rendered for display, same order as
    /// `reservations_for_member`.
    pub async fn member_reservation_views(&self, member_id: MemberId) -> Vec<ReservationView> {
        let mut views = Vec::new();
        for reservation in self.reservations_for_member(member_id) {
            views.push(self.reservation_view(&reservation).await);
        }
        views
    }
}
