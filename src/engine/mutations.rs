use tokio::sync::oneshot;
use tracing::{info, warn};
use ulid::Ulid;

use crate::model::*;
use crate::observability;

use super::error::{BookingError, Reference};
use super::validate::{
    check_consecutive_runs, check_daily_cap, check_date_window, normalize_slots, today,
};
use super::{Engine, WalCommand};

impl Engine {
    /// Book one reservation: validate the full requested slot set, then
    /// commit atomically. A two-slot request books as a single reservation
    /// owning both slots — if the second slot cannot be secured, the first
    /// is not persisted either.
    ///
    /// A lost slot race at commit time triggers one automatic revalidation
    /// against fresh state before the rejection is surfaced.
    pub async fn create_reservation(
        &self,
        request: BookingRequest,
    ) -> Result<Reservation, BookingError> {
        let result = self.create_inner(&request).await;
        match &result {
            Ok(reservation) => {
                metrics::counter!(observability::BOOKINGS_TOTAL).increment(1);
                info!(
                    "booked reservation {} for member {} on {} (equipment {}, slots {:?})",
                    reservation.id,
                    reservation.member_id,
                    reservation.date,
                    reservation.equipment_id,
                    reservation.slots.ids().collect::<Vec<_>>(),
                );
            }
            Err(e) => {
                metrics::counter!(
                    observability::BOOKING_REJECTIONS_TOTAL,
                    "reason" => observability::rejection_label(e)
                )
                .increment(1);
                warn!(
                    "rejected booking for member {} on {}: {e}",
                    request.member_id, request.date
                );
            }
        }
        result
    }

    async fn create_inner(&self, request: &BookingRequest) -> Result<Reservation, BookingError> {
        if !self.members.exists(request.member_id).await {
            return Err(BookingError::InvalidReference(Reference::Member(
                request.member_id,
            )));
        }
        if !self.equipment.exists(request.equipment_id).await {
            return Err(BookingError::InvalidReference(Reference::Equipment(
                request.equipment_id,
            )));
        }
        let span = normalize_slots(&self.catalog, request)?;

        let mut retried = false;
        loop {
            self.check_rules(request, span).await?;
            match self.try_commit(request, span).await {
                Err(BookingError::Conflict { .. }) if !retried => {
                    // Lost a race after the speculative check; revalidate
                    // once against fresh state and try again.
                    retried = true;
                }
                other => return other,
            }
        }
    }

    /// Run the full rule set without committing. Side-effect free, safe for
    /// speculative availability previews.
    pub async fn validate_request(&self, request: &BookingRequest) -> Result<(), BookingError> {
        if !self.members.exists(request.member_id).await {
            return Err(BookingError::InvalidReference(Reference::Member(
                request.member_id,
            )));
        }
        if !self.equipment.exists(request.equipment_id).await {
            return Err(BookingError::InvalidReference(Reference::Equipment(
                request.equipment_id,
            )));
        }
        let span = normalize_slots(&self.catalog, request)?;
        self.check_rules(request, span).await
    }

    /// Date window, daily cap, consecutive-run, and availability checks
    /// against a read snapshot. The commit path re-runs the stateful ones
    /// under the write locks, so a stale pass here is never authoritative.
    async fn check_rules(
        &self,
        request: &BookingRequest,
        span: SlotSpan,
    ) -> Result<(), BookingError> {
        check_date_window(request.date, today())?;
        let held = self
            .daily_reservation_count(request.member_id, request.date)
            .await;
        check_daily_cap(request.member_id, request.date, held, span.units())?;
        let held_slots = self.same_day_slots(request.member_id, request.date).await;
        check_consecutive_runs(&self.catalog, &held_slots, span)?;
        for slot in span.ids() {
            if !self
                .is_available(request.equipment_id, slot, request.date)
                .await
            {
                return Err(BookingError::EquipmentUnavailable {
                    equipment_id: request.equipment_id,
                    date: request.date,
                    slot,
                });
            }
        }
        Ok(())
    }

    /// The atomic insert. Locks the equipment schedule, then the member
    /// ledger (every commit takes exactly one of each, in that order), and
    /// re-validates uniqueness, daily cap, and consecutive runs before the
    /// WAL append. The slot claims and ledger entries change only after the
    /// append succeeds, so either all of the reservation is visible or none
    /// of it is.
    async fn try_commit(
        &self,
        request: &BookingRequest,
        span: SlotSpan,
    ) -> Result<Reservation, BookingError> {
        let sched_arc = self.schedule_entry(request.equipment_id);
        let ledger_arc = self.ledger_entry(request.member_id);
        let mut sched = sched_arc.write_owned().await;
        let mut ledger = ledger_arc.write_owned().await;

        for slot in span.ids() {
            if !sched.is_free(request.date, slot) {
                return Err(BookingError::Conflict { slot });
            }
        }
        let held = ledger.units_on(request.date);
        check_daily_cap(request.member_id, request.date, held, span.units())?;
        check_consecutive_runs(&self.catalog, &ledger.slots_on(request.date), span)?;

        let reservation = Reservation {
            id: Ulid::new(),
            member_id: request.member_id,
            equipment_id: request.equipment_id,
            date: request.date,
            slots: span,
        };
        let event = Event::ReservationBooked {
            id: reservation.id,
            member_id: reservation.member_id,
            equipment_id: reservation.equipment_id,
            date: reservation.date,
            slots: reservation.slots,
        };
        self.persist(&event).await?;

        sched.claim_span(reservation.date, reservation.slots, reservation.id);
        ledger.add_span(reservation.date, reservation.slots);
        self.reservations.insert(reservation.id, reservation.clone());
        metrics::gauge!(observability::RESERVATIONS_ACTIVE).increment(1.0);
        Ok(reservation)
    }

    /// Cancel a reservation, releasing every slot it claims in one step.
    /// Cancelling an unknown (or already cancelled) id is `NotFound`.
    pub async fn cancel_reservation(&self, id: ReservationId) -> Result<(), BookingError> {
        let reservation = self
            .reservations
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(BookingError::NotFound(id))?;

        let sched_arc = self.schedule_entry(reservation.equipment_id);
        let ledger_arc = self.ledger_entry(reservation.member_id);
        let mut sched = sched_arc.write_owned().await;
        let mut ledger = ledger_arc.write_owned().await;

        // Re-check under the lock: a concurrent cancel may have won.
        if !self.reservations.contains_key(&id) {
            return Err(BookingError::NotFound(id));
        }

        self.persist(&Event::ReservationCancelled { id }).await?;
        sched.release_span(reservation.date, reservation.slots);
        ledger.remove_span(reservation.date, reservation.slots);
        self.reservations.remove(&id);
        metrics::counter!(observability::CANCELLATIONS_TOTAL).increment(1);
        metrics::gauge!(observability::RESERVATIONS_ACTIVE).decrement(1.0);
        info!("cancelled reservation {id}");
        Ok(())
    }

    /// Compact the WAL down to one booked event per live reservation.
    /// Intended for write-quiet moments; a commit racing the snapshot keeps
    /// its own appended event either way.
    pub async fn compact_wal(&self) -> Result<(), BookingError> {
        let events: Vec<Event> = self
            .reservations
            .iter()
            .map(|entry| {
                let r = entry.value();
                Event::ReservationBooked {
                    id: r.id,
                    member_id: r.member_id,
                    equipment_id: r.equipment_id,
                    date: r.date,
                    slots: r.slots,
                }
            })
            .collect();

        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| BookingError::Storage("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| BookingError::Storage("WAL writer dropped response".into()))?
            .map_err(|e| BookingError::Storage(e.to_string()))
    }

    pub async fn wal_appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self
            .wal_tx
            .send(WalCommand::AppendsSinceCompact { response: tx })
            .await
            .is_err()
        {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}
