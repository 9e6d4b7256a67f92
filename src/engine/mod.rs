mod error;
mod mutations;
mod queries;
mod validate;

pub use error::{BookingError, Reference};
pub use validate::{check_consecutive_runs, check_daily_cap, check_date_window, normalize_slots};

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, RwLock};

use crate::catalog::SlotCatalog;
use crate::directory::{EquipmentCatalog, MemberDirectory};
use crate::limits::WAL_APPEND_RETRIES;
use crate::model::*;
use crate::wal::Wal;

pub type SharedSchedule = Arc<RwLock<EquipmentSchedule>>;
pub type SharedLedger = Arc<RwLock<MemberLedger>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond Ok to all senders.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];

                // Drain all immediately available appends
                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            // Flush current batch first, then handle the non-append command
                            flush_and_respond(&mut wal, &mut batch);
                            handle_non_append(&mut wal, other);
                            break;
                        }
                        Err(_) => break, // channel empty — flush batch
                    }
                }

                if !batch.is_empty() {
                    flush_and_respond(&mut wal, &mut batch);
                }
            }
            other => handle_non_append(&mut wal, other),
        }
    }
}

fn flush_and_respond(wal: &mut Wal, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    respond_batch(batch, &result);
}

fn flush_batch(
    wal: &mut Wal,
    batch: &mut [(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch.iter() {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush — even on append error — so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    if let Some(e) = append_err {
        return Err(e);
    }
    if let Some(e) = flush_err {
        return Err(e);
    }
    Ok(())
}

fn respond_batch(batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>, result: &io::Result<()>) {
    for (_, tx) in batch.drain(..) {
        let r = match result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_non_append(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!(),
    }
}

/// The booking engine: the only entry point for creating or cancelling
/// reservations, and the read side of the availability queries.
///
/// Per-equipment schedules and per-member ledgers each sit behind their own
/// `RwLock`; the commit path locks the equipment first, then the member, and
/// re-validates every rule under those locks before the WAL append.
pub struct Engine {
    pub(super) catalog: Arc<SlotCatalog>,
    pub(super) members: Arc<dyn MemberDirectory>,
    pub(super) equipment: Arc<dyn EquipmentCatalog>,
    pub(super) schedules: DashMap<EquipmentId, SharedSchedule>,
    pub(super) ledgers: DashMap<MemberId, SharedLedger>,
    pub(super) reservations: DashMap<ReservationId, Reservation>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

impl Engine {
    pub fn new(
        wal_path: PathBuf,
        catalog: SlotCatalog,
        members: Arc<dyn MemberDirectory>,
        equipment: Arc<dyn EquipmentCatalog>,
    ) -> io::Result<Self> {
        let events = Wal::replay(&wal_path)?;
        let wal = Wal::open(&wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let engine = Self {
            catalog: Arc::new(catalog),
            members,
            equipment,
            schedules: DashMap::new(),
            ledgers: DashMap::new(),
            reservations: DashMap::new(),
            wal_tx,
        };

        // Replay events — we're the sole owner of every lock here, so
        // try_write always succeeds instantly (no contention).
        for event in events {
            match event {
                Event::ReservationBooked { id, member_id, equipment_id, date, slots } => {
                    // A retried append may have written the event twice;
                    // apply once.
                    if engine.reservations.contains_key(&id) {
                        continue;
                    }
                    let reservation = Reservation { id, member_id, equipment_id, date, slots };
                    let sched = engine.schedule_entry(equipment_id);
                    sched
                        .try_write()
                        .expect("replay: uncontended write")
                        .claim_span(date, slots, id);
                    let ledger = engine.ledger_entry(member_id);
                    ledger
                        .try_write()
                        .expect("replay: uncontended write")
                        .add_span(date, slots);
                    engine.reservations.insert(id, reservation);
                }
                Event::ReservationCancelled { id } => {
                    if let Some((_, reservation)) = engine.reservations.remove(&id) {
                        if let Some(sched) = engine.schedule(reservation.equipment_id) {
                            sched
                                .try_write()
                                .expect("replay: uncontended write")
                                .release_span(reservation.date, reservation.slots);
                        }
                        if let Some(ledger) = engine.ledger(reservation.member_id) {
                            ledger
                                .try_write()
                                .expect("replay: uncontended write")
                                .remove_span(reservation.date, reservation.slots);
                        }
                    }
                }
            }
        }

        metrics::gauge!(crate::observability::RESERVATIONS_ACTIVE)
            .set(engine.reservations.len() as f64);
        Ok(engine)
    }

    pub fn catalog(&self) -> &SlotCatalog {
        &self.catalog
    }

    /// Write event to WAL via the background group-commit writer.
    async fn wal_append(&self, event: &Event) -> io::Result<()> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append {
                event: event.clone(),
                response: tx,
            })
            .await
            .map_err(|_| io::Error::other("WAL writer shut down"))?;
        rx.await
            .map_err(|_| io::Error::other("WAL writer dropped response"))?
    }

    /// WAL append with bounded retries for transient failures. Nothing is
    /// applied in memory until this returns Ok, so a failure leaves no
    /// partial write behind.
    pub(super) async fn persist(&self, event: &Event) -> Result<(), BookingError> {
        let mut last: Option<io::Error> = None;
        for _ in 0..WAL_APPEND_RETRIES {
            match self.wal_append(event).await {
                Ok(()) => return Ok(()),
                Err(e) => last = Some(e),
            }
        }
        let e = last.expect("at least one attempt");
        Err(BookingError::Storage(e.to_string()))
    }

    /// Schedule handle for equipment, created on first use.
    pub(super) fn schedule_entry(&self, equipment_id: EquipmentId) -> SharedSchedule {
        self.schedules
            .entry(equipment_id)
            .or_default()
            .value()
            .clone()
    }

    /// Schedule handle for equipment, `None` if nothing was ever booked on it.
    pub(super) fn schedule(&self, equipment_id: EquipmentId) -> Option<SharedSchedule> {
        self.schedules.get(&equipment_id).map(|e| e.value().clone())
    }

    pub(super) fn ledger_entry(&self, member_id: MemberId) -> SharedLedger {
        self.ledgers.entry(member_id).or_default().value().clone()
    }

    pub(super) fn ledger(&self, member_id: MemberId) -> Option<SharedLedger> {
        self.ledgers.get(&member_id).map(|e| e.value().clone())
    }
}
