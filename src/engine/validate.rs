use std::collections::BTreeSet;

use chrono::{Days, NaiveDate};

use crate::catalog::SlotCatalog;
use crate::limits::*;
use crate::model::{BookingRequest, MemberId, SlotId, SlotSpan};

use super::error::{BookingError, Reference};

pub(crate) fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

/// Date window: today through today + BOOKING_WINDOW_DAYS, inclusive.
pub fn check_date_window(date: NaiveDate, today: NaiveDate) -> Result<(), BookingError> {
    let max = today + Days::new(BOOKING_WINDOW_DAYS);
    if date < today || date > max {
        return Err(BookingError::DateOutOfRange { date });
    }
    Ok(())
}

/// Daily cap: the member's held slot-units plus the request must stay within
/// DAILY_SLOT_CAP.
pub fn check_daily_cap(
    member_id: MemberId,
    date: NaiveDate,
    held: u32,
    requested: u32,
) -> Result<(), BookingError> {
    if held + requested > DAILY_SLOT_CAP {
        return Err(BookingError::DailyLimitExceeded { member_id, date, held });
    }
    Ok(())
}

/// Consecutive-run limit over the member's same-day slots with the request
/// hypothetically added.
///
/// Runs chain on slot-id adjacency (`id + 1`) gated on catalog time
/// adjacency; the catalog guarantees ids ascend with start times, so the two
/// only diverge where the day has gaps between slots.
pub fn check_consecutive_runs(
    catalog: &SlotCatalog,
    held: &BTreeSet<SlotId>,
    span: SlotSpan,
) -> Result<(), BookingError> {
    let mut combined = held.clone();
    combined.extend(span.ids());

    let mut run: Vec<SlotId> = Vec::new();
    for &slot in combined.iter() {
        let chains = run
            .last()
            .is_some_and(|&prev| slot == prev + 1 && catalog.adjacent(prev, slot));
        if !chains {
            run.clear();
        }
        run.push(slot);
        if run.len() > MAX_CONSECUTIVE_SLOTS {
            // A pre-existing run never exceeds the limit, so the overflow
            // involves a requested slot; name it.
            let offending = run
                .iter()
                .copied()
                .find(|s| span.contains(*s))
                .unwrap_or(slot);
            return Err(BookingError::ConsecutiveLimitExceeded { slot: offending });
        }
    }
    Ok(())
}

/// Turn the raw request slot list into a validated `SlotSpan`: one or two
/// existing slots, ascending, adjacent if two, with `include_next_slot`
/// resolved against the catalog.
pub fn normalize_slots(
    catalog: &SlotCatalog,
    request: &BookingRequest,
) -> Result<SlotSpan, BookingError> {
    let mut ids = request.slots.clone();
    if ids.is_empty() {
        return Err(BookingError::MalformedRequest("no slots requested"));
    }
    if ids.len() > MAX_SLOTS_PER_RESERVATION {
        return Err(BookingError::MalformedRequest("more than two slots requested"));
    }
    ids.sort_unstable();
    if ids.len() == 2 && ids[0] == ids[1] {
        return Err(BookingError::MalformedRequest("duplicate slot id"));
    }
    for &id in &ids {
        if !catalog.contains(id) {
            return Err(BookingError::InvalidReference(Reference::Slot(id)));
        }
    }

    if request.include_next_slot {
        if ids.len() == 2 {
            return Err(BookingError::MalformedRequest(
                "include_next_slot combined with an explicit pair",
            ));
        }
        let current = catalog
            .slot(ids[0])
            .ok_or(BookingError::InvalidReference(Reference::Slot(ids[0])))?;
        let next = catalog
            .next_consecutive(current)
            .ok_or(BookingError::MalformedRequest("no next consecutive slot"))?;
        ids.push(next.id);
    }

    match ids[..] {
        [a] => Ok(SlotSpan::single(a)),
        [a, b] => {
            if !catalog.adjacent(a, b) {
                return Err(BookingError::MalformedRequest("slots are not adjacent"));
            }
            Ok(SlotSpan::pair(a, b))
        }
        _ => unreachable!("slot count bounded above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{PartOfDay, TimeSlot};

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn request(slots: &[SlotId], include_next_slot: bool) -> BookingRequest {
        BookingRequest {
            member_id: 1,
            equipment_id: 5,
            date: date("2026-08-10"),
            slots: slots.to_vec(),
            include_next_slot,
        }
    }

    fn held(slots: &[SlotId]) -> BTreeSet<SlotId> {
        slots.iter().copied().collect()
    }

    // ── date window ──────────────────────────────────────

    #[test]
    fn date_window_inclusive_bounds() {
        let today = date("2026-08-10");
        assert!(check_date_window(today, today).is_ok());
        assert!(check_date_window(date("2026-08-17"), today).is_ok()); // today + 7

        let past = check_date_window(date("2026-08-09"), today);
        assert!(matches!(past, Err(BookingError::DateOutOfRange { .. })));
        let far = check_date_window(date("2026-08-18"), today);
        assert!(matches!(far, Err(BookingError::DateOutOfRange { .. })));
    }

    // ── daily cap ────────────────────────────────────────

    #[test]
    fn daily_cap_boundaries() {
        let d = date("2026-08-10");
        assert!(check_daily_cap(1, d, 0, 2).is_ok());
        assert!(check_daily_cap(1, d, 3, 1).is_ok()); // exactly at the cap
        assert!(matches!(
            check_daily_cap(1, d, 3, 2),
            Err(BookingError::DailyLimitExceeded { held: 3, .. })
        ));
        assert!(matches!(
            check_daily_cap(1, d, 4, 1),
            Err(BookingError::DailyLimitExceeded { held: 4, .. })
        ));
    }

    // ── consecutive runs ─────────────────────────────────

    #[test]
    fn run_of_three_rejected() {
        let catalog = SlotCatalog::default();
        let result = check_consecutive_runs(&catalog, &held(&[1, 2]), SlotSpan::single(3));
        assert_eq!(
            result,
            Err(BookingError::ConsecutiveLimitExceeded { slot: 3 })
        );
    }

    #[test]
    fn gap_in_ids_breaks_the_run() {
        let catalog = SlotCatalog::default();
        assert!(check_consecutive_runs(&catalog, &held(&[1, 2]), SlotSpan::single(4)).is_ok());
        assert!(check_consecutive_runs(&catalog, &held(&[1, 5]), SlotSpan::single(3)).is_ok());
    }

    #[test]
    fn filling_a_gap_creates_the_run() {
        let catalog = SlotCatalog::default();
        let result = check_consecutive_runs(&catalog, &held(&[1, 3]), SlotSpan::single(2));
        assert_eq!(
            result,
            Err(BookingError::ConsecutiveLimitExceeded { slot: 2 })
        );
    }

    #[test]
    fn pair_next_to_existing_slot_rejected() {
        let catalog = SlotCatalog::default();
        let result = check_consecutive_runs(&catalog, &held(&[2]), SlotSpan::pair(3, 4));
        assert!(matches!(
            result,
            Err(BookingError::ConsecutiveLimitExceeded { .. })
        ));
    }

    #[test]
    fn pair_alone_is_fine() {
        let catalog = SlotCatalog::default();
        assert!(check_consecutive_runs(&catalog, &held(&[]), SlotSpan::pair(3, 4)).is_ok());
        assert!(check_consecutive_runs(&catalog, &held(&[7]), SlotSpan::pair(3, 4)).is_ok());
    }

    #[test]
    fn rebooking_a_held_slot_is_not_a_run() {
        // Same slot on a second machine: the distinct-slot set is unchanged.
        let catalog = SlotCatalog::default();
        assert!(check_consecutive_runs(&catalog, &held(&[3]), SlotSpan::single(3)).is_ok());
    }

    #[test]
    fn consecutive_ids_across_a_time_gap_do_not_chain() {
        // ids 2 and 3 are consecutive integers but the day has a break
        // between them, so they never form a run.
        let slot = |id, start, end| TimeSlot {
            id,
            start,
            end,
            part_of_day: PartOfDay::Morning,
        };
        let catalog = SlotCatalog::new(vec![
            slot(1, 480, 540),
            slot(2, 540, 600),
            slot(3, 780, 840),
            slot(4, 840, 900),
        ])
        .unwrap();

        assert!(check_consecutive_runs(&catalog, &held(&[1, 2]), SlotSpan::single(3)).is_ok());
        let within_block = check_consecutive_runs(&catalog, &held(&[3, 4]), SlotSpan::single(2));
        assert!(within_block.is_ok());
    }

    // ── slot normalization ───────────────────────────────

    #[test]
    fn normalize_single_and_pair() {
        let catalog = SlotCatalog::default();
        assert_eq!(
            normalize_slots(&catalog, &request(&[3], false)).unwrap(),
            SlotSpan::single(3)
        );
        assert_eq!(
            normalize_slots(&catalog, &request(&[3, 4], false)).unwrap(),
            SlotSpan::pair(3, 4)
        );
        // order of the input pair does not matter
        assert_eq!(
            normalize_slots(&catalog, &request(&[4, 3], false)).unwrap(),
            SlotSpan::pair(3, 4)
        );
    }

    #[test]
    fn normalize_rejects_bad_shapes() {
        let catalog = SlotCatalog::default();
        assert!(matches!(
            normalize_slots(&catalog, &request(&[], false)),
            Err(BookingError::MalformedRequest("no slots requested"))
        ));
        assert!(matches!(
            normalize_slots(&catalog, &request(&[1, 2, 3], false)),
            Err(BookingError::MalformedRequest(_))
        ));
        assert!(matches!(
            normalize_slots(&catalog, &request(&[3, 3], false)),
            Err(BookingError::MalformedRequest("duplicate slot id"))
        ));
        assert!(matches!(
            normalize_slots(&catalog, &request(&[3, 5], false)),
            Err(BookingError::MalformedRequest("slots are not adjacent"))
        ));
    }

    #[test]
    fn normalize_rejects_unknown_slot() {
        let catalog = SlotCatalog::default();
        assert_eq!(
            normalize_slots(&catalog, &request(&[99], false)),
            Err(BookingError::InvalidReference(Reference::Slot(99)))
        );
    }

    #[test]
    fn normalize_resolves_next_slot() {
        let catalog = SlotCatalog::default();
        assert_eq!(
            normalize_slots(&catalog, &request(&[3], true)).unwrap(),
            SlotSpan::pair(3, 4)
        );
    }

    #[test]
    fn normalize_next_slot_at_end_of_day_fails_whole_request() {
        let catalog = SlotCatalog::default();
        assert!(matches!(
            normalize_slots(&catalog, &request(&[12], true)),
            Err(BookingError::MalformedRequest("no next consecutive slot"))
        ));
    }

    #[test]
    fn normalize_next_slot_with_pair_rejected() {
        let catalog = SlotCatalog::default();
        assert!(matches!(
            normalize_slots(&catalog, &request(&[3, 4], true)),
            Err(BookingError::MalformedRequest(_))
        ));
    }
}
