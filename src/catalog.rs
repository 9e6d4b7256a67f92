use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Minutes, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PartOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl PartOfDay {
    pub fn label(self) -> &'static str {
        match self {
            PartOfDay::Morning => "Morning",
            PartOfDay::Afternoon => "Afternoon",
            PartOfDay::Evening => "Evening",
        }
    }
}

impl fmt::Display for PartOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A fixed bookable interval of the day. Reference data: created by
/// configuration, never by members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeSlot {
    pub id: SlotId,
    /// Minutes since midnight.
    pub start: Minutes,
    pub end: Minutes,
    pub part_of_day: PartOfDay,
}

impl TimeSlot {
    /// Rendered as `HH:MM–HH:MM (PartOfDay)`.
    pub fn label(&self) -> String {
        format!(
            "{}–{} ({})",
            format_minutes(self.start),
            format_minutes(self.end),
            self.part_of_day
        )
    }
}

pub fn format_minutes(m: Minutes) -> String {
    format!("{:02}:{:02}", m / 60, m % 60)
}

#[derive(Debug, PartialEq, Eq)]
pub enum CatalogError {
    Empty,
    BadInterval { slot: SlotId },
    DuplicateId { slot: SlotId },
    /// Slot ids must be allocated in ascending start-time order; the
    /// consecutive-run rule is keyed on id adjacency and relies on it.
    MisorderedIds { slot: SlotId },
    Overlap { slot: SlotId },
    Parse(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Empty => write!(f, "catalog has no slots"),
            CatalogError::BadInterval { slot } => {
                write!(f, "slot {slot} does not start before it ends")
            }
            CatalogError::DuplicateId { slot } => write!(f, "duplicate slot id {slot}"),
            CatalogError::MisorderedIds { slot } => {
                write!(f, "slot {slot} id out of ascending time order")
            }
            CatalogError::Overlap { slot } => write!(f, "slot {slot} overlaps its predecessor"),
            CatalogError::Parse(e) => write!(f, "catalog parse error: {e}"),
        }
    }
}

impl std::error::Error for CatalogError {}

/// The ordered, closed set of bookable slots.
#[derive(Debug, Clone)]
pub struct SlotCatalog {
    /// Sorted by start time; ids ascend with start times (validated).
    slots: Vec<TimeSlot>,
}

impl SlotCatalog {
    pub fn new(mut slots: Vec<TimeSlot>) -> Result<Self, CatalogError> {
        if slots.is_empty() {
            return Err(CatalogError::Empty);
        }
        slots.sort_by_key(|s| s.start);
        for pair in slots.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if next.id == prev.id {
                return Err(CatalogError::DuplicateId { slot: next.id });
            }
            if next.id < prev.id {
                return Err(CatalogError::MisorderedIds { slot: next.id });
            }
            if next.start < prev.end {
                return Err(CatalogError::Overlap { slot: next.id });
            }
        }
        for slot in &slots {
            if slot.start >= slot.end {
                return Err(CatalogError::BadInterval { slot: slot.id });
            }
        }
        Ok(Self { slots })
    }

    /// Parse a catalog from its JSON configuration form: an array of slots.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let slots: Vec<TimeSlot> =
            serde_json::from_str(json).map_err(|e| CatalogError::Parse(e.to_string()))?;
        Self::new(slots)
    }

    /// All slots in start-time order.
    pub fn all_slots(&self) -> &[TimeSlot] {
        &self.slots
    }

    pub fn slot(&self, id: SlotId) -> Option<&TimeSlot> {
        // ids ascend with start times, so the sort order admits binary search
        self.slots
            .binary_search_by_key(&id, |s| s.id)
            .ok()
            .map(|i| &self.slots[i])
    }

    pub fn contains(&self, id: SlotId) -> bool {
        self.slot(id).is_some()
    }

    pub fn slots_for_part_of_day(&self, part: PartOfDay) -> impl Iterator<Item = &TimeSlot> {
        self.slots.iter().filter(move |s| s.part_of_day == part)
    }

    /// The slot whose start equals `slot.end`, if the catalog has one.
    pub fn next_consecutive(&self, slot: &TimeSlot) -> Option<&TimeSlot> {
        let i = self.slots.partition_point(|s| s.start < slot.end);
        self.slots.get(i).filter(|s| s.start == slot.end)
    }

    /// True iff slot `a` ends exactly where slot `b` starts.
    pub fn adjacent(&self, a: SlotId, b: SlotId) -> bool {
        match (self.slot(a), self.slot(b)) {
            (Some(a), Some(b)) => a.end == b.start,
            _ => false,
        }
    }

    pub fn slot_label(&self, id: SlotId) -> Option<String> {
        self.slot(id).map(TimeSlot::label)
    }
}

/// Twelve one-hour slots, 08:00 through 20:00, ids ascending with time.
impl Default for SlotCatalog {
    fn default() -> Self {
        let part = |hour: Minutes| {
            if hour < 12 {
                PartOfDay::Morning
            } else if hour < 17 {
                PartOfDay::Afternoon
            } else {
                PartOfDay::Evening
            }
        };
        let slots = (0..12u16)
            .map(|i| {
                let hour = 8 + i;
                TimeSlot {
                    id: (i + 1) as SlotId,
                    start: hour * 60,
                    end: (hour + 1) * 60,
                    part_of_day: part(hour),
                }
            })
            .collect();
        Self::new(slots).expect("default catalog is well formed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(id: SlotId, start: Minutes, end: Minutes, part_of_day: PartOfDay) -> TimeSlot {
        TimeSlot { id, start, end, part_of_day }
    }

    #[test]
    fn default_catalog_ordered_and_adjacent() {
        let catalog = SlotCatalog::default();
        assert_eq!(catalog.all_slots().len(), 12);
        assert_eq!(catalog.all_slots()[0].start, 480); // 08:00
        for pair in catalog.all_slots().windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
            assert!(pair[0].id < pair[1].id);
        }
    }

    #[test]
    fn lookup_by_id() {
        let catalog = SlotCatalog::default();
        assert_eq!(catalog.slot(3).unwrap().start, 600);
        assert!(catalog.slot(99).is_none());
        assert!(catalog.contains(12));
        assert!(!catalog.contains(13));
    }

    #[test]
    fn part_of_day_filtering() {
        let catalog = SlotCatalog::default();
        let morning: Vec<_> = catalog.slots_for_part_of_day(PartOfDay::Morning).collect();
        assert_eq!(morning.len(), 4);
        assert!(morning.iter().all(|s| s.end <= 12 * 60));
        let evening: Vec<_> = catalog.slots_for_part_of_day(PartOfDay::Evening).collect();
        assert_eq!(evening.first().unwrap().start, 17 * 60);
    }

    #[test]
    fn next_consecutive_walks_the_day() {
        let catalog = SlotCatalog::default();
        let first = catalog.slot(1).unwrap();
        let second = catalog.next_consecutive(first).unwrap();
        assert_eq!(second.id, 2);
        assert_eq!(second.start, first.end);

        let last = catalog.slot(12).unwrap();
        assert!(catalog.next_consecutive(last).is_none());
    }

    #[test]
    fn next_consecutive_none_across_gap() {
        let catalog = SlotCatalog::new(vec![
            slot(1, 480, 540, PartOfDay::Morning),
            slot(2, 600, 660, PartOfDay::Morning),
        ])
        .unwrap();
        let first = catalog.slot(1).unwrap();
        assert!(catalog.next_consecutive(first).is_none());
        assert!(!catalog.adjacent(1, 2));
    }

    #[test]
    fn adjacency_is_directional() {
        let catalog = SlotCatalog::default();
        assert!(catalog.adjacent(2, 3));
        assert!(!catalog.adjacent(3, 2));
        assert!(!catalog.adjacent(2, 4));
        assert!(!catalog.adjacent(2, 99));
    }

    #[test]
    fn rejects_misordered_ids() {
        // id 5 starts before id 2: id order diverges from time order
        let result = SlotCatalog::new(vec![
            slot(5, 480, 540, PartOfDay::Morning),
            slot(2, 540, 600, PartOfDay::Morning),
        ]);
        assert_eq!(result.unwrap_err(), CatalogError::MisorderedIds { slot: 2 });
    }

    #[test]
    fn rejects_duplicates_overlaps_and_bad_intervals() {
        let dup = SlotCatalog::new(vec![
            slot(1, 480, 540, PartOfDay::Morning),
            slot(1, 540, 600, PartOfDay::Morning),
        ]);
        assert_eq!(dup.unwrap_err(), CatalogError::DuplicateId { slot: 1 });

        let overlap = SlotCatalog::new(vec![
            slot(1, 480, 560, PartOfDay::Morning),
            slot(2, 540, 600, PartOfDay::Morning),
        ]);
        assert_eq!(overlap.unwrap_err(), CatalogError::Overlap { slot: 2 });

        let bad = SlotCatalog::new(vec![slot(1, 540, 540, PartOfDay::Morning)]);
        assert_eq!(bad.unwrap_err(), CatalogError::BadInterval { slot: 1 });

        assert_eq!(SlotCatalog::new(vec![]).unwrap_err(), CatalogError::Empty);
    }

    #[test]
    fn from_json_roundtrip() {
        let json = r#"[
            {"id": 1, "start": 480, "end": 540, "part_of_day": "Morning"},
            {"id": 2, "start": 540, "end": 600, "part_of_day": "Morning"}
        ]"#;
        let catalog = SlotCatalog::from_json(json).unwrap();
        assert_eq!(catalog.all_slots().len(), 2);
        assert!(catalog.adjacent(1, 2));

        assert!(matches!(
            SlotCatalog::from_json("not json"),
            Err(CatalogError::Parse(_))
        ));
    }

    #[test]
    fn slot_labels() {
        let catalog = SlotCatalog::default();
        assert_eq!(
            catalog.slot_label(1).unwrap(),
            "08:00–09:00 (Morning)"
        );
        assert_eq!(
            catalog.slot_label(12).unwrap(),
            "19:00–20:00 (Evening)"
        );
        assert!(catalog.slot_label(13).is_none());
    }
}
