//! Hard limits enforced by the booking rules.

/// Maximum slot-units one member may hold on a single date.
pub const DAILY_SLOT_CAP: u32 = 4;

/// Maximum length of a run of consecutive slots one member may hold on a
/// single date. A booking that would produce a longer run is rejected.
pub const MAX_CONSECUTIVE_SLOTS: usize = 2;

/// Maximum slot ids one reservation may own.
pub const MAX_SLOTS_PER_RESERVATION: usize = 2;

/// Reservations may be placed from today through today + this many days,
/// inclusive on both ends.
pub const BOOKING_WINDOW_DAYS: u64 = 7;

/// Bounded retries for a transient WAL append failure before the commit is
/// surfaced as a storage error. No partial write is ever visible.
pub const WAL_APPEND_RETRIES: usize = 3;
