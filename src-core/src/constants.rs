/// Decimal precision for display
pub const DISPLAY_DECIMAL_PRECISION: u32 = 2;

/// Month bucket labels carry the year so January of different years
/// never merge into one bucket.
pub const MONTH_LABEL_FORMAT: &str = "%b %Y";

/// Capacity of each owner's snapshot broadcast channel. Pushes are
/// whole-snapshot replacements, so a lagged receiver loses nothing it
/// cannot recover from the next push.
pub const SNAPSHOT_CHANNEL_CAPACITY: usize = 16;
