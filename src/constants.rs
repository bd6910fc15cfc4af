pub const TIMESTAMP_WIDTH: usize = 11;
pub const LINE_NUMBER_WIDTH: usize = 9;
pub const LEVEL_WIDTH: usize = 6;

pub const POLL_INTERVAL_MS: u64 = 16;

pub const INPUT_FIELD_HEIGHT: u16 = 3;
pub const STATUS_BAR_HEIGHT: u16 = 1;

pub const HELP_POPUP_WIDTH: u16 = 48;
pub const HELP_POPUP_HEIGHT: u16 = 5;

/// Rows scrolled by one mouse wheel notch.
pub const WHEEL_ROWS: i64 = 3;
