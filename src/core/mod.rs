pub mod filter_state;
pub mod log_state;
pub mod viewport;

pub use filter_state::FilterState;
pub use log_state::LogBuffer;
pub use viewport::{ViewportState, VisibleWindow, WindowLayout};
