//! Live log tailing for CI jobs.
//!
//! A [`coordinator::Coordinator`] owns one [`viewer::LogViewer`] per open job
//! and one push-stream connection for each, managed by
//! [`stream::ConnectionManager`]. Viewers keep every received record, a
//! filtered view over them, and the scroll state needed to render only the
//! rows that are on screen.

pub mod config;
pub mod coordinator;
pub mod core;
pub mod deep_link;
pub mod error;
pub mod record;
pub mod stream;
pub mod viewer;
