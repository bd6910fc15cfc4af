//! State of one open log viewer.
//!
//! A viewer is mutated only by the loop that owns it: stream events are
//! applied with [`LogViewer::apply`], user actions through the other methods.

use crate::core::{FilterState, LogBuffer, ViewportState, VisibleWindow, WindowLayout};
use crate::deep_link::DeepLink;
use crate::record::{decode_batch, LogRecord};
use crate::stream::StreamEvent;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connecting,
    Live,
    Reconnecting { attempts: u32, error: String },
}

pub struct LogViewer {
    job_id: String,
    buffer: LogBuffer,
    viewport: ViewportState,
    status: ConnectionStatus,
    location: DeepLink,
    reveal_pending: bool,
}

impl LogViewer {
    pub fn new(job_id: impl Into<String>, layout: WindowLayout, show_debug: bool) -> Self {
        let job_id = job_id.into();
        Self {
            location: DeepLink::new(job_id.clone(), None),
            job_id,
            buffer: LogBuffer::new(FilterState::new("", show_debug)),
            viewport: ViewportState::new(layout),
            status: ConnectionStatus::Connecting,
            reveal_pending: false,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn buffer(&self) -> &LogBuffer {
        &self.buffer
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// The token published for the current selection.
    pub fn deep_link(&self) -> &DeepLink {
        &self.location
    }

    pub fn apply(&mut self, event: StreamEvent) {
        match event {
            StreamEvent::Opened => self.status = ConnectionStatus::Live,
            StreamEvent::Batch(raw) => self.append(decode_batch(&raw)),
            StreamEvent::Error {
                message,
                retry_count,
            } => {
                self.status = ConnectionStatus::Reconnecting {
                    attempts: retry_count,
                    error: message,
                }
            }
        }
    }

    pub fn append(&mut self, records: Vec<LogRecord>) {
        if records.is_empty() {
            return;
        }
        let before = self.buffer.count();
        self.buffer.append(records);
        let count = self.buffer.count();
        self.viewport.after_append(count);
        if !self.reveal_pending {
            return;
        }
        if self.viewport.follow_tail {
            self.reveal_pending = false;
            return;
        }
        // Earlier positions were already checked; only the new tail can hold the line.
        let found = self
            .viewport
            .selected_line
            .and_then(|line| self.buffer.position_from(line, before));
        if let Some(idx) = found {
            self.viewport.reveal(idx, count);
            self.reveal_pending = false;
        }
    }

    pub fn window(&self) -> VisibleWindow {
        self.viewport.window(self.buffer.count())
    }

    /// Records to materialize for the current scroll position.
    pub fn visible_records(&self) -> impl Iterator<Item = &LogRecord> + '_ {
        let window = self.window();
        self.buffer.slice(window.start, window.end)
    }

    pub fn set_search(&mut self, text: &str) {
        let was_empty = self.buffer.filter().search_text().is_empty();
        if self.buffer.filter().search_text() == text {
            return;
        }
        let filter = self.buffer.filter().with_search(text);
        self.buffer.set_filter(filter);
        let count = self.buffer.count();
        if was_empty != text.is_empty() {
            self.viewport.reset_to_top();
        } else if self.viewport.follow_tail {
            self.viewport.scroll_to_bottom(count);
        } else {
            self.viewport.clamp(count);
        }
        if self.reveal_pending {
            self.reveal_selected();
        }
    }

    /// Changing level visibility always jumps to the newest records.
    pub fn set_show_debug(&mut self, show: bool) {
        if self.buffer.filter().show_debug_and_trace() == show {
            return;
        }
        let filter = self.buffer.filter().with_show_debug(show);
        self.buffer.set_filter(filter);
        self.reveal_pending = false;
        self.viewport.reset_to_top();
        self.viewport.set_follow_tail(true, self.buffer.count());
    }

    pub fn toggle_follow_tail(&mut self) {
        let follow = !self.viewport.follow_tail;
        if follow {
            self.reveal_pending = false;
        }
        self.viewport.set_follow_tail(follow, self.buffer.count());
    }

    pub fn on_scroll(&mut self, offset: f64, now: Instant) {
        self.reveal_pending = false;
        self.viewport.on_scroll(offset, self.buffer.count(), now);
    }

    pub fn scroll_by_rows(&mut self, rows: i64, now: Instant) {
        self.reveal_pending = false;
        self.viewport.scroll_by_rows(rows, self.buffer.count(), now);
    }

    pub fn scroll_to_top(&mut self, now: Instant) {
        self.on_scroll(0.0, now);
    }

    pub fn settle(&mut self, now: Instant) {
        self.viewport.settle(self.buffer.count(), now);
        if self.viewport.follow_tail {
            self.reveal_pending = false;
        }
    }

    pub fn resize(&mut self, container_height: f64) {
        self.viewport.resize(container_height, self.buffer.count());
    }

    /// Select a line (or clear the selection) and publish the new location.
    pub fn select_line(&mut self, line: Option<u64>) -> &DeepLink {
        self.reveal_pending = false;
        self.viewport.selected_line = line;
        self.location = DeepLink::new(self.job_id.clone(), line);
        &self.location
    }

    /// Select `line` and scroll to it as soon as it is in the filtered view.
    pub fn open_at(&mut self, line: u64) {
        self.select_line(Some(line));
        self.viewport.follow_tail = false;
        self.reveal_pending = true;
        self.reveal_selected();
    }

    /// Move the selection `delta` records through the filtered view.
    pub fn move_selection(&mut self, delta: i64) -> Option<&DeepLink> {
        let current = self
            .viewport
            .selected_line
            .and_then(|line| self.buffer.position_of(line))?;
        let target = (current as i64 + delta).clamp(0, self.buffer.count() as i64 - 1) as usize;
        let line = self.buffer.get(target)?.sequence;
        self.viewport.follow_tail = false;
        self.viewport.reveal(target, self.buffer.count());
        Some(self.select_line(Some(line)))
    }

    pub fn toggle_fullscreen(&mut self) {
        self.viewport.toggle_fullscreen();
    }

    pub fn exit_fullscreen(&mut self) {
        self.viewport.exit_fullscreen();
    }

    fn reveal_selected(&mut self) {
        let Some(line) = self.viewport.selected_line else {
            self.reveal_pending = false;
            return;
        };
        if let Some(idx) = self.buffer.position_of(line) {
            self.viewport.reveal(idx, self.buffer.count());
            self.reveal_pending = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Level;
    use serde_json::json;
    use std::time::Duration;

    fn viewer() -> LogViewer {
        let mut viewer = LogViewer::new("job-1", WindowLayout::default(), false);
        viewer.resize(600.0);
        viewer
    }

    fn records(range: std::ops::RangeInclusive<u64>) -> Vec<LogRecord> {
        range
            .map(|line| LogRecord {
                timestamp: "12:00:00.0".to_string(),
                message: format!("line {line}"),
                level: if line % 10 == 0 { Level::Debug } else { Level::Info },
                sequence: line,
            })
            .collect()
    }

    #[test]
    fn test_stream_events_drive_status() {
        let mut viewer = viewer();
        assert_eq!(viewer.status(), &ConnectionStatus::Connecting);
        viewer.apply(StreamEvent::Error {
            message: "refused".to_string(),
            retry_count: 3,
        });
        assert_eq!(
            viewer.status(),
            &ConnectionStatus::Reconnecting {
                attempts: 3,
                error: "refused".to_string()
            }
        );
        viewer.apply(StreamEvent::Opened);
        assert_eq!(viewer.status(), &ConnectionStatus::Live);

        viewer.apply(StreamEvent::Batch(vec![
            json!({"message": "a", "line": 1, "level": "debug"}),
            json!({"message": "b", "line": 2}),
            json!({"line": 3}),
        ]));
        assert_eq!(viewer.buffer().total(), 2);
        assert_eq!(viewer.buffer().count(), 1);
    }

    #[test]
    fn test_tail_follow_until_user_scrolls_up() {
        let mut viewer = viewer();
        let now = Instant::now();
        viewer.append(records(1..=100));
        let count = viewer.buffer().count();
        assert!(viewer.viewport().is_at_bottom(count));

        viewer.append(records(101..=105));
        let count = viewer.buffer().count();
        assert!(viewer.viewport().is_at_bottom(count));
        assert_eq!(viewer.window().end, count);

        viewer.scroll_by_rows(-1, now);
        assert!(!viewer.viewport().follow_tail);
        let offset = viewer.viewport().scroll_offset;
        viewer.append(records(106..=120));
        viewer.settle(now + Duration::from_secs(1));
        assert_eq!(viewer.viewport().scroll_offset, offset);
        assert!(!viewer.viewport().follow_tail);

        viewer.toggle_follow_tail();
        let count = viewer.buffer().count();
        assert!(viewer.viewport().is_at_bottom(count));
    }

    #[test]
    fn test_search_boundary_resets_scroll() {
        let mut viewer = viewer();
        viewer.append(records(1..=200));
        viewer.set_search("line 1");
        assert_eq!(viewer.viewport().scroll_offset, 0.0);
        assert!(!viewer.viewport().follow_tail);

        viewer.scroll_by_rows(20, Instant::now());
        viewer.set_search("line 19");
        assert!(!viewer.viewport().follow_tail);
        assert_eq!(viewer.buffer().count(), 10);
        assert_eq!(viewer.viewport().scroll_offset, 0.0);

        viewer.set_search("");
        assert_eq!(viewer.viewport().scroll_offset, 0.0);
        assert!(!viewer.viewport().follow_tail);
    }

    #[test]
    fn test_debug_toggle_pins_tail() {
        let mut viewer = viewer();
        viewer.append(records(1..=200));
        viewer.scroll_to_top(Instant::now());
        assert!(!viewer.viewport().follow_tail);

        viewer.set_show_debug(true);
        assert_eq!(viewer.buffer().count(), 200);
        assert!(viewer.viewport().follow_tail);
        assert!(viewer.viewport().is_at_bottom(200));
    }

    #[test]
    fn test_selection_publishes_deep_link() {
        let mut viewer = viewer();
        viewer.append(records(1..=5));
        assert_eq!(viewer.select_line(Some(3)).to_string(), "job-1:3");
        assert_eq!(viewer.move_selection(1).map(ToString::to_string), Some("job-1:4".to_string()));
        assert_eq!(viewer.move_selection(10).map(ToString::to_string), Some("job-1:5".to_string()));
        assert_eq!(viewer.select_line(None).to_string(), "job-1");
        assert!(viewer.move_selection(1).is_none());
    }

    #[test]
    fn test_open_at_reveals_once_line_arrives() {
        let mut viewer = viewer();
        viewer.open_at(155);
        viewer.append(records(1..=100));
        assert_eq!(viewer.viewport().scroll_offset, 0.0);
        viewer.append(records(101..=300));
        let window = viewer.window();
        let visible: Vec<u64> = viewer.visible_records().map(|r| r.sequence).collect();
        assert!(visible.contains(&155), "window {window:?}");
        assert_eq!(viewer.deep_link().to_string(), "job-1:155");
    }

    #[test]
    fn test_follow_tail_wins_over_pending_reveal() {
        let mut viewer = viewer();
        viewer.open_at(505);
        viewer.toggle_follow_tail();
        assert!(viewer.viewport().follow_tail);
        viewer.append(records(1..=1000));
        let count = viewer.buffer().count();
        assert!(viewer.viewport().follow_tail);
        assert!(viewer.viewport().is_at_bottom(count));
    }

    #[test]
    fn test_new_selection_drops_pending_reveal() {
        let mut viewer = viewer();
        viewer.open_at(5000);
        viewer.append(records(1..=100));
        viewer.select_line(Some(3));
        viewer.toggle_follow_tail();
        viewer.append(records(101..=200));
        let count = viewer.buffer().count();
        assert!(viewer.viewport().follow_tail);
        assert!(viewer.viewport().is_at_bottom(count));
        assert_eq!(viewer.deep_link().to_string(), "job-1:3");
    }

    #[test]
    fn test_manual_scroll_drops_pending_reveal() {
        let mut viewer = viewer();
        viewer.open_at(155);
        viewer.append(records(1..=100));
        viewer.scroll_by_rows(5, Instant::now());
        let offset = viewer.viewport().scroll_offset;
        viewer.append(records(101..=300));
        assert_eq!(viewer.viewport().scroll_offset, offset);
    }

    #[test]
    fn test_reveal_found_in_later_batch() {
        let mut viewer = viewer();
        viewer.open_at(2995);
        for start in (0..30).map(|i| i * 100 + 1) {
            viewer.append(records(start..=start + 99));
        }
        let visible: Vec<u64> = viewer.visible_records().map(|r| r.sequence).collect();
        assert!(visible.contains(&2995), "visible {visible:?}");
        assert!(!viewer.viewport().follow_tail);
    }

    #[test]
    fn test_fullscreen_leaves_filter_alone() {
        let mut viewer = viewer();
        viewer.append(records(1..=20));
        viewer.set_search("line 2");
        let count = viewer.buffer().count();
        viewer.toggle_fullscreen();
        assert!(viewer.viewport().is_fullscreen);
        viewer.exit_fullscreen();
        assert!(!viewer.viewport().is_fullscreen);
        assert_eq!(viewer.buffer().count(), count);
    }
}
