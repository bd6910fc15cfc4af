use std::time::{Duration, Instant};

/// Geometry shared by every viewport: fixed row height, overscan rows,
/// and how close to the end still counts as "at the bottom".
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WindowLayout {
    pub row_height: f64,
    pub buffer_rows: usize,
    pub bottom_tolerance: f64,
    pub scroll_settle: Duration,
}

impl Default for WindowLayout {
    fn default() -> Self {
        Self {
            row_height: 20.0,
            buffer_rows: 2,
            bottom_tolerance: 10.0,
            scroll_settle: Duration::from_millis(100),
        }
    }
}

/// The slice of the filtered view that has to be materialized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VisibleWindow {
    pub start: usize,
    pub end: usize,
    pub visible_count: usize,
    /// Height reserved above `start` for rows that are not rendered.
    pub offset_top: f64,
    pub total_height: f64,
}

impl VisibleWindow {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Clone, Debug)]
pub struct ViewportState {
    pub layout: WindowLayout,
    pub scroll_offset: f64,
    pub container_height: f64,
    pub follow_tail: bool,
    /// Line number of the selected record.
    pub selected_line: Option<u64>,
    pub is_fullscreen: bool,
    settle_at: Option<Instant>,
}

impl ViewportState {
    pub fn new(layout: WindowLayout) -> Self {
        Self {
            layout,
            scroll_offset: 0.0,
            container_height: 0.0,
            follow_tail: true,
            selected_line: None,
            is_fullscreen: false,
            settle_at: None,
        }
    }

    pub fn total_height(&self, count: usize) -> f64 {
        count as f64 * self.layout.row_height
    }

    pub fn max_scroll(&self, count: usize) -> f64 {
        (self.total_height(count) - self.container_height).max(0.0)
    }

    pub fn window(&self, count: usize) -> VisibleWindow {
        let row_height = self.layout.row_height;
        let start = (self.scroll_offset / row_height).floor().max(0.0) as usize;
        let visible_count =
            (self.container_height / row_height).ceil().max(0.0) as usize + self.layout.buffer_rows;
        let end = count.min(start.saturating_add(visible_count));
        let start = start.min(end);
        VisibleWindow {
            start,
            end,
            visible_count,
            offset_top: start as f64 * row_height,
            total_height: self.total_height(count),
        }
    }

    pub fn is_at_bottom(&self, count: usize) -> bool {
        self.scroll_offset + self.container_height
            >= self.total_height(count) - self.layout.bottom_tolerance
    }

    pub fn scroll_to_bottom(&mut self, count: usize) {
        self.scroll_offset = self.max_scroll(count);
    }

    /// Called after records joined the filtered view.
    pub fn after_append(&mut self, count: usize) {
        if self.follow_tail {
            self.scroll_to_bottom(count);
        }
    }

    /// A user scroll. Leaving the bottom stops following at once; landing on
    /// the bottom resumes following once the scroll has settled.
    pub fn on_scroll(&mut self, offset: f64, count: usize, now: Instant) {
        self.scroll_offset = offset.clamp(0.0, self.max_scroll(count));
        if !self.is_at_bottom(count) {
            self.follow_tail = false;
        }
        self.settle_at = Some(now + self.layout.scroll_settle);
    }

    pub fn scroll_by_rows(&mut self, rows: i64, count: usize, now: Instant) {
        let offset = self.scroll_offset + rows as f64 * self.layout.row_height;
        self.on_scroll(offset, count, now);
    }

    /// Apply a pending bottom check whose settle window has elapsed.
    pub fn settle(&mut self, count: usize, now: Instant) {
        if let Some(at) = self.settle_at {
            if now >= at {
                self.settle_at = None;
                self.follow_tail = self.is_at_bottom(count);
            }
        }
    }

    pub fn resize(&mut self, container_height: f64, count: usize) {
        self.container_height = container_height.max(0.0);
        if self.follow_tail {
            self.scroll_to_bottom(count);
        } else {
            self.clamp(count);
        }
    }

    pub fn clamp(&mut self, count: usize) {
        self.scroll_offset = self.scroll_offset.clamp(0.0, self.max_scroll(count));
    }

    pub fn reset_to_top(&mut self) {
        self.scroll_offset = 0.0;
        self.follow_tail = false;
        self.settle_at = None;
    }

    pub fn set_follow_tail(&mut self, follow: bool, count: usize) {
        self.follow_tail = follow;
        self.settle_at = None;
        if follow {
            self.scroll_to_bottom(count);
        }
    }

    /// Scroll just enough for the row at `filtered_idx` to be fully visible.
    pub fn reveal(&mut self, filtered_idx: usize, count: usize) {
        let top = filtered_idx as f64 * self.layout.row_height;
        let bottom = top + self.layout.row_height;
        if top < self.scroll_offset {
            self.scroll_offset = top;
        } else if bottom > self.scroll_offset + self.container_height {
            self.scroll_offset = bottom - self.container_height;
        }
        self.clamp(count);
    }

    pub fn toggle_fullscreen(&mut self) {
        self.is_fullscreen = !self.is_fullscreen;
    }

    /// Exit requested from outside the viewer, e.g. the host's escape key.
    pub fn exit_fullscreen(&mut self) {
        self.is_fullscreen = false;
    }
}
