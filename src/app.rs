use crate::constants::WHEEL_ROWS;
use crate::input::{Edit, SearchBox};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseEvent, MouseEventKind};
use jobtail::coordinator::{Coordinator, InstanceId};
use jobtail::deep_link::DeepLink;
use jobtail::stream::Transport;
use jobtail::viewer::LogViewer;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JobSpec {
    pub job_id: String,
    pub url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    SearchEdit,
}

pub struct App<T: Transport> {
    pub coordinator: Coordinator<T>,
    pub jobs: Vec<JobSpec>,
    pub focused: usize,
    pub input_mode: InputMode,
    pub search: SearchBox,
    pub status_message: Option<String>,
    pub row_height: f64,
}

impl<T: Transport> App<T> {
    pub fn new(
        coordinator: Coordinator<T>,
        jobs: Vec<JobSpec>,
        row_height: f64,
        select: Option<DeepLink>,
    ) -> Self {
        let mut app = Self {
            coordinator,
            jobs,
            focused: 0,
            input_mode: InputMode::Normal,
            search: SearchBox::default(),
            status_message: None,
            row_height,
        };
        for job in app.jobs.clone() {
            app.coordinator.open_viewer(&job.job_id, &job.url);
        }
        if let Some(link) = select {
            app.apply_deep_link(&link);
        }
        app
    }

    fn apply_deep_link(&mut self, link: &DeepLink) {
        let Some(pos) = self.jobs.iter().position(|job| job.job_id == link.job_id) else {
            self.status_message = Some(format!("Unknown job in link: {}", link.job_id));
            return;
        };
        self.focused = pos;
        if let Some(line) = link.line {
            let id = self.focused_id();
            self.coordinator.open_at(&id, line);
        }
    }

    pub fn focused_id(&self) -> InstanceId {
        InstanceId::for_job(&self.jobs[self.focused].job_id)
    }

    pub fn focused_viewer(&self) -> Option<&LogViewer> {
        self.coordinator.viewer(&self.focused_id())
    }

    pub fn is_fullscreen(&self) -> bool {
        self.focused_viewer()
            .is_some_and(|viewer| viewer.viewport().is_fullscreen)
    }

    pub fn tick(&mut self, now: Instant) {
        self.coordinator.pump(now);
    }

    /// Returns true when the app should quit.
    pub fn handle_key(&mut self, key: KeyEvent, now: Instant) -> bool {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return true;
        }
        self.status_message = None;
        let id = self.focused_id();

        if self.input_mode == InputMode::SearchEdit {
            match self.search.handle_key(key.code) {
                Edit::Changed => {
                    self.coordinator.set_search(&id, &self.search.text);
                }
                Edit::Done => self.input_mode = InputMode::Normal,
                Edit::Unchanged => {}
            }
            return false;
        }

        let page = self.page_rows();
        match key.code {
            KeyCode::Char('q') => return true,
            KeyCode::Tab => self.focus_next(),
            KeyCode::Char('x') => self.toggle_focused_job(),
            KeyCode::Char('/') | KeyCode::Char('f') => {
                if self.coordinator.is_open(&id) {
                    self.input_mode = InputMode::SearchEdit;
                }
            }
            KeyCode::Char('d') => {
                let show = self
                    .focused_viewer()
                    .is_some_and(|viewer| !viewer.buffer().filter().show_debug_and_trace());
                self.coordinator.set_show_debug(&id, show);
            }
            KeyCode::Char('t') => {
                self.coordinator.toggle_follow_tail(&id);
            }
            KeyCode::Char('z') => {
                self.coordinator.toggle_fullscreen(&id);
            }
            KeyCode::Esc => {
                self.coordinator.exit_fullscreen(&id);
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.coordinator.scroll_by_rows(&id, -1, now);
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.coordinator.scroll_by_rows(&id, 1, now);
            }
            KeyCode::PageUp => {
                self.coordinator.scroll_by_rows(&id, -page, now);
            }
            KeyCode::PageDown => {
                self.coordinator.scroll_by_rows(&id, page, now);
            }
            KeyCode::Home | KeyCode::Char('g') => {
                self.coordinator.on_scroll(&id, 0.0, now);
            }
            KeyCode::End | KeyCode::Char('G') => {
                self.coordinator.on_scroll(&id, f64::MAX, now);
            }
            KeyCode::Char('v') => self.toggle_selection(),
            KeyCode::Char('J') => self.move_selection(1),
            KeyCode::Char('K') => self.move_selection(-1),
            _ => {}
        }
        false
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent, now: Instant) {
        let id = self.focused_id();
        match mouse.kind {
            MouseEventKind::ScrollUp => {
                self.coordinator.scroll_by_rows(&id, -WHEEL_ROWS, now);
            }
            MouseEventKind::ScrollDown => {
                self.coordinator.scroll_by_rows(&id, WHEEL_ROWS, now);
            }
            _ => {}
        }
    }

    fn page_rows(&self) -> i64 {
        self.focused_viewer()
            .map(|viewer| (viewer.viewport().container_height / self.row_height) as i64)
            .unwrap_or(1)
            .max(1)
    }

    fn focus_next(&mut self) {
        if self.jobs.is_empty() {
            return;
        }
        self.focused = (self.focused + 1) % self.jobs.len();
        let text = self
            .focused_viewer()
            .map(|viewer| viewer.buffer().filter().search_text().to_string())
            .unwrap_or_default();
        self.search.set(&text);
    }

    fn toggle_focused_job(&mut self) {
        let job = self.jobs[self.focused].clone();
        match self.coordinator.toggle_viewer(&job.job_id, &job.url) {
            Some(_) => {
                self.search.set("");
                self.status_message = Some(format!("Streaming logs for {}", job.job_id));
            }
            None => self.status_message = Some(format!("Closed logs for {}", job.job_id)),
        }
    }

    fn toggle_selection(&mut self) {
        let id = self.focused_id();
        let Some(viewer) = self.focused_viewer() else {
            return;
        };
        let line = match viewer.viewport().selected_line {
            Some(_) => None,
            None => viewer.visible_records().next().map(|record| record.sequence),
        };
        if let Some(link) = self.coordinator.select_line(&id, line) {
            self.status_message = Some(format!("#{link}"));
        }
    }

    fn move_selection(&mut self, delta: i64) {
        let id = self.focused_id();
        if let Some(link) = self.coordinator.move_selection(&id, delta) {
            self.status_message = Some(format!("#{link}"));
        }
    }
}
