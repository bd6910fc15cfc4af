use crate::record::LogRecord;
use regex::{Regex, RegexBuilder};

/// User-controlled filter over a log buffer.
///
/// A record passes when its level is shown and, if a search text is set,
/// the text occurs case-insensitively in its message or timestamp.
#[derive(Clone, Debug, Default)]
pub struct FilterState {
    search_text: String,
    show_debug_and_trace: bool,
    matcher: Option<Regex>,
    /// Lowercased search text, used when the matcher could not be built.
    folded: String,
}

impl FilterState {
    pub fn new(search_text: impl Into<String>, show_debug_and_trace: bool) -> Self {
        let search_text = search_text.into();
        let matcher = compile_search(&search_text);
        let folded = search_text.to_lowercase();
        Self {
            search_text,
            show_debug_and_trace,
            matcher,
            folded,
        }
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }

    pub fn show_debug_and_trace(&self) -> bool {
        self.show_debug_and_trace
    }

    /// Case-insensitive matcher for the search text, `None` when searching is off.
    pub fn matcher(&self) -> Option<&Regex> {
        self.matcher.as_ref()
    }

    pub fn with_search(&self, search_text: impl Into<String>) -> Self {
        Self::new(search_text, self.show_debug_and_trace)
    }

    pub fn with_show_debug(&self, show: bool) -> Self {
        Self {
            show_debug_and_trace: show,
            ..self.clone()
        }
    }

    pub fn matches(&self, record: &LogRecord) -> bool {
        if !self.show_debug_and_trace && record.level.is_verbose() {
            return false;
        }
        if self.search_text.is_empty() {
            return true;
        }
        match &self.matcher {
            Some(re) => re.is_match(&record.message) || re.is_match(&record.timestamp),
            None => {
                record.message.to_lowercase().contains(&self.folded)
                    || record.timestamp.to_lowercase().contains(&self.folded)
            }
        }
    }
}

fn compile_search(text: &str) -> Option<Regex> {
    if text.is_empty() {
        return None;
    }
    // An escaped literal always compiles; size limits are the only failure mode,
    // and `matches` falls back to a plain substring scan then.
    RegexBuilder::new(&regex::escape(text))
        .case_insensitive(true)
        .build()
        .map_err(|e| tracing::warn!(error = %e, "search text rejected"))
        .ok()
}
