use jobtail::record::Level;
use ratatui::style::{Color, Modifier, Style};
use regex::Regex;
use std::sync::LazyLock;

static ERROR_WORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(error|fatal|fail(ed|ure)?|panic(ked)?)\b").unwrap());

#[derive(Clone)]
pub struct Span {
    /// Byte range into the highlighted text.
    pub start: usize,
    pub end: usize,
    pub style: Style,
    pub priority: u8,
}

pub fn level_style(level: &Level) -> Style {
    match level {
        Level::Error => Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        Level::Warn => Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        Level::Info => Style::default().fg(Color::Green),
        Level::Debug | Level::Trace => Style::default().fg(Color::Cyan),
        Level::Other(_) => Style::default().fg(Color::Gray),
    }
}

/// Spans for search matches and, at lower priority, failure keywords.
pub fn highlight_message(text: &str, search: Option<&Regex>) -> Vec<Span> {
    let mut spans = Vec::new();

    if let Some(re) = search {
        for m in re.find_iter(text) {
            spans.push(Span {
                start: m.start(),
                end: m.end(),
                style: Style::default()
                    .bg(Color::Yellow)
                    .fg(Color::Black)
                    .add_modifier(Modifier::BOLD),
                priority: 100,
            });
        }
    }

    for m in ERROR_WORDS.find_iter(text) {
        spans.push(Span {
            start: m.start(),
            end: m.end(),
            style: Style::default().fg(Color::Red),
            priority: 10,
        });
    }

    spans.sort_by(|a, b| a.start.cmp(&b.start).then(b.priority.cmp(&a.priority)));
    spans
}

/// Split `text` into styled runs; where spans overlap the higher priority wins.
pub fn apply_highlights(text: &str, spans: &[Span], base: Style) -> Vec<(String, Style)> {
    if spans.is_empty() {
        return vec![(text.to_string(), base)];
    }

    let mut style_at: Vec<(Style, u8)> = vec![(base, 0); text.len()];
    for span in spans {
        let end = span.end.min(text.len());
        for slot in &mut style_at[span.start.min(end)..end] {
            if span.priority >= slot.1 {
                *slot = (base.patch(span.style), span.priority);
            }
        }
    }

    let mut result = Vec::new();
    let mut pos = 0;
    while pos < text.len() {
        let current = style_at[pos].0;
        let mut end = pos + 1;
        while end < text.len() && (style_at[end].0 == current || !text.is_char_boundary(end)) {
            end += 1;
        }
        result.push((text[pos..end].to_string(), current));
        pos = end;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::RegexBuilder;

    #[test]
    fn test_search_match_wins_over_keyword() {
        let search = RegexBuilder::new("error").case_insensitive(true).build().unwrap();
        let text = "an Error here";
        let spans = highlight_message(text, Some(&search));
        let runs = apply_highlights(text, &spans, Style::default());
        let texts: Vec<&str> = runs.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(texts, vec!["an ", "Error", " here"]);
        assert_eq!(runs[1].1.bg, Some(Color::Yellow));
    }

    #[test]
    fn test_multibyte_text_splits_on_char_boundaries() {
        let search = RegexBuilder::new("é").case_insensitive(true).build().unwrap();
        let text = "cafÉ ok";
        let runs = apply_highlights(text, &highlight_message(text, Some(&search)), Style::default());
        let joined: String = runs.iter().map(|(t, _)| t.as_str()).collect();
        assert_eq!(joined, text);
        assert_eq!(runs[1].0, "É");
    }

    #[test]
    fn test_plain_text_single_run() {
        let runs = apply_highlights("all good", &highlight_message("all good", None), Style::default());
        assert_eq!(runs.len(), 1);
    }
}
