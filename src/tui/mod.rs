use crate::app::{App, InputMode};
use crate::constants::{
    HELP_POPUP_HEIGHT, HELP_POPUP_WIDTH, INPUT_FIELD_HEIGHT, LEVEL_WIDTH, LINE_NUMBER_WIDTH,
    STATUS_BAR_HEIGHT, TIMESTAMP_WIDTH,
};
use crate::highlight::{apply_highlights, highlight_message, level_style};
use crate::input::SearchBox;
use jobtail::coordinator::InstanceId;
use jobtail::record::LogRecord;
use jobtail::stream::Transport;
use jobtail::viewer::{ConnectionStatus, LogViewer};
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use regex::Regex;

pub fn draw<T: Transport>(frame: &mut Frame, app: &mut App<T>) {
    if app.is_fullscreen() {
        let idx = app.focused;
        let area = frame.area();
        draw_job_pane(frame, app, idx, area);
        return;
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(INPUT_FIELD_HEIGHT),
            Constraint::Min(1),
            Constraint::Length(STATUS_BAR_HEIGHT),
        ])
        .split(frame.area());

    draw_search_input(
        frame,
        &app.search,
        chunks[0],
        app.input_mode == InputMode::SearchEdit,
    );

    let count = app.jobs.len().max(1) as u32;
    let panes = Layout::default()
        .direction(Direction::Vertical)
        .constraints((0..count).map(|_| Constraint::Ratio(1, count)))
        .split(chunks[1]);
    for (idx, area) in panes.iter().enumerate().take(app.jobs.len()) {
        draw_job_pane(frame, app, idx, *area);
    }

    draw_status_bar(frame, app, chunks[2]);

    if app.input_mode == InputMode::SearchEdit {
        draw_help_popup(frame);
    }
}

fn draw_search_input(frame: &mut Frame, input: &SearchBox, area: Rect, is_active: bool) {
    let style = if is_active {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };

    let widget = Paragraph::new(input.text.as_str())
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Search (/) ")
                .border_style(style),
        )
        .style(style);
    frame.render_widget(widget, area);

    if is_active {
        frame.set_cursor_position((area.x + input.cursor as u16 + 1, area.y + 1));
    }
}

fn draw_job_pane<T: Transport>(frame: &mut Frame, app: &mut App<T>, idx: usize, area: Rect) {
    let job_id = app.jobs[idx].job_id.clone();
    let id = InstanceId::for_job(&job_id);
    let focused = idx == app.focused;
    let border = if focused { Color::Cyan } else { Color::DarkGray };

    let inner_height = area.height.saturating_sub(2);
    app.coordinator
        .resize(&id, f64::from(inner_height) * app.row_height);

    let Some(viewer) = app.coordinator.viewer(&id) else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(format!(" {job_id} "))
            .border_style(Style::default().fg(border));
        let hidden = Paragraph::new("Logs hidden, press x to stream them")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(hidden, area);
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .title(pane_title(viewer))
        .border_style(Style::default().fg(border));

    match viewer.status() {
        ConnectionStatus::Reconnecting { attempts, error } => {
            let banner = Paragraph::new(vec![
                Line::from(Span::styled(
                    "Connection lost, retrying",
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                )),
                Line::from(Span::styled(
                    format!("attempt {attempts}: {error}"),
                    Style::default().fg(Color::DarkGray),
                )),
            ])
            .alignment(Alignment::Center)
            .wrap(Wrap { trim: true })
            .block(block);
            frame.render_widget(banner, area);
        }
        ConnectionStatus::Connecting if viewer.buffer().total() == 0 => {
            let waiting = Paragraph::new("Connecting...")
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(waiting, area);
        }
        _ => {
            let search = viewer.buffer().filter().matcher();
            let selected = viewer.viewport().selected_line;
            let lines: Vec<Line> = viewer
                .visible_records()
                .take(inner_height as usize)
                .map(|record| render_record(record, search, selected == Some(record.sequence)))
                .collect();
            frame.render_widget(Paragraph::new(lines).block(block), area);
        }
    }
}

fn pane_title(viewer: &LogViewer) -> String {
    let buffer = viewer.buffer();
    let viewport = viewer.viewport();
    format!(
        " {} [{}/{}] {}{}{}",
        viewer.job_id(),
        buffer.count(),
        buffer.total(),
        if viewport.follow_tail { "[FOLLOW] " } else { "" },
        if buffer.filter().show_debug_and_trace() {
            "[DEBUG] "
        } else {
            ""
        },
        if viewport.is_fullscreen {
            "[FULLSCREEN] "
        } else {
            ""
        },
    )
}

fn render_record(record: &LogRecord, search: Option<&Regex>, selected: bool) -> Line<'static> {
    let mut spans = vec![
        Span::styled(
            format!("{:<width$}", record.timestamp, width = TIMESTAMP_WIDTH),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{:>width$} │ ", record.sequence, width = LINE_NUMBER_WIDTH - 3),
            Style::default().fg(Color::DarkGray),
        ),
        Span::styled(
            format!("{:<width$}", record.level.to_string(), width = LEVEL_WIDTH),
            level_style(&record.level),
        ),
    ];

    let highlighted = apply_highlights(
        &record.message,
        &highlight_message(&record.message, search),
        Style::default(),
    );
    spans.extend(
        highlighted
            .into_iter()
            .map(|(text, style)| Span::styled(text, style)),
    );

    if selected {
        for span in &mut spans {
            span.style = span.style.add_modifier(Modifier::REVERSED);
        }
    }
    Line::from(spans)
}

fn draw_status_bar<T: Transport>(frame: &mut Frame, app: &App<T>, area: Rect) {
    let status = if let Some(msg) = &app.status_message {
        msg.clone()
    } else {
        let location = app
            .focused_viewer()
            .map(|viewer| format!(" | #{}", viewer.deep_link()))
            .unwrap_or_default();
        format!(
            "q:Quit /:Search d:Debug t:Follow v:Select z:Fullscreen x:Show/Hide Tab:Next{}",
            location
        )
    };

    let paragraph =
        Paragraph::new(status).style(Style::default().fg(Color::White).bg(Color::Blue));
    frame.render_widget(paragraph, area);
}

fn draw_help_popup(frame: &mut Frame) {
    let area = frame.area();
    let popup_area = Rect {
        x: area.width.saturating_sub(HELP_POPUP_WIDTH).max(area.x),
        y: area.y,
        width: HELP_POPUP_WIDTH.min(area.width),
        height: HELP_POPUP_HEIGHT.min(area.height),
    };

    let help_text = vec![
        Line::from("Typing filters live, case-insensitive"),
        Line::from("Matches message text and timestamps"),
        Line::from("Enter/Esc: Done | ←→: Move cursor"),
    ];

    let help = Paragraph::new(help_text)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Help ")
                .border_style(Style::default().fg(Color::Green)),
        )
        .style(Style::default().bg(Color::Black));

    frame.render_widget(Clear, popup_area);
    frame.render_widget(help, popup_area);
}
