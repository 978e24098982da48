use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Cell, Paragraph, Row, Table, Wrap};

use super::super::controller::{LoadingState, SearchSession};
use super::super::format::{
    format_clock, format_completed_at, format_time_range, single_line, truncate,
};
use super::super::result::SearchResult;
use super::super::selection::PlayerState;
use super::{InputMode, TuiState};

const ACCENT: Color = Color::Rgb(110, 170, 255);
const MUTED: Color = Color::Rgb(185, 195, 210);
const TEXT: Color = Color::Rgb(230, 230, 230);

pub(super) fn draw_tui(frame: &mut Frame, state: &mut TuiState) {
    let TuiState {
        session,
        table_state,
        input_mode,
        status,
    } = state;

    let bg = Block::default().style(Style::default().bg(Color::Black));
    frame.render_widget(bg, frame.area());

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(3),
            Constraint::Length(3),
        ])
        .split(frame.area());

    frame.render_widget(
        Paragraph::new(criteria_line(session))
            .alignment(Alignment::Center)
            .block(panel_block("Search")),
        chunks[0],
    );

    let editing = *input_mode == InputMode::EditQuery;
    let query_text = if editing {
        format!("{}_", session.criteria().query_text())
    } else {
        session.criteria().query_text().to_string()
    };
    let query_style = if editing {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(TEXT)
    };
    frame.render_widget(
        Paragraph::new(query_text)
            .style(query_style)
            .block(panel_block(if editing { "Query (editing)" } else { "Query" })),
        chunks[1],
    );

    let body_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(58), Constraint::Percentage(42)])
        .split(chunks[2]);

    let loading = session.is_loading();
    let focused = session.focused_index();
    let rows: Vec<Row> = session
        .results()
        .iter()
        .enumerate()
        .map(|(position, result)| {
            let check = if session.is_checked(&result.id) {
                "[x]"
            } else {
                "[ ]"
            };
            let marker = if focused == Some(position) { "●" } else { "" };
            let row = Row::new(vec![
                Cell::from(format!("{:>2}", position + 1)),
                Cell::from(check),
                Cell::from(marker),
                Cell::from(result.metadata.show.clone().unwrap_or_else(|| "-".to_string())),
                Cell::from(result.display_title().to_string()),
            ]);
            if loading {
                row.style(Style::default().fg(Color::DarkGray))
            } else {
                row
            }
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Percentage(35),
            Constraint::Percentage(65),
        ],
    )
    .header(
        Row::new(vec!["#", "", "", "Show", "Episode"]).style(
            Style::default()
                .fg(ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
    )
    .block(panel_block("Results"))
    .row_highlight_style(
        Style::default()
            .bg(ACCENT)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD),
    )
    .highlight_symbol("▸ ");
    frame.render_stateful_widget(table, body_chunks[0], table_state);

    let details = match session.focused_result() {
        Some(result) => detail_lines(session, result),
        None => vec![Line::from(Span::styled(
            empty_detail_text(session),
            Style::default().fg(MUTED),
        ))],
    };
    frame.render_widget(
        Paragraph::new(details)
            .style(Style::default().fg(TEXT))
            .wrap(Wrap { trim: true })
            .block(panel_block("Episode")),
        body_chunks[1],
    );

    frame.render_widget(
        Paragraph::new(controls_line(*input_mode))
            .alignment(Alignment::Center)
            .block(panel_block("Controls")),
        chunks[3],
    );

    frame.render_widget(
        Paragraph::new(status.clone())
            .style(status_style(status))
            .block(panel_block("Status")),
        chunks[4],
    );
}

fn criteria_line(session: &SearchSession) -> Line<'static> {
    let criteria = session.criteria();
    let mut spans = vec![
        Span::styled(
            "PODSEARCH",
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        ),
        Span::raw("   "),
        facet("field", criteria.field_filter().label().to_string()),
        facet("match", criteria.match_mode().wire_value().to_string()),
    ];
    if let Some(ranking) = criteria.ranking_mode() {
        spans.push(facet("ranking", ranking.wire_value().to_string()));
    }
    spans.push(facet("context", criteria.time_bucket().label()));
    spans.push(facet("checked", session.checked_count().to_string()));
    spans.push(Span::styled(
        state_label(session),
        Style::default().fg(Color::Yellow),
    ));
    Line::from(spans)
}

fn facet(name: &'static str, value: String) -> Span<'static> {
    Span::styled(
        format!("{name}: {value}   "),
        Style::default().fg(MUTED),
    )
}

fn state_label(session: &SearchSession) -> String {
    match session.loading_state() {
        LoadingState::Idle => "idle".to_string(),
        LoadingState::Loading => "loading...".to_string(),
        LoadingState::Ready => match session.completed_at() {
            Some(at) => format!("ready ({})", format_completed_at(at)),
            None => "ready".to_string(),
        },
        LoadingState::Failed(_) => "failed".to_string(),
    }
}

fn empty_detail_text(session: &SearchSession) -> String {
    match session.loading_state() {
        LoadingState::Loading => "Searching...".to_string(),
        LoadingState::Failed(err) => format!("Search failed.\n\n{err}"),
        _ if session.results().is_empty() => {
            "No results yet.\n\nPress / to type a query, Enter to search.".to_string()
        }
        _ => "Move to a result and press Enter to open it.".to_string(),
    }
}

fn detail_lines(session: &SearchSession, result: &SearchResult) -> Vec<Line<'static>> {
    let meta = &result.metadata;
    let mut lines = vec![
        Line::from(Span::styled(
            result.display_title().to_string(),
            Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
        )),
        Line::raw(""),
    ];
    for (label, value) in [
        ("Show", meta.show.as_deref()),
        ("Publisher", meta.publisher.as_deref()),
        ("Language", meta.language.as_deref()),
        ("RSS", meta.rss_link.as_deref()),
    ] {
        lines.push(field_line(label, value.unwrap_or("-")));
    }
    lines.push(field_line("Episode id", &result.id.to_string()));
    lines.push(field_line(
        "Match",
        &format_time_range(
            result.transcript.start_time.as_ref(),
            result.transcript.end_time.as_ref(),
        ),
    ));
    if let Some(query) = &result.transcript.matched_query {
        lines.push(field_line("Matched query", query));
    }
    lines.push(field_line("Audio", &player_text(session, result)));

    if let Some(chunk) = &result.transcript.chunk {
        lines.push(Line::raw(""));
        lines.push(section_title("Transcript"));
        let spans: Vec<Span<'static>> = chunk
            .runs()
            .into_iter()
            .map(|run| {
                let text = single_line_keep_edges(&run.text);
                if run.highlighted {
                    Span::styled(
                        text,
                        Style::default()
                            .fg(Color::Black)
                            .bg(Color::Yellow)
                            .add_modifier(Modifier::BOLD),
                    )
                } else {
                    Span::raw(text)
                }
            })
            .collect();
        lines.push(Line::from(spans));
    }

    if let Some(description) = &meta.description {
        lines.push(Line::raw(""));
        lines.push(section_title("Description"));
        lines.push(Line::raw(truncate(&single_line(description), 600)));
    }
    lines
}

fn player_text(session: &SearchSession, result: &SearchResult) -> String {
    if result.metadata.audio_url.is_none() {
        return "not available".to_string();
    }
    let source = session
        .player_source()
        .map(|source| truncate(source, 40))
        .unwrap_or_default();
    match session.player_state() {
        PlayerState::Stopped => "stopped (p: from match, b: from start)".to_string(),
        PlayerState::Playing(cue) => format!(
            "playing {source} from {}",
            format_clock(cue.start_time_seconds)
        ),
        PlayerState::Paused(cue) => format!(
            "paused {source} (started {})",
            format_clock(cue.start_time_seconds)
        ),
    }
}

/// Like `single_line`, but keeps one leading/trailing space so adjacent runs stay apart.
fn single_line_keep_edges(text: &str) -> String {
    let core = single_line(text);
    let lead = if text.starts_with(char::is_whitespace) { " " } else { "" };
    let trail = if text.ends_with(char::is_whitespace) && !core.is_empty() {
        " "
    } else {
        ""
    };
    format!("{lead}{core}{trail}")
}

fn field_line(label: &'static str, value: &str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label}: "), Style::default().fg(MUTED)),
        Span::raw(truncate(value, 80)),
    ])
}

fn section_title(title: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        title,
        Style::default().fg(ACCENT).add_modifier(Modifier::BOLD),
    ))
}

fn panel_block(title: &'static str) -> Block<'static> {
    Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(Color::Rgb(125, 135, 150)))
        .title(title)
}

fn pill(label: &'static str, active: bool) -> Span<'static> {
    let style = if active {
        Style::default()
            .bg(ACCENT)
            .fg(Color::Black)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .bg(Color::Rgb(72, 82, 96))
            .fg(Color::Rgb(230, 235, 242))
    };
    Span::styled(label, style)
}

fn controls_line(mode: InputMode) -> Line<'static> {
    let hints = match mode {
        InputMode::EditQuery => "   type query  Enter search  Esc browse",
        InputMode::Browse => {
            "   ↑/↓ move  Enter open  Space check  / query  f/m/r facets  [/] context  p/b play  x pause  s stop  F5 retry  q quit"
        }
    };
    Line::from(vec![
        pill(" EDIT ", mode == InputMode::EditQuery),
        Span::raw(" "),
        pill(" BROWSE ", mode == InputMode::Browse),
        Span::styled(hints, Style::default().fg(MUTED)),
    ])
}

fn status_style(status: &str) -> Style {
    if status.starts_with("ERROR:") {
        Style::default()
            .fg(Color::Rgb(255, 145, 120))
            .add_modifier(Modifier::BOLD)
    } else if status.starts_with("INFO:") {
        Style::default().fg(Color::Rgb(205, 165, 255))
    } else {
        Style::default().fg(Color::Rgb(230, 235, 242))
    }
}
