use std::time::Instant;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::super::backend::SearchCompletion;
use super::super::controller::{Completion, LoadingState, RequestToken};
use super::super::criteria::MatchMode;
use super::super::format::{format_clock, truncate};
use super::super::request::SearchRequest;
use super::super::selection::PlaybackOrigin;
use super::{InputMode, TuiState};

#[derive(Debug)]
pub(crate) enum KeyOutcome {
    Continue,
    Dispatch(RequestToken, SearchRequest),
    Quit,
}

pub(crate) fn status_info(msg: &str) -> String {
    format!("INFO: {msg}")
}

pub(crate) fn status_error(msg: &str) -> String {
    format!("ERROR: {msg}")
}

pub(crate) fn apply_completion(state: &mut TuiState, completion: SearchCompletion) {
    if state.session.complete(completion.token, completion.outcome) == Completion::Stale {
        return;
    }
    match state.session.loading_state() {
        LoadingState::Ready => {
            let count = state.session.results().len();
            state
                .table_state
                .select((count > 0).then_some(0));
            state.status = if count == 0 {
                status_info("No results.")
            } else {
                status_info(&format!(
                    "{count} result(s). Enter opens details, Space checks an episode."
                ))
            };
        }
        LoadingState::Failed(err) => {
            state.table_state.select(None);
            state.status = status_error(&format!("Search failed: {err}. Press F5 to retry."));
        }
        LoadingState::Idle | LoadingState::Loading => {}
    }
}

pub(crate) fn handle_key(state: &mut TuiState, key: KeyEvent, now: Instant) -> KeyOutcome {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyOutcome::Quit;
    }
    match state.input_mode {
        InputMode::EditQuery => handle_edit_key(state, key, now),
        InputMode::Browse => handle_browse_key(state, key, now),
    }
}

fn handle_edit_key(state: &mut TuiState, key: KeyEvent, now: Instant) -> KeyOutcome {
    match key.code {
        KeyCode::Enter => {
            state.input_mode = InputMode::Browse;
            start_search(state, now)
        }
        KeyCode::Esc => {
            state.input_mode = InputMode::Browse;
            KeyOutcome::Continue
        }
        KeyCode::Backspace => {
            state.session.criteria_mut().query_text_mut().pop();
            KeyOutcome::Continue
        }
        KeyCode::Char(ch) => {
            state.session.criteria_mut().query_text_mut().push(ch);
            KeyOutcome::Continue
        }
        _ => KeyOutcome::Continue,
    }
}

fn start_search(state: &mut TuiState, now: Instant) -> KeyOutcome {
    if state.session.criteria().query_text().trim().is_empty() {
        state.status = status_error("Type a query first (press /).");
        return KeyOutcome::Continue;
    }
    let (token, request) = state.session.begin_search(now);
    state.status = status_info(&format!("Searching for \"{}\"...", truncate(&request.q, 40)));
    KeyOutcome::Dispatch(token, request)
}

fn handle_browse_key(state: &mut TuiState, key: KeyEvent, now: Instant) -> KeyOutcome {
    match key.code {
        KeyCode::Char('q') => return KeyOutcome::Quit,
        KeyCode::Char('/') | KeyCode::Char('i') => {
            state.input_mode = InputMode::EditQuery;
            state.status = status_info("Editing query. Enter searches, Esc cancels.");
        }
        KeyCode::F(5) => return start_search(state, now),
        KeyCode::Up | KeyCode::Char('k') => move_cursor(state, -1),
        KeyCode::Down | KeyCode::Char('j') => move_cursor(state, 1),
        KeyCode::Enter => focus_cursor(state),
        KeyCode::Esc => {
            state.session.clear_focus();
            state.status = status_info("Details closed.");
        }
        KeyCode::Char(' ') => toggle_check(state),
        KeyCode::Char('c') => {
            state.session.criteria_mut().clear_selected_episodes();
            state.status = status_info("Cleared checked episodes.");
        }
        KeyCode::Char('f') => {
            let criteria = state.session.criteria_mut();
            criteria.set_field_filter(criteria.field_filter().next());
            state.status = status_info(&format!(
                "Field: {}",
                state.session.criteria().field_filter().label()
            ));
        }
        KeyCode::Char('m') => {
            let criteria = state.session.criteria_mut();
            criteria.set_match_mode(criteria.match_mode().next());
            state.status = status_info(&format!(
                "Match: {}",
                state.session.criteria().match_mode().wire_value()
            ));
        }
        KeyCode::Char('r') => cycle_ranking(state),
        KeyCode::Char('[') => step_time_bucket(state, false),
        KeyCode::Char(']') => step_time_bucket(state, true),
        KeyCode::Char('p') => play(state, PlaybackOrigin::Transcript),
        KeyCode::Char('b') => play(state, PlaybackOrigin::Beginning),
        KeyCode::Char('x') => toggle_pause(state),
        KeyCode::Char('s') => {
            state.session.stop_playback();
            state.status = status_info("Playback stopped.");
        }
        _ => {}
    }
    KeyOutcome::Continue
}

fn move_cursor(state: &mut TuiState, delta: isize) {
    let len = state.session.results().len();
    if len == 0 {
        return;
    }
    let current = state.table_state.selected().unwrap_or(0);
    let next = current.saturating_add_signed(delta).min(len - 1);
    state.table_state.select(Some(next));
}

fn focus_cursor(state: &mut TuiState) {
    let Some(cursor) = state.cursor() else {
        state.status = status_error("No result selected.");
        return;
    };
    match state.session.focus(cursor) {
        Ok(_) => {
            state.status = status_info(&format!(
                "Opened #{}. p plays from the match, b from the start.",
                cursor + 1
            ));
        }
        Err(err) => state.status = status_error(&format!("Cannot open result: {err}.")),
    }
}

fn toggle_check(state: &mut TuiState) {
    let Some(cursor) = state.cursor() else {
        return;
    };
    if let Some(checked) = state.session.toggle_episode_at(cursor) {
        let verb = if checked { "Checked" } else { "Unchecked" };
        state.status = status_info(&format!(
            "{verb} #{} ({} checked).",
            cursor + 1,
            state.session.checked_count()
        ));
    }
}

fn cycle_ranking(state: &mut TuiState) {
    let criteria = state.session.criteria_mut();
    match criteria.ranking_mode() {
        Some(current) => criteria.set_ranking_mode(current.next()),
        None => criteria.set_match_mode(MatchMode::Ranking),
    }
    let ranking = criteria.ranking_mode().unwrap_or_default();
    state.status = status_info(&format!("Match: Ranking, ranking: {}", ranking.wire_value()));
}

fn step_time_bucket(state: &mut TuiState, forward: bool) {
    let criteria = state.session.criteria_mut();
    let current = criteria.time_bucket();
    criteria.set_time_bucket(if forward {
        current.next()
    } else {
        current.previous()
    });
    state.status = status_info(&format!(
        "Context: {}",
        state.session.criteria().time_bucket().label()
    ));
}

fn play(state: &mut TuiState, origin: PlaybackOrigin) {
    match state.session.request_playback(origin) {
        Ok(cue) => {
            state.status = status_info(&format!(
                "Playing from {}.",
                format_clock(cue.start_time_seconds)
            ));
        }
        Err(err) => state.status = status_error(&format!("Cannot play: {err}.")),
    }
}

fn toggle_pause(state: &mut TuiState) {
    match state.session.toggle_pause() {
        Ok(Some(true)) => state.status = status_info("Paused."),
        Ok(Some(false)) => state.status = status_info("Resumed."),
        Ok(None) => state.status = status_info("Nothing is playing."),
        Err(err) => state.status = status_error(&format!("Cannot pause: {err}.")),
    }
}
