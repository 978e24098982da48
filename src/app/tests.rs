use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use super::backend::{Dispatcher, HttpSearchBackend, SearchBackend, SearchCompletion};
use super::controller::{Completion, LoadingState, SearchSession};
use super::criteria::{FieldFilter, MatchMode, RankingMode, SearchCriteria};
use super::error::{FocusRejected, PlaybackUnavailable, SearchError};
use super::player::{PlaybackDevice, PlayerError};
use super::request::SearchRequest;
use super::result::EpisodeId;
use super::selection::{PlaybackOrigin, PlayerState};
use super::tui::{InputMode, KeyOutcome, TuiState, apply_completion, handle_key};
use super::{BackendVersion, apply_search_args};
use crate::cli::{FieldArg, ModeArg, RankingArg, SearchArgs};
use crate::config::BackendConfig;
use crate::http::test_server::{Behavior, TestServer};

type CallLog = Rc<RefCell<Vec<String>>>;

#[derive(Default)]
struct FakePlayer {
    calls: CallLog,
    source: Option<String>,
    fail_play: bool,
}

impl PlaybackDevice for FakePlayer {
    fn load(&mut self, source: &str) -> Result<(), PlayerError> {
        self.calls.borrow_mut().push(format!("load {source}"));
        self.source = Some(source.to_string());
        Ok(())
    }

    fn seek(&mut self, seconds: f64) -> Result<(), PlayerError> {
        self.calls.borrow_mut().push(format!("seek {seconds:.2}"));
        Ok(())
    }

    fn play(&mut self) -> Result<(), PlayerError> {
        self.calls.borrow_mut().push("play".to_string());
        if self.fail_play {
            return Err(PlayerError::NotConfigured);
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), PlayerError> {
        self.calls.borrow_mut().push("pause".to_string());
        Ok(())
    }

    fn stop(&mut self) {
        self.calls.borrow_mut().push("stop".to_string());
        self.source = None;
    }

    fn current_source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

fn session_with_log() -> (SearchSession, CallLog) {
    let calls = CallLog::default();
    let player = FakePlayer {
        calls: Rc::clone(&calls),
        ..FakePlayer::default()
    };
    (
        SearchSession::new(Box::new(player), Duration::from_secs(30)),
        calls,
    )
}

fn session() -> SearchSession {
    session_with_log().0
}

const TWO_RESULTS: &str = r#"[
    {
        "metadata": {
            "show": "Science Weekly",
            "title": "Heat",
            "episode_id": "ep-1",
            "audio": "https://cdn.example/ep-1.mp3"
        },
        "transcript": {
            "chunk": "the <mark>climate</mark> is warming",
            "start_time": "12.5s",
            "end_time": "42.5s"
        }
    },
    {
        "metadata": {"show": "Other", "title": "Ice", "episode_id": "ep-2"},
        "transcript": {"chunk": "ice", "start_time": 3, "end_time": 33}
    }
]"#;

fn ready_session() -> (SearchSession, CallLog) {
    let (mut session, calls) = session_with_log();
    session.criteria_mut().set_query_text("climate");
    let (token, _) = session.begin_search(Instant::now());
    assert_eq!(
        session.complete(token, Ok(TWO_RESULTS.to_string())),
        Completion::Applied
    );
    (session, calls)
}

fn backend_id(id: &str) -> EpisodeId {
    EpisodeId::Backend(id.to_string())
}

#[test]
fn new_session_starts_idle_with_default_criteria() {
    let session = session();
    assert_eq!(session.loading_state(), &LoadingState::Idle);
    assert!(session.results().is_empty());
    assert_eq!(session.focused_index(), None);
    assert_eq!(session.criteria(), &SearchCriteria::default());
    assert_eq!(session.player_state(), &PlayerState::Stopped);
}

#[test]
fn begin_search_snapshots_criteria_and_clears_focus() {
    let (mut session, _) = ready_session();
    session.focus(1).expect("focus second result");
    session.criteria_mut().set_field_filter(FieldFilter::Publisher);

    let (_, request) = session.begin_search(Instant::now());

    assert!(session.is_loading());
    assert_eq!(session.focused_index(), None);
    assert_eq!(request.q, "climate");
    assert_eq!(request.filter, "publisher");
    assert_eq!(session.results().len(), 2);
}

#[test]
fn ready_response_replaces_results_in_backend_order() {
    let (session, _) = ready_session();
    assert_eq!(session.loading_state(), &LoadingState::Ready);
    assert!(session.completed_at().is_some());
    let ids: Vec<EpisodeId> = session.results().iter().map(|r| r.id.clone()).collect();
    assert_eq!(ids, vec![backend_id("ep-1"), backend_id("ep-2")]);
}

#[test]
fn empty_result_list_is_ready_not_failed() {
    let mut session = session();
    let (token, _) = session.begin_search(Instant::now());
    session.complete(token, Ok("[]".to_string()));
    assert_eq!(session.loading_state(), &LoadingState::Ready);
    assert!(session.results().is_empty());
}

#[test]
fn malformed_body_fails_the_search_and_clears_results() {
    let (mut session, _) = ready_session();
    let (token, _) = session.begin_search(Instant::now());
    session.complete(token, Ok(r#"{"error":"bad query"}"#.to_string()));

    assert!(matches!(
        session.loading_state(),
        LoadingState::Failed(SearchError::MalformedResponse(_))
    ));
    assert!(session.results().is_empty());
}

#[test]
fn network_failure_is_reported_as_failed_state() {
    let mut session = session();
    let (token, _) = session.begin_search(Instant::now());
    session.complete(token, Err(SearchError::Network("refused".to_string())));
    assert_eq!(
        session.loading_state(),
        &LoadingState::Failed(SearchError::Network("refused".to_string()))
    );
}

#[test]
fn only_the_latest_search_reply_is_applied() {
    let mut session = session();
    let (first, _) = session.begin_search(Instant::now());
    let (second, _) = session.begin_search(Instant::now());

    let late_first = r#"[{"metadata":{"episode_id":"from-a"}}]"#.to_string();
    let second_body = r#"[{"metadata":{"episode_id":"from-b"}}]"#.to_string();

    assert_eq!(session.complete(second, Ok(second_body)), Completion::Applied);
    assert_eq!(session.complete(first, Ok(late_first)), Completion::Stale);

    assert_eq!(session.results().len(), 1);
    assert_eq!(session.results()[0].id, backend_id("from-b"));
}

#[test]
fn superseded_reply_arriving_first_is_still_discarded() {
    let mut session = session();
    let (first, _) = session.begin_search(Instant::now());
    let (_second, _) = session.begin_search(Instant::now());

    assert_eq!(
        session.complete(first, Ok(TWO_RESULTS.to_string())),
        Completion::Stale
    );
    assert!(session.is_loading());
    assert!(session.results().is_empty());
}

#[test]
fn overdue_search_times_out_and_its_late_reply_is_stale() {
    let mut session = session();
    let started = Instant::now();
    let (token, _) = session.begin_search(started);

    assert!(!session.expire_overdue(started + Duration::from_secs(5)));
    assert!(session.is_loading());
    assert!(session.expire_overdue(started + Duration::from_secs(31)));
    assert_eq!(
        session.loading_state(),
        &LoadingState::Failed(SearchError::Timeout)
    );

    assert_eq!(
        session.complete(token, Ok(TWO_RESULTS.to_string())),
        Completion::Stale
    );
    assert!(session.results().is_empty());
    assert!(!session.expire_overdue(started + Duration::from_secs(60)));
}

#[test]
fn checked_episodes_survive_new_searches() {
    let (mut session, _) = ready_session();
    assert_eq!(session.toggle_episode_at(0), Some(true));

    let (token, request) = session.begin_search(Instant::now());
    assert_eq!(request.selected_episodes.len(), 1);
    assert_eq!(request.selected_episodes[0].id, backend_id("ep-1"));

    session.complete(token, Ok("[]".to_string()));
    assert!(session.is_checked(&backend_id("ep-1")));
    assert_eq!(session.checked_count(), 1);
    assert_eq!(session.toggle_episode_at(0), None);
}

#[test]
fn focus_is_rejected_while_loading_or_out_of_range() {
    let (mut session, _) = ready_session();
    assert_eq!(session.focus(5), Err(FocusRejected::OutOfRange(5)));
    assert_eq!(session.focus(0), Ok(true));
    assert_eq!(session.focus(0), Ok(false));

    session.begin_search(Instant::now());
    assert_eq!(session.focus(0), Err(FocusRejected::Loading));
}

#[test]
fn playback_from_transcript_starts_at_match_time() {
    let (mut session, calls) = ready_session();
    session.focus(0).expect("focus");

    let cue = session
        .request_playback(PlaybackOrigin::Transcript)
        .expect("playback starts");

    assert_eq!(cue.source_url, "https://cdn.example/ep-1.mp3");
    assert_eq!(cue.start_time_seconds, 12.5);
    assert_eq!(
        calls.borrow().as_slice(),
        ["load https://cdn.example/ep-1.mp3", "seek 12.50", "play"]
    );
    assert_eq!(session.player_source(), Some("https://cdn.example/ep-1.mp3"));
}

#[test]
fn playback_from_beginning_ignores_match_time() {
    let (mut session, _) = ready_session();
    session.focus(0).expect("focus");
    let cue = session
        .request_playback(PlaybackOrigin::Beginning)
        .expect("playback starts");
    assert_eq!(cue.start_time_seconds, 0.0);
}

#[test]
fn unreadable_start_time_plays_from_zero() {
    let (mut session, _) = session_with_log();
    let (token, _) = session.begin_search(Instant::now());
    let body = r#"[{
        "metadata": {"episode_id": "x", "audio": "https://cdn.example/x.mp3"},
        "transcript": {"start_time": "abc"}
    }]"#;
    session.complete(token, Ok(body.to_string()));
    session.focus(0).expect("focus");

    let cue = session
        .request_playback(PlaybackOrigin::Transcript)
        .expect("playback starts");
    assert_eq!(cue.start_time_seconds, 0.0);
}

#[test]
fn playback_requires_focus_and_audio() {
    let (mut session, calls) = ready_session();
    assert_eq!(
        session.request_playback(PlaybackOrigin::Transcript),
        Err(PlaybackUnavailable::NoFocus)
    );

    session.focus(1).expect("focus");
    assert_eq!(
        session.request_playback(PlaybackOrigin::Transcript),
        Err(PlaybackUnavailable::NoAudio)
    );
    assert!(calls.borrow().is_empty());
    assert_eq!(session.player_state(), &PlayerState::Stopped);
}

#[test]
fn device_failure_leaves_player_stopped() {
    let calls = CallLog::default();
    let player = FakePlayer {
        calls: Rc::clone(&calls),
        fail_play: true,
        ..FakePlayer::default()
    };
    let mut session = SearchSession::new(Box::new(player), Duration::from_secs(30));
    let (token, _) = session.begin_search(Instant::now());
    session.complete(token, Ok(TWO_RESULTS.to_string()));
    session.focus(0).expect("focus");

    let err = session
        .request_playback(PlaybackOrigin::Transcript)
        .expect_err("device refuses");
    assert!(matches!(err, PlaybackUnavailable::Device(_)));
    assert_eq!(session.player_state(), &PlayerState::Stopped);
    assert_eq!(calls.borrow().last().map(String::as_str), Some("stop"));
}

#[test]
fn moving_focus_stops_playback() {
    let (mut session, calls) = ready_session();
    session.focus(0).expect("focus");
    session
        .request_playback(PlaybackOrigin::Transcript)
        .expect("playback starts");

    session.focus(1).expect("refocus");
    assert_eq!(session.player_state(), &PlayerState::Stopped);
    assert_eq!(calls.borrow().last().map(String::as_str), Some("stop"));
}

#[test]
fn new_search_stops_playback() {
    let (mut session, calls) = ready_session();
    session.focus(0).expect("focus");
    session
        .request_playback(PlaybackOrigin::Beginning)
        .expect("playback starts");

    session.begin_search(Instant::now());
    assert_eq!(session.player_state(), &PlayerState::Stopped);
    assert_eq!(calls.borrow().last().map(String::as_str), Some("stop"));
}

#[test]
fn toggle_pause_alternates_and_is_idle_when_stopped() {
    let (mut session, calls) = ready_session();
    assert_eq!(session.toggle_pause(), Ok(None));

    session.focus(0).expect("focus");
    session
        .request_playback(PlaybackOrigin::Transcript)
        .expect("playback starts");
    assert_eq!(session.toggle_pause(), Ok(Some(true)));
    assert!(matches!(session.player_state(), PlayerState::Paused(_)));
    assert_eq!(session.toggle_pause(), Ok(Some(false)));
    assert!(matches!(session.player_state(), PlayerState::Playing(_)));

    session.stop_playback();
    assert_eq!(session.player_state(), &PlayerState::Stopped);
    let log = calls.borrow();
    assert_eq!(&log[log.len() - 3..], ["pause", "play", "stop"]);
}

struct CannedBackend(&'static str);

impl SearchBackend for CannedBackend {
    fn fetch(&self, request: &SearchRequest) -> Result<String, SearchError> {
        if request.q == "fail" {
            return Err(SearchError::Network("unreachable".to_string()));
        }
        Ok(self.0.to_string())
    }
}

#[test]
fn dispatcher_delivers_completion_for_each_token() {
    let dispatcher = Dispatcher::new(Arc::new(CannedBackend("[]")));
    let mut session = session();
    session.criteria_mut().set_query_text("fail");
    let (token, request) = session.begin_search(Instant::now());
    dispatcher.dispatch(token, request);

    let completion = dispatcher
        .wait(Duration::from_secs(5))
        .expect("completion arrives");
    assert_eq!(completion.token, token);
    assert_eq!(
        completion.outcome,
        Err(SearchError::Network("unreachable".to_string()))
    );
    assert!(dispatcher.drain().is_empty());
}

#[test]
fn http_backend_sends_query_string_for_v1() {
    let server = TestServer::spawn(vec![Behavior::Respond(
        200,
        r#"[{"metadata":{"episode_id":"ep-9"}}]"#.to_string(),
    )]);
    let backend = HttpSearchBackend::new(BackendConfig {
        base_url: server.base_url.clone(),
        version: BackendVersion::V1,
        attempts: 1,
        ..BackendConfig::default()
    });

    let mut criteria = SearchCriteria::default();
    criteria.set_query_text("climate");
    criteria.set_match_mode(MatchMode::Ranking);
    criteria.set_ranking_mode(RankingMode::Bm25);
    let body = backend
        .fetch(&SearchRequest::from_criteria(&criteria))
        .expect("backend replies");

    assert!(body.contains("ep-9"));
    let lines = server.request_lines();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("GET /search?q=climate&filter=general&type=Ranking"));
    assert!(lines[0].contains("ranking=BM25"));
}

#[test]
fn http_backend_maps_status_errors_to_network() {
    let server = TestServer::spawn(vec![Behavior::Respond(404, "missing".to_string())]);
    let backend = HttpSearchBackend::new(BackendConfig {
        base_url: server.base_url.clone(),
        version: BackendVersion::V1,
        attempts: 1,
        ..BackendConfig::default()
    });

    let mut criteria = SearchCriteria::default();
    criteria.set_query_text("climate");
    let err = backend
        .fetch(&SearchRequest::from_criteria(&criteria))
        .expect_err("404 fails");
    assert!(matches!(err, SearchError::Network(message) if message.contains("404")));
    assert_eq!(server.request_count(), 1);
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn type_query(state: &mut TuiState, text: &str) {
    for ch in text.chars() {
        handle_key(state, key(KeyCode::Char(ch)), Instant::now());
    }
}

fn dispatched(outcome: KeyOutcome) -> SearchCompletion {
    match outcome {
        KeyOutcome::Dispatch(token, _) => SearchCompletion {
            token,
            outcome: Ok(TWO_RESULTS.to_string()),
        },
        other => panic!("expected a dispatch, got {other:?}"),
    }
}

#[test]
fn tui_enter_dispatches_typed_query() {
    let mut state = TuiState::new(session());
    type_query(&mut state, "climatx");
    handle_key(&mut state, key(KeyCode::Backspace), Instant::now());
    type_query(&mut state, "e");

    match handle_key(&mut state, key(KeyCode::Enter), Instant::now()) {
        KeyOutcome::Dispatch(_, request) => assert_eq!(request.q, "climate"),
        other => panic!("expected a dispatch, got {other:?}"),
    }
    assert_eq!(state.input_mode, InputMode::Browse);
    assert!(state.session.is_loading());
}

#[test]
fn tui_refuses_empty_query() {
    let mut state = TuiState::new(session());
    type_query(&mut state, "  ");
    let outcome = handle_key(&mut state, key(KeyCode::Enter), Instant::now());
    assert!(matches!(outcome, KeyOutcome::Continue));
    assert!(state.status.starts_with("ERROR:"));
    assert_eq!(state.session.loading_state(), &LoadingState::Idle);
}

#[test]
fn tui_completion_selects_first_row_and_enter_focuses_it() {
    let mut state = TuiState::new(session());
    type_query(&mut state, "climate");
    let completion = dispatched(handle_key(&mut state, key(KeyCode::Enter), Instant::now()));
    apply_completion(&mut state, completion);

    assert_eq!(state.cursor(), Some(0));
    handle_key(&mut state, key(KeyCode::Down), Instant::now());
    handle_key(&mut state, key(KeyCode::Down), Instant::now());
    assert_eq!(state.cursor(), Some(1));

    handle_key(&mut state, key(KeyCode::Enter), Instant::now());
    assert_eq!(state.session.focused_index(), Some(1));

    handle_key(&mut state, key(KeyCode::Esc), Instant::now());
    assert_eq!(state.session.focused_index(), None);
}

#[test]
fn tui_space_checks_and_c_clears() {
    let mut state = TuiState::new(session());
    type_query(&mut state, "climate");
    let completion = dispatched(handle_key(&mut state, key(KeyCode::Enter), Instant::now()));
    apply_completion(&mut state, completion);

    handle_key(&mut state, key(KeyCode::Char(' ')), Instant::now());
    assert!(state.session.is_checked(&backend_id("ep-1")));
    handle_key(&mut state, key(KeyCode::Char('c')), Instant::now());
    assert_eq!(state.session.checked_count(), 0);
}

#[test]
fn tui_facet_keys_edit_criteria() {
    let mut state = TuiState::new(session());
    handle_key(&mut state, key(KeyCode::Esc), Instant::now());

    handle_key(&mut state, key(KeyCode::Char('f')), Instant::now());
    assert_eq!(state.session.criteria().field_filter(), FieldFilter::ShowName);

    handle_key(&mut state, key(KeyCode::Char('r')), Instant::now());
    assert_eq!(state.session.criteria().match_mode(), MatchMode::Ranking);
    assert_eq!(
        state.session.criteria().ranking_mode(),
        Some(RankingMode::Pagerank)
    );
    handle_key(&mut state, key(KeyCode::Char('r')), Instant::now());
    assert_eq!(
        state.session.criteria().ranking_mode(),
        Some(RankingMode::Mix)
    );

    handle_key(&mut state, key(KeyCode::Char(']')), Instant::now());
    handle_key(&mut state, key(KeyCode::Char(']')), Instant::now());
    handle_key(&mut state, key(KeyCode::Char('[')), Instant::now());
    assert_eq!(state.session.criteria().time_bucket().seconds(), 60);
}

#[test]
fn tui_stale_completion_leaves_status_alone() {
    let mut state = TuiState::new(session());
    type_query(&mut state, "climate");
    let first = dispatched(handle_key(&mut state, key(KeyCode::Enter), Instant::now()));
    let second = handle_key(&mut state, key(KeyCode::F(5)), Instant::now());
    assert!(matches!(second, KeyOutcome::Dispatch(..)));
    let status = state.status.clone();

    apply_completion(&mut state, first);
    assert_eq!(state.status, status);
    assert!(state.session.is_loading());
}

#[test]
fn tui_quits_on_q_and_ctrl_c() {
    let mut state = TuiState::new(session());
    let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
    assert!(matches!(
        handle_key(&mut state, ctrl_c, Instant::now()),
        KeyOutcome::Quit
    ));

    handle_key(&mut state, key(KeyCode::Esc), Instant::now());
    assert!(matches!(
        handle_key(&mut state, key(KeyCode::Char('q')), Instant::now()),
        KeyOutcome::Quit
    ));
}

fn search_args(query: &str) -> SearchArgs {
    SearchArgs {
        query: query.to_string(),
        field: FieldArg::General,
        mode: ModeArg::Intersection,
        ranking: None,
        time: 30,
        selected: Vec::new(),
        json: false,
    }
}

#[test]
fn search_args_map_onto_criteria() {
    let mut criteria = SearchCriteria::default();
    let args = SearchArgs {
        field: FieldArg::Episode,
        mode: ModeArg::Ranking,
        ranking: Some(RankingArg::Bm25),
        time: 120,
        selected: vec!["ep-1".to_string(), " ".to_string()],
        ..search_args("climate")
    };
    apply_search_args(&mut criteria, &args).expect("valid args");

    let request = SearchRequest::from_criteria(&criteria);
    assert_eq!(request.q, "climate");
    assert_eq!(request.filter, "episode_name");
    assert_eq!(request.match_type, "Ranking");
    assert_eq!(request.ranking, Some("BM25"));
    assert_eq!(request.time, 120);
    assert_eq!(request.selected_episodes.len(), 1);
}

#[test]
fn search_args_reject_unknown_time_bucket() {
    let mut criteria = SearchCriteria::default();
    let args = SearchArgs {
        time: 45,
        ..search_args("climate")
    };
    let err = apply_search_args(&mut criteria, &args).expect_err("45s is not a bucket");
    assert!(err.to_string().contains("--time"));
}

#[test]
fn repeated_select_flag_keeps_the_episode_selected() {
    let mut criteria = SearchCriteria::default();
    let args = SearchArgs {
        selected: vec!["ep-1".to_string(), "ep-1".to_string()],
        ..search_args("climate")
    };
    apply_search_args(&mut criteria, &args).expect("valid args");

    let request = SearchRequest::from_criteria(&criteria);
    assert_eq!(request.selected_episodes.len(), 1);
    assert_eq!(request.selected_episodes[0].id, backend_id("ep-1"));
}
