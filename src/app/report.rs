use anyhow::Result;
use serde::Serialize;

use super::controller::{LoadingState, SearchSession};
use super::format::{format_time_range, single_line, truncate};
use super::result::{EpisodeId, SearchResult};

#[derive(Serialize)]
struct RankedResult<'a> {
    rank: usize,
    id: &'a EpisodeId,
    #[serde(flatten)]
    record: &'a SearchResult,
}

pub(crate) fn render_table(session: &SearchSession) -> String {
    let results = session.results();
    if results.is_empty() {
        return "No results.".to_string();
    }

    let mut out = format!(
        "{:<5} {:<2} {:<28} {:<40} {:<20} {:<15}\n",
        "RANK", "", "SHOW", "TITLE", "PUBLISHER", "MATCH"
    );
    for (position, result) in results.iter().enumerate() {
        let check = if session.is_checked(&result.id) { "x" } else { "" };
        let meta = &result.metadata;
        out.push_str(&format!(
            "{:<5} {:<2} {:<28} {:<40} {:<20} {:<15}\n",
            position + 1,
            check,
            truncate(meta.show.as_deref().unwrap_or("-"), 28),
            truncate(meta.title.as_deref().unwrap_or("-"), 40),
            truncate(meta.publisher.as_deref().unwrap_or("-"), 20),
            format_time_range(
                result.transcript.start_time.as_ref(),
                result.transcript.end_time.as_ref()
            ),
        ));
        if let Some(chunk) = &result.transcript.chunk {
            out.push_str(&format!(
                "      {}\n",
                truncate(&single_line(&chunk.plain_text()), 110)
            ));
        }
    }
    out
}

pub(crate) fn render_json(session: &SearchSession) -> Result<String> {
    let ranked: Vec<RankedResult<'_>> = session
        .results()
        .iter()
        .enumerate()
        .map(|(position, record)| RankedResult {
            rank: position + 1,
            id: &record.id,
            record,
        })
        .collect();
    Ok(serde_json::to_string_pretty(&ranked)?)
}

pub(crate) fn describe_state(session: &SearchSession) -> String {
    match session.loading_state() {
        LoadingState::Idle => "No search yet.".to_string(),
        LoadingState::Loading => "Searching...".to_string(),
        LoadingState::Ready => format!("{} result(s)", session.results().len()),
        LoadingState::Failed(err) => format!("Search failed: {err}"),
    }
}
