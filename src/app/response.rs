use serde_json::{Map, Value};
use thiserror::Error;

use super::result::{
    EpisodeId, EpisodeMetadata, SearchResult, Timestamp, TranscriptMatch, TrustedMarkup,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub(crate) enum MalformedResponse {
    #[error("response is not valid JSON: {0}")]
    Undecodable(String),
    #[error("backend reported an error: {0}")]
    BackendError(String),
    #[error("expected a list of results, got {0}")]
    NotAList(&'static str),
}

/// Decodes and shapes a raw response body.
pub(crate) fn normalize_body(body: &str) -> Result<Vec<SearchResult>, MalformedResponse> {
    let value: Value = serde_json::from_str(body)
        .map_err(|err| MalformedResponse::Undecodable(err.to_string()))?;
    normalize_value(&value)
}

/// Produces one result per list element, in backend rank order.
pub(crate) fn normalize_value(value: &Value) -> Result<Vec<SearchResult>, MalformedResponse> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(object) => {
            if let Some(message) = object.get("error").and_then(Value::as_str) {
                return Err(MalformedResponse::BackendError(message.to_string()));
            }
            return Err(MalformedResponse::NotAList("an object"));
        }
        other => return Err(MalformedResponse::NotAList(value_kind(other))),
    };

    Ok(items
        .iter()
        .enumerate()
        .map(|(position, item)| normalize_item(position, item))
        .collect())
}

fn normalize_item(position: usize, item: &Value) -> SearchResult {
    let empty = Map::new();
    let object = item.as_object().unwrap_or(&empty);

    // The first backend revision returned flat records with no `metadata` wrapper.
    let metadata_object = match object.get("metadata").and_then(Value::as_object) {
        Some(metadata) => metadata,
        None if is_flat_record(object) => object,
        None => &empty,
    };
    let transcript_object = object
        .get("transcript")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let episode_id = text_field(metadata_object, "episode_id");
    let raw_episode_id = episode_id
        .as_ref()
        .and_then(|_| metadata_object.get("episode_id").cloned());
    let metadata = EpisodeMetadata {
        show: text_field(metadata_object, "show"),
        title: text_field(metadata_object, "title"),
        description: text_field(metadata_object, "description"),
        publisher: text_field(metadata_object, "publisher"),
        language: text_field(metadata_object, "language"),
        rss_link: text_field(metadata_object, "rss_link"),
        audio_url: text_field(metadata_object, "audio"),
        episode_image: text_field(metadata_object, "episode_image"),
        episode_id,
        raw_episode_id,
        show_id: text_field(metadata_object, "show_id"),
    };

    let transcript = TranscriptMatch {
        chunk: transcript_object
            .get("chunk")
            .and_then(Value::as_str)
            .filter(|chunk| !chunk.trim().is_empty())
            .map(TrustedMarkup::new),
        start_time: transcript_object
            .get("start_time")
            .and_then(Timestamp::from_value),
        end_time: transcript_object
            .get("end_time")
            .and_then(Timestamp::from_value),
        matched_query: text_field(transcript_object, "query"),
    };

    let id = metadata
        .episode_id
        .clone()
        .or_else(|| text_field(object, "id"))
        .map(EpisodeId::Backend)
        .unwrap_or(EpisodeId::Position(position));

    SearchResult {
        id,
        metadata,
        transcript,
    }
}

fn is_flat_record(object: &Map<String, Value>) -> bool {
    ["show", "title", "description"]
        .iter()
        .any(|key| object.contains_key(*key))
}

/// Strings and numbers are both accepted; blanks count as absent.
fn text_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    let text = match object.get(key)? {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
