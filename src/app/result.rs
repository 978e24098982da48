use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// Identity of one episode in a result list.
///
/// Backend ids are preferred; results that carry none are keyed by the position they
/// held in the response they arrived in.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) enum EpisodeId {
    Backend(String),
    Position(usize),
}

impl fmt::Display for EpisodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Backend(id) => f.write_str(id),
            Self::Position(idx) => write!(f, "{idx}"),
        }
    }
}

impl Serialize for EpisodeId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Backend(id) => serializer.serialize_str(id),
            Self::Position(idx) => serializer.serialize_u64(*idx as u64),
        }
    }
}

/// Transcript text that the backend already formatted (highlight tags included).
///
/// The markup is passed through as-is. Anything that renders it must decide
/// explicitly how much of it to honor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub(crate) struct TrustedMarkup(String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MarkupRun {
    pub(crate) text: String,
    pub(crate) highlighted: bool,
}

impl TrustedMarkup {
    pub(crate) fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    /// Splits the markup into plain text runs, flagging the ones inside `<mark>`.
    /// Every other tag is dropped.
    pub(crate) fn runs(&self) -> Vec<MarkupRun> {
        let mut runs: Vec<MarkupRun> = Vec::new();
        let mut depth = 0_usize;
        let mut rest = self.0.as_str();

        while !rest.is_empty() {
            let Some(open) = rest.find('<') else {
                push_run(&mut runs, rest, depth > 0);
                break;
            };
            push_run(&mut runs, &rest[..open], depth > 0);
            let tail = &rest[open..];
            let Some(close) = tail.find('>') else {
                push_run(&mut runs, tail, depth > 0);
                break;
            };
            let tag = tail[1..close].trim().to_ascii_lowercase();
            if tag == "mark" || tag.starts_with("mark ") {
                depth += 1;
            } else if tag == "/mark" {
                depth = depth.saturating_sub(1);
            }
            rest = &tail[close + 1..];
        }
        runs
    }

    pub(crate) fn plain_text(&self) -> String {
        self.runs().into_iter().map(|run| run.text).collect()
    }
}

fn push_run(runs: &mut Vec<MarkupRun>, text: &str, highlighted: bool) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = runs.last_mut()
        && last.highlighted == highlighted
    {
        last.text.push_str(text);
        return;
    }
    runs.push(MarkupRun {
        text: text.to_string(),
        highlighted,
    });
}

/// A transcript timing exactly as the backend sent it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Timestamp {
    Number(f64),
    Text(String),
}

impl Timestamp {
    pub(crate) fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_f64().map(Self::Number),
            Value::String(text) => Some(Self::Text(text.clone())),
            _ => None,
        }
    }

    /// Seconds from the start of the episode. Chunk timings are stored as `"5.43s"`,
    /// so a trailing `s` is accepted.
    pub(crate) fn seconds(&self) -> Option<f64> {
        let seconds = match self {
            Self::Number(value) => *value,
            Self::Text(text) => {
                let trimmed = text.trim();
                let numeric = trimmed.strip_suffix('s').unwrap_or(trimmed).trim_end();
                numeric.parse::<f64>().ok()?
            }
        };
        (seconds.is_finite() && seconds >= 0.0).then_some(seconds)
    }

    fn to_value(&self) -> Value {
        match self {
            Self::Number(value) => serde_json::Number::from_f64(*value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(text) => Value::String(text.clone()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct EpisodeMetadata {
    pub(crate) show: Option<String>,
    pub(crate) title: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) publisher: Option<String>,
    pub(crate) language: Option<String>,
    pub(crate) rss_link: Option<String>,
    pub(crate) audio_url: Option<String>,
    pub(crate) episode_image: Option<String>,
    pub(crate) episode_id: Option<String>,
    /// `episode_id` exactly as received, so it is echoed back with its original JSON type.
    pub(crate) raw_episode_id: Option<Value>,
    pub(crate) show_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TranscriptMatch {
    pub(crate) chunk: Option<TrustedMarkup>,
    pub(crate) start_time: Option<Timestamp>,
    pub(crate) end_time: Option<Timestamp>,
    pub(crate) matched_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SearchResult {
    pub(crate) id: EpisodeId,
    pub(crate) metadata: EpisodeMetadata,
    pub(crate) transcript: TranscriptMatch,
}

impl SearchResult {
    pub(crate) fn display_title(&self) -> &str {
        self.metadata
            .title
            .as_deref()
            .or(self.metadata.show.as_deref())
            .unwrap_or("(untitled)")
    }
}

/// Writes the record back in the backend's `{metadata, transcript}` shape, which is
/// what the backend expects for selected episodes in a structured request body.
impl Serialize for SearchResult {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut metadata = Map::new();
        let meta = &self.metadata;
        for (key, value) in [
            ("show", &meta.show),
            ("title", &meta.title),
            ("description", &meta.description),
            ("publisher", &meta.publisher),
            ("language", &meta.language),
            ("rss_link", &meta.rss_link),
            ("audio", &meta.audio_url),
            ("episode_image", &meta.episode_image),
            ("show_id", &meta.show_id),
        ] {
            if let Some(value) = value {
                metadata.insert(key.to_string(), Value::String(value.clone()));
            }
        }
        let episode_id = match (&meta.raw_episode_id, &meta.episode_id) {
            (Some(raw), _) => raw.clone(),
            (None, Some(id)) => Value::String(id.clone()),
            (None, None) => serde_json::to_value(&self.id).unwrap_or(Value::Null),
        };
        metadata.insert("episode_id".to_string(), episode_id);

        let mut transcript = Map::new();
        if let Some(chunk) = &self.transcript.chunk {
            transcript.insert("chunk".to_string(), Value::String(chunk.as_str().to_string()));
        }
        if let Some(start) = &self.transcript.start_time {
            transcript.insert("start_time".to_string(), start.to_value());
        }
        if let Some(end) = &self.transcript.end_time {
            transcript.insert("end_time".to_string(), end.to_value());
        }
        if let Some(query) = &self.transcript.matched_query {
            transcript.insert("query".to_string(), Value::String(query.clone()));
        }

        let mut record = Map::new();
        record.insert("metadata".to_string(), Value::Object(metadata));
        record.insert("transcript".to_string(), Value::Object(transcript));
        Value::Object(record).serialize(serializer)
    }
}
