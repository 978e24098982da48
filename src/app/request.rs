use serde::{Deserialize, Serialize};
use serde_json::json;

use super::criteria::SearchCriteria;
use super::result::{EpisodeId, SearchResult};

pub(crate) const SEARCH_PATH: &str = "/search";

/// Snapshot of the criteria in the shape the backend's `/search` handler reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub(crate) struct SearchRequest {
    pub(crate) q: String,
    pub(crate) filter: &'static str,
    #[serde(rename = "type")]
    pub(crate) match_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) ranking: Option<&'static str>,
    pub(crate) time: u32,
    #[serde(rename = "selectedEpisodes")]
    pub(crate) selected_episodes: Vec<SelectedEpisode>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SelectedEpisode {
    pub(crate) id: EpisodeId,
    pub(crate) record: Option<SearchResult>,
}

impl Serialize for SelectedEpisode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match &self.record {
            Some(record) => record.serialize(serializer),
            None => json!({ "metadata": { "episode_id": self.id } }).serialize(serializer),
        }
    }
}

impl SearchRequest {
    /// The query text is carried verbatim; trimming and escaping belong elsewhere.
    pub(crate) fn from_criteria(criteria: &SearchCriteria) -> Self {
        Self {
            q: criteria.query_text().to_string(),
            filter: criteria.field_filter().wire_value(),
            match_type: criteria.match_mode().wire_value(),
            ranking: criteria.ranking_mode().map(|mode| mode.wire_value()),
            time: criteria.time_bucket().seconds(),
            selected_episodes: criteria
                .selected_episodes()
                .map(|(id, record)| SelectedEpisode {
                    id: id.clone(),
                    record: record.cloned(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
        }
    }
}

/// A request ready for the transport, independent of any HTTP client.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct EncodedRequest {
    pub(crate) method: HttpMethod,
    pub(crate) path: &'static str,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) json_body: Option<String>,
}

pub(crate) trait RequestEncoding: Send + Sync {
    fn encode(&self, request: &SearchRequest) -> Result<EncodedRequest, serde_json::Error>;
}

/// `GET /search?q=..` for backends that only take scalar parameters.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct QueryStringEncoding;

impl RequestEncoding for QueryStringEncoding {
    fn encode(&self, request: &SearchRequest) -> Result<EncodedRequest, serde_json::Error> {
        let mut query = vec![
            ("q".to_string(), request.q.clone()),
            ("filter".to_string(), request.filter.to_string()),
            ("type".to_string(), request.match_type.to_string()),
        ];
        if let Some(ranking) = request.ranking {
            query.push(("ranking".to_string(), ranking.to_string()));
        }
        query.push(("time".to_string(), request.time.to_string()));
        // One pair per id; a lone empty value means nothing is selected.
        if request.selected_episodes.is_empty() {
            query.push(("selectedEpisodes".to_string(), String::new()));
        }
        for episode in &request.selected_episodes {
            query.push(("selectedEpisodes".to_string(), episode.id.to_string()));
        }

        Ok(EncodedRequest {
            method: HttpMethod::Get,
            path: SEARCH_PATH,
            query,
            json_body: None,
        })
    }
}

/// `POST /search` with a JSON body, so selected episodes can travel as whole records.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct JsonBodyEncoding;

impl RequestEncoding for JsonBodyEncoding {
    fn encode(&self, request: &SearchRequest) -> Result<EncodedRequest, serde_json::Error> {
        Ok(EncodedRequest {
            method: HttpMethod::Post,
            path: SEARCH_PATH,
            query: Vec::new(),
            json_body: Some(serde_json::to_string(request)?),
        })
    }
}

/// Backend revision, which fixes the request encoding used against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum BackendVersion {
    V1,
    #[default]
    V2,
}

impl BackendVersion {
    pub(crate) fn encoding(self) -> &'static dyn RequestEncoding {
        match self {
            Self::V1 => &QueryStringEncoding,
            Self::V2 => &JsonBodyEncoding,
        }
    }
}
