use super::result::{EpisodeId, SearchResult};

/// Seconds of transcript context per match, in the order the selector steps through them.
pub(crate) const TIME_BUCKETS: [u32; 6] = [30, 60, 90, 120, 180, 300];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum FieldFilter {
    #[default]
    General,
    ShowName,
    Publisher,
    EpisodeTitle,
}

impl FieldFilter {
    pub(crate) fn wire_value(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::ShowName => "show_name",
            Self::Publisher => "publisher",
            Self::EpisodeTitle => "episode_name",
        }
    }

    pub(crate) fn label(self) -> &'static str {
        match self {
            Self::General => "General",
            Self::ShowName => "Show",
            Self::Publisher => "Publisher",
            Self::EpisodeTitle => "Episode title",
        }
    }

    pub(crate) fn next(self) -> Self {
        match self {
            Self::General => Self::ShowName,
            Self::ShowName => Self::Publisher,
            Self::Publisher => Self::EpisodeTitle,
            Self::EpisodeTitle => Self::General,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum MatchMode {
    #[default]
    Intersection,
    Phrase,
    Ranking,
}

impl MatchMode {
    pub(crate) fn wire_value(self) -> &'static str {
        match self {
            Self::Intersection => "Intersection",
            Self::Phrase => "Phrase",
            Self::Ranking => "Ranking",
        }
    }

    pub(crate) fn next(self) -> Self {
        match self {
            Self::Intersection => Self::Phrase,
            Self::Phrase => Self::Ranking,
            Self::Ranking => Self::Intersection,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum RankingMode {
    Tfidf,
    #[default]
    Pagerank,
    Mix,
    Bm25,
}

impl RankingMode {
    pub(crate) fn wire_value(self) -> &'static str {
        match self {
            Self::Tfidf => "TF-IDF",
            Self::Pagerank => "Pagerank",
            Self::Mix => "Mix",
            Self::Bm25 => "BM25",
        }
    }

    pub(crate) fn next(self) -> Self {
        match self {
            Self::Tfidf => Self::Pagerank,
            Self::Pagerank => Self::Mix,
            Self::Mix => Self::Bm25,
            Self::Bm25 => Self::Tfidf,
        }
    }
}

/// Position in [`TIME_BUCKETS`]. Only in-range positions can be constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) struct TimeBucket(usize);

impl TimeBucket {
    pub(crate) fn from_index(index: usize) -> Option<Self> {
        (index < TIME_BUCKETS.len()).then_some(Self(index))
    }

    pub(crate) fn from_seconds(seconds: u32) -> Option<Self> {
        TIME_BUCKETS
            .iter()
            .position(|bucket| *bucket == seconds)
            .map(Self)
    }

    pub(crate) fn index(self) -> usize {
        self.0
    }

    pub(crate) fn seconds(self) -> u32 {
        TIME_BUCKETS[self.0]
    }

    pub(crate) fn label(self) -> String {
        let seconds = self.seconds();
        match (seconds / 60, seconds % 60) {
            (0, secs) => format!("{secs}s"),
            (mins, 0) => format!("{mins}m"),
            (mins, secs) => format!("{mins}m{secs}s"),
        }
    }

    pub(crate) fn next(self) -> Self {
        Self::from_index(self.index() + 1).unwrap_or(self)
    }

    pub(crate) fn previous(self) -> Self {
        self.index()
            .checked_sub(1)
            .and_then(Self::from_index)
            .unwrap_or(self)
    }
}

/// The user's accumulated search selections.
///
/// Selected episodes keep the order they were picked in. The ranking mode is remembered across match-mode changes but is only observable
/// while the match mode is [`MatchMode::Ranking`].
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SearchCriteria {
    query_text: String,
    field_filter: FieldFilter,
    match_mode: MatchMode,
    ranking_mode: RankingMode,
    time_bucket: TimeBucket,
    selected_episodes: Vec<(EpisodeId, Option<SearchResult>)>,
}

impl SearchCriteria {
    pub(crate) fn query_text(&self) -> &str {
        &self.query_text
    }

    pub(crate) fn field_filter(&self) -> FieldFilter {
        self.field_filter
    }

    pub(crate) fn match_mode(&self) -> MatchMode {
        self.match_mode
    }

    pub(crate) fn ranking_mode(&self) -> Option<RankingMode> {
        (self.match_mode == MatchMode::Ranking).then_some(self.ranking_mode)
    }

    pub(crate) fn time_bucket(&self) -> TimeBucket {
        self.time_bucket
    }

    pub(crate) fn set_query_text(&mut self, text: impl Into<String>) {
        self.query_text = text.into();
    }

    pub(crate) fn query_text_mut(&mut self) -> &mut String {
        &mut self.query_text
    }

    pub(crate) fn set_field_filter(&mut self, filter: FieldFilter) {
        self.field_filter = filter;
    }

    pub(crate) fn set_match_mode(&mut self, mode: MatchMode) {
        self.match_mode = mode;
    }

    pub(crate) fn set_ranking_mode(&mut self, mode: RankingMode) {
        self.ranking_mode = mode;
    }

    pub(crate) fn set_time_bucket(&mut self, bucket: TimeBucket) {
        self.time_bucket = bucket;
    }

    pub(crate) fn is_episode_selected(&self, id: &EpisodeId) -> bool {
        self.position_of(id).is_some()
    }

    pub(crate) fn selected_episodes(
        &self,
    ) -> impl Iterator<Item = (&EpisodeId, Option<&SearchResult>)> {
        self.selected_episodes
            .iter()
            .map(|(id, record)| (id, record.as_ref()))
    }

    pub(crate) fn selected_episode_count(&self) -> usize {
        self.selected_episodes.len()
    }

    /// Adds the id when absent, removes it when present. Returns whether it is now selected.
    pub(crate) fn toggle_episode(&mut self, id: EpisodeId) -> bool {
        self.toggle_entry(id, None)
    }

    /// Like [`Self::toggle_episode`], remembering the record for structured request bodies.
    pub(crate) fn toggle_episode_result(&mut self, result: &SearchResult) -> bool {
        self.toggle_entry(result.id.clone(), Some(result.clone()))
    }

    /// Adds the id unless it is already selected. Returns whether it was added.
    pub(crate) fn select_episode(&mut self, id: EpisodeId) -> bool {
        if self.is_episode_selected(&id) {
            return false;
        }
        self.selected_episodes.push((id, None));
        true
    }

    fn toggle_entry(&mut self, id: EpisodeId, record: Option<SearchResult>) -> bool {
        if let Some(position) = self.position_of(&id) {
            self.selected_episodes.remove(position);
            return false;
        }
        self.selected_episodes.push((id, record));
        true
    }

    fn position_of(&self, id: &EpisodeId) -> Option<usize> {
        self.selected_episodes
            .iter()
            .position(|(selected, _)| selected == id)
    }

    pub(crate) fn clear_selected_episodes(&mut self) {
        self.selected_episodes.clear();
    }
}
