mod backend;
mod controller;
mod criteria;
mod error;
mod format;
mod player;
mod report;
mod request;
mod response;
mod result;
mod selection;
mod tui;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};

use crate::cli::{Cli, Command, FieldArg, ModeArg, RankingArg, SearchArgs};
use crate::config::AppConfig;
use crate::logging;
use crate::paths::{config_file_path, log_file_path};

pub(crate) use self::request::{BackendVersion, EncodedRequest, HttpMethod};

use self::backend::{Dispatcher, HttpSearchBackend};
use self::controller::{LoadingState, SearchSession};
use self::criteria::{FieldFilter, MatchMode, RankingMode, SearchCriteria, TIME_BUCKETS, TimeBucket};
use self::player::ExternalPlayer;
use self::result::EpisodeId;

pub fn run(cli: Cli) -> Result<()> {
    match log_file_path().and_then(|path| logging::init(&path)) {
        Ok(()) => {}
        Err(err) => eprintln!("Warning: logging disabled: {err:#}"),
    }

    let config = load_config(&cli)?;

    match cli.command {
        Some(Command::Search(args)) => run_search(&config, &args)?,
        Some(Command::Config) => run_config(&config)?,
        Some(Command::Tui) | None => tui::run_tui(&config)?,
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let config_path = match &cli.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            Some(path.clone())
        }
        None => config_file_path()
            .map_err(|err| warn!("no default config location: {err:#}"))
            .ok(),
    };
    let config = AppConfig::load(config_path.as_deref()).context("invalid configuration")?;
    config
        .with_base_url(cli.base_url.clone())
        .context("invalid --base-url")
}

fn run_search(config: &AppConfig, args: &SearchArgs) -> Result<()> {
    let player = ExternalPlayer::from_config(&config.player);
    let mut session = SearchSession::new(Box::new(player), config.backend.request_timeout());
    apply_search_args(session.criteria_mut(), args)?;

    let dispatcher = Dispatcher::new(Arc::new(HttpSearchBackend::new(config.backend.clone())));
    let (token, request) = session.begin_search(Instant::now());
    dispatcher.dispatch(token, request);

    while session.is_loading() {
        match dispatcher.wait(Duration::from_millis(100)) {
            Some(completion) => {
                session.complete(completion.token, completion.outcome);
            }
            None => {
                session.expire_overdue(Instant::now());
            }
        }
    }

    if let LoadingState::Failed(_) = session.loading_state() {
        bail!("{}", report::describe_state(&session));
    }
    info!("printed {} result(s)", session.results().len());

    if args.json {
        println!("{}", report::render_json(&session)?);
    } else {
        print!("{}", report::render_table(&session));
    }
    Ok(())
}

fn run_config(config: &AppConfig) -> Result<()> {
    let rendered = toml::to_string_pretty(config).context("failed to render configuration")?;
    print!("{rendered}");
    Ok(())
}

pub(crate) fn apply_search_args(criteria: &mut SearchCriteria, args: &SearchArgs) -> Result<()> {
    criteria.set_query_text(args.query.clone());
    criteria.set_field_filter(match args.field {
        FieldArg::General => FieldFilter::General,
        FieldArg::Show => FieldFilter::ShowName,
        FieldArg::Publisher => FieldFilter::Publisher,
        FieldArg::Episode => FieldFilter::EpisodeTitle,
    });
    criteria.set_match_mode(match args.mode {
        ModeArg::Intersection => MatchMode::Intersection,
        ModeArg::Phrase => MatchMode::Phrase,
        ModeArg::Ranking => MatchMode::Ranking,
    });
    if let Some(ranking) = args.ranking {
        criteria.set_ranking_mode(match ranking {
            RankingArg::Tfidf => RankingMode::Tfidf,
            RankingArg::Pagerank => RankingMode::Pagerank,
            RankingArg::Mix => RankingMode::Mix,
            RankingArg::Bm25 => RankingMode::Bm25,
        });
    }
    let bucket = TimeBucket::from_seconds(args.time).ok_or_else(|| {
        anyhow!(
            "--time must be one of {:?} seconds (got {})",
            TIME_BUCKETS,
            args.time
        )
    })?;
    criteria.set_time_bucket(bucket);
    for id in &args.selected {
        let id = id.trim();
        if !id.is_empty() {
            criteria.select_episode(EpisodeId::Backend(id.to_string()));
        }
    }
    Ok(())
}
