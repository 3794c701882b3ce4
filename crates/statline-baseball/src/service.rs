// Request pipeline: resolve columns, fetch per-game rows, roll up, derive,
// rank and format.
//
// Only invalid selectors and upstream I/O failures are errors. Schema drift,
// degenerate arithmetic and dirty rows all degrade to absent values or an
// empty result.

use std::sync::Arc;

use anyhow::Context;
use statline_core::config::StatsConfig;
use statline_core::schema::SchemaResolver;
use statline_core::source::{ColumnLister, QueryRunner};
use statline_core::sqlite::SqliteStore;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::aggregate::{aggregate, GroupBy, StatAggregate};
use crate::format::{ResultFormatter, StatLine};
use crate::metrics::{apply_metrics, Metric};
use crate::ranking::{rank_cohorts, Qualification};
use crate::record::{Field, GameStatRecord, RecordTranslator};
use crate::selector::{SeasonSelector, SelectorError, StatKind};

#[derive(Debug, Error)]
pub enum StatsError {
    #[error(transparent)]
    Selector(#[from] SelectorError),

    #[error(transparent)]
    Upstream(#[from] anyhow::Error),
}

/// A parsed statistics request.
#[derive(Debug, Clone, PartialEq)]
pub struct StatsRequest {
    pub kind: StatKind,
    pub season: SeasonSelector,
    /// Restrict output to one subject, matched on id or (case-insensitively)
    /// name. Ranking still runs over the whole cohort.
    pub subject: Option<String>,
    /// Attach rank and percentile context.
    pub cohort: bool,
    /// Keep only subjects on this team: team name, or for team requests
    /// also the team id.
    pub team: Option<String>,
    /// Sort output best-first on this metric. Subjects without a value go
    /// last; ties keep first-seen order.
    pub order_by: Option<Metric>,
    /// Keep at most this many lines, after filtering and ordering.
    pub limit: Option<usize>,
}

/// Lines returned by [`StatsService::leaderboard`] when no limit is given.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 20;

impl StatsRequest {
    pub fn new(kind: StatKind, season: SeasonSelector) -> Self {
        Self {
            kind,
            season,
            subject: None,
            cohort: false,
            team: None,
            order_by: None,
            limit: None,
        }
    }

    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn with_cohort(mut self) -> Self {
        self.cohort = true;
        self
    }

    pub fn team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    pub fn order_by(mut self, metric: Metric) -> Self {
        self.order_by = Some(metric);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    fn matches(&self, agg: &StatAggregate) -> bool {
        self.is_subject(agg) && self.on_team(agg)
    }

    fn is_subject(&self, agg: &StatAggregate) -> bool {
        let Some(wanted) = self.subject.as_deref().map(str::trim) else {
            return true;
        };
        agg.subject_id == wanted || name_is(agg.subject_name.as_deref(), wanted)
    }

    fn on_team(&self, agg: &StatAggregate) -> bool {
        let Some(wanted) = self.team.as_deref().map(str::trim) else {
            return true;
        };
        match self.kind {
            StatKind::Team => {
                agg.subject_id == wanted
                    || name_is(agg.team_name.as_deref(), wanted)
                    || name_is(agg.subject_name.as_deref(), wanted)
            }
            StatKind::Batting | StatKind::Pitching => name_is(agg.team_name.as_deref(), wanted),
        }
    }
}

fn name_is(name: Option<&str>, wanted: &str) -> bool {
    name.is_some_and(|name| name.eq_ignore_ascii_case(wanted))
}

/// Filter, order and truncate aggregates for output. Runs after ranking so
/// cohort context always covers the full population.
fn select_output<'a>(aggregates: &'a [StatAggregate], request: &StatsRequest) -> Vec<&'a StatAggregate> {
    let mut selected: Vec<&StatAggregate> = aggregates.iter().filter(|agg| request.matches(agg)).collect();
    if let Some(metric) = request.order_by {
        let direction = metric.direction();
        selected.sort_by(|a, b| direction.better_first_nulls_last(metric.value(a), metric.value(b)));
    }
    if let Some(limit) = request.limit {
        selected.truncate(limit);
    }
    selected
}

pub struct StatsService {
    runner: Arc<dyn QueryRunner>,
    resolver: Arc<SchemaResolver>,
    config: StatsConfig,
    formatter: ResultFormatter,
}

impl StatsService {
    pub fn new(runner: Arc<dyn QueryRunner>, lister: Arc<dyn ColumnLister>, config: StatsConfig) -> Self {
        Self::with_resolver(runner, Arc::new(SchemaResolver::new(lister)), config)
    }

    /// Build a service that shares an existing resolver and its cache.
    pub fn with_resolver(runner: Arc<dyn QueryRunner>, resolver: Arc<SchemaResolver>, config: StatsConfig) -> Self {
        let formatter = ResultFormatter::new(config.rounding.clone());
        Self {
            runner,
            resolver,
            config,
            formatter,
        }
    }

    /// Run against a local store serving both collaborator roles.
    pub fn from_store(store: SqliteStore, config: StatsConfig) -> Self {
        let store = Arc::new(store);
        Self::new(store.clone(), store, config)
    }

    pub fn resolver(&self) -> &SchemaResolver {
        &self.resolver
    }

    pub fn config(&self) -> &StatsConfig {
        &self.config
    }

    /// Player lines for `kind` (`batting` or `pitching`) over `season`
    /// (a year, or any career alias).
    pub async fn player_stats(
        &self,
        kind: &str,
        season: Option<&str>,
        subject: Option<&str>,
        cohort: bool,
    ) -> Result<Vec<StatLine>, StatsError> {
        let kind = match StatKind::parse(kind)? {
            StatKind::Team => return Err(SelectorError::InvalidStatKind(kind.to_string()).into()),
            k => k,
        };
        let mut request = StatsRequest::new(kind, SeasonSelector::parse(season)?);
        request.subject = subject.map(str::to_string);
        request.cohort = cohort;
        self.run(&request).await
    }

    /// Team lines over `season`.
    pub async fn team_stats(
        &self,
        season: Option<&str>,
        team: Option<&str>,
        cohort: bool,
    ) -> Result<Vec<StatLine>, StatsError> {
        let mut request = StatsRequest::new(StatKind::Team, SeasonSelector::parse(season)?);
        request.subject = team.map(str::to_string);
        request.cohort = cohort;
        self.run(&request).await
    }

    /// Batting leaderboard: batters over `season` ordered by OPS, best first,
    /// optionally restricted to one team.
    pub async fn leaderboard(
        &self,
        season: Option<&str>,
        team: Option<&str>,
        limit: Option<usize>,
    ) -> Result<Vec<StatLine>, StatsError> {
        let mut request = StatsRequest::new(StatKind::Batting, SeasonSelector::parse(season)?)
            .order_by(Metric::Ops)
            .limit(limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT));
        request.team = team.map(str::to_string);
        self.run(&request).await
    }

    pub async fn run(&self, request: &StatsRequest) -> Result<Vec<StatLine>, StatsError> {
        let kind = request.kind;
        let table = self.table_for(kind);

        let translator = RecordTranslator::resolve(&self.resolver, table, kind).await;
        if !translator.has(Field::SubjectId) || !translator.has(Field::Season) {
            warn!("{table} exposes no usable {kind} subject or season column; returning no lines");
            return Ok(Vec::new());
        }

        let (template, params) = translator.select_query(&self.config.store, request.season);
        let rows = self
            .runner
            .run_query(&template, &params)
            .await
            .with_context(|| format!("failed to load {kind} rows from {table}"))?;
        debug!("fetched {} {kind} rows from {table}", rows.len());

        let records: Vec<GameStatRecord> = rows.iter().map(|row| translator.translate(row)).collect();
        let group_by = if request.season.is_career() {
            GroupBy::Subject
        } else {
            GroupBy::SubjectSeason
        };
        let mut aggregates = aggregate(&records, group_by);
        apply_metrics(kind, &mut aggregates);

        let rankings = request.cohort.then(|| {
            let qualification = Qualification::from_config(&self.config.cohort);
            rank_cohorts(&aggregates, kind, &qualification)
        });

        let lines: Vec<StatLine> = select_output(&aggregates, request)
            .into_iter()
            .map(|agg| self.formatter.format(kind, agg, rankings.as_ref()))
            .collect();

        info!(
            "{kind} {} request: {} rows -> {} aggregates -> {} lines",
            request.season,
            records.len(),
            aggregates.len(),
            lines.len()
        );
        Ok(lines)
    }

    fn table_for(&self, kind: StatKind) -> &str {
        match kind {
            StatKind::Batting => &self.config.tables.batting,
            StatKind::Pitching => &self.config.tables.pitching,
            StatKind::Team => &self.config.tables.teams,
        }
    }
}
