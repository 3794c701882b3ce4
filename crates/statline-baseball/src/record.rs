// Per-game statistical records and their translation from loosely-typed
// warehouse rows.
//
// Every logical field has an ordered list of candidate column names. The
// translator resolves them once per request through the schema resolver and
// is the only place that does; downstream stages see typed records only.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;
use statline_core::config::StoreConfig;
use statline_core::schema::SchemaResolver;
use statline_core::source::QueryParam;
use statline_core::value::Row;
use tracing::debug;

use crate::selector::{SeasonSelector, StatKind};

// ---------------------------------------------------------------------------
// Additive counters
// ---------------------------------------------------------------------------

/// Statistics that are correct to sum across games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Counter {
    AtBats,
    Hits,
    Runs,
    HomeRuns,
    Rbi,
    StolenBases,
    Walks,
    Strikeouts,
    TotalBases,
    InningsPitched,
    EarnedRuns,
    HitsAllowed,
    BattersFaced,
    RunsAllowed,
    War,
}

impl Counter {
    pub fn key(&self) -> &'static str {
        match self {
            Counter::AtBats => "at_bats",
            Counter::Hits => "hits",
            Counter::Runs => "runs",
            Counter::HomeRuns => "home_runs",
            Counter::Rbi => "rbi",
            Counter::StolenBases => "stolen_bases",
            Counter::Walks => "walks",
            Counter::Strikeouts => "strikeouts",
            Counter::TotalBases => "total_bases",
            Counter::InningsPitched => "innings_pitched",
            Counter::EarnedRuns => "earned_runs",
            Counter::HitsAllowed => "hits_allowed",
            Counter::BattersFaced => "batters_faced",
            Counter::RunsAllowed => "runs_allowed",
            Counter::War => "war",
        }
    }
}

/// Counter values carried by one record. A missing key means the column is
/// structurally absent from the table; `Some(None)` is a NULL cell.
pub type CounterValues = BTreeMap<Counter, Option<f64>>;

// ---------------------------------------------------------------------------
// GameStatRecord
// ---------------------------------------------------------------------------

/// One row of per-game statistics for one subject (player or team).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GameStatRecord {
    pub subject_id: Option<String>,
    pub subject_name: Option<String>,
    pub season: Option<i32>,
    pub game_id: Option<String>,
    pub game_date: Option<NaiveDate>,
    pub team_name: Option<String>,
    pub pitch_type: Option<String>,
    /// Games column for tables that are not one-row-per-game. Only consulted
    /// when the row has no game id.
    pub games: Option<f64>,
    pub counters: CounterValues,
}

impl GameStatRecord {
    pub fn new(subject_id: &str, season: i32) -> Self {
        Self {
            subject_id: Some(subject_id.to_string()),
            season: Some(season),
            ..Self::default()
        }
    }

    pub fn game(mut self, game_id: &str) -> Self {
        self.game_id = Some(game_id.to_string());
        self
    }

    pub fn dated(mut self, date: NaiveDate) -> Self {
        self.game_date = Some(date);
        self
    }

    pub fn team(mut self, team_name: &str) -> Self {
        self.team_name = Some(team_name.to_string());
        self
    }

    pub fn pitch_type(mut self, pitch_type: &str) -> Self {
        self.pitch_type = Some(pitch_type.to_string());
        self
    }

    pub fn with(mut self, counter: Counter, value: f64) -> Self {
        self.counters.insert(counter, Some(value));
        self
    }

    pub fn with_null(mut self, counter: Counter) -> Self {
        self.counters.insert(counter, None);
        self
    }
}

// ---------------------------------------------------------------------------
// Column plans
// ---------------------------------------------------------------------------

/// A logical field of a per-game fact table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    SubjectId,
    SubjectName,
    Season,
    GameId,
    GameDate,
    TeamName,
    PitchType,
    Games,
    Counter(Counter),
}

impl Field {
    /// Canonical alias the field is selected as.
    pub fn key(&self) -> &'static str {
        match self {
            Field::SubjectId => "subject_id",
            Field::SubjectName => "subject_name",
            Field::Season => "season",
            Field::GameId => "game_id",
            Field::GameDate => "game_date",
            Field::TeamName => "team_name",
            Field::PitchType => "pitch_type",
            Field::Games => "games",
            Field::Counter(c) => c.key(),
        }
    }
}

/// Candidate column names for one field, most specific first.
#[derive(Debug, Clone, Copy)]
pub struct FieldColumns {
    pub field: Field,
    pub candidates: &'static [&'static str],
}

const fn fc(field: Field, candidates: &'static [&'static str]) -> FieldColumns {
    FieldColumns { field, candidates }
}

const SEASON: &[&str] = &["season", "game_year"];
const GAME_ID: &[&str] = &["game_pk", "game_id"];
const GAME_DATE: &[&str] = &["game_date", "official_date"];
const GAMES: &[&str] = &["games", "games_played", "g"];
const BATTER_ID: &[&str] = &[StatKind::Batting.join_column(), "player_id"];
const PITCHER_ID: &[&str] = &[StatKind::Pitching.join_column(), "player_id"];
const TEAM_ID: &[&str] = &[StatKind::Team.join_column()];

const BATTING_COLUMNS: &[FieldColumns] = &[
    fc(Field::SubjectId, BATTER_ID),
    fc(Field::SubjectName, &["batter_name", "player_name"]),
    fc(Field::Season, SEASON),
    fc(Field::GameId, GAME_ID),
    fc(Field::GameDate, GAME_DATE),
    fc(Field::TeamName, &["team_name", "batting_team_name", "team"]),
    fc(Field::Games, GAMES),
    fc(Field::Counter(Counter::AtBats), &["at_bats", "ab"]),
    fc(Field::Counter(Counter::Hits), &["hits", "h"]),
    fc(Field::Counter(Counter::Runs), &["runs", "r"]),
    fc(Field::Counter(Counter::HomeRuns), &["home_runs", "hr"]),
    fc(Field::Counter(Counter::Rbi), &["rbi", "runs_batted_in"]),
    fc(Field::Counter(Counter::StolenBases), &["stolen_bases", "sb"]),
    fc(Field::Counter(Counter::Walks), &["walks", "base_on_balls", "bb"]),
    fc(Field::Counter(Counter::Strikeouts), &["strikeouts", "strike_outs", "so"]),
    fc(Field::Counter(Counter::TotalBases), &["total_bases", "tb"]),
    fc(Field::Counter(Counter::War), &["batting_war", "war_batting", "war"]),
];

const PITCHING_COLUMNS: &[FieldColumns] = &[
    fc(Field::SubjectId, PITCHER_ID),
    fc(Field::SubjectName, &["pitcher_name", "player_name"]),
    fc(Field::Season, SEASON),
    fc(Field::GameId, GAME_ID),
    fc(Field::GameDate, GAME_DATE),
    fc(Field::TeamName, &["team_name", "pitching_team_name", "team"]),
    fc(
        Field::PitchType,
        &["primary_pitch_type", "pitch_type", "pitch_type_description"],
    ),
    fc(Field::Games, GAMES),
    fc(Field::Counter(Counter::InningsPitched), &["innings_pitched", "ip"]),
    fc(Field::Counter(Counter::EarnedRuns), &["earned_runs", "er"]),
    fc(Field::Counter(Counter::HitsAllowed), &["hits_allowed", "hits", "h"]),
    fc(Field::Counter(Counter::Walks), &["walks", "walks_allowed", "base_on_balls", "bb"]),
    fc(Field::Counter(Counter::Strikeouts), &["strikeouts", "strike_outs", "so", "k"]),
    fc(Field::Counter(Counter::BattersFaced), &["batters_faced", "total_batters_faced", "bf"]),
    fc(Field::Counter(Counter::HomeRuns), &["home_runs_allowed", "home_runs", "hr"]),
    fc(Field::Counter(Counter::War), &["pitching_war", "war_pitching", "war"]),
];

const TEAM_COLUMNS: &[FieldColumns] = &[
    fc(Field::SubjectId, TEAM_ID),
    fc(Field::SubjectName, &["team_name", "team_abbr"]),
    fc(Field::Season, SEASON),
    fc(Field::GameId, GAME_ID),
    fc(Field::GameDate, GAME_DATE),
    fc(Field::Games, GAMES),
    fc(Field::Counter(Counter::Runs), &["runs", "runs_scored"]),
    fc(Field::Counter(Counter::RunsAllowed), &["runs_allowed", "opponent_runs"]),
    fc(Field::Counter(Counter::AtBats), &["at_bats", "ab"]),
    fc(Field::Counter(Counter::Hits), &["hits", "h"]),
    fc(Field::Counter(Counter::HomeRuns), &["home_runs", "hr"]),
    fc(Field::Counter(Counter::Walks), &["walks", "base_on_balls", "bb"]),
    fc(Field::Counter(Counter::TotalBases), &["total_bases", "tb"]),
];

/// Column candidates for every field of the fact table behind `kind`.
pub fn column_plan(kind: StatKind) -> &'static [FieldColumns] {
    match kind {
        StatKind::Batting => BATTING_COLUMNS,
        StatKind::Pitching => PITCHING_COLUMNS,
        StatKind::Team => TEAM_COLUMNS,
    }
}

// ---------------------------------------------------------------------------
// Translator
// ---------------------------------------------------------------------------

/// The fields of one fact table that resolved to physical columns, and the
/// row → record translation they imply.
#[derive(Debug, Clone)]
pub struct RecordTranslator {
    table: String,
    columns: Vec<(Field, String)>,
}

impl RecordTranslator {
    /// Resolve every field of `kind`'s column plan against `table`. Fields
    /// with no surviving candidate are left out and read as absent.
    pub async fn resolve(resolver: &SchemaResolver, table: &str, kind: StatKind) -> Self {
        let mut columns = Vec::new();
        for plan in column_plan(kind) {
            if let Some(column) = resolver.resolve_column(table, plan.candidates).await {
                columns.push((plan.field, column));
            }
        }
        debug!(
            "resolved {}/{} {kind} fields for {table}",
            columns.len(),
            column_plan(kind).len()
        );
        Self {
            table: table.to_string(),
            columns,
        }
    }

    /// Build a translator from already-known physical column names.
    pub fn from_columns(table: &str, columns: Vec<(Field, String)>) -> Self {
        Self {
            table: table.to_string(),
            columns,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn column(&self, field: Field) -> Option<&str> {
        self.columns
            .iter()
            .find(|(f, _)| *f == field)
            .map(|(_, c)| c.as_str())
    }

    pub fn has(&self, field: Field) -> bool {
        self.column(field).is_some()
    }

    /// Query template selecting every resolved column under its canonical
    /// alias, optionally restricted to one season through `@season`.
    pub fn select_query(&self, store: &StoreConfig, season: SeasonSelector) -> (String, Vec<QueryParam>) {
        let select_list = self
            .columns
            .iter()
            .map(|(field, column)| format!("`{column}` AS `{}`", field.key()))
            .collect::<Vec<_>>()
            .join(", ");
        let mut template = format!(
            "SELECT {select_list} FROM {}",
            store.qualified_table(&self.table)
        );
        let mut params = Vec::new();

        if let (Some(year), Some(column)) = (season.year(), self.column(Field::Season)) {
            template.push_str(&format!(" WHERE `{column}` = @season"));
            params.push(QueryParam::new("season", year));
        }
        (template, params)
    }

    /// Translate a row selected by [`RecordTranslator::select_query`].
    pub fn translate(&self, row: &Row) -> GameStatRecord {
        let mut record = GameStatRecord::default();
        for (field, _) in &self.columns {
            let value = row.get(field.key());
            match field {
                Field::SubjectId => record.subject_id = value.and_then(|v| v.as_text()),
                Field::SubjectName => record.subject_name = value.and_then(|v| v.as_text()),
                Field::Season => {
                    record.season = value
                        .and_then(|v| v.as_i64())
                        .and_then(|y| i32::try_from(y).ok())
                }
                Field::GameId => record.game_id = value.and_then(|v| v.as_text()),
                Field::GameDate => record.game_date = value.and_then(|v| v.as_date()),
                Field::TeamName => record.team_name = value.and_then(|v| v.as_text()),
                Field::PitchType => record.pitch_type = value.and_then(|v| v.as_text()),
                Field::Games => record.games = value.and_then(|v| v.as_f64()),
                Field::Counter(c) => {
                    record.counters.insert(*c, value.and_then(|v| v.as_f64()));
                }
            }
        }
        record
    }
}
