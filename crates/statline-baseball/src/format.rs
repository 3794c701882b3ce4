// Output record assembly.
//
// Each reported field has one rule naming where its value comes from and
// what to emit when the data could not supply it. Counters fall back to 0;
// ratios, WAR and placements fall back to null.

use std::collections::BTreeMap;

use serde::Serialize;
use statline_core::config::RoundingConfig;

use crate::aggregate::StatAggregate;
use crate::metrics::{round_to, Metric, Precision};
use crate::ranking::{CohortRankings, RankedMetric};
use crate::record::Counter;
use crate::selector::{SeasonSelector, StatKind};

/// Percentiles are reported with one decimal.
const PERCENTILE_DECIMALS: u32 = 1;

// ---------------------------------------------------------------------------
// Field rules
// ---------------------------------------------------------------------------

/// What to emit for a field whose value is absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefaultPolicy {
    Zero,
    Null,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Distinct games played.
    Games,
    /// A summed counter.
    Counter(Counter),
    /// A derived ratio.
    Metric(Metric),
}

#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    pub name: &'static str,
    pub source: FieldSource,
    pub default: DefaultPolicy,
}

const fn counter(name: &'static str, c: Counter) -> FieldRule {
    FieldRule {
        name,
        source: FieldSource::Counter(c),
        default: DefaultPolicy::Zero,
    }
}

const fn ratio(name: &'static str, m: Metric) -> FieldRule {
    FieldRule {
        name,
        source: FieldSource::Metric(m),
        default: DefaultPolicy::Null,
    }
}

const GAMES: FieldRule = FieldRule {
    name: "games",
    source: FieldSource::Games,
    default: DefaultPolicy::Zero,
};

// WAR is summed like a counter, but an absent WAR column is unknown rather
// than zero.
const WAR: FieldRule = FieldRule {
    name: "war",
    source: FieldSource::Counter(Counter::War),
    default: DefaultPolicy::Null,
};

pub const BATTING_FIELDS: &[FieldRule] = &[
    GAMES,
    counter("at_bats", Counter::AtBats),
    counter("hits", Counter::Hits),
    counter("runs", Counter::Runs),
    counter("home_runs", Counter::HomeRuns),
    counter("rbi", Counter::Rbi),
    counter("stolen_bases", Counter::StolenBases),
    counter("walks", Counter::Walks),
    counter("strikeouts", Counter::Strikeouts),
    counter("total_bases", Counter::TotalBases),
    ratio("avg", Metric::Avg),
    ratio("obp", Metric::Obp),
    ratio("slg", Metric::Slg),
    ratio("ops", Metric::Ops),
    WAR,
];

pub const PITCHING_FIELDS: &[FieldRule] = &[
    GAMES,
    counter("innings_pitched", Counter::InningsPitched),
    counter("earned_runs", Counter::EarnedRuns),
    counter("hits_allowed", Counter::HitsAllowed),
    counter("walks", Counter::Walks),
    counter("strikeouts", Counter::Strikeouts),
    counter("batters_faced", Counter::BattersFaced),
    counter("home_runs_allowed", Counter::HomeRuns),
    ratio("era", Metric::Era),
    ratio("whip", Metric::Whip),
    ratio("k_per_9", Metric::KPer9),
    ratio("k_pct", Metric::KPct),
    ratio("bb_pct", Metric::BbPct),
    WAR,
];

pub const TEAM_FIELDS: &[FieldRule] = &[
    GAMES,
    counter("runs", Counter::Runs),
    counter("runs_allowed", Counter::RunsAllowed),
    counter("at_bats", Counter::AtBats),
    counter("hits", Counter::Hits),
    counter("home_runs", Counter::HomeRuns),
    counter("walks", Counter::Walks),
    counter("total_bases", Counter::TotalBases),
    ratio("avg", Metric::Avg),
    ratio("obp", Metric::Obp),
    ratio("slg", Metric::Slg),
    ratio("ops", Metric::Ops),
    ratio("run_differential", Metric::RunDifferential),
];

pub fn field_rules(kind: StatKind) -> &'static [FieldRule] {
    match kind {
        StatKind::Batting => BATTING_FIELDS,
        StatKind::Pitching => PITCHING_FIELDS,
        StatKind::Team => TEAM_FIELDS,
    }
}

// ---------------------------------------------------------------------------
// Output record
// ---------------------------------------------------------------------------

/// One formatted output record: a (subject, season) line, or a career line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatLine {
    pub kind: StatKind,
    pub subject_id: String,
    pub subject_name: Option<String>,
    pub season: SeasonSelector,
    pub team_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_pitch_type: Option<String>,
    pub stats: BTreeMap<&'static str, Option<f64>>,
    /// Placement per tracked metric, present only for cohort views.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rankings: Option<BTreeMap<&'static str, RankedMetric>>,
}

impl StatLine {
    pub fn stat(&self, name: &str) -> Option<f64> {
        self.stats.get(name).copied().flatten()
    }

    pub fn ranking(&self, metric: Metric) -> Option<RankedMetric> {
        self.rankings.as_ref()?.get(metric.key()).copied()
    }
}

// ---------------------------------------------------------------------------
// Formatter
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ResultFormatter {
    rounding: RoundingConfig,
}

impl ResultFormatter {
    pub fn new(rounding: RoundingConfig) -> Self {
        Self { rounding }
    }

    /// Build the output line for `agg`. `cohort` is `Some` for cohort views;
    /// a subject missing from it was excluded and gets null placements.
    pub fn format(&self, kind: StatKind, agg: &StatAggregate, cohort: Option<&CohortRankings>) -> StatLine {
        let stats = field_rules(kind)
            .iter()
            .map(|rule| (rule.name, self.field_value(rule, agg)))
            .collect();

        let rankings = cohort.map(|cohort| {
            let placements = cohort.get(&(agg.subject_id.clone(), agg.season));
            Metric::tracked(kind)
                .iter()
                .map(|metric| {
                    let placement = placements
                        .and_then(|p| p.get(metric))
                        .copied()
                        .unwrap_or_default();
                    (metric.key(), round_placement(placement))
                })
                .collect()
        });

        StatLine {
            kind,
            subject_id: agg.subject_id.clone(),
            subject_name: agg.subject_name.clone(),
            season: agg.season,
            // Team lines are named by the team itself.
            team_name: match kind {
                StatKind::Team => agg.team_name.clone().or_else(|| agg.subject_name.clone()),
                _ => agg.team_name.clone(),
            },
            primary_pitch_type: agg.primary_pitch_type.clone(),
            stats,
            rankings,
        }
    }

    fn field_value(&self, rule: &FieldRule, agg: &StatAggregate) -> Option<f64> {
        let value = match rule.source {
            FieldSource::Games => Some(f64::from(agg.games)),
            FieldSource::Counter(c) => agg
                .totals
                .get(c)
                .map(|v| round_to(v, Precision::Count.decimals(&self.rounding))),
            FieldSource::Metric(m) => m.value(agg).map(|v| round_to(v, m.decimals(&self.rounding))),
        };
        match (value, rule.default) {
            (Some(v), _) => Some(v),
            (None, DefaultPolicy::Zero) => Some(0.0),
            (None, DefaultPolicy::Null) => None,
        }
    }
}

fn round_placement(placement: RankedMetric) -> RankedMetric {
    RankedMetric {
        rank: placement.rank,
        percentile: placement.percentile.map(|p| round_to(p, PERCENTILE_DECIMALS)),
    }
}
