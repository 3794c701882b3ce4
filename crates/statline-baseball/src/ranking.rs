// Rank and percentile placement of aggregates within their cohort.
//
// Ranking is a sort plus a scan over the non-null values of one metric.
// Ties share a competition rank (1, 1, 3) and a percentile computed from the
// number of cohort members strictly worse.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use statline_core::config::CohortConfig;
use tracing::debug;

use crate::aggregate::StatAggregate;
use crate::metrics::Metric;
use crate::record::Counter;
use crate::selector::{SeasonSelector, StatKind};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Which end of a metric's scale is better.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Direction {
    /// Ordering that sorts better values first.
    fn better_first(&self, a: f64, b: f64) -> Ordering {
        match self {
            Direction::HigherIsBetter => b.total_cmp(&a),
            Direction::LowerIsBetter => a.total_cmp(&b),
        }
    }

    /// Like [`Direction::better_first`], with absent values after every
    /// present one.
    pub fn better_first_nulls_last(&self, a: Option<f64>, b: Option<f64>) -> Ordering {
        match (a, b) {
            (Some(a), Some(b)) => self.better_first(a, b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    }
}

/// One cohort member's value for the metric being ranked.
#[derive(Debug, Clone, PartialEq)]
pub struct CohortEntry {
    pub id: String,
    pub value: Option<f64>,
}

impl CohortEntry {
    pub fn new(id: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            id: id.into(),
            value,
        }
    }
}

/// Placement of one subject on one metric. Both fields are `None` when the
/// subject was not ranked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RankedMetric {
    pub rank: Option<u32>,
    pub percentile: Option<f64>,
}

// ---------------------------------------------------------------------------
// Ranking
// ---------------------------------------------------------------------------

/// Rank `cohort` on one metric.
///
/// Entries with a null value stay in the output with a null placement and do
/// not take a rank slot. Percentile is `100 * strictly_worse / (n - 1)` over
/// the `n` ranked entries, and 100 when only one entry is ranked. An empty
/// cohort gives an empty map.
pub fn rank(cohort: &[CohortEntry], direction: Direction) -> HashMap<String, RankedMetric> {
    let mut out: HashMap<String, RankedMetric> = HashMap::with_capacity(cohort.len());

    let mut ranked: Vec<(&str, f64)> = Vec::with_capacity(cohort.len());
    for entry in cohort {
        match entry.value.filter(|v| v.is_finite()) {
            Some(v) => ranked.push((entry.id.as_str(), v)),
            None => {
                out.insert(entry.id.clone(), RankedMetric::default());
            }
        }
    }
    // Stable, so equal values keep input order.
    ranked.sort_by(|a, b| direction.better_first(a.1, b.1));

    let n = ranked.len();
    let mut start = 0;
    while start < n {
        let value = ranked[start].1;
        let end = ranked[start..]
            .iter()
            .position(|(_, v)| *v != value)
            .map_or(n, |offset| start + offset);

        let worse = n - end;
        let percentile = if n == 1 {
            100.0
        } else {
            (100.0 * worse as f64 / (n - 1) as f64).clamp(0.0, 100.0)
        };
        let placement = RankedMetric {
            rank: Some(start as u32 + 1),
            percentile: Some(percentile),
        };
        for (id, _) in &ranked[start..end] {
            out.insert((*id).to_string(), placement);
        }
        start = end;
    }

    out
}

// ---------------------------------------------------------------------------
// Cohorts
// ---------------------------------------------------------------------------

/// Minimum playing time for a subject to enter its cohort.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Qualification {
    pub min_at_bats: f64,
    pub min_innings_pitched: f64,
}

impl Qualification {
    pub fn from_config(config: &CohortConfig) -> Self {
        Self {
            min_at_bats: config.min_at_bats,
            min_innings_pitched: config.min_innings_pitched,
        }
    }

    /// Batters qualify on at-bats, pitchers on innings pitched. Teams always
    /// qualify.
    pub fn qualifies(&self, kind: StatKind, agg: &StatAggregate) -> bool {
        let (counter, min) = match kind {
            StatKind::Batting => (Counter::AtBats, self.min_at_bats),
            StatKind::Pitching => (Counter::InningsPitched, self.min_innings_pitched),
            StatKind::Team => return true,
        };
        agg.totals.get(counter).unwrap_or(0.0) >= min
    }
}

/// Aggregates of one stat kind that share a season partition.
#[derive(Debug, Clone)]
pub struct CohortMetricTable<'a> {
    pub kind: StatKind,
    pub season: SeasonSelector,
    pub members: Vec<&'a StatAggregate>,
}

impl<'a> CohortMetricTable<'a> {
    /// Split qualifying aggregates into one table per season, in order of
    /// first appearance.
    pub fn partition(
        aggregates: &'a [StatAggregate],
        kind: StatKind,
        qualification: &Qualification,
    ) -> Vec<CohortMetricTable<'a>> {
        let mut tables: Vec<CohortMetricTable<'a>> = Vec::new();
        for agg in aggregates {
            if !qualification.qualifies(kind, agg) {
                continue;
            }
            match tables.iter_mut().find(|t| t.season == agg.season) {
                Some(table) => table.members.push(agg),
                None => tables.push(CohortMetricTable {
                    kind,
                    season: agg.season,
                    members: vec![agg],
                }),
            }
        }
        tables
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Rank every member on one metric.
    pub fn rank_metric(&self, metric: Metric) -> HashMap<String, RankedMetric> {
        let entries: Vec<CohortEntry> = self
            .members
            .iter()
            .map(|agg| CohortEntry::new(agg.subject_id.as_str(), metric.value(agg)))
            .collect();
        rank(&entries, metric.direction())
    }
}

/// Placements keyed by (subject id, season).
pub type CohortRankings = HashMap<(String, SeasonSelector), BTreeMap<Metric, RankedMetric>>;

/// Rank every tracked metric of `kind` within each season cohort. Subjects
/// that do not qualify get no entry.
pub fn rank_cohorts(
    aggregates: &[StatAggregate],
    kind: StatKind,
    qualification: &Qualification,
) -> CohortRankings {
    let mut out: CohortRankings = HashMap::new();
    for table in CohortMetricTable::partition(aggregates, kind, qualification) {
        debug!(
            "ranking {} {kind} cohort for {} on {} metrics",
            table.len(),
            table.season,
            Metric::tracked(kind).len()
        );
        for &metric in Metric::tracked(kind) {
            for (id, placement) in table.rank_metric(metric) {
                out.entry((id, table.season))
                    .or_default()
                    .insert(metric, placement);
            }
        }
    }
    out
}
