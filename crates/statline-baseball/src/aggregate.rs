// Season and career rollups of per-game records.
//
// Additive counters are summed; representative fields (names, team, primary
// pitch type) are picked by a fixed rule; games are counted by distinct game
// id so tables with several rows per game do not inflate the total.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::NaiveDate;
use tracing::warn;

use crate::metrics::DerivedMetrics;
use crate::record::{Counter, GameStatRecord};
use crate::selector::SeasonSelector;

// ---------------------------------------------------------------------------
// Representative values
// ---------------------------------------------------------------------------

/// How a single value is chosen from many observations of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickRule {
    /// The value observed most often.
    MostFrequent,
    /// The value from the latest-dated observation. Undated observations are
    /// older than any dated one.
    MostRecent,
}

/// One observed value of a representative field, in input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation<'a> {
    pub value: &'a str,
    pub date: Option<NaiveDate>,
}

/// Choose one value under `rule`. Ties go to the value seen first.
/// Returns `None` when there are no observations.
pub fn pick_representative(observations: &[Observation<'_>], rule: PickRule) -> Option<String> {
    match rule {
        PickRule::MostFrequent => {
            // value -> (count, first index)
            let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
            for (i, obs) in observations.iter().enumerate() {
                counts.entry(obs.value).or_insert((0, i)).0 += 1;
            }
            counts
                .into_iter()
                .max_by(|(_, (ca, ia)), (_, (cb, ib))| ca.cmp(cb).then(ib.cmp(ia)))
                .map(|(value, _)| value.to_string())
        }
        PickRule::MostRecent => {
            let mut best: Option<&Observation<'_>> = None;
            for obs in observations {
                match best {
                    Some(b) if obs.date <= b.date => {}
                    _ => best = Some(obs),
                }
            }
            best.map(|b| b.value.to_string())
        }
    }
}

/// Fields that are picked rather than summed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Representative {
    SubjectName,
    TeamName,
    PitchType,
}

impl Representative {
    pub fn rule(&self) -> PickRule {
        match self {
            Representative::SubjectName => PickRule::MostRecent,
            Representative::TeamName => PickRule::MostFrequent,
            Representative::PitchType => PickRule::MostFrequent,
        }
    }

    fn value<'r>(&self, record: &'r GameStatRecord) -> Option<&'r str> {
        match self {
            Representative::SubjectName => record.subject_name.as_deref(),
            Representative::TeamName => record.team_name.as_deref(),
            Representative::PitchType => record.pitch_type.as_deref(),
        }
    }

    fn pick(&self, records: &[&GameStatRecord]) -> Option<String> {
        let observations: Vec<Observation<'_>> = records
            .iter()
            .filter_map(|r| {
                self.value(r).map(|value| Observation {
                    value,
                    date: r.game_date,
                })
            })
            .collect();
        pick_representative(&observations, self.rule())
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Summed counters. A counter is present when at least one contributing
/// record carried its column; NULL cells count as zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Totals {
    values: BTreeMap<Counter, f64>,
}

impl Totals {
    pub fn get(&self, counter: Counter) -> Option<f64> {
        self.values.get(&counter).copied()
    }

    /// Builder used by tests and callers with pre-summed data.
    pub fn with(mut self, counter: Counter, value: f64) -> Self {
        self.values.insert(counter, value);
        self
    }

    fn add(&mut self, counter: Counter, value: Option<f64>) {
        *self.values.entry(counter).or_insert(0.0) += value.unwrap_or(0.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Counter, f64)> + '_ {
        self.values.iter().map(|(c, v)| (*c, *v))
    }
}

/// Rollup of every record sharing a grouping key. `season` is
/// [`SeasonSelector::Career`] for career aggregates.
#[derive(Debug, Clone, PartialEq)]
pub struct StatAggregate {
    pub subject_id: String,
    pub season: SeasonSelector,
    pub subject_name: Option<String>,
    pub team_name: Option<String>,
    pub primary_pitch_type: Option<String>,
    pub games: u32,
    pub totals: Totals,
    pub metrics: DerivedMetrics,
}

pub type SeasonAggregate = StatAggregate;
pub type CareerAggregate = StatAggregate;

/// Grouping key for [`aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupBy {
    /// One aggregate per (subject, season).
    SubjectSeason,
    /// One career aggregate per subject.
    Subject,
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Group `records` and roll each group up. Output order follows the first
/// appearance of each key in the input.
///
/// Records without a subject id or season are dropped, including from
/// career groups, so a career line always equals the sum of its season
/// lines.
pub fn aggregate(records: &[GameStatRecord], group_by: GroupBy) -> Vec<StatAggregate> {
    let mut order: Vec<(String, SeasonSelector)> = Vec::new();
    let mut groups: HashMap<(String, SeasonSelector), Vec<&GameStatRecord>> = HashMap::new();
    let mut dropped = 0usize;

    for record in records {
        let (Some(subject), Some(season)) = (record.subject_id.as_deref(), record.season) else {
            dropped += 1;
            continue;
        };
        let season = match group_by {
            GroupBy::SubjectSeason => SeasonSelector::Season(season),
            GroupBy::Subject => SeasonSelector::Career,
        };
        let key = (subject.to_string(), season);
        groups
            .entry(key.clone())
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(record);
    }

    if dropped > 0 {
        warn!("dropped {dropped} records missing a subject id or season");
    }

    order
        .into_iter()
        .filter_map(|key| {
            let members = groups.remove(&key)?;
            Some(rollup(key.0, key.1, &members))
        })
        .collect()
}

fn rollup(subject_id: String, season: SeasonSelector, records: &[&GameStatRecord]) -> StatAggregate {
    let mut totals = Totals::default();
    let mut game_ids: HashSet<&str> = HashSet::new();
    let mut undated_games = 0.0;

    for record in records {
        for (counter, value) in &record.counters {
            totals.add(*counter, *value);
        }
        match record.game_id.as_deref() {
            Some(id) => {
                game_ids.insert(id);
            }
            // Without a game id the row stands for its own games column, or
            // a single game when that is missing too.
            None => undated_games += record.games.unwrap_or(1.0).max(0.0),
        }
    }

    StatAggregate {
        subject_id,
        season,
        subject_name: Representative::SubjectName.pick(records),
        team_name: Representative::TeamName.pick(records),
        primary_pitch_type: Representative::PitchType.pick(records),
        games: game_ids.len() as u32 + undated_games.round() as u32,
        totals,
        metrics: DerivedMetrics::default(),
    }
}
