// Derived sabermetric ratios computed from aggregated totals.
//
// Every formula goes through `safe_divide`, so a ratio is either a finite
// number or `None`. Values are kept at full precision here; rounding happens
// once, when a line is formatted for output.

use serde::Serialize;
use statline_core::config::RoundingConfig;

use crate::aggregate::{StatAggregate, Totals};
use crate::ranking::Direction;
use crate::record::Counter;
use crate::selector::StatKind;

// ---------------------------------------------------------------------------
// Null-safe arithmetic
// ---------------------------------------------------------------------------

/// `numerator / denominator`, or `None` when either side is absent, the
/// denominator is zero, or the quotient is not finite.
pub fn safe_divide(numerator: Option<f64>, denominator: Option<f64>) -> Option<f64> {
    let (n, d) = (numerator?, denominator?);
    if d == 0.0 {
        return None;
    }
    let q = n / d;
    q.is_finite().then_some(q)
}

fn add(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? + b?)
}

fn sub(a: Option<f64>, b: Option<f64>) -> Option<f64> {
    Some(a? - b?)
}

fn scale(a: Option<f64>, factor: f64) -> Option<f64> {
    a.map(|v| v * factor)
}

/// Round half away from zero to `decimals` places.
pub fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

// ---------------------------------------------------------------------------
// Formula sets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct BattingMetrics {
    pub avg: Option<f64>,
    pub obp: Option<f64>,
    pub slg: Option<f64>,
    pub ops: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct PitchingMetrics {
    pub era: Option<f64>,
    pub whip: Option<f64>,
    pub k_per_9: Option<f64>,
    pub k_pct: Option<f64>,
    pub bb_pct: Option<f64>,
}

/// Derived block attached to an aggregate. Only the sets that apply to the
/// aggregate's stat kind are filled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DerivedMetrics {
    pub batting: Option<BattingMetrics>,
    pub pitching: Option<PitchingMetrics>,
    pub run_differential: Option<f64>,
}

pub fn compute_batting_metrics(totals: &Totals) -> BattingMetrics {
    let ab = totals.get(Counter::AtBats);
    let h = totals.get(Counter::Hits);
    let bb = totals.get(Counter::Walks);
    let tb = totals.get(Counter::TotalBases);

    let avg = safe_divide(h, ab);
    let obp = safe_divide(add(h, bb), add(ab, bb));
    let slg = safe_divide(tb, ab);
    BattingMetrics {
        avg,
        obp,
        slg,
        ops: add(obp, slg),
    }
}

pub fn compute_pitching_metrics(totals: &Totals) -> PitchingMetrics {
    let ip = totals.get(Counter::InningsPitched);
    let k = totals.get(Counter::Strikeouts);
    let bb = totals.get(Counter::Walks);
    let bf = totals.get(Counter::BattersFaced);

    PitchingMetrics {
        era: safe_divide(scale(totals.get(Counter::EarnedRuns), 9.0), ip),
        whip: safe_divide(add(bb, totals.get(Counter::HitsAllowed)), ip),
        k_per_9: safe_divide(scale(k, 9.0), ip),
        k_pct: safe_divide(k, bf),
        bb_pct: safe_divide(bb, bf),
    }
}

pub fn compute_run_differential(totals: &Totals) -> Option<f64> {
    sub(totals.get(Counter::Runs), totals.get(Counter::RunsAllowed))
}

/// Compute the formula sets that apply to `kind`.
pub fn derive_metrics(kind: StatKind, totals: &Totals) -> DerivedMetrics {
    match kind {
        StatKind::Batting => DerivedMetrics {
            batting: Some(compute_batting_metrics(totals)),
            ..DerivedMetrics::default()
        },
        StatKind::Pitching => DerivedMetrics {
            pitching: Some(compute_pitching_metrics(totals)),
            ..DerivedMetrics::default()
        },
        StatKind::Team => DerivedMetrics {
            batting: Some(compute_batting_metrics(totals)),
            pitching: None,
            run_differential: compute_run_differential(totals),
        },
    }
}

/// Fill in the derived block of every aggregate.
pub fn apply_metrics(kind: StatKind, aggregates: &mut [StatAggregate]) {
    for agg in aggregates {
        agg.metrics = derive_metrics(kind, &agg.totals);
    }
}

// ---------------------------------------------------------------------------
// Metric catalogue
// ---------------------------------------------------------------------------

/// Display precision class of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Precision {
    /// Batting-style ratio (.300).
    Rate,
    /// ERA-style ratio (3.45).
    EraStyle,
    /// Summed count. Rounded only to strip float noise from fractional sums.
    Count,
}

/// Decimal places used to strip float noise from summed counts.
const COUNT_DECIMALS: u32 = 3;

impl Precision {
    pub fn decimals(&self, rounding: &RoundingConfig) -> u32 {
        match self {
            Precision::Rate => rounding.rate_decimals,
            Precision::EraStyle => rounding.era_decimals,
            Precision::Count => COUNT_DECIMALS,
        }
    }
}

/// A statistic that can be reported and ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Metric {
    Avg,
    Obp,
    Slg,
    Ops,
    Hits,
    HomeRuns,
    Rbi,
    Runs,
    StolenBases,
    Walks,
    War,
    Era,
    Whip,
    KPer9,
    KPct,
    BbPct,
    Strikeouts,
    InningsPitched,
    RunDifferential,
}

const BATTING_TRACKED: &[Metric] = &[
    Metric::Avg,
    Metric::Obp,
    Metric::Slg,
    Metric::Ops,
    Metric::Hits,
    Metric::HomeRuns,
    Metric::Rbi,
    Metric::Runs,
    Metric::StolenBases,
    Metric::Walks,
    Metric::War,
];

const PITCHING_TRACKED: &[Metric] = &[
    Metric::Era,
    Metric::Whip,
    Metric::KPer9,
    Metric::KPct,
    Metric::BbPct,
    Metric::Strikeouts,
    Metric::InningsPitched,
    Metric::War,
];

const TEAM_TRACKED: &[Metric] = &[
    Metric::RunDifferential,
    Metric::Runs,
    Metric::HomeRuns,
    Metric::Avg,
    Metric::Ops,
];

impl Metric {
    pub fn key(&self) -> &'static str {
        match self {
            Metric::Avg => "avg",
            Metric::Obp => "obp",
            Metric::Slg => "slg",
            Metric::Ops => "ops",
            Metric::Hits => "hits",
            Metric::HomeRuns => "home_runs",
            Metric::Rbi => "rbi",
            Metric::Runs => "runs",
            Metric::StolenBases => "stolen_bases",
            Metric::Walks => "walks",
            Metric::War => "war",
            Metric::Era => "era",
            Metric::Whip => "whip",
            Metric::KPer9 => "k_per_9",
            Metric::KPct => "k_pct",
            Metric::BbPct => "bb_pct",
            Metric::Strikeouts => "strikeouts",
            Metric::InningsPitched => "innings_pitched",
            Metric::RunDifferential => "run_differential",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Metric::Era | Metric::Whip | Metric::BbPct => Direction::LowerIsBetter,
            _ => Direction::HigherIsBetter,
        }
    }

    pub fn precision(&self) -> Precision {
        match self {
            Metric::Avg | Metric::Obp | Metric::Slg | Metric::Ops | Metric::KPct | Metric::BbPct => {
                Precision::Rate
            }
            Metric::Era | Metric::Whip | Metric::KPer9 => Precision::EraStyle,
            _ => Precision::Count,
        }
    }

    pub fn decimals(&self, rounding: &RoundingConfig) -> u32 {
        self.precision().decimals(rounding)
    }

    /// The counter a count metric reads, if it is one.
    pub fn counter(&self) -> Option<Counter> {
        match self {
            Metric::Hits => Some(Counter::Hits),
            Metric::HomeRuns => Some(Counter::HomeRuns),
            Metric::Rbi => Some(Counter::Rbi),
            Metric::Runs => Some(Counter::Runs),
            Metric::StolenBases => Some(Counter::StolenBases),
            Metric::Walks => Some(Counter::Walks),
            Metric::War => Some(Counter::War),
            Metric::Strikeouts => Some(Counter::Strikeouts),
            Metric::InningsPitched => Some(Counter::InningsPitched),
            _ => None,
        }
    }

    /// Full-precision value of this metric for `agg`.
    pub fn value(&self, agg: &StatAggregate) -> Option<f64> {
        if let Some(counter) = self.counter() {
            return agg.totals.get(counter);
        }
        let m = &agg.metrics;
        match self {
            Metric::Avg => m.batting?.avg,
            Metric::Obp => m.batting?.obp,
            Metric::Slg => m.batting?.slg,
            Metric::Ops => m.batting?.ops,
            Metric::Era => m.pitching?.era,
            Metric::Whip => m.pitching?.whip,
            Metric::KPer9 => m.pitching?.k_per_9,
            Metric::KPct => m.pitching?.k_pct,
            Metric::BbPct => m.pitching?.bb_pct,
            Metric::RunDifferential => m.run_differential,
            _ => None,
        }
    }

    /// Metrics ranked by default for a stat kind.
    pub fn tracked(kind: StatKind) -> &'static [Metric] {
        match kind {
            StatKind::Batting => BATTING_TRACKED,
            StatKind::Pitching => PITCHING_TRACKED,
            StatKind::Team => TEAM_TRACKED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|a| (a - b).abs() < 1e-9)
    }

    // -- safe_divide --

    #[test]
    fn safe_divide_by_zero_or_null_is_none() {
        for n in [Some(0.0), Some(3.0), Some(-2.5), None] {
            assert_eq!(safe_divide(n, Some(0.0)), None);
            assert_eq!(safe_divide(n, None), None);
        }
        assert_eq!(safe_divide(None, Some(4.0)), None);
        assert_eq!(safe_divide(Some(3.0), Some(-0.0)), None);
    }

    #[test]
    fn safe_divide_never_returns_non_finite() {
        assert_eq!(safe_divide(Some(f64::MAX), Some(1e-300)), None);
        assert_eq!(safe_divide(Some(f64::NAN), Some(1.0)), None);
        assert_eq!(safe_divide(Some(6.0), Some(4.0)), Some(1.5));
    }

    #[test]
    fn round_to_places() {
        assert_eq!(round_to(3.0 / 7.0, 3), 0.429);
        assert_eq!(round_to(2.0 / 3.0, 2), 0.67);
        assert_eq!(round_to(0.0005, 3), 0.001);
        assert_eq!(round_to(12.0, 0), 12.0);
    }

    // -- batting --

    #[test]
    fn batting_formulas() {
        let totals = Totals::default()
            .with(Counter::AtBats, 500.0)
            .with(Counter::Hits, 150.0)
            .with(Counter::Walks, 50.0)
            .with(Counter::TotalBases, 250.0);
        let m = compute_batting_metrics(&totals);

        assert!(close(m.avg, 0.3));
        assert!(close(m.obp, 200.0 / 550.0));
        assert!(close(m.slg, 0.5));
        assert!(close(m.ops, 200.0 / 550.0 + 0.5));
    }

    #[test]
    fn ops_uses_full_precision_components() {
        // OBP .3636..., SLG .4545...: rounded components sum to .819 while
        // the full-precision OPS is .8181...
        let totals = Totals::default()
            .with(Counter::AtBats, 11.0)
            .with(Counter::Hits, 4.0)
            .with(Counter::Walks, 0.0)
            .with(Counter::TotalBases, 5.0);
        let m = compute_batting_metrics(&totals);
        assert!(close(m.ops, 4.0 / 11.0 + 5.0 / 11.0));
        assert_ne!(m.ops, Some(round_to(4.0 / 11.0, 3) + round_to(5.0 / 11.0, 3)));
    }

    #[test]
    fn missing_total_bases_nulls_slg_and_ops_only() {
        let totals = Totals::default()
            .with(Counter::AtBats, 7.0)
            .with(Counter::Hits, 3.0)
            .with(Counter::Walks, 1.0);
        let m = compute_batting_metrics(&totals);

        assert!(close(m.avg, 3.0 / 7.0));
        assert!(close(m.obp, 0.5));
        assert_eq!(m.slg, None);
        assert_eq!(m.ops, None);
    }

    #[test]
    fn zero_at_bats_nulls_ratios() {
        let totals = Totals::default()
            .with(Counter::AtBats, 0.0)
            .with(Counter::Hits, 0.0)
            .with(Counter::Walks, 0.0)
            .with(Counter::TotalBases, 0.0);
        let m = compute_batting_metrics(&totals);
        assert_eq!(m, BattingMetrics::default());
    }

    // -- pitching --

    #[test]
    fn pitching_formulas() {
        let totals = Totals::default()
            .with(Counter::InningsPitched, 180.0)
            .with(Counter::EarnedRuns, 60.0)
            .with(Counter::Walks, 45.0)
            .with(Counter::HitsAllowed, 150.0)
            .with(Counter::Strikeouts, 200.0)
            .with(Counter::BattersFaced, 740.0);
        let m = compute_pitching_metrics(&totals);

        assert!(close(m.era, 3.0));
        assert!(close(m.whip, 195.0 / 180.0));
        assert!(close(m.k_per_9, 10.0));
        assert!(close(m.k_pct, 200.0 / 740.0));
        assert!(close(m.bb_pct, 45.0 / 740.0));
    }

    #[test]
    fn zero_innings_nulls_era_and_whip() {
        let totals = Totals::default()
            .with(Counter::InningsPitched, 0.0)
            .with(Counter::EarnedRuns, 2.0)
            .with(Counter::Walks, 1.0)
            .with(Counter::HitsAllowed, 3.0)
            .with(Counter::Strikeouts, 0.0);
        let m = compute_pitching_metrics(&totals);
        assert_eq!(m.era, None);
        assert_eq!(m.whip, None);
        assert_eq!(m.k_per_9, None);
    }

    #[test]
    fn missing_batters_faced_nulls_rate_percentages() {
        let totals = Totals::default()
            .with(Counter::InningsPitched, 6.0)
            .with(Counter::Strikeouts, 8.0)
            .with(Counter::Walks, 2.0);
        let m = compute_pitching_metrics(&totals);
        assert!(close(m.k_per_9, 12.0));
        assert_eq!(m.k_pct, None);
        assert_eq!(m.bb_pct, None);
    }

    // -- team --

    #[test]
    fn run_differential_needs_both_sides() {
        let totals = Totals::default()
            .with(Counter::Runs, 780.0)
            .with(Counter::RunsAllowed, 690.0);
        assert_eq!(compute_run_differential(&totals), Some(90.0));

        let partial = Totals::default().with(Counter::Runs, 780.0);
        assert_eq!(compute_run_differential(&partial), None);
    }

    #[test]
    fn derive_fills_only_applicable_sets() {
        let totals = Totals::default().with(Counter::AtBats, 4.0).with(Counter::Hits, 1.0);
        let batting = derive_metrics(StatKind::Batting, &totals);
        assert!(batting.batting.is_some());
        assert!(batting.pitching.is_none());

        let pitching = derive_metrics(StatKind::Pitching, &totals);
        assert!(pitching.batting.is_none());
        assert!(pitching.pitching.is_some());

        let team = derive_metrics(StatKind::Team, &totals);
        assert!(team.batting.is_some());
        assert_eq!(team.run_differential, None);
    }

    // -- catalogue --

    #[test]
    fn lower_is_better_metrics() {
        assert_eq!(Metric::Era.direction(), Direction::LowerIsBetter);
        assert_eq!(Metric::Whip.direction(), Direction::LowerIsBetter);
        assert_eq!(Metric::BbPct.direction(), Direction::LowerIsBetter);
        assert_eq!(Metric::KPct.direction(), Direction::HigherIsBetter);
        assert_eq!(Metric::Ops.direction(), Direction::HigherIsBetter);
    }

    #[test]
    fn precision_follows_config() {
        let rounding = RoundingConfig::default();
        assert_eq!(Metric::Avg.decimals(&rounding), 3);
        assert_eq!(Metric::Era.decimals(&rounding), 2);
        assert_eq!(Metric::KPer9.decimals(&rounding), 2);
        assert_eq!(Metric::KPct.decimals(&rounding), 3);
        assert_eq!(Metric::HomeRuns.precision(), Precision::Count);
    }

    #[test]
    fn tracked_metrics_are_unique() {
        for kind in [StatKind::Batting, StatKind::Pitching, StatKind::Team] {
            let tracked = Metric::tracked(kind);
            let mut keys: Vec<&str> = tracked.iter().map(|m| m.key()).collect();
            keys.sort_unstable();
            keys.dedup();
            assert_eq!(keys.len(), tracked.len());
        }
    }
}
