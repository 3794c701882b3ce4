// Request selectors: which seasons to aggregate and which subject type.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectorError {
    #[error("invalid season selector {0:?}: expected a year or one of career, all, career_avg, career-average")]
    InvalidSeason(String),

    #[error("invalid stat type {0:?}: expected batting, pitching or team")]
    InvalidStatKind(String),
}

// ---------------------------------------------------------------------------
// Season selector
// ---------------------------------------------------------------------------

/// Spellings that all mean "aggregate across every season". The empty
/// string covers a blank query parameter.
const CAREER_ALIASES: &[&str] = &["", "career", "all", "career_avg", "career-average"];

/// A single season, or the career sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SeasonSelector {
    Season(i32),
    Career,
}

impl SeasonSelector {
    /// Parse a season selector. Absent, blank and any career alias (compared
    /// case-insensitively after trimming) select the career view.
    pub fn parse(raw: Option<&str>) -> Result<Self, SelectorError> {
        let Some(raw) = raw else {
            return Ok(SeasonSelector::Career);
        };
        let normalized = raw.trim().to_ascii_lowercase();
        if CAREER_ALIASES.contains(&normalized.as_str()) {
            return Ok(SeasonSelector::Career);
        }
        match normalized.parse::<i32>() {
            Ok(year) if year > 0 => Ok(SeasonSelector::Season(year)),
            _ => Err(SelectorError::InvalidSeason(raw.to_string())),
        }
    }

    pub fn year(&self) -> Option<i32> {
        match self {
            SeasonSelector::Season(y) => Some(*y),
            SeasonSelector::Career => None,
        }
    }

    pub fn is_career(&self) -> bool {
        matches!(self, SeasonSelector::Career)
    }
}

impl fmt::Display for SeasonSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeasonSelector::Season(y) => write!(f, "{y}"),
            SeasonSelector::Career => write!(f, "career"),
        }
    }
}

/// Seasons serialize as their year; the career sentinel as `"career"`.
impl Serialize for SeasonSelector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            SeasonSelector::Season(y) => serializer.serialize_i32(*y),
            SeasonSelector::Career => serializer.serialize_str("career"),
        }
    }
}

// ---------------------------------------------------------------------------
// Stat kind
// ---------------------------------------------------------------------------

/// Which subject type and formula set a request uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatKind {
    Batting,
    Pitching,
    Team,
}

impl StatKind {
    pub fn parse(raw: &str) -> Result<Self, SelectorError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "batting" | "hitting" => Ok(StatKind::Batting),
            "pitching" => Ok(StatKind::Pitching),
            "team" | "teams" => Ok(StatKind::Team),
            _ => Err(SelectorError::InvalidStatKind(raw.to_string())),
        }
    }

    /// The column that joins a subject to the per-game fact table.
    pub const fn join_column(&self) -> &'static str {
        match self {
            StatKind::Batting => "batter_id",
            StatKind::Pitching => "pitcher_id",
            StatKind::Team => "team_id",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatKind::Batting => "batting",
            StatKind::Pitching => "pitching",
            StatKind::Team => "team",
        }
    }
}

impl fmt::Display for StatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn career_aliases_are_equivalent() {
        for raw in ["career", "", "ALL", "  all  ", "Career_Avg", "career-average", "CAREER"] {
            assert_eq!(
                SeasonSelector::parse(Some(raw)),
                Ok(SeasonSelector::Career),
                "{raw:?} should select the career view"
            );
        }
        assert_eq!(SeasonSelector::parse(None), Ok(SeasonSelector::Career));
    }

    #[test]
    fn year_parses_with_whitespace() {
        assert_eq!(SeasonSelector::parse(Some(" 2024 ")), Ok(SeasonSelector::Season(2024)));
        assert_eq!(SeasonSelector::Season(2024).year(), Some(2024));
        assert!(!SeasonSelector::Season(2024).is_career());
    }

    #[test]
    fn garbage_season_rejected() {
        assert_eq!(
            SeasonSelector::parse(Some("last-year")),
            Err(SelectorError::InvalidSeason("last-year".into()))
        );
        assert!(SeasonSelector::parse(Some("-5")).is_err());
        assert!(SeasonSelector::parse(Some("career avg")).is_err());
    }

    #[test]
    fn season_serializes_as_year_or_sentinel() {
        assert_eq!(serde_json::to_string(&SeasonSelector::Season(2023)).unwrap(), "2023");
        assert_eq!(serde_json::to_string(&SeasonSelector::Career).unwrap(), "\"career\"");
    }

    #[test]
    fn stat_kind_selects_join_column() {
        assert_eq!(StatKind::parse("batting").unwrap().join_column(), "batter_id");
        assert_eq!(StatKind::parse(" Pitching ").unwrap().join_column(), "pitcher_id");
        assert_eq!(StatKind::parse("HITTING").unwrap(), StatKind::Batting);
        assert_eq!(StatKind::parse("team").unwrap().join_column(), "team_id");
        assert!(StatKind::parse("fielding").is_err());
    }
}
