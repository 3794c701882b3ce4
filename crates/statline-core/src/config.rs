// Configuration loading and parsing (config/stats.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::source::is_valid_identifier;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },
}

// ---------------------------------------------------------------------------
// stats.toml structs
// ---------------------------------------------------------------------------

/// Top-level configuration for the statistics subsystem. Every section is
/// optional in the file; omitted sections take their defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StatsConfig {
    pub store: StoreConfig,
    pub tables: TableConfig,
    pub rounding: RoundingConfig,
    pub cohort: CohortConfig,
}

/// Where the fact tables live in the analytic store.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Warehouse project qualifier (e.g. a GCP project id).
    pub project: Option<String>,
    /// Dataset qualifier (e.g. `mlb`).
    pub dataset: Option<String>,
}

impl StoreConfig {
    /// Fully-qualified, backtick-quoted reference for `table`.
    pub fn qualified_table(&self, table: &str) -> String {
        let parts: Vec<&str> = [self.project.as_deref(), self.dataset.as_deref(), Some(table)]
            .into_iter()
            .flatten()
            .filter(|p| !p.is_empty())
            .collect();
        format!("`{}`", parts.join("."))
    }
}

/// Logical fact-table names.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub batting: String,
    pub pitching: String,
    pub teams: String,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            batting: "fct_mlb__player_batting_stats".into(),
            pitching: "fct_mlb__player_pitching_stats".into(),
            teams: "fct_mlb__team_game_stats".into(),
        }
    }
}

/// Display precision for derived metrics.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoundingConfig {
    /// Batting-style ratios (AVG, OBP, SLG, OPS, K%, BB%).
    pub rate_decimals: u32,
    /// ERA-style ratios (ERA, WHIP, K/9).
    pub era_decimals: u32,
}

impl Default for RoundingConfig {
    fn default() -> Self {
        Self {
            rate_decimals: 3,
            era_decimals: 2,
        }
    }
}

/// Minimum playing time for a subject to be ranked against its cohort.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CohortConfig {
    pub min_at_bats: f64,
    pub min_innings_pitched: f64,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/stats.toml` relative to `base_dir`. A missing
/// file is an error; use [`StatsConfig::default`] when running without one.
pub fn load_config_from(base_dir: &Path) -> Result<StatsConfig, ConfigError> {
    let path = base_dir.join("config").join("stats.toml");
    let text = read_file(&path)?;
    let config = parse_config(&text, &path)?;
    validate(&config)?;
    Ok(config)
}

fn parse_config(text: &str, path: &Path) -> Result<StatsConfig, ConfigError> {
    toml::from_str(text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Largest rounding precision accepted; beyond this f64 rounding is noise.
const MAX_DECIMALS: u32 = 6;

pub fn validate(config: &StatsConfig) -> Result<(), ConfigError> {
    let tables: &[(&str, &str)] = &[
        ("tables.batting", config.tables.batting.as_str()),
        ("tables.pitching", config.tables.pitching.as_str()),
        ("tables.teams", config.tables.teams.as_str()),
    ];
    for (field, name) in tables {
        if !is_valid_identifier(name) {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: format!("not a valid table identifier: {name:?}"),
            });
        }
    }

    let qualifiers: &[(&str, &Option<String>)] = &[
        ("store.project", &config.store.project),
        ("store.dataset", &config.store.dataset),
    ];
    for (field, value) in qualifiers {
        if let Some(v) = value {
            if !v.is_empty() && !is_valid_identifier(v) {
                return Err(ConfigError::ValidationError {
                    field: field.to_string(),
                    message: format!("not a valid identifier: {v:?}"),
                });
            }
        }
    }

    let decimals: &[(&str, u32)] = &[
        ("rounding.rate_decimals", config.rounding.rate_decimals),
        ("rounding.era_decimals", config.rounding.era_decimals),
    ];
    for (field, val) in decimals {
        if *val > MAX_DECIMALS {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: format!("must be <= {MAX_DECIMALS}, got {val}"),
            });
        }
    }

    let thresholds: &[(&str, f64)] = &[
        ("cohort.min_at_bats", config.cohort.min_at_bats),
        ("cohort.min_innings_pitched", config.cohort.min_innings_pitched),
    ];
    for (field, val) in thresholds {
        if !val.is_finite() || *val < 0.0 {
            return Err(ConfigError::ValidationError {
                field: field.to_string(),
                message: format!("must be a finite value >= 0, got {val}"),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn crate_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
    }

    #[test]
    fn load_shipped_config() {
        let config = load_config_from(&crate_root()).expect("should load shipped config");

        assert!(config.store.dataset.is_none());
        assert!(config.store.project.is_none());
        assert_eq!(config.tables.batting, "fct_mlb__player_batting_stats");
        assert_eq!(config.tables.pitching, "fct_mlb__player_pitching_stats");
        assert_eq!(config.rounding.rate_decimals, 3);
        assert_eq!(config.rounding.era_decimals, 2);
        assert!((config.cohort.min_at_bats - 100.0).abs() < f64::EPSILON);
        assert!((config.cohort.min_innings_pitched - 30.0).abs() < f64::EPSILON);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("", Path::new("stats.toml")).unwrap();
        validate(&config).unwrap();
        assert_eq!(config.tables.teams, "fct_mlb__team_game_stats");
        assert_eq!(config.rounding.rate_decimals, 3);
        assert!(config.store.project.is_none());
        assert_eq!(config.cohort.min_at_bats, 0.0);
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = parse_config(
            "[rounding]\nera_decimals = 3\n",
            Path::new("stats.toml"),
        )
        .unwrap();
        assert_eq!(config.rounding.era_decimals, 3);
        assert_eq!(config.rounding.rate_decimals, 3);
    }

    #[test]
    fn missing_file_is_file_not_found() {
        let tmp = std::env::temp_dir().join("statline_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }

    #[test]
    fn malformed_toml_is_parse_error() {
        let tmp = std::env::temp_dir().join("statline_config_malformed");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config/stats.toml"), "[tables\nbatting = 1").unwrap();

        let err = load_config_from(&tmp).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn invalid_table_name_rejected() {
        let mut config = StatsConfig::default();
        config.tables.batting = "batting; DROP TABLE x".into();
        match validate(&config) {
            Err(ConfigError::ValidationError { field, .. }) => assert_eq!(field, "tables.batting"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn negative_threshold_rejected() {
        let mut config = StatsConfig::default();
        config.cohort.min_innings_pitched = -1.0;
        match validate(&config) {
            Err(ConfigError::ValidationError { field, .. }) => {
                assert_eq!(field, "cohort.min_innings_pitched")
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn excessive_precision_rejected() {
        let mut config = StatsConfig::default();
        config.rounding.rate_decimals = 12;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn qualified_table_joins_present_parts() {
        let store = StoreConfig {
            project: Some("stats-hq".into()),
            dataset: Some("mlb".into()),
        };
        assert_eq!(store.qualified_table("fct_mlb__games"), "`stats-hq.mlb.fct_mlb__games`");

        let bare = StoreConfig::default();
        assert_eq!(bare.qualified_table("games"), "`games`");
    }
}
