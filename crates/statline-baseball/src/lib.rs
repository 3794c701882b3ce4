// Baseball statistics subsystem: per-game facts rolled up into season and
// career lines, sabermetric ratios, and cohort rank/percentile context.

pub mod aggregate;
pub mod format;
pub mod metrics;
pub mod ranking;
pub mod record;
pub mod selector;
pub mod service;
