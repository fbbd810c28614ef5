//! Diagnostic thresholds
//!
//! All limits the diagnostic rules compare against. Defaults live in
//! [`defaults`]; every value can be overridden from the `[analyzer]` config
//! section.

use serde::{Deserialize, Serialize};

/// Default threshold values
pub mod defaults {
    /// Actual vs estimated rows differing by more than this factor (S001)
    pub const ESTIMATION_ERROR_RATIO: f64 = 100.0;

    /// Index join build side tasks above which the join is flagged (J001)
    pub const INDEX_JOIN_MAX_BUILD_TASKS: u64 = 10_000;

    /// Fraction of index rows surviving the selection (R001)
    pub const INDEX_READ_SELECTIVITY: f64 = 0.7;

    /// Selection output below which an index would pay off (S002)
    pub const MISSING_INDEX_MAX_SELECTION_ROWS: u64 = 10_000;

    /// Scanned rows above which a missing index is flagged (S002)
    pub const MISSING_INDEX_MIN_SCAN_ROWS: u64 = 5_000_000;

    /// TiKV full scan rows above which TiFlash is suggested (S003)
    pub const TIFLASH_SUGGEST_ROWS: u64 = 1_000_000_000;

    /// Schemas whose statistics are never collected
    pub const SYSTEM_SCHEMAS: [&str; 4] =
        ["mysql", "information_schema", "performance_schema", "metrics_schema"];
}

/// Threshold set used by the rule engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiagnosticThresholds {
    pub estimation_error_ratio: f64,
    pub index_join_max_build_tasks: u64,
    pub index_read_selectivity: f64,
    pub missing_index_max_selection_rows: u64,
    pub missing_index_min_scan_rows: u64,
    pub tiflash_suggest_rows: u64,
    pub system_schemas: Vec<String>,
}

impl Default for DiagnosticThresholds {
    fn default() -> Self {
        Self {
            estimation_error_ratio: defaults::ESTIMATION_ERROR_RATIO,
            index_join_max_build_tasks: defaults::INDEX_JOIN_MAX_BUILD_TASKS,
            index_read_selectivity: defaults::INDEX_READ_SELECTIVITY,
            missing_index_max_selection_rows: defaults::MISSING_INDEX_MAX_SELECTION_ROWS,
            missing_index_min_scan_rows: defaults::MISSING_INDEX_MIN_SCAN_ROWS,
            tiflash_suggest_rows: defaults::TIFLASH_SUGGEST_ROWS,
            system_schemas: defaults::SYSTEM_SCHEMAS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl DiagnosticThresholds {
    /// Whether `database` is a built-in schema without statistics
    pub fn is_system_schema(&self, database: &str) -> bool {
        self.system_schemas
            .iter()
            .any(|schema| schema.eq_ignore_ascii_case(database))
    }
}
