//! Plan analyzer module
//!
//! Reconciles operator durations and runs rule-based diagnostics over a
//! formatted plan.

pub mod concurrency;
pub mod duration;
pub mod operator;
pub mod rule_engine;
pub mod rules;
pub mod thresholds;

pub use concurrency::{ConcurrencyResolver, ConcurrencyState};
pub use duration::DurationAnalyzer;
pub use operator::OperatorKind;
pub use rule_engine::RuleEngine;
pub use thresholds::DiagnosticThresholds;
