//! TiDB Binary Plan Analyzer
//!
//! Decodes binary execution plans, reconciles per-operator durations and
//! attaches rule-based diagnostics to every operator.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    analyze_binary_plan()                    │
//! │                           │                                 │
//! │           ┌───────────────┼───────────────┐                 │
//! │           ▼               ▼               ▼                 │
//! │  ┌─────────────┐  ┌──────────────┐  ┌─────────────┐         │
//! │  │   Parser    │  │   Analyzer   │  │   Models    │         │
//! │  │  ┌───────┐  │  │  ┌────────┐  │  │             │         │
//! │  │  │Decoder│  │  │  │Duration│  │  │  PlanForest │         │
//! │  │  └───────┘  │  │  │Analyzer│  │  │  PlanNode   │         │
//! │  │  ┌───────┐  │  │  └────────┘  │  │  ExecInfo   │         │
//! │  │  │Format-│  │  │  ┌────────┐  │  │  ByteCount  │         │
//! │  │  │ter    │  │  │  │  Rule  │  │  │  ...        │         │
//! │  │  └───────┘  │  │  │ Engine │  │  │             │         │
//! │  │  ┌───────┐  │  │  └────────┘  │  │             │         │
//! │  │  │Predic-│  │  │              │  │             │         │
//! │  │  │ate    │  │  │              │  │             │         │
//! │  │  └───────┘  │  │              │  │             │         │
//! │  └─────────────┘  └──────────────┘  └─────────────┘         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use plan_insight::services::plan_analyzer::analyze_binary_plan_json;
//!
//! let encoded = "..."; // base64 binary plan from the slow log
//! let annotated = analyze_binary_plan_json(encoded)?;
//! ```

pub mod analyzer;
pub mod models;
pub mod parser;

#[cfg(test)]
mod tests;

pub use analyzer::{DiagnosticThresholds, DurationAnalyzer, RuleEngine};
pub use models::*;
pub use parser::{BinaryPlanDecoder, ParseError, PlanFormatter};

use crate::utils::AppError;
use std::io::Read;
use std::path::Path;

/// Analysis context carrying the diagnostic thresholds
#[derive(Debug, Clone, Default)]
pub struct AnalysisContext {
    pub thresholds: DiagnosticThresholds,
}

impl AnalysisContext {
    pub fn with_thresholds(thresholds: DiagnosticThresholds) -> Self {
        Self { thresholds }
    }
}

/// Read plan text from a file, or from stdin when no path is given
pub fn read_plan_input(path: Option<&Path>) -> Result<String, AppError> {
    let input = match path {
        Some(path) => std::fs::read_to_string(path)?,
        None => {
            let mut input = String::new();
            std::io::stdin().read_to_string(&mut input)?;
            input
        },
    };
    tracing::debug!("Read {} bytes of plan input", input.len());
    Ok(input)
}

/// Decode, analyze and serialize an encoded plan with default thresholds
///
/// Empty input yields an empty string.
pub fn analyze_binary_plan_json(encoded: &str) -> Result<String, AppError> {
    match analyze_binary_plan(encoded, &AnalysisContext::default())? {
        Some(forest) => Ok(serde_json::to_string(&forest)?),
        None => Ok(String::new()),
    }
}

/// Decode an encoded plan and run the full analysis pipeline
pub fn analyze_binary_plan(
    encoded: &str,
    context: &AnalysisContext,
) -> Result<Option<PlanForest>, AppError> {
    let Some(forest) = BinaryPlanDecoder::new().decode(encoded)? else {
        tracing::debug!("Empty binary plan, nothing to analyze");
        return Ok(None);
    };

    Ok(Some(analyze_plan_forest(forest, context)?))
}

/// Analyze a plan given as already decoded JSON
pub fn analyze_plan_json(
    json: &str,
    context: &AnalysisContext,
) -> Result<Option<PlanForest>, AppError> {
    if json.trim().is_empty() {
        return Ok(None);
    }

    let forest: PlanForest = serde_json::from_str(json)?;
    Ok(Some(analyze_plan_forest(forest, context)?))
}

/// Run formatting, duration reconciliation and diagnostics on a forest
///
/// The pipeline is idempotent: analyzing an annotated forest again yields the
/// same forest.
pub fn analyze_plan_forest(
    mut forest: PlanForest,
    context: &AnalysisContext,
) -> Result<PlanForest, ParseError> {
    tracing::info!(
        "Analyzing plan: {} operators, {} CTE trees",
        forest.node_count(),
        forest.ctes.len()
    );

    PlanFormatter::format_forest(&mut forest)?;
    DurationAnalyzer::analyze_forest(&mut forest);

    let engine = RuleEngine::with_thresholds(context.thresholds.clone());
    let diagnostics = engine.diagnose_forest(&mut forest);

    tracing::info!(
        "Plan analyzed: main duration {}, {} diagnostics",
        forest
            .main
            .duration
            .map(parser::core::ValueParser::format_duration)
            .unwrap_or_default(),
        diagnostics
    );

    Ok(forest)
}
