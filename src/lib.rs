//! Plan Insight Library
//!
//! Duration reconciliation and diagnostics for TiDB binary execution plans.

pub mod config;
pub mod services;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use services::plan_analyzer::{
    AnalysisContext, PlanForest, PlanNode, analyze_binary_plan, analyze_binary_plan_json,
    analyze_plan_forest, analyze_plan_json,
};
pub use utils::{AppError, AppResult};
