//! Plan field formatter
//!
//! Normalizes a freshly decoded plan before analysis:
//! - `-1` byte counts become `N/A`
//! - free-text execution summaries become structured key/value objects
//! - protobuf side labels become `driverSide`
//!
//! Running the formatter on an already formatted plan changes nothing.

use crate::services::plan_analyzer::models::{
    ByteCount, DriverSide, ExecInfo, PlanForest, PlanNode,
};
use crate::services::plan_analyzer::parser::core::ExecInfoParser;
use crate::services::plan_analyzer::parser::error::ParseResult;
use serde_json::Value;

const LABELS_KEY: &str = "labels";

/// Formatter for decoded plan trees
pub struct PlanFormatter;

impl PlanFormatter {
    /// Format every tree of the forest
    pub fn format_forest(forest: &mut PlanForest) -> ParseResult<()> {
        for tree in forest.trees_mut() {
            Self::format_node(tree)?;
        }
        Ok(())
    }

    /// Format a node and all of its descendants
    pub fn format_node(node: &mut PlanNode) -> ParseResult<()> {
        node.disk_bytes = node.disk_bytes.map(ByteCount::normalized);
        node.memory_bytes = node.memory_bytes.map(ByteCount::normalized);

        for info in node.root_group_exec_info.iter_mut() {
            Self::structure_exec_info(&node.name, info);
        }
        if let Some(info) = node.root_basic_exec_info.as_mut() {
            Self::structure_exec_info(&node.name, info);
        }
        if let Some(info) = node.cop_exec_info.as_mut() {
            Self::structure_exec_info(&node.name, info);
        }

        if node.driver_side.is_none() {
            node.driver_side = Self::driver_side_from_labels(node);
        }

        for child in node.children.iter_mut() {
            Self::format_node(child)?;
        }
        Ok(())
    }

    /// Replace raw summary text with its structured form, keeping the text
    /// when it does not follow the micro-format
    fn structure_exec_info(node_name: &str, info: &mut ExecInfo) {
        let ExecInfo::Raw(text) = info else {
            return;
        };

        match ExecInfoParser::parse(text) {
            Ok(map) => *info = ExecInfo::Structured(map),
            Err(e) => {
                tracing::debug!("Keeping raw execution info of {}: {}", node_name, e);
            },
        }
    }

    /// Producers that emit the protobuf message directly carry the side as a
    /// label list (`1` build, `2` probe) instead of `driverSide`
    fn driver_side_from_labels(node: &PlanNode) -> Option<DriverSide> {
        let labels = node.other_attributes.get(LABELS_KEY)?.as_array()?;

        labels.iter().find_map(|label| match label {
            Value::Number(n) => match n.as_i64() {
                Some(1) => Some(DriverSide::Build),
                Some(2) => Some(DriverSide::Probe),
                _ => None,
            },
            Value::String(s) => match s.to_ascii_lowercase().as_str() {
                "build" | "buildside" => Some(DriverSide::Build),
                "probe" | "probeside" => Some(DriverSide::Probe),
                _ => None,
            },
            _ => None,
        })
    }
}
