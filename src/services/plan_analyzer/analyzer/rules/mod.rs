//! Diagnostic rules module
//!
//! Implements the rules evaluated per plan operator.
//! Rules are organized by operator type:
//! - common (G): any operator
//! - scan (S): scans and selections over them
//! - join (J): index joins
//! - reader (R): index lookup readers

pub mod common;
pub mod join;
pub mod reader;
pub mod scan;

use super::operator::OperatorKind;
use super::thresholds::DiagnosticThresholds;
use crate::services::plan_analyzer::models::PlanNode;

// ============================================================================
// Rule Trait and Types
// ============================================================================

/// Severity level for diagnostic rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RuleSeverity {
    /// Optimization suggestion
    Info = 0,
    /// Likely cause of a slow plan
    Warning = 1,
}

/// A diagnostic result from rule evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub rule_id: String,
    pub rule_name: String,
    pub severity: RuleSeverity,
    /// Operator the diagnostic was raised on
    pub node_name: String,
    /// Human readable message, written into the node's diagnosis list
    pub message: String,
}

/// Context for rule evaluation
pub struct RuleContext<'a> {
    pub node: &'a PlanNode,
    pub kind: OperatorKind,
    /// True while no estimation check has been attributed below this node
    pub needs_stats_check: bool,
    pub thresholds: &'a DiagnosticThresholds,
}

impl<'a> RuleContext<'a> {
    pub fn new(node: &'a PlanNode, thresholds: &'a DiagnosticThresholds) -> Self {
        Self { node, kind: node.operator_kind(), needs_stats_check: false, thresholds }
    }

    pub fn act_rows(&self) -> Option<u64> {
        self.node.act_rows
    }

    pub fn est_rows(&self) -> Option<f64> {
        self.node.est_rows
    }

    pub fn operator_info(&self) -> &str {
        self.node.operator_info()
    }

    /// First scanned table, qualified with its database when known
    pub fn table_name(&self) -> Option<String> {
        self.node
            .access_objects
            .iter()
            .filter_map(|obj| obj.scan_object.as_ref())
            .find_map(|scan| match (&scan.database, &scan.table) {
                (Some(db), Some(table)) if !db.is_empty() => Some(format!("{}.{}", db, table)),
                (_, Some(table)) => Some(table.clone()),
                _ => None,
            })
    }

    /// Build a diagnostic for `rule` on the current node
    pub fn diagnostic(
        &self,
        rule: &dyn DiagnosticRule,
        severity: RuleSeverity,
        message: String,
    ) -> Diagnostic {
        Diagnostic {
            rule_id: rule.id().to_string(),
            rule_name: rule.name().to_string(),
            severity,
            node_name: self.node.name.clone(),
            message,
        }
    }
}

/// Trait for diagnostic rules
pub trait DiagnosticRule: Send + Sync {
    /// Rule ID (e.g., "S001")
    fn id(&self) -> &str;

    /// Rule name
    fn name(&self) -> &str;

    /// Check if rule applies to this operator kind
    fn applicable_to(&self, kind: OperatorKind) -> bool;

    /// Evaluate the rule
    fn evaluate(&self, context: &RuleContext) -> Option<Diagnostic>;
}

/// All node rules in evaluation order
pub fn get_all_rules() -> Vec<Box<dyn DiagnosticRule>> {
    let mut rules: Vec<Box<dyn DiagnosticRule>> = Vec::new();
    rules.extend(common::get_rules());
    rules.extend(scan::get_estimation_rules());
    rules.extend(join::get_rules());
    rules.extend(reader::get_rules());
    rules.extend(scan::get_rules());
    rules
}

/// Human friendly row count, e.g. `6,000,000`
pub fn format_rows(rows: u64) -> String {
    let digits = rows.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
