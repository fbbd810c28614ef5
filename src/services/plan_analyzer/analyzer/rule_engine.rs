//! Rule Engine for Plan Diagnostics
//!
//! Walks a plan bottom-up and replaces every node's diagnosis list with the
//! messages of the rules that fire on it.

use super::rules::scan::ESTIMATION_RULE_ID;
use super::rules::{Diagnostic, DiagnosticRule, RuleContext, get_all_rules};
use super::thresholds::DiagnosticThresholds;
use crate::services::plan_analyzer::models::{PlanForest, PlanNode};

/// Rule engine for plan diagnostics
pub struct RuleEngine {
    thresholds: DiagnosticThresholds,
    rules: Vec<Box<dyn DiagnosticRule>>,
}

impl RuleEngine {
    /// Create a new rule engine with default thresholds
    pub fn new() -> Self {
        Self::with_thresholds(DiagnosticThresholds::default())
    }

    pub fn with_thresholds(thresholds: DiagnosticThresholds) -> Self {
        Self { thresholds, rules: get_all_rules() }
    }

    pub fn thresholds(&self) -> &DiagnosticThresholds {
        &self.thresholds
    }

    /// Diagnose every tree of the forest, returning the number of diagnostics
    pub fn diagnose_forest(&self, forest: &mut PlanForest) -> usize {
        let mut total = 0;
        for tree in forest.trees_mut() {
            self.diagnose_node(tree, &mut total);
        }
        total
    }

    /// Diagnose a subtree bottom-up
    ///
    /// Returns whether an estimation check is still owed by this subtree: true
    /// at leaves, any child owing one passes it up, and it is settled once the
    /// check fires on a scan or selection or once a non-scan operator is met.
    pub fn diagnose_node(&self, node: &mut PlanNode, total: &mut usize) -> bool {
        let mut needs_stats_check = node.children.is_empty();
        for child in node.children.iter_mut() {
            needs_stats_check |= self.diagnose_node(child, total);
        }

        let mut context = RuleContext::new(node, &self.thresholds);
        context.needs_stats_check = needs_stats_check;
        let kind = context.kind;

        let diagnostics = self.evaluate(&context);
        let estimation_fired = diagnostics.iter().any(|d| d.rule_id == ESTIMATION_RULE_ID);

        for diag in &diagnostics {
            tracing::debug!(
                "{} [{}] {} ({:?})",
                diag.node_name,
                diag.rule_id,
                diag.rule_name,
                diag.severity
            );
        }
        *total += diagnostics.len();
        node.diagnosis = diagnostics.into_iter().map(|d| d.message).collect();

        kind.is_scan_or_selection() && needs_stats_check && !estimation_fired
    }

    /// Evaluate all applicable rules on one node, in rule order
    pub fn evaluate(&self, context: &RuleContext) -> Vec<Diagnostic> {
        self.rules
            .iter()
            .filter(|rule| rule.applicable_to(context.kind))
            .filter_map(|rule| rule.evaluate(context))
            .collect()
    }
}

impl Default for RuleEngine {
    fn default() -> Self {
        Self::new()
    }
}
