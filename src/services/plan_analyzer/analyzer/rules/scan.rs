//! Scan operator diagnostic rules (S001-S003)
//!
//! Rules for table/index scans and the selections directly above them.

use super::*;
use crate::services::plan_analyzer::models::StoreType;
use crate::services::plan_analyzer::parser::PredicateParser;

pub const ESTIMATION_RULE_ID: &str = "S001";

/// S001: Row count estimation error
/// Condition: actual and estimated rows differ by more than 100x either way.
/// Only checked on the scan or selection nearest the data source.
pub struct S001EstimationError;

impl DiagnosticRule for S001EstimationError {
    fn id(&self) -> &str {
        ESTIMATION_RULE_ID
    }
    fn name(&self) -> &str {
        "Row estimation error"
    }

    fn applicable_to(&self, kind: OperatorKind) -> bool {
        kind.is_scan_or_selection()
    }

    fn evaluate(&self, context: &RuleContext) -> Option<Diagnostic> {
        if !context.needs_stats_check {
            return None;
        }

        let act_rows = context.act_rows()?;
        let est_rows = context.est_rows()?;

        // Zero on either side counts as one row
        let act = if act_rows == 0 { 1.0 } else { act_rows as f64 };
        let est = if est_rows == 0.0 { 1.0 } else { est_rows };
        let ratio = (act / est).max(est / act);

        if ratio <= context.thresholds.estimation_error_ratio {
            return None;
        }

        let target = context
            .table_name()
            .map(|t| format!("of {} ", t))
            .unwrap_or_default();
        Some(context.diagnostic(
            self,
            RuleSeverity::Warning,
            format!(
                "Estimated rows ({:.2}) and actual rows ({}) differ by {:.0}x. The statistics \
                 {}may be outdated; consider running ANALYZE TABLE.",
                est_rows,
                format_rows(act_rows),
                ratio,
                target
            ),
        ))
    }
}

/// S002: Selective filter over a huge full scan
/// Condition: Selection over a TiKV full scan filters more than 5,000,000
/// rows down to fewer than 10,000 using a single-column predicate.
pub struct S002MissingIndex;

impl DiagnosticRule for S002MissingIndex {
    fn id(&self) -> &str {
        "S002"
    }
    fn name(&self) -> &str {
        "Missing index"
    }

    fn applicable_to(&self, kind: OperatorKind) -> bool {
        kind == OperatorKind::Selection
    }

    fn evaluate(&self, context: &RuleContext) -> Option<Diagnostic> {
        let scan = context.node.sole_child()?;
        if !scan.operator_kind().is_full_scan() || scan.store_type() != StoreType::TiKV {
            return None;
        }

        let thresholds = context.thresholds;
        let selected = context.act_rows()?;
        let scanned = scan.act_rows?;
        if selected >= thresholds.missing_index_max_selection_rows
            || scanned <= thresholds.missing_index_min_scan_rows
        {
            return None;
        }

        let column = PredicateParser::single_column(context.operator_info())?;

        Some(context.diagnostic(
            self,
            RuleSeverity::Warning,
            format!(
                "{} keeps only {} of the {} rows read by {}. Consider adding an index on {}.",
                context.node.name,
                format_rows(selected),
                format_rows(scanned),
                scan.name,
                column
            ),
        ))
    }
}

/// S003: Huge full table scan on TiKV
/// Condition: TableFullScan on TiKV reading more than 1,000,000,000 rows
pub struct S003HugeTiKVScan;

impl DiagnosticRule for S003HugeTiKVScan {
    fn id(&self) -> &str {
        "S003"
    }
    fn name(&self) -> &str {
        "Huge TiKV full scan"
    }

    fn applicable_to(&self, kind: OperatorKind) -> bool {
        kind == OperatorKind::TableFullScan
    }

    fn evaluate(&self, context: &RuleContext) -> Option<Diagnostic> {
        if context.node.store_type() != StoreType::TiKV {
            return None;
        }

        let rows = context.act_rows()?;
        if rows <= context.thresholds.tiflash_suggest_rows {
            return None;
        }

        Some(context.diagnostic(
            self,
            RuleSeverity::Info,
            format!(
                "{} read {} rows from TiKV. Consider using TiFlash: a columnar replica serves \
                 large analytical scans much faster.",
                context.node.name,
                format_rows(rows)
            ),
        ))
    }
}

/// Estimation rule, evaluated right after the common rules
pub fn get_estimation_rules() -> Vec<Box<dyn DiagnosticRule>> {
    vec![Box::new(S001EstimationError)]
}

pub fn get_rules() -> Vec<Box<dyn DiagnosticRule>> {
    vec![Box::new(S002MissingIndex), Box::new(S003HugeTiKVScan)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::plan_analyzer::models::StoreType;

    fn scan(name: &str, rows: u64) -> PlanNode {
        PlanNode {
            store_type: Some(StoreType::TiKV),
            act_rows: Some(rows),
            ..PlanNode::named(name)
        }
    }

    fn selection(rows: u64, predicate: &str, child: PlanNode) -> PlanNode {
        PlanNode {
            act_rows: Some(rows),
            operator_info: Some(predicate.to_string()),
            children: vec![child],
            ..PlanNode::named("Selection_3")
        }
    }

    fn evaluate(rule: &dyn DiagnosticRule, node: &PlanNode, needs_stats_check: bool) -> Option<Diagnostic> {
        let thresholds = DiagnosticThresholds::default();
        let mut context = RuleContext::new(node, &thresholds);
        context.needs_stats_check = needs_stats_check;
        rule.evaluate(&context)
    }

    #[test]
    fn test_s001_estimation_error_both_directions() {
        let mut node = scan("TableFullScan_5", 1_000_000);
        node.est_rows = Some(10.0);
        assert!(evaluate(&S001EstimationError, &node, true).is_some());

        node.act_rows = Some(0);
        node.est_rows = Some(500.0);
        let diag = evaluate(&S001EstimationError, &node, true).unwrap();
        assert!(diag.message.contains("500x"));

        node.est_rows = Some(50.0);
        assert!(evaluate(&S001EstimationError, &node, true).is_none());
    }

    #[test]
    fn test_s001_requires_flag() {
        let mut node = scan("TableFullScan_5", 1_000_000);
        node.est_rows = Some(10.0);
        assert!(evaluate(&S001EstimationError, &node, false).is_none());
    }

    #[test]
    fn test_s002_missing_index_over_table_full_scan() {
        let node = selection(500, "eq(t.a,1)", scan("TableFullScan_5", 6_000_000));
        let diag = evaluate(&S002MissingIndex, &node, false).unwrap();
        assert!(diag.message.contains("Consider adding an index on t.a"));
    }

    #[test]
    fn test_s002_missing_index_over_index_full_scan() {
        let node = selection(10, "in(test.t.b, 1, 2)", scan("IndexFullScan_6", 7_000_000));
        assert!(evaluate(&S002MissingIndex, &node, false).is_some());
    }

    #[test]
    fn test_s002_not_triggered() {
        // too many rows kept
        let node = selection(20_000, "eq(t.a,1)", scan("TableFullScan_5", 6_000_000));
        assert!(evaluate(&S002MissingIndex, &node, false).is_none());
        // small scan
        let node = selection(500, "eq(t.a,1)", scan("TableFullScan_5", 5_000_000));
        assert!(evaluate(&S002MissingIndex, &node, false).is_none());
        // two columns
        let node = selection(500, "eq(t.a,1), eq(t.b,2)", scan("TableFullScan_5", 6_000_000));
        assert!(evaluate(&S002MissingIndex, &node, false).is_none());
        // range scan already uses an index
        let node = selection(500, "eq(t.a,1)", scan("TableRangeScan_5", 6_000_000));
        assert!(evaluate(&S002MissingIndex, &node, false).is_none());
        // TiFlash
        let mut child = scan("TableFullScan_5", 6_000_000);
        child.store_type = Some(StoreType::TiFlash);
        let node = selection(500, "eq(t.a,1)", child);
        assert!(evaluate(&S002MissingIndex, &node, false).is_none());
    }

    #[test]
    fn test_s003_huge_tikv_scan() {
        let node = scan("TableFullScan_5", 2_000_000_000);
        let diag = evaluate(&S003HugeTiKVScan, &node, false).unwrap();
        assert!(diag.message.contains("Consider using TiFlash"));
        assert_eq!(diag.severity, RuleSeverity::Info);

        let node = scan("TableFullScan_5", 1_000_000_000);
        assert!(evaluate(&S003HugeTiKVScan, &node, false).is_none());

        let mut node = scan("TableFullScan_5", 2_000_000_000);
        node.store_type = Some(StoreType::TiFlash);
        assert!(evaluate(&S003HugeTiKVScan, &node, false).is_none());
    }
}
