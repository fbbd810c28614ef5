//! Reader operator diagnostic rules (R001)
//!
//! Rules for IndexLookUp readers.

use super::*;

const UNORDERED_SCAN_MARKER: &str = "keep order:false";

/// R001: Excessive index-side reads
/// Condition: IndexLookUp whose index side is Selection <- IndexFullScan
/// (unordered), with the Selection keeping more than 70% of the index rows.
/// Almost every index entry then costs an extra table lookup.
pub struct R001ExcessiveIndexReads;

impl DiagnosticRule for R001ExcessiveIndexReads {
    fn id(&self) -> &str {
        "R001"
    }
    fn name(&self) -> &str {
        "Excessive index-side reads"
    }

    fn applicable_to(&self, kind: OperatorKind) -> bool {
        kind == OperatorKind::IndexLookUpReader
    }

    fn evaluate(&self, context: &RuleContext) -> Option<Diagnostic> {
        let selection = context.node.build_child()?;
        if selection.operator_kind() != OperatorKind::Selection {
            return None;
        }

        let scan = selection.sole_child()?;
        if scan.operator_kind() != OperatorKind::IndexFullScan
            || !scan.operator_info().contains(UNORDERED_SCAN_MARKER)
        {
            return None;
        }

        let kept = selection.act_rows?;
        let scanned = scan.act_rows?;
        let selectivity = context.thresholds.index_read_selectivity;
        if kept as f64 <= scanned as f64 * selectivity {
            return None;
        }

        let percent = if scanned == 0 { 100.0 } else { kept as f64 * 100.0 / scanned as f64 };
        Some(context.diagnostic(
            self,
            RuleSeverity::Warning,
            format!(
                "{} reads the whole index through {} and keeps {:.1}% of its {} rows, then \
                 looks up each of them in the table. A TableFullScan or a more selective \
                 index is likely cheaper.",
                context.node.name,
                scan.name,
                percent,
                format_rows(scanned)
            ),
        ))
    }
}

pub fn get_rules() -> Vec<Box<dyn DiagnosticRule>> {
    vec![Box::new(R001ExcessiveIndexReads)]
}
