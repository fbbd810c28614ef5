//! Common diagnostic rules (G001-G002)
//!
//! These rules apply to all operator types.

use super::*;
use crate::services::plan_analyzer::models::ByteCount;

const PSEUDO_STATS_MARKER: &str = "stats:pseudo";

/// G001: Statistics unavailable or outdated
/// The optimizer fell back to pseudo statistics for a user table.
pub struct G001PseudoStats;

impl DiagnosticRule for G001PseudoStats {
    fn id(&self) -> &str {
        "G001"
    }
    fn name(&self) -> &str {
        "Pseudo statistics"
    }

    fn applicable_to(&self, _kind: OperatorKind) -> bool {
        true // Applies to all nodes
    }

    fn evaluate(&self, context: &RuleContext) -> Option<Diagnostic> {
        if !context.operator_info().contains(PSEUDO_STATS_MARKER) {
            return None;
        }

        // System schemas never have statistics; nothing to fix there
        if context
            .node
            .scan_databases()
            .any(|db| context.thresholds.is_system_schema(db))
        {
            return None;
        }

        let target = context
            .table_name()
            .map(|t| format!("table {}", t))
            .unwrap_or_else(|| "the scanned table".to_string());
        Some(context.diagnostic(
            self,
            RuleSeverity::Warning,
            format!(
                "Statistics of {} are unavailable or outdated (stats:pseudo), so row estimates \
                 may be far off and the chosen plan suboptimal. Run ANALYZE TABLE to refresh \
                 the statistics.",
                target
            ),
        ))
    }
}

/// G002: Operator spilled to disk
pub struct G002DiskSpill;

impl DiagnosticRule for G002DiskSpill {
    fn id(&self) -> &str {
        "G002"
    }
    fn name(&self) -> &str {
        "Disk spill"
    }

    fn applicable_to(&self, _kind: OperatorKind) -> bool {
        true
    }

    fn evaluate(&self, context: &RuleContext) -> Option<Diagnostic> {
        let spilled = match context.node.disk_bytes? {
            ByteCount::Bytes(bytes) => bytes,
            ByteCount::NotApplicable => return None,
        };

        Some(context.diagnostic(
            self,
            RuleSeverity::Warning,
            format!(
                "{} spilled {} bytes to disk, which slows it down. Consider raising \
                 tidb_mem_quota_query or reducing the data the operator has to hold in memory.",
                context.node.name,
                format_rows(u64::try_from(spilled).unwrap_or(0))
            ),
        ))
    }
}

pub fn get_rules() -> Vec<Box<dyn DiagnosticRule>> {
    vec![Box::new(G001PseudoStats), Box::new(G002DiskSpill)]
}
