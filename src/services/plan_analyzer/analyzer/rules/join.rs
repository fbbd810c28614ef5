//! Join operator diagnostic rules (J001)
//!
//! Rules for IndexJoin, IndexHashJoin and IndexMergeJoin operators.

use super::*;
use crate::services::plan_analyzer::models::lookup_path;
use crate::services::plan_analyzer::parser::core::ValueParser;

/// J001: Index join issues too many inner lookups
/// Condition: any grouped entry reports `inner.task` above 10000
pub struct J001LargeIndexJoinBuild;

impl DiagnosticRule for J001LargeIndexJoinBuild {
    fn id(&self) -> &str {
        "J001"
    }
    fn name(&self) -> &str {
        "Large index join build side"
    }

    fn applicable_to(&self, kind: OperatorKind) -> bool {
        kind.is_index_join()
    }

    fn evaluate(&self, context: &RuleContext) -> Option<Diagnostic> {
        let tasks = context
            .node
            .group_exec_infos()
            .filter_map(|info| lookup_path(info, &["inner", "task"])?.as_text())
            .filter_map(|text| ValueParser::parse_number::<u64>(text).ok())
            .max()?;

        if tasks <= context.thresholds.index_join_max_build_tasks {
            return None;
        }

        Some(context.diagnostic(
            self,
            RuleSeverity::Warning,
            format!(
                "{} sent {} lookup tasks to its inner side; the build side is too large for an \
                 index join. Consider a hash join instead (HASH_JOIN hint).",
                context.node.name,
                format_rows(tasks)
            ),
        ))
    }
}

pub fn get_rules() -> Vec<Box<dyn DiagnosticRule>> {
    vec![Box::new(J001LargeIndexJoinBuild)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::plan_analyzer::models::ExecInfo;
    use crate::services::plan_analyzer::parser::PlanFormatter;

    fn join(name: &str, groups: &[&str]) -> PlanNode {
        let mut node = PlanNode {
            root_group_exec_info: groups.iter().map(|g| ExecInfo::Raw(g.to_string())).collect(),
            ..PlanNode::named(name)
        };
        PlanFormatter::format_node(&mut node).unwrap();
        node
    }

    fn evaluate(node: &PlanNode) -> Option<Diagnostic> {
        let thresholds = DiagnosticThresholds::default();
        J001LargeIndexJoinBuild.evaluate(&RuleContext::new(node, &thresholds))
    }

    #[test]
    fn test_j001_large_build() {
        let node = join(
            "IndexHashJoin_12",
            &["inner:{total:2s, concurrency:5, task:3}", "inner:{total:9s, concurrency:5, task:12000}"],
        );
        let diag = evaluate(&node).unwrap();
        assert!(diag.message.contains("12,000"));
        assert!(diag.message.contains("hash join"));
    }

    #[test]
    fn test_j001_small_build() {
        assert!(evaluate(&join("IndexJoin_9", &["inner:{concurrency:5, task:10000}"])).is_none());
        assert!(evaluate(&join("IndexJoin_9", &["inner:{concurrency:5}"])).is_none());
    }

    #[test]
    fn test_j001_applicability() {
        assert!(J001LargeIndexJoinBuild.applicable_to(OperatorKind::IndexMergeJoin));
        assert!(!J001LargeIndexJoinBuild.applicable_to(OperatorKind::Default));
    }
}
