//! Concurrency resolution
//!
//! Several operators run their sub-tasks in parallel, so the raw time a
//! descendant reports overlaps with its siblings. The analyzer carries the
//! accumulated parallelism down the tree in a [`ConcurrencyState`] and divides
//! reported times by it.

use super::operator::OperatorKind;
use crate::services::plan_analyzer::models::{ExecInfoMap, PlanNode, lookup_path};
use crate::services::plan_analyzer::parser::core::ValueParser;

/// Parallelism multipliers accumulated from the root down to a node
///
/// Every multiplier is at least 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConcurrencyState {
    join: u64,
    cop: u64,
    table: u64,
    apply: u64,
    shuffle: u64,
}

impl Default for ConcurrencyState {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrencyState {
    pub fn new() -> Self {
        Self { join: 1, cop: 1, table: 1, apply: 1, shuffle: 1 }
    }

    pub fn join(&self) -> u64 {
        self.join
    }

    pub fn cop(&self) -> u64 {
        self.cop
    }

    pub fn table(&self) -> u64 {
        self.table
    }

    pub fn apply(&self) -> u64 {
        self.apply
    }

    pub fn shuffle(&self) -> u64 {
        self.shuffle
    }

    // Scaling by zero means "no information" and leaves the multiplier alone.

    pub fn scale_join(&mut self, factor: u64) {
        self.join = scale(self.join, factor);
    }

    pub fn scale_cop(&mut self, factor: u64) {
        self.cop = scale(self.cop, factor);
    }

    pub fn scale_table(&mut self, factor: u64) {
        self.table = scale(self.table, factor);
    }

    pub fn scale_apply(&mut self, factor: u64) {
        self.apply = scale(self.apply, factor);
    }

    pub fn scale_shuffle(&mut self, factor: u64) {
        self.shuffle = scale(self.shuffle, factor);
    }

    pub fn with_join(self, join: u64) -> Self {
        Self { join: join.max(1), ..self }
    }

    pub fn with_table(self, table: u64) -> Self {
        Self { table: table.max(1), ..self }
    }

    pub fn with_apply(self, apply: u64) -> Self {
        Self { apply: apply.max(1), ..self }
    }

    pub fn with_shuffle(self, shuffle: u64) -> Self {
        Self { shuffle: shuffle.max(1), ..self }
    }

    /// Parallelism that overlaps root task time
    pub fn root_divisor(&self) -> u64 {
        self.join
            .saturating_mul(self.table)
            .saturating_mul(self.apply)
            .saturating_mul(self.shuffle)
    }

    /// Parallelism that overlaps coprocessor task time
    pub fn cop_divisor(&self) -> u64 {
        self.root_divisor().saturating_mul(self.cop)
    }
}

fn scale(current: u64, factor: u64) -> u64 {
    if factor == 0 { current } else { current.saturating_mul(factor) }
}

/// Merges the parallelism hints an operator reports into the incoming state
pub struct ConcurrencyResolver;

impl ConcurrencyResolver {
    /// Resolve the state a node hands to its children
    pub fn resolve(
        node: &PlanNode,
        kind: OperatorKind,
        incoming: ConcurrencyState,
    ) -> ConcurrencyState {
        let mut state = incoming;

        for info in node.group_exec_infos() {
            match kind {
                OperatorKind::IndexJoin | OperatorKind::IndexMergeJoin | OperatorKind::IndexHashJoin => {
                    let effective = min_positive([
                        read_count(node, info, &["inner", "concurrency"]),
                        read_count(node, info, &["inner", "task"]),
                    ]);
                    state.scale_join(effective);
                },
                OperatorKind::Apply => {
                    state.scale_apply(read_count(node, info, &["Concurrency"]).unwrap_or(0));
                },
                OperatorKind::IndexLookUpReader | OperatorKind::IndexMergeReader => {
                    let per_join_tasks = read_count(node, info, &["table_task", "num"])
                        .map(|num| num / state.join());
                    let effective = min_positive([
                        read_count(node, info, &["table_task", "concurrency"]),
                        per_join_tasks,
                    ]);
                    state.scale_table(effective);
                },
                OperatorKind::Shuffle => {
                    state.scale_shuffle(read_count(node, info, &["ShuffleConcurrency"]).unwrap_or(0));
                },
                _ => {},
            }

            state.scale_cop(read_count(node, info, &["cop_task", "distsql_concurrency"]).unwrap_or(0));
        }

        state
    }
}

/// Smallest positive value, 0 when there is none
fn min_positive<const N: usize>(values: [Option<u64>; N]) -> u64 {
    values
        .into_iter()
        .flatten()
        .filter(|v| *v > 0)
        .min()
        .unwrap_or(0)
}

fn read_count(node: &PlanNode, info: &ExecInfoMap, path: &[&str]) -> Option<u64> {
    let text = lookup_path(info, path)?.as_text()?;
    match ValueParser::parse_number::<u64>(text) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("Ignoring {} of {}: {}", path.join("."), node.name, e);
            None
        },
    }
}
