//! Duration reconciliation
//!
//! Reported operator times overlap whenever sub-tasks run concurrently, so
//! summing them overstates the elapsed time. Each node is attributed its own
//! time divided by the parallelism it runs under, and its duration is the
//! maximum of that and the durations of its children.

use super::concurrency::{ConcurrencyResolver, ConcurrencyState};
use super::operator::OperatorKind;
use crate::services::plan_analyzer::models::{
    DriverSide, ExecInfoMap, PlanForest, PlanNode, StoreType, TaskType, lookup_path,
};
use crate::services::plan_analyzer::parser::core::ValueParser;
use std::time::Duration;

pub struct DurationAnalyzer;

impl DurationAnalyzer {
    /// Annotate every tree of the forest, each with fresh state
    pub fn analyze_forest(forest: &mut PlanForest) {
        for tree in forest.trees_mut() {
            Self::analyze_node(tree, ConcurrencyState::new());
        }
    }

    /// Annotate a node and its subtree, returning the node's duration
    pub fn analyze_node(node: &mut PlanNode, state: ConcurrencyState) -> Duration {
        let kind = node.operator_kind();
        let own = Self::own_duration(node, state);
        let children = Self::analyze_children(node, kind, state);

        let duration = own.max(children);
        node.duration = Some(duration);
        duration
    }

    /// Annotate the children of a node, returning the longest child duration
    fn analyze_children(
        node: &mut PlanNode,
        kind: OperatorKind,
        incoming: ConcurrencyState,
    ) -> Duration {
        let state = ConcurrencyResolver::resolve(node, kind, incoming);

        match kind {
            OperatorKind::Apply => Self::analyze_apply_children(node, state),
            OperatorKind::IndexJoin | OperatorKind::IndexMergeJoin | OperatorKind::IndexHashJoin => {
                Self::analyze_sided_children(node, state.with_join(1), state)
            },
            OperatorKind::IndexLookUpReader | OperatorKind::IndexMergeReader => {
                Self::analyze_sided_children(node, state.with_table(1), state)
            },
            OperatorKind::ShuffleReceiver => {
                let state = state.with_shuffle(1);
                Self::analyze_sided_children(node, state, state)
            },
            OperatorKind::Shuffle
            | OperatorKind::IndexFullScan
            | OperatorKind::IndexRangeScan
            | OperatorKind::TableFullScan
            | OperatorKind::TableRangeScan
            | OperatorKind::TableRowIDScan
            | OperatorKind::Selection
            | OperatorKind::Default => Self::analyze_sided_children(node, state, state),
        }
    }

    fn analyze_sided_children(
        node: &mut PlanNode,
        build: ConcurrencyState,
        others: ConcurrencyState,
    ) -> Duration {
        node.children
            .iter_mut()
            .map(|child| {
                let state = if child.driver_side == Some(DriverSide::Build) { build } else { others };
                Self::analyze_node(child, state)
            })
            .max()
            .unwrap_or(Duration::ZERO)
    }

    /// Apply re-runs its probe side once per build row that misses the cache,
    /// so the probe side can never be more parallel than that
    fn analyze_apply_children(node: &mut PlanNode, state: ConcurrencyState) -> Duration {
        let cache_hit_ratio = Self::cache_hit_ratio(node);
        let mut longest = Duration::ZERO;
        let mut build_rows = None;

        for child in node.children.iter_mut() {
            if child.driver_side == Some(DriverSide::Build) {
                longest = longest.max(Self::analyze_node(child, state.with_apply(1)));
                build_rows = build_rows.or(child.act_rows);
            }
        }

        let probe_state = match (build_rows, cache_hit_ratio) {
            (Some(rows), Some(ratio)) => {
                let tasks = (rows as f64 * (1.0 - ratio)) as u64;
                state.with_apply(state.apply().min(tasks))
            },
            _ => state,
        };

        for child in node.children.iter_mut() {
            if child.driver_side != Some(DriverSide::Build) {
                longest = longest.max(Self::analyze_node(child, probe_state));
            }
        }
        longest
    }

    fn cache_hit_ratio(node: &PlanNode) -> Option<f64> {
        let text = node
            .group_exec_infos()
            .find_map(|info| lookup_path(info, &["cacheHitRatio"])?.as_text())?;

        match ValueParser::parse_ratio(text) {
            Ok(ratio) => Some(ratio),
            Err(e) => {
                tracing::debug!("Ignoring cache hit ratio of {}: {}", node.name, e);
                None
            },
        }
    }

    /// Time attributed to the node itself, before looking at its children
    fn own_duration(node: &PlanNode, state: ConcurrencyState) -> Duration {
        if let Some(text) = node.root_time_text() {
            let raw = parse_or_zero(node, text);
            return divide(raw, state.root_divisor());
        }

        let cop = node.cop_exec_info.as_ref().and_then(|info| info.as_structured());
        let Some(cop) = cop else {
            return Duration::ZERO;
        };

        match (node.task_type(), node.store_type()) {
            (TaskType::Cop, StoreType::TiKV) => Self::tikv_task_duration(node, cop, state),
            (TaskType::Cop, StoreType::TiFlash) | (TaskType::BatchCop, _) | (TaskType::Mpp, _) => {
                read_duration(node, cop, &["tiflash_task", "proc max"]).unwrap_or(Duration::ZERO)
            },
            _ => Duration::ZERO,
        }
    }

    fn tikv_task_duration(node: &PlanNode, cop: &ExecInfoMap, state: ConcurrencyState) -> Duration {
        let Some(avg) = read_duration(node, cop, &["tikv_task", "avg"]) else {
            return Duration::ZERO;
        };

        let tasks = lookup_path(cop, &["tikv_task", "tasks"])
            .and_then(|v| v.as_text())
            .and_then(|t| ValueParser::parse_number::<u64>(t).ok())
            .unwrap_or(0);
        let ratio = tasks as f64 / state.cop_divisor() as f64;

        let estimate = if ratio > 1.0 {
            multiply(avg, ratio)
        } else {
            divide(avg, state.root_divisor())
        };

        match read_duration(node, cop, &["tikv_task", "proc max"]) {
            Some(proc_max) => estimate.min(proc_max),
            None => estimate,
        }
    }
}

fn read_duration(node: &PlanNode, info: &ExecInfoMap, path: &[&str]) -> Option<Duration> {
    let text = lookup_path(info, path)?.as_text()?;
    match ValueParser::parse_duration(text) {
        Ok(duration) => Some(duration),
        Err(e) => {
            tracing::debug!("Ignoring {} of {}: {}", path.join("."), node.name, e);
            None
        },
    }
}

fn parse_or_zero(node: &PlanNode, text: &str) -> Duration {
    ValueParser::parse_duration(text).unwrap_or_else(|e| {
        tracing::debug!("Treating time of {} as zero: {}", node.name, e);
        Duration::ZERO
    })
}

fn divide(duration: Duration, divisor: u64) -> Duration {
    let nanos = duration.as_nanos() / u128::from(divisor.max(1));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn multiply(duration: Duration, factor: f64) -> Duration {
    Duration::try_from_secs_f64(duration.as_secs_f64() * factor).unwrap_or(Duration::MAX)
}
