//! Operator classification
//!
//! Plan operators are identified by display names such as `IndexHashJoin_12`
//! or `TableFullScan_5`. Only the kinds that change how time or diagnostics
//! are attributed get their own variant.

/// Operator kinds recognized by the analyzers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    IndexJoin,
    IndexMergeJoin,
    IndexHashJoin,
    Apply,
    Shuffle,
    ShuffleReceiver,
    IndexLookUpReader,
    IndexMergeReader,
    IndexFullScan,
    IndexRangeScan,
    TableFullScan,
    TableRangeScan,
    TableRowIDScan,
    Selection,
    Default,
}

/// Prefix table, longer prefixes sharing a stem listed first
const PREFIXES: [(&str, OperatorKind); 14] = [
    ("IndexMergeJoin", OperatorKind::IndexMergeJoin),
    ("IndexHashJoin", OperatorKind::IndexHashJoin),
    ("IndexJoin", OperatorKind::IndexJoin),
    ("Apply", OperatorKind::Apply),
    ("ShuffleReceiver", OperatorKind::ShuffleReceiver),
    ("Shuffle", OperatorKind::Shuffle),
    ("IndexLookUp", OperatorKind::IndexLookUpReader),
    ("IndexMerge", OperatorKind::IndexMergeReader),
    ("IndexFullScan", OperatorKind::IndexFullScan),
    ("IndexRangeScan", OperatorKind::IndexRangeScan),
    ("TableFullScan", OperatorKind::TableFullScan),
    ("TableRangeScan", OperatorKind::TableRangeScan),
    ("TableRowIDScan", OperatorKind::TableRowIDScan),
    ("Selection", OperatorKind::Selection),
];

impl OperatorKind {
    /// Classify an operator by its display name (case-sensitive prefix)
    pub fn classify(name: &str) -> Self {
        PREFIXES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, kind)| *kind)
            .unwrap_or(OperatorKind::Default)
    }

    pub fn is_index_join(&self) -> bool {
        matches!(self, Self::IndexJoin | Self::IndexMergeJoin | Self::IndexHashJoin)
    }

    pub fn is_index_reader(&self) -> bool {
        matches!(self, Self::IndexLookUpReader | Self::IndexMergeReader)
    }

    pub fn is_scan(&self) -> bool {
        matches!(
            self,
            Self::IndexFullScan
                | Self::IndexRangeScan
                | Self::TableFullScan
                | Self::TableRangeScan
                | Self::TableRowIDScan
        )
    }

    pub fn is_full_scan(&self) -> bool {
        matches!(self, Self::IndexFullScan | Self::TableFullScan)
    }

    pub fn is_scan_or_selection(&self) -> bool {
        self.is_scan() || *self == Self::Selection
    }
}
