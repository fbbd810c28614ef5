//! Binary plan data models
//!
//! These models represent one decoded execution plan: a tree of operators with
//! their estimated and actual statistics. They are designed to round-trip
//! through JSON so that an annotated plan can be fed back into the analyzer.

use super::analyzer::OperatorKind;
use super::parser::core::ValueParser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::time::Duration;

/// Attributes the analyzer does not interpret, kept verbatim for the caller
pub type OtherAttributes = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Plan Structure
// ============================================================================

/// A decoded plan: the main operator tree plus independent CTE subplans
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanForest {
    pub main: PlanNode,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ctes: Vec<PlanNode>,
    #[serde(flatten)]
    pub other_attributes: OtherAttributes,
}

impl PlanForest {
    /// All trees of the forest, main tree first
    pub fn trees(&self) -> impl Iterator<Item = &PlanNode> {
        std::iter::once(&self.main).chain(self.ctes.iter())
    }

    pub fn trees_mut(&mut self) -> impl Iterator<Item = &mut PlanNode> {
        std::iter::once(&mut self.main).chain(self.ctes.iter_mut())
    }

    /// Total number of operators across all trees
    pub fn node_count(&self) -> usize {
        self.main.node_count() + self.ctes.iter().map(PlanNode::node_count).sum::<usize>()
    }
}

/// One execution plan operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanNode {
    pub name: String,

    #[serde(default, alias = "operator_info", skip_serializing_if = "Option::is_none")]
    pub operator_info: Option<String>,
    #[serde(default, alias = "task_type", skip_serializing_if = "Option::is_none")]
    pub task_type: Option<TaskType>,
    #[serde(default, alias = "store_type", skip_serializing_if = "Option::is_none")]
    pub store_type: Option<StoreType>,

    #[serde(default, alias = "est_rows", skip_serializing_if = "Option::is_none")]
    pub est_rows: Option<f64>,
    #[serde(default, alias = "act_rows", skip_serializing_if = "Option::is_none")]
    pub act_rows: Option<u64>,

    #[serde(default, alias = "disk_bytes", skip_serializing_if = "Option::is_none")]
    pub disk_bytes: Option<ByteCount>,
    #[serde(default, alias = "memory_bytes", skip_serializing_if = "Option::is_none")]
    pub memory_bytes: Option<ByteCount>,

    /// Root task runtime summary, e.g. `time:1.2ms, loops:2`
    #[serde(default, alias = "root_basic_exec_info", skip_serializing_if = "Option::is_none")]
    pub root_basic_exec_info: Option<ExecInfo>,
    /// One runtime summary per concurrent sub-task group
    #[serde(
        default,
        alias = "root_group_exec_info",
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub root_group_exec_info: Vec<ExecInfo>,
    /// Coprocessor task summary, e.g. `tikv_task:{proc max:2ms, avg: 1ms, tasks:4}`
    #[serde(default, alias = "cop_exec_info", skip_serializing_if = "Option::is_none")]
    pub cop_exec_info: Option<ExecInfo>,

    #[serde(default, alias = "driver_side", skip_serializing_if = "Option::is_none")]
    pub driver_side: Option<DriverSide>,

    #[serde(
        default,
        alias = "access_objects",
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub access_objects: Vec<AccessObject>,

    /// Reconciled elapsed time, written by the duration analyzer
    #[serde(default, with = "duration_text", skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
    /// Diagnostic messages, written by the rule engine
    #[serde(default, deserialize_with = "null_as_default")]
    pub diagnosis: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub children: Vec<PlanNode>,

    #[serde(flatten)]
    pub other_attributes: OtherAttributes,
}

impl PlanNode {
    /// Create an operator with only a name (used by builders and tests)
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Default::default() }
    }

    /// Classified operator kind
    pub fn operator_kind(&self) -> OperatorKind {
        OperatorKind::classify(&self.name)
    }

    pub fn task_type(&self) -> TaskType {
        self.task_type.unwrap_or(TaskType::Unknown)
    }

    pub fn store_type(&self) -> StoreType {
        self.store_type.unwrap_or(StoreType::Unknown)
    }

    pub fn operator_info(&self) -> &str {
        self.operator_info.as_deref().unwrap_or("")
    }

    /// Structured entries of the grouped execution info
    pub fn group_exec_infos(&self) -> impl Iterator<Item = &ExecInfoMap> {
        self.root_group_exec_info
            .iter()
            .filter_map(ExecInfo::as_structured)
    }

    /// Wall-clock time reported by the root executor, if any
    pub fn root_time_text(&self) -> Option<&str> {
        self.root_basic_exec_info
            .as_ref()
            .and_then(|info| info.lookup_text(&["time"]))
    }

    /// Children on the given driver side
    pub fn children_on_side(&self, side: DriverSide) -> impl Iterator<Item = &PlanNode> {
        self.children
            .iter()
            .filter(move |c| c.driver_side == Some(side))
    }

    /// The build-side child, if labelled
    pub fn build_child(&self) -> Option<&PlanNode> {
        self.children_on_side(DriverSide::Build).next()
    }

    /// The single child of this operator, None when it has zero or several
    pub fn sole_child(&self) -> Option<&PlanNode> {
        match self.children.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Databases referenced by scan access objects
    pub fn scan_databases(&self) -> impl Iterator<Item = &str> {
        self.access_objects
            .iter()
            .filter_map(|obj| obj.scan_object.as_ref())
            .filter_map(|scan| scan.database.as_deref())
    }

    pub fn node_count(&self) -> usize {
        1 + self.children.iter().map(PlanNode::node_count).sum::<usize>()
    }
}

/// Which input of a two-input operator this node feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverSide {
    Build,
    Probe,
}

/// Where an operator executes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskType {
    Root,
    Cop,
    BatchCop,
    Mpp,
    #[default]
    Unknown,
}

impl TaskType {
    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "root" => Self::Root,
            "cop" => Self::Cop,
            "batchcop" => Self::BatchCop,
            "mpp" => Self::Mpp,
            _ => Self::Unknown,
        }
    }

    pub(crate) fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Root,
            2 => Self::Cop,
            3 => Self::BatchCop,
            4 => Self::Mpp,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Cop => "cop",
            Self::BatchCop => "batchCop",
            Self::Mpp => "mpp",
            Self::Unknown => "unknown",
        }
    }
}

/// Storage engine an operator reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreType {
    TiDB,
    TiKV,
    TiFlash,
    #[default]
    Unknown,
}

impl StoreType {
    fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "tidb" => Self::TiDB,
            "tikv" => Self::TiKV,
            "tiflash" => Self::TiFlash,
            _ => Self::Unknown,
        }
    }

    pub(crate) fn from_code(code: i64) -> Self {
        match code {
            1 => Self::TiDB,
            2 => Self::TiKV,
            3 => Self::TiFlash,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TiDB => "tidb",
            Self::TiKV => "tikv",
            Self::TiFlash => "tiflash",
            Self::Unknown => "unknown",
        }
    }
}

/// Enum fields arrive either as protobuf codes or as names
#[derive(Deserialize)]
#[serde(untagged)]
enum CodeOrName {
    Code(i64),
    Name(String),
}

impl Serialize for TaskType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match CodeOrName::deserialize(deserializer)? {
            CodeOrName::Code(code) => Self::from_code(code),
            CodeOrName::Name(name) => Self::from_name(&name),
        })
    }
}

impl Serialize for StoreType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for StoreType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match CodeOrName::deserialize(deserializer)? {
            CodeOrName::Code(code) => Self::from_code(code),
            CodeOrName::Name(name) => Self::from_name(&name),
        })
    }
}

/// Disk or memory footprint; `-1` from the producer means "not applicable"
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteCount {
    Bytes(i64),
    NotApplicable,
}

impl ByteCount {
    pub const NOT_APPLICABLE: &'static str = "N/A";
    const SENTINEL: i64 = -1;

    /// Replace the `-1` sentinel with `NotApplicable`
    pub fn normalized(self) -> Self {
        match self {
            Self::Bytes(Self::SENTINEL) => Self::NotApplicable,
            other => other,
        }
    }

    pub fn is_applicable(&self) -> bool {
        !matches!(self, Self::NotApplicable)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ByteCountRepr {
    Number(i64),
    Text(String),
}

impl Serialize for ByteCount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bytes(n) => serializer.serialize_i64(*n),
            Self::NotApplicable => serializer.serialize_str(Self::NOT_APPLICABLE),
        }
    }
}

impl<'de> Deserialize<'de> for ByteCount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match ByteCountRepr::deserialize(deserializer)? {
            ByteCountRepr::Number(n) => Ok(Self::Bytes(n)),
            ByteCountRepr::Text(text) if text.trim() == Self::NOT_APPLICABLE => {
                Ok(Self::NotApplicable)
            },
            ByteCountRepr::Text(text) => text
                .trim()
                .parse::<i64>()
                .map(Self::Bytes)
                .map_err(|_| serde::de::Error::custom(format!("invalid byte count '{}'", text))),
        }
    }
}

/// Object touched by an operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessObject {
    #[serde(default, alias = "scan_object", skip_serializing_if = "Option::is_none")]
    pub scan_object: Option<ScanAccessObject>,
    #[serde(flatten)]
    pub other_attributes: OtherAttributes,
}

/// Table scanned by an operator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanAccessObject {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    #[serde(flatten)]
    pub other_attributes: OtherAttributes,
}

// ============================================================================
// Execution Info
// ============================================================================

/// Structured execution summary, keys in sorted order
pub type ExecInfoMap = BTreeMap<String, ExecInfoValue>;

/// A value inside an execution summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecInfoValue {
    Text(String),
    Group(ExecInfoMap),
}

impl ExecInfoValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Group(_) => None,
        }
    }

    pub fn as_group(&self) -> Option<&ExecInfoMap> {
        match self {
            Self::Group(group) => Some(group),
            Self::Text(_) => None,
        }
    }
}

/// An execution summary field: raw producer text until the formatter
/// converts it into structured key/value pairs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExecInfo {
    Structured(ExecInfoMap),
    Raw(String),
}

impl ExecInfo {
    pub fn as_structured(&self) -> Option<&ExecInfoMap> {
        match self {
            Self::Structured(map) => Some(map),
            Self::Raw(_) => None,
        }
    }

    /// Follow a key path through nested groups, keys matched case-insensitively
    pub fn lookup(&self, path: &[&str]) -> Option<&ExecInfoValue> {
        lookup_path(self.as_structured()?, path)
    }

    pub fn lookup_text(&self, path: &[&str]) -> Option<&str> {
        self.lookup(path).and_then(ExecInfoValue::as_text)
    }
}

/// Follow a key path through nested groups of a structured summary
pub fn lookup_path<'a>(map: &'a ExecInfoMap, path: &[&str]) -> Option<&'a ExecInfoValue> {
    let (first, rest) = path.split_first()?;
    let value = find_key(map, first)?;
    if rest.is_empty() {
        Some(value)
    } else {
        lookup_path(value.as_group()?, rest)
    }
}

fn find_key<'a>(map: &'a ExecInfoMap, key: &str) -> Option<&'a ExecInfoValue> {
    map.get(key).or_else(|| {
        map.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

// ============================================================================
// Serde helpers
// ============================================================================

/// Producers serialize empty repeated fields as `null`
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Durations are exchanged as text like `12.3ms`
mod duration_text {
    use super::ValueParser;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_str(&ValueParser::format_duration(*duration)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        let text = Option::<String>::deserialize(deserializer)?;
        Ok(text.and_then(|t| ValueParser::parse_duration(&t).ok()))
    }
}
