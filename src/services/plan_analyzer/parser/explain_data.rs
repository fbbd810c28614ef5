//! Protobuf messages of an encoded TiDB plan
//!
//! Only the fields the analyzer reads are declared; unknown fields are
//! skipped by the decoder.

use crate::services::plan_analyzer::models::{
    AccessObject, ByteCount, ExecInfo, OtherAttributes, PlanForest, PlanNode, ScanAccessObject,
    StoreType, TaskType,
};
use serde_json::Value;

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExplainData {
    #[prost(message, optional, tag = "1")]
    pub main: ::core::option::Option<ExplainOperator>,
    #[prost(message, repeated, tag = "2")]
    pub ctes: ::prost::alloc::vec::Vec<ExplainOperator>,
    #[prost(bool, optional, tag = "3")]
    pub with_runtime_stats: ::core::option::Option<bool>,
    #[prost(bool, optional, tag = "4")]
    pub discarded_due_to_too_long: ::core::option::Option<bool>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExplainOperator {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "2")]
    pub children: ::prost::alloc::vec::Vec<ExplainOperator>,
    #[prost(enumeration = "OperatorLabel", repeated, tag = "3")]
    pub labels: ::prost::alloc::vec::Vec<i32>,
    #[prost(double, optional, tag = "4")]
    pub cost: ::core::option::Option<f64>,
    #[prost(double, optional, tag = "5")]
    pub est_rows: ::core::option::Option<f64>,
    #[prost(uint64, optional, tag = "6")]
    pub act_rows: ::core::option::Option<u64>,
    #[prost(int32, optional, tag = "7")]
    pub task_type: ::core::option::Option<i32>,
    #[prost(int32, optional, tag = "8")]
    pub store_type: ::core::option::Option<i32>,
    #[prost(message, repeated, tag = "9")]
    pub access_objects: ::prost::alloc::vec::Vec<ExplainAccessObject>,
    #[prost(string, optional, tag = "10")]
    pub operator_info: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "13")]
    pub root_basic_exec_info: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, repeated, tag = "14")]
    pub root_group_exec_info: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "15")]
    pub cop_exec_info: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(int64, optional, tag = "16")]
    pub memory_bytes: ::core::option::Option<i64>,
    #[prost(int64, optional, tag = "17")]
    pub disk_bytes: ::core::option::Option<i64>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExplainAccessObject {
    #[prost(message, optional, tag = "1")]
    pub scan_object: ::core::option::Option<ExplainScanObject>,
    #[prost(string, optional, tag = "3")]
    pub other_object: ::core::option::Option<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExplainScanObject {
    #[prost(string, optional, tag = "1")]
    pub database: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(string, optional, tag = "2")]
    pub table: ::core::option::Option<::prost::alloc::string::String>,
    #[prost(message, repeated, tag = "3")]
    pub indexes: ::prost::alloc::vec::Vec<ExplainIndexAccess>,
    #[prost(string, repeated, tag = "4")]
    pub partitions: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct ExplainIndexAccess {
    #[prost(string, tag = "1")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, repeated, tag = "2")]
    pub cols: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    #[prost(bool, optional, tag = "3")]
    pub is_clustered_index: ::core::option::Option<bool>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum OperatorLabel {
    Empty = 0,
    BuildSide = 1,
    ProbeSide = 2,
    SeedPart = 3,
    RecursivePart = 4,
}

impl OperatorLabel {
    /// Name used in the JSON rendering of the plan
    pub fn json_name(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::BuildSide => "buildSide",
            Self::ProbeSide => "probeSide",
            Self::SeedPart => "seedPart",
            Self::RecursivePart => "recursivePart",
        }
    }
}

impl From<ExplainData> for PlanForest {
    fn from(data: ExplainData) -> Self {
        let mut other_attributes = OtherAttributes::new();
        if let Some(with_runtime_stats) = data.with_runtime_stats {
            other_attributes.insert("withRuntimeStats".to_string(), Value::Bool(with_runtime_stats));
        }
        if let Some(discarded) = data.discarded_due_to_too_long {
            other_attributes.insert("discardedDueToTooLong".to_string(), Value::Bool(discarded));
        }

        PlanForest {
            main: data.main.map(PlanNode::from).unwrap_or_default(),
            ctes: data.ctes.into_iter().map(PlanNode::from).collect(),
            other_attributes,
        }
    }
}

impl From<ExplainOperator> for PlanNode {
    fn from(op: ExplainOperator) -> Self {
        let mut other_attributes = OtherAttributes::new();

        // Labels stay as names; the formatter derives the driver side from them
        let labels: Vec<Value> = op
            .labels
            .iter()
            .filter_map(|code| OperatorLabel::try_from(*code).ok())
            .filter(|label| *label != OperatorLabel::Empty)
            .map(|label| Value::String(label.json_name().to_string()))
            .collect();
        if !labels.is_empty() {
            other_attributes.insert("labels".to_string(), Value::Array(labels));
        }
        if let Some(cost) = op.cost.and_then(serde_json::Number::from_f64) {
            other_attributes.insert("cost".to_string(), Value::Number(cost));
        }

        PlanNode {
            name: op.name,
            operator_info: op.operator_info,
            task_type: op.task_type.map(|code| TaskType::from_code(code.into())),
            store_type: op.store_type.map(|code| StoreType::from_code(code.into())),
            est_rows: op.est_rows,
            act_rows: op.act_rows,
            disk_bytes: op.disk_bytes.map(ByteCount::Bytes),
            memory_bytes: op.memory_bytes.map(ByteCount::Bytes),
            root_basic_exec_info: op.root_basic_exec_info.map(ExecInfo::Raw),
            root_group_exec_info: op.root_group_exec_info.into_iter().map(ExecInfo::Raw).collect(),
            cop_exec_info: op.cop_exec_info.map(ExecInfo::Raw),
            access_objects: op.access_objects.into_iter().map(AccessObject::from).collect(),
            children: op.children.into_iter().map(PlanNode::from).collect(),
            other_attributes,
            ..Default::default()
        }
    }
}

impl From<ExplainAccessObject> for AccessObject {
    fn from(obj: ExplainAccessObject) -> Self {
        let mut other_attributes = OtherAttributes::new();
        if let Some(other) = obj.other_object {
            other_attributes.insert("otherObject".to_string(), Value::String(other));
        }

        AccessObject { scan_object: obj.scan_object.map(ScanAccessObject::from), other_attributes }
    }
}

impl From<ExplainScanObject> for ScanAccessObject {
    fn from(scan: ExplainScanObject) -> Self {
        let mut other_attributes = OtherAttributes::new();
        if !scan.indexes.is_empty() {
            let indexes = scan
                .indexes
                .into_iter()
                .map(|index| {
                    serde_json::json!({
                        "name": index.name,
                        "cols": index.cols,
                        "isClusteredIndex": index.is_clustered_index.unwrap_or(false),
                    })
                })
                .collect();
            other_attributes.insert("indexes".to_string(), Value::Array(indexes));
        }
        if !scan.partitions.is_empty() {
            other_attributes.insert(
                "partitions".to_string(),
                Value::Array(scan.partitions.into_iter().map(Value::String).collect()),
            );
        }

        ScanAccessObject { database: scan.database, table: scan.table, other_attributes }
    }
}
