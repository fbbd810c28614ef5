//! Binary plan decoder
//!
//! A binary plan travels as standard base64 text wrapping a snappy (raw block
//! format) compressed payload. The payload is handed to a
//! [`PlanPayloadDecoder`]: protobuf `ExplainData` by default, or the JSON
//! rendering of the same message.

use crate::services::plan_analyzer::models::PlanForest;
use crate::services::plan_analyzer::parser::error::{ParseError, ParseResult};
use crate::services::plan_analyzer::parser::explain_data::ExplainData;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use prost::Message;

/// Turns a decompressed payload into a plan forest
pub trait PlanPayloadDecoder: Send + Sync {
    fn decode(&self, payload: &[u8]) -> ParseResult<PlanForest>;

    /// Short name used in logs
    fn name(&self) -> &'static str;
}

/// Payload decoder for the protobuf `ExplainData` message written by TiDB
#[derive(Debug, Clone, Copy, Default)]
pub struct ProtobufPayloadDecoder;

impl PlanPayloadDecoder for ProtobufPayloadDecoder {
    fn decode(&self, payload: &[u8]) -> ParseResult<PlanForest> {
        let data = ExplainData::decode(payload)?;
        if data.main.is_none() {
            return Err(ParseError::PayloadError("plan has no main operator".to_string()));
        }
        Ok(PlanForest::from(data))
    }

    fn name(&self) -> &'static str {
        "protobuf"
    }
}

/// Payload decoder for the JSON rendering of the plan message
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonPayloadDecoder;

impl PlanPayloadDecoder for JsonPayloadDecoder {
    fn decode(&self, payload: &[u8]) -> ParseResult<PlanForest> {
        serde_json::from_slice(payload).map_err(|e| ParseError::PayloadError(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "json"
    }
}

/// Decoder for base64 + snappy encoded plans
pub struct BinaryPlanDecoder {
    payload_decoder: Box<dyn PlanPayloadDecoder>,
}

impl Default for BinaryPlanDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl BinaryPlanDecoder {
    pub fn new() -> Self {
        Self::with_payload_decoder(Box::new(ProtobufPayloadDecoder))
    }

    pub fn with_payload_decoder(payload_decoder: Box<dyn PlanPayloadDecoder>) -> Self {
        Self { payload_decoder }
    }

    /// Decode an encoded plan; empty input yields `None`
    pub fn decode(&self, encoded: &str) -> ParseResult<Option<PlanForest>> {
        let encoded = encoded.trim();
        if encoded.is_empty() {
            return Ok(None);
        }

        let payload = Self::decompress(encoded)?;
        tracing::debug!(
            "Decoding {} byte plan payload with {} decoder",
            payload.len(),
            self.payload_decoder.name()
        );

        self.payload_decoder.decode(&payload).map(Some)
    }

    /// Undo the base64 and snappy layers
    pub fn decompress(encoded: &str) -> ParseResult<Vec<u8>> {
        let compressed = STANDARD.decode(encoded.trim())?;
        let payload = snap::raw::Decoder::new().decompress_vec(&compressed)?;
        Ok(payload)
    }
}

/// Wrap a payload the way TiDB wraps its plans
#[cfg(test)]
pub(crate) fn encode_blob(payload: &[u8]) -> String {
    let compressed = snap::raw::Encoder::new().compress_vec(payload).unwrap();
    STANDARD.encode(compressed)
}

/// Encoded `Show_2` plan as written to the slow log by TiDB
#[cfg(test)]
pub(crate) const SHOW_PLAN_BLOB: &str = "SiwKRgoGU2hvd18yKQAFAYjwPzAFOAFAAWoVdGltZTozNC44wrVzLCBsb29wczoygAH//w0COAGIAf///////////wEYAQ==";

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::plan_analyzer::models::{ByteCount, ExecInfo, PlanNode, StoreType, TaskType};
    use crate::services::plan_analyzer::parser::explain_data::{ExplainOperator, OperatorLabel};

    const PLAN_JSON: &str = r#"{"main":{"name":"Show_2","actRows":5,"rootBasicExecInfo":"time:34.8µs, loops:2"},"ctes":null,"withRuntimeStats":true}"#;

    #[test]
    fn test_empty_input_yields_none() {
        let decoder = BinaryPlanDecoder::new();
        assert!(decoder.decode("").unwrap().is_none());
        assert!(decoder.decode("  \n").unwrap().is_none());
    }

    #[test]
    fn test_decode_tidb_plan() {
        let forest = BinaryPlanDecoder::new().decode(SHOW_PLAN_BLOB).unwrap().unwrap();

        let main = &forest.main;
        assert_eq!(main.name, "Show_2");
        assert_eq!(main.est_rows, Some(1.0));
        assert_eq!(main.act_rows, Some(5));
        assert_eq!(main.task_type(), TaskType::Root);
        assert_eq!(main.store_type(), StoreType::TiDB);
        assert_eq!(
            main.root_basic_exec_info,
            Some(ExecInfo::Raw("time:34.8µs, loops:2".to_string()))
        );
        assert_eq!(main.memory_bytes, Some(ByteCount::Bytes(-1)));
        assert_eq!(main.disk_bytes, Some(ByteCount::Bytes(-1)));
        assert!(main.children.is_empty());
        assert!(forest.ctes.is_empty());
        assert_eq!(forest.other_attributes["withRuntimeStats"], true);
    }

    #[test]
    fn test_protobuf_round_trip_with_ctes() {
        let data = ExplainData {
            main: Some(ExplainOperator {
                name: "HashJoin_8".to_string(),
                children: vec![ExplainOperator {
                    name: "TableReader_10".to_string(),
                    labels: vec![OperatorLabel::BuildSide as i32],
                    ..Default::default()
                }],
                ..Default::default()
            }),
            ctes: vec![ExplainOperator { name: "CTE_0".to_string(), ..Default::default() }],
            with_runtime_stats: Some(true),
            discarded_due_to_too_long: None,
        };

        let blob = encode_blob(&data.encode_to_vec());
        let forest = BinaryPlanDecoder::new().decode(&blob).unwrap().unwrap();
        assert_eq!(forest.main.children[0].other_attributes["labels"][0], "buildSide");
        assert_eq!(forest.ctes[0].name, "CTE_0");
    }

    #[test]
    fn test_json_payload_decoder() {
        let decoder = BinaryPlanDecoder::with_payload_decoder(Box::new(JsonPayloadDecoder));
        let forest = decoder.decode(&encode_blob(PLAN_JSON.as_bytes())).unwrap().unwrap();
        assert_eq!(forest.main.name, "Show_2");
        assert_eq!(forest.main.act_rows, Some(5));
        assert!(forest.ctes.is_empty());
        assert_eq!(forest.other_attributes["withRuntimeStats"], true);

        let err = decoder.decode(&encode_blob(b"{\"main\": 42}")).unwrap_err();
        assert!(matches!(err, ParseError::PayloadError(_)));
    }

    #[test]
    fn test_invalid_base64() {
        let err = BinaryPlanDecoder::new().decode("not base64!").unwrap_err();
        assert!(matches!(err, ParseError::Base64Error(_)));
    }

    #[test]
    fn test_invalid_snappy() {
        let err = BinaryPlanDecoder::new().decode("//////////8=").unwrap_err();
        assert!(matches!(err, ParseError::SnappyError(_)));
    }

    #[test]
    fn test_invalid_protobuf() {
        // JSON text is not a valid protobuf message
        let err = BinaryPlanDecoder::new()
            .decode(&encode_blob(PLAN_JSON.as_bytes()))
            .unwrap_err();
        assert!(matches!(err, ParseError::ProtobufError(_) | ParseError::PayloadError(_)));

        let err = BinaryPlanDecoder::new()
            .decode(&encode_blob(&ExplainData::default().encode_to_vec()))
            .unwrap_err();
        assert!(matches!(err, ParseError::PayloadError(_)));
    }

    struct FixedDecoder;

    impl PlanPayloadDecoder for FixedDecoder {
        fn decode(&self, payload: &[u8]) -> ParseResult<PlanForest> {
            let name = String::from_utf8_lossy(payload).to_string();
            Ok(PlanForest {
                main: PlanNode::named(name),
                ctes: Vec::new(),
                other_attributes: Default::default(),
            })
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    #[test]
    fn test_custom_payload_decoder() {
        let decoder = BinaryPlanDecoder::with_payload_decoder(Box::new(FixedDecoder));
        let forest = decoder.decode(&encode_blob(b"Point_Get_1")).unwrap().unwrap();
        assert_eq!(forest.main.name, "Point_Get_1");
    }
}
