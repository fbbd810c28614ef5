//! Binary plan parser module
//!
//! Decodes encoded plans and normalizes their free-text fields.

pub mod core;
pub mod decoder;
pub mod error;
pub mod explain_data;
pub mod formatter;
pub mod predicate_parser;

// Re-export commonly used items
pub use decoder::{
    BinaryPlanDecoder, JsonPayloadDecoder, PlanPayloadDecoder, ProtobufPayloadDecoder,
};
pub use error::{ParseError, ParseResult};
pub use formatter::PlanFormatter;
pub use predicate_parser::PredicateParser;
