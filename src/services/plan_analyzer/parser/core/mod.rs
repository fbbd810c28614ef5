//! Core parsing components for binary plan analysis

pub mod exec_info_parser;
pub mod value_parser;

pub use exec_info_parser::ExecInfoParser;
pub use value_parser::ValueParser;
