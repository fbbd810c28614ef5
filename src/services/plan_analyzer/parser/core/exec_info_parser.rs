//! Execution info parser
//!
//! Runtime summaries arrive as loosely structured text:
//!
//! ```text
//! time:1.2ms, loops:2, inner:{total:1ms, concurrency:5, task:3}, probe:{...}
//! ```
//!
//! Entries are `key:value` pairs separated by `,` or `;`. A value is either a
//! braced group of further entries or a scalar that runs up to the next
//! separator at the same depth. The `:` may be left out before a group, as in
//! `backoff{regionMiss: 2ms}`. Scalars may contain `:` (e.g. `proc max:2ms`
//! inside a group, or timestamps) but never `{`.

use crate::services::plan_analyzer::models::{ExecInfoMap, ExecInfoValue};
use crate::services::plan_analyzer::parser::error::{ParseError, ParseResult};

/// Parser for the execution info micro-format
pub struct ExecInfoParser;

impl ExecInfoParser {
    /// Parse a summary string into structured entries
    ///
    /// Fails on unbalanced braces, entries without `:`, or empty input.
    pub fn parse(input: &str) -> ParseResult<ExecInfoMap> {
        let mut cursor = Cursor { src: input, pos: 0 };
        let map = cursor.parse_entries(false)?;

        if map.is_empty() {
            return Err(ParseError::exec_info(input, "no entries"));
        }
        Ok(map)
    }
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<u8> {
        self.src.as_bytes().get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek()
            && c.is_ascii_whitespace()
        {
            self.pos += 1;
        }
    }

    fn error(&self, reason: impl Into<String>) -> ParseError {
        ParseError::exec_info(self.src, format!("{} at offset {}", reason.into(), self.pos))
    }

    /// Parse entries until end of input, or until the closing `}` when nested
    fn parse_entries(&mut self, nested: bool) -> ParseResult<ExecInfoMap> {
        let mut map = ExecInfoMap::new();

        loop {
            self.skip_whitespace();
            match self.peek() {
                None if nested => return Err(self.error("unterminated group")),
                None => break,
                Some(b'}') if nested => {
                    self.pos += 1;
                    break;
                },
                _ => {},
            }

            let key = self.parse_key()?;
            let value = self.parse_value()?;
            map.insert(key, value);

            self.skip_whitespace();
            match self.peek() {
                Some(b',' | b';') => self.pos += 1,
                Some(b'}') if nested => {
                    self.pos += 1;
                    break;
                },
                None if nested => return Err(self.error("unterminated group")),
                None => break,
                Some(c) => return Err(self.error(format!("unexpected '{}'", c as char))),
            }
        }

        Ok(map)
    }

    /// Read a key up to its `:`, or up to a `{` opening a group directly
    /// (`backoff{regionMiss: 2ms}`)
    fn parse_key(&mut self) -> ParseResult<String> {
        let start = self.pos;
        let has_colon = loop {
            match self.peek() {
                Some(b':') => break true,
                Some(b'{') if !self.src[start..self.pos].trim().is_empty() => break false,
                Some(b',' | b';' | b'{' | b'}') | None => {
                    return Err(self.error("expected ':' after key"));
                },
                Some(_) => self.pos += 1,
            }
        };

        let key = self.src[start..self.pos].trim();
        if key.is_empty() {
            return Err(self.error("empty key"));
        }
        if has_colon {
            self.pos += 1;
        }
        Ok(key.to_string())
    }

    fn parse_value(&mut self) -> ParseResult<ExecInfoValue> {
        self.skip_whitespace();
        if self.peek() == Some(b'{') {
            self.pos += 1;
            return self.parse_entries(true).map(ExecInfoValue::Group);
        }

        let start = self.pos;
        loop {
            match self.peek() {
                Some(b',' | b';' | b'}') | None => break,
                Some(b'{') => return Err(self.error("unexpected '{' inside value")),
                Some(_) => self.pos += 1,
            }
        }
        Ok(ExecInfoValue::Text(self.src[start..self.pos].trim().to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text<'m>(map: &'m ExecInfoMap, key: &str) -> &'m str {
        map[key].as_text().unwrap()
    }

    #[test]
    fn test_parse_flat_entries() {
        let map = ExecInfoParser::parse("time:1.2ms, loops:2, Concurrency:5").unwrap();
        assert_eq!(map.len(), 3);
        assert_eq!(text(&map, "time"), "1.2ms");
        assert_eq!(text(&map, "loops"), "2");
        assert_eq!(text(&map, "Concurrency"), "5");
    }

    #[test]
    fn test_parse_nested_group() {
        let map = ExecInfoParser::parse(
            "inner:{total:1.1ms, concurrency:5, task:3, construct:10µs}, probe:{concurrency:5, total:2ms}",
        )
        .unwrap();
        let inner = map["inner"].as_group().unwrap();
        assert_eq!(inner["concurrency"].as_text(), Some("5"));
        assert_eq!(inner["task"].as_text(), Some("3"));
        assert_eq!(map["probe"].as_group().unwrap().len(), 2);
    }

    #[test]
    fn test_parse_scalar_containing_colon_and_space_keys() {
        let map = ExecInfoParser::parse("tikv_task:{proc max:2ms, avg: 1ms, p80:1ms, tasks:4}")
            .unwrap();
        let task = map["tikv_task"].as_group().unwrap();
        assert_eq!(task["proc max"].as_text(), Some("2ms"));
        assert_eq!(task["avg"].as_text(), Some("1ms"));

        let map = ExecInfoParser::parse("start:12:00:01, rows:3").unwrap();
        assert_eq!(text(&map, "start"), "12:00:01");
    }

    #[test]
    fn test_parse_semicolon_and_trailing_separator() {
        let map = ExecInfoParser::parse("table_task:{num:4, concurrency:5}; cop_task:{distsql_concurrency:15};")
            .unwrap();
        assert_eq!(map.len(), 2);
        let cop = map["cop_task"].as_group().unwrap();
        assert_eq!(cop["distsql_concurrency"].as_text(), Some("15"));
    }

    #[test]
    fn test_parse_group_without_colon() {
        let map = ExecInfoParser::parse(
            "cop_task: {num: 8, max: 600ms, distsql_concurrency: 4}, backoff{regionMiss: 2ms}",
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        let cop = map["cop_task"].as_group().unwrap();
        assert_eq!(cop["distsql_concurrency"].as_text(), Some("4"));
        let backoff = map["backoff"].as_group().unwrap();
        assert_eq!(backoff["regionMiss"].as_text(), Some("2ms"));

        assert!(ExecInfoParser::parse("{regionMiss: 2ms}").is_err());
    }

    #[test]
    fn test_parse_empty_group() {
        let map = ExecInfoParser::parse("lock_keys:{}, time:1ms").unwrap();
        assert!(map["lock_keys"].as_group().unwrap().is_empty());
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(ExecInfoParser::parse("").is_err());
        assert!(ExecInfoParser::parse("N/A").is_err());
        assert!(ExecInfoParser::parse("inner:{task:3").is_err());
        assert!(ExecInfoParser::parse("time:1ms}").is_err());
        assert!(ExecInfoParser::parse("a:b{c}").is_err());
        assert!(ExecInfoParser::parse(":1ms").is_err());
    }
}
