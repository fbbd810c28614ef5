//! Predicate pattern matcher
//!
//! Decides whether a Selection's predicate text is a conjunction of simple
//! comparisons against one column, e.g. `eq(test.t.a, 1), in(test.t.a, 2, 3)`.
//! Such predicates could be served by a single-column index.

use std::collections::BTreeSet;

/// Comparison functions that an index on one column can serve
const INDEXABLE_FUNCS: [&str; 7] = ["eq", "ge", "gt", "le", "lt", "isnull", "in"];

/// Byte range of one `func(args)` call inside the predicate text
struct CallSpan {
    start: usize,
    args_start: usize,
    args_end: usize,
    end: usize,
}

pub struct PredicateParser;

impl PredicateParser {
    /// True if every comparison in `predicate` is a supported single-column
    /// form and all of them refer to the same column
    pub fn is_single_column_predicate(predicate: &str) -> bool {
        Self::single_column(predicate).is_some()
    }

    /// The one column a single-column predicate refers to
    pub fn single_column(predicate: &str) -> Option<String> {
        let mut residual = predicate.to_string();
        let mut columns = BTreeSet::new();
        let mut comparisons = 0usize;

        for func in INDEXABLE_FUNCS {
            while let Some(span) = find_call(&residual, func) {
                let args = &residual[span.args_start..span.args_end];
                if args.contains('(') {
                    return None;
                }

                let column = comparison_column(func, args)?;
                columns.insert(column);
                comparisons += 1;

                let (start, end) = if func == "isnull" {
                    strip_enclosing_not(&residual, span.start, span.end)
                } else {
                    (span.start, span.end)
                };
                residual.replace_range(start..end, "");
            }
        }

        if residual.contains('(') || residual.contains(')') || comparisons == 0 {
            return None;
        }
        match columns.len() {
            1 => columns.pop_first(),
            _ => None,
        }
    }
}

/// The column a supported comparison refers to, None when the arguments do
/// not form a single-column comparison
fn comparison_column(func: &str, args: &str) -> Option<String> {
    let args = split_args(args);

    match func {
        "isnull" => match args.as_slice() {
            [only] if looks_like_column(only) => Some(only.to_string()),
            _ => None,
        },
        "in" => {
            let (first, rest) = args.split_first()?;
            if !looks_like_column(first) || rest.is_empty() {
                return None;
            }
            if rest.iter().any(|arg| looks_like_column(arg)) {
                return None;
            }
            Some(first.to_string())
        },
        _ => match args.as_slice() {
            [left, right] => match (looks_like_column(left), looks_like_column(right)) {
                (true, false) => Some(left.to_string()),
                (false, true) => Some(right.to_string()),
                _ => None,
            },
            _ => None,
        },
    }
}

/// Locate the first `func(` not preceded by an identifier character
fn find_call(text: &str, func: &str) -> Option<CallSpan> {
    let pattern = format!("{}(", func);
    let mut from = 0;

    while let Some(offset) = text[from..].find(&pattern) {
        let start = from + offset;
        let preceded_by_ident = text[..start]
            .chars()
            .next_back()
            .is_some_and(is_ident_char);

        if !preceded_by_ident {
            let args_start = start + pattern.len();
            let close = text[args_start..].find(')')?;
            let args_end = args_start + close;
            return Some(CallSpan { start, args_start, args_end, end: args_end + 1 });
        }
        from = start + pattern.len();
    }
    None
}

/// Widen an `isnull(...)` span to cover an enclosing `not(...)`
fn strip_enclosing_not(text: &str, start: usize, end: usize) -> (usize, usize) {
    const NOT_OPEN: &str = "not(";

    let before = &text[..start];
    if let Some(prefix) = before.strip_suffix(NOT_OPEN)
        && !prefix.chars().next_back().is_some_and(is_ident_char)
        && text[end..].starts_with(')')
    {
        return (start - NOT_OPEN.len(), end + 1);
    }
    (start, end)
}

/// Split an argument list on commas outside of quoted constants
fn split_args(args: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut quote: Option<char> = None;
    let mut last = 0;

    for (i, c) in args.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {},
            (None, '"' | '\'') => quote = Some(c),
            (None, ',') => {
                parts.push(args[last..i].trim());
                last = i + 1;
            },
            (None, _) => {},
        }
    }
    parts.push(args[last..].trim());
    parts
}

/// A column is an unquoted dotted name such as `t.a` or `test.t.a`
fn looks_like_column(arg: &str) -> bool {
    let parts: Vec<&str> = arg.split('.').collect();
    parts.len() >= 2
        && parts.iter().all(|part| {
            !part.is_empty()
                && part.chars().all(is_ident_char)
                && !part.chars().all(|c| c.is_ascii_digit())
        })
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
