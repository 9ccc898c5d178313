//! Source location types
//!
//! Spans are byte-offset (UTF-8) columns, not code-point offsets. Unknown
//! positions use the sentinel `-1`.

use serde::{Deserialize, Serialize};

/// Span in source code: `(file, start_line, start_col, end_line, end_col)`.
///
/// Columns are byte offsets. `-1` marks an unknown position. Invariant: if
/// `start_line >= 0` then `end_line >= start_line`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub file: String,
    pub start_line: i64,
    pub start_col: i64,
    pub end_line: i64,
    pub end_col: i64,
}

impl Span {
    pub fn new(file: impl Into<String>, start_line: i64, start_col: i64, end_line: i64, end_col: i64) -> Self {
        Self {
            file: file.into(),
            start_line,
            start_col,
            end_line,
            end_col,
        }
    }

    /// Sentinel span for unknown positions.
    pub fn unknown(file: impl Into<String>) -> Self {
        Self::new(file, -1, -1, -1, -1)
    }

    pub fn is_known(&self) -> bool {
        self.start_line >= 0 && self.start_col >= 0
    }

    pub fn contains_line(&self, line: i64) -> bool {
        self.is_known() && self.start_line <= line && line <= self.end_line
    }

    /// Extract the source segment for this span. Handles UTF-8 byte offsets
    /// correctly by re-decoding per line rather than slicing at code points.
    pub fn extract<'a>(&self, source: &'a str) -> Option<String> {
        if !self.is_known() || self.end_line < 0 {
            return None;
        }
        let lines: Vec<&str> = source.split_inclusive('\n').collect();
        let start_idx = self.start_line as usize;
        let end_idx = self.end_line as usize;
        if start_idx < 1 || start_idx > lines.len() {
            return None;
        }
        if end_idx < start_idx || end_idx > lines.len() {
            return None;
        }

        if start_idx == end_idx {
            let line = lines[start_idx - 1];
            let bytes = line.as_bytes();
            let start_col = self.start_col.max(0) as usize;
            let end_col = if self.end_col < 0 {
                bytes.len()
            } else {
                (self.end_col as usize).min(bytes.len())
            };
            if start_col > end_col || start_col > bytes.len() {
                return None;
            }
            return std::str::from_utf8(&bytes[start_col..end_col]).ok().map(|s| s.to_string());
        }

        let first_line = lines[start_idx - 1];
        let first_bytes = first_line.as_bytes();
        let start_col = (self.start_col.max(0) as usize).min(first_bytes.len());
        let first_part = std::str::from_utf8(&first_bytes[start_col..]).ok()?;

        let middle: String = lines[start_idx..end_idx - 1].concat();

        let last_line = lines[end_idx - 1];
        let last_bytes = last_line.as_bytes();
        let last_part = if self.end_col < 0 {
            last_line.to_string()
        } else {
            let end_col = (self.end_col as usize).min(last_bytes.len());
            std::str::from_utf8(&last_bytes[..end_col]).ok()?.to_string()
        };

        Some(format!("{first_part}{middle}{last_part}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_single_line_span() {
        let src = "x = 1\ny = 2\n";
        let span = Span::new("f.py", 1, 0, 1, 5);
        assert_eq!(span.extract(src).unwrap(), "x = 1");
    }

    #[test]
    fn extracts_multi_line_span() {
        let src = "def f():\n    x = 1\n    return x\n";
        let span = Span::new("f.py", 1, 0, 3, 13);
        let extracted = span.extract(src).unwrap();
        assert!(extracted.starts_with("def f():"));
        assert!(extracted.ends_with("return x"));
    }

    #[test]
    fn unknown_span_extracts_nothing() {
        let span = Span::unknown("f.py");
        assert!(span.extract("abc").is_none());
    }

    #[test]
    fn contains_line_respects_bounds() {
        let span = Span::new("f.py", 10, 0, 20, 0);
        assert!(span.contains_line(10));
        assert!(span.contains_line(15));
        assert!(!span.contains_line(9));
        assert!(!span.contains_line(21));
    }
}
