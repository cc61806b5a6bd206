use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

pub const MAX_LINES: usize = 1_000_000;

pub const MAX_FILE_SIZE: usize = u32::MAX as usize;

#[derive(Error, Debug)]
pub enum SourceLocationError {
    #[error("File exceeds maximum line count: {0} lines")]
    TooManyLines(usize),
    #[error("File exceeds maximum size: {0} bytes")]
    FileTooLarge(usize),
    #[error("Invalid source span: start={0}, len={1}")]
    InvalidSpan(u32, u32),
}

pub type Result<T> = std::result::Result<T, SourceLocationError>;

/// Byte range into the analyzed source. A zero-length span is an insertion point.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourceSpan {
    pub start: u32,
    pub len: u32,
}

impl SourceSpan {
    pub fn new(start: u32, len: u32) -> Self {
        Self { start, len }
    }

    pub fn from_range(start: usize, end: usize) -> Self {
        let start = start.min(MAX_FILE_SIZE) as u32;
        let end = end.min(MAX_FILE_SIZE) as u32;
        Self {
            start,
            len: end.saturating_sub(start),
        }
    }

    pub fn insertion(at: usize) -> Self {
        Self::from_range(at, at)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn end(&self) -> u32 {
        self.start.saturating_add(self.len)
    }

    pub fn range(&self) -> std::ops::Range<usize> {
        self.start as usize..self.end() as usize
    }

    pub fn contains(&self, other: &SourceSpan) -> bool {
        other.start >= self.start && other.end() <= self.end()
    }

    /// Two edits collide when their byte ranges intersect, when both insert at
    /// the same offset, or when an insertion falls strictly inside the other.
    pub fn overlaps(&self, other: &SourceSpan) -> bool {
        match (self.is_empty(), other.is_empty()) {
            (true, true) => self.start == other.start,
            (true, false) => self.start > other.start && self.start < other.end(),
            (false, true) => other.start > self.start && other.start < self.end(),
            (false, false) => self.start < other.end() && other.start < self.end(),
        }
    }

    pub fn merge(&self, other: &SourceSpan) -> SourceSpan {
        let start = self.start.min(other.start);
        let end = self.end().max(other.end());
        SourceSpan::new(start, end.saturating_sub(start))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: Option<PathBuf>,
    pub text: Arc<str>,
    pub line_starts: Arc<Vec<usize>>,
}

impl SourceFile {
    pub fn new(path: Option<PathBuf>, text: &str) -> Result<Self> {
        if text.len() > MAX_FILE_SIZE {
            return Err(SourceLocationError::FileTooLarge(text.len()));
        }
        let line_starts = compute_line_starts(text)?;
        Ok(Self {
            path,
            text: Arc::from(text),
            line_starts: Arc::new(line_starts),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn slice(&self, span: SourceSpan) -> Result<&str> {
        self.text
            .get(span.range())
            .ok_or(SourceLocationError::InvalidSpan(span.start, span.len))
    }

    /// One-based line and column (in chars) of the span start.
    pub fn to_line_col(&self, offset: usize) -> (u32, u32) {
        let offset = offset.min(self.text.len());
        let line_idx = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let line_start = self.line_starts[line_idx];
        let bytes = self.text.as_bytes();
        let boundary = find_char_boundary(bytes, offset);
        let column = self.text[line_start..boundary.max(line_start)].chars().count() as u32 + 1;
        ((line_idx + 1) as u32, column)
    }

    pub fn line_of(&self, span: SourceSpan) -> u32 {
        self.to_line_col(span.start as usize).0
    }

    pub fn get_line(&self, line: usize) -> Option<&str> {
        if line == 0 {
            return None;
        }

        let line_idx = line - 1;
        if line_idx >= self.line_starts.len() {
            return None;
        }

        let start = self.line_starts[line_idx];
        let end = if line_idx + 1 < self.line_starts.len() {
            self.line_starts[line_idx + 1]
        } else {
            self.text.len()
        };

        let text_bytes = self.text.as_bytes();
        let start_boundary = find_char_boundary(text_bytes, start);
        let end_boundary = find_char_boundary(text_bytes, end);

        std::str::from_utf8(&text_bytes[start_boundary..end_boundary])
            .ok()
            .map(|s| s.trim_end_matches(&['\r', '\n'][..]))
    }

    /// Leading whitespace of the line containing `offset`.
    pub fn indent_at(&self, offset: usize) -> &str {
        let line = self.to_line_col(offset).0 as usize;
        self.get_line(line)
            .map(|text| {
                let trimmed = text.trim_start();
                &text[..text.len() - trimmed.len()]
            })
            .unwrap_or("")
    }

    pub fn snippet(&self, span: SourceSpan, context_lines: usize) -> String {
        let line = self.line_of(span) as usize;
        let start_line = line.saturating_sub(context_lines).max(1);
        let end_line = line.saturating_add(context_lines);

        let mut snippet = String::with_capacity(256);
        for line_no in start_line..=end_line {
            if let Some(line_text) = self.get_line(line_no) {
                snippet.push_str(&format!("{:4} | {}\n", line_no, line_text));
            }
        }
        snippet
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

fn compute_line_starts(text: &str) -> Result<Vec<usize>> {
    let mut line_starts = Vec::with_capacity(256);
    line_starts.push(0);

    let bytes = text.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if line_starts.len() >= MAX_LINES {
            return Err(SourceLocationError::TooManyLines(line_starts.len()));
        }

        match bytes[i] {
            b'\r' => {
                if i + 1 < bytes.len() && bytes[i + 1] == b'\n' {
                    i += 2;
                } else {
                    i += 1;
                }
                line_starts.push(i);
            }
            b'\n' => {
                i += 1;
                line_starts.push(i);
            }
            _ => {
                i += 1;
            }
        }
    }

    Ok(line_starts)
}

fn find_char_boundary(bytes: &[u8], mut index: usize) -> usize {
    if index >= bytes.len() {
        return bytes.len();
    }

    while index > 0 && (bytes[index] & 0b1100_0000) == 0b1000_0000 {
        index -= 1;
    }

    index
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_basics() {
        let span = SourceSpan::new(10, 20);
        assert!(!span.is_empty());
        assert_eq!(span.end(), 30);
        assert_eq!(span.range(), 10..30);
        assert!(SourceSpan::insertion(4).is_empty());
    }

    #[test]
    fn test_span_contains() {
        let outer = SourceSpan::new(10, 20);
        let inner = SourceSpan::new(15, 5);

        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));
    }

    #[test]
    fn test_overlap_single_byte() {
        let a = SourceSpan::new(10, 5);
        let b = SourceSpan::new(14, 3);
        let c = SourceSpan::new(15, 3);
        assert!(a.overlaps(&b));
        assert!(b.overlaps(&a));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_overlap_insertions() {
        let body = SourceSpan::new(10, 5);
        assert!(SourceSpan::insertion(12).overlaps(&body));
        assert!(!SourceSpan::insertion(10).overlaps(&body));
        assert!(!SourceSpan::insertion(15).overlaps(&body));
        assert!(SourceSpan::insertion(3).overlaps(&SourceSpan::insertion(3)));
        assert!(!SourceSpan::insertion(3).overlaps(&SourceSpan::insertion(4)));
    }

    #[test]
    fn test_span_merge() {
        let merged = SourceSpan::new(10, 5).merge(&SourceSpan::new(20, 5));
        assert_eq!(merged, SourceSpan::new(10, 15));
    }

    #[test]
    fn test_line_starts_unix() {
        let text = "line 1\nline 2\nline 3";
        let line_starts = compute_line_starts(text).unwrap();
        assert_eq!(line_starts, vec![0, 7, 14]);
    }

    #[test]
    fn test_line_starts_windows() {
        let text = "line 1\r\nline 2\r\nline 3";
        let line_starts = compute_line_starts(text).unwrap();
        assert_eq!(line_starts, vec![0, 8, 16]);
    }

    #[test]
    fn test_to_line_col() {
        let file = SourceFile::new(None, "line 1\nline 2\nline 3").unwrap();
        assert_eq!(file.to_line_col(7), (2, 1));
        assert_eq!(file.to_line_col(10), (2, 4));
        assert_eq!(file.to_line_col(0), (1, 1));
    }

    #[test]
    fn test_slice_and_indent() {
        let file = SourceFile::new(None, "fn a() {\n    let x = 1;\n}").unwrap();
        assert_eq!(file.slice(SourceSpan::new(13, 5)).unwrap(), "let x");
        assert_eq!(file.indent_at(15), "    ");
        assert!(file.slice(SourceSpan::new(100, 2)).is_err());
    }

    #[test]
    fn test_snippet_extraction() {
        let file = SourceFile::new(None, "line 1\nline 2\nline 3\nline 4\nline 5").unwrap();
        let snippet = file.snippet(SourceSpan::new(14, 6), 1);
        assert!(snippet.contains("   2 | line 2"));
        assert!(snippet.contains("   3 | line 3"));
        assert!(snippet.contains("   4 | line 4"));
        assert!(!snippet.contains("line 5"));
    }
}
