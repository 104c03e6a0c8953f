//! Source location tracking for error reporting.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A position in source code (line and column, both 1-indexed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SourceLocation {
    /// Line number (1-indexed)
    pub line: u32,
    /// Column number (1-indexed)
    pub column: u32,
    /// Byte offset from start of file
    pub offset: usize,
}

impl SourceLocation {
    /// Create a new source location.
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Self { line, column, offset }
    }

    /// Create a location at the start of a file.
    pub fn start() -> Self {
        Self { line: 1, column: 1, offset: 0 }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// A span in source code (start and end positions).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Start of the span
    pub start: SourceLocation,
    /// End of the span (exclusive)
    pub end: SourceLocation,
}

impl Span {
    /// Create a span from start and end locations.
    pub fn new(start: SourceLocation, end: SourceLocation) -> Self {
        Self { start, end }
    }

    /// Create a dummy span (for synthesized nodes).
    pub fn dummy() -> Self {
        Self::default()
    }

    /// Check if this span is a dummy span.
    pub fn is_dummy(&self) -> bool {
        self.start.line == 0 && self.end.line == 0
    }

    /// The source line the span starts on.
    pub fn line(&self) -> u32 {
        self.start.line
    }

    /// Merge two spans to create a span covering both.
    pub fn merge(&self, other: &Span) -> Span {
        let start = if (self.start.line, self.start.column) <= (other.start.line, other.start.column)
        {
            self.start
        } else {
            other.start
        };
        let end = if (self.end.line, self.end.column) >= (other.end.line, other.end.column) {
            self.end
        } else {
            other.end
        };
        Span::new(start, end)
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}:{}-{}", self.start.line, self.start.column, self.end.column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_display() {
        let span = Span::new(SourceLocation::new(1, 5, 4), SourceLocation::new(1, 10, 9));
        assert_eq!(format!("{}", span), "1:5-10");

        let span = Span::new(SourceLocation::new(1, 5, 4), SourceLocation::new(3, 10, 30));
        assert_eq!(format!("{}", span), "1:5-3:10");
    }

    #[test]
    fn test_span_merge() {
        let span1 = Span::new(SourceLocation::new(1, 1, 0), SourceLocation::new(1, 5, 4));
        let span2 = Span::new(SourceLocation::new(1, 10, 9), SourceLocation::new(1, 15, 14));
        let merged = span1.merge(&span2);
        assert_eq!(merged.start.column, 1);
        assert_eq!(merged.end.column, 15);
    }
}
