//! File-relative source coordinates.
//!
//! Every value, issue and evaluation error produced by the engine is attributed
//! to a [`Range`]. Ranges are built from the byte spans `hcl-edit` attaches to the
//! parsed tree, resolved against the [`SourceFile`] they came from.

use std::cmp::{max, min};
use std::fmt::Display;

/// A position in a source file.
///
/// `line` and `column` are 1-based, `column` counts characters. `byte` is the
/// 0-based byte offset.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pos {
    pub line: usize,
    pub column: usize,
    pub byte: usize,
}

impl Pos {
    pub fn new(line: usize, column: usize, byte: usize) -> Self {
        Pos { line, column, byte }
    }

    pub fn start_of_file() -> Self {
        Pos { line: 1, column: 1, byte: 0 }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Range {
    pub filename: String,
    pub start: Pos,
    pub end: Pos,
}

impl Range {
    pub fn new(filename: impl Into<String>, start: Pos, end: Pos) -> Self {
        Range { filename: filename.into(), start, end }
    }

    /// An empty range at the beginning of a file, used when the parser could
    /// not report a more precise location.
    pub fn at_start(filename: impl Into<String>) -> Self {
        Range { filename: filename.into(), start: Pos::start_of_file(), end: Pos::start_of_file() }
    }

    pub fn is_empty(&self) -> bool {
        self.start.byte == self.end.byte
    }

    pub fn contains_offset(&self, offset: usize) -> bool {
        offset >= self.start.byte && offset < self.end.byte
    }

    /// Returns true if both ranges share at least one byte. An empty range
    /// overlaps another range when it is located inside of it.
    pub fn overlaps(&self, other: &Range) -> bool {
        if self.filename != other.filename {
            return false;
        }
        match (self.is_empty(), other.is_empty()) {
            (true, true) => self.start.byte == other.start.byte,
            (true, false) => other.contains_offset(self.start.byte),
            (false, true) => self.contains_offset(other.start.byte),
            (false, false) => {
                self.start.byte < other.end.byte && other.start.byte < self.end.byte
            }
        }
    }

    /// The portion of `self` also covered by `other`, or an empty range at the
    /// end of `self` if they do not overlap.
    pub fn overlap(&self, other: &Range) -> Range {
        if !self.overlaps(other) {
            return Range::new(self.filename.clone(), self.end, self.end);
        }
        let start = if other.start.byte > self.start.byte { other.start } else { self.start };
        let end = if other.end.byte < self.end.byte { other.end } else { self.end };
        Range::new(self.filename.clone(), start, end)
    }

    /// Splits `self` into the part before `other`, the part overlapping it,
    /// and the part after it. Any of the three may be empty.
    pub fn partition_around(&self, other: &Range) -> (Range, Range, Range) {
        let overlap = self.overlap(other);
        if !self.overlaps(other) {
            let tail = Range::new(self.filename.clone(), self.end, self.end);
            return (self.clone(), tail.clone(), tail);
        }

        let before = if overlap.start.byte > self.start.byte {
            Range::new(self.filename.clone(), self.start, overlap.start)
        } else {
            Range::new(self.filename.clone(), self.start, self.start)
        };
        let after = if overlap.end.byte < self.end.byte {
            Range::new(self.filename.clone(), overlap.end, self.end)
        } else {
            Range::new(self.filename.clone(), self.end, self.end)
        };
        (before, overlap, after)
    }

    /// Slices the bytes covered by this range out of `source`. Out of bound
    /// offsets are clamped.
    pub fn slice_bytes<'a>(&self, source: &'a [u8]) -> &'a [u8] {
        let start = min(self.start.byte, source.len());
        let end = max(start, min(self.end.byte, source.len()));
        &source[start..end]
    }
}

impl Display for Range {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.start.line == self.end.line {
            write!(
                f,
                "{}:{},{}-{}",
                self.filename, self.start.line, self.start.column, self.end.column
            )
        } else {
            write!(
                f,
                "{}:{},{}-{},{}",
                self.filename, self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

/// A parsed file's name and content, indexed by line so byte spans can be
/// turned into [`Range`]s.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    name: String,
    content: String,
    line_starts: Vec<usize>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let content = content.into();
        let mut line_starts = vec![0];
        for (offset, byte) in content.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(offset + 1);
            }
        }
        SourceFile { name: name.into(), content, line_starts }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn bytes(&self) -> &[u8] {
        self.content.as_bytes()
    }

    pub fn pos_at(&self, byte: usize) -> Pos {
        let byte = min(byte, self.content.len());
        let line_index = match self.line_starts.binary_search(&byte) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        let line_start = self.line_starts[line_index];
        let column = match self.content.get(line_start..byte) {
            Some(prefix) => prefix.chars().count() + 1,
            None => byte - line_start + 1,
        };
        Pos { line: line_index + 1, column, byte }
    }

    pub fn range_of(&self, span: &std::ops::Range<usize>) -> Range {
        Range::new(self.name.clone(), self.pos_at(span.start), self.pos_at(span.end))
    }

    pub fn range_of_optional(&self, span: Option<std::ops::Range<usize>>) -> Range {
        match span {
            Some(span) => self.range_of(&span),
            None => Range::at_start(self.name.clone()),
        }
    }

    /// One range per line, excluding the line terminator.
    pub fn line_ranges(&self) -> Vec<Range> {
        let mut ranges = Vec::with_capacity(self.line_starts.len());
        for (index, start) in self.line_starts.iter().enumerate() {
            let mut end = match self.line_starts.get(index + 1) {
                Some(next) => next - 1,
                None => self.content.len(),
            };
            if *start == self.content.len() && index > 0 {
                break;
            }
            if end > *start && self.content.as_bytes()[end - 1] == b'\r' {
                end -= 1;
            }
            ranges.push(Range::new(self.name.clone(), self.pos_at(*start), self.pos_at(end)));
        }
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn range(start: usize, end: usize) -> Range {
        let file = SourceFile::new("main.tf", "resource \"a\" \"b\" {\n  tags = {}\n}\n");
        file.range_of(&(start..end))
    }

    #[test]
    fn positions_are_one_based() {
        let file = SourceFile::new("main.tf", "a = 1\nbé = 2\n");
        assert_eq!(file.pos_at(0), Pos::new(1, 1, 0));
        assert_eq!(file.pos_at(6), Pos::new(2, 1, 6));
        // 'é' is two bytes wide but a single column
        assert_eq!(file.pos_at(9), Pos::new(2, 3, 9));
    }

    #[test_case(0, 5, 3, 8, true ; "partial overlap")]
    #[test_case(0, 5, 5, 8, false ; "adjacent")]
    #[test_case(2, 2, 0, 5, true ; "empty inside")]
    #[test_case(7, 7, 0, 5, false ; "empty outside")]
    fn overlaps(a_start: usize, a_end: usize, b_start: usize, b_end: usize, expected: bool) {
        assert_eq!(range(a_start, a_end).overlaps(&range(b_start, b_end)), expected);
    }

    #[test]
    fn ranges_in_different_files_never_overlap() {
        let mut other = range(0, 5);
        other.filename = "other.tf".into();
        assert!(!range(0, 5).overlaps(&other));
    }

    #[test]
    fn partition_around_splits_a_line() {
        let file = SourceFile::new("main.tf", "resource \"a\" \"b\" {\n  tags = {}\n}\n");
        let line = file.line_ranges()[1].clone();
        let issue = file.range_of(&(28..30));
        let (before, highlighted, after) = line.partition_around(&issue);

        assert_eq!(before.slice_bytes(file.bytes()), b"  tags = ");
        assert_eq!(highlighted.slice_bytes(file.bytes()), b"{}");
        assert!(after.is_empty());
    }

    #[test]
    fn partition_around_without_overlap_keeps_everything_before() {
        let line = range(0, 5);
        let (before, highlighted, after) = line.partition_around(&range(10, 12));
        assert_eq!(before, line);
        assert!(highlighted.is_empty());
        assert!(after.is_empty());
    }

    #[test]
    fn line_ranges_exclude_terminators() {
        let file = SourceFile::new("main.tf", "a = 1\r\nb = 2\n");
        let lines = file.line_ranges();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].slice_bytes(file.bytes()), b"a = 1");
        assert_eq!(lines[1].slice_bytes(file.bytes()), b"b = 2");
        assert_eq!(lines[1].start.line, 2);
    }

    #[test]
    fn display_matches_hcl_conventions() {
        let file = SourceFile::new("main.tf", "a = 1\nb = 2\n");
        assert_eq!(file.range_of(&(0..5)).to_string(), "main.tf:1,1-6");
        assert_eq!(file.range_of(&(0..9)).to_string(), "main.tf:1,1-2,4");
    }
}
