//! Unified diff hunks.
//!
//! [`parse_hunks`] turns raw `git diff` output into an ordered list of [`Hunk`]s. Content
//! lines are kept verbatim, including their leading `+`, `-` or space, so a hunk can be
//! written back into a patch unchanged. Anything that is neither a hunk header nor a content
//! line (file headers, mode lines, `\ No newline at end of file`) is skipped.

use regex::Regex;
use std::sync::LazyLock;

/// `@@ -<old_start>[,<old_count>] +<new_start>[,<new_count>] @@<trailer>`
///
/// Counts are captured loosely so a malformed count falls back to the default instead of
/// making the whole line unrecognizable.
static HUNK_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^@@ -(\d+)(?:,([^ ]*))? \+(\d+)(?:,([^ ]*))? @@(.*)$")
        .expect("hunk header pattern is valid")
});

/// Origin of a line within a hunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LineKind {
    Context,
    Addition,
    Deletion,
}

impl LineKind {
    /// Classify a raw hunk line by its first character.
    pub fn of(line: &str) -> Option<Self> {
        match line.as_bytes().first() {
            Some(b' ') => Some(Self::Context),
            Some(b'+') => Some(Self::Addition),
            Some(b'-') => Some(Self::Deletion),
            _ => None,
        }
    }
}

/// A contiguous changed region with its old and new line ranges.
///
/// Line numbers are 1-based. A zero `new_count` marks a pure deletion, whose `new_start` is
/// the line the removed block followed (0 when it was at the top of the file).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    /// The `@@ ... @@` line exactly as it appeared.
    pub header: String,
    pub lines: Vec<String>,
}

impl Hunk {
    /// Parse a hunk header line. Missing or unparseable counts default to 1.
    pub fn from_header(line: &str) -> Option<Self> {
        let caps = HUNK_HEADER.captures(line)?;
        let number = |idx: usize| caps.get(idx).and_then(|m| m.as_str().parse::<u32>().ok());

        Some(Self {
            old_start: number(1).unwrap_or(0),
            old_count: number(2).unwrap_or(1),
            new_start: number(3).unwrap_or(0),
            new_count: number(4).unwrap_or(1),
            header: line.to_string(),
            lines: Vec::new(),
        })
    }

    pub fn is_header(line: &str) -> bool {
        HUNK_HEADER.is_match(line)
    }

    /// Whether the hunk removes lines without leaving any in the new file.
    pub fn is_deletion(&self) -> bool {
        self.new_count == 0
    }

    /// One past the last new-file line the hunk covers.
    pub fn new_end(&self) -> u32 {
        self.new_start.saturating_add(self.new_count)
    }

    /// The line a cursor lands on when jumping to this hunk.
    pub fn anchor_line(&self) -> u32 {
        self.new_start.max(1)
    }

    /// Content lines with their kind, skipping markers such as `\ No newline at end of file`.
    pub fn tagged_lines(&self) -> impl Iterator<Item = (LineKind, &str)> {
        self.lines
            .iter()
            .filter_map(|line| LineKind::of(line).map(|kind| (kind, &line[1..])))
    }

    pub fn count_of(&self, kind: LineKind) -> usize {
        self.tagged_lines().filter(|(k, _)| *k == kind).count()
    }

    /// The inverse hunk: old and new ranges swapped, additions and deletions exchanged.
    pub fn reversed(&self) -> Self {
        let trailer = HUNK_HEADER
            .captures(&self.header)
            .and_then(|caps| caps.get(5))
            .map_or("", |m| m.as_str());

        let lines = self
            .lines
            .iter()
            .map(|line| match LineKind::of(line) {
                Some(LineKind::Addition) => format!("-{}", &line[1..]),
                Some(LineKind::Deletion) => format!("+{}", &line[1..]),
                _ => line.clone(),
            })
            .collect();

        Self {
            old_start: self.new_start,
            old_count: self.new_count,
            new_start: self.old_start,
            new_count: self.old_count,
            header: format!(
                "@@ -{},{} +{},{} @@{trailer}",
                self.new_start, self.new_count, self.old_start, self.old_count
            ),
            lines,
        }
    }
}

/// Split text into lines on `\n`, keeping everything else (including `\r`) verbatim.
///
/// A trailing newline does not produce an empty final line.
pub(crate) fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    let body = text.strip_suffix('\n').unwrap_or(text);
    body.split('\n').filter(move |_| !text.is_empty())
}

/// Parse unified diff text into hunks, in the order they appear.
///
/// Empty or whitespace-only input yields no hunks.
pub fn parse_hunks(diff_text: &str) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in split_lines(diff_text) {
        if let Some(hunk) = Hunk::from_header(line) {
            hunks.extend(current.replace(hunk));
            continue;
        }

        if line.starts_with("diff ") {
            // Start of the next file in a multi-file diff; its `---`/`+++` lines are not content.
            hunks.extend(current.take());
            continue;
        }

        if let (Some(hunk), Some(_)) = (current.as_mut(), LineKind::of(line)) {
            hunk.lines.push(line.to_string());
        }
    }

    hunks.extend(current);
    hunks
}

/// Lines a renderer can jump to, one per hunk.
pub fn hunk_starts(hunks: &[Hunk]) -> Vec<u32> {
    hunks.iter().map(Hunk::anchor_line).collect()
}

/// The first hunk start strictly after `line`.
pub fn next_hunk_start(hunks: &[Hunk], line: u32) -> Option<u32> {
    hunks
        .iter()
        .map(Hunk::anchor_line)
        .find(|start| *start > line)
}

/// The last hunk start strictly before `line`.
pub fn prev_hunk_start(hunks: &[Hunk], line: u32) -> Option<u32> {
    hunks
        .iter()
        .map(Hunk::anchor_line)
        .filter(|start| *start < line)
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_hunk() {
        let hunks = parse_hunks("@@ -1,2 +1,3 @@\n line1\n+added\n line2\n");
        assert_eq!(hunks.len(), 1);

        let hunk = &hunks[0];
        assert_eq!(
            (hunk.old_start, hunk.old_count, hunk.new_start, hunk.new_count),
            (1, 2, 1, 3)
        );
        assert_eq!(hunk.lines, vec![" line1", "+added", " line2"]);
    }

    #[test]
    fn empty_input_has_no_hunks() {
        assert!(parse_hunks("").is_empty());
        assert!(parse_hunks("  \n\t\n").is_empty());
    }

    #[test]
    fn omitted_counts_default_to_one() {
        let hunks = parse_hunks("@@ -3 +4 @@\n-old\n+new\n");
        assert_eq!(
            (hunks[0].old_start, hunks[0].old_count, hunks[0].new_start, hunks[0].new_count),
            (3, 1, 4, 1)
        );
    }

    #[test]
    fn malformed_count_defaults_to_one() {
        let hunk = Hunk::from_header("@@ -3,x +4,2 @@").unwrap();
        assert_eq!((hunk.old_count, hunk.new_count), (1, 2));
    }

    #[test]
    fn file_headers_are_ignored() {
        let diff = "diff --git a/f.txt b/f.txt\n\
                    index 123..456 100644\n\
                    --- a/f.txt\n\
                    +++ b/f.txt\n\
                    @@ -1 +1 @@\n\
                    -a\n\
                    +b\n\
                    \\ No newline at end of file\n";
        let hunks = parse_hunks(diff);
        assert_eq!(hunks.len(), 1);
        assert_eq!(hunks[0].lines, vec!["-a", "+b"]);
    }

    #[test]
    fn next_file_header_closes_hunk() {
        let diff = "diff --git a/a b/a\n--- a/a\n+++ b/a\n@@ -1 +1 @@\n-x\n+y\n\
                    diff --git a/b b/b\n--- a/b\n+++ b/b\n@@ -2,0 +3 @@\n+z\n";
        let hunks = parse_hunks(diff);
        assert_eq!(hunks.len(), 2);
        assert_eq!(hunks[0].lines, vec!["-x", "+y"]);
        assert_eq!(hunks[1].lines, vec!["+z"]);
    }

    #[test]
    fn hunks_are_ordered_and_disjoint() {
        let diff = "@@ -1,0 +2,2 @@\n+a\n+b\n@@ -5 +7,0 @@\n-c\n@@ -9,2 +10 @@\n-d\n-e\n+f\n";
        let hunks = parse_hunks(diff);
        assert_eq!(hunks.len(), 3);
        for pair in hunks.windows(2) {
            assert!(pair[0].new_start < pair[1].new_start);
            assert!(pair[0].new_end() <= pair[1].new_start);
        }
    }

    #[test]
    fn counts_match_tagged_lines() {
        let hunks = parse_hunks("@@ -10,4 +10,3 @@\n keep\n-gone\n-also\n+new\n keep2\n");
        let hunk = &hunks[0];
        let context = hunk.count_of(LineKind::Context);
        assert_eq!(hunk.count_of(LineKind::Deletion) + context, hunk.old_count as usize);
        assert_eq!(hunk.count_of(LineKind::Addition) + context, hunk.new_count as usize);
    }

    #[test]
    fn crlf_content_is_preserved() {
        let hunks = parse_hunks("@@ -1 +1 @@\r\n-a\r\n+b\r\n");
        assert_eq!(hunks[0].lines, vec!["-a\r", "+b\r"]);
    }

    #[test]
    fn reversed_swaps_ranges_and_tags() {
        let hunk = Hunk::from_header("@@ -4,2 +4,1 @@ fn main()").unwrap();
        let hunk = Hunk {
            lines: vec!["-a".into(), "-b".into(), "+c".into()],
            ..hunk
        };
        let reversed = hunk.reversed();
        assert_eq!(reversed.header, "@@ -4,1 +4,2 @@ fn main()");
        assert_eq!(reversed.lines, vec!["+a", "+b", "-c"]);
        assert_eq!(reversed.reversed().lines, hunk.lines);
    }

    #[test]
    fn navigation_between_hunk_starts() {
        let hunks = parse_hunks(
            "@@ -1,0 +0,0 @@\n@@ -3 +5 @@\n-a\n+b\n@@ -8 +12,2 @@\n-c\n+d\n+e\n",
        );
        assert_eq!(hunk_starts(&hunks), vec![1, 5, 12]);
        assert_eq!(next_hunk_start(&hunks, 1), Some(5));
        assert_eq!(next_hunk_start(&hunks, 12), None);
        assert_eq!(prev_hunk_start(&hunks, 12), Some(5));
        assert_eq!(prev_hunk_start(&hunks, 1), None);
    }
}
