//! Per-path status codes and the git output formats that produce them.
//!
//! Two line formats feed the status tree:
//!
//! - `status --porcelain`: `XY <path>`, with `XY <old> -> <new>` for renames and copies.
//! - `diff --name-status`: `<code>[score]<tab><path>`, with `<old><tab><new>` for renames
//!   and copies.
//!
//! Renames and copies are keyed by their destination path; the source path never becomes
//! an entry.

use rustc_hash::FxHashMap;
use std::path::PathBuf;

/// Status of a single node in the tree.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum StatusCode {
    #[default]
    Clean,
    Modified,
    Added,
    Deleted,
    Renamed,
    Copied,
    Untracked,
    /// Changed between the base ref and HEAD, with no local change on top.
    Committed,
}

impl StatusCode {
    /// Single-character marker for renderers. Clean nodes get a space.
    pub fn glyph(self) -> char {
        match self {
            Self::Clean => ' ',
            Self::Modified => 'M',
            Self::Added => 'A',
            Self::Deleted => 'D',
            Self::Renamed => 'R',
            Self::Copied => 'C',
            Self::Untracked => '?',
            Self::Committed => '*',
        }
    }

    pub fn is_clean(self) -> bool {
        self == Self::Clean
    }

    /// Map one git status letter. Unmerged (`U`) and type changes (`T`) show as modified.
    fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'M' | 'U' | 'T' => Some(Self::Modified),
            'A' => Some(Self::Added),
            'D' => Some(Self::Deleted),
            'R' => Some(Self::Renamed),
            'C' => Some(Self::Copied),
            _ => None,
        }
    }
}

/// Changed paths, relative to the repository top level, with their status.
pub type StatusMap = FxHashMap<PathBuf, StatusCode>;

/// Parse `status --porcelain` output.
///
/// `??` is untracked and `!!` (ignored) is skipped. Otherwise the index column wins when it
/// carries a change, falling back to the working-tree column.
pub fn parse_porcelain(output: &str) -> StatusMap {
    let mut map = StatusMap::default();

    for line in output.lines() {
        if line.len() < 4 {
            continue;
        }
        let Some((xy, rest)) = line.split_at_checked(2) else {
            continue;
        };
        let Some(path_part) = rest.strip_prefix(' ') else {
            continue;
        };

        let status = if xy == "??" {
            StatusCode::Untracked
        } else if xy == "!!" {
            continue;
        } else {
            let mut chars = xy.chars();
            let (x, y) = (chars.next().unwrap_or(' '), chars.next().unwrap_or(' '));
            let letter = if x != ' ' && x != '?' { x } else { y };
            match StatusCode::from_letter(letter) {
                Some(status) => status,
                None => continue,
            }
        };

        let path = match path_part.rsplit_once(" -> ") {
            Some((_, new)) => new,
            None => path_part,
        };
        map.insert(PathBuf::from(unquote_path(path)), status);
    }

    map
}

/// Parse `diff --name-status` output.
pub fn parse_name_status(output: &str) -> StatusMap {
    let mut map = StatusMap::default();

    for line in output.lines() {
        let mut chars = line.chars();
        let Some(status) = chars.next().and_then(StatusCode::from_letter) else {
            continue;
        };

        let rest = chars.as_str().trim_start_matches(|c: char| c.is_ascii_digit());
        let fields: Vec<&str> = if rest.contains('\t') {
            rest.split('\t').filter(|f| !f.is_empty()).collect()
        } else {
            rest.split_whitespace().collect()
        };

        if let Some(path) = fields.last() {
            map.insert(PathBuf::from(unquote_path(path)), status);
        }
    }

    map
}

/// Combine a `diff --name-status <ref>` listing with live porcelain status.
///
/// A path in the diff keeps the diff's code only when the working tree has nothing to say
/// about it; then it is reported as [`StatusCode::Committed`]. A path with live changes
/// keeps the diff's code (it differs from the ref either way), and a path only the working
/// tree knows about (e.g. untracked) keeps its porcelain code.
pub fn merge_with_working(diff: StatusMap, working: StatusMap) -> StatusMap {
    let mut merged = StatusMap::default();

    for (path, status) in &diff {
        let code = if working.contains_key(path) {
            *status
        } else {
            StatusCode::Committed
        };
        merged.insert(path.clone(), code);
    }

    for (path, status) in working {
        merged.entry(path).or_insert(status);
    }

    merged
}

/// Undo git's C-style quoting (`"a\tb"`, `"caf\303\251"`). Unquoted input is returned as is.
pub fn unquote_path(raw: &str) -> String {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return raw.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner.bytes().peekable();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match iter.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b't') => bytes.push(b'\t'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b'a') => bytes.push(0x07),
            Some(b'b') => bytes.push(0x08),
            Some(b'f') => bytes.push(0x0c),
            Some(b'v') => bytes.push(0x0b),
            Some(d @ b'0'..=b'7') => {
                let mut value = u32::from(d - b'0');
                for _ in 0..2 {
                    match iter.peek() {
                        Some(&n @ b'0'..=b'7') => {
                            value = value * 8 + u32::from(n - b'0');
                            iter.next();
                        },
                        _ => break,
                    }
                }
                bytes.push((value & 0xff) as u8);
            },
            Some(other) => bytes.push(other),
            None => bytes.push(b'\\'),
        }
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(map: &StatusMap, path: &str) -> Option<StatusCode> {
        map.get(&PathBuf::from(path)).copied()
    }

    #[test]
    fn porcelain_rename_uses_destination() {
        let map = parse_porcelain("M  a.txt\nR  old.txt -> new.txt\n");
        assert_eq!(map.len(), 2);
        assert_eq!(get(&map, "a.txt"), Some(StatusCode::Modified));
        assert_eq!(get(&map, "new.txt"), Some(StatusCode::Renamed));
        assert_eq!(get(&map, "old.txt"), None);
    }

    #[test]
    fn porcelain_columns() {
        let map = parse_porcelain(
            " M work.rs\nA  staged.rs\nAM both.rs\n D gone.rs\n?? new/file.rs\n!! target/x\n\
             UU conflict.rs\n",
        );
        assert_eq!(get(&map, "work.rs"), Some(StatusCode::Modified));
        assert_eq!(get(&map, "staged.rs"), Some(StatusCode::Added));
        assert_eq!(get(&map, "both.rs"), Some(StatusCode::Added));
        assert_eq!(get(&map, "gone.rs"), Some(StatusCode::Deleted));
        assert_eq!(get(&map, "new/file.rs"), Some(StatusCode::Untracked));
        assert_eq!(get(&map, "conflict.rs"), Some(StatusCode::Modified));
        assert_eq!(get(&map, "target/x"), None);
    }

    #[test]
    fn porcelain_quoted_paths() {
        let map = parse_porcelain("?? \"with space.txt\"\nR  \"a b\" -> \"caf\\303\\251.txt\"\n");
        assert_eq!(get(&map, "with space.txt"), Some(StatusCode::Untracked));
        assert_eq!(get(&map, "café.txt"), Some(StatusCode::Renamed));
    }

    #[test]
    fn name_status_tabs_and_scores() {
        let map = parse_name_status(
            "M\tsrc/lib.rs\nR100\told.rs\tnew.rs\nC75\tbase.rs\tcopy.rs\nA\tadded.rs\n\
             D\tremoved.rs\n",
        );
        assert_eq!(get(&map, "src/lib.rs"), Some(StatusCode::Modified));
        assert_eq!(get(&map, "new.rs"), Some(StatusCode::Renamed));
        assert_eq!(get(&map, "copy.rs"), Some(StatusCode::Copied));
        assert_eq!(get(&map, "added.rs"), Some(StatusCode::Added));
        assert_eq!(get(&map, "removed.rs"), Some(StatusCode::Deleted));
        assert_eq!(get(&map, "old.rs"), None);
        assert_eq!(get(&map, "base.rs"), None);
    }

    #[test]
    fn name_status_space_separated() {
        let map = parse_name_status("M a.txt\nR090 x.txt y.txt\n\n");
        assert_eq!(get(&map, "a.txt"), Some(StatusCode::Modified));
        assert_eq!(get(&map, "y.txt"), Some(StatusCode::Renamed));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn merge_marks_diff_only_paths_committed() {
        let diff = parse_name_status("M\tcommitted.rs\nA\tboth.rs\n");
        let working = parse_porcelain(" M both.rs\n?? scratch.txt\n");
        let merged = merge_with_working(diff, working);

        assert_eq!(get(&merged, "committed.rs"), Some(StatusCode::Committed));
        assert_eq!(get(&merged, "both.rs"), Some(StatusCode::Added));
        assert_eq!(get(&merged, "scratch.txt"), Some(StatusCode::Untracked));
    }

    #[test]
    fn unquote_escapes() {
        assert_eq!(unquote_path("plain.txt"), "plain.txt");
        assert_eq!(unquote_path("\"tab\\there\""), "tab\there");
        assert_eq!(unquote_path("\"quote\\\"d\""), "quote\"d");
        assert_eq!(unquote_path("\"back\\\\slash\""), "back\\slash");
    }

    #[test]
    fn glyphs() {
        assert_eq!(StatusCode::Clean.glyph(), ' ');
        assert_eq!(StatusCode::Untracked.glyph(), '?');
        assert!(StatusCode::default().is_clean());
    }
}
