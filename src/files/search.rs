//! Regex and literal search across the project tree.
//!
//! The query is compiled once into a [`Regex`]. Files are visited in
//! name-sorted order below the requested path, filtered by file-name globs
//! and an optional size expression, and scanned line by line. Each hit
//! carries up to `context_lines` lines on either side, clipped at the file
//! boundaries.
//!
//! Files are streamed through a [`BufReader`]; a file stops being read
//! once its match cap is reached and the last hit has its trailing context.
//! Binary files (a NUL byte in the first 8 KiB) and files with a non-UTF-8
//! line before that point are skipped without error and counted in
//! [`FileSearchReport::files_skipped`].

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use docctx_core::{Error, Result};
use globset::GlobSet;
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use tracing::debug;
use walkdir::WalkDir;

use super::{build_globset, ProjectGuard};

const BINARY_SNIFF_BYTES: usize = 8 * 1024;

#[derive(Debug, Clone)]
pub struct FileSearchOptions {
    /// File-name globs; empty means every file.
    pub patterns: Vec<String>,
    /// Directory levels below the search path; 0 searches only its direct files.
    pub depth: usize,
    pub case_sensitive: bool,
    pub regex: bool,
    pub context_lines: usize,
    pub max_matches_per_file: usize,
    pub max_total_matches: usize,
    /// Size expression such as `"> 1K"` or `"<= 2M"`.
    pub size: Option<String>,
}

impl Default for FileSearchOptions {
    fn default() -> Self {
        Self {
            patterns: Vec::new(),
            depth: 10,
            case_sensitive: false,
            regex: false,
            context_lines: 0,
            max_matches_per_file: 100,
            max_total_matches: 1000,
            size: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextLine {
    pub line_number: usize,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LineMatch {
    pub line_number: usize,
    pub line: String,
    pub before: Vec<ContextLine>,
    pub after: Vec<ContextLine>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileMatch {
    /// Relative to the project root.
    pub path: String,
    pub matches: Vec<LineMatch>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileSearchReport {
    pub matches: Vec<FileMatch>,
    pub files_scanned: usize,
    pub files_skipped: usize,
    pub total_matches: usize,
    /// The global cap stopped the walk with files left unvisited.
    pub truncated: bool,
}

// ============ Size filter ============

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparison {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
}

/// Parsed `"<op> <number><unit>"` expression; units K/M/G are base 1024.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeFilter {
    cmp: Comparison,
    bytes: u64,
}

impl SizeFilter {
    pub fn parse(expr: &str) -> Result<Self> {
        let invalid = || {
            Error::validation(format!(
                "Invalid size filter '{}': expected e.g. '> 1K', '<= 2M', '= 100'",
                expr
            ))
        };

        let trimmed = expr.trim();
        let (cmp, rest) = [
            ("<=", Comparison::Le),
            (">=", Comparison::Ge),
            ("<", Comparison::Lt),
            (">", Comparison::Gt),
            ("=", Comparison::Eq),
        ]
        .iter()
        .find_map(|(op, cmp)| trimmed.strip_prefix(*op).map(|rest| (*cmp, rest)))
        .unwrap_or((Comparison::Eq, trimmed));

        let rest = rest.trim();
        let (digits, unit) = match rest.find(|c: char| !c.is_ascii_digit()) {
            Some(idx) => rest.split_at(idx),
            None => (rest, ""),
        };
        let number: u64 = digits.parse().map_err(|_| invalid())?;
        let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
            "" | "B" => 1,
            "K" | "KB" => 1024,
            "M" | "MB" => 1024 * 1024,
            "G" | "GB" => 1024 * 1024 * 1024,
            _ => return Err(invalid()),
        };

        Ok(Self {
            cmp,
            bytes: number.checked_mul(multiplier).ok_or_else(invalid)?,
        })
    }

    pub fn accepts(&self, size: u64) -> bool {
        match self.cmp {
            Comparison::Lt => size < self.bytes,
            Comparison::Le => size <= self.bytes,
            Comparison::Gt => size > self.bytes,
            Comparison::Ge => size >= self.bytes,
            Comparison::Eq => size == self.bytes,
        }
    }
}

// ============ Matcher ============

/// Compile the query into a single pattern.
///
/// Regex queries written as `/pattern/flags` have their delimiters
/// stripped; `i`, `m`, `s` and `x` map onto the builder flags.
pub fn build_matcher(query: &str, regex: bool, case_sensitive: bool) -> Result<Regex> {
    if query.is_empty() {
        return Err(Error::validation("Query cannot be empty"));
    }

    let mut builder;
    let mut insensitive = !case_sensitive;
    if regex {
        let (pattern, flags) = split_delimited(query).unwrap_or((query, ""));
        builder = RegexBuilder::new(pattern);
        for flag in flags.chars() {
            match flag {
                'i' => insensitive = true,
                'm' => {
                    builder.multi_line(true);
                }
                's' => {
                    builder.dot_matches_new_line(true);
                }
                'x' => {
                    builder.ignore_whitespace(true);
                }
                _ => {}
            }
        }
    } else {
        builder = RegexBuilder::new(&regex::escape(query));
    }

    builder
        .case_insensitive(insensitive)
        .build()
        .map_err(|e| Error::validation(format!("Invalid regular expression: {}", e)))
}

fn split_delimited(query: &str) -> Option<(&str, &str)> {
    let body = query.strip_prefix('/')?;
    let end = body.rfind('/')?;
    let (pattern, flags) = (&body[..end], &body[end + 1..]);
    if pattern.is_empty() || !flags.chars().all(|c| "imsxu".contains(c)) {
        return None;
    }
    Some((pattern, flags))
}

// ============ Search ============

/// Search files under `path` (relative to the project root) for `query`.
pub fn search_files(
    guard: &ProjectGuard,
    path: &str,
    query: &str,
    options: &FileSearchOptions,
) -> Result<FileSearchReport> {
    if options.max_matches_per_file == 0 || options.max_total_matches == 0 {
        return Err(Error::validation("Match limits must be at least 1"));
    }
    let matcher = build_matcher(query, options.regex, options.case_sensitive)?;
    let names = if options.patterns.is_empty() {
        None
    } else {
        Some(build_globset(&options.patterns)?)
    };
    let size = options.size.as_deref().map(SizeFilter::parse).transpose()?;

    let resolved = guard.resolve(path)?;
    if !resolved.absolute.exists() {
        return Err(Error::NotFound(format!("Path '{}' does not exist", path)));
    }

    let mut report = FileSearchReport::default();

    let walker = WalkDir::new(&resolved.absolute)
        .max_depth(options.depth.saturating_add(1))
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !guard.excludes().is_excluded(&guard.relative(e.path())));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                debug!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = guard.relative(entry.path());
        if let Some(names) = &names {
            if !name_matches(names, entry.path(), &relative) {
                continue;
            }
        }
        if let Some(filter) = &size {
            match entry.metadata() {
                Ok(meta) if filter.accepts(meta.len()) => {}
                Ok(_) => continue,
                Err(_) => {
                    report.files_skipped += 1;
                    continue;
                }
            }
        }

        if report.total_matches >= options.max_total_matches {
            report.truncated = true;
            break;
        }

        let remaining = options.max_total_matches - report.total_matches;
        let cap = options.max_matches_per_file.min(remaining);
        let Some(matches) = scan_file(entry.path(), &matcher, options.context_lines, cap) else {
            report.files_skipped += 1;
            continue;
        };
        report.files_scanned += 1;
        if matches.is_empty() {
            continue;
        }

        report.total_matches += matches.len();
        report.matches.push(FileMatch {
            path: relative,
            matches,
        });
    }

    debug!(
        path = %resolved.relative,
        scanned = report.files_scanned,
        skipped = report.files_skipped,
        matches = report.total_matches,
        "file search finished"
    );
    Ok(report)
}

fn name_matches(names: &GlobSet, path: &Path, relative: &str) -> bool {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    names.is_match(&file_name) || names.is_match(relative)
}

/// Stream one file; `None` for unreadable, binary, or non-UTF-8 content.
fn scan_file(path: &Path, matcher: &Regex, context: usize, cap: usize) -> Option<Vec<LineMatch>> {
    let mut reader = BufReader::with_capacity(BINARY_SNIFF_BYTES, File::open(path).ok()?);
    let head = reader.fill_buf().ok()?;
    if head.contains(&0) {
        return None;
    }
    scan_lines(reader, matcher, context, cap)
}

fn scan_lines<R: BufRead>(
    reader: R,
    matcher: &Regex,
    context: usize,
    cap: usize,
) -> Option<Vec<LineMatch>> {
    let mut out: Vec<LineMatch> = Vec::new();
    let mut before: VecDeque<ContextLine> = VecDeque::with_capacity(context + 1);

    for (idx, line) in reader.lines().enumerate() {
        let line = line.ok()?;
        let line_number = idx + 1;

        // Hits still short of trailing context are always the newest ones.
        for pending in out.iter_mut().rev() {
            if pending.after.len() >= context {
                break;
            }
            pending.after.push(ContextLine {
                line_number,
                text: line.clone(),
            });
        }

        if out.len() < cap && matcher.is_match(&line) {
            out.push(LineMatch {
                line_number,
                line: line.clone(),
                before: before.iter().cloned().collect(),
                after: Vec::new(),
            });
        }

        if out.len() >= cap && out.last().is_some_and(|m| m.after.len() >= context) {
            break;
        }

        if context > 0 {
            if before.len() == context {
                before.pop_front();
            }
            before.push_back(ContextLine {
                line_number,
                text: line,
            });
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::files::ExcludeRegistry;
    use std::fs;
    use tempfile::TempDir;

    fn project(files: &[(&str, &str)]) -> (TempDir, ProjectGuard) {
        let tmp = TempDir::new().unwrap();
        for (path, content) in files {
            let full = tmp.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let guard = ProjectGuard::new(tmp.path(), ExcludeRegistry::empty()).unwrap();
        (tmp, guard)
    }

    fn numbered(lines: usize, special: usize, text: &str) -> String {
        (1..=lines)
            .map(|n| {
                if n == special {
                    text.to_string()
                } else {
                    format!("line {}", n)
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_literal_match_with_context() {
        let (_tmp, guard) = project(&[("src/a.rs", &numbered(8, 5, "// TODO: fix"))]);
        let options = FileSearchOptions {
            context_lines: 1,
            ..Default::default()
        };

        let report = search_files(&guard, ".", "TODO", &options).unwrap();
        assert_eq!(report.total_matches, 1);
        let hit = &report.matches[0];
        assert_eq!(hit.path, "src/a.rs");
        assert_eq!(hit.matches[0].line_number, 5);
        assert_eq!(hit.matches[0].line, "// TODO: fix");
        assert_eq!(
            hit.matches[0].before,
            vec![ContextLine {
                line_number: 4,
                text: "line 4".to_string()
            }]
        );
        assert_eq!(hit.matches[0].after[0].line_number, 6);
    }

    #[test]
    fn test_context_clipped_at_file_edges() {
        let (_tmp, guard) = project(&[("a.txt", "match\nsecond")]);
        let options = FileSearchOptions {
            context_lines: 3,
            ..Default::default()
        };
        let report = search_files(&guard, ".", "match", &options).unwrap();
        let hit = &report.matches[0].matches[0];
        assert!(hit.before.is_empty());
        assert_eq!(hit.after.len(), 1);
    }

    #[test]
    fn test_literal_escapes_special_characters() {
        let (_tmp, guard) = project(&[("a.txt", "a.b\naxb\n")]);
        let report = search_files(&guard, ".", "a.b", &FileSearchOptions::default()).unwrap();
        assert_eq!(report.total_matches, 1);

        let regex = FileSearchOptions {
            regex: true,
            ..Default::default()
        };
        let report = search_files(&guard, ".", "a.b", &regex).unwrap();
        assert_eq!(report.total_matches, 2);
    }

    #[test]
    fn test_case_sensitivity_and_delimited_flags() {
        let (_tmp, guard) = project(&[("a.txt", "Error\nerror\n")]);
        let sensitive = FileSearchOptions {
            case_sensitive: true,
            regex: true,
            ..Default::default()
        };
        assert_eq!(
            search_files(&guard, ".", "^error$", &sensitive)
                .unwrap()
                .total_matches,
            1
        );
        assert_eq!(
            search_files(&guard, ".", "/^error$/i", &sensitive)
                .unwrap()
                .total_matches,
            2
        );
        assert_eq!(
            search_files(&guard, ".", "ERROR", &FileSearchOptions::default())
                .unwrap()
                .total_matches,
            2
        );
    }

    #[test]
    fn test_caps_and_truncation() {
        let many = "hit\n".repeat(10);
        let (_tmp, guard) = project(&[("a.txt", &many), ("b.txt", &many), ("c.txt", &many)]);
        let options = FileSearchOptions {
            max_matches_per_file: 4,
            max_total_matches: 6,
            ..Default::default()
        };
        let report = search_files(&guard, ".", "hit", &options).unwrap();

        let paths: Vec<&str> = report.matches.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["a.txt", "b.txt"]);
        assert_eq!(report.matches[0].matches.len(), 4);
        assert_eq!(report.matches[1].matches.len(), 2);
        assert_eq!(report.total_matches, 6);
        assert!(report.truncated);
        assert_eq!(report.files_scanned, 2);
    }

    #[test]
    fn test_cap_reached_on_last_file_is_not_truncated() {
        let (_tmp, guard) = project(&[("a.txt", "hit\nhit\n"), ("b.txt", "hit\n")]);
        let options = FileSearchOptions {
            max_total_matches: 3,
            ..Default::default()
        };
        let report = search_files(&guard, ".", "hit", &options).unwrap();
        assert_eq!(report.total_matches, 3);
        assert!(!report.truncated);
    }

    #[test]
    fn test_large_file_stops_reading_at_cap() {
        let (tmp, guard) = project(&[]);
        let mut big = b"needle one\nneedle two\nafter\n".to_vec();
        big.extend("filler line\n".repeat(200_000).into_bytes());
        // Invalid UTF-8 far past the cap: reaching it would skip the file.
        big.extend_from_slice(b"needle \xff\xfe\n");
        fs::write(tmp.path().join("big.log"), &big).unwrap();

        let options = FileSearchOptions {
            context_lines: 1,
            max_matches_per_file: 1,
            ..Default::default()
        };
        let report = search_files(&guard, ".", "needle", &options).unwrap();
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.files_skipped, 0);
        assert_eq!(report.total_matches, 1);
        let hit = &report.matches[0].matches[0];
        assert_eq!(hit.line_number, 1);
        assert_eq!(hit.after[0].text, "needle two");
    }

    #[test]
    fn test_context_between_adjacent_hits() {
        let (_tmp, guard) = project(&[("a.txt", "x\nhit a\nhit b\ny\nz\n")]);
        let options = FileSearchOptions {
            context_lines: 2,
            ..Default::default()
        };
        let report = search_files(&guard, ".", "hit", &options).unwrap();
        let hits = &report.matches[0].matches;
        assert_eq!(hits.len(), 2);
        let text = |lines: &[ContextLine]| lines.iter().map(|c| c.text.clone()).collect::<Vec<_>>();
        assert_eq!(text(&hits[0].before), vec!["x"]);
        assert_eq!(text(&hits[0].after), vec!["hit b", "y"]);
        assert_eq!(text(&hits[1].before), vec!["x", "hit a"]);
        assert_eq!(text(&hits[1].after), vec!["y", "z"]);
    }

    #[test]
    fn test_depth_and_patterns() {
        let (_tmp, guard) = project(&[
            ("top.rs", "needle"),
            ("top.md", "needle"),
            ("one/mid.rs", "needle"),
            ("one/two/deep.rs", "needle"),
        ]);

        let shallow = FileSearchOptions {
            depth: 0,
            ..Default::default()
        };
        let report = search_files(&guard, ".", "needle", &shallow).unwrap();
        assert_eq!(report.matches.len(), 2);

        let rust_only = FileSearchOptions {
            depth: 1,
            patterns: vec!["*.rs".to_string()],
            ..Default::default()
        };
        let report = search_files(&guard, ".", "needle", &rust_only).unwrap();
        let paths: Vec<&str> = report.matches.iter().map(|m| m.path.as_str()).collect();
        assert_eq!(paths, vec!["one/mid.rs", "top.rs"]);
    }

    #[test]
    fn test_binary_files_are_skipped() {
        let (tmp, guard) = project(&[("text.txt", "needle")]);
        fs::write(tmp.path().join("blob.bin"), b"needle\0\x01\x02").unwrap();
        fs::write(tmp.path().join("latin1.txt"), b"needle \xe9t\xe9").unwrap();

        let report = search_files(&guard, ".", "needle", &FileSearchOptions::default()).unwrap();
        assert_eq!(report.total_matches, 1);
        assert_eq!(report.files_scanned, 1);
        assert_eq!(report.files_skipped, 2);
    }

    #[test]
    fn test_excluded_directories_are_pruned() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("secrets")).unwrap();
        fs::write(tmp.path().join("secrets/key.txt"), "needle").unwrap();
        fs::write(tmp.path().join("open.txt"), "needle").unwrap();
        let guard = ProjectGuard::new(
            tmp.path(),
            ExcludeRegistry::new(&["secrets".to_string()]).unwrap(),
        )
        .unwrap();

        let report = search_files(&guard, ".", "needle", &FileSearchOptions::default()).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].path, "open.txt");

        let err = search_files(&guard, "secrets", "needle", &FileSearchOptions::default())
            .unwrap_err();
        assert!(matches!(err, Error::Exclusion(_)));
    }

    #[test]
    fn test_size_filter() {
        let (_tmp, guard) = project(&[("small.txt", "needle"), ("big.txt", &"needle\n".repeat(300))]);
        let options = FileSearchOptions {
            size: Some("> 1K".to_string()),
            max_matches_per_file: 1,
            ..Default::default()
        };
        let report = search_files(&guard, ".", "needle", &options).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].path, "big.txt");
    }

    #[test]
    fn test_size_filter_parse() {
        assert!(SizeFilter::parse("> 1K").unwrap().accepts(1025));
        assert!(!SizeFilter::parse("> 1K").unwrap().accepts(1024));
        assert!(SizeFilter::parse("<=2M").unwrap().accepts(2 * 1024 * 1024));
        assert!(SizeFilter::parse("100").unwrap().accepts(100));
        assert!(SizeFilter::parse("> lots").is_err());
        assert!(SizeFilter::parse("> 1T").is_err());
    }

    #[test]
    fn test_invalid_inputs() {
        let (_tmp, guard) = project(&[("a.txt", "x")]);
        let regex = FileSearchOptions {
            regex: true,
            ..Default::default()
        };
        assert!(matches!(
            search_files(&guard, ".", "(", &regex).unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            search_files(&guard, ".", "", &FileSearchOptions::default()).unwrap_err(),
            Error::Validation(_)
        ));
        assert!(matches!(
            search_files(&guard, "missing", "x", &FileSearchOptions::default()).unwrap_err(),
            Error::NotFound(_)
        ));
    }

    #[test]
    fn test_single_file_path() {
        let (_tmp, guard) = project(&[("a.txt", "needle"), ("b.txt", "needle")]);
        let report = search_files(&guard, "b.txt", "needle", &FileSearchOptions::default()).unwrap();
        assert_eq!(report.matches.len(), 1);
        assert_eq!(report.matches[0].path, "b.txt");
    }
}
