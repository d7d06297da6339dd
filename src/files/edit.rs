//! Line-based file editing: delete line ranges, insert content at anchors.
//!
//! Both operations read the whole file, rebuild the line list, and write it
//! back with the file's original line ending and trailing-newline state.
//! Line numbers are 1-based and always refer to the file as it was before
//! the call.

use std::collections::BTreeSet;
use std::fmt;

use docctx_core::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::ProjectGuard;

/// Anchor value meaning "after the last line".
pub const END_OF_FILE: i64 = -1;

/// What to do with deletion targets past the end of the file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutOfRangePolicy {
    /// Skip them and report them in the outcome.
    #[default]
    Ignore,
    /// Reject the whole request; the file is left untouched.
    Fail,
}

/// Where insertions go relative to their anchor line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    Before,
    #[default]
    After,
}

impl Position {
    pub fn try_from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "before" => Some(Position::Before),
            "after" => Some(Position::After),
            _ => None,
        }
    }
}

/// Delete `line`, or the inclusive range `line..=to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct DeleteSpec {
    pub line: i64,
    #[serde(default)]
    pub to: Option<i64>,
}

/// Insert `content` at `line` (1-based, or [`END_OF_FILE`]).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Insertion {
    pub line: i64,
    pub content: String,
}

/// Inclusive run of requested lines that lie past the end of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SkippedRange {
    pub from: i64,
    pub to: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub path: String,
    pub deleted_lines: Vec<usize>,
    /// Requested ranges past the end of the file (ignore policy only).
    pub skipped: Vec<SkippedRange>,
    pub line_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertOutcome {
    pub path: String,
    pub inserted_lines: usize,
    pub line_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineEnding {
    Lf,
    CrLf,
    Cr,
}

impl LineEnding {
    fn detect(text: &str) -> Self {
        match text.find(['\r', '\n']) {
            Some(idx) if text[idx..].starts_with("\r\n") => LineEnding::CrLf,
            Some(idx) if text[idx..].starts_with('\r') => LineEnding::Cr,
            _ => LineEnding::Lf,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::Cr => "\r",
        }
    }
}

/// A file split into lines, remembering how to put it back together.
struct LineBuffer {
    lines: Vec<String>,
    ending: LineEnding,
    trailing_newline: bool,
}

impl LineBuffer {
    fn parse(text: &str) -> Self {
        let ending = LineEnding::detect(text);
        let trailing_newline = text.ends_with('\n') || text.ends_with('\r');
        let mut lines = split_lines(text);
        if trailing_newline || text.is_empty() {
            lines.pop();
        }
        Self {
            lines,
            ending,
            trailing_newline,
        }
    }

    fn render(&self, lines: &[String]) -> String {
        if lines.is_empty() {
            return String::new();
        }
        let mut out = lines.join(self.ending.as_str());
        if self.trailing_newline {
            out.push_str(self.ending.as_str());
        }
        out
    }
}

/// Split on `\r\n`, `\r` or `\n`. A trailing break yields a final empty item.
fn split_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\r' => {
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
                lines.push(std::mem::take(&mut current));
            }
            '\n' => lines.push(std::mem::take(&mut current)),
            other => current.push(other),
        }
    }
    lines.push(current);
    lines
}

fn content_lines(content: &str) -> Vec<String> {
    let mut lines = split_lines(content);
    if lines.len() > 1 && lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    lines
}

struct LineRange(i64, i64);

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == self.1 {
            write!(f, "line {}", self.0)
        } else {
            write!(f, "lines {}-{}", self.0, self.1)
        }
    }
}

/// Validate deletion specs and return them as `(from, to)` pairs.
fn validate_deletions(specs: &[DeleteSpec]) -> Result<Vec<(i64, i64)>> {
    if specs.is_empty() {
        return Err(Error::validation("At least one line to delete is required"));
    }
    specs
        .iter()
        .map(|spec| {
            let to = spec.to.unwrap_or(spec.line);
            if spec.line < 1 {
                return Err(Error::validation(format!(
                    "Invalid line number {}: lines start at 1",
                    spec.line
                )));
            }
            if to < spec.line {
                return Err(Error::validation(format!(
                    "Invalid range {}-{}: end is before start",
                    spec.line, to
                )));
            }
            Ok((spec.line, to))
        })
        .collect()
}

/// Split ranges at the end of the file: in-range lines as a sorted set,
/// the rest as merged inclusive ranges.
fn split_at_end(ranges: &[(i64, i64)], total: usize) -> (BTreeSet<usize>, Vec<SkippedRange>) {
    let last = total as i64;
    let mut in_range = BTreeSet::new();
    let mut beyond: Vec<(i64, i64)> = Vec::new();
    for &(from, to) in ranges {
        if from <= last {
            in_range.extend(from as usize..=to.min(last) as usize);
        }
        if to > last {
            beyond.push((from.max(last + 1), to));
        }
    }

    beyond.sort_unstable();
    let mut skipped: Vec<SkippedRange> = Vec::new();
    for (from, to) in beyond {
        match skipped.last_mut() {
            Some(prev) if from <= prev.to.saturating_add(1) => prev.to = prev.to.max(to),
            _ => skipped.push(SkippedRange { from, to }),
        }
    }
    (in_range, skipped)
}

fn read_file(guard: &ProjectGuard, path: &str) -> Result<(super::ResolvedPath, LineBuffer)> {
    let resolved = guard.resolve_file(path)?;
    let bytes = std::fs::read(&resolved.absolute)?;
    let text = String::from_utf8(bytes)
        .map_err(|_| Error::validation(format!("File '{}' is not valid UTF-8 text", path)))?;
    Ok((resolved, LineBuffer::parse(&text)))
}

/// Remove the lines named by `specs` from the file at `path`.
///
/// Ranges are clipped to the file length before anything is expanded, so
/// the work done is bounded by the file, not by the request.
pub fn delete_lines(
    guard: &ProjectGuard,
    path: &str,
    specs: &[DeleteSpec],
    policy: OutOfRangePolicy,
) -> Result<DeleteOutcome> {
    let ranges = validate_deletions(specs)?;
    let (resolved, buffer) = read_file(guard, path)?;
    let total = buffer.lines.len();
    let (remove, skipped) = split_at_end(&ranges, total);

    if policy == OutOfRangePolicy::Fail {
        if let (Some(first), Some(last)) = (skipped.first(), skipped.last()) {
            return Err(Error::validation(format!(
                "Cannot delete {}: file has {} lines",
                LineRange(first.from, last.to),
                total
            )));
        }
    }

    let kept: Vec<String> = buffer
        .lines
        .iter()
        .enumerate()
        .filter(|(idx, _)| !remove.contains(&(idx + 1)))
        .map(|(_, line)| line.clone())
        .collect();

    std::fs::write(&resolved.absolute, buffer.render(&kept))?;

    if !skipped.is_empty() {
        debug!(path = %resolved.relative, skipped = ?skipped, "ignored out-of-range lines");
    }
    info!(
        path = %resolved.relative,
        deleted = remove.len(),
        "deleted lines"
    );

    Ok(DeleteOutcome {
        path: resolved.relative,
        deleted_lines: remove.into_iter().collect(),
        skipped,
        line_count: kept.len(),
    })
}

/// Insert each item's content at its anchor line.
///
/// With [`Position::Before`] the content lands above the anchor line, with
/// [`Position::After`] below it. [`END_OF_FILE`] always appends. Items that
/// share an anchor keep their request order.
pub fn insert_content(
    guard: &ProjectGuard,
    path: &str,
    insertions: &[Insertion],
    position: Position,
) -> Result<InsertOutcome> {
    if insertions.is_empty() {
        return Err(Error::validation("At least one insertion is required"));
    }
    let (resolved, buffer) = read_file(guard, path)?;
    let total = buffer.lines.len();

    for item in insertions {
        if item.line == END_OF_FILE {
            continue;
        }
        if item.line < 1 {
            return Err(Error::validation(format!(
                "Invalid line number {}: use a line from 1 or -1 for end of file",
                item.line
            )));
        }
        if item.line as usize > total {
            return Err(Error::validation(format!(
                "Line {} is beyond the end of the file ({} lines)",
                item.line, total
            )));
        }
    }

    let at = |anchor: usize| {
        insertions
            .iter()
            .filter(move |item| item.line == anchor as i64)
            .flat_map(|item| content_lines(&item.content))
    };

    let mut out: Vec<String> = Vec::with_capacity(total + insertions.len());
    for (idx, line) in buffer.lines.iter().enumerate() {
        let anchor = idx + 1;
        if position == Position::Before {
            out.extend(at(anchor));
        }
        out.push(line.clone());
        if position == Position::After {
            out.extend(at(anchor));
        }
    }
    out.extend(
        insertions
            .iter()
            .filter(|item| item.line == END_OF_FILE)
            .flat_map(|item| content_lines(&item.content)),
    );

    let inserted = out.len() - total;
    std::fs::write(&resolved.absolute, buffer.render(&out))?;
    info!(path = %resolved.relative, inserted, "inserted lines");

    Ok(InsertOutcome {
        path: resolved.relative,
        inserted_lines: inserted,
        line_count: out.len(),
    })
}
