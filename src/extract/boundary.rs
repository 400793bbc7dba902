use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use crate::model::{QualifiedName, TocEntry};

use super::pages::PagedText;
use super::patterns::Patterns;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryOptions {
    /// Printed page numbers in the TOC lag the physical pages by this much.
    pub page_offset: i64,
    pub search_radius: usize,
    pub max_pages_per_table: usize,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            page_offset: 2,
            search_radius: 2,
            max_pages_per_table: 5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerMatch {
    /// Qualified name opening a line.
    Heading,
    /// Qualified name elsewhere on a line.
    Inline,
    /// Schema and table words on one line, not joined.
    Loose,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableScan {
    pub table: String,
    pub declared_page: u32,
    pub expected_page: i64,
    pub actual_page: Option<usize>,
    pub drift: Option<i64>,
    pub match_kind: Option<MarkerMatch>,
    pub ambiguous_candidates: usize,
    pub pages_read: usize,
    pub ended_at_next_marker: bool,
    pub skipped: bool,
    #[serde(skip)]
    pub definition: Option<String>,
}

impl TableScan {
    fn unresolved(entry: &TocEntry, expected_page: i64) -> Self {
        Self {
            table: entry.name.to_string(),
            declared_page: entry.declared_page,
            expected_page,
            actual_page: None,
            drift: None,
            match_kind: None,
            ambiguous_candidates: 0,
            pages_read: 0,
            ended_at_next_marker: false,
            skipped: false,
            definition: None,
        }
    }

    pub(crate) fn skipped(entry: &TocEntry, options: &BoundaryOptions) -> Self {
        Self {
            skipped: true,
            ..Self::unresolved(entry, expected_page(entry, options))
        }
    }
}

pub(crate) fn expected_page(entry: &TocEntry, options: &BoundaryOptions) -> i64 {
    i64::from(entry.declared_page) + options.page_offset
}

/// Compiled recognizers for one table's name inside page text.
#[derive(Debug, Clone)]
pub(crate) struct TableMarker {
    heading: Regex,
    inline: Regex,
    schema_word: Regex,
    table_word: Regex,
}

impl TableMarker {
    pub fn new(name: &QualifiedName) -> Result<Self> {
        let schema = regex::escape(&name.schema);
        let table = regex::escape(&name.table);
        let qualified = format!(r"\[?{schema}\]?\.\[?{table}\]?");
        // Neither `.column` nor a longer identifier may follow.
        let tail = r"(?:$|[^\w.\[\]$#@])";

        Ok(Self {
            heading: Regex::new(&format!(
                r"(?i)^\s*(?:\d+(?:\.\d+)*\.?\s+)?(?:table\s*:?\s*)?{qualified}{tail}"
            ))
            .with_context(|| format!("failed to compile heading marker for {name}"))?,
            inline: Regex::new(&format!(r"(?i)(?:^|[^\w.\[\]$#@]){qualified}{tail}"))
                .with_context(|| format!("failed to compile inline marker for {name}"))?,
            schema_word: Regex::new(&format!(r"(?i)\b{schema}\b"))
                .with_context(|| format!("failed to compile schema marker for {name}"))?,
            table_word: Regex::new(&format!(r"(?i)\b{table}\b"))
                .with_context(|| format!("failed to compile table marker for {name}"))?,
        })
    }

    pub fn is_heading(&self, line: &str) -> bool {
        self.heading.is_match(line)
    }

    pub fn is_strong(&self, line: &str) -> bool {
        self.inline.is_match(line)
    }

    pub fn is_loose(&self, line: &str) -> bool {
        self.schema_word.is_match(line) && self.table_word.is_match(line)
    }
}

/// `(page index, line index)` inside a `PagedText`.
type Position = (usize, usize);

/// Locates and collects the definition of `entry` around its expected page. `next` is the
/// marker of the following TOC entry, whose heading ends the definition.
pub(crate) fn scan_table(
    patterns: &Patterns,
    paged: &PagedText,
    entry: &TocEntry,
    marker: &TableMarker,
    next: Option<&TableMarker>,
    options: &BoundaryOptions,
) -> TableScan {
    let expected = expected_page(entry, options);
    let mut scan = TableScan::unresolved(entry, expected);

    let window = search_window(paged, expected, options.search_radius);
    if window.is_empty() {
        warn!(table = %entry.name, expected_page = expected, "expected page outside document");
        return scan;
    }

    let page_lines = |index: usize| {
        paged
            .get(index)
            .map(|page| page.text.lines().collect::<Vec<&str>>())
            .unwrap_or_default()
    };
    let find_all = |predicate: &dyn Fn(&str) -> bool| -> Vec<Position> {
        window
            .iter()
            .flat_map(|page_index| {
                page_lines(*page_index)
                    .into_iter()
                    .enumerate()
                    .filter(|(_, line)| !patterns.toc_line.is_match(line) && predicate(*line))
                    .map(move |(line_index, _)| (*page_index, line_index))
                    .collect::<Vec<Position>>()
            })
            .collect()
    };

    let mut candidates = find_all(&|line: &str| marker.is_heading(line));
    let mut match_kind = MarkerMatch::Heading;
    if candidates.is_empty() {
        candidates = find_all(&|line: &str| marker.is_strong(line));
        match_kind = MarkerMatch::Inline;
    }
    if candidates.is_empty() {
        candidates = find_all(&|line: &str| marker.is_loose(line)).into_iter().take(1).collect();
        match_kind = MarkerMatch::Loose;
    }

    let Some(&start) = candidates.first() else {
        warn!(
            table = %entry.name,
            declared_page = entry.declared_page,
            expected_page = expected,
            "table definition not found"
        );
        return scan;
    };

    let (definition, end, pages_read, ended_at_next_marker) =
        collect_definition(patterns, paged, start, next, options.max_pages_per_table);

    // Other candidates inside the collected text are continuation headings of this table.
    let ambiguous = candidates.iter().filter(|position| **position >= end).count();
    if ambiguous > 0 {
        warn!(
            table = %entry.name,
            candidates = ambiguous + 1,
            "multiple start markers in search window; using the first"
        );
    }

    let actual_page = paged.get(start.0).map(|page| page.number);
    scan.actual_page = actual_page;
    scan.drift = actual_page.and_then(|page| i64::try_from(page).ok()).map(|page| page - expected);
    scan.match_kind = Some(match_kind);
    scan.ambiguous_candidates = ambiguous;
    scan.pages_read = pages_read;
    scan.ended_at_next_marker = ended_at_next_marker;
    scan.definition = Some(definition);

    debug!(
        table = %entry.name,
        actual_page = ?scan.actual_page,
        drift = ?scan.drift,
        pages_read,
        "table located"
    );
    scan
}

/// Page indexes whose page numbers fall in `expected ± radius`, in page order.
fn search_window(paged: &PagedText, expected: i64, radius: usize) -> Vec<usize> {
    let radius = i64::try_from(radius).unwrap_or(i64::MAX);
    let mut window = (expected.saturating_sub(radius)..=expected.saturating_add(radius))
        .filter(|number| *number >= 1)
        .filter_map(|number| usize::try_from(number).ok())
        .filter_map(|number| paged.index_of(number))
        .collect::<Vec<usize>>();
    window.sort_unstable();
    window.dedup();
    window
}

fn collect_definition(
    patterns: &Patterns,
    paged: &PagedText,
    start: Position,
    next: Option<&TableMarker>,
    max_pages: usize,
) -> (String, Position, usize, bool) {
    let mut lines = Vec::<&str>::new();
    let mut pages_read = 0usize;
    let last_page = start.0.saturating_add(max_pages.max(1));

    for page_index in start.0..last_page.min(paged.len()) {
        let Some(page) = paged.get(page_index) else {
            break;
        };
        pages_read += 1;
        let skip = if page_index == start.0 { start.1 } else { 0 };

        for (line_index, line) in page.text.lines().enumerate().skip(skip) {
            let is_start_line = (page_index, line_index) == start;
            if !is_start_line
                && let Some(next) = next
                && next.is_heading(line)
                && !patterns.toc_line.is_match(line)
            {
                return (lines.join("\n"), (page_index, line_index), pages_read, true);
            }
            if !is_start_line && patterns.boilerplate.is_boilerplate(line) {
                continue;
            }
            lines.push(line);
        }
    }

    (lines.join("\n"), (last_page, 0), pages_read, false)
}
