use regex::Regex;
use tracing::debug;

use super::normalize::{FieldMap, normalize_field_key};
use super::pages::Boilerplate;
use super::patterns::Patterns;

const HEADER_VOCABULARY: &[&str] = &[
    "key", "keys", "name", "column", "columns", "data", "type", "max", "maximum", "length",
    "bytes", "size", "allow", "nulls", "null", "nullable", "identity", "default", "index",
    "unique", "fill", "factor", "foreign", "referenced", "references", "table", "update",
    "delete", "rule", "formula", "definition", "expression", "persisted", "computed", "is",
    "primary", "description", "on", "seed", "increment", "collation", "precision", "scale",
    "schema",
];

/// Candidate data lines of one section: blank and boilerplate lines removed, trailing
/// whitespace trimmed, leading indentation kept for positional slicing.
#[derive(Debug, Clone, Default)]
pub(crate) struct SectionLines {
    lines: Vec<String>,
}

impl SectionLines {
    pub fn new(text: &str, boilerplate: &Boilerplate) -> Self {
        let lines = text
            .lines()
            .map(str::trim_end)
            .filter(|line| !line.trim().is_empty())
            .filter(|line| !boilerplate.is_boilerplate(line))
            .map(ToOwned::to_owned)
            .collect();
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines that are not column-header rows, for the tiers without a layout.
    pub fn data_lines(&self) -> impl Iterator<Item = &str> {
        self.lines
            .iter()
            .map(String::as_str)
            .filter(|line| !looks_like_header(line))
    }
}

/// A line made only of header words, e.g. `Key Name Data Type (Bytes) Allow Nulls`.
pub(crate) fn looks_like_header(line: &str) -> bool {
    let mut words = 0usize;
    for token in line.split_whitespace() {
        let word = token
            .trim_matches(|character: char| !character.is_alphanumeric())
            .to_ascii_lowercase();
        if word.is_empty() {
            continue;
        }
        if !HEADER_VOCABULARY.contains(&word.as_str()) {
            return false;
        }
        words += 1;
    }
    words >= 2
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct HeaderField {
    key: String,
    start: usize,
}

/// Field names and character start offsets derived from a header line split on runs of
/// two or more spaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct HeaderLayout {
    fields: Vec<HeaderField>,
}

impl HeaderLayout {
    pub fn from_line(line: &str, cell_split: &Regex) -> Option<Self> {
        let mut fields = Vec::<HeaderField>::new();
        let mut cursor = 0usize;

        let push_segment = |from: usize, to: usize, fields: &mut Vec<HeaderField>| {
            let segment = &line[from..to];
            let trimmed = segment.trim_start();
            let label = trimmed.trim_end();
            if label.is_empty() {
                return;
            }
            let leading = segment.len() - trimmed.len();
            fields.push(HeaderField {
                key: normalize_field_key(label),
                start: line[..from + leading].chars().count(),
            });
        };

        for separator in cell_split.find_iter(line) {
            push_segment(cursor, separator.start(), &mut fields);
            cursor = separator.end();
        }
        push_segment(cursor, line.len(), &mut fields);

        if fields.len() < 2 {
            return None;
        }
        Some(Self { fields })
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.key.as_str())
    }

    /// Slices `line` at the header offsets. Boundaries falling inside a word move to the
    /// nearest whitespace so values wider than their header still land whole.
    pub fn slice(&self, line: &str) -> FieldMap {
        let chars = line.chars().collect::<Vec<char>>();
        let mut bounds = self
            .fields
            .iter()
            .map(|field| snap_boundary(&chars, field.start))
            .collect::<Vec<usize>>();
        for index in 1..bounds.len() {
            if bounds[index] < bounds[index - 1] {
                bounds[index] = bounds[index - 1];
            }
        }

        let mut values = FieldMap::new();
        for (index, field) in self.fields.iter().enumerate() {
            let start = bounds[index].min(chars.len());
            let end = bounds
                .get(index + 1)
                .copied()
                .unwrap_or(chars.len())
                .min(chars.len());
            if start >= end {
                continue;
            }
            let value = chars[start..end].iter().collect::<String>();
            let value = value.trim();
            if !value.is_empty() {
                values.insert(field.key.clone(), value.to_string());
            }
        }
        values
    }
}

fn snap_boundary(chars: &[char], position: usize) -> usize {
    let inside_word = |index: usize| {
        index > 0
            && index < chars.len()
            && !chars[index - 1].is_whitespace()
            && !chars[index].is_whitespace()
    };
    if !inside_word(position) {
        return position;
    }

    let mut backward = position;
    while inside_word(backward) {
        backward -= 1;
    }
    let mut forward = position;
    while inside_word(forward) {
        forward += 1;
    }

    if position - backward < forward - position {
        backward
    } else {
        forward
    }
}

/// Header-driven positional tier shared by the four section parsers: the first line
/// accepted by `accept` (given its lower-cased text) and splitting into at least two
/// fields becomes the layout; every later line is sliced and handed to `build`.
pub(crate) fn parse_with_header<T>(
    patterns: &Patterns,
    lines: &SectionLines,
    accept: impl Fn(&str) -> bool,
    build: impl Fn(&FieldMap, &str) -> Option<T>,
) -> Option<Vec<T>> {
    let (header_index, layout) = lines.lines().iter().enumerate().find_map(|(index, line)| {
        if !accept(&line.to_lowercase()) {
            return None;
        }
        HeaderLayout::from_line(line, &patterns.cell_split).map(|layout| (index, layout))
    })?;

    debug!(fields = ?layout.keys().collect::<Vec<&str>>(), "detected header layout");

    let records = lines.lines()[header_index + 1..]
        .iter()
        .filter(|line| {
            HeaderLayout::from_line(line, &patterns.cell_split).as_ref() != Some(&layout)
                && !looks_like_header(line)
        })
        .filter_map(|line| build(&layout.slice(line), line))
        .collect::<Vec<T>>();

    Some(records)
}

pub(crate) type Tier<T> = fn(&Patterns, &SectionLines) -> Option<Vec<T>>;

/// Runs tiers in order and keeps the first non-empty result.
pub(crate) fn run_tiers<T>(
    section: &str,
    tiers: &[(&'static str, Tier<T>)],
    patterns: &Patterns,
    lines: &SectionLines,
) -> Vec<T> {
    for (tier_name, tier) in tiers {
        match tier(patterns, lines) {
            Some(records) if !records.is_empty() => {
                debug!(section, tier = *tier_name, records = records.len(), "section parsed");
                return records;
            }
            _ => debug!(section, tier = *tier_name, "tier produced no records"),
        }
    }
    Vec::new()
}

/// Splits on runs of two or more spaces, falling back to single whitespace.
pub(crate) fn tokenize<'a>(patterns: &Patterns, line: &'a str) -> Vec<&'a str> {
    let wide = patterns
        .cell_split
        .split(line.trim())
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .collect::<Vec<&str>>();
    if wide.len() >= 2 {
        return wide;
    }
    line.split_whitespace().collect()
}
