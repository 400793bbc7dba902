use crate::model::Index;

use super::layout::{SectionLines, Tier, parse_with_header, run_tiers, tokenize};
use super::normalize::{FieldMap, index_from_fields, parse_bool};
use super::patterns::Patterns;

const TIERS: &[(&str, Tier<Index>)] = &[
    ("header", from_header as Tier<Index>),
    ("pattern", from_pattern as Tier<Index>),
    ("tokens", from_tokens as Tier<Index>),
];

pub(crate) fn parse_indexes(patterns: &Patterns, section_text: &str) -> Vec<Index> {
    let lines = SectionLines::new(section_text, &patterns.boilerplate);
    run_tiers("indexes", TIERS, patterns, &lines)
}

fn from_header(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<Index>> {
    parse_with_header(
        patterns,
        lines,
        |header| header.contains("name") && header.contains("columns"),
        |fields, _| index_from_fields(patterns, fields),
    )
}

fn from_pattern(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<Index>> {
    let indexes = lines
        .data_lines()
        .filter_map(|line| {
            let captures = patterns.index_row.captures(line)?;
            let mut fields = FieldMap::new();
            for (group, key) in [
                ("name", "name"),
                ("columns", "key_columns"),
                ("unique", "unique"),
                ("kind", "index_type"),
                ("fill", "fill_factor"),
            ] {
                if let Some(value) = captures.name(group) {
                    fields.insert(key.to_string(), value.as_str().trim().to_string());
                }
            }
            index_from_fields(patterns, &fields)
        })
        .collect::<Vec<Index>>();
    Some(indexes)
}

/// Name, key columns, then an optional uniqueness flag or index type, then fill factor.
fn from_tokens(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<Index>> {
    let indexes = lines
        .data_lines()
        .filter_map(|line| {
            let tokens = tokenize(patterns, line);
            if tokens.len() < 2 {
                return None;
            }

            let mut fields = FieldMap::new();
            fields.insert("name".to_string(), tokens[0].to_string());
            fields.insert("key_columns".to_string(), tokens[1].to_string());

            for token in &tokens[2..] {
                if token.eq_ignore_ascii_case("unique") || parse_bool(Some(*token)).is_some() {
                    fields
                        .entry("unique".to_string())
                        .or_insert_with(|| token.to_string());
                } else if token.chars().all(|character| character.is_ascii_digit()) {
                    fields.insert("fill_factor".to_string(), token.to_string());
                } else {
                    fields
                        .entry("index_type".to_string())
                        .or_insert_with(|| token.to_string());
                }
            }

            index_from_fields(patterns, &fields)
        })
        .collect::<Vec<Index>>();
    Some(indexes)
}
