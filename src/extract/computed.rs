use crate::model::ComputedColumn;

use super::layout::{SectionLines, Tier, parse_with_header, run_tiers, tokenize};
use super::normalize::{FieldMap, computed_from_fields, is_balanced, parse_bool};
use super::patterns::Patterns;

const TIERS: &[(&str, Tier<ComputedColumn>)] = &[
    ("header", from_header as Tier<ComputedColumn>),
    ("pattern", from_pattern as Tier<ComputedColumn>),
    ("tokens", from_tokens as Tier<ComputedColumn>),
];

pub(crate) fn parse_computed_columns(patterns: &Patterns, section_text: &str) -> Vec<ComputedColumn> {
    let lines = SectionLines::new(section_text, &patterns.boilerplate);
    run_tiers("computed_columns", TIERS, patterns, &lines)
}

fn from_header(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<ComputedColumn>> {
    parse_with_header(
        patterns,
        lines,
        |header| {
            header.contains("name")
                && (header.contains("formula")
                    || header.contains("definition")
                    || header.contains("expression"))
        },
        |fields, _| computed_from_fields(fields),
    )
}

fn from_pattern(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<ComputedColumn>> {
    let computed = lines
        .data_lines()
        .filter_map(|line| {
            let captures = patterns.computed_row.captures(line)?;
            let mut fields = FieldMap::new();
            for (group, key) in [
                ("name", "name"),
                ("formula", "formula"),
                ("type", "data_type"),
                ("persisted", "persisted"),
            ] {
                if let Some(value) = captures.name(group) {
                    fields.insert(key.to_string(), value.as_str().trim().to_string());
                }
            }
            computed_from_fields(&fields)
        })
        .collect::<Vec<ComputedColumn>>();
    Some(computed)
}

fn from_tokens(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<ComputedColumn>> {
    let computed = lines
        .data_lines()
        .filter_map(|line| {
            let mut tokens = tokenize(patterns, line);
            if tokens.len() < 2 {
                return None;
            }

            let mut fields = FieldMap::new();
            fields.insert("name".to_string(), tokens.remove(0).to_string());
            if let Some(last) = tokens.last()
                && parse_bool(Some(*last)).is_some()
                && tokens.len() > 1
            {
                fields.insert("persisted".to_string(), last.to_string());
                tokens.pop();
            }
            if tokens.len() > 1
                && let Some(last) = tokens.last()
                && last.starts_with(char::is_alphabetic)
                && is_balanced(last)
            {
                fields.insert("data_type".to_string(), last.to_string());
                tokens.pop();
            }
            fields.insert("formula".to_string(), tokens.join(" "));
            computed_from_fields(&fields)
        })
        .collect::<Vec<ComputedColumn>>();
    Some(computed)
}
