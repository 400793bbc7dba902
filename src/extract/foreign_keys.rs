use crate::model::ForeignKey;

use super::layout::{SectionLines, Tier, parse_with_header, run_tiers};
use super::normalize::{FieldMap, foreign_key_from_fields};
use super::patterns::Patterns;

const TIERS: &[(&str, Tier<ForeignKey>)] = &[
    ("header", from_header as Tier<ForeignKey>),
    ("pattern", from_pattern as Tier<ForeignKey>),
    ("tokens", from_tokens as Tier<ForeignKey>),
];

pub(crate) fn parse_foreign_keys(patterns: &Patterns, section_text: &str) -> Vec<ForeignKey> {
    let lines = SectionLines::new(section_text, &patterns.boilerplate);
    run_tiers("foreign_keys", TIERS, patterns, &lines)
}

fn from_header(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<ForeignKey>> {
    parse_with_header(
        patterns,
        lines,
        |header| header.contains("name") && header.contains("referenc"),
        |fields, _| foreign_key_from_fields(patterns, fields),
    )
}

fn from_pattern(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<ForeignKey>> {
    let foreign_keys = lines
        .data_lines()
        .filter_map(|line| {
            let captures = patterns.foreign_key_row.captures(line)?;
            let mut fields = FieldMap::new();
            for (group, key) in [
                ("name", "name"),
                ("columns", "columns"),
                ("reference", "referenced_table"),
                ("update", "update_rule"),
                ("delete", "delete_rule"),
            ] {
                if let Some(value) = captures.name(group) {
                    fields.insert(key.to_string(), value.as_str().trim().to_string());
                }
            }
            foreign_key_from_fields(patterns, &fields)
        })
        .collect::<Vec<ForeignKey>>();
    Some(foreign_keys)
}

/// Wide cells only: name, columns, reference, an optional referenced-columns cell, then the
/// update and delete rules.
fn from_tokens(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<ForeignKey>> {
    let foreign_keys = lines
        .data_lines()
        .filter_map(|line| {
            let cells = patterns
                .cell_split
                .split(line.trim())
                .map(str::trim)
                .filter(|cell| !cell.is_empty())
                .collect::<Vec<&str>>();
            if cells.len() < 3 {
                return None;
            }

            let mut fields = FieldMap::new();
            for (key, cell) in ["name", "columns", "referenced_table"].into_iter().zip(&cells) {
                fields.insert(key.to_string(), cell.to_string());
            }

            let mut rest = &cells[3..];
            if let Some((first, tail)) = rest.split_first()
                && !patterns.referential_rule.is_match(first)
            {
                fields.insert("referenced_columns".to_string(), first.to_string());
                rest = tail;
            }
            for (key, cell) in ["update_rule", "delete_rule"].into_iter().zip(rest) {
                fields.insert(key.to_string(), cell.to_string());
            }
            foreign_key_from_fields(patterns, &fields)
        })
        .collect::<Vec<ForeignKey>>();
    Some(foreign_keys)
}
