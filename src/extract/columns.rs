use std::collections::HashSet;

use tracing::debug;

use crate::model::Column;

use super::layout::{SectionLines, Tier, parse_with_header, run_tiers, tokenize};
use super::normalize::{FieldMap, column_from_fields, complete_default, parse_bool};
use super::patterns::Patterns;

const TIERS: &[(&str, Tier<Column>)] = &[
    ("header", from_header as Tier<Column>),
    ("pattern", from_pattern as Tier<Column>),
    ("tokens", from_tokens as Tier<Column>),
];

pub(crate) fn parse_columns(patterns: &Patterns, section_text: &str) -> Vec<Column> {
    let lines = SectionLines::new(section_text, &patterns.boilerplate);
    dedupe_columns(run_tiers("columns", TIERS, patterns, &lines))
}

/// Rows repeated across a page break collapse to their first occurrence.
pub(crate) fn dedupe_columns(columns: Vec<Column>) -> Vec<Column> {
    let mut seen = HashSet::<String>::new();
    columns
        .into_iter()
        .filter(|column| {
            let fresh = seen.insert(column.name.to_lowercase());
            if !fresh {
                debug!(column = %column.name, "dropping repeated column row");
            }
            fresh
        })
        .collect()
}

fn is_column_name(name: &str) -> bool {
    name.chars()
        .next()
        .map(|character| character.is_alphanumeric() || matches!(character, '_' | '@' | '#' | '['))
        .unwrap_or(false)
}

fn finish(patterns: &Patterns, fields: &FieldMap, line: &str) -> Option<Column> {
    let mut column = column_from_fields(patterns, fields)?;
    if !is_column_name(&column.name) {
        return None;
    }
    complete_default(&mut column, line);
    Some(column)
}

fn from_header(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<Column>> {
    parse_with_header(
        patterns,
        lines,
        |header| (header.contains("name") || header.contains("column")) && header.contains("type"),
        |fields, line| finish(patterns, fields, line),
    )
}

fn from_pattern(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<Column>> {
    let columns = lines
        .data_lines()
        .filter_map(|line| {
            let captures = patterns.column_row.captures(line)?;
            let mut fields = FieldMap::new();
            for (group, key) in [
                ("key", "key"),
                ("name", "name"),
                ("type", "data_type"),
                ("length", "max_length"),
                ("nulls", "allow_nulls"),
                ("identity", "identity"),
                ("default", "default"),
            ] {
                if let Some(value) = captures.name(group) {
                    fields.insert(key.to_string(), value.as_str().trim().to_string());
                }
            }
            finish(patterns, &fields, line)
        })
        .collect::<Vec<Column>>();
    Some(columns)
}

/// Name first, type second, then the first number, boolean and seed-increment found.
fn from_tokens(patterns: &Patterns, lines: &SectionLines) -> Option<Vec<Column>> {
    let columns = lines
        .data_lines()
        .filter_map(|line| {
            let tokens = tokenize(patterns, line)
                .into_iter()
                .filter(|token| !token.starts_with("(("))
                .collect::<Vec<&str>>();
            if tokens.len() < 2 {
                return None;
            }

            let mut fields = FieldMap::new();
            fields.insert("name".to_string(), tokens[0].to_string());
            if tokens[1]
                .chars()
                .next()
                .map(char::is_alphabetic)
                .unwrap_or(false)
            {
                fields.insert("data_type".to_string(), tokens[1].to_string());
            }

            let rest = &tokens[2..];
            let length_index = rest
                .iter()
                .position(|token| token.chars().all(|character| character.is_ascii_digit()));
            if let Some(index) = length_index {
                fields.insert("max_length".to_string(), rest[index].to_string());
            }

            let after_length = length_index.map(|index| index + 1).unwrap_or(0);
            if let Some(offset) = rest[after_length..]
                .iter()
                .position(|token| parse_bool(Some(*token)).is_some())
            {
                let nulls_index = after_length + offset;
                fields.insert("allow_nulls".to_string(), rest[nulls_index].to_string());
                let remainder = rest[nulls_index + 1..].join(" ");
                if patterns.identity_seed.is_match(&remainder) {
                    fields.insert("identity".to_string(), remainder);
                }
            }

            if fields.len() < 2 {
                return None;
            }
            finish(patterns, &fields, line)
        })
        .collect::<Vec<Column>>();
    Some(columns)
}
