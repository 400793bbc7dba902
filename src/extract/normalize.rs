use std::collections::BTreeMap;

use crate::model::{Column, ComputedColumn, ForeignKey, Index};

use super::patterns::Patterns;

/// Field label (normalized) to raw cell value, the common currency between the positional
/// text tier, the regex tier and DOM rows.
pub(crate) type FieldMap = BTreeMap<String, String>;

const NAME_FIELDS: &[&str] = &["column_name", "name"];
const TYPE_FIELDS: &[&str] = &["data_type", "datatype", "type"];
const LENGTH_FIELDS: &[&str] = &[
    "max_length_bytes",
    "max_length",
    "maximum_length",
    "length_bytes",
    "length",
    "size",
];
const NULLS_FIELDS: &[&str] = &["allow_nulls", "nullable", "nulls", "null", "is_nullable"];
const IDENTITY_FIELDS: &[&str] = &["identity", "ident", "is_identity"];
const DEFAULT_FIELDS: &[&str] = &["default", "default_value", "defaults"];
const KEY_FIELDS: &[&str] = &["key", "pk", "keys"];

const INDEX_NAME_FIELDS: &[&str] = &["index_name", "key_name", "name"];
const INDEX_COLUMN_FIELDS: &[&str] = &["key_columns", "columns", "column_names", "column"];
const UNIQUE_FIELDS: &[&str] = &["is_unique", "unique"];
const PRIMARY_FIELDS: &[&str] = &["is_primary", "is_primary_key", "primary_key", "primary"];
const INDEX_TYPE_FIELDS: &[&str] = &["index_type", "type"];
const FILL_FACTOR_FIELDS: &[&str] = &["fill_factor", "fillfactor"];

const FK_NAME_FIELDS: &[&str] = &["foreign_key_name", "foreign_key", "fk_name", "key_name", "name"];
const FK_COLUMN_FIELDS: &[&str] = &["columns", "column", "key_columns", "column_names"];
const REF_TABLE_FIELDS: &[&str] = &[
    "referenced_table",
    "references",
    "referenced_object",
    "referenced",
    "reference",
];
const REF_SCHEMA_FIELDS: &[&str] = &["referenced_schema"];
const REF_COLUMN_FIELDS: &[&str] = &["referenced_columns", "referenced_column"];
const UPDATE_FIELDS: &[&str] = &["update_rule", "on_update", "update"];
const DELETE_FIELDS: &[&str] = &["delete_rule", "on_delete", "delete"];

const COMPUTED_NAME_FIELDS: &[&str] = &["column_name", "computed_column_name", "name"];
const FORMULA_FIELDS: &[&str] = &["formula", "definition", "expression"];
const PERSISTED_FIELDS: &[&str] = &["is_persisted", "persisted"];

const NUMERIC_BASE_TYPES: &[&str] = &["decimal", "numeric", "float", "real"];

/// `Max Length (Bytes)` -> `max_length_bytes`.
pub(crate) fn normalize_field_key(label: &str) -> String {
    let mut key = String::with_capacity(label.len());
    let mut pending_separator = false;
    for character in label.trim().chars() {
        if character.is_alphanumeric() {
            if pending_separator && !key.is_empty() {
                key.push('_');
            }
            pending_separator = false;
            key.extend(character.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    key
}

pub(crate) fn field<'a>(fields: &'a FieldMap, aliases: &[&str]) -> Option<&'a str> {
    aliases.iter().find_map(|alias| {
        fields
            .get(*alias)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    })
}

pub fn parse_bool(value: Option<&str>) -> Option<bool> {
    let value = value?.trim();
    match value.to_ascii_uppercase().as_str() {
        "YES" | "Y" | "1" | "TRUE" => Some(true),
        "NO" | "N" | "0" | "FALSE" => Some(false),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TypeParts {
    pub base: String,
    pub length: Option<String>,
    pub precision: Option<String>,
    pub scale: Option<String>,
}

pub(crate) fn decompose_data_type(patterns: &Patterns, data_type: &str) -> Option<TypeParts> {
    let captures = patterns.type_parts.captures(data_type)?;
    let base = captures.get(1)?.as_str().trim().to_lowercase();
    let first = captures.get(2).map(|value| value.as_str().to_string());
    let second = captures.get(3).map(|value| value.as_str().to_string());

    let mut parts = TypeParts {
        base,
        ..TypeParts::default()
    };
    match (first, second) {
        (Some(precision), Some(scale)) => {
            parts.precision = Some(precision);
            parts.scale = Some(scale);
        }
        (Some(single), None) if NUMERIC_BASE_TYPES.contains(&parts.base.as_str()) => {
            parts.precision = Some(single);
        }
        (Some(single), None) => parts.length = Some(single),
        _ => {}
    }
    Some(parts)
}

pub(crate) fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|item| item.trim().trim_matches(['[', ']']).trim())
        .filter(|item| !item.is_empty())
        .map(ToOwned::to_owned)
        .collect()
}

pub(crate) fn strip_sort_qualifiers(patterns: &Patterns, raw: &str) -> String {
    patterns.sort_qualifier.replace_all(raw, "").into_owned()
}

/// `(is_primary, is_unique)` from index naming conventions.
pub fn classify_index_name(name: &str) -> (bool, bool) {
    let upper = name.trim().to_ascii_uppercase();
    let is_primary = upper == "PK" || upper.starts_with("PK_");
    let is_unique = is_primary
        || ["UQ", "UK"].iter().any(|prefix| {
            upper
                .strip_prefix(prefix)
                .map(|rest| {
                    rest.is_empty()
                        || rest.starts_with('_')
                        || rest.starts_with(|character: char| character.is_ascii_digit())
                })
                .unwrap_or(false)
        });
    (is_primary, is_unique)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct IdentityParts {
    pub identity: Option<bool>,
    pub seed: Option<String>,
    pub increment: Option<String>,
}

pub(crate) fn parse_identity(patterns: &Patterns, raw: Option<&str>) -> IdentityParts {
    let Some(raw) = raw else {
        return IdentityParts::default();
    };

    if let Some(captures) = patterns.identity_seed.captures(raw) {
        return IdentityParts {
            identity: Some(true),
            seed: captures.get(1).map(|value| value.as_str().to_string()),
            increment: captures.get(2).map(|value| value.as_str().to_string()),
        };
    }

    IdentityParts {
        identity: parse_bool(Some(raw)),
        ..IdentityParts::default()
    }
}

/// First `((...))` expression in `line`, balanced and byte-for-byte.
pub fn capture_default(line: &str) -> Option<String> {
    let start = line.find("((")?;
    let mut depth = 0usize;
    for (offset, character) in line[start..].char_indices() {
        match character {
            '(' => depth += 1,
            ')' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    let end = start + offset + character.len_utf8();
                    return Some(line[start..end].to_string());
                }
            }
            _ => {}
        }
    }
    None
}

pub(crate) fn is_balanced(value: &str) -> bool {
    let mut depth = 0i64;
    for character in value.chars() {
        match character {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

pub(crate) fn parse_fill_factor(raw: Option<&str>) -> Option<u8> {
    raw?.trim()
        .trim_end_matches('%')
        .parse::<u8>()
        .ok()
        .filter(|value| *value <= 100)
}

fn clean_identifier(raw: &str) -> String {
    raw.trim().trim_matches(['[', ']']).trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reference {
    Columns {
        schema: Option<String>,
        table: String,
        columns: String,
    },
    Table {
        schema: Option<String>,
        table: String,
    },
    Unparsed,
}

/// Splits a referenced-object expression. With `expect_column`, a two-part name is read
/// as `table.column`; otherwise as `schema.table`.
pub(crate) fn parse_reference(patterns: &Patterns, raw: &str, expect_column: bool) -> Reference {
    let capture = |captures: &regex::Captures<'_>, index: usize| {
        captures
            .get(index)
            .map(|value| clean_identifier(value.as_str()))
    };

    if let Some(captures) = patterns.reference_list.captures(raw)
        && let (Some(table), Some(columns)) = (capture(&captures, 2), captures.get(3))
    {
        return Reference::Columns {
            schema: capture(&captures, 1),
            table,
            columns: columns.as_str().trim().to_string(),
        };
    }

    if let Some(captures) = patterns.reference_three.captures(raw)
        && let (Some(schema), Some(table), Some(column)) = (
            capture(&captures, 1),
            capture(&captures, 2),
            capture(&captures, 3),
        )
    {
        return Reference::Columns {
            schema: Some(schema),
            table,
            columns: column,
        };
    }

    if let Some(captures) = patterns.reference_two.captures(raw)
        && let (Some(first), Some(second)) = (capture(&captures, 1), capture(&captures, 2))
    {
        return if expect_column {
            Reference::Columns {
                schema: None,
                table: first,
                columns: second,
            }
        } else {
            Reference::Table {
                schema: Some(first),
                table: second,
            }
        };
    }

    if !expect_column
        && let Some(captures) = patterns.reference_one.captures(raw)
        && let Some(table) = capture(&captures, 1)
    {
        return Reference::Table {
            schema: None,
            table,
        };
    }

    Reference::Unparsed
}

pub(crate) fn column_from_fields(patterns: &Patterns, fields: &FieldMap) -> Option<Column> {
    let name = field(fields, NAME_FIELDS)?.to_string();
    let data_type = field(fields, TYPE_FIELDS).map(ToOwned::to_owned);
    let identity = parse_identity(patterns, field(fields, IDENTITY_FIELDS));

    let mut column = Column {
        name,
        data_type,
        max_length: field(fields, LENGTH_FIELDS).map(ToOwned::to_owned),
        allow_nulls: parse_bool(field(fields, NULLS_FIELDS)),
        identity: identity.identity,
        identity_seed: identity.seed,
        identity_increment: identity.increment,
        default: field(fields, DEFAULT_FIELDS).map(ToOwned::to_owned),
        key: field(fields, KEY_FIELDS).map(ToOwned::to_owned),
        ..Column::default()
    };

    if let Some(parts) = column
        .data_type
        .as_deref()
        .and_then(|data_type| decompose_data_type(patterns, data_type))
    {
        column.base_data_type = Some(parts.base);
        if column.max_length.is_none() {
            column.max_length = parts.length;
        }
        column.numeric_precision = parts.precision;
        column.numeric_scale = parts.scale;
    }

    Some(column)
}

/// Repairs a default cut short by positional slicing using the raw source line.
pub(crate) fn complete_default(column: &mut Column, line: &str) {
    let needs_capture = column
        .default
        .as_deref()
        .map(|value| !is_balanced(value))
        .unwrap_or(true);
    if needs_capture && let Some(captured) = capture_default(line) {
        column.default = Some(captured);
    }
}

pub(crate) fn index_from_fields(patterns: &Patterns, fields: &FieldMap) -> Option<Index> {
    let name = field(fields, INDEX_NAME_FIELDS).unwrap_or_default().to_string();
    let key_columns = field(fields, INDEX_COLUMN_FIELDS).map(ToOwned::to_owned);
    if name.is_empty() && key_columns.is_none() {
        return None;
    }

    let (named_primary, named_unique) = classify_index_name(&name);
    let is_primary = named_primary || parse_bool(field(fields, PRIMARY_FIELDS)).unwrap_or(false);
    let explicit_unique = field(fields, UNIQUE_FIELDS).and_then(|value| {
        if value.eq_ignore_ascii_case("unique") {
            Some(true)
        } else {
            parse_bool(Some(value))
        }
    });
    let is_unique = is_primary || named_unique || explicit_unique.unwrap_or(false);

    let key_column_list = key_columns
        .as_deref()
        .map(|raw| split_list(&strip_sort_qualifiers(patterns, raw)))
        .unwrap_or_default();

    Some(Index {
        name,
        key_columns,
        key_column_list,
        is_unique,
        is_primary,
        index_type: field(fields, INDEX_TYPE_FIELDS).map(ToOwned::to_owned),
        fill_factor: parse_fill_factor(field(fields, FILL_FACTOR_FIELDS)),
    })
}

pub(crate) fn foreign_key_from_fields(patterns: &Patterns, fields: &FieldMap) -> Option<ForeignKey> {
    let name = field(fields, FK_NAME_FIELDS).unwrap_or_default().to_string();
    let columns = field(fields, FK_COLUMN_FIELDS).map(ToOwned::to_owned);
    let explicit_ref_columns = field(fields, REF_COLUMN_FIELDS).map(ToOwned::to_owned);
    let reference = field(fields, REF_TABLE_FIELDS);
    if name.is_empty() && columns.is_none() && reference.is_none() {
        return None;
    }

    let mut foreign_key = ForeignKey {
        name,
        columns,
        referenced_schema: field(fields, REF_SCHEMA_FIELDS).map(clean_identifier),
        referenced_columns: explicit_ref_columns.clone(),
        update_rule: field(fields, UPDATE_FIELDS).map(ToOwned::to_owned),
        delete_rule: field(fields, DELETE_FIELDS).map(ToOwned::to_owned),
        ..ForeignKey::default()
    };

    if let Some(raw) = reference {
        match parse_reference(patterns, raw, explicit_ref_columns.is_none()) {
            Reference::Columns {
                schema,
                table,
                columns,
            } => {
                if schema.is_some() {
                    foreign_key.referenced_schema = schema;
                }
                foreign_key.referenced_table = Some(table);
                if foreign_key.referenced_columns.is_none() {
                    foreign_key.referenced_columns = Some(columns);
                }
            }
            Reference::Table { schema, table } => {
                if schema.is_some() {
                    foreign_key.referenced_schema = schema;
                }
                foreign_key.referenced_table = Some(table);
            }
            Reference::Unparsed => foreign_key.referenced_raw = Some(raw.to_string()),
        }
    }

    foreign_key.column_list = foreign_key
        .columns
        .as_deref()
        .map(split_list)
        .unwrap_or_default();
    foreign_key.referenced_column_list = foreign_key
        .referenced_columns
        .as_deref()
        .map(split_list)
        .unwrap_or_default();

    Some(foreign_key)
}

pub(crate) fn computed_from_fields(fields: &FieldMap) -> Option<ComputedColumn> {
    let name = field(fields, COMPUTED_NAME_FIELDS)?.to_string();
    Some(ComputedColumn {
        name,
        formula: field(fields, FORMULA_FIELDS).map(ToOwned::to_owned),
        data_type: field(fields, TYPE_FIELDS).map(ToOwned::to_owned),
        is_persisted: parse_bool(field(fields, PERSISTED_FIELDS)),
    })
}
