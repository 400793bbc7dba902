use std::collections::{BTreeMap, BTreeSet, HashMap};

use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, warn};

use crate::model::{
    Column, ComputedColumn, ExtractionSource, ForeignKey, Index, MergeMetadata, MergeOutput,
    MergedTable, ParsedResult, ParsedSection, Provenance,
};
use crate::util::now_utc_string;

use super::sections::SectionKind;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourcePreference {
    #[default]
    Dom,
    Text,
}

impl SourcePreference {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Dom => "dom",
            Self::Text => "text",
        }
    }
}

/// A record that can be reconciled by name across the two sources.
trait MergeItem: Clone {
    const KIND: SectionKind;

    fn name(&self) -> &str;

    /// Source-reported fields, excluding the name and values derived from other fields.
    fn comparable_fields(&self) -> Vec<(&'static str, Option<String>)>;
}

fn text<T: ToString>(value: &Option<T>) -> Option<String> {
    value.as_ref().map(ToString::to_string)
}

impl MergeItem for Column {
    const KIND: SectionKind = SectionKind::Columns;

    fn name(&self) -> &str {
        &self.name
    }

    fn comparable_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("data_type", self.data_type.clone()),
            ("max_length", self.max_length.clone()),
            ("allow_nulls", text(&self.allow_nulls)),
            ("identity", text(&self.identity)),
            ("identity_seed", self.identity_seed.clone()),
            ("identity_increment", self.identity_increment.clone()),
            ("default", self.default.clone()),
            ("key", self.key.clone()),
        ]
    }
}

impl MergeItem for Index {
    const KIND: SectionKind = SectionKind::Indexes;

    fn name(&self) -> &str {
        &self.name
    }

    fn comparable_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("key_columns", self.key_columns.clone()),
            ("is_unique", Some(self.is_unique.to_string())),
            ("is_primary", Some(self.is_primary.to_string())),
            ("index_type", self.index_type.clone()),
            ("fill_factor", text(&self.fill_factor)),
        ]
    }
}

impl MergeItem for ForeignKey {
    const KIND: SectionKind = SectionKind::ForeignKeys;

    fn name(&self) -> &str {
        &self.name
    }

    fn comparable_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("columns", self.columns.clone()),
            ("referenced_schema", self.referenced_schema.clone()),
            ("referenced_table", self.referenced_table.clone()),
            ("referenced_columns", self.referenced_columns.clone()),
            ("referenced_raw", self.referenced_raw.clone()),
            ("update_rule", self.update_rule.clone()),
            ("delete_rule", self.delete_rule.clone()),
        ]
    }
}

impl MergeItem for ComputedColumn {
    const KIND: SectionKind = SectionKind::ComputedColumns;

    fn name(&self) -> &str {
        &self.name
    }

    fn comparable_fields(&self) -> Vec<(&'static str, Option<String>)> {
        vec![
            ("formula", self.formula.clone()),
            ("data_type", self.data_type.clone()),
            ("is_persisted", text(&self.is_persisted)),
        ]
    }
}

struct MergeContext<'a> {
    table: &'a str,
    primary: Provenance,
    secondary: Provenance,
}

/// Primary records in order, then secondary-only records in order. Every differing field
/// of a matched record yields one warning; the primary value stays.
fn merge_items<T: MergeItem>(
    context: &MergeContext<'_>,
    primary: &[T],
    secondary: &[T],
    warnings: &mut Vec<String>,
) -> Vec<T> {
    let item_type = T::KIND.item_type();
    let mut merged = primary.to_vec();
    let by_name = primary
        .iter()
        .filter(|item| !item.name().trim().is_empty())
        .map(|item| (item.name().to_lowercase(), item))
        .collect::<HashMap<String, &T>>();

    for item in secondary {
        if item.name().trim().is_empty() {
            warnings.push(format!(
                "Warning: {item_type} in {} from {} is missing name, added as separate item",
                context.table,
                context.secondary.as_str()
            ));
            merged.push(item.clone());
            continue;
        }

        let Some(primary_item) = by_name.get(&item.name().to_lowercase()) else {
            merged.push(item.clone());
            continue;
        };

        let primary_fields = primary_item.comparable_fields();
        for ((key, primary_value), (_, secondary_value)) in
            primary_fields.iter().zip(item.comparable_fields())
        {
            if let (Some(primary_value), Some(secondary_value)) = (primary_value, secondary_value)
                && *primary_value != secondary_value
            {
                warnings.push(format!(
                    "Conflict: {item_type} '{}' in {} has different '{key}' values: {}='{primary_value}', {}='{secondary_value}'. Using {} version.",
                    item.name(),
                    context.table,
                    context.primary.as_str(),
                    context.secondary.as_str(),
                    context.primary.as_str(),
                ));
            }
        }
    }

    merged
}

fn single_source(section: &ParsedSection, source: ExtractionSource) -> MergedTable {
    MergedTable {
        schema: section.table.schema.clone(),
        table_name: section.table.table.clone(),
        columns: section.columns.clone(),
        indexes: section.indexes.clone(),
        foreign_keys: section.foreign_keys.clone(),
        computed_columns: section.computed_columns.clone(),
        extraction_source: source,
        warnings: Vec::new(),
    }
}

fn merge_table(primary: &ParsedSection, secondary: &ParsedSection) -> MergedTable {
    let table = primary.table.to_string();
    let context = MergeContext {
        table: &table,
        primary: primary.provenance,
        secondary: secondary.provenance,
    };
    let mut warnings = Vec::<String>::new();

    let columns = merge_items(&context, &primary.columns, &secondary.columns, &mut warnings);
    let indexes = merge_items(&context, &primary.indexes, &secondary.indexes, &mut warnings);
    let foreign_keys = merge_items(
        &context,
        &primary.foreign_keys,
        &secondary.foreign_keys,
        &mut warnings,
    );
    let computed_columns = merge_items(
        &context,
        &primary.computed_columns,
        &secondary.computed_columns,
        &mut warnings,
    );

    MergedTable {
        schema: primary.table.schema.clone(),
        table_name: primary.table.table.clone(),
        columns,
        indexes,
        foreign_keys,
        computed_columns,
        extraction_source: ExtractionSource::Merged,
        warnings,
    }
}

/// Reconciles the text and DOM results into one record per table.
pub fn merge(text: &ParsedResult, dom: &ParsedResult, preference: SourcePreference) -> MergeOutput {
    let keys = text.keys().chain(dom.keys()).collect::<BTreeSet<&String>>();

    let mut metadata = MergeMetadata {
        extraction_date: now_utc_string(),
        preference: preference.as_str().to_string(),
        text_tables: text.len(),
        dom_tables: dom.len(),
        total_tables: keys.len(),
        text_only_tables: 0,
        dom_only_tables: 0,
        merged_tables: 0,
        warnings: Vec::new(),
    };
    let mut tables = BTreeMap::<String, MergedTable>::new();

    for key in keys {
        let (table_name, merged) = match (text.get(key), dom.get(key)) {
            (Some(text_section), Some(dom_section)) => {
                let (primary, secondary) = match preference {
                    SourcePreference::Dom => (dom_section, text_section),
                    SourcePreference::Text => (text_section, dom_section),
                };
                metadata.merged_tables += 1;
                (primary.table.to_string(), merge_table(primary, secondary))
            }
            (Some(section), None) => {
                metadata.text_only_tables += 1;
                (
                    section.table.to_string(),
                    single_source(section, ExtractionSource::TextOnly),
                )
            }
            (None, Some(section)) => {
                metadata.dom_only_tables += 1;
                (
                    section.table.to_string(),
                    single_source(section, ExtractionSource::DomOnly),
                )
            }
            (None, None) => continue,
        };

        for warning in &merged.warnings {
            warn!(table = %table_name, "{warning}");
        }
        metadata.warnings.extend(merged.warnings.iter().cloned());
        tables.insert(table_name, merged);
    }

    info!(
        preference = preference.as_str(),
        total = metadata.total_tables,
        merged = metadata.merged_tables,
        text_only = metadata.text_only_tables,
        dom_only = metadata.dom_only_tables,
        warnings = metadata.warnings.len(),
        "merge complete"
    );

    MergeOutput { metadata, tables }
}
