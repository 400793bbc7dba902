use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

pub const DEFAULT_SCHEMA: &str = "dbo";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QualifiedName {
    pub schema: String,
    pub table: String,
}

impl QualifiedName {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }

    /// Parses `schema.table` or `[schema].[table]`; a bare name lands in `dbo`.
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw
            .trim()
            .chars()
            .filter(|character| *character != '[' && *character != ']')
            .collect::<String>();
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return None;
        }

        match cleaned.split_once('.') {
            Some((schema, table)) => {
                let schema = schema.trim();
                let table = table.trim();
                if schema.is_empty() || table.is_empty() {
                    return None;
                }
                Some(Self::new(schema, table))
            }
            None => Some(Self::new(DEFAULT_SCHEMA, cleaned)),
        }
    }

    pub fn key(&self) -> String {
        format!("{}.{}", self.schema, self.table).to_lowercase()
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TocEntry {
    pub name: QualifiedName,
    pub declared_page: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data_type: Option<String>,
    pub base_data_type: Option<String>,
    pub max_length: Option<String>,
    pub numeric_precision: Option<String>,
    pub numeric_scale: Option<String>,
    pub allow_nulls: Option<bool>,
    pub identity: Option<bool>,
    pub identity_seed: Option<String>,
    pub identity_increment: Option<String>,
    pub default: Option<String>,
    pub key: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    pub name: String,
    pub key_columns: Option<String>,
    pub key_column_list: Vec<String>,
    pub is_unique: bool,
    pub is_primary: bool,
    pub index_type: Option<String>,
    pub fill_factor: Option<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: String,
    pub columns: Option<String>,
    pub column_list: Vec<String>,
    pub referenced_schema: Option<String>,
    pub referenced_table: Option<String>,
    pub referenced_columns: Option<String>,
    pub referenced_column_list: Vec<String>,
    pub referenced_raw: Option<String>,
    pub update_rule: Option<String>,
    pub delete_rule: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedColumn {
    pub name: String,
    pub formula: Option<String>,
    pub data_type: Option<String>,
    pub is_persisted: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provenance {
    Text,
    Dom,
}

impl Provenance {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Dom => "dom",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedSection {
    pub table: QualifiedName,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub computed_columns: Vec<ComputedColumn>,
    pub provenance: Provenance,
}

impl ParsedSection {
    pub fn empty(table: QualifiedName, provenance: Provenance) -> Self {
        Self {
            table,
            columns: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            computed_columns: Vec::new(),
            provenance,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
            && self.indexes.is_empty()
            && self.foreign_keys.is_empty()
            && self.computed_columns.is_empty()
    }
}

/// Keyed by the lower-cased `schema.table`.
pub type ParsedResult = BTreeMap<String, ParsedSection>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    TextOnly,
    DomOnly,
    Merged,
}

impl ExtractionSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::TextOnly => "text_only",
            Self::DomOnly => "dom_only",
            Self::Merged => "merged",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedTable {
    pub schema: String,
    pub table_name: String,
    pub columns: Vec<Column>,
    pub indexes: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
    pub computed_columns: Vec<ComputedColumn>,
    pub extraction_source: ExtractionSource,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeMetadata {
    pub extraction_date: String,
    pub preference: String,
    pub text_tables: usize,
    pub dom_tables: usize,
    pub total_tables: usize,
    pub text_only_tables: usize,
    pub dom_only_tables: usize,
    pub merged_tables: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeOutput {
    pub metadata: MergeMetadata,
    pub tables: BTreeMap<String, MergedTable>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceFile {
    pub role: String,
    pub path: String,
    pub sha256: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractSettings {
    pub prefer: String,
    pub page_offset: i64,
    pub search_radius: usize,
    pub max_pages_per_table: usize,
    pub workers: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub started_at: String,
    pub completed_at: String,
    pub settings: ExtractSettings,
    pub sources: Vec<SourceFile>,
    pub toc_entries: usize,
    pub text_tables: usize,
    pub dom_tables: usize,
    pub drift: crate::extract::DriftReport,
    pub output_path: String,
    pub catalog_path: Option<String>,
}
