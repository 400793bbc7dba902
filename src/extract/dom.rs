use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{ParsedResult, ParsedSection, Provenance, QualifiedName};

use super::columns::dedupe_columns;
use super::layout::looks_like_header;
use super::normalize::{
    FieldMap, column_from_fields, computed_from_fields, foreign_key_from_fields, index_from_fields,
    normalize_field_key,
};
use super::patterns::Patterns;
use super::sections::SectionKind;

const CAPTION_MAX_CHARS: usize = 40;

/// Tree rendering of the document, as produced by an HTML or layout-analysis front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomNode {
    Heading {
        level: u8,
        text: String,
    },
    Paragraph {
        text: String,
    },
    Table {
        rows: Vec<Vec<String>>,
    },
    Container {
        #[serde(default)]
        page: Option<u32>,
        children: Vec<DomNode>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomDocument {
    pub nodes: Vec<DomNode>,
}

enum Block<'a> {
    Heading(&'a str),
    Paragraph(&'a str),
    Table {
        rows: &'a [Vec<String>],
        page: Option<u32>,
    },
}

fn flatten<'a>(nodes: &'a [DomNode], page: Option<u32>, blocks: &mut Vec<Block<'a>>) {
    for node in nodes {
        match node {
            DomNode::Heading { text, .. } => blocks.push(Block::Heading(text.as_str())),
            DomNode::Paragraph { text } => blocks.push(Block::Paragraph(text.as_str())),
            DomNode::Table { rows } => blocks.push(Block::Table {
                rows: rows.as_slice(),
                page,
            }),
            DomNode::Container {
                page: container_page,
                children,
            } => flatten(children, container_page.or(page), blocks),
        }
    }
}

/// Keyword classification of a caption or header row.
fn classify(text: &str) -> Option<SectionKind> {
    if let Some(kind) = SectionKind::from_title(text) {
        return Some(kind);
    }
    let text = text.to_lowercase();
    if (text.contains("computed") && text.contains("column")) || text.contains("formula") {
        Some(SectionKind::ComputedColumns)
    } else if text.contains("foreign key") || text.contains("referenced") {
        Some(SectionKind::ForeignKeys)
    } else if text.contains("index") || text.contains("key columns") {
        Some(SectionKind::Indexes)
    } else if (text.contains("name") || text.contains("column")) && text.contains("type") {
        Some(SectionKind::Columns)
    } else {
        None
    }
}

fn cells(row: &[String]) -> Vec<&str> {
    row.iter().map(|cell| cell.trim()).collect()
}

fn non_empty_cells(row: &[String]) -> usize {
    row.iter().filter(|cell| !cell.trim().is_empty()).count()
}

struct Layout {
    kind: SectionKind,
    keys: Vec<String>,
}

/// Context of the table heading currently being read.
struct TableContext {
    key: String,
    caption: Option<String>,
    previous: Option<Layout>,
}

/// Parses every `schema.table` heading's tables into records. Tables before the first such
/// heading and tables that cannot be classified are ignored.
pub fn extract_from_dom(document: &DomDocument) -> Result<ParsedResult> {
    let patterns = Patterns::new()?;
    let mut blocks = Vec::<Block<'_>>::new();
    flatten(&document.nodes, None, &mut blocks);

    let mut result = ParsedResult::new();
    let mut context: Option<TableContext> = None;

    for block in blocks {
        match block {
            Block::Heading(text) => {
                if let Some(captures) = patterns.table_heading.captures(text)
                    && let (Some(schema), Some(table)) = (captures.get(1), captures.get(2))
                {
                    let name = QualifiedName::new(schema.as_str(), table.as_str());
                    let key = name.key();
                    result
                        .entry(key.clone())
                        .or_insert_with(|| ParsedSection::empty(name, Provenance::Dom));
                    context = Some(TableContext {
                        key,
                        caption: None,
                        previous: None,
                    });
                } else if let Some(context) = context.as_mut() {
                    context.caption = Some(text.trim().to_string());
                }
            }
            Block::Paragraph(text) => {
                let text = text.trim();
                if let Some(context) = context.as_mut()
                    && !text.is_empty()
                    && text.chars().count() <= CAPTION_MAX_CHARS
                {
                    context.caption = Some(text.to_string());
                }
            }
            Block::Table { rows, page } => {
                let Some(context) = context.as_mut() else {
                    debug!(page = ?page, "table before any table heading");
                    continue;
                };
                let Some(section) = result.get_mut(&context.key) else {
                    continue;
                };
                read_table(&patterns, context, section, rows, page);
            }
        }
    }

    result.retain(|_, section| {
        let keep = !section.is_empty();
        if !keep {
            debug!(table = %section.table, "no records under table heading");
        }
        keep
    });
    for section in result.values_mut() {
        section.columns = dedupe_columns(std::mem::take(&mut section.columns));
    }

    info!(tables = result.len(), "dom extraction finished");
    Ok(result)
}

fn read_table(
    patterns: &Patterns,
    context: &mut TableContext,
    section: &mut ParsedSection,
    rows: &[Vec<String>],
    page: Option<u32>,
) {
    let Some(first) = rows.first() else {
        return;
    };
    let first_line = cells(first).join(" ");
    let caption = context.caption.take();

    // The caption names the category; the first row only decides it when the caption is silent.
    let has_header = looks_like_header(&first_line);
    let kind = caption
        .as_deref()
        .and_then(classify)
        .or_else(|| classify(&first_line).filter(|_| has_header));
    let layout = match kind {
        Some(kind) if has_header => Layout {
            kind,
            keys: cells(first).into_iter().map(normalize_field_key).collect(),
        },
        // Headerless continuation of the previous table on the next page.
        _ => match context.previous.take() {
            Some(previous) if previous.keys.len() == first.len() => {
                return continue_table(patterns, context, section, previous, rows, page);
            }
            _ => {
                debug!(
                    table = %section.table,
                    page = ?page,
                    caption = ?caption,
                    "unclassified dom table"
                );
                return;
            }
        },
    };

    append_rows(patterns, section, &layout, &rows[1..]);
    debug!(
        table = %section.table,
        section = layout.kind.title(),
        rows = rows.len() - 1,
        page = ?page,
        "dom table read"
    );
    context.previous = Some(layout);
}

fn continue_table(
    patterns: &Patterns,
    context: &mut TableContext,
    section: &mut ParsedSection,
    layout: Layout,
    rows: &[Vec<String>],
    page: Option<u32>,
) {
    append_rows(patterns, section, &layout, rows);
    debug!(
        table = %section.table,
        section = layout.kind.title(),
        rows = rows.len(),
        page = ?page,
        "dom table continued"
    );
    context.previous = Some(layout);
}

fn append_rows(patterns: &Patterns, section: &mut ParsedSection, layout: &Layout, rows: &[Vec<String>]) {
    for row in rows {
        if non_empty_cells(row) < 2 {
            continue;
        }
        let keys = row
            .iter()
            .map(|cell| normalize_field_key(cell))
            .collect::<Vec<String>>();
        if keys == layout.keys {
            continue;
        }

        let fields = layout
            .keys
            .iter()
            .zip(row)
            .filter(|(key, _)| !key.is_empty())
            .map(|(key, value)| (key.clone(), value.trim().to_string()))
            .collect::<FieldMap>();

        match layout.kind {
            SectionKind::Columns => section.columns.extend(column_from_fields(patterns, &fields)),
            SectionKind::Indexes => section.indexes.extend(index_from_fields(patterns, &fields)),
            SectionKind::ForeignKeys => section
                .foreign_keys
                .extend(foreign_key_from_fields(patterns, &fields)),
            SectionKind::ComputedColumns => {
                section.computed_columns.extend(computed_from_fields(&fields))
            }
        }
    }
}
