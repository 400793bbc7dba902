use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::model::{ParsedResult, ParsedSection, Provenance, QualifiedName, TocEntry};

use super::boundary::{BoundaryOptions, TableMarker, TableScan, scan_table};
use super::columns::parse_columns;
use super::computed::parse_computed_columns;
use super::drift::DriftReport;
use super::foreign_keys::parse_foreign_keys;
use super::indexes::parse_indexes;
use super::pages::{Boilerplate, PagedText};
use super::patterns::Patterns;
use super::sections::{SectionKind, extract_section};

#[derive(Debug, Clone)]
pub struct TextExtractOptions {
    pub boundary: BoundaryOptions,
    pub workers: usize,
    /// Running headers/footers to drop in addition to the detected ones.
    pub document_titles: Vec<String>,
    /// Tables not yet started when the flag is raised are reported as skipped.
    pub abort: Option<Arc<AtomicBool>>,
}

impl Default for TextExtractOptions {
    fn default() -> Self {
        Self {
            boundary: BoundaryOptions::default(),
            workers: 8,
            document_titles: Vec::new(),
            abort: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TextExtraction {
    pub pages: usize,
    pub result: ParsedResult,
    pub scans: Vec<TableScan>,
    pub drift: DriftReport,
}

/// Locates every TOC table in the text dump and parses its sections. Each located table
/// gets an entry in `result`, even when no records were recognized.
pub fn extract_from_text(
    text: &str,
    toc: &[TocEntry],
    options: &TextExtractOptions,
) -> Result<TextExtraction> {
    if options.workers == 0 {
        bail!("worker count must be at least 1");
    }

    let mut patterns = Patterns::new()?;
    let paged = PagedText::parse(text, &patterns.page_marker);
    patterns.boilerplate = Boilerplate::detect(&paged, &options.document_titles)?;

    let markers = toc
        .iter()
        .map(|entry| TableMarker::new(&entry.name))
        .collect::<Result<Vec<TableMarker>>>()?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(options.workers)
        .thread_name(|index| format!("schemadoc-text-{index}"))
        .build()
        .context("failed to build text extraction worker pool")?;

    info!(
        pages = paged.len(),
        tables = toc.len(),
        workers = options.workers,
        "extracting table definitions from text"
    );

    let outcomes = pool.install(|| {
        toc.par_iter()
            .enumerate()
            .map(|(index, entry)| {
                if options
                    .abort
                    .as_ref()
                    .map(|flag| flag.load(Ordering::Relaxed))
                    .unwrap_or(false)
                {
                    return (TableScan::skipped(entry, &options.boundary), None);
                }

                let mut scan = scan_table(
                    &patterns,
                    &paged,
                    entry,
                    &markers[index],
                    markers.get(index + 1),
                    &options.boundary,
                );
                let section = scan
                    .definition
                    .take()
                    .map(|definition| parse_definition(&patterns, &definition, &entry.name));
                (scan, section)
            })
            .collect::<Vec<(TableScan, Option<ParsedSection>)>>()
    });

    let mut result = ParsedResult::new();
    let mut scans = Vec::<TableScan>::with_capacity(outcomes.len());
    for (scan, section) in outcomes {
        if let Some(section) = section {
            result.entry(section.table.key()).or_insert(section);
        }
        scans.push(scan);
    }

    let drift = DriftReport::from_scans(&scans);
    info!(
        located = drift.located_tables,
        not_found = drift.not_found_tables.len(),
        parsed = result.len(),
        "text extraction finished"
    );

    Ok(TextExtraction {
        pages: paged.len(),
        result,
        scans,
        drift,
    })
}

pub(crate) fn parse_definition(
    patterns: &Patterns,
    definition: &str,
    table: &QualifiedName,
) -> ParsedSection {
    let mut section = ParsedSection::empty(table.clone(), Provenance::Text);

    for kind in SectionKind::ALL {
        let Some(text) = extract_section(definition, kind) else {
            debug!(table = %table, section = kind.title(), "section header absent");
            continue;
        };
        match kind {
            SectionKind::Columns => section.columns = parse_columns(patterns, &text),
            SectionKind::Indexes => section.indexes = parse_indexes(patterns, &text),
            SectionKind::ForeignKeys => section.foreign_keys = parse_foreign_keys(patterns, &text),
            SectionKind::ComputedColumns => {
                section.computed_columns = parse_computed_columns(patterns, &text)
            }
        }
    }

    debug!(
        table = %table,
        columns = section.columns.len(),
        indexes = section.indexes.len(),
        foreign_keys = section.foreign_keys.len(),
        computed_columns = section.computed_columns.len(),
        "table parsed"
    );
    section
}
