use std::collections::HashSet;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::model::{QualifiedName, TocEntry};

use super::pages::PagedText;
use super::patterns::Patterns;

#[derive(Debug, Clone)]
pub struct TocOptions {
    /// Pages searched for the marker, from the start of the document.
    pub scan_pages: usize,
    /// Pages read from the marker page onward.
    pub max_pages: usize,
    pub marker: String,
}

impl Default for TocOptions {
    fn default() -> Self {
        Self {
            scan_pages: 20,
            max_pages: 10,
            marker: "Table of Contents".to_string(),
        }
    }
}

/// TOC entries of a `--- Page N ---` text dump, unique by name and ordered by declared page.
pub fn build_text_index(text: &str, options: &TocOptions) -> Result<Vec<TocEntry>> {
    let patterns = Patterns::new()?;
    let paged = PagedText::parse(text, &patterns.page_marker);
    Ok(build_index_from_pages(&patterns, &paged, options))
}

pub(crate) fn build_index_from_pages(
    patterns: &Patterns,
    paged: &PagedText,
    options: &TocOptions,
) -> Vec<TocEntry> {
    let marker = options.marker.to_lowercase();
    let Some(start) = paged
        .pages()
        .iter()
        .take(options.scan_pages)
        .position(|page| page.text.to_lowercase().contains(&marker))
    else {
        warn!(
            scan_pages = options.scan_pages,
            marker = %options.marker,
            "table of contents not found"
        );
        return Vec::new();
    };

    let mut seen = HashSet::<String>::new();
    let mut entries = Vec::<TocEntry>::new();
    let mut stopped = false;

    'pages: for page in paged.pages().iter().skip(start).take(options.max_pages) {
        for line in page.text.lines() {
            if patterns.toc_stop.is_match(line) {
                debug!(page = page.number, line = line.trim(), "table of contents ends");
                stopped = true;
                break 'pages;
            }

            let Some(captures) = patterns.toc_line.captures(line) else {
                continue;
            };
            let Some(name) = captures
                .name("name")
                .and_then(|value| QualifiedName::parse(value.as_str()))
            else {
                continue;
            };
            let Some(declared_page) = captures
                .name("page")
                .and_then(|value| value.as_str().parse::<u32>().ok())
                .filter(|page| *page > 0)
            else {
                continue;
            };

            if seen.insert(name.key()) {
                entries.push(TocEntry {
                    name,
                    declared_page,
                });
            }
        }
    }

    entries.sort_by_key(|entry| entry.declared_page);

    info!(
        entries = entries.len(),
        marker_page = paged.pages()[start].number,
        stopped_at_heading = stopped,
        "table of contents indexed"
    );
    entries
}
