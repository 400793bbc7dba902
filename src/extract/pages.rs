use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use regex::Regex;

use super::sections::SectionKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub number: usize,
    pub text: String,
}

/// Page-oriented view of a text dump delimited by `--- Page N ---` lines.
#[derive(Debug, Clone, Default)]
pub struct PagedText {
    pages: Vec<Page>,
}

impl PagedText {
    pub fn parse(text: &str, marker: &Regex) -> Self {
        let mut pages = Vec::<Page>::new();
        let mut current: Option<Page> = None;

        for line in text.lines() {
            if let Some(captures) = marker.captures(line)
                && let Some(number) = captures
                    .get(1)
                    .and_then(|value| value.as_str().parse::<usize>().ok())
            {
                if let Some(page) = current.take() {
                    pages.push(page);
                }
                current = Some(Page {
                    number,
                    text: String::new(),
                });
                continue;
            }

            if let Some(page) = current.as_mut() {
                page.text.push_str(line);
                page.text.push('\n');
            }
        }

        if let Some(page) = current.take() {
            pages.push(page);
        }

        Self { pages }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn get(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// Position of the page carrying `number`, falling back to `number - 1` when the
    /// dump is missing markers.
    pub fn index_of(&self, number: usize) -> Option<usize> {
        if let Some(index) = number.checked_sub(1)
            && self
                .pages
                .get(index)
                .map(|page| page.number == number)
                .unwrap_or(false)
        {
            return Some(index);
        }

        self.pages.iter().position(|page| page.number == number)
    }
}

/// Header/footer lines that must never be read as definition content.
#[derive(Debug, Clone)]
pub struct Boilerplate {
    page_label: Regex,
    bare_number: Regex,
    titles: HashSet<String>,
}

impl Boilerplate {
    pub fn new(document_titles: &[String]) -> Result<Self> {
        Ok(Self {
            page_label: Regex::new(r"(?i)^page\s+\d+(?:\s+of\s+\d+)?\b")
                .context("failed to compile page label regex")?,
            bare_number: Regex::new(r"^\d{1,4}$").context("failed to compile page number regex")?,
            titles: document_titles
                .iter()
                .map(|title| normalize_edge_line(title))
                .filter(|title| !title.is_empty())
                .collect(),
        })
    }

    /// Also treats lines repeated at the top or bottom of at least three pages as titles.
    pub fn detect(paged: &PagedText, document_titles: &[String]) -> Result<Self> {
        let mut boilerplate = Self::new(document_titles)?;
        let texts = paged
            .pages()
            .iter()
            .map(|page| page.text.as_str())
            .collect::<Vec<&str>>();
        boilerplate
            .titles
            .extend(detect_repeated_edge_lines(&texts, true));
        boilerplate
            .titles
            .extend(detect_repeated_edge_lines(&texts, false));
        Ok(boilerplate)
    }

    pub fn is_boilerplate(&self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return false;
        }

        if self.page_label.is_match(trimmed) || self.bare_number.is_match(trimmed) {
            return true;
        }

        if is_notice_line(trimmed) {
            return true;
        }

        !self.titles.is_empty() && self.titles.contains(&normalize_edge_line(trimmed))
    }
}

pub fn is_notice_line(line: &str) -> bool {
    let lower = line.to_ascii_lowercase();
    lower.contains("copyright")
        || lower.contains('©')
        || lower.contains("proprietary")
        || lower.contains("confidential")
        || lower.contains("all rights reserved")
}

fn detect_repeated_edge_lines(pages: &[&str], header: bool) -> HashSet<String> {
    let mut counts = HashMap::<String, usize>::new();
    for page in pages {
        let lines = page.lines().map(str::trim).collect::<Vec<&str>>();
        let candidate = if header {
            lines.iter().copied().find(|line| !line.is_empty())
        } else {
            lines.iter().rev().copied().find(|line| !line.is_empty())
        };

        let Some(candidate) = candidate else {
            continue;
        };

        // Section titles and column-aligned header rows legitimately repeat on continuation pages.
        if SectionKind::from_title(candidate).is_some() || candidate.contains("  ") {
            continue;
        }

        let normalized = normalize_edge_line(candidate);
        if normalized.is_empty() || normalized.len() > 120 {
            continue;
        }
        *counts.entry(normalized).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .filter_map(|(candidate, count)| if count >= 3 { Some(candidate) } else { None })
        .collect()
}

fn normalize_edge_line(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
        .to_ascii_lowercase()
}
