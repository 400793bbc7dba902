use anyhow::{Context, Result};
use regex::Regex;

use super::pages::Boilerplate;

/// Every fixed pattern the extractors need, compiled once per run and shared read-only
/// across workers.
#[derive(Debug, Clone)]
pub(crate) struct Patterns {
    pub page_marker: Regex,
    pub toc_line: Regex,
    pub toc_stop: Regex,
    pub table_heading: Regex,
    pub cell_split: Regex,
    pub type_parts: Regex,
    pub identity_seed: Regex,
    pub sort_qualifier: Regex,
    pub reference_three: Regex,
    pub reference_two: Regex,
    pub reference_one: Regex,
    pub reference_list: Regex,
    pub column_row: Regex,
    pub index_row: Regex,
    pub foreign_key_row: Regex,
    pub referential_rule: Regex,
    pub computed_row: Regex,
    pub boilerplate: Boilerplate,
}

const IDENT: &str = r"\[?([^\[\]\.\s()]+)\]?";
const RULE: &str = r"cascade|no action|set null|set default|restrict";

impl Patterns {
    pub fn new() -> Result<Self> {
        Ok(Self {
            page_marker: Regex::new(r"^\s*-{2,}\s*Page\s+(\d+)\s*-{2,}\s*$")
                .context("failed to compile page marker regex")?,
            toc_line: Regex::new(
                r"^\s*(?P<name>\[?[A-Za-z_][\w$#@]*\]?\.\[?[A-Za-z_][\w$#@]*\]?)[\s.…·]+(?P<page>\d+)\s*$",
            )
            .context("failed to compile table-of-contents line regex")?,
            toc_stop: Regex::new(
                r"(?i)^\s*(?:\d+(?:\.\d+)*\s+)?(?:views|stored procedures|functions|user defined functions|triggers)\s*(?:[.…·\s]+\d+)?\s*$",
            )
            .context("failed to compile table-of-contents stop regex")?,
            table_heading: Regex::new(r"\[?([A-Za-z_][\w$#@]*)\]?\.\[?([A-Za-z_][\w$#@]*)\]?")
                .context("failed to compile table heading regex")?,
            cell_split: Regex::new(r"\t+|\s{2,}").context("failed to compile cell split regex")?,
            type_parts: Regex::new(
                r"^\s*([A-Za-z_][\w ]*?)\s*(?:\(\s*([^,()]+?)\s*(?:,\s*([^,()]+?)\s*)?\))?\s*$",
            )
            .context("failed to compile data type regex")?,
            identity_seed: Regex::new(r"^\s*(\d+)\s*[-,]\s*(-?\d+)\s*$")
                .context("failed to compile identity seed regex")?,
            sort_qualifier: Regex::new(r"(?i)\s*\(\s*(?:asc|desc)\s*\)|\s+(?:asc|desc)\b")
                .context("failed to compile sort qualifier regex")?,
            reference_three: Regex::new(&format!(r"^\s*{IDENT}\.{IDENT}\.{IDENT}\s*$"))
                .context("failed to compile three-part reference regex")?,
            reference_two: Regex::new(&format!(r"^\s*{IDENT}\.{IDENT}\s*$"))
                .context("failed to compile two-part reference regex")?,
            reference_one: Regex::new(&format!(r"^\s*{IDENT}\s*$"))
                .context("failed to compile single-part reference regex")?,
            reference_list: Regex::new(&format!(
                r"^\s*(?:{IDENT}\.)?{IDENT}\s*\(([^)]*)\)\s*$"
            ))
            .context("failed to compile column-list reference regex")?,
            column_row: Regex::new(
                r"(?i)^\s*(?:(?P<key>PK\s*,\s*FK|PK|FK|UK|UQ)\s+)?(?P<name>[A-Za-z_@#][\w$#@]*)\s+(?P<type>[A-Za-z_]\w*(?:\s*\(\s*(?:\d+|max)\s*(?:,\s*\d+\s*)?\))?)(?:\s+(?P<length>\d+|max|-1))?(?:\s+(?P<nulls>yes|no|y|n|true|false|1|0))?(?:\s+(?P<identity>\d+\s*-\s*-?\d+|yes|no|y|n|true|false))?(?:\s+(?P<default>\(.*\)))?\s*$",
            )
            .context("failed to compile column row regex")?,
            index_row: Regex::new(
                r"(?i)^\s*(?P<name>\S+)\s+(?P<columns>.+?)(?:\s+(?P<unique>yes|no|y|n|true|false|unique))?(?:\s+(?P<kind>(?:non)?clustered(?:\s+columnstore)?|heap|xml|spatial))?(?:\s+(?P<fill>\d{1,3}))?\s*$",
            )
            .context("failed to compile index row regex")?,
            foreign_key_row: Regex::new(&format!(
                r"(?i)^\s*(?P<name>\S+)\s+(?P<columns>.+?)\s+(?P<reference>\[?[\w$#@]+\]?\.\[?[\w$#@]+\]?(?:\.\[?[\w$#@]+\]?)?(?:\s*\([^)]*\))?)(?:\s+(?P<update>{RULE}))?(?:\s+(?P<delete>{RULE}))?\s*$"
            ))
            .context("failed to compile foreign key row regex")?,
            referential_rule: Regex::new(&format!(r"(?i)^\s*(?:{RULE})\s*$"))
                .context("failed to compile referential rule regex")?,
            computed_row: Regex::new(
                r"(?i)^\s*(?P<name>[A-Za-z_@#][\w$#@]*)\s+(?P<formula>\(.*?\))(?:\s+(?P<type>[A-Za-z_]\w*(?:\s*\([^)]*\))?))?(?:\s+(?P<persisted>yes|no|y|n|true|false))?\s*$",
            )
            .context("failed to compile computed column row regex")?,
            boilerplate: Boilerplate::new(&[])?,
        })
    }
}
