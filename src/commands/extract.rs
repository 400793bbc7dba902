use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::{info, warn};

use crate::catalog::{CatalogRun, open_catalog, write_catalog};
use crate::cli::ExtractArgs;
use crate::extract::{
    BoundaryOptions, DomDocument, TextExtractOptions, TocOptions, build_text_index,
    extract_from_dom, extract_from_text, merge,
};
use crate::model::{ExtractRunManifest, ExtractSettings, ParsedResult, SourceFile};
use crate::util::{now_utc_string, read_text_file, sha256_file, utc_compact_string, write_json_pretty};

const MANIFEST_VERSION: u32 = 1;

pub fn run(args: ExtractArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let output_path = args
        .output_path
        .clone()
        .unwrap_or_else(|| args.text_path.with_extension("schema.json"));
    let manifest_path = args
        .manifest_path
        .clone()
        .unwrap_or_else(|| args.text_path.with_extension("manifest.json"));

    info!(
        run_id = %run_id,
        text = %args.text_path.display(),
        dom = ?args.dom_path.as_ref().map(|path| path.display().to_string()),
        prefer = args.prefer.as_str(),
        "starting extraction"
    );

    let mut sources = vec![SourceFile {
        role: "text".to_string(),
        path: args.text_path.display().to_string(),
        sha256: sha256_file(&args.text_path)?,
    }];
    let text = read_text_file(&args.text_path)?;

    let toc_options = TocOptions {
        scan_pages: args.toc_scan_pages,
        max_pages: args.toc_max_pages,
        ..TocOptions::default()
    };
    let toc = build_text_index(&text, &toc_options)?;
    if toc.is_empty() {
        warn!(path = %args.text_path.display(), "no table of contents entries; text source yields no tables");
    }

    let text_options = TextExtractOptions {
        boundary: BoundaryOptions {
            page_offset: args.page_offset,
            search_radius: args.search_radius,
            max_pages_per_table: args.max_pages_per_table,
        },
        workers: args.workers,
        document_titles: args.document_titles.clone(),
        abort: None,
    };
    let extraction = extract_from_text(&text, &toc, &text_options)?;
    if extraction.pages == 0 {
        bail!(
            "no page markers found in {}; expected lines like `--- Page 1 ---`",
            args.text_path.display()
        );
    }
    extraction.drift.log_summary(args.drift_top);

    let dom_result = match &args.dom_path {
        Some(dom_path) => {
            sources.push(SourceFile {
                role: "dom".to_string(),
                path: dom_path.display().to_string(),
                sha256: sha256_file(dom_path)?,
            });
            let document = load_dom(dom_path)?;
            extract_from_dom(&document)?
        }
        None => ParsedResult::new(),
    };

    let output = merge(&extraction.result, &dom_result, args.prefer);
    write_json_pretty(&output_path, &output)?;
    info!(
        path = %output_path.display(),
        tables = output.tables.len(),
        warnings = output.metadata.warnings.len(),
        "wrote schema output"
    );

    let completed_at = now_utc_string();

    let catalog_path = match &args.db_path {
        Some(db_path) => {
            let mut connection = open_catalog(db_path)?;
            let catalog_run = CatalogRun {
                run_id: &run_id,
                started_at: &started_at,
                completed_at: &completed_at,
                text_sha256: &sources[0].sha256,
                dom_sha256: sources.get(1).map(|source| source.sha256.as_str()),
            };
            let written = write_catalog(&mut connection, &catalog_run, &output)?;
            info!(path = %db_path.display(), tables = written, "updated schema catalog");
            Some(db_path.display().to_string())
        }
        None => None,
    };

    let manifest = ExtractRunManifest {
        manifest_version: MANIFEST_VERSION,
        run_id,
        started_at,
        completed_at,
        settings: ExtractSettings {
            prefer: args.prefer.as_str().to_string(),
            page_offset: args.page_offset,
            search_radius: args.search_radius,
            max_pages_per_table: args.max_pages_per_table,
            workers: args.workers,
        },
        sources,
        toc_entries: toc.len(),
        text_tables: extraction.result.len(),
        dom_tables: dom_result.len(),
        drift: extraction.drift,
        output_path: output_path.display().to_string(),
        catalog_path,
    };
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote run manifest");

    Ok(())
}

fn load_dom(path: &Path) -> Result<DomDocument> {
    let raw = read_text_file(path)?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}
