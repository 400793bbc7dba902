use anyhow::Result;
use tracing::info;

use crate::cli::TocArgs;
use crate::extract::{TocOptions, build_text_index};
use crate::util::{read_text_file, write_json_pretty};

pub fn run(args: TocArgs) -> Result<()> {
    let text = read_text_file(&args.text_path)?;
    let options = TocOptions {
        scan_pages: args.toc_scan_pages,
        max_pages: args.toc_max_pages,
        ..TocOptions::default()
    };
    let entries = build_text_index(&text, &options)?;

    let output_path = args
        .output_path
        .unwrap_or_else(|| args.text_path.with_extension("toc.json"));
    write_json_pretty(&output_path, &entries)?;

    info!(
        path = %output_path.display(),
        entries = entries.len(),
        first_page = ?entries.first().map(|entry| entry.declared_page),
        last_page = ?entries.last().map(|entry| entry.declared_page),
        "wrote table of contents index"
    );
    Ok(())
}
