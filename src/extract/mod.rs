mod boundary;
mod columns;
mod computed;
mod dom;
mod drift;
mod foreign_keys;
mod indexes;
mod layout;
mod merge;
mod normalize;
mod pages;
mod patterns;
mod sections;
#[cfg(test)]
mod tests;
mod text_pipeline;
mod toc;

pub use boundary::BoundaryOptions;
pub use dom::{DomDocument, extract_from_dom};
pub use drift::DriftReport;
pub use merge::{SourcePreference, merge};
pub use text_pipeline::{TextExtractOptions, extract_from_text};
pub use toc::{TocOptions, build_text_index};
