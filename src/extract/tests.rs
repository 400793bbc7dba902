use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use crate::model::{
    Column, ExtractionSource, ForeignKey, ParsedResult, ParsedSection, Provenance, QualifiedName,
    TocEntry,
};

use super::*;
use super::boundary::{MarkerMatch, TableMarker, TableScan};
use super::columns::parse_columns;
use super::computed::parse_computed_columns;
use super::dom::DomNode;
use super::foreign_keys::parse_foreign_keys;
use super::indexes::parse_indexes;
use super::layout::looks_like_header;
use super::normalize::{capture_default, classify_index_name, decompose_data_type, parse_bool};
use super::pages::{Boilerplate, PagedText};
use super::patterns::Patterns;
use super::sections::{SectionKind, extract_section};
use super::text_pipeline::TextExtraction;

const TITLE: &str = "ACME Data Dictionary";

fn patterns() -> Patterns {
    Patterns::new().expect("patterns compile")
}

/// Builds a `--- Page N ---` dump of `total` pages; `content` supplies the body of selected
/// pages. Every page starts with the running title and ends with a page footer.
fn paged_document(total: usize, content: &[(usize, &str)]) -> String {
    let mut text = String::new();
    for number in 1..=total {
        text.push_str(&format!("--- Page {number} ---\n{TITLE}\n"));
        for (page, body) in content {
            if *page == number {
                text.push_str(body);
                text.push('\n');
            }
        }
        text.push_str(&format!("Page {number} of {total}\n"));
    }
    text
}

/// Places each cell at its character offset.
fn aligned(cells: &[&str], offsets: &[usize]) -> String {
    let mut line = String::new();
    for (cell, offset) in cells.iter().zip(offsets) {
        while line.chars().count() < *offset {
            line.push(' ');
        }
        line.push_str(cell);
    }
    line.trim_end().to_string()
}

fn section(schema: &str, table: &str, provenance: Provenance, columns: Vec<Column>) -> ParsedSection {
    ParsedSection {
        columns,
        ..ParsedSection::empty(QualifiedName::new(schema, table), provenance)
    }
}

fn result_of(sections: Vec<ParsedSection>) -> ParsedResult {
    sections
        .into_iter()
        .map(|section| (section.table.key(), section))
        .collect()
}

const TWO_TABLE_PAGE: &str = "dbo.Customers
Columns
Id int 4 False
Name varchar(50) 50 True
dbo.Orders
Columns
Id int 4 False
CustomerId int 4 False
Foreign Keys
FK_Orders_Customers  CustomerId  dbo.Customers.Id  NO ACTION  CASCADE";

fn two_table_document() -> String {
    paged_document(
        12,
        &[
            (1, "Table of Contents\ndbo.Customers ..... 8\ndbo.Orders ..... 8"),
            (10, TWO_TABLE_PAGE),
        ],
    )
}

#[test]
fn qualified_name_parse_strips_brackets_and_defaults_schema() {
    let name = QualifiedName::parse("[sales].[Order]").expect("name");
    assert_eq!(name.to_string(), "sales.Order");
    assert_eq!(name.key(), "sales.order");

    let bare = QualifiedName::parse("Widget").expect("name");
    assert_eq!(bare.schema, "dbo");
    assert!(QualifiedName::parse("  ").is_none());
}

#[test]
fn paged_text_drops_preamble_and_keeps_page_numbers() {
    let patterns = patterns();
    let paged = PagedText::parse(
        "cover\n--- Page 1 ---\nfirst\n--- Page 2 ---\nsecond\n",
        &patterns.page_marker,
    );
    assert_eq!(paged.len(), 2);
    assert_eq!(paged.pages()[0].number, 1);
    assert_eq!(paged.pages()[1].text, "second\n");
    assert_eq!(paged.index_of(2), Some(1));
    assert_eq!(paged.index_of(9), None);
}

#[test]
fn boilerplate_recognizes_page_labels_notices_and_titles() {
    let boilerplate = Boilerplate::new(&[TITLE.to_string()]).expect("boilerplate");
    assert!(boilerplate.is_boilerplate("Page 3 of 10"));
    assert!(boilerplate.is_boilerplate("  17 "));
    assert!(boilerplate.is_boilerplate("Copyright 2019 ACME Corp."));
    assert!(boilerplate.is_boilerplate("acme  data dictionary"));
    assert!(!boilerplate.is_boilerplate("Id int 4 False"));
    assert!(!boilerplate.is_boilerplate("Columns"));
}

#[test]
fn boilerplate_detects_repeated_running_headers() {
    let patterns = patterns();
    let paged = PagedText::parse(&paged_document(4, &[(2, "Columns")]), &patterns.page_marker);
    let boilerplate = Boilerplate::detect(&paged, &[]).expect("boilerplate");
    assert!(boilerplate.is_boilerplate(TITLE));
    assert!(!boilerplate.is_boilerplate("Columns"));
}

#[test]
fn toc_entries_are_unique_and_sorted_by_page() {
    let text = "--- Page 1 ---
ACME Data Dictionary
--- Page 2 ---
Table of Contents
dbo.Orders ........ 40
[sales].[Customer] ..... 12
DBO.ORDERS ...... 55
dbo.Zero ..... 0
Views
dbo.vwOrders ..... 90
--- Page 3 ---
dbo.Late ..... 5
";
    let entries = build_text_index(text, &TocOptions::default()).expect("toc");
    let names = entries
        .iter()
        .map(|entry| (entry.name.to_string(), entry.declared_page))
        .collect::<Vec<(String, u32)>>();
    assert_eq!(
        names,
        vec![("sales.Customer".to_string(), 12), ("dbo.Orders".to_string(), 40)]
    );
    assert!(entries.windows(2).all(|pair| pair[0].declared_page <= pair[1].declared_page));
}

#[test]
fn toc_stop_requires_a_whole_heading_line() {
    let text = "--- Page 1 ---
Table of Contents
dbo.Views ..... 4
dbo.OrderViews ..... 7
--- Page 2 ---
";
    let entries = build_text_index(text, &TocOptions::default()).expect("toc");
    assert_eq!(entries.len(), 2);
}

#[test]
fn toc_missing_marker_yields_empty_index() {
    let text = paged_document(3, &[(2, "dbo.Orders ..... 4")]);
    let entries = build_text_index(&text, &TocOptions::default()).expect("toc");
    assert!(entries.is_empty());
}

#[test]
fn section_splitter_stops_at_next_section_header() {
    let definition = "dbo.Orders
Columns
Id int 4 False

Indexes
PK_Orders Id True 90

Foreign Keys
FK_Orders_Customers  CustomerId  dbo.Customers.Id";

    assert_eq!(
        extract_section(definition, SectionKind::Columns).as_deref(),
        Some("Id int 4 False")
    );
    assert_eq!(
        extract_section(definition, SectionKind::Indexes).as_deref(),
        Some("PK_Orders Id True 90")
    );
    assert!(extract_section(definition, SectionKind::ComputedColumns).is_none());
    assert_eq!(SectionKind::from_title("  foreign   KEYS "), Some(SectionKind::ForeignKeys));
}

#[test]
fn column_section_parses_single_spaced_rows() {
    let text = "Max Length
Key Name Data Type (Bytes) Allow Nulls Identity Default
Id int 4 False 500001 - 1
Name varchar(255) 255 False
Description varchar(1000) 1000 True
IsActive bit 1 False ((1))";

    let columns = parse_columns(&patterns(), text);
    assert_eq!(columns.len(), 4);

    assert_eq!(columns[0].name, "Id");
    assert_eq!(columns[0].data_type.as_deref(), Some("int"));
    assert_eq!(columns[0].max_length.as_deref(), Some("4"));
    assert_eq!(columns[0].allow_nulls, Some(false));
    assert_eq!(columns[0].identity, Some(true));
    assert_eq!(columns[0].identity_seed.as_deref(), Some("500001"));
    assert_eq!(columns[0].identity_increment.as_deref(), Some("1"));

    assert_eq!(columns[1].data_type.as_deref(), Some("varchar(255)"));
    assert_eq!(columns[1].base_data_type.as_deref(), Some("varchar"));
    assert_eq!(columns[1].max_length.as_deref(), Some("255"));

    assert_eq!(columns[2].allow_nulls, Some(true));

    assert_eq!(columns[3].name, "IsActive");
    assert_eq!(columns[3].default.as_deref(), Some("((1))"));
}

#[test]
fn column_section_uses_header_offsets() {
    let offsets = [0, 5, 19, 34, 54, 67, 77];
    let text = [
        aligned(
            &["Key", "Name", "Data Type", "Max Length (Bytes)", "Allow Nulls", "Identity", "Default"],
            &offsets,
        ),
        aligned(&["PK", "Id", "int", "4", "False", "1 - 1", ""], &offsets),
        aligned(
            &["", "CreatedAt", "datetime", "8", "False", "", "((getdate()))"],
            &offsets,
        ),
        aligned(&["", "Amount", "decimal(18,2)", "9", "True", "", ""], &offsets),
    ]
    .join("\n");

    let columns = parse_columns(&patterns(), &text);
    assert_eq!(columns.len(), 3);
    assert_eq!(columns[0].key.as_deref(), Some("PK"));
    assert_eq!(columns[0].identity_seed.as_deref(), Some("1"));
    assert_eq!(columns[1].name, "CreatedAt");
    assert_eq!(columns[1].default.as_deref(), Some("((getdate()))"));
    assert_eq!(columns[1].identity, None);
    assert_eq!(columns[2].numeric_precision.as_deref(), Some("18"));
    assert_eq!(columns[2].numeric_scale.as_deref(), Some("2"));
    assert_eq!(columns[2].max_length.as_deref(), Some("9"));
}

#[test]
fn repeated_column_rows_keep_first_occurrence() {
    let text = "Id int 4 False
Status varchar(10) 10 True
Key Name Data Type Allow Nulls
status varchar(20) 20 False";
    let columns = parse_columns(&patterns(), text);
    assert_eq!(columns.len(), 2);
    assert_eq!(columns[1].data_type.as_deref(), Some("varchar(10)"));
}

#[test]
fn defaults_round_trip_verbatim() {
    for default in ["((0))", "((getdate()))", "(('N/A'))", "((newid()))", "(((1)+(2)))"] {
        let line = format!("Flag int 4 False {default}");
        assert_eq!(capture_default(&line).as_deref(), Some(default));

        let columns = parse_columns(&patterns(), &line);
        assert_eq!(columns.len(), 1, "{line}");
        assert_eq!(columns[0].default.as_deref(), Some(default));
    }
}

#[test]
fn decimal_type_splits_precision_and_scale() {
    let patterns = patterns();
    let parts = decompose_data_type(&patterns, "decimal(18,2)").expect("type");
    assert_eq!(parts.base, "decimal");
    assert_eq!(parts.precision.as_deref(), Some("18"));
    assert_eq!(parts.scale.as_deref(), Some("2"));
    assert_eq!(parts.length, None);

    let parts = decompose_data_type(&patterns, "nvarchar(max)").expect("type");
    assert_eq!(parts.base, "nvarchar");
    assert_eq!(parts.length.as_deref(), Some("max"));

    let parts = decompose_data_type(&patterns, "float(53)").expect("type");
    assert_eq!(parts.precision.as_deref(), Some("53"));
}

#[test]
fn booleans_accept_common_spellings() {
    assert_eq!(parse_bool(Some("Yes")), Some(true));
    assert_eq!(parse_bool(Some(" n ")), Some(false));
    assert_eq!(parse_bool(Some("1")), Some(true));
    assert_eq!(parse_bool(Some("maybe")), None);
    assert_eq!(parse_bool(None), None);
}

#[test]
fn index_section_parses_single_spaced_rows() {
    let text = "Key Name Key Columns Unique Fill Factor
PK_PhysicianOrder485Order Id True 90
UQ_PhysicianOrder485OrderName Name True 80";

    let indexes = parse_indexes(&patterns(), text);
    assert_eq!(indexes.len(), 2);
    assert_eq!(indexes[0].name, "PK_PhysicianOrder485Order");
    assert_eq!(indexes[0].key_columns.as_deref(), Some("Id"));
    assert!(indexes[0].is_primary);
    assert!(indexes[0].is_unique);
    assert_eq!(indexes[0].fill_factor, Some(90));

    assert_eq!(indexes[1].key_column_list, vec!["Name".to_string()]);
    assert!(!indexes[1].is_primary);
    assert!(indexes[1].is_unique);
    assert_eq!(indexes[1].fill_factor, Some(80));
}

#[test]
fn primary_key_name_wins_over_explicit_flag() {
    assert_eq!(classify_index_name("PK_Order_Id"), (true, true));
    assert_eq!(classify_index_name("UQ_Order_Number"), (false, true));
    assert_eq!(classify_index_name("UK2_Order"), (false, true));
    assert_eq!(classify_index_name("UKRegion_Order"), (false, false));
    assert_eq!(classify_index_name("IX_Order_Date"), (false, false));

    let indexes = parse_indexes(&patterns(), "PK_Order_Id  Id  No  CLUSTERED  100");
    assert_eq!(indexes.len(), 1);
    assert!(indexes[0].is_primary);
    assert!(indexes[0].is_unique);
    assert_eq!(indexes[0].index_type.as_deref(), Some("CLUSTERED"));
    assert_eq!(indexes[0].fill_factor, Some(100));
}

#[test]
fn index_key_columns_drop_sort_qualifiers() {
    let indexes = parse_indexes(&patterns(), "IX_Orders_Date  OrderDate(DESC), Id(ASC)  No");
    assert_eq!(indexes.len(), 1);
    assert_eq!(
        indexes[0].key_column_list,
        vec!["OrderDate".to_string(), "Id".to_string()]
    );
    assert!(!indexes[0].is_unique);
}

#[test]
fn foreign_key_section_splits_three_part_reference() {
    let foreign_keys = parse_foreign_keys(
        &patterns(),
        "FK_Orders_Customers  CustomerId  dbo.Customers.Id  NO ACTION  CASCADE",
    );
    assert_eq!(foreign_keys.len(), 1);
    let foreign_key = &foreign_keys[0];
    assert_eq!(foreign_key.name, "FK_Orders_Customers");
    assert_eq!(foreign_key.column_list, vec!["CustomerId".to_string()]);
    assert_eq!(foreign_key.referenced_schema.as_deref(), Some("dbo"));
    assert_eq!(foreign_key.referenced_table.as_deref(), Some("Customers"));
    assert_eq!(foreign_key.referenced_columns.as_deref(), Some("Id"));
    assert_eq!(foreign_key.update_rule.as_deref(), Some("NO ACTION"));
    assert_eq!(foreign_key.delete_rule.as_deref(), Some("CASCADE"));
}

#[test]
fn foreign_key_section_reads_separate_referenced_column_cell() {
    let foreign_keys = parse_foreign_keys(
        &patterns(),
        "FK_Orders_Customers  CustomerId  dbo.Customers  Id  CASCADE  NO ACTION",
    );
    assert_eq!(foreign_keys.len(), 1);
    let foreign_key = &foreign_keys[0];
    assert_eq!(foreign_key.columns.as_deref(), Some("CustomerId"));
    assert_eq!(foreign_key.referenced_schema.as_deref(), Some("dbo"));
    assert_eq!(foreign_key.referenced_table.as_deref(), Some("Customers"));
    assert_eq!(foreign_key.referenced_columns.as_deref(), Some("Id"));
    assert_eq!(foreign_key.update_rule.as_deref(), Some("CASCADE"));
    assert_eq!(foreign_key.delete_rule.as_deref(), Some("NO ACTION"));

    let without_rules = parse_foreign_keys(
        &patterns(),
        "FK_Lines_Products  ProductId  dbo.Products  Id",
    );
    assert_eq!(without_rules.len(), 1);
    assert_eq!(without_rules[0].referenced_table.as_deref(), Some("Products"));
    assert_eq!(without_rules[0].referenced_column_list, vec!["Id".to_string()]);
    assert_eq!(without_rules[0].update_rule, None);
}

#[test]
fn foreign_key_section_reads_column_list_reference() {
    let foreign_keys = parse_foreign_keys(
        &patterns(),
        "FK_Lines_Orders  OrderId, LineNo  [sales].[Orders] (Id, LineNo)",
    );
    assert_eq!(foreign_keys.len(), 1);
    assert_eq!(foreign_keys[0].referenced_schema.as_deref(), Some("sales"));
    assert_eq!(foreign_keys[0].referenced_table.as_deref(), Some("Orders"));
    assert_eq!(
        foreign_keys[0].referenced_column_list,
        vec!["Id".to_string(), "LineNo".to_string()]
    );
    assert_eq!(
        foreign_keys[0].column_list,
        vec!["OrderId".to_string(), "LineNo".to_string()]
    );
}

#[test]
fn computed_section_keeps_formula_intact() {
    let computed = parse_computed_columns(
        &patterns(),
        "Name Formula Data Type Persisted
FullName (FirstName + ' ' + LastName) nvarchar(101) No",
    );
    assert_eq!(computed.len(), 1);
    assert_eq!(computed[0].name, "FullName");
    assert_eq!(computed[0].formula.as_deref(), Some("(FirstName + ' ' + LastName)"));
    assert_eq!(computed[0].data_type.as_deref(), Some("nvarchar(101)"));
    assert_eq!(computed[0].is_persisted, Some(false));
}

#[test]
fn header_rows_are_recognized_by_vocabulary() {
    assert!(looks_like_header("Key Name Data Type (Bytes) Allow Nulls Identity Default"));
    assert!(looks_like_header("Max Length"));
    assert!(!looks_like_header("Description varchar(1000) 1000 True"));
    assert!(!looks_like_header("Name"));
}

#[test]
fn table_marker_rejects_column_references_and_longer_names() {
    let marker = TableMarker::new(&QualifiedName::new("dbo", "Orders")).expect("marker");
    assert!(marker.is_heading("dbo.Orders"));
    assert!(marker.is_heading("[dbo].[Orders]"));
    assert!(marker.is_strong("Table dbo.Orders (continued)"));
    assert!(!marker.is_strong("FK  dbo.Orders.Id"));
    assert!(!marker.is_strong("dbo.OrdersArchive"));
    assert!(!marker.is_heading("FK_Lines  OrderId  dbo.Orders (Id)"));
    assert!(marker.is_loose("Orders table in the DBO schema"));
}

#[test]
fn two_tables_on_one_page_split_at_next_heading() {
    let text = two_table_document();
    let toc = build_text_index(&text, &TocOptions::default()).expect("toc");
    assert_eq!(toc.len(), 2);

    let extraction = extract_from_text(&text, &toc, &TextExtractOptions::default()).expect("text");
    assert_eq!(extraction.scans.len(), 2);
    assert!(extraction.scans[0].ended_at_next_marker);
    assert_eq!(extraction.scans[0].actual_page, Some(10));
    assert_eq!(extraction.scans[0].drift, Some(0));

    let customers = &extraction.result["dbo.customers"];
    assert_eq!(customers.provenance, Provenance::Text);
    let names = customers
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(names, vec!["Id", "Name"]);
    assert!(customers.foreign_keys.is_empty());

    let orders = &extraction.result["dbo.orders"];
    assert_eq!(orders.columns.len(), 2);
    assert_eq!(orders.foreign_keys.len(), 1);
    assert_eq!(orders.foreign_keys[0].referenced_table.as_deref(), Some("Customers"));
}

#[test]
fn drift_is_actual_minus_expected_page() {
    let text = paged_document(
        50,
        &[
            (1, "Table of Contents\ndbo.Orders ..... 40"),
            (45, "dbo.Orders\nColumns\nId int 4 False"),
        ],
    );
    let toc = build_text_index(&text, &TocOptions::default()).expect("toc");
    let options = TextExtractOptions {
        boundary: BoundaryOptions {
            search_radius: 3,
            ..BoundaryOptions::default()
        },
        ..TextExtractOptions::default()
    };

    let extraction = extract_from_text(&text, &toc, &options).expect("text");
    let scan = &extraction.scans[0];
    assert_eq!(scan.expected_page, 42);
    assert_eq!(scan.actual_page, Some(45));
    assert_eq!(scan.drift, Some(3));
    assert_eq!(scan.match_kind, Some(MarkerMatch::Heading));

    assert_eq!(extraction.drift.located_tables, 1);
    assert_eq!(extraction.drift.tables_with_drift, 1);
    assert_eq!(extraction.drift.distribution.get(&3), Some(&1));
    assert_eq!(extraction.result["dbo.orders"].columns.len(), 1);
}

fn orders_extraction(content: &[(usize, &str)], boundary: BoundaryOptions) -> TextExtraction {
    let mut pages = vec![(1, "Table of Contents\ndbo.Orders ..... 40")];
    pages.extend_from_slice(content);
    let text = paged_document(50, &pages);
    let toc = build_text_index(&text, &TocOptions::default()).expect("toc");
    let options = TextExtractOptions {
        boundary,
        ..TextExtractOptions::default()
    };
    extract_from_text(&text, &toc, &options).expect("text")
}

#[test]
fn repeated_heading_in_window_takes_first_page_and_is_counted() {
    let extraction = orders_extraction(
        &[
            (41, "dbo.Orders\nColumns\nId int 4 False"),
            (43, "dbo.Orders\nColumns\nCode char 2 True"),
        ],
        BoundaryOptions {
            max_pages_per_table: 1,
            ..BoundaryOptions::default()
        },
    );

    let scan = &extraction.scans[0];
    assert_eq!(scan.actual_page, Some(41));
    assert_eq!(scan.drift, Some(-1));
    assert_eq!(scan.match_kind, Some(MarkerMatch::Heading));
    assert!(scan.ambiguous_candidates > 0);
    assert_eq!(extraction.drift.ambiguous_tables, 1);

    let names = extraction.result["dbo.orders"]
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(names, vec!["Id"]);
}

#[test]
fn inline_marker_is_used_without_a_heading() {
    let extraction = orders_extraction(
        &[(42, "Definition of dbo.Orders follows\nColumns\nId int 4 False")],
        BoundaryOptions::default(),
    );

    let scan = &extraction.scans[0];
    assert_eq!(scan.match_kind, Some(MarkerMatch::Inline));
    assert_eq!(scan.actual_page, Some(42));
    assert_eq!(scan.ambiguous_candidates, 0);
    assert_eq!(extraction.result["dbo.orders"].columns.len(), 1);
}

#[test]
fn loose_words_are_the_last_resort() {
    let extraction = orders_extraction(
        &[(43, "Orders table of the DBO schema\nColumns\nId int 4 False")],
        BoundaryOptions::default(),
    );

    let scan = &extraction.scans[0];
    assert_eq!(scan.match_kind, Some(MarkerMatch::Loose));
    assert_eq!(scan.actual_page, Some(43));
    assert_eq!(scan.drift, Some(1));
    assert_eq!(extraction.drift.located_tables, 1);
    assert_eq!(extraction.result["dbo.orders"].columns.len(), 1);
}

#[test]
fn table_outside_search_window_is_not_found() {
    let text = paged_document(
        50,
        &[
            (1, "Table of Contents\ndbo.Orders ..... 40"),
            (48, "dbo.Orders\nColumns\nId int 4 False"),
        ],
    );
    let toc = build_text_index(&text, &TocOptions::default()).expect("toc");
    let extraction = extract_from_text(&text, &toc, &TextExtractOptions::default()).expect("text");
    assert!(extraction.result.is_empty());
    assert_eq!(extraction.drift.not_found_tables, vec!["dbo.Orders".to_string()]);
}

#[test]
fn text_extraction_is_idempotent() {
    let text = two_table_document();
    let toc = build_text_index(&text, &TocOptions::default()).expect("toc");
    let options = TextExtractOptions {
        workers: 2,
        ..TextExtractOptions::default()
    };
    let first = extract_from_text(&text, &toc, &options).expect("first");
    let second = extract_from_text(&text, &toc, &options).expect("second");
    assert_eq!(first.result, second.result);
    assert_eq!(first.scans, second.scans);
}

#[test]
fn raised_abort_flag_skips_every_table() {
    let text = two_table_document();
    let toc = build_text_index(&text, &TocOptions::default()).expect("toc");
    let options = TextExtractOptions {
        abort: Some(Arc::new(AtomicBool::new(true))),
        ..TextExtractOptions::default()
    };
    let extraction = extract_from_text(&text, &toc, &options).expect("text");
    assert!(extraction.result.is_empty());
    assert!(extraction.scans.iter().all(|scan| scan.skipped));
    assert_eq!(extraction.drift.skipped_tables, 2);
}

#[test]
fn zero_workers_is_rejected() {
    let options = TextExtractOptions {
        workers: 0,
        ..TextExtractOptions::default()
    };
    assert!(extract_from_text("", &[], &options).is_err());
}

#[test]
fn drift_report_orders_by_absolute_drift_then_name() {
    let scan = |table: &str, actual_page: Option<usize>, drift: Option<i64>| TableScan {
        table: table.to_string(),
        declared_page: 10,
        expected_page: 12,
        actual_page,
        drift,
        match_kind: actual_page.map(|_| MarkerMatch::Heading),
        ambiguous_candidates: 0,
        pages_read: 1,
        ended_at_next_marker: false,
        skipped: false,
        definition: None,
    };
    let report = DriftReport::from_scans(&[
        scan("dbo.B", Some(16), Some(4)),
        scan("dbo.A", Some(8), Some(-4)),
        scan("dbo.C", Some(14), Some(2)),
        scan("dbo.D", None, None),
        scan("dbo.E", Some(12), Some(0)),
    ]);

    let order = report
        .drifted
        .iter()
        .map(|record| record.table.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(order, vec!["dbo.A", "dbo.B", "dbo.C"]);
    assert_eq!(report.located_tables, 4);
    assert_eq!(report.tables_with_drift, 3);
    assert_eq!(report.not_found_tables, vec!["dbo.D".to_string()]);
    assert_eq!(
        report.distribution.keys().copied().collect::<Vec<i64>>(),
        vec![-4, 0, 2, 4]
    );
}

fn orders_dom() -> DomDocument {
    let row = |cells: &[&str]| cells.iter().map(|cell| cell.to_string()).collect::<Vec<String>>();
    let first_page = DomNode::Container {
        page: Some(3),
        children: vec![
            DomNode::Table {
                rows: vec![row(&["Document", "Version"]), row(&["Dictionary", "2"])],
            },
            DomNode::Heading {
                level: 2,
                text: "[dbo].[Orders]".to_string(),
            },
            DomNode::Heading {
                level: 3,
                text: "Columns".to_string(),
            },
            DomNode::Table {
                rows: vec![
                    row(&["Key", "Name", "Data Type", "Max Length (Bytes)", "Allow Nulls"]),
                    row(&["PK", "Id", "int", "4", "False"]),
                    row(&["", "Status", "varchar", "", "True"]),
                ],
            },
            DomNode::Paragraph {
                text: "Indexes".to_string(),
            },
            DomNode::Table {
                rows: vec![
                    row(&["Key Name", "Key Columns", "Unique"]),
                    row(&["PK_Orders", "Id", "True"]),
                ],
            },
        ],
    };
    let second_page = DomNode::Container {
        page: Some(4),
        children: vec![
            DomNode::Table {
                rows: vec![row(&["IX_Orders_Status", "Status", "False"])],
            },
            DomNode::Table {
                rows: vec![row(&["Property", "Value"]), row(&["Owner", "Sales"])],
            },
            DomNode::Heading {
                level: 2,
                text: "dbo.Empty".to_string(),
            },
        ],
    };
    DomDocument {
        nodes: vec![first_page, second_page],
    }
}

#[test]
fn dom_tables_are_classified_and_continued() {
    let result = extract_from_dom(&orders_dom()).expect("dom");
    assert_eq!(result.len(), 1);

    let orders = &result["dbo.orders"];
    assert_eq!(orders.provenance, Provenance::Dom);
    assert_eq!(orders.table.to_string(), "dbo.Orders");
    assert_eq!(orders.columns.len(), 2);
    assert_eq!(orders.columns[0].key.as_deref(), Some("PK"));
    assert_eq!(orders.columns[0].max_length.as_deref(), Some("4"));
    assert_eq!(orders.columns[1].data_type.as_deref(), Some("varchar"));
    assert_eq!(orders.columns[1].allow_nulls, Some(true));

    let index_names = orders
        .indexes
        .iter()
        .map(|index| index.name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(index_names, vec!["PK_Orders", "IX_Orders_Status"]);
    assert!(orders.indexes[0].is_primary);
    assert!(!orders.indexes[1].is_unique);
}

#[test]
fn dom_document_deserializes_from_tagged_json() {
    let json = r#"{
        "nodes": [
            {"kind": "heading", "level": 1, "text": "dbo.Orders"},
            {"kind": "container", "children": [
                {"kind": "table", "rows": [["Name", "Formula", "Persisted"], ["Total", "([Qty]*[Price])", "Yes"]]}
            ]}
        ]
    }"#;
    let document = serde_json::from_str::<DomDocument>(json).expect("json");
    let result = extract_from_dom(&document).expect("dom");
    let computed = &result["dbo.orders"].computed_columns;
    assert_eq!(computed.len(), 1);
    assert_eq!(computed[0].formula.as_deref(), Some("([Qty]*[Price])"));
    assert_eq!(computed[0].is_persisted, Some(true));
}

#[test]
fn dom_caption_decides_category_over_header_words() {
    let row = |cells: &[&str]| cells.iter().map(|cell| cell.to_string()).collect::<Vec<String>>();
    let heading = |level: u8, text: &str| DomNode::Heading {
        level,
        text: text.to_string(),
    };
    let document = DomDocument {
        nodes: vec![
            heading(2, "dbo.Orders"),
            heading(3, "Indexes"),
            DomNode::Table {
                rows: vec![
                    row(&["Name", "Columns", "Type", "Unique"]),
                    row(&["IX_Orders_Status", "Status", "NONCLUSTERED", "False"]),
                ],
            },
            heading(3, "Computed Columns"),
            DomNode::Table {
                rows: vec![
                    row(&["Name", "Data Type", "Definition", "Persisted"]),
                    row(&["Total", "money", "([Qty]*[Price])", "Yes"]),
                ],
            },
        ],
    };

    let result = extract_from_dom(&document).expect("dom");
    let orders = &result["dbo.orders"];
    assert!(orders.columns.is_empty());

    assert_eq!(orders.indexes.len(), 1);
    assert_eq!(orders.indexes[0].name, "IX_Orders_Status");
    assert_eq!(orders.indexes[0].key_columns.as_deref(), Some("Status"));
    assert_eq!(orders.indexes[0].index_type.as_deref(), Some("NONCLUSTERED"));

    assert_eq!(orders.computed_columns.len(), 1);
    assert_eq!(orders.computed_columns[0].name, "Total");
    assert_eq!(orders.computed_columns[0].formula.as_deref(), Some("([Qty]*[Price])"));
    assert_eq!(orders.computed_columns[0].is_persisted, Some(true));
}

fn column(name: &str, data_type: &str) -> Column {
    Column {
        name: name.to_string(),
        data_type: Some(data_type.to_string()),
        ..Column::default()
    }
}

#[test]
fn text_only_table_is_copied_verbatim() {
    let columns = parse_columns(&patterns(), "Id int 4 False\nName varchar(50) 50 True");
    let text = result_of(vec![section("dbo", "Orders", Provenance::Text, columns.clone())]);
    let output = merge(&text, &ParsedResult::new(), SourcePreference::Dom);

    let table = &output.tables["dbo.Orders"];
    assert_eq!(table.extraction_source, ExtractionSource::TextOnly);
    assert_eq!(table.columns, columns);
    assert!(table.warnings.is_empty());
    assert_eq!(output.metadata.text_only_tables, 1);
    assert_eq!(output.metadata.total_tables, 1);
}

#[test]
fn conflicting_type_keeps_preferred_source_with_one_warning() {
    let text = result_of(vec![section(
        "dbo",
        "Orders",
        Provenance::Text,
        vec![column("Id", "int"), column("Status", "varchar(10)")],
    )]);
    let dom = result_of(vec![section(
        "dbo",
        "Orders",
        Provenance::Dom,
        vec![column("Id", "int"), column("status", "varchar")],
    )]);

    let output = merge(&text, &dom, SourcePreference::Dom);
    let table = &output.tables["dbo.Orders"];
    assert_eq!(table.extraction_source, ExtractionSource::Merged);
    assert_eq!(table.columns.len(), 2);
    assert_eq!(table.columns[1].data_type.as_deref(), Some("varchar"));
    assert_eq!(table.warnings.len(), 1);
    assert!(table.warnings[0].contains("Status"));
    assert!(table.warnings[0].contains("data_type"));
    assert!(table.warnings[0].contains("dom='varchar'"));
    assert_eq!(output.metadata.warnings, table.warnings);
    assert_eq!(output.metadata.merged_tables, 1);

    let output = merge(&text, &dom, SourcePreference::Text);
    let table = &output.tables["dbo.Orders"];
    assert_eq!(table.columns[1].data_type.as_deref(), Some("varchar(10)"));
    assert!(table.warnings[0].ends_with("Using text version."));
}

#[test]
fn secondary_only_items_append_in_order() {
    let text = result_of(vec![section(
        "dbo",
        "Orders",
        Provenance::Text,
        vec![column("Id", "int"), column("Note", "text"), column("Flag", "bit")],
    )]);
    let dom = result_of(vec![section("dbo", "Orders", Provenance::Dom, vec![column("Id", "int")])]);

    let output = merge(&text, &dom, SourcePreference::Dom);
    let names = output.tables["dbo.Orders"]
        .columns
        .iter()
        .map(|column| column.name.as_str())
        .collect::<Vec<&str>>();
    assert_eq!(names, vec!["Id", "Note", "Flag"]);
    assert!(output.metadata.warnings.is_empty());
}

#[test]
fn unnamed_secondary_foreign_key_is_appended_with_warning() {
    let mut text_section = section("dbo", "Orders", Provenance::Text, Vec::new());
    text_section.foreign_keys = vec![ForeignKey {
        columns: Some("CustomerId".to_string()),
        referenced_table: Some("Customers".to_string()),
        ..ForeignKey::default()
    }];
    let mut dom_section = section("dbo", "Orders", Provenance::Dom, Vec::new());
    dom_section.foreign_keys = vec![ForeignKey {
        name: "FK_Orders_Customers".to_string(),
        ..ForeignKey::default()
    }];

    let output = merge(
        &result_of(vec![text_section]),
        &result_of(vec![dom_section]),
        SourcePreference::Dom,
    );
    let table = &output.tables["dbo.Orders"];
    assert_eq!(table.foreign_keys.len(), 2);
    assert_eq!(table.warnings.len(), 1);
    assert!(table.warnings[0].contains("missing name"));
}

#[test]
fn merge_counts_each_source() {
    let text = result_of(vec![
        section("dbo", "A", Provenance::Text, vec![column("Id", "int")]),
        section("dbo", "B", Provenance::Text, vec![column("Id", "int")]),
    ]);
    let dom = result_of(vec![
        section("dbo", "B", Provenance::Dom, vec![column("Id", "int")]),
        section("dbo", "C", Provenance::Dom, vec![column("Id", "int")]),
    ]);
    let output = merge(&text, &dom, SourcePreference::default());
    assert_eq!(output.metadata.preference, "dom");
    assert_eq!(output.metadata.total_tables, 3);
    assert_eq!(output.metadata.text_only_tables, 1);
    assert_eq!(output.metadata.dom_only_tables, 1);
    assert_eq!(output.metadata.merged_tables, 1);
    assert_eq!(
        output.tables.keys().cloned().collect::<Vec<String>>(),
        vec!["dbo.A".to_string(), "dbo.B".to_string(), "dbo.C".to_string()]
    );
}

#[test]
fn toc_entry_slice_can_be_built_by_hand() {
    let toc = vec![TocEntry {
        name: QualifiedName::new("dbo", "Orders"),
        declared_page: 40,
    }];
    let text = paged_document(50, &[(42, "[dbo].[Orders]\nColumns\nId int 4 False")]);
    let extraction = extract_from_text(&text, &toc, &TextExtractOptions::default()).expect("text");
    assert_eq!(extraction.scans[0].drift, Some(0));
    assert_eq!(extraction.result["dbo.orders"].columns[0].name, "Id");
}
