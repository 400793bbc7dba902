use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    Columns,
    Indexes,
    ForeignKeys,
    ComputedColumns,
}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Columns,
        SectionKind::Indexes,
        SectionKind::ForeignKeys,
        SectionKind::ComputedColumns,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SectionKind::Columns => "Columns",
            SectionKind::Indexes => "Indexes",
            SectionKind::ForeignKeys => "Foreign Keys",
            SectionKind::ComputedColumns => "Computed Columns",
        }
    }

    pub fn item_type(self) -> &'static str {
        match self {
            SectionKind::Columns => "column",
            SectionKind::Indexes => "index",
            SectionKind::ForeignKeys => "foreign key",
            SectionKind::ComputedColumns => "computed column",
        }
    }

    /// Matches a line consisting solely of a section title, ignoring case and spacing.
    pub fn from_title(line: &str) -> Option<Self> {
        let normalized = line.split_whitespace().collect::<Vec<&str>>().join(" ");
        Self::ALL
            .into_iter()
            .find(|kind| kind.title().eq_ignore_ascii_case(&normalized))
    }
}

/// Text strictly between the `kind` header line and the nearest later header of another
/// section, trimmed. `None` when the header is absent.
pub fn extract_section(definition: &str, kind: SectionKind) -> Option<String> {
    let lines = definition.lines().collect::<Vec<&str>>();
    let start = lines
        .iter()
        .position(|line| SectionKind::from_title(line) == Some(kind))?;

    let end = lines
        .iter()
        .enumerate()
        .skip(start + 1)
        .find(|(_, line)| matches!(SectionKind::from_title(line), Some(other) if other != kind))
        .map(|(index, _)| index)
        .unwrap_or(lines.len());

    // Blank edges are dropped but the indentation of the first content line is kept, since
    // header offsets are measured against it.
    let body = &lines[start + 1..end];
    let first = body.iter().position(|line| !line.trim().is_empty());
    let last = body.iter().rposition(|line| !line.trim().is_empty());
    match (first, last) {
        (Some(first), Some(last)) => Some(body[first..=last].join("\n").trim_end().to_string()),
        _ => Some(String::new()),
    }
}
