//! Section boundary detection.
//!
//! The converter's output is one markup stream holding a preamble and any
//! number of decision-letter and author-response sections, each introduced
//! by a fixed marker paragraph such as `<p><bold>Decision letter</bold></p>`.
//! This is a plain string scan; the marker paragraph stays inside the
//! section content and is dropped later, when content blocks are built.

/// The fixed vocabulary of section markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Preamble,
    DecisionLetter,
    AuthorResponse,
}

impl SectionKind {
    /// The bold text of this section's marker paragraph.
    pub fn marker_text(self) -> &'static str {
        match self {
            SectionKind::Preamble => "Preamble",
            SectionKind::DecisionLetter => "Decision letter",
            SectionKind::AuthorResponse => "Author response",
        }
    }

    fn marker_paragraph(self) -> String {
        format!("<p><bold>{}</bold></p>", self.marker_text())
    }
}

/// One section of the source document.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub kind: SectionKind,
    pub content: String,
}

/// Split converter output into ordered sections. Content before the first
/// marker paragraph is ignored, as is a surrounding `<root>` wrapper.
pub fn sections(content: &str) -> Vec<Section> {
    let content = clean_portion(content, "root");

    let mut starts: Vec<(usize, SectionKind)> = Vec::new();
    for kind in [
        SectionKind::Preamble,
        SectionKind::DecisionLetter,
        SectionKind::AuthorResponse,
    ] {
        let marker = kind.marker_paragraph();
        let mut from = 0;
        while let Some(offset) = content[from..].find(&marker) {
            starts.push((from + offset, kind));
            from += offset + marker.len();
        }
    }
    starts.sort_by_key(|(start, _)| *start);

    let mut sections = Vec::with_capacity(starts.len());
    for (index, (start, kind)) in starts.iter().enumerate() {
        let end = starts
            .get(index + 1)
            .map(|(next, _)| *next)
            .unwrap_or(content.len());
        sections.push(Section {
            kind: *kind,
            content: content[*start..end].trim().to_string(),
        });
    }
    sections
}

/// Strip a leading `<p><bold>…</bold></p>` section marker from section
/// content, leaving the body paragraphs.
pub fn strip_marker_paragraph(section: &Section) -> &str {
    let marker = section.kind.marker_paragraph();
    section
        .content
        .strip_prefix(marker.as_str())
        .unwrap_or(&section.content)
        .trim_start()
}

/// Strip a wrapping root tag from either end of a markup portion.
pub fn clean_portion<'a>(content: &'a str, root_tag: &str) -> &'a str {
    let mut portion = content.trim();
    if let Some(rest) = portion.strip_prefix(&format!("<{root_tag}>")) {
        portion = rest;
    }
    if let Some(rest) = portion.strip_suffix(&format!("</{root_tag}>")) {
        portion = rest;
    }
    portion.trim()
}
