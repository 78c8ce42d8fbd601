//! Paragraph classification.
//!
//! Decides, for one paragraph fragment at a time, whether it opens or closes
//! a multi-fragment special block (figure, video, table, quotation), merges
//! into the accumulating previous paragraph, or stands alone. The classifier
//! is pure: it returns a [`Decision`] and mutates nothing; all accumulation
//! happens in the assembler.
//!
//! Bracketed asset markers are matched in their entity-escaped source form
//! (`&lt;Author response image 1&gt;`), since that is how the convention
//! text arrives from the converter. Marker numbers only signal presence;
//! they play no part in grouping.

use std::sync::LazyLock;

use regex::Regex;

use crate::xml::{TagKind, scan_tag};

/// An in-progress multi-fragment special block, carried across assembler
/// iterations. At most one wrap is open at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    Fig,
    Media,
    Table,
    Quote,
}

/// What the assembler should do with the classified content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Flush any pending accumulation and start a new unit.
    Add,
    /// Concatenate onto the pending accumulation, with no separator.
    Append,
}

/// Classification preferences, derived from the section type and config.
#[derive(Debug, Clone, Copy, Default)]
pub struct Prefs {
    /// Collapse runs of fully italic paragraphs into editor-comment
    /// quotation blocks (author-response sections only).
    pub italic_to_disp_quote: bool,
}

/// The previous processing result visible to the classifier: the pending
/// block's accumulated content and the open wrap, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrevState<'a> {
    pub content: Option<&'a str>,
    pub wrap: Option<Wrap>,
}

/// The classifier's decision tuple.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    /// Cleaned content: outer `<p>` wrapper and its namespace declarations
    /// stripped; for italic-run paragraphs, the depth-0 italic tags are
    /// removed and the text re-wrapped as a `<p>` quotation child.
    pub content: String,
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub action: Action,
    pub wrap: Option<Wrap>,
}

impl Decision {
    fn paragraph(content: String, action: Action, wrap: Option<Wrap>) -> Self {
        Decision {
            content,
            tag: "p".to_string(),
            attrs: Vec::new(),
            action,
            wrap,
        }
    }
}

static FIG_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^&lt;(?:author response|decision letter)\s+image\s+\d+\s*&gt;")
        .expect("fig start pattern")
});
static MEDIA_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^&lt;(?:author response|decision letter)\s+video\s+\d+\s*&gt;")
        .expect("media start pattern")
});
static LEGEND_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^&lt;(?:author response|decision letter)\s+(?:image|video|table)\s+\d+\s+title/legend\s*&gt;",
    )
    .expect("legend open pattern")
});
static LEGEND_UNDERWAY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)&lt;(?:author response|decision letter)\s+(?:image|video|table)\s+\d+\s+title/legend\s*&gt;",
    )
    .expect("legend underway pattern")
});
static LEGEND_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)&lt;/[^&]*?\s+title/legend\s*&gt;\s*$").expect("legend close pattern")
});
static TABLE_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^<bold>[^<]*?table\s+\d+\.?\s*</bold>$").expect("table label pattern")
});

/// Does the content begin with a figure start marker?
pub fn is_fig_start(content: &str) -> bool {
    FIG_START.is_match(content)
}

/// Does the content begin with a video start marker?
pub fn is_media_start(content: &str) -> bool {
    MEDIA_START.is_match(content)
}

/// Does the content begin with a title/legend opening marker?
pub fn is_legend_open(content: &str) -> bool {
    LEGEND_OPEN.is_match(content)
}

/// Does the content end with a title/legend closing marker?
pub fn is_legend_close(content: &str) -> bool {
    LEGEND_CLOSE.is_match(content)
}

/// Is the content exactly a bold table label (`<bold>… table N.</bold>`)?
pub fn is_table_label(content: &str) -> bool {
    TABLE_LABEL.is_match(content)
}

/// Classify one paragraph fragment against the previous processing result.
pub fn classify(raw: &str, prev: &PrevState, prefs: &Prefs) -> Decision {
    let content = clean_paragraph(raw);
    match prev.wrap {
        Some(Wrap::Fig) | Some(Wrap::Media) => classify_in_asset_wrap(content, prev),
        // A table wrap accumulates caption text until the actual table
        // fragment arrives; legend markers do not close it.
        Some(Wrap::Table) => Decision::paragraph(content, Action::Append, Some(Wrap::Table)),
        Some(Wrap::Quote) => classify_in_quote_wrap(content),
        None => classify_unwrapped(content, prev, prefs),
    }
}

fn classify_in_asset_wrap(content: String, prev: &PrevState) -> Decision {
    if is_legend_close(&content) {
        // Wrap ends here, content included. The marker itself is stripped
        // by the extractor at assembly time.
        Decision::paragraph(content, Action::Add, None)
    } else if is_legend_open(&content)
        || prev.content.is_some_and(|c| LEGEND_UNDERWAY.is_match(c))
    {
        Decision::paragraph(content, Action::Append, prev.wrap)
    } else {
        // No legend ever opened: a bare marker. The wrap closes before this
        // content, which the assembler re-classifies as a fresh paragraph.
        Decision::paragraph(content, Action::Add, None)
    }
}

fn classify_in_quote_wrap(content: String) -> Decision {
    if let Some(stripped) = strip_outer_italics(&content) {
        Decision::paragraph(format!("<p>{stripped}</p>"), Action::Append, Some(Wrap::Quote))
    } else {
        // A non-italic paragraph always terminates the quotation run and
        // stands apart from it; the assembler re-classifies it.
        Decision::paragraph(content, Action::Add, None)
    }
}

fn classify_unwrapped(content: String, prev: &PrevState, prefs: &Prefs) -> Decision {
    if is_fig_start(&content) {
        return Decision::paragraph(content, Action::Add, Some(Wrap::Fig));
    }
    if is_media_start(&content) {
        return Decision::paragraph(content, Action::Add, Some(Wrap::Media));
    }
    if is_table_label(&content) {
        return Decision::paragraph(content, Action::Add, Some(Wrap::Table));
    }
    if prefs.italic_to_disp_quote
        && let Some(stripped) = strip_outer_italics(&content)
    {
        return Decision {
            content: format!("<p>{stripped}</p>"),
            tag: "p".to_string(),
            attrs: vec![("content-type".to_string(), "editor-comment".to_string())],
            action: Action::Add,
            wrap: Some(Wrap::Quote),
        };
    }
    if let Some(prev_content) = prev.content {
        // Formula adjacency: a paragraph that starts with a display formula,
        // or follows one that does, stands apart.
        if content.starts_with("<disp-formula") || prev_content.starts_with("<disp-formula") {
            return Decision::paragraph(content, Action::Add, None);
        }
        // Otherwise the converter may have split one logical paragraph
        // around an embedded block formula: rejoin with no separator.
        return Decision::paragraph(content, Action::Append, None);
    }
    Decision::paragraph(content, Action::Add, None)
}

/// Strip the outer `<p>` wrapper, along with any namespace declarations the
/// splitter re-attached to it.
pub fn clean_paragraph(raw: &str) -> String {
    let mut content = raw.trim();
    if let Some(rest) = content.strip_prefix("<p>") {
        content = rest;
    } else if content.starts_with("<p ")
        && let Some(gt) = content.find('>')
    {
        content = &content[gt + 1..];
    }
    if let Some(rest) = content.strip_suffix("</p>") {
        content = rest;
    }
    content.to_string()
}

/// If the paragraph is entirely italic runs (formula elements allowed
/// between and inside them), return it with the depth-0 italic tags
/// removed. Returns `None` for anything else.
fn strip_outer_italics(content: &str) -> Option<String> {
    #[derive(Clone, Copy)]
    enum Ctx {
        Outside,
        Italic(usize),
        Formula(usize),
    }

    let bytes = content.as_bytes();
    let mut out = String::with_capacity(content.len());
    let mut ctx = Ctx::Outside;
    let mut saw_italic = false;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            let next = memchr::memchr(b'<', &bytes[i..])
                .map(|offset| i + offset)
                .unwrap_or(bytes.len());
            let text = &content[i..next];
            match ctx {
                Ctx::Outside => {
                    if !text.trim().is_empty() {
                        return None;
                    }
                }
                _ => out.push_str(text),
            }
            i = next;
            continue;
        }

        let tag = scan_tag(content, i)?;
        let token = &content[i..tag.end];
        match ctx {
            Ctx::Outside => match (tag.kind, tag.name) {
                (TagKind::Open, "italic") => {
                    saw_italic = true;
                    ctx = Ctx::Italic(1);
                }
                (TagKind::SelfClose, "italic") => {
                    saw_italic = true;
                }
                (TagKind::Open, "inline-formula" | "disp-formula") => {
                    out.push_str(token);
                    ctx = Ctx::Formula(1);
                }
                (TagKind::SelfClose, "inline-formula" | "disp-formula") => {
                    out.push_str(token);
                }
                _ => return None,
            },
            Ctx::Italic(depth) => match tag.kind {
                TagKind::Open => {
                    out.push_str(token);
                    ctx = Ctx::Italic(depth + 1);
                }
                TagKind::Close => {
                    if depth == 1 {
                        ctx = Ctx::Outside;
                    } else {
                        out.push_str(token);
                        ctx = Ctx::Italic(depth - 1);
                    }
                }
                TagKind::SelfClose => out.push_str(token),
            },
            Ctx::Formula(depth) => {
                out.push_str(token);
                match tag.kind {
                    TagKind::Open => ctx = Ctx::Formula(depth + 1),
                    TagKind::Close => {
                        ctx = if depth == 1 {
                            Ctx::Outside
                        } else {
                            Ctx::Formula(depth - 1)
                        };
                    }
                    TagKind::SelfClose => {}
                }
            }
        }
        i = tag.end;
    }

    match ctx {
        Ctx::Outside if saw_italic => Some(out),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_prefs() -> Prefs {
        Prefs::default()
    }

    fn quote_prefs() -> Prefs {
        Prefs {
            italic_to_disp_quote: true,
        }
    }

    #[test]
    fn test_basic_paragraph() {
        let prev = PrevState::default();
        let decision = classify("<p>Basic.</p>", &prev, &no_prefs());
        assert_eq!(decision.content, "Basic.");
        assert_eq!(decision.tag, "p");
        assert_eq!(decision.action, Action::Add);
        assert_eq!(decision.wrap, None);
    }

    #[test]
    fn test_paragraph_namespace_stripped() {
        let prev = PrevState::default();
        let decision = classify(
            "<p xmlns:xlink=\"http://www.w3.org/1999/xlink\">Hello!</p>",
            &prev,
            &no_prefs(),
        );
        assert_eq!(decision.content, "Hello!");
    }

    #[test]
    fn test_prose_merges_with_previous_paragraph() {
        let prev = PrevState {
            content: Some("Previous."),
            wrap: None,
        };
        let decision = classify("<p>Basic.</p>", &prev, &no_prefs());
        assert_eq!(decision.action, Action::Append);
    }

    #[test]
    fn test_formula_start_stands_apart() {
        let prev = PrevState {
            content: Some("Previous."),
            wrap: None,
        };
        let decision = classify("<p><disp-formula></disp-formula></p>", &prev, &no_prefs());
        assert_eq!(decision.action, Action::Add);
    }

    #[test]
    fn test_paragraph_after_formula_start_stands_apart() {
        let prev = PrevState {
            content: Some("<disp-formula></disp-formula>"),
            wrap: None,
        };
        let decision = classify("<p>After.</p>", &prev, &no_prefs());
        assert_eq!(decision.action, Action::Add);
    }

    #[test]
    fn test_prose_after_formula_bearing_paragraph_merges() {
        let prev = PrevState {
            content: Some("Lead in<disp-formula></disp-formula>"),
            wrap: None,
        };
        let decision = classify("<p>continues after the formula.</p>", &prev, &no_prefs());
        assert_eq!(decision.action, Action::Append);
    }

    #[test]
    fn test_author_image_start() {
        let prev = PrevState::default();
        let decision = classify("<p>&lt;Author response image 1&gt;</p>", &prev, &no_prefs());
        assert_eq!(decision.content, "&lt;Author response image 1&gt;");
        assert_eq!(decision.action, Action::Add);
        assert_eq!(decision.wrap, Some(Wrap::Fig));
    }

    #[test]
    fn test_decision_image_start() {
        let prev = PrevState::default();
        let decision = classify("<p>&lt;Decision letter image 2&gt;</p>", &prev, &no_prefs());
        assert_eq!(decision.wrap, Some(Wrap::Fig));
    }

    #[test]
    fn test_author_video_start() {
        let prev = PrevState::default();
        let decision = classify("<p>&lt;Author response video 1&gt;</p>", &prev, &no_prefs());
        assert_eq!(decision.wrap, Some(Wrap::Media));
    }

    #[test]
    fn test_marker_must_lead_the_paragraph() {
        let prev = PrevState::default();
        let decision = classify(
            "<p>content &lt;Author response image 1&gt;</p>",
            &prev,
            &no_prefs(),
        );
        assert_eq!(decision.wrap, None);
    }

    #[test]
    fn test_image_legend_end() {
        let prev = PrevState {
            content: Some("&lt;Author response image 1&gt;"),
            wrap: Some(Wrap::Fig),
        };
        let decision = classify(
            "<p>blah blah&lt;/Author response image 1 title/legend&gt;</p>",
            &prev,
            &no_prefs(),
        );
        assert_eq!(
            decision.content,
            "blah blah&lt;/Author response image 1 title/legend&gt;"
        );
        assert_eq!(decision.action, Action::Add);
        assert_eq!(decision.wrap, None);
    }

    #[test]
    fn test_legend_continues_across_paragraphs() {
        let accumulated = "&lt;Author response image 1&gt;\
            &lt;Author response image 1 title/legend&gt;<bold>Label.</bold>Title.";
        let prev = PrevState {
            content: Some(accumulated),
            wrap: Some(Wrap::Fig),
        };
        let decision = classify("<p><disp-formula></disp-formula></p>", &prev, &no_prefs());
        assert_eq!(decision.action, Action::Append);
        assert_eq!(decision.wrap, Some(Wrap::Fig));
    }

    #[test]
    fn test_bare_marker_closes_before_plain_paragraph() {
        let prev = PrevState {
            content: Some("&lt;Author response image 1&gt;"),
            wrap: Some(Wrap::Fig),
        };
        let decision = classify("<p>Next regular paragraph.</p>", &prev, &no_prefs());
        assert_eq!(decision.action, Action::Add);
        assert_eq!(decision.wrap, None);
    }

    #[test]
    fn test_table_label_opens_table_wrap() {
        let prev = PrevState::default();
        let decision = classify(
            "<p><bold>Author response Table 1.</bold></p>",
            &prev,
            &no_prefs(),
        );
        assert_eq!(decision.action, Action::Add);
        assert_eq!(decision.wrap, Some(Wrap::Table));
    }

    #[test]
    fn test_table_wrap_ignores_legend_close() {
        let prev = PrevState {
            content: Some("<bold>Author response Table 1.</bold>"),
            wrap: Some(Wrap::Table),
        };
        let decision = classify(
            "<p>&lt;Author response table 1 title/legend&gt;Author response table\
            &lt;/Author response table 1 title/legend&gt;</p>",
            &prev,
            &no_prefs(),
        );
        assert_eq!(decision.action, Action::Append);
        assert_eq!(decision.wrap, Some(Wrap::Table));
    }

    #[test]
    fn test_italic_paragraph_opens_quote() {
        let prev = PrevState::default();
        let decision = classify(
            "<p><italic>Italic paragraph.</italic></p>",
            &prev,
            &quote_prefs(),
        );
        assert_eq!(decision.content, "<p>Italic paragraph.</p>");
        assert_eq!(decision.tag, "p");
        assert_eq!(
            decision.attrs,
            vec![("content-type".to_string(), "editor-comment".to_string())]
        );
        assert_eq!(decision.action, Action::Add);
        assert_eq!(decision.wrap, Some(Wrap::Quote));
    }

    #[test]
    fn test_italic_paragraph_continues_quote() {
        let prev = PrevState {
            content: Some("<p>First quoted paragraph.</p>"),
            wrap: Some(Wrap::Quote),
        };
        let decision = classify(
            "<p><italic>Second quoted paragraph.</italic></p>",
            &prev,
            &quote_prefs(),
        );
        assert_eq!(decision.content, "<p>Second quoted paragraph.</p>");
        assert_eq!(decision.action, Action::Append);
        assert_eq!(decision.wrap, Some(Wrap::Quote));
    }

    #[test]
    fn test_plain_paragraph_terminates_quote_run() {
        let prev = PrevState {
            content: Some("<p>Quoted.</p>"),
            wrap: Some(Wrap::Quote),
        };
        let decision = classify("<p>Response paragraph.</p>", &prev, &quote_prefs());
        assert_eq!(decision.action, Action::Add);
        assert_eq!(decision.wrap, None);
    }

    #[test]
    fn test_italic_without_pref_is_plain() {
        let prev = PrevState::default();
        let decision = classify(
            "<p><italic>Italic paragraph.</italic></p>",
            &prev,
            &no_prefs(),
        );
        assert_eq!(decision.content, "<italic>Italic paragraph.</italic>");
        assert_eq!(decision.wrap, None);
    }

    #[test]
    fn test_partially_italic_is_not_a_quote() {
        let prev = PrevState::default();
        let decision = classify(
            "<p>First <italic>paragraph</italic>.</p>",
            &prev,
            &quote_prefs(),
        );
        assert_eq!(decision.content, "First <italic>paragraph</italic>.");
        assert_eq!(decision.wrap, None);
    }

    #[test]
    fn test_italic_with_inline_formula() {
        let raw = "<p><italic>2. The description ...</italic>\
            <inline-formula><alternatives>\
            <tex-math><![CDATA[- 2\\widetilde{v}]]></tex-math>\
            <mml:math display=\"inline\" xmlns:mml=\"http://www.w3.org/1998/Math/MathML\">\
            <mml:mrow><mml:mo>−</mml:mo><mml:mn>2</mml:mn><mml:mover><mml:mi>v</mml:mi>\
            <mml:mo accent=\"true\">∼</mml:mo></mml:mover></mml:mrow></mml:math>\
            </alternatives></inline-formula><italic>.</italic></p>";
        let expected = "<p>2. The description ...\
            <inline-formula><alternatives>\
            <tex-math><![CDATA[- 2\\widetilde{v}]]></tex-math>\
            <mml:math display=\"inline\" xmlns:mml=\"http://www.w3.org/1998/Math/MathML\">\
            <mml:mrow><mml:mo>−</mml:mo><mml:mn>2</mml:mn><mml:mover><mml:mi>v</mml:mi>\
            <mml:mo accent=\"true\">∼</mml:mo></mml:mover></mml:mrow></mml:math>\
            </alternatives></inline-formula>.</p>";
        let prev = PrevState::default();
        let decision = classify(raw, &prev, &quote_prefs());
        assert_eq!(decision.content, expected);
        assert_eq!(decision.action, Action::Add);
        assert_eq!(decision.wrap, Some(Wrap::Quote));
    }
}
