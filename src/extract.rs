//! Asset content extraction.
//!
//! Once the assembler closes a figure, video, or table wrap, the
//! accumulated raw text lands here to be pulled apart into label, title,
//! and caption, and rebuilt as the corresponding structural element.
//!
//! The label is the first `<bold>` run. The remainder splits at bare full
//! stops: a small tag-depth tracker walks the string once, so periods
//! inside nested markup (`<italic>B. subtilis</italic>`, formula content,
//! ext-link anchors) never count as sentence boundaries. The title runs
//! through the last bare full stop; whatever follows becomes the caption.
//! When no bare full stop exists the whole remainder is the title — an
//! empty caption beats a crash, since captions are supplementary.

use std::sync::LazyLock;

use regex::Regex;

use crate::article::ContentBlock;
use crate::xml::{TagKind, scan_tag};

/// Label, title, and caption pulled from one asset's accumulated text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetText {
    pub label: Option<String>,
    pub title: Option<String>,
    pub caption: Option<String>,
}

static ASSET_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*&lt;((?:author response|decision letter)\s+(?:image|video)\s+\d+)\s*&gt;")
        .expect("asset marker pattern")
});
static LEGEND_OPEN_ANY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)&lt;(?:author response|decision letter)\s+(?:image|video|table)\s+\d+\s+title/legend\s*&gt;",
    )
    .expect("legend open pattern")
});
static TRAILING_CLOSE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)&lt;/[^&]*?&gt;\s*$").expect("trailing close pattern"));
static BOLD_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*<bold>(.*?)</bold>").expect("bold label pattern"));

/// Extract label, title, and caption from legend text.
pub fn extract_label_title_caption(text: &str) -> AssetText {
    let Some(captures) = BOLD_LABEL.captures(text) else {
        return AssetText {
            label: None,
            title: non_empty(text.trim()),
            caption: None,
        };
    };
    let (Some(whole), Some(label)) = (captures.get(0), captures.get(1)) else {
        return AssetText::default();
    };
    let remainder = &text[whole.end()..];
    let (title, caption) = split_title_caption(remainder);
    AssetText {
        label: non_empty(label.as_str()),
        title,
        caption,
    }
}

fn split_title_caption(remainder: &str) -> (Option<String>, Option<String>) {
    match last_bare_full_stop(remainder) {
        Some(position) => {
            let title = remainder[..=position].trim();
            let caption = remainder[position + 1..].trim();
            (non_empty(title), non_empty(caption))
        }
        None => (non_empty(remainder.trim()), None),
    }
}

/// Byte index of the last `.` outside any nested element. Periods inside
/// tag tokens (attribute values included) are skipped wholesale because the
/// scanner jumps over each tag. Returns `None` when the markup defeats the
/// tracker, which callers treat as "no split point".
fn last_bare_full_stop(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut last = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => {
                let tag = scan_tag(text, i)?;
                match tag.kind {
                    TagKind::Open => depth += 1,
                    TagKind::Close => depth = depth.saturating_sub(1),
                    TagKind::SelfClose => {}
                }
                i = tag.end;
            }
            b'.' => {
                if depth == 0 {
                    last = Some(i);
                }
                i += 1;
            }
            _ => i += 1,
        }
    }
    last
}

fn non_empty(text: &str) -> Option<String> {
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Extract an asset's parts from accumulated figure or video text.
///
/// Strips the leading asset marker and the title/legend open and close
/// markers first. A bare marker with nothing after it yields a label-only
/// asset whose label is the marker text itself.
pub fn build_fig(content: &str) -> AssetText {
    let mut text = content.trim().to_string();
    let marker = ASSET_MARKER.captures(&text).and_then(|captures| {
        match (captures.get(0), captures.get(1)) {
            (Some(whole), Some(inner)) => Some((whole.end(), inner.as_str().to_string())),
            _ => None,
        }
    });
    let mut marker_text = None;
    if let Some((end, inner)) = marker {
        marker_text = Some(unescape_marker(&inner));
        text.replace_range(..end, "");
    }
    strip_legend_markers(&mut text);
    let text = text.trim();
    if text.is_empty() {
        return AssetText {
            label: marker_text,
            title: None,
            caption: None,
        };
    }
    extract_label_title_caption(text)
}

/// Extract a table-wrap's parts from accumulated caption text.
pub fn build_table_wrap(caption_text: &str) -> AssetText {
    let mut text = caption_text.trim().to_string();
    strip_legend_markers(&mut text);
    let text = text.trim();
    if text.is_empty() {
        return AssetText::default();
    }
    extract_label_title_caption(text)
}

fn strip_legend_markers(text: &mut String) {
    if let Some(range) = LEGEND_OPEN_ANY.find(text).map(|found| found.range()) {
        text.replace_range(range, "");
    }
    if let Some(start) = TRAILING_CLOSE.find(text).map(|found| found.start()) {
        text.truncate(start);
    }
}

fn unescape_marker(text: &str) -> String {
    match quick_xml::escape::unescape(text) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => text.to_string(),
    }
}

// ============================================================================
// Structural element builders
// ============================================================================

/// Build a `fig` block: label, optional caption, and a graphic whose
/// `xlink:href` placeholder is replaced during filename assignment.
pub fn fig_block(asset: &AssetText) -> ContentBlock {
    let mut content = label_markup(asset);
    content.push_str(&caption_markup(asset));
    content.push_str("<graphic mimetype=\"image\" xlink:href=\"todo\" />");
    ContentBlock::new("fig", content)
}

/// Build a `media` block; the media element itself carries the mimetype and
/// placeholder `xlink:href`.
pub fn media_block(asset: &AssetText) -> ContentBlock {
    let mut content = label_markup(asset);
    content.push_str(&caption_markup(asset));
    ContentBlock::new("media", content)
        .with_attr("mimetype", "video")
        .with_attr("xlink:href", "todo")
}

/// Build a `table-wrap` block around the raw table markup.
pub fn table_wrap_block(asset: &AssetText, table_markup: &str) -> ContentBlock {
    let mut content = label_markup(asset);
    content.push_str(&caption_markup(asset));
    content.push_str(&table_element(table_markup));
    ContentBlock::new("table-wrap", content)
}

fn label_markup(asset: &AssetText) -> String {
    match &asset.label {
        Some(label) => format!("<label>{label}</label>"),
        None => String::new(),
    }
}

fn caption_markup(asset: &AssetText) -> String {
    match (&asset.title, &asset.caption) {
        (Some(title), Some(caption)) => {
            format!("<caption><title>{title}</title><p>{caption}</p></caption>")
        }
        (Some(title), None) => format!("<caption><title>{title}</title></caption>"),
        (None, _) => String::new(),
    }
}

/// Re-emit table markup under the journal's fixed table attributes.
fn table_element(markup: &str) -> String {
    let inner = table_inner(markup);
    if inner.trim().is_empty() {
        "<table frame=\"hsides\" rules=\"groups\" />".to_string()
    } else {
        format!("<table frame=\"hsides\" rules=\"groups\">{inner}</table>")
    }
}

fn table_inner(markup: &str) -> &str {
    let markup = markup.trim();
    let Some(rest) = markup.strip_prefix("<table") else {
        return markup;
    };
    let Some(gt) = rest.find('>') else {
        return "";
    };
    if rest[..gt].ends_with('/') {
        return "";
    }
    rest[gt + 1..].strip_suffix("</table>").unwrap_or(&rest[gt + 1..])
}

// ============================================================================
// Tests
// ============================================================================
