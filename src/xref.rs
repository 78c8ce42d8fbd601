//! Asset cross-reference pass.
//!
//! Runs once over the fully generated tree, after all sub-articles are in
//! place: collects the labels of every figure, video, and table that has
//! both an id and a label, then wraps plain-text mentions of those labels
//! inside paragraph text in `<xref>` elements. More specific labels win
//! overlapping matches (`Author response image 1A-F` over
//! `Author response image 1`), and mentions already inside an `xref` are
//! left alone.

use tracing::debug;

use crate::error::{Error, Result};
use crate::xml::Element;

/// One referenceable asset, derived from the generated tree.
#[derive(Debug, Clone, PartialEq)]
pub struct AssetLabel {
    pub id: String,
    pub ref_type: String,
    pub text: String,
}

fn asset_ref_type(tag_name: &str) -> Option<&'static str> {
    match tag_name {
        "fig" => Some("fig"),
        "media" => Some("video"),
        "table-wrap" => Some("table"),
        _ => None,
    }
}

/// Collect `(id, type, label text)` for every asset element carrying both
/// an `id` attribute and a `label` child.
pub fn labels(root: &Element) -> Vec<AssetLabel> {
    let mut out = Vec::new();
    collect_labels(root, &mut out);
    out
}

fn collect_labels(element: &Element, out: &mut Vec<AssetLabel>) {
    if let Some(ref_type) = asset_ref_type(&element.name)
        && let Some(id) = element.attr("id")
        && let Some(label) = element.elements().find(|e| e.name == "label")
    {
        out.push(AssetLabel {
            id: id.to_string(),
            ref_type: ref_type.to_string(),
            text: label.text_content(),
        });
    }
    for child in element.elements() {
        collect_labels(child, out);
    }
}

/// Wrap label mentions throughout the tree's paragraphs, in place.
pub fn wrap_asset_xrefs(root: &mut Element) -> Result<()> {
    let asset_labels = labels(root);
    if asset_labels.is_empty() {
        return Ok(());
    }
    let ordered = sort_for_matching(&asset_labels);
    debug!(labels = ordered.len(), "wrapping asset cross-references");

    let mut rewrite_error = false;
    root.for_each_mut(&mut |element| {
        if element.name != "p" {
            return;
        }
        let serialized = element.to_xml();
        let rewritten = apply_labels(&serialized, &ordered);
        if rewritten != serialized {
            match Element::parse(&rewritten) {
                Ok(parsed) => *element = parsed,
                Err(_) => rewrite_error = true,
            }
        }
    });
    if rewrite_error {
        return Err(Error::Parse(
            "cross-reference rewrite produced invalid markup".to_string(),
        ));
    }
    Ok(())
}

/// Matchable text of a label: trimmed, with a trailing full stop dropped so
/// `Author response image 1.` matches the mention `Author response image 1`.
fn match_text(label: &AssetLabel) -> &str {
    label.text.trim().trim_end_matches('.')
}

/// Order labels so that labels which are not a prefix of any other label
/// (the most specific ones) match first; stable within each group. Empty
/// labels never match at all.
fn sort_for_matching<'a>(asset_labels: &'a [AssetLabel]) -> Vec<&'a AssetLabel> {
    let is_unique = |label: &AssetLabel| {
        let text = match_text(label);
        !asset_labels.iter().any(|other| {
            let other_text = match_text(other);
            other_text != text && other_text.starts_with(text)
        })
    };
    let mut ordered: Vec<&AssetLabel> = Vec::with_capacity(asset_labels.len());
    ordered.extend(
        asset_labels
            .iter()
            .filter(|label| !match_text(label).is_empty() && is_unique(label)),
    );
    ordered.extend(
        asset_labels
            .iter()
            .filter(|label| !match_text(label).is_empty() && !is_unique(label)),
    );
    ordered
}

fn apply_labels(xml: &str, ordered: &[&AssetLabel]) -> String {
    let mut out = xml.to_string();
    for label in ordered {
        out = wrap_label_matches(&out, label);
    }
    out
}

/// Wrap each free-standing occurrence of the label text, extended over an
/// immediately following panel suffix (`1A`, `1A-F`).
fn wrap_label_matches(xml: &str, label: &AssetLabel) -> String {
    let text = match_text(label);
    if text.is_empty() {
        return xml.to_string();
    }
    let mut result = String::new();
    let mut copied = 0;
    let mut search = 0;

    while let Some(offset) = xml[search..].find(text) {
        let start = search + offset;
        let end = extend_over_suffix(xml, start + text.len());
        if inside_xref(&xml[..start]) {
            search = end;
            continue;
        }
        result.push_str(&xml[copied..start]);
        result.push_str("<xref ref-type=\"");
        result.push_str(&label.ref_type);
        result.push_str("\" rid=\"");
        result.push_str(&label.id);
        result.push_str("\">");
        result.push_str(&xml[start..end]);
        result.push_str("</xref>");
        copied = end;
        search = end;
    }
    result.push_str(&xml[copied..]);
    result
}

fn extend_over_suffix(xml: &str, mut end: usize) -> usize {
    let bytes = xml.as_bytes();
    while end < bytes.len()
        && (bytes[end].is_ascii_uppercase() || bytes[end].is_ascii_digit() || bytes[end] == b'-')
    {
        end += 1;
    }
    // A dangling hyphen is punctuation, not a panel range.
    while end > 0 && bytes[end - 1] == b'-' {
        end -= 1;
    }
    end
}

/// Is the position at the end of `prefix` inside an open `<xref>` element?
fn inside_xref(prefix: &str) -> bool {
    match (prefix.rfind("<xref"), prefix.rfind("</xref>")) {
        (Some(open), Some(close)) => open > close,
        (Some(_), None) => true,
        _ => false,
    }
}

// ============================================================================
// Tests
// ============================================================================
