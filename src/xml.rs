//! Owned XML tree built on quick-xml events.
//!
//! Provides the tree half of the dual representation used throughout the
//! crate: sections are parsed into [`Element`] trees for structural passes
//! (math cleanup, fragment splitting, id assignment), while marker detection
//! stays plain string matching on the serialized form.
//!
//! Text nodes and attribute values are stored in their *source* form, with
//! entities left untouched, and written back verbatim. This keeps
//! entity-escaped marker text such as `&lt;Author response image 1&gt;`
//! byte-identical across a parse/serialize round trip. Values set
//! programmatically via [`Element::set_attr`] are escaped on the way in.

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::error::{Error, Result};

pub const ALI_NS: &str = "http://www.niso.org/schemas/ali/1.0/";
pub const MML_NS: &str = "http://www.w3.org/1998/Math/MathML";
pub const XLINK_NS: &str = "http://www.w3.org/1999/xlink";

/// A node in the tree: element, raw text, or CDATA.
#[derive(Debug, Clone, PartialEq)]
pub enum XmlNode {
    Element(Element),
    Text(String),
    CData(String),
}

/// An element with ordered attributes and children.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Element {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<XmlNode>,
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Element {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a well-formed XML string holding exactly one top-level element.
    ///
    /// Comments, processing instructions, and the XML declaration are
    /// dropped. Malformed input is fatal: position-dependent classification
    /// is meaningless once a fragment fails to parse.
    pub fn parse(input: &str) -> Result<Element> {
        let mut reader = Reader::from_str(input);
        let mut stack: Vec<Element> = Vec::new();
        let mut root: Option<Element> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    stack.push(element_from_start(&e));
                }
                Event::Empty(e) => {
                    let element = element_from_start(&e);
                    attach(&mut stack, &mut root, element)?;
                }
                Event::End(_) => {
                    let element = stack
                        .pop()
                        .ok_or_else(|| Error::Parse("unbalanced closing tag".to_string()))?;
                    attach(&mut stack, &mut root, element)?;
                }
                Event::Text(e) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    push_text(&mut stack, text);
                }
                Event::GeneralRef(e) => {
                    // Re-join entity references with the surrounding text,
                    // keeping the escaped form.
                    let name = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    push_text(&mut stack, format!("&{};", name));
                }
                Event::CData(e) => {
                    if let Some(parent) = stack.last_mut() {
                        let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                        parent.children.push(XmlNode::CData(text));
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        if !stack.is_empty() {
            return Err(Error::Parse("unclosed element".to_string()));
        }
        root.ok_or_else(|| Error::Parse("no top-level element".to_string()))
    }

    /// Serialize the element and its subtree.
    pub fn to_xml(&self) -> String {
        let mut out = String::new();
        self.write_into(&mut out);
        out
    }

    /// Serialize only the children, without the element's own tags.
    pub fn inner_xml(&self) -> String {
        let mut out = String::new();
        for child in &self.children {
            write_node(child, &mut out);
        }
        out
    }

    fn write_into(&self, out: &mut String) {
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }
        if self.children.is_empty() {
            out.push_str(" />");
        } else {
            out.push('>');
            for child in &self.children {
                write_node(child, out);
            }
            out.push_str("</");
            out.push_str(&self.name);
            out.push('>');
        }
    }

    /// Serialize with newline/indent formatting. Elements whose children are
    /// all elements are expanded one per line; anything holding text stays
    /// inline so whitespace-significant content is not disturbed.
    pub fn to_xml_pretty(&self, indent: &str) -> String {
        let mut out = String::new();
        self.write_pretty(&mut out, indent, 0);
        out
    }

    fn write_pretty(&self, out: &mut String, indent: &str, level: usize) {
        for _ in 0..level {
            out.push_str(indent);
        }
        let element_children_only = !self.children.is_empty()
            && self
                .children
                .iter()
                .all(|child| matches!(child, XmlNode::Element(_)));
        if !element_children_only {
            self.write_into(out);
            return;
        }
        out.push('<');
        out.push_str(&self.name);
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(value);
            out.push('"');
        }
        out.push('>');
        for child in &self.children {
            if let XmlNode::Element(element) = child {
                out.push('\n');
                element.write_pretty(out, indent, level + 1);
            }
        }
        out.push('\n');
        for _ in 0..level {
            out.push_str(indent);
        }
        out.push_str("</");
        out.push_str(&self.name);
        out.push('>');
    }

    /// Concatenated text content of the subtree, tags ignored.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        collect_text(self, &mut text);
        text
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Set an attribute, escaping the value. Replaces an existing attribute
    /// of the same name.
    pub fn set_attr(&mut self, name: &str, value: &str) {
        let escaped = quick_xml::escape::escape(value).into_owned();
        for (key, existing) in &mut self.attrs {
            if key == name {
                *existing = escaped;
                return;
            }
        }
        self.attrs.push((name.to_string(), escaped));
    }

    pub fn remove_attr(&mut self, name: &str) {
        self.attrs.retain(|(key, _)| key != name);
    }

    /// Direct child elements.
    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|child| match child {
            XmlNode::Element(element) => Some(element),
            _ => None,
        })
    }

    /// First element with the given name, depth-first, including self.
    pub fn find_first(&self, name: &str) -> Option<&Element> {
        if self.name == name {
            return Some(self);
        }
        for child in self.elements() {
            if let Some(found) = child.find_first(name) {
                return Some(found);
            }
        }
        None
    }

    /// Visit every element in the subtree depth-first, including self.
    pub fn for_each_mut(&mut self, f: &mut dyn FnMut(&mut Element)) {
        f(self);
        for child in &mut self.children {
            if let XmlNode::Element(element) = child {
                element.for_each_mut(f);
            }
        }
    }
}

fn element_from_start(e: &quick_xml::events::BytesStart) -> Element {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut element = Element::new(name);
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        element.attrs.push((key, value));
    }
    element
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(XmlNode::Element(element));
    } else if root.is_none() {
        *root = Some(element);
    } else {
        return Err(Error::Parse("multiple top-level elements".to_string()));
    }
    Ok(())
}

fn push_text(stack: &mut [Element], text: String) {
    let Some(parent) = stack.last_mut() else {
        return;
    };
    // Coalesce with a preceding text node so entity splits do not fragment
    // the stored text.
    if let Some(XmlNode::Text(existing)) = parent.children.last_mut() {
        existing.push_str(&text);
    } else {
        parent.children.push(XmlNode::Text(text));
    }
}

fn write_node(node: &XmlNode, out: &mut String) {
    match node {
        XmlNode::Element(element) => element.write_into(out),
        XmlNode::Text(text) => out.push_str(text),
        XmlNode::CData(text) => {
            out.push_str("<![CDATA[");
            out.push_str(text);
            out.push_str("]]>");
        }
    }
}

fn collect_text(element: &Element, text: &mut String) {
    for child in &element.children {
        match child {
            XmlNode::Text(t) | XmlNode::CData(t) => text.push_str(t),
            XmlNode::Element(e) => collect_text(e, text),
        }
    }
}

/// Strip `xmlns:*` declarations throughout a subtree, then re-declare the
/// namespaces its element and attribute prefixes actually use on the root.
/// This mirrors how fragments are lifted out of the section root: the
/// declarations migrate to whatever element becomes the new top.
pub fn redeclare_namespaces(element: &mut Element) {
    element.for_each_mut(&mut |e| {
        e.attrs.retain(|(key, _)| !key.starts_with("xmlns:") && key != "xmlns");
    });

    let mut used: Vec<&str> = Vec::new();
    collect_prefixes(element, &mut used);

    // Snapshot which prefixes are used as owned flags so the immutable borrow
    // of `element` (held via `used`) ends before we mutate `element.attrs`.
    let declarations: Vec<(&str, &str)> = [("xlink", XLINK_NS), ("mml", MML_NS), ("ali", ALI_NS)]
        .into_iter()
        .filter(|(prefix, _)| used.contains(prefix))
        .collect();

    // Fixed declaration order, inserted at the front of the attribute list.
    for (prefix, uri) in declarations {
        {
            element
                .attrs
                .insert(0, (format!("xmlns:{prefix}"), uri.to_string()));
        }
    }
}

fn collect_prefixes<'a>(element: &'a Element, used: &mut Vec<&'a str>) {
    if let Some((prefix, _)) = element.name.split_once(':')
        && !used.contains(&prefix)
    {
        used.push(prefix);
    }
    for (key, _) in &element.attrs {
        if let Some((prefix, _)) = key.split_once(':')
            && prefix != "xmlns"
            && !used.contains(&prefix)
        {
            used.push(prefix);
        }
    }
    for child in element.elements() {
        collect_prefixes(child, used);
    }
}

/// Local part of a possibly prefixed name (`mml:math` -> `math`).
pub(crate) fn local_name(name: &str) -> &str {
    name.rsplit(':').next().unwrap_or(name)
}

// ============================================================================
// Markup-string scanning
// ============================================================================

/// One tag token found in a serialized markup string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TagKind {
    Open,
    Close,
    SelfClose,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Tag<'a> {
    pub name: &'a str,
    pub kind: TagKind,
    /// Byte index one past the closing `>`.
    pub end: usize,
}

/// Scan the tag starting at byte `start` (which must be `<`). Returns `None`
/// for a dangling `<` with no closing `>`.
pub(crate) fn scan_tag(src: &str, start: usize) -> Option<Tag<'_>> {
    let bytes = src.as_bytes();
    debug_assert_eq!(bytes[start], b'<');
    let gt = memchr::memchr(b'>', &bytes[start..])? + start;

    let (kind, name_range) = if bytes.get(start + 1) == Some(&b'/') {
        (TagKind::Close, start + 2..gt)
    } else if matches!(bytes.get(start + 1), Some(b'!') | Some(b'?')) {
        // Declarations, CDATA markers, and processing instructions do not
        // affect element depth.
        (TagKind::SelfClose, start + 1..start + 1)
    } else if gt > start && bytes[gt - 1] == b'/' {
        (TagKind::SelfClose, start + 1..gt - 1)
    } else {
        (TagKind::Open, start + 1..gt)
    };

    let mut name_end = name_range.start;
    while name_end < name_range.end && !bytes[name_end].is_ascii_whitespace() {
        name_end += 1;
    }

    Some(Tag {
        name: &src[name_range.start..name_end],
        kind,
        end: gt + 1,
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_roundtrip_preserves_entities() {
        let input = "<p>&lt;Author response image 1&gt; and &amp; more</p>";
        let element = Element::parse(input).unwrap();
        assert_eq!(element.to_xml(), input);
    }

    #[test]
    fn test_parse_nested_attributes() {
        let input = r#"<p><xref xlink:href="" ref-type="fig">One</xref>.</p>"#;
        let element = Element::parse(input).unwrap();
        assert_eq!(element.name, "p");
        let xref = element.find_first("xref").unwrap();
        assert_eq!(xref.attr("xlink:href"), Some(""));
        assert_eq!(xref.attr("ref-type"), Some("fig"));
        assert_eq!(element.to_xml(), input);
    }

    #[test]
    fn test_empty_element_serialization() {
        let input = r#"<graphic mimetype="image" xlink:href="todo" />"#;
        let element = Element::parse(input).unwrap();
        assert_eq!(element.to_xml(), input);
    }

    #[test]
    fn test_cdata_roundtrip() {
        let input = r"<tex-math><![CDATA[\beta]]></tex-math>";
        let element = Element::parse(input).unwrap();
        assert_eq!(element.to_xml(), input);
    }

    #[test]
    fn test_parse_malformed() {
        assert!(Element::parse("<p>Unclosed").is_err());
        assert!(Element::parse("").is_err());
    }

    #[test]
    fn test_set_attr_escapes() {
        let mut element = Element::new("xref");
        element.set_attr("rid", "a\"b&c");
        assert_eq!(element.to_xml(), r#"<xref rid="a&quot;b&amp;c" />"#);
    }

    #[test]
    fn test_redeclare_namespaces() {
        let input = r#"<p><xref xlink:href="" /></p>"#;
        let mut element = Element::parse(input).unwrap();
        redeclare_namespaces(&mut element);
        assert_eq!(
            element.to_xml(),
            r#"<p xmlns:xlink="http://www.w3.org/1999/xlink"><xref xlink:href="" /></p>"#
        );
    }

    #[test]
    fn test_redeclare_namespaces_moves_inner_declarations() {
        let input = format!(
            r#"<p><mml:math xmlns:mml="{MML_NS}" display="inline"><mml:mi>n</mml:mi></mml:math></p>"#
        );
        let mut element = Element::parse(&input).unwrap();
        redeclare_namespaces(&mut element);
        assert_eq!(
            element.to_xml(),
            format!(
                r#"<p xmlns:mml="{MML_NS}"><mml:math display="inline"><mml:mi>n</mml:mi></mml:math></p>"#
            )
        );
    }

    #[test]
    fn test_text_content() {
        let element = Element::parse("<label>Author response image 1.</label>").unwrap();
        assert_eq!(element.text_content(), "Author response image 1.");
    }

    #[test]
    fn test_scan_tag() {
        let src = r#"a<italic>b</italic><graphic xlink:href="x" />"#;
        let tag = scan_tag(src, 1).unwrap();
        assert_eq!(tag.name, "italic");
        assert_eq!(tag.kind, TagKind::Open);
        let close = scan_tag(src, src.find("</").unwrap()).unwrap();
        assert_eq!(close.name, "italic");
        assert_eq!(close.kind, TagKind::Close);
        let empty = scan_tag(src, src.find("<graphic").unwrap()).unwrap();
        assert_eq!(empty.name, "graphic");
        assert_eq!(empty.kind, TagKind::SelfClose);
    }
}
