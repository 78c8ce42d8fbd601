//! Fragment splitting.
//!
//! Takes one section's raw markup and splits it into an ordered sequence of
//! top-level block fragments for the assembler. Quotation blocks present in
//! the source are flattened into their paragraphs here, so the classifier
//! can re-derive quotation grouping from italic runs uniformly.

use tracing::trace;

use crate::error::Result;
use crate::xml::{self, ALI_NS, Element, MML_NS, XLINK_NS, XmlNode};

/// Element kind of a top-level fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentKind {
    Paragraph,
    List,
    Table,
    Quotation,
}

/// A unit produced by the splitter: the fragment's kind and its serialized
/// content, consumed once by the assembler.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    pub kind: FragmentKind,
    pub content: String,
}

impl Fragment {
    pub fn new(kind: FragmentKind, content: impl Into<String>) -> Self {
        Fragment {
            kind,
            content: content.into(),
        }
    }
}

/// Split one section's markup into fragments.
///
/// The content is parsed under a synthetic namespaced root; top-level
/// `p`/`list`/`table` children become fragments, `disp-quote` children are
/// unwrapped into paragraph fragments, and any other top-level tag is
/// dropped. Splitting is a pure function of its input.
pub fn split_section(content: &str) -> Result<Vec<Fragment>> {
    let wrapped = format!(
        "<root xmlns:ali=\"{ALI_NS}\" xmlns:mml=\"{MML_NS}\" xmlns:xlink=\"{XLINK_NS}\">{content}</root>"
    );
    let mut root = Element::parse(&wrapped)?;
    clean_math_alternatives(&mut root);

    let mut fragments = Vec::new();
    for child in root.elements() {
        match child.name.as_str() {
            "p" => fragments.push(fragment(FragmentKind::Paragraph, child)),
            "list" => fragments.push(fragment(FragmentKind::List, child)),
            "table" => fragments.push(fragment(FragmentKind::Table, child)),
            "disp-quote" => {
                for paragraph in child.elements().filter(|e| e.name == "p") {
                    fragments.push(fragment(FragmentKind::Paragraph, paragraph));
                }
            }
            other => trace!(tag = other, "dropping unrecognized top-level element"),
        }
    }
    Ok(fragments)
}

fn fragment(kind: FragmentKind, element: &Element) -> Fragment {
    let mut element = element.clone();
    xml::redeclare_namespaces(&mut element);
    Fragment::new(kind, element.to_xml())
}

/// Collapse `alternatives` wrappers inside formula elements.
///
/// The converter emits both a TeX source and rendered MathML for each
/// formula. Only the rendered form survives; the TeX source becomes its
/// `alttext` fallback attribute.
pub fn clean_math_alternatives(root: &mut Element) {
    root.for_each_mut(&mut |element| {
        if xml::local_name(&element.name) != "disp-formula"
            && xml::local_name(&element.name) != "inline-formula"
        {
            return;
        }
        for child in &mut element.children {
            let XmlNode::Element(alternatives) = &mut *child else {
                continue;
            };
            if alternatives.name != "alternatives" {
                continue;
            }
            let tex = alternatives
                .elements()
                .find(|e| e.name == "tex-math")
                .map(tex_source);
            let math = alternatives
                .elements()
                .find(|e| xml::local_name(&e.name) == "math")
                .cloned();
            if let (Some(tex), Some(mut math)) = (tex, math) {
                // The fallback text goes first, ahead of the attributes
                // carried over from the rendered form.
                math.remove_attr("alttext");
                let escaped = quick_xml::escape::escape(tex.as_str()).into_owned();
                math.attrs.insert(0, ("alttext".to_string(), escaped));
                *child = XmlNode::Element(math);
            }
        }
    });
}

/// Raw TeX source of a `tex-math` element: CDATA verbatim, text unescaped.
fn tex_source(tex_math: &Element) -> String {
    let mut out = String::new();
    for child in &tex_math.children {
        match child {
            XmlNode::CData(text) => out.push_str(text),
            XmlNode::Text(text) => match quick_xml::escape::unescape(text) {
                Ok(unescaped) => out.push_str(&unescaped),
                Err(_) => out.push_str(text),
            },
            XmlNode::Element(_) => {}
        }
    }
    out
}
