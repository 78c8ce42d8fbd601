//! JATS output generation.
//!
//! Materializes built articles as a `<root>` tree of `<sub-article>`
//! elements and serializes it. Content blocks are re-parsed from their
//! serialized content here, with a hard nesting limit: blocks deeper than
//! [`MAX_LEVEL`] signal a structural invariant violation upstream and stop
//! the build rather than truncating silently.

use crate::article::{Article, ContentBlock};
use crate::build;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::xml::{ALI_NS, Element, MML_NS, XLINK_NS, XmlNode};
use crate::xref;

/// Max level of recursion supported when adding content blocks.
pub const MAX_LEVEL: usize = 5;

/// Block vocabulary emitted into the body.
const BLOCK_TAGS: [&str; 9] = [
    "boxed-text",
    "disp-formula",
    "disp-quote",
    "fig",
    "list",
    "media",
    "p",
    "table",
    "table-wrap",
];

/// Tags that receive generated per-sub-article id attributes, with their
/// id prefixes.
const ID_PREFIXES: [(&str, &str); 5] = [
    ("mml:math", "m"),
    ("disp-formula", "equ"),
    ("fig", "fig"),
    ("table-wrap", "table"),
    ("media", "video"),
];

/// Convert a letter document end to end: build sub-articles, generate the
/// tree, wrap asset cross-references, and serialize.
pub fn generate_xml(
    content: &str,
    file_name: Option<&str>,
    config: Option<&Config>,
    pretty: bool,
) -> Result<String> {
    let articles = build::build_articles(content, file_name, config)?;
    let mut root = generate(&articles)?;
    xref::wrap_asset_xrefs(&mut root)?;
    Ok(output_xml(&root, pretty, "    "))
}

/// Generate the output tree from built articles.
pub fn generate(articles: &[Article]) -> Result<Element> {
    let mut root = Element::new("root");
    root.set_attr("xmlns:ali", ALI_NS);
    root.set_attr("xmlns:mml", MML_NS);
    root.set_attr("xmlns:xlink", XLINK_NS);

    for article in articles {
        let mut sub_article = Element::new("sub-article");
        set_if_value(&mut sub_article, "article-type", &article.article_type);
        set_if_value(&mut sub_article, "id", &article.id);
        set_front_stub(&mut sub_article, article);

        let mut body = Element::new("body");
        set_content_blocks(&mut body, &article.content_blocks, 1)?;
        sub_article.children.push(XmlNode::Element(body));

        for (tag_name, prefix) in ID_PREFIXES {
            set_id_attributes(&mut sub_article, tag_name, prefix, &article.id);
        }
        root.children.push(XmlNode::Element(sub_article));
    }
    Ok(root)
}

/// Set an attribute only when the value is non-empty.
fn set_if_value(element: &mut Element, name: &str, value: &str) {
    if !value.is_empty() {
        element.set_attr(name, value);
    }
}

fn set_front_stub(sub_article: &mut Element, article: &Article) {
    let mut front_stub = Element::new("front-stub");
    if let Some(doi) = &article.doi {
        let mut article_id = Element::new("article-id");
        article_id.set_attr("pub-id-type", "doi");
        article_id.children.push(text_node(doi));
        front_stub.children.push(XmlNode::Element(article_id));
    }
    if !article.title.is_empty() {
        let mut article_title = Element::new("article-title");
        article_title.children.push(text_node(&article.title));
        let mut title_group = Element::new("title-group");
        title_group.children.push(XmlNode::Element(article_title));
        front_stub.children.push(XmlNode::Element(title_group));
    }
    sub_article.children.push(XmlNode::Element(front_stub));
}

fn text_node(text: &str) -> XmlNode {
    XmlNode::Text(quick_xml::escape::partial_escape(text).into_owned())
}

fn set_content_blocks(parent: &mut Element, blocks: &[ContentBlock], level: usize) -> Result<()> {
    if level > MAX_LEVEL {
        return Err(Error::NestingTooDeep { max: MAX_LEVEL });
    }
    for block in blocks {
        if !BLOCK_TAGS.contains(&block.block_type.as_str()) {
            continue;
        }
        // Standalone table blocks already carry the full table element.
        let markup = if block.block_type == "table" && block.content.trim_start().starts_with("<table")
        {
            block.content.trim().to_string()
        } else {
            format!(
                "<{tag}{attrs}>{content}</{tag}>",
                tag = block.block_type,
                attrs = block.attr_string(),
                content = block.content,
            )
        };
        let mut element = Element::parse(&markup)?;
        set_content_blocks(&mut element, &block.children, level + 1)?;
        parent.children.push(XmlNode::Element(element));
    }
    Ok(())
}

/// Assign generated ids to elements that lack one, numbered per tag within
/// the sub-article.
fn set_id_attributes(sub_article: &mut Element, tag_name: &str, prefix: &str, article_id: &str) {
    let mut index = 1;
    sub_article.for_each_mut(&mut |element| {
        if element.name == tag_name && element.attr("id").is_none() {
            element.set_attr("id", &format!("{article_id}{prefix}{index}"));
            index += 1;
        }
    });
}

/// Serialize the output tree to an XML string.
pub fn output_xml(root: &Element, pretty: bool, indent: &str) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"utf-8\"?>");
    if pretty {
        out.push('\n');
        out.push_str(&root.to_xml_pretty(indent));
    } else {
        out.push_str(&root.to_xml());
    }
    out
}

// ============================================================================
// Tests
// ============================================================================
