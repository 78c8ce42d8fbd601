//! Article and content-block data model.
//!
//! A letter document is an ordered list of [`Article`] sub-articles (one per
//! decision-letter or author-response section), each holding an ordered list
//! of [`ContentBlock`] body units produced by the assembler.

/// One structural unit of body content: a paragraph, figure, table, list,
/// quotation, and so on. `content` holds the serialized inner markup;
/// `children` carries nested blocks (a preamble `boxed-text` wrapping its
/// paragraphs, for example).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContentBlock {
    pub block_type: String,
    pub content: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<ContentBlock>,
}

impl ContentBlock {
    pub fn new(block_type: impl Into<String>, content: impl Into<String>) -> Self {
        ContentBlock {
            block_type: block_type.into(),
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.push((name.into(), value.into()));
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: &str) {
        for (key, existing) in &mut self.attrs {
            if key == name {
                *existing = value.to_string();
                return;
            }
        }
        self.attrs.push((name.to_string(), value.to_string()));
    }

    /// Tag attributes formatted for inclusion in an opening tag, with
    /// ampersands and quotes escaped.
    pub fn attr_string(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.attrs {
            out.push(' ');
            out.push_str(key);
            out.push_str("=\"");
            out.push_str(&escape_attr(value));
            out.push('"');
        }
        out
    }
}

fn escape_attr(value: &str) -> String {
    value.replace('&', "&amp;").replace('"', "&quot;")
}

/// One sub-article: a decision letter or an author response.
#[derive(Debug, Clone, Default)]
pub struct Article {
    pub id: String,
    pub doi: Option<String>,
    pub title: String,
    pub article_type: String,
    pub manuscript: Option<u32>,
    pub content_blocks: Vec<ContentBlock>,
}

impl Article {
    pub fn new(article_type: &str, id: &str) -> Self {
        Article {
            id: id.to_string(),
            title: article_title(article_type).to_string(),
            article_type: article_type.to_string(),
            ..Default::default()
        }
    }
}

/// Fixed title lookup by article type.
pub fn article_title(article_type: &str) -> &'static str {
    match article_type {
        "decision-letter" => "Decision letter",
        "reply" => "Author response",
        _ => "",
    }
}
