//! Sub-article building.
//!
//! Drives the full per-section pipeline: section splitting, fragment
//! splitting, block assembly, preamble attachment, and DOI and asset
//! filename assignment. One [`Article`] is produced per decision-letter or
//! author-response section, in input order.

use tracing::debug;

use crate::article::{Article, ContentBlock};
use crate::assemble;
use crate::classify::Prefs;
use crate::config::{self, Config};
use crate::error::Result;
use crate::sections::{self, Section, SectionKind};
use crate::split;

/// Build sub-articles from one document's converter output.
///
/// `file_name` is the source manuscript name, used only to derive the
/// manuscript number for DOIs and asset filenames. Both it and `config`
/// are optional; without them those fields are simply left unset.
pub fn build_articles(
    content: &str,
    file_name: Option<&str>,
    config: Option<&Config>,
) -> Result<Vec<Article>> {
    let manuscript = file_name.and_then(manuscript_from_file_name);
    let mut articles = Vec::new();
    let mut preamble: Option<Section> = None;
    let mut id_count = 1;

    for section in sections::sections(content) {
        let article_type = match section.kind {
            SectionKind::Preamble => {
                preamble = Some(section);
                continue;
            }
            SectionKind::DecisionLetter => "decision-letter",
            SectionKind::AuthorResponse => "reply",
        };

        let id = format!("sa{id_count}");
        let doi = build_doi(file_name, &id, config);
        let mut article = build_sub_article(&section, config, article_type, &id, doi, manuscript)?;
        if section.kind == SectionKind::DecisionLetter
            && let Some(block) = preamble_block(preamble.as_ref(), config)
        {
            article.content_blocks.insert(0, block);
        }
        debug!(id = %article.id, article_type, blocks = article.content_blocks.len(), "built sub-article");
        articles.push(article);
        id_count += 1;
        preamble = None;
    }

    Ok(articles)
}

/// Build one sub-article from its section.
pub fn build_sub_article(
    section: &Section,
    config: Option<&Config>,
    article_type: &str,
    id: &str,
    doi: Option<String>,
    manuscript: Option<u32>,
) -> Result<Article> {
    let mut article = Article::new(article_type, id);
    article.doi = doi;
    article.manuscript = manuscript;

    let body = sections::strip_marker_paragraph(section);
    let fragments = split::split_section(body)?;
    let prefs = Prefs {
        // Quoted editor text appears in author responses only.
        italic_to_disp_quote: section.kind == SectionKind::AuthorResponse
            && config.is_none_or(|c| c.italic_to_disp_quote),
    };
    let mut blocks = assemble::assemble(&fragments, &prefs)?;
    assign_asset_names(&mut blocks, id, manuscript, config);
    article.content_blocks = blocks;
    Ok(article)
}

/// The preamble boxed-text for a decision letter: an explicit preamble
/// section wins; otherwise the config default, if any.
fn preamble_block(preamble: Option<&Section>, config: Option<&Config>) -> Option<ContentBlock> {
    if let Some(section) = preamble {
        let body = sections::strip_marker_paragraph(section);
        if !body.is_empty() {
            return Some(ContentBlock::new("boxed-text", body));
        }
    }
    let text = config?.preamble.as_ref()?;
    Some(ContentBlock::new("boxed-text", format!("<p>{text}</p>")))
}

/// Format the configured DOI pattern. `None` when the file name, the
/// manuscript number, or the config is missing.
pub fn build_doi(file_name: Option<&str>, id: &str, config: Option<&Config>) -> Option<String> {
    let pattern = config?.doi_pattern.as_ref()?;
    let manuscript = manuscript_from_file_name(file_name?)?;
    Some(config::format_pattern(pattern, manuscript, id, 0))
}

/// Manuscript number from a source file name: the first digit run in the
/// base name (`folder/elife-00666.docx` -> 666, `Dutzler 39122 edit.docx`
/// -> 39122).
pub fn manuscript_from_file_name(file_name: &str) -> Option<u32> {
    let base = file_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(file_name);
    let stem = base.rsplit_once('.').map(|(s, _)| s).unwrap_or(base);

    let start = stem.find(|c: char| c.is_ascii_digit())?;
    let digits: String = stem[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Replace the `todo` href placeholders with sequential per-article asset
/// filenames. Missing config or manuscript leaves the placeholders alone.
fn assign_asset_names(
    blocks: &mut [ContentBlock],
    id: &str,
    manuscript: Option<u32>,
    config: Option<&Config>,
) {
    let Some(config) = config else {
        return;
    };
    let Some(manuscript) = manuscript else {
        return;
    };

    let mut fig_number = 0;
    let mut video_number = 0;
    for block in blocks {
        match block.block_type.as_str() {
            "fig" => {
                if let Some(pattern) = &config.fig_filename_pattern {
                    fig_number += 1;
                    let name = config::format_pattern(pattern, manuscript, id, fig_number);
                    block.content = block
                        .content
                        .replace("xlink:href=\"todo\"", &format!("xlink:href=\"{name}\""));
                }
            }
            "media" => {
                if let Some(pattern) = &config.video_filename_pattern
                    && block.attr("xlink:href") == Some("todo")
                {
                    video_number += 1;
                    let name = config::format_pattern(pattern, manuscript, id, video_number);
                    block.set_attr("xlink:href", &name);
                }
            }
            _ => {}
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
