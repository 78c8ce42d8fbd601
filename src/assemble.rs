//! Block assembly.
//!
//! A single forward pass over a section's fragments, folding the
//! classifier's per-fragment decisions into the final ordered list of
//! content blocks. The accumulator is an explicit [`AssemblerState`] record;
//! end of input acts as a sentinel that flushes whatever is still open, so
//! every wrap is closed by the time the pass returns.

use tracing::debug;

use crate::article::ContentBlock;
use crate::classify::{self, Action, Decision, Prefs, PrevState, Wrap};
use crate::error::Result;
use crate::extract;
use crate::split::{Fragment, FragmentKind};
use crate::xml::Element;

/// Fold a section's fragments into content blocks.
///
/// Exactly one block is emitted per maximal run of appended fragments, in
/// input order. Special-block fragments never surface as standalone
/// paragraphs; they are absorbed into the constructed asset block.
pub fn assemble(fragments: &[Fragment], prefs: &Prefs) -> Result<Vec<ContentBlock>> {
    let mut state = AssemblerState::default();
    for fragment in fragments {
        match fragment.kind {
            FragmentKind::Paragraph => push_paragraph(&mut state, &fragment.content, prefs),
            FragmentKind::List => push_list(&mut state, &fragment.content)?,
            FragmentKind::Table => push_table(&mut state, &fragment.content),
            FragmentKind::Quotation => push_quotation(&mut state, &fragment.content)?,
        }
    }
    state.flush_all();
    debug!(blocks = state.blocks.len(), "assembled content blocks");
    Ok(state.blocks)
}

/// Accumulator threaded through the fold.
#[derive(Debug, Default)]
struct AssemblerState {
    blocks: Vec<ContentBlock>,
    accumulated: String,
    tag: String,
    attrs: Vec<(String, String)>,
    wrap: Option<Wrap>,
    pending: bool,
}

impl AssemblerState {
    fn prev(&self) -> PrevState<'_> {
        PrevState {
            content: if self.pending && !self.accumulated.is_empty() {
                Some(self.accumulated.as_str())
            } else {
                None
            },
            wrap: self.wrap,
        }
    }

    fn apply(&mut self, decision: Decision) {
        match decision.action {
            Action::Add => {
                self.flush_pending();
                self.begin(decision);
            }
            Action::Append => {
                if self.pending {
                    self.accumulated.push_str(&decision.content);
                    self.wrap = decision.wrap;
                } else {
                    self.begin(decision);
                }
            }
        }
    }

    fn begin(&mut self, decision: Decision) {
        self.pending = true;
        self.accumulated = decision.content;
        self.tag = decision.tag;
        self.attrs = decision.attrs;
        self.wrap = decision.wrap;
    }

    /// Emit the pending accumulation as one ordinary block, if any.
    fn flush_pending(&mut self) {
        if self.pending && !self.accumulated.trim().is_empty() {
            self.blocks.push(ContentBlock {
                block_type: std::mem::take(&mut self.tag),
                content: std::mem::take(&mut self.accumulated),
                attrs: std::mem::take(&mut self.attrs),
                children: Vec::new(),
            });
        }
        self.reset();
    }

    /// Close whatever is open: a wrap materializes its asset block, a plain
    /// accumulation flushes. This is the sentinel behavior at end of input
    /// and the force-close applied when a non-paragraph fragment arrives.
    fn flush_all(&mut self) {
        match self.wrap {
            Some(Wrap::Fig) => self.close_fig(),
            Some(Wrap::Media) => self.close_media(),
            Some(Wrap::Table) => self.close_table_wrap(""),
            Some(Wrap::Quote) => self.close_quote(),
            None => self.flush_pending(),
        }
    }

    fn close_asset(&mut self) {
        match self.wrap {
            Some(Wrap::Media) => self.close_media(),
            _ => self.close_fig(),
        }
    }

    fn close_fig(&mut self) {
        let asset = extract::build_fig(&self.accumulated);
        self.blocks.push(extract::fig_block(&asset));
        self.reset();
    }

    fn close_media(&mut self) {
        let asset = extract::build_fig(&self.accumulated);
        self.blocks.push(extract::media_block(&asset));
        self.reset();
    }

    fn close_table_wrap(&mut self, table_markup: &str) {
        let asset = extract::build_table_wrap(&self.accumulated);
        self.blocks.push(extract::table_wrap_block(&asset, table_markup));
        self.reset();
    }

    fn close_quote(&mut self) {
        let mut block = ContentBlock::new("disp-quote", std::mem::take(&mut self.accumulated));
        block.attrs = std::mem::take(&mut self.attrs);
        self.blocks.push(block);
        self.reset();
    }

    fn reset(&mut self) {
        self.pending = false;
        self.accumulated.clear();
        self.tag.clear();
        self.attrs.clear();
        self.wrap = None;
    }
}

fn push_paragraph(state: &mut AssemblerState, raw: &str, prefs: &Prefs) {
    let decision = classify::classify(raw, &state.prev(), prefs);
    match (state.wrap, decision.wrap) {
        (Some(Wrap::Fig) | Some(Wrap::Media), None) => {
            if classify::is_legend_close(&decision.content) {
                // The closing paragraph belongs inside the wrap; its marker
                // is stripped by the extractor.
                state.accumulated.push_str(&decision.content);
                state.close_asset();
            } else {
                // Bare marker: the wrap closes before this paragraph, which
                // re-enters classification as a fresh fragment.
                state.close_asset();
                let fresh = classify::classify(raw, &state.prev(), prefs);
                state.apply(fresh);
            }
        }
        (Some(Wrap::Quote), None) => {
            state.close_quote();
            let fresh = classify::classify(raw, &state.prev(), prefs);
            state.apply(fresh);
        }
        _ => state.apply(decision),
    }
}

fn push_table(state: &mut AssemblerState, markup: &str) {
    match state.wrap {
        // The arriving table closes the wrap: accumulated caption text is
        // finished, and this is the table to attach.
        Some(Wrap::Table) => state.close_table_wrap(markup),
        Some(_) => {
            state.flush_all();
            state.blocks.push(ContentBlock::new("table", markup));
        }
        None => {
            state.flush_pending();
            state.blocks.push(ContentBlock::new("table", markup));
        }
    }
}

fn push_list(state: &mut AssemblerState, markup: &str) -> Result<()> {
    state.flush_all();
    let element = Element::parse(markup)?;
    let mut block = ContentBlock::new("list", "");
    for (key, value) in &element.attrs {
        if key.starts_with("xmlns") {
            continue;
        }
        let value = plain_attr(value);
        if key == "list-type" {
            block.attrs.push((key.clone(), normalize_list_type(&value)));
        } else {
            block.attrs.push((key.clone(), value));
        }
    }
    // Stray quotation wrappers inside list items are markup noise from the
    // converter; drop the tags, keep their content.
    block.content = element
        .inner_xml()
        .replace("<disp-quote>", "")
        .replace("</disp-quote>", "");
    state.blocks.push(block);
    Ok(())
}

fn push_quotation(state: &mut AssemblerState, markup: &str) -> Result<()> {
    state.flush_all();
    let element = Element::parse(markup)?;
    let mut block = ContentBlock::new("disp-quote", element.inner_xml());
    for (key, value) in &element.attrs {
        if !key.starts_with("xmlns") {
            block.attrs.push((key.clone(), plain_attr(value)));
        }
    }
    state.blocks.push(block);
    Ok(())
}

/// Ordered-list markers arrive under several converter spellings.
fn normalize_list_type(value: &str) -> String {
    match value {
        "1" | "decimal" | "number" => "order",
        "a" | "lower-alpha" => "alpha-lower",
        "A" | "upper-alpha" => "alpha-upper",
        "i" | "lower-roman" => "roman-lower",
        "I" | "upper-roman" => "roman-upper",
        other => other,
    }
    .to_string()
}

/// Attribute values parsed from markup keep their source escaping; block
/// attributes store plain text and re-escape on output.
fn plain_attr(value: &str) -> String {
    match quick_xml::escape::unescape(value) {
        Ok(unescaped) => unescaped.into_owned(),
        Err(_) => value.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
