//! Build configuration.
//!
//! All fields are optional: an absent configuration disables DOI and
//! filename assignment and preamble defaulting, but never fails the build.
//! Patterns use `{manuscript}`, `{id}`, and `{number}` placeholders;
//! `{manuscript:0>5}` zero-pads the manuscript number to five digits.

/// Journal-specific settings consumed while building sub-articles.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "cli", derive(serde::Deserialize))]
#[cfg_attr(feature = "cli", serde(default))]
pub struct Config {
    /// Default preamble text, wrapped in `boxed-text` at the head of a
    /// decision letter when the manuscript has no explicit preamble section.
    pub preamble: Option<String>,
    /// DOI pattern, e.g. `10.7554/eLife.{manuscript}.{id}`.
    pub doi_pattern: Option<String>,
    /// Figure filename pattern, e.g. `elife-{manuscript:0>5}-{id}-fig{number}`.
    pub fig_filename_pattern: Option<String>,
    /// Video filename pattern, e.g. `elife-{manuscript:0>5}-{id}-video{number}`.
    pub video_filename_pattern: Option<String>,
    /// Convert runs of fully italic paragraphs in author responses into
    /// `disp-quote` editor-comment blocks.
    pub italic_to_disp_quote: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            preamble: None,
            doi_pattern: None,
            fig_filename_pattern: None,
            video_filename_pattern: None,
            italic_to_disp_quote: true,
        }
    }
}

/// Fill a filename or DOI pattern from its parts.
pub fn format_pattern(pattern: &str, manuscript: u32, id: &str, number: usize) -> String {
    pattern
        .replace("{manuscript:0>5}", &format!("{manuscript:0>5}"))
        .replace("{manuscript}", &manuscript.to_string())
        .replace("{id}", id)
        .replace("{number}", &number.to_string())
}
