//! # epistle
//!
//! A library for converting peer-review manuscripts (decision letters and
//! author responses) into structured JATS XML.
//!
//! ## Features
//!
//! - Splits converter output into preamble, decision-letter, and
//!   author-response sections
//! - Recognizes figure, video, and table conventions marked with bracketed
//!   text (`<Author response image 1>`) and bold labels, and rebuilds them
//!   as labeled, captioned structural elements
//! - Collapses runs of fully italic paragraphs into editor-comment
//!   quotations
//! - Assigns DOIs, asset filenames, and element ids from configuration
//! - Wraps plain-text mentions of asset labels in cross-reference markup
//!
//! ## Quick Start
//!
//! ```no_run
//! use epistle::generate_xml;
//!
//! // The input is the semi-structured markup produced by the external
//! // document converter, one string per manuscript.
//! let content = std::fs::read_to_string("elife-00666.xml")?;
//! let jats = generate_xml(&content, Some("elife-00666.docx"), None, true)?;
//! println!("{jats}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Working with Articles
//!
//! The per-stage APIs are public for callers that need the intermediate
//! forms: [`build_articles`] produces [`Article`] values whose
//! [`ContentBlock`] bodies can be inspected or adjusted before the tree is
//! generated with [`generate`] and serialized with [`output_xml`].

pub mod article;
pub mod assemble;
pub mod build;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod generate;
pub mod sections;
pub mod split;
pub mod xml;
pub mod xref;

pub use article::{Article, ContentBlock};
pub use build::build_articles;
pub use config::Config;
pub use error::{Error, Result};
pub use generate::{generate, generate_xml, output_xml};
