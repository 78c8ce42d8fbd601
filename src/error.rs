//! Error types for epistle operations.

use thiserror::Error;

/// Errors that can occur while building or serializing letter XML.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML parsing error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("Malformed markup: {0}")]
    Parse(String),

    #[error("Content blocks nested deeper than {max} levels")]
    NestingTooDeep { max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
