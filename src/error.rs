//! Error types for the conversion pipeline.
//!
//! Binary-precondition failures, region file lookups, converter failures
//! and delivery failures each get their own variant so callers can decide
//! what to present. [`Error::ConversionFailed`] deliberately displays a
//! generic message; the command line and converter output are only carried
//! in its fields (and written to the log).

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Which external converter an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    /// The HTML-to-PDF renderer (`wkhtmltopdf`).
    PdfGenerator,
    /// The raster image converter (ImageMagick `convert`).
    Convert,
}

impl fmt::Display for BinaryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryKind::PdfGenerator => f.write_str("PDF generator"),
            BinaryKind::Convert => f.write_str("image convert"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} binary is not configured")]
    BinaryMissing(BinaryKind),

    #[error("{kind} binary {} is not executable", path.display())]
    BinaryNotExecutable { kind: BinaryKind, path: PathBuf },

    #[error("PDF generator binary version {installed} is not supported (required: {required})")]
    BinaryVersionUnsupported { installed: String, required: String },

    #[error("File not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("document could not be created")]
    ConversionFailed { output: String, command: String },

    #[error("Delivery failed: {0}")]
    DeliveryFailed(#[source] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Full diagnostic text for the operator log.
    ///
    /// For everything except [`Error::ConversionFailed`] this is the display
    /// message.
    pub fn diagnostic(&self) -> String {
        match self {
            Error::ConversionFailed { output, command } => {
                format!("conversion failed: {output} -- command: > {command} <")
            }
            other => other.to_string(),
        }
    }
}
