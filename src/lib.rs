//! # htmltopdf – header/body/footer HTML documents to PDF and images
//!
//! This crate drives external converters to turn a three-region HTML
//! document into a PDF, and optionally rasterizes that PDF to JPEG. The
//! pipeline stages are:
//!
//! 1. **Configure** – locate and validate the converter binaries ([`config`], [`binary`])
//! 2. **Compose** – fill the header, body and footer regions ([`region`], [`document`])
//! 3. **Convert** – run the PDF generator with the document settings ([`settings`], [`command`])
//! 4. **Rasterize** – optionally turn the PDF into page images ([`image_export`])
//! 5. **Deliver** – stream the artifact to a sink and clean up ([`delivery`], [`retention`])
//!
//! A C-compatible FFI surface is exposed via the [`ffi`] module.

pub mod binary;
pub mod command;
pub mod config;
pub mod delivery;
pub mod document;
pub mod error;
pub mod ffi;
pub mod image_export;
pub mod notify;
pub mod region;
pub mod retention;
pub mod settings;
pub mod templates;

// Re-exports for convenience
pub use config::Config;
pub use document::{Document, Engine};
pub use error::{Error, Result};
pub use image_export::ImageOutput;
pub use region::{FooterMode, Region, RegionKind};
pub use settings::DocumentSettings;
