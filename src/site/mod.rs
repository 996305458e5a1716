//! Poem Site Module
//!
//! Parses the poem source format and renders it into static HTML pages.
//!
//! # Structure
//!
//! - [`model`]: Document, block, unit and media types
//! - [`parser`]: Source text to [`Document`]
//! - [`render`]: HTML markup for units, blocks and pages
//! - [`generator`]: Reading the source and writing paginated output

pub mod generator;
pub mod model;
pub mod parser;
pub mod render;

pub use generator::{GenerationReport, SiteConfig, SiteGenerator};
pub use model::{Document, MediaKind, MediaLayout, MediaRef, PoemBlock, PoemUnit, UnitItem};
pub use parser::{parse_document, parse_media_ref};
pub use render::{html_escape, page_file_name};
