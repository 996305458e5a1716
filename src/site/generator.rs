//! Site Generation
//!
//! Reads a poem source file and writes the paginated HTML pages into an
//! output directory.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;

use super::parser::parse_document;
use super::render::{page_count, page_file_name, render_block, render_page};
use crate::error::{SiteError, SiteResult};

/// Default site title shown in the banner and browser tab.
pub const DEFAULT_TITLE: &str = "Everyday Majestic Musings";

/// Default number of poems on each page.
pub const DEFAULT_POEMS_PER_PAGE: usize = 5;

static PAGE_FILE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^page(\d+)\.html$").expect("page file pattern is valid"));

/// Presentation settings for a generated site.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteConfig {
    pub title: String,
    pub poems_per_page: usize,
    /// Stylesheet href, relative to the pages
    pub stylesheet: String,
    /// Directory that media references resolve into, relative to the pages
    pub media_dir: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            poems_per_page: DEFAULT_POEMS_PER_PAGE,
            stylesheet: "style.css".to_string(),
            media_dir: "images".to_string(),
        }
    }
}

/// Summary of a generation run.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationReport {
    /// Number of poem blocks found in the source
    pub blocks: usize,
    /// Pages written, in page order
    pub pages: Vec<PathBuf>,
    /// Stale pages removed from the output directory
    pub pruned: Vec<PathBuf>,
}

/// Writes a paginated site from a poem source.
///
/// # Example
///
/// ```rust,no_run
/// use poempress::site::{SiteConfig, SiteGenerator};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let generator = SiteGenerator::new(SiteConfig::default(), "public");
///     let report = generator.generate("poems.txt")?;
///     println!("Wrote {} pages", report.pages.len());
///     Ok(())
/// }
/// ```
pub struct SiteGenerator {
    config: SiteConfig,
    output_dir: PathBuf,
}

impl SiteGenerator {
    pub fn new(config: SiteConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
        }
    }

    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Reads `input` and writes every page.
    pub fn generate(&self, input: impl AsRef<Path>) -> SiteResult<GenerationReport> {
        let input = input.as_ref();
        info!("Generating site from {}", input.display());

        let content = fs::read_to_string(input).map_err(|source| SiteError::Read {
            path: input.to_path_buf(),
            source,
        })?;

        self.generate_from_str(&content)
    }

    /// Renders `content` and writes every page.
    pub fn generate_from_str(&self, content: &str) -> SiteResult<GenerationReport> {
        if self.config.poems_per_page == 0 {
            return Err(SiteError::ZeroPageSize);
        }

        let document = parse_document(content)?;
        let blocks: Vec<String> = document
            .blocks
            .iter()
            .map(|block| render_block(block, &self.config))
            .collect();

        let total_pages = page_count(blocks.len(), self.config.poems_per_page);
        if total_pages == 0 {
            warn!("No poems found; no pages written");
        }

        fs::create_dir_all(&self.output_dir).map_err(|source| SiteError::Write {
            path: self.output_dir.clone(),
            source,
        })?;

        let mut pages = Vec::with_capacity(total_pages);
        for (index, chunk) in blocks.chunks(self.config.poems_per_page).enumerate() {
            let page = index + 1;
            let html = render_page(chunk, page, total_pages, &self.config);
            let path = self.output_dir.join(page_file_name(page));

            fs::write(&path, html).map_err(|source| SiteError::Write {
                path: path.clone(),
                source,
            })?;
            debug!("Wrote {} ({} poems)", path.display(), chunk.len());
            pages.push(path);
        }

        let pruned = self.prune_stale_pages(total_pages)?;

        info!(
            "Generated {} pages from {} poems",
            pages.len(),
            blocks.len()
        );

        Ok(GenerationReport {
            blocks: blocks.len(),
            pages,
            pruned,
        })
    }

    /// Removes `pageN.html` files left over from a longer previous run, and
    /// the landing page too once there are no pages at all.
    fn prune_stale_pages(&self, total_pages: usize) -> SiteResult<Vec<PathBuf>> {
        let entries = fs::read_dir(&self.output_dir).map_err(|source| SiteError::Read {
            path: self.output_dir.clone(),
            source,
        })?;

        let mut pruned = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };

            let stale = if name == page_file_name(1) {
                total_pages == 0
            } else {
                PAGE_FILE_PATTERN
                    .captures(name)
                    .and_then(|caps| caps[1].parse::<usize>().ok())
                    .map(|page| page > total_pages)
                    .unwrap_or(false)
            };

            if stale {
                let path = entry.path();
                fs::remove_file(&path).map_err(|source| SiteError::Write {
                    path: path.clone(),
                    source,
                })?;
                info!("Removed stale page {}", path.display());
                pruned.push(path);
            }
        }

        pruned.sort();
        Ok(pruned)
    }
}
