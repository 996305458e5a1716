//! Poem Source Parser
//!
//! Splits the source into blocks on `===` and units on `---`, then reads each
//! unit line by line. Lines starting with `link:`, `top:` or `left:` are
//! directives; every other line is poem text.

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{Document, MediaLayout, MediaRef, PoemBlock, PoemUnit, UnitItem};
use crate::error::{SiteError, SiteResult};

/// Separates poems.
pub const BLOCK_SEPARATOR: &str = "===";

/// Separates units within a poem.
pub const UNIT_SEPARATOR: &str = "---";

/// `filename` or `filename[width]`, anchored at the start of the entry.
static MEDIA_REF_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([^\[\]]+)(?:\[(\d+)\])?").expect("media reference pattern is valid")
});

/// Parses a complete poem source into a document.
///
/// # Example
///
/// ```
/// use poempress::site::parse_document;
///
/// let doc = parse_document("first poem\n===\nsecond poem").unwrap();
/// assert_eq!(doc.len(), 2);
/// ```
pub fn parse_document(content: &str) -> SiteResult<Document> {
    let content = content.replace("\r\n", "\n").replace('\r', "\n");

    let mut blocks = Vec::new();
    for raw_block in split_trimmed(&content, BLOCK_SEPARATOR) {
        let units = split_trimmed(raw_block, UNIT_SEPARATOR)
            .into_iter()
            .map(parse_unit)
            .collect::<SiteResult<Vec<_>>>()?;

        blocks.push(PoemBlock { units });
    }

    debug!("Parsed {} poem blocks", blocks.len());
    Ok(Document { blocks })
}

/// Splits on a separator, trims each piece and drops empty ones.
fn split_trimmed<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    text.split(separator)
        .map(str::trim)
        .filter(|piece| !piece.is_empty())
        .collect()
}

/// Parses a single unit into its items.
pub fn parse_unit(unit: &str) -> SiteResult<PoemUnit> {
    let mut items = Vec::new();

    for line in unit.trim().split('\n') {
        let item = match line.split_once(':') {
            Some((prefix, rest)) => match prefix.trim() {
                "link" => UnitItem::Link(rest.trim().to_string()),
                "top" => UnitItem::Media {
                    layout: MediaLayout::Row,
                    media: parse_media_list(rest)?,
                },
                "left" => UnitItem::Media {
                    layout: MediaLayout::Column,
                    media: parse_media_list(rest)?,
                },
                _ => UnitItem::Line(line.to_string()),
            },
            None => UnitItem::Line(line.to_string()),
        };
        items.push(item);
    }

    Ok(PoemUnit { items })
}

/// Parses a comma separated list of media references.
fn parse_media_list(list: &str) -> SiteResult<Vec<MediaRef>> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(parse_media_ref)
        .collect()
}

/// Parses `filename` or `filename[width]`.
///
/// Anything after the match is ignored, so `photo.jpg[wide]` yields
/// `photo.jpg` without a width.
pub fn parse_media_ref(entry: &str) -> SiteResult<MediaRef> {
    let trimmed = entry.trim();
    let captures = MEDIA_REF_PATTERN
        .captures(trimmed)
        .ok_or_else(|| SiteError::InvalidMedia(entry.to_string()))?;

    let filename = captures
        .get(1)
        .map(|m| m.as_str().trim())
        .unwrap_or_default()
        .to_string();

    let width = captures.get(2).map(|digits| digits.as_str().to_string());

    Ok(MediaRef { filename, width })
}
