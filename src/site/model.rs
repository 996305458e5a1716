//! Poem Document Model
//!
//! A document is a list of blocks (one poem each), a block is a list of
//! units, and a unit is a list of items in source order.
//!
//! # Example Source Format
//!
//! ```text
//! top: sunrise.jpg[400], waves.mp4
//! The light comes up
//! over the water
//! ---
//! left: gull.jpg
//! link: https://example.com/gulls
//! A gull, unbothered
//! ===
//! Second poem
//! ```

use std::path::Path;

/// File extensions rendered as `<video>` instead of `<img>`.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "mov"];

/// Whether a media file is shown as an image or a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Image,
    Video,
}

/// A reference to a file in the media directory, with an optional width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub filename: String,
    /// Display width in pixels, kept as written in the source
    pub width: Option<String>,
}

impl MediaRef {
    pub fn new(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            width: None,
        }
    }

    pub fn with_width(mut self, width: impl Into<String>) -> Self {
        self.width = Some(width.into());
        self
    }

    /// Classifies the file by its extension (case-insensitive).
    pub fn kind(&self) -> MediaKind {
        let is_video = Path::new(&self.filename)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                VIDEO_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false);

        if is_video {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }

    /// Alt text: the file stem with underscores turned into spaces.
    pub fn alt_text(&self) -> String {
        Path::new(&self.filename)
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default()
            .replace('_', " ")
    }
}

/// How a group of media is laid out relative to the poem text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaLayout {
    /// `top:` media, a horizontal row above the text
    Row,
    /// `left:` media, a column beside the text
    Column,
}

impl MediaLayout {
    pub fn css_class(&self) -> &'static str {
        match self {
            Self::Row => "image-row",
            Self::Column => "image-column",
        }
    }
}

/// A single directive or text line within a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitItem {
    Link(String),
    Media {
        layout: MediaLayout,
        media: Vec<MediaRef>,
    },
    Line(String),
}

/// Part of a poem, separated from its neighbours by `---`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoemUnit {
    pub items: Vec<UnitItem>,
}

impl PoemUnit {
    /// True if the unit places media in a column beside its text.
    pub fn uses_left_layout(&self) -> bool {
        self.items.iter().any(|item| {
            matches!(
                item,
                UnitItem::Media {
                    layout: MediaLayout::Column,
                    ..
                }
            )
        })
    }

    /// Plain text lines of the unit, in source order.
    pub fn text_lines(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter_map(|item| match item {
                UnitItem::Line(line) => Some(line.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// One poem, separated from its neighbours by `===`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoemBlock {
    pub units: Vec<PoemUnit>,
}

/// A parsed poem source file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Document {
    pub blocks: Vec<PoemBlock>,
}

impl Document {
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
