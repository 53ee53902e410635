use std::fmt;

use chrono::{DateTime, Utc};
use euclid::Transform2D;

use crate::lines::Line;

pub struct Space;
pub type Transform = Transform2D<f64, Space, Space>;

/// Content type of every rebuilt artifact.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

/// Prefix prepended to the source file name of a rebuilt artifact.
pub const REBUILT_PREFIX: &str = "rebuilt-";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl MediaBox {
    pub fn width(&self) -> f64 {
        (self.urx - self.llx).abs()
    }

    pub fn height(&self) -> f64 {
        (self.ury - self.lly).abs()
    }
}

/// A show-text operation as the decoder saw it, before whitespace filtering.
///
/// `transform` is `[a, b, c, d, e, f]` of the text rendering matrix at the
/// first glyph; `e`/`f` is the origin relative to the page's lower-left
/// corner.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextItem {
    pub text: String,
    pub transform: [f64; 6],
}

impl RawTextItem {
    /// Turn this item into a [`TextRun`], or `None` when it is blank.
    pub fn to_run(&self) -> Option<TextRun> {
        let text = self.text.trim();
        if text.is_empty() {
            return None;
        }

        let [a, b, _, _, x, y] = self.transform;
        Some(TextRun {
            text: text.to_owned(),
            x,
            y,
            font_size: a.hypot(b),
        })
    }
}

/// One positioned, non-blank piece of text on a page.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
}

impl TextRun {
    pub fn new(text: impl Into<String>, x: f64, y: f64, font_size: f64) -> Self {
        TextRun {
            text: text.into(),
            x,
            y,
            font_size,
        }
    }
}

/// A source page: geometry and every text item in content-stream order.
#[derive(Debug, Clone)]
pub struct DecodedPage {
    /// 1-based page number.
    pub number: u32,
    pub width: f64,
    pub height: f64,
    pub items: Vec<RawTextItem>,
}

impl DecodedPage {
    pub fn runs(&self) -> impl Iterator<Item = TextRun> + '_ {
        self.items.iter().filter_map(RawTextItem::to_run)
    }
}

/// The reconstructed lines of one page, top of the page first.
#[derive(Debug, Clone)]
pub struct PageLines {
    pub number: u32,
    pub width: f64,
    pub height: f64,
    pub lines: Vec<Line>,
}

impl PageLines {
    pub fn is_blank(&self) -> bool {
        self.lines.is_empty()
    }
}

impl fmt::Display for PageLines {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in &self.lines {
            writeln!(f, "{}", line.combined_text())?;
        }
        Ok(())
    }
}

/// A rebuilt PDF, named after its source.
#[derive(Debug, Clone)]
pub struct RebuiltFile {
    pub name: String,
    pub content_type: &'static str,
    pub last_modified: DateTime<Utc>,
    pub bytes: Vec<u8>,
}

impl RebuiltFile {
    pub(crate) fn new(source_name: &str, bytes: Vec<u8>, last_modified: DateTime<Utc>) -> Self {
        RebuiltFile {
            name: format!("{REBUILT_PREFIX}{source_name}"),
            content_type: PDF_CONTENT_TYPE,
            last_modified,
            bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_items_produce_no_run() {
        let item = RawTextItem {
            text: " \t ".into(),
            transform: [12., 0., 0., 12., 10., 700.],
        };
        assert!(item.to_run().is_none());
    }

    #[test]
    fn run_text_is_trimmed_and_sized_from_the_transform() {
        let item = RawTextItem {
            text: "  Hello ".into(),
            transform: [3., 4., -4., 3., 10., 700.],
        };
        let run = item.to_run().unwrap();
        assert_eq!(run.text, "Hello");
        assert_eq!((run.x, run.y), (10., 700.));
        assert!((run.font_size - 5.).abs() < 1e-9);
    }

    #[test]
    fn rebuilt_file_is_prefixed() {
        let file = RebuiltFile::new("paper.pdf", vec![1, 2, 3], Utc::now());
        assert_eq!(file.name, "rebuilt-paper.pdf");
        assert_eq!(file.content_type, "application/pdf");
        assert_eq!(file.len(), 3);
        assert!(!file.is_empty());
    }
}
