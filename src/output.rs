use std::io;

use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use tracing::debug;

use crate::embed::EmbeddedFont;
use crate::error::RebuildError;
use crate::lines::Line;

const FONT_RESOURCE: &str = "F1";
const PRODUCER: &str = concat!("pdf-rebuild ", env!("CARGO_PKG_VERSION"));

/// Where a reconstructed line's baseline lands on the rebuilt page.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Placement {
    /// Draw at the line's anchor. Source and output share the bottom-left
    /// origin, so text stays where it was.
    #[default]
    Preserve,
    /// Draw at `height - anchor_y`, flipping the page vertically.
    Mirror,
}

impl Placement {
    pub fn baseline(self, anchor_y: f64, page_height: f64) -> f64 {
        match self {
            Placement::Preserve => anchor_y,
            Placement::Mirror => page_height - anchor_y,
        }
    }
}

/// Non-stroking fill colour, components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0., 0., 0.);

    pub const fn new(r: f64, g: f64, b: f64) -> Rgb {
        Rgb { r, g, b }
    }
}

impl Default for Rgb {
    fn default() -> Self {
        Rgb::BLACK
    }
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

fn serialize_error(e: impl std::fmt::Display) -> RebuildError {
    RebuildError::Io(io::Error::other(e.to_string()))
}

/// The PDF being rebuilt: one page per source page, all sharing one font.
pub(crate) struct OutputDocument {
    doc: Document,
    pages_id: ObjectId,
    font_id: ObjectId,
    resources_id: ObjectId,
    page_ids: Vec<ObjectId>,
    font: EmbeddedFont,
    placement: Placement,
    color: Rgb,
}

impl OutputDocument {
    pub(crate) fn new(font: EmbeddedFont, placement: Placement, color: Rgb) -> OutputDocument {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        // The font dictionary is only written once every glyph is known.
        let font_id = doc.new_object_id();
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                FONT_RESOURCE => font_id,
            },
        });

        OutputDocument {
            doc,
            pages_id,
            font_id,
            resources_id,
            page_ids: Vec::new(),
            font,
            placement,
            color,
        }
    }

    pub(crate) fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn line_operations(&mut self, line: &Line, page_height: f64) -> Vec<Operation> {
        let size = line.representative_font_size();
        let y = self.placement.baseline(line.anchor_y, page_height);
        let glyphs = self.font.encode(&line.combined_text());
        let Rgb { r, g, b } = self.color;

        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![FONT_RESOURCE.into(), real(size)]),
            Operation::new("rg", vec![real(r), real(g), real(b)]),
            Operation::new("Td", vec![real(line.x()), real(y)]),
            Operation::new(
                "Tj",
                vec![Object::String(glyphs, StringFormat::Hexadecimal)],
            ),
            Operation::new("ET", vec![]),
        ]
    }

    /// Append a `width` x `height` page drawing each line in order.
    pub(crate) fn add_page(
        &mut self,
        width: f64,
        height: f64,
        lines: &[Line],
    ) -> Result<ObjectId, RebuildError> {
        let mut operations = Vec::with_capacity(lines.len() * 6);
        for line in lines {
            operations.extend(self.line_operations(line, height));
        }
        let content = Content { operations }
            .encode()
            .map_err(serialize_error)?;

        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![real(0.), real(0.), real(width), real(height)],
            "Contents" => content_id,
            "Resources" => self.resources_id,
        });
        self.page_ids.push(page_id);

        debug!(
            "emitted page {} ({}x{}) with {} lines",
            self.page_ids.len(),
            width,
            height,
            lines.len()
        );
        Ok(page_id)
    }

    /// Finish the document and serialize it.
    pub(crate) fn save(mut self, modified: DateTime<Utc>) -> Result<Vec<u8>, RebuildError> {
        self.font.write_to(&mut self.doc, self.font_id);

        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.page_ids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });

        let date = modified.format("D:%Y%m%d%H%M%SZ").to_string();
        let info_id = self.doc.add_object(dictionary! {
            "Producer" => Object::string_literal(PRODUCER),
            "CreationDate" => Object::string_literal(date.as_str()),
            "ModDate" => Object::string_literal(date.as_str()),
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.trailer.set("Info", info_id);

        self.doc.compress();
        let mut buf = Vec::new();
        self.doc.save_to(&mut buf).map_err(serialize_error)?;
        Ok(buf)
    }
}
