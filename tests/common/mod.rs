#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, StringFormat, dictionary};

pub const NUM_GLYPHS: u16 = 96;
pub const GLYPH_ADVANCE: u16 = 600;

/// Glyph id the test font assigns to printable ASCII `c`.
pub fn test_gid(c: char) -> u16 {
    c as u16 - 0x20 + 1
}

fn table_record(out: &mut Vec<u8>, tag: &[u8; 4], offset: usize, len: usize) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(&(offset as u32).to_be_bytes());
    out.extend_from_slice(&(len as u32).to_be_bytes());
}

/// A minimal TrueType font with no outlines that maps printable ASCII
/// (U+0020..U+007E) to glyphs 1..=95.
pub fn test_font() -> Vec<u8> {
    build_font(0x0001_0000, None)
}

/// The same font flagged as CFF-flavoured OpenType. The `CFF ` table is a
/// bare header, so the program has no usable outlines.
pub fn test_cff_font() -> Vec<u8> {
    build_font(u32::from_be_bytes(*b"OTTO"), Some(vec![1, 0, 4, 1]))
}

fn build_font(sfnt_version: u32, cff: Option<Vec<u8>>) -> Vec<u8> {
    let mut cmap = Vec::new();
    cmap.extend_from_slice(&0u16.to_be_bytes()); // version
    cmap.extend_from_slice(&1u16.to_be_bytes()); // numTables
    cmap.extend_from_slice(&0u16.to_be_bytes()); // platform: Unicode
    cmap.extend_from_slice(&4u16.to_be_bytes()); // encoding: full repertoire
    cmap.extend_from_slice(&12u32.to_be_bytes()); // subtable offset
    cmap.extend_from_slice(&12u16.to_be_bytes()); // format
    cmap.extend_from_slice(&0u16.to_be_bytes());
    cmap.extend_from_slice(&28u32.to_be_bytes()); // length
    cmap.extend_from_slice(&0u32.to_be_bytes()); // language
    cmap.extend_from_slice(&1u32.to_be_bytes()); // numGroups
    cmap.extend_from_slice(&0x20u32.to_be_bytes());
    cmap.extend_from_slice(&0x7Eu32.to_be_bytes());
    cmap.extend_from_slice(&1u32.to_be_bytes());

    let mut head = vec![0u8; 54];
    head[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    head[12..16].copy_from_slice(&0x5F0F_3CF5u32.to_be_bytes());
    head[18..20].copy_from_slice(&1000u16.to_be_bytes());
    head[40..42].copy_from_slice(&600i16.to_be_bytes()); // xMax
    head[42..44].copy_from_slice(&800i16.to_be_bytes()); // yMax

    let mut hhea = vec![0u8; 36];
    hhea[0..4].copy_from_slice(&0x0001_0000u32.to_be_bytes());
    hhea[4..6].copy_from_slice(&800i16.to_be_bytes());
    hhea[6..8].copy_from_slice(&(-200i16).to_be_bytes());
    hhea[34..36].copy_from_slice(&NUM_GLYPHS.to_be_bytes());

    let mut hmtx = Vec::new();
    for _ in 0..NUM_GLYPHS {
        hmtx.extend_from_slice(&GLYPH_ADVANCE.to_be_bytes());
        hmtx.extend_from_slice(&0i16.to_be_bytes());
    }

    let mut maxp = Vec::new();
    maxp.extend_from_slice(&0x0000_5000u32.to_be_bytes());
    maxp.extend_from_slice(&NUM_GLYPHS.to_be_bytes());

    // Records must be sorted by tag.
    let mut tables: Vec<(&[u8; 4], Vec<u8>)> = Vec::new();
    if let Some(cff) = cff {
        tables.push((b"CFF ", cff));
    }
    tables.extend([
        (b"cmap", cmap),
        (b"head", head),
        (b"hhea", hhea),
        (b"hmtx", hmtx),
        (b"maxp", maxp),
    ]);

    let mut font = Vec::new();
    font.extend_from_slice(&sfnt_version.to_be_bytes());
    font.extend_from_slice(&(tables.len() as u16).to_be_bytes());
    font.extend_from_slice(&64u16.to_be_bytes()); // searchRange
    font.extend_from_slice(&2u16.to_be_bytes()); // entrySelector
    font.extend_from_slice(&16u16.to_be_bytes()); // rangeShift

    let mut offset = 12 + 16 * tables.len();
    let mut body = Vec::new();
    for (tag, data) in &tables {
        table_record(&mut font, tag, offset, data.len());
        body.extend_from_slice(data);
        while body.len() % 4 != 0 {
            body.push(0);
        }
        offset = 12 + 16 * tables.len() + body.len();
    }
    font.extend_from_slice(&body);
    font
}

/// `(text, x, y, font size)` drawn with Helvetica.
pub type Run<'a> = (&'a str, f64, f64, f64);

pub struct TestPage<'a> {
    pub width: f64,
    pub height: f64,
    pub runs: Vec<Run<'a>>,
}

impl<'a> TestPage<'a> {
    pub fn letter(runs: Vec<Run<'a>>) -> Self {
        TestPage {
            width: 612.,
            height: 792.,
            runs,
        }
    }
}

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// A PDF with one page per `TestPage`, each run shown with its own `Td`.
pub fn test_pdf(pages: &[TestPage<'_>]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::new();
    for page in pages {
        let mut operations = Vec::new();
        for &(text, x, y, size) in &page.runs {
            operations.push(Operation::new("BT", vec![]));
            operations.push(Operation::new("Tf", vec!["F1".into(), real(size)]));
            operations.push(Operation::new("Td", vec![real(x), real(y)]));
            // Latin-1 agrees with PDFDocEncoding for the characters used here.
            let bytes = text.chars().map(|c| c as u32 as u8).collect();
            operations.push(Operation::new(
                "Tj",
                vec![Object::String(bytes, StringFormat::Literal)],
            ));
            operations.push(Operation::new("ET", vec![]));
        }
        let content = Content { operations }.encode().unwrap();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![real(0.), real(0.), real(page.width), real(page.height)],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    doc.save_to(&mut buf).unwrap();
    buf
}

pub fn hello_world_pdf() -> Vec<u8> {
    test_pdf(&[TestPage::letter(vec![
        ("Hello", 72., 700., 12.),
        ("World", 110., 700., 12.),
        ("Line2", 72., 650., 12.),
    ])])
}
