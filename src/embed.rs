//! The single font program embedded into every rebuilt document.
//!
//! Text is encoded as two-byte glyph ids (`Identity-H`), so the font is
//! written as a Type0 font over a CID font whose CIDs are glyph ids. Only the
//! glyphs actually shown get `/W` and `/ToUnicode` entries.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use lopdf::{Document, Object, ObjectId, Stream, dictionary};
use tracing::{debug, warn};
use ttf_parser::{Face, GlyphId, Tag, name_id};

use crate::error::FontEmbedError;

const FALLBACK_FONT_NAME: &str = "EmbeddedFont";
const BFCHAR_CHUNK: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontProgramKind {
    TrueType,
    OpenTypeCff,
}

pub struct EmbeddedFont {
    data: Vec<u8>,
    kind: FontProgramKind,
    name: String,
    glyph_ids: HashMap<char, u16>,
    /// Advance per glyph id, in 1/1000 em.
    widths: Vec<i64>,
    bbox: [i64; 4],
    ascent: i64,
    descent: i64,
    cap_height: i64,
    used: BTreeMap<u16, String>,
}

impl fmt::Debug for EmbeddedFont {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbeddedFont")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .field("glyphs", &self.widths.len())
            .field("used", &self.used.len())
            .finish()
    }
}

impl EmbeddedFont {
    /// Parse a TrueType or OpenType font program.
    pub fn from_bytes(data: Vec<u8>) -> Result<EmbeddedFont, FontEmbedError> {
        let face = Face::parse(&data, 0)?;

        let raw = face.raw_face();
        let kind = if raw.table(Tag::from_bytes(b"CFF ")).is_some()
            || raw.table(Tag::from_bytes(b"CFF2")).is_some()
        {
            FontProgramKind::OpenTypeCff
        } else {
            FontProgramKind::TrueType
        };
        let units_per_em = match face.units_per_em() {
            0 => 1000.0,
            u => u as f64,
        };
        let scale = |v: f64| (v * 1000.0 / units_per_em).round() as i64;

        let mut glyph_ids = HashMap::new();
        for subtable in face.tables().cmap.iter().flat_map(|cmap| cmap.subtables) {
            if !subtable.is_unicode() {
                continue;
            }
            subtable.codepoints(|codepoint| {
                let Some(c) = char::from_u32(codepoint) else {
                    return;
                };
                if let Some(gid) = subtable.glyph_index(codepoint).filter(|g| g.0 != 0) {
                    glyph_ids.entry(c).or_insert(gid.0);
                }
            });
        }

        let widths = (0..face.number_of_glyphs())
            .map(|g| scale(face.glyph_hor_advance(GlyphId(g)).unwrap_or(0) as f64))
            .collect();

        let rect = face.global_bounding_box();
        let bbox = [
            scale(rect.x_min as f64),
            scale(rect.y_min as f64),
            scale(rect.x_max as f64),
            scale(rect.y_max as f64),
        ];
        let ascent = scale(face.ascender() as f64);
        let descent = scale(face.descender() as f64);
        let cap_height = face
            .capital_height()
            .map_or(ascent, |h| scale(h as f64));

        let name = face
            .names()
            .into_iter()
            .filter(|n| n.name_id == name_id::POST_SCRIPT_NAME)
            .find_map(|n| n.to_string())
            .map(|n| sanitize_font_name(&n))
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| FALLBACK_FONT_NAME.to_owned());

        debug!(
            "parsed font {} ({:?}): {} glyphs, {} mapped chars",
            name,
            kind,
            face.number_of_glyphs(),
            glyph_ids.len()
        );

        Ok(EmbeddedFont {
            data,
            kind,
            name,
            glyph_ids,
            widths,
            bbox,
            ascent,
            descent,
            cap_height,
            used: BTreeMap::new(),
        })
    }

    /// Decode a base64 font program, ignoring embedded whitespace.
    pub fn from_base64(encoded: &str) -> Result<EmbeddedFont, FontEmbedError> {
        let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let data = STANDARD.decode(compact)?;
        EmbeddedFont::from_bytes(data)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FontProgramKind {
        self.kind
    }

    pub fn glyph_id(&self, c: char) -> Option<u16> {
        self.glyph_ids.get(&c).copied()
    }

    /// Encode `text` as big-endian glyph ids, recording every glyph used.
    pub fn encode(&mut self, text: &str) -> Vec<u8> {
        let mut out = Vec::with_capacity(text.len() * 2);
        for c in text.chars() {
            let gid = match self.glyph_ids.get(&c) {
                Some(&gid) => {
                    self.used.entry(gid).or_insert_with(|| c.to_string());
                    gid
                }
                None => {
                    warn!("font {} has no glyph for {:?}", self.name, c);
                    0
                }
            };
            out.extend_from_slice(&gid.to_be_bytes());
        }
        out
    }

    fn width(&self, gid: u16) -> i64 {
        self.widths.get(gid as usize).copied().unwrap_or(0)
    }

    /// `/W` array grouping runs of consecutive glyph ids.
    fn width_array(&self) -> Vec<Object> {
        let mut array = Vec::new();
        let mut run: Option<(u16, Vec<Object>)> = None;

        for &gid in self.used.keys() {
            if let Some((first, widths)) = &mut run {
                if *first as usize + widths.len() == gid as usize {
                    widths.push(Object::Integer(self.width(gid)));
                    continue;
                }
            }
            if let Some((first, widths)) = run.take() {
                array.push(Object::Integer(first as i64));
                array.push(Object::Array(widths));
            }
            run = Some((gid, vec![Object::Integer(self.width(gid))]));
        }
        if let Some((first, widths)) = run {
            array.push(Object::Integer(first as i64));
            array.push(Object::Array(widths));
        }
        array
    }

    fn to_unicode_cmap(&self) -> String {
        let entries: Vec<(&u16, &String)> = self.used.iter().collect();

        let mut out = String::new();
        out.push_str("/CIDInit /ProcSet findresource begin\n");
        out.push_str("12 dict begin\n");
        out.push_str("begincmap\n");
        out.push_str("/CIDSystemInfo << /Registry (Adobe) /Ordering (UCS) /Supplement 0 >> def\n");
        out.push_str("/CMapName /Adobe-Identity-UCS def\n");
        out.push_str("/CMapType 2 def\n");
        out.push_str("1 begincodespacerange\n<0000> <FFFF>\nendcodespacerange\n");

        for chunk in entries.chunks(BFCHAR_CHUNK) {
            out.push_str(&format!("{} beginbfchar\n", chunk.len()));
            for (gid, text) in chunk {
                let mut uni = String::new();
                for unit in text.encode_utf16() {
                    uni.push_str(&format!("{:04X}", unit));
                }
                out.push_str(&format!("<{:04X}> <{}>\n", gid, uni));
            }
            out.push_str("endbfchar\n");
        }

        out.push_str("endcmap\n");
        out.push_str("CMapName currentdict /CMap defineresource pop\n");
        out.push_str("end\nend\n");
        out
    }

    /// Write the font program and its dictionaries, placing the Type0 font
    /// dictionary at `font_id`.
    pub(crate) fn write_to(&self, doc: &mut Document, font_id: ObjectId) {
        let (file_key, file_stream, cid_subtype) = match self.kind {
            FontProgramKind::TrueType => (
                "FontFile2",
                Stream::new(
                    dictionary! { "Length1" => self.data.len() as i64 },
                    self.data.clone(),
                ),
                "CIDFontType2",
            ),
            FontProgramKind::OpenTypeCff => (
                "FontFile3",
                Stream::new(dictionary! { "Subtype" => "OpenType" }, self.data.clone()),
                "CIDFontType0",
            ),
        };
        let file_id = doc.add_object(file_stream);

        let descriptor_id = doc.add_object(dictionary! {
            "Type" => "FontDescriptor",
            "FontName" => Object::Name(self.name.clone().into_bytes()),
            "Flags" => 32,
            "FontBBox" => self.bbox.iter().map(|&v| Object::Integer(v)).collect::<Vec<_>>(),
            "ItalicAngle" => 0,
            "Ascent" => self.ascent,
            "Descent" => self.descent,
            "CapHeight" => self.cap_height,
            "StemV" => 80,
            "MissingWidth" => self.width(0),
            file_key => file_id,
        });

        let mut cid_font = dictionary! {
            "Type" => "Font",
            "Subtype" => cid_subtype,
            "BaseFont" => Object::Name(self.name.clone().into_bytes()),
            "CIDSystemInfo" => dictionary! {
                "Registry" => Object::string_literal("Adobe"),
                "Ordering" => Object::string_literal("Identity"),
                "Supplement" => 0,
            },
            "FontDescriptor" => descriptor_id,
            "DW" => self.width(0),
        };
        if cid_subtype == "CIDFontType2" {
            cid_font.set("CIDToGIDMap", "Identity");
        }
        let widths = self.width_array();
        if !widths.is_empty() {
            cid_font.set("W", widths);
        }
        let cid_font_id = doc.add_object(cid_font);

        let to_unicode_id = doc.add_object(Stream::new(
            dictionary! {},
            self.to_unicode_cmap().into_bytes(),
        ));

        doc.objects.insert(
            font_id,
            Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type0",
                "BaseFont" => Object::Name(self.name.clone().into_bytes()),
                "Encoding" => "Identity-H",
                "DescendantFonts" => vec![cid_font_id.into()],
                "ToUnicode" => to_unicode_id,
            }),
        );

        debug!(
            "embedded font {} with {} used glyphs",
            self.name,
            self.used.len()
        );
    }
}

fn sanitize_font_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_graphic() && !"()<>[]{}/%#".contains(*c))
        .collect()
}
