use std::collections::HashMap;
use std::fmt::{self, Debug};
use std::rc::Rc;
use std::slice::Iter;

use adobe_cmap_parser::{ByteMapping, CIDRange, CodeRange};
use encoding_rs::{Encoding, MACINTOSH, WINDOWS_1252};
use lopdf::{Dictionary, Document, Object};
use tracing::{debug, warn};
use unicode_normalization::UnicodeNormalization;

use crate::utils::*;

pub(crate) type CharCode = u32;

/// Width used for simple fonts that carry no metrics at all.
const DEFAULT_SIMPLE_WIDTH: f64 = 500.;

/// Default `/DW` of CID fonts.
const DEFAULT_CID_WIDTH: f64 = 1000.;

pub(crate) struct PdfFontIter<'a> {
    i: Iter<'a, u8>,
    font: &'a dyn PdfFont,
}

impl Iterator for PdfFontIter<'_> {
    type Item = (CharCode, u8);
    fn next(&mut self) -> Option<(CharCode, u8)> {
        self.font.next_char(&mut self.i)
    }
}

pub(crate) trait PdfFont: Debug {
    /// Advance of `code` in thousandths of text space.
    fn get_width(&self, code: CharCode) -> f64;
    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)>;
    fn decode_char(&self, code: CharCode) -> String;
    fn get_font_name(&self) -> &str;
}

impl<'a> dyn PdfFont + 'a {
    pub(crate) fn char_codes(&'a self, chars: &'a [u8]) -> PdfFontIter<'a> {
        PdfFontIter {
            i: chars.iter(),
            font: self,
        }
    }

    #[cfg(test)]
    pub(crate) fn decode(&self, chars: &[u8]) -> String {
        self.char_codes(chars)
            .map(|(code, _)| self.decode_char(code))
            .collect()
    }
}

pub(crate) fn make_font(doc: &Document, font: &Dictionary) -> Rc<dyn PdfFont> {
    let subtype = maybe_get_name_string(doc, font, b"Subtype").unwrap_or_default();
    debug!("make_font({})", subtype);
    if subtype == "Type0" {
        Rc::new(PdfCIDFont::new(doc, font))
    } else {
        Rc::new(PdfSimpleFont::new(doc, font, subtype == "Type3"))
    }
}

/// Single-byte fonts: Type1, TrueType, MMType1 and Type3.
pub(crate) struct PdfSimpleFont {
    base_name: String,
    encoding: Vec<Option<String>>,
    unicode_map: Option<HashMap<CharCode, String>>,
    widths: HashMap<CharCode, f64>,
    missing_width: f64,
}

impl PdfSimpleFont {
    fn new(doc: &Document, font: &Dictionary, is_type3: bool) -> PdfSimpleFont {
        let base_name = maybe_get_name_string(doc, font, b"BaseFont")
            .or_else(|| maybe_get_name_string(doc, font, b"Name"))
            .unwrap_or_default();
        let descriptor = maybe_get_dict(doc, font, b"FontDescriptor");

        let encoding = simple_encoding(doc, font, descriptor);
        let unicode_map = get_unicode_map(doc, font);

        // Type3 glyph space is scaled by /FontMatrix rather than 1/1000.
        let scale = if is_type3 {
            maybe_get_array(doc, font, b"FontMatrix")
                .and_then(|m| as_nums::<1>(doc, m))
                .map_or(1., |[a]| a * 1000.)
        } else {
            1.
        };

        let mut widths = HashMap::new();
        let first_char = maybe_get_num(doc, font, b"FirstChar").unwrap_or(0.) as i64;
        if let Some(ws) = maybe_get_array(doc, font, b"Widths") {
            for (i, w) in ws.iter().enumerate() {
                if let Some(w) = maybe_deref(doc, w).and_then(as_num) {
                    widths.insert((first_char + i as i64) as CharCode, w * scale);
                }
            }
        }

        let missing_width = descriptor
            .and_then(|d| maybe_get_num(doc, d, b"MissingWidth"))
            .map(|w| w * scale)
            .unwrap_or(if widths.is_empty() {
                DEFAULT_SIMPLE_WIDTH
            } else {
                0.
            });

        debug!(
            "simple font {} with {} widths, ToUnicode: {}",
            base_name,
            widths.len(),
            unicode_map.is_some()
        );

        PdfSimpleFont {
            base_name,
            encoding,
            unicode_map,
            widths,
            missing_width,
        }
    }
}

impl PdfFont for PdfSimpleFont {
    fn get_width(&self, code: CharCode) -> f64 {
        self.widths.get(&code).copied().unwrap_or(self.missing_width)
    }

    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)> {
        iter.next().map(|x| (*x as CharCode, 1))
    }

    fn decode_char(&self, code: CharCode) -> String {
        if let Some(s) = self.unicode_map.as_ref().and_then(|m| m.get(&code)) {
            return s.clone();
        }
        match self.encoding.get(code as usize) {
            Some(Some(s)) => s.clone(),
            _ => {
                debug!("no mapping for {} in {}", code, self.base_name);
                String::new()
            }
        }
    }

    fn get_font_name(&self) -> &str {
        &self.base_name
    }
}

impl Debug for PdfSimpleFont {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PdfSimpleFont")
            .field("base_name", &self.base_name)
            .finish()
    }
}

/// Build the 256-entry code → text table of a simple font.
fn simple_encoding(
    doc: &Document,
    font: &Dictionary,
    descriptor: Option<&Dictionary>,
) -> Vec<Option<String>> {
    let encoding = maybe_get_obj(doc, font, b"Encoding");
    let base = match encoding {
        Some(Object::Name(name)) => Some(name.as_slice()),
        Some(Object::Dictionary(dict)) => maybe_get_name(doc, dict, b"BaseEncoding"),
        _ => None,
    };

    let mut table = match base {
        Some(name) => base_encoding_table(name),
        None => builtin_encoding(doc, descriptor).unwrap_or_else(pdf_doc_encoding_table),
    };

    if let Some(Object::Dictionary(dict)) = encoding {
        if let Some(differences) = maybe_get_array(doc, dict, b"Differences") {
            apply_differences(doc, differences, &mut table);
        }
    }

    table
}

fn pdf_doc_encoding_table() -> Vec<Option<String>> {
    PDFDocEncoding
        .iter()
        .map(|&u| match u {
            0..0x20 => None,
            u => char::from_u32(u as u32).map(String::from),
        })
        .collect()
}

fn single_byte_table(encoding: &'static Encoding) -> Vec<Option<String>> {
    (0..=255u8)
        .map(|b| {
            let bytes = [b];
            let (s, _, had_errors) = encoding.decode(&bytes);
            if had_errors || b < 0x20 {
                None
            } else {
                Some(s.into_owned())
            }
        })
        .collect()
}

fn base_encoding_table(name: &[u8]) -> Vec<Option<String>> {
    match name {
        b"WinAnsiEncoding" => single_byte_table(WINDOWS_1252),
        b"MacRomanEncoding" => single_byte_table(MACINTOSH),
        b"StandardEncoding" | b"PDFDocEncoding" => pdf_doc_encoding_table(),
        other => {
            warn!(
                "unsupported base encoding {:?}, using PDFDocEncoding",
                pdf_to_utf8(other)
            );
            pdf_doc_encoding_table()
        }
    }
}

/// The built-in encoding of an embedded Type1 program, if there is one.
fn builtin_encoding(doc: &Document, descriptor: Option<&Dictionary>) -> Option<Vec<Option<String>>> {
    let file = maybe_get_obj(doc, descriptor?, b"FontFile")?.as_stream().ok()?;
    let contents = get_contents(file);
    let map = match type1_encoding_parser::get_encoding_map(&contents) {
        Ok(map) => map,
        Err(_) => {
            debug!("embedded Type1 program has no parseable encoding");
            return None;
        }
    };

    let mut table = pdf_doc_encoding_table();
    for (code, name) in map {
        if let Some(slot) = table.get_mut(code as usize) {
            *slot = glyph_name_to_unicode(&pdf_to_utf8(&name));
        }
    }
    Some(table)
}

fn apply_differences(doc: &Document, differences: &[Object], table: &mut [Option<String>]) {
    let mut code = 0usize;
    for o in differences {
        match maybe_deref(doc, o) {
            Some(&Object::Integer(i)) => code = i.max(0) as usize,
            Some(Object::Name(name)) => {
                let name = pdf_to_utf8(name);
                if let Some(slot) = table.get_mut(code) {
                    let unicode = glyph_name_to_unicode(&name);
                    if unicode.is_none() {
                        debug!("unknown glyph name {} for code {}", name, code);
                    }
                    *slot = unicode;
                }
                code += 1;
            }
            other => debug!("unexpected Differences entry {:?}", other),
        }
    }
}

/// Type0 fonts with a CID-keyed descendant.
pub(crate) struct PdfCIDFont {
    base_name: String,
    encoding: ByteMapping,
    to_unicode: Option<HashMap<CharCode, String>>,
    widths: CidWidths,
    default_width: f64,
}

/// `/W` entries: individual widths plus unexpanded `c_first c_last w` ranges.
#[derive(Debug, Default)]
struct CidWidths {
    single: HashMap<CharCode, f64>,
    ranges: Vec<(CharCode, CharCode, f64)>,
}

impl CidWidths {
    fn get(&self, code: CharCode) -> Option<f64> {
        self.single.get(&code).copied().or_else(|| {
            self.ranges
                .iter()
                .find(|&&(first, last, _)| (first..=last).contains(&code))
                .map(|&(_, _, width)| width)
        })
    }
}

fn identity_mapping() -> ByteMapping {
    ByteMapping {
        codespace: vec![CodeRange {
            width: 2,
            start: 0,
            end: 0xffff,
        }],
        cid: vec![CIDRange {
            src_code_lo: 0,
            src_code_hi: 0xffff,
            dst_CID_lo: 0,
        }],
    }
}

impl PdfCIDFont {
    fn new(doc: &Document, font: &Dictionary) -> PdfCIDFont {
        let base_name = maybe_get_name_string(doc, font, b"BaseFont").unwrap_or_default();

        let encoding = match maybe_get_obj(doc, font, b"Encoding") {
            Some(Object::Name(name)) => {
                if name != b"Identity-H" && name != b"Identity-V" {
                    warn!(
                        "predefined CMap {:?} is not supported, assuming Identity-H",
                        pdf_to_utf8(name)
                    );
                }
                identity_mapping()
            }
            Some(Object::Stream(stream)) => {
                let contents = get_contents(stream);
                adobe_cmap_parser::get_byte_mapping(&contents).unwrap_or_else(|_| {
                    warn!("embedded CMap of {} could not be parsed", base_name);
                    identity_mapping()
                })
            }
            other => {
                warn!("unexpected Type0 encoding {:?}, assuming Identity-H", other);
                identity_mapping()
            }
        };

        let ciddict = maybe_get_array(doc, font, b"DescendantFonts")
            .and_then(|d| d.first())
            .and_then(|d| maybe_deref(doc, d))
            .and_then(|d| d.as_dict().ok());

        let mut widths = CidWidths::default();
        let mut default_width = DEFAULT_CID_WIDTH;
        if let Some(ciddict) = ciddict {
            default_width = maybe_get_num(doc, ciddict, b"DW").unwrap_or(DEFAULT_CID_WIDTH);
            if let Some(w) = maybe_get_array(doc, ciddict, b"W") {
                parse_cid_widths(doc, w, &mut widths);
            }
        } else {
            warn!("Type0 font {} has no descendant font", base_name);
        }

        PdfCIDFont {
            base_name,
            encoding,
            to_unicode: get_unicode_map(doc, font),
            widths,
            default_width,
        }
    }
}

/// Parse a `/W` array: `c [w1 w2 ...]` and `c_first c_last w` entries.
fn parse_cid_widths(doc: &Document, w: &[Object], widths: &mut CidWidths) {
    let mut i = 0;
    while i < w.len() {
        let Some(first) = maybe_deref(doc, &w[i]).and_then(as_num) else {
            break;
        };
        match w.get(i + 1).and_then(|o| maybe_deref(doc, o)) {
            Some(Object::Array(run)) => {
                for (j, width) in run.iter().enumerate() {
                    let cid = (first as CharCode).checked_add(j as CharCode);
                    let width = maybe_deref(doc, width).and_then(as_num);
                    if let (Some(cid), Some(width)) = (cid, width) {
                        widths.single.insert(cid, width);
                    }
                }
                i += 2;
            }
            Some(last) => {
                let (Some(last), Some(width)) = (
                    as_num(last),
                    w.get(i + 2).and_then(|o| maybe_deref(doc, o)).and_then(as_num),
                ) else {
                    break;
                };
                let (first, last) = (first as CharCode, last as CharCode);
                if first <= last {
                    widths.ranges.push((first, last, width));
                } else {
                    debug!("ignoring inverted /W range {}..{}", first, last);
                }
                i += 3;
            }
            None => break,
        }
    }
}

impl PdfFont for PdfCIDFont {
    fn get_width(&self, code: CharCode) -> f64 {
        self.widths.get(code).unwrap_or(self.default_width)
    }

    fn next_char(&self, iter: &mut Iter<u8>) -> Option<(CharCode, u8)> {
        let mut c = *iter.next()? as u32;
        let mut code = None;
        'outer: for width in 1..=4 {
            for range in &self.encoding.codespace {
                if c >= range.start && c <= range.end && range.width == width {
                    code = Some((c, width));
                    break 'outer;
                }
            }
            let next = *iter.next()?;
            c = (c << 8) | next as u32;
        }
        let (code, width) = code?;
        for range in &self.encoding.cid {
            if code >= range.src_code_lo && code <= range.src_code_hi {
                return Some((code - range.src_code_lo + range.dst_CID_lo, width as u8));
            }
        }
        Some((code, width as u8))
    }

    fn decode_char(&self, code: CharCode) -> String {
        match self.to_unicode.as_ref().and_then(|m| m.get(&code)) {
            Some(s) => s.clone(),
            None => {
                debug!("CID {} of {} has no unicode mapping", code, self.base_name);
                String::new()
            }
        }
    }

    fn get_font_name(&self) -> &str {
        &self.base_name
    }
}

impl Debug for PdfCIDFont {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("PdfCIDFont")
            .field("base_name", &self.base_name)
            .finish()
    }
}

/// Parse a `/ToUnicode` CMap into code → text, normalizing compatibility
/// forms such as ligatures.
fn get_unicode_map(doc: &Document, font: &Dictionary) -> Option<HashMap<CharCode, String>> {
    match maybe_get_obj(doc, font, b"ToUnicode")? {
        Object::Stream(stream) => {
            let contents = get_contents(stream);
            let cmap = match adobe_cmap_parser::get_unicode_map(&contents) {
                Ok(cmap) => cmap,
                Err(_) => {
                    warn!("ToUnicode CMap could not be parsed, ignoring it");
                    return None;
                }
            };

            let unicode = cmap
                .into_iter()
                .filter_map(|(code, bytes)| {
                    let s = utf16be_to_string(&bytes)?;
                    if s.is_empty() || s.contains('\0') {
                        return None;
                    }
                    Some((code, s.nfkc().collect::<String>()))
                })
                .collect();
            Some(unicode)
        }
        Object::Name(name) => {
            debug!("ToUnicode name {:?} ignored", pdf_to_utf8(name));
            None
        }
        other => {
            debug!("unsupported ToUnicode {:?}", other);
            None
        }
    }
}
