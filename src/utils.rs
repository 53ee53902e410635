use encoding_rs::UTF_16BE;
use lopdf::{Dictionary, Document, Object, Stream};

use crate::types::MediaBox;

#[allow(non_upper_case_globals)]
pub(crate) const PDFDocEncoding: &[u16] = &[
    0x0000, 0x0001, 0x0002, 0x0003, 0x0004, 0x0005, 0x0006, 0x0007, 0x0008, 0x0009, 0x000a, 0x000b,
    0x000c, 0x000d, 0x000e, 0x000f, 0x0010, 0x0011, 0x0012, 0x0013, 0x0014, 0x0015, 0x0016, 0x0017,
    0x02d8, 0x02c7, 0x02c6, 0x02d9, 0x02dd, 0x02db, 0x02da, 0x02dc, 0x0020, 0x0021, 0x0022, 0x0023,
    0x0024, 0x0025, 0x0026, 0x0027, 0x0028, 0x0029, 0x002a, 0x002b, 0x002c, 0x002d, 0x002e, 0x002f,
    0x0030, 0x0031, 0x0032, 0x0033, 0x0034, 0x0035, 0x0036, 0x0037, 0x0038, 0x0039, 0x003a, 0x003b,
    0x003c, 0x003d, 0x003e, 0x003f, 0x0040, 0x0041, 0x0042, 0x0043, 0x0044, 0x0045, 0x0046, 0x0047,
    0x0048, 0x0049, 0x004a, 0x004b, 0x004c, 0x004d, 0x004e, 0x004f, 0x0050, 0x0051, 0x0052, 0x0053,
    0x0054, 0x0055, 0x0056, 0x0057, 0x0058, 0x0059, 0x005a, 0x005b, 0x005c, 0x005d, 0x005e, 0x005f,
    0x0060, 0x0061, 0x0062, 0x0063, 0x0064, 0x0065, 0x0066, 0x0067, 0x0068, 0x0069, 0x006a, 0x006b,
    0x006c, 0x006d, 0x006e, 0x006f, 0x0070, 0x0071, 0x0072, 0x0073, 0x0074, 0x0075, 0x0076, 0x0077,
    0x0078, 0x0079, 0x007a, 0x007b, 0x007c, 0x007d, 0x007e, 0x0000, 0x2022, 0x2020, 0x2021, 0x2026,
    0x2014, 0x2013, 0x0192, 0x2044, 0x2039, 0x203a, 0x2212, 0x2030, 0x201e, 0x201c, 0x201d, 0x2018,
    0x2019, 0x201a, 0x2122, 0xfb01, 0xfb02, 0x0141, 0x0152, 0x0160, 0x0178, 0x017d, 0x0131, 0x0142,
    0x0153, 0x0161, 0x017e, 0x0000, 0x20ac, 0x00a1, 0x00a2, 0x00a3, 0x00a4, 0x00a5, 0x00a6, 0x00a7,
    0x00a8, 0x00a9, 0x00aa, 0x00ab, 0x00ac, 0x0000, 0x00ae, 0x00af, 0x00b0, 0x00b1, 0x00b2, 0x00b3,
    0x00b4, 0x00b5, 0x00b6, 0x00b7, 0x00b8, 0x00b9, 0x00ba, 0x00bb, 0x00bc, 0x00bd, 0x00be, 0x00bf,
    0x00c0, 0x00c1, 0x00c2, 0x00c3, 0x00c4, 0x00c5, 0x00c6, 0x00c7, 0x00c8, 0x00c9, 0x00ca, 0x00cb,
    0x00cc, 0x00cd, 0x00ce, 0x00cf, 0x00d0, 0x00d1, 0x00d2, 0x00d3, 0x00d4, 0x00d5, 0x00d6, 0x00d7,
    0x00d8, 0x00d9, 0x00da, 0x00db, 0x00dc, 0x00dd, 0x00de, 0x00df, 0x00e0, 0x00e1, 0x00e2, 0x00e3,
    0x00e4, 0x00e5, 0x00e6, 0x00e7, 0x00e8, 0x00e9, 0x00ea, 0x00eb, 0x00ec, 0x00ed, 0x00ee, 0x00ef,
    0x00f0, 0x00f1, 0x00f2, 0x00f3, 0x00f4, 0x00f5, 0x00f6, 0x00f7, 0x00f8, 0x00f9, 0x00fa, 0x00fb,
    0x00fc, 0x00fd, 0x00fe, 0x00ff,
];

/// Decode a PDF text string: UTF-16BE with a BOM, PDFDocEncoding otherwise.
pub(crate) fn pdf_to_utf8(s: &[u8]) -> String {
    if s.len() > 2 && s[0] == 0xfe && s[1] == 0xff {
        let (text, _) = UTF_16BE.decode_without_bom_handling(&s[2..]);
        return text.into_owned();
    }

    s.iter()
        .filter_map(|&b| char::from_u32(PDFDocEncoding[b as usize] as u32))
        .filter(|&c| c != '\0')
        .collect()
}

/// Decode big-endian UTF-16 code units as found in ToUnicode CMaps.
pub(crate) fn utf16be_to_string(bytes: &[u8]) -> Option<String> {
    if bytes.len() % 2 != 0 {
        return None;
    }
    let (text, had_errors) = UTF_16BE.decode_without_bom_handling(bytes);
    if had_errors {
        return None;
    }
    Some(text.into_owned())
}

pub(crate) fn maybe_deref<'a>(doc: &'a Document, o: &'a Object) -> Option<&'a Object> {
    match *o {
        Object::Reference(r) => doc.get_object(r).ok(),
        _ => Some(o),
    }
}

pub(crate) fn maybe_get_obj<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    dict.get(key).ok().and_then(|o| maybe_deref(doc, o))
}

pub(crate) fn maybe_get_dict<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    maybe_get_obj(doc, dict, key).and_then(|o| o.as_dict().ok())
}

pub(crate) fn maybe_get_array<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Vec<Object>> {
    maybe_get_obj(doc, dict, key).and_then(|o| o.as_array().ok())
}

pub(crate) fn maybe_get_name<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a [u8]> {
    maybe_get_obj(doc, dict, key).and_then(|o| o.as_name().ok())
}

pub(crate) fn maybe_get_name_string(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<String> {
    maybe_get_name(doc, dict, key).map(pdf_to_utf8)
}

pub(crate) fn maybe_get_num(doc: &Document, dict: &Dictionary, key: &[u8]) -> Option<f64> {
    maybe_get_obj(doc, dict, key).and_then(as_num)
}

pub(crate) fn as_num(o: &Object) -> Option<f64> {
    match *o {
        Object::Integer(i) => Some(i as f64),
        Object::Real(f) => Some(f64::from(f)),
        _ => None,
    }
}

/// Read `N` numbers from an array, dereferencing each element.
pub(crate) fn as_nums<const N: usize>(doc: &Document, array: &[Object]) -> Option<[f64; N]> {
    if array.len() < N {
        return None;
    }
    let mut out = [0.0; N];
    for (slot, o) in out.iter_mut().zip(array) {
        *slot = maybe_deref(doc, o).and_then(as_num)?;
    }
    Some(out)
}

pub(crate) fn get_contents(contents: &Stream) -> Vec<u8> {
    if contents.filters().is_ok() {
        contents
            .decompressed_content()
            .unwrap_or_else(|_| contents.content.clone())
    } else {
        contents.content.clone()
    }
}

/// Look up a page attribute, walking up the `/Parent` chain.
pub(crate) fn get_inherited<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = dict;
    // Page trees are shallow; the cap only guards against parent cycles.
    for _ in 0..64 {
        if let Some(o) = maybe_get_obj(doc, current, key) {
            return Some(o);
        }
        current = current
            .get(b"Parent")
            .and_then(Object::as_reference)
            .and_then(|id| doc.get_dictionary(id))
            .ok()?;
    }
    None
}

pub(crate) fn get_media_box(doc: &Document, page: &Dictionary) -> Option<MediaBox> {
    let array = get_inherited(doc, page, b"MediaBox")?.as_array().ok()?;
    let [llx, lly, urx, ury] = as_nums::<4>(doc, array)?;
    Some(MediaBox {
        llx: llx.min(urx),
        lly: lly.min(ury),
        urx: llx.max(urx),
        ury: lly.max(ury),
    })
}

/// Map a glyph name to the text it stands for.
///
/// Handles `uniXXXX` sequences, `uXXXX`..`uXXXXXX`, ligature names joined
/// with `_`, suffixed variants such as `a.sc`, single-character names and a
/// table of common Latin punctuation and digit names.
pub(crate) fn glyph_name_to_unicode(name: &str) -> Option<String> {
    let base = name.split('.').next().unwrap_or(name);
    if base.is_empty() {
        return None;
    }

    if base.contains('_') {
        let parts: Option<String> = base.split('_').map(glyph_name_to_unicode).collect();
        return parts;
    }

    if let Some(hex) = base.strip_prefix("uni") {
        if !hex.is_empty() && hex.is_ascii() && hex.len() % 4 == 0 {
            let units: Option<Vec<u16>> = (0..hex.len())
                .step_by(4)
                .map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
                .collect();
            if let Some(units) = units {
                return String::from_utf16(&units).ok();
            }
        }
    }

    if let Some(hex) = base.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            if let Some(c) = u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
                return Some(c.to_string());
            }
        }
    }

    let mut chars = base.chars();
    if let (Some(c), None) = (chars.next(), chars.next()) {
        return Some(c.to_string());
    }

    GLYPH_NAMES
        .binary_search_by_key(&base, |&(n, _)| n)
        .ok()
        .map(|i| GLYPH_NAMES[i].1.to_owned())
}

// Sorted by name for binary search.
const GLYPH_NAMES: &[(&str, &str)] = &[
    ("Euro", "\u{20ac}"),
    ("ampersand", "&"),
    ("asciicircum", "^"),
    ("asciitilde", "~"),
    ("asterisk", "*"),
    ("at", "@"),
    ("backslash", "\\"),
    ("bar", "|"),
    ("braceleft", "{"),
    ("braceright", "}"),
    ("bracketleft", "["),
    ("bracketright", "]"),
    ("bullet", "\u{2022}"),
    ("colon", ":"),
    ("comma", ","),
    ("copyright", "\u{a9}"),
    ("dagger", "\u{2020}"),
    ("degree", "\u{b0}"),
    ("dollar", "$"),
    ("eight", "8"),
    ("ellipsis", "\u{2026}"),
    ("emdash", "\u{2014}"),
    ("endash", "\u{2013}"),
    ("equal", "="),
    ("exclam", "!"),
    ("ff", "ff"),
    ("ffi", "ffi"),
    ("ffl", "ffl"),
    ("fi", "fi"),
    ("five", "5"),
    ("fl", "fl"),
    ("four", "4"),
    ("grave", "`"),
    ("greater", ">"),
    ("hyphen", "-"),
    ("less", "<"),
    ("minus", "\u{2212}"),
    ("multiply", "\u{d7}"),
    ("nine", "9"),
    ("numbersign", "#"),
    ("one", "1"),
    ("parenleft", "("),
    ("parenright", ")"),
    ("percent", "%"),
    ("period", "."),
    ("plus", "+"),
    ("question", "?"),
    ("quotedbl", "\""),
    ("quotedblleft", "\u{201c}"),
    ("quotedblright", "\u{201d}"),
    ("quoteleft", "\u{2018}"),
    ("quoteright", "\u{2019}"),
    ("quotesingle", "'"),
    ("registered", "\u{ae}"),
    ("section", "\u{a7}"),
    ("semicolon", ";"),
    ("seven", "7"),
    ("six", "6"),
    ("slash", "/"),
    ("space", " "),
    ("three", "3"),
    ("trademark", "\u{2122}"),
    ("two", "2"),
    ("underscore", "_"),
    ("zero", "0"),
];
