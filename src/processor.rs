use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document, Object, Stream};
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::fonts::{PdfFont, make_font};
use crate::types::{RawTextItem, Transform};
use crate::utils::*;

/// Nesting limit for form XObjects, guarding against self-referencing forms.
const MAX_FORM_DEPTH: usize = 16;

/// A `TJ` adjustment wider than this fraction of an em becomes a space.
const TJ_SPACE_THRESHOLD: f64 = 0.25;

#[derive(Clone)]
pub(crate) struct TextState {
    pub(crate) font: Option<Rc<dyn PdfFont>>,
    pub(crate) font_size: f64,
    pub(crate) character_spacing: f64,
    pub(crate) word_spacing: f64,
    pub(crate) horizontal_scaling: f64,
    pub(crate) leading: f64,
    pub(crate) rise: f64,
    pub(crate) tm: Transform,
    pub(crate) tlm: Transform,
}

#[derive(Clone)]
pub(crate) struct GraphicsState {
    pub(crate) ctm: Transform,
    pub(crate) ts: TextState,
}

impl GraphicsState {
    pub(crate) fn new(ctm: Transform) -> GraphicsState {
        GraphicsState {
            ctm,
            ts: TextState {
                font: None,
                font_size: 0.,
                character_spacing: 0.,
                word_spacing: 0.,
                horizontal_scaling: 1.,
                leading: 0.,
                rise: 0.,
                tm: Transform::identity(),
                tlm: Transform::identity(),
            },
        }
    }

    /// Trm = [Tfs·Th 0 0 Tfs 0 Trise] × Tm × CTM
    fn text_rendering_matrix(&self) -> Transform {
        let ts = &self.ts;
        Transform::new(
            ts.font_size * ts.horizontal_scaling,
            0.,
            0.,
            ts.font_size,
            0.,
            ts.rise,
        )
        .then(&ts.tm)
        .then(&self.ctm)
    }

    fn translate_text(&mut self, tx: f64) {
        self.ts.tm = Transform::translation(tx, 0.).then(&self.ts.tm);
    }

    fn move_to_next_line(&mut self, tx: f64, ty: f64) {
        self.ts.tlm = Transform::translation(tx, ty).then(&self.ts.tlm);
        self.ts.tm = self.ts.tlm;
    }
}

/// Text of one show operation while it is being assembled.
#[derive(Default)]
struct PendingItem {
    text: String,
    transform: Option<[f64; 6]>,
}

impl PendingItem {
    fn into_item(self) -> Option<RawTextItem> {
        Some(RawTextItem {
            transform: self.transform?,
            text: self.text,
        })
    }
}

fn show_text(gs: &mut GraphicsState, s: &[u8], pending: &mut PendingItem) {
    if pending.transform.is_none() {
        let trm = gs.text_rendering_matrix();
        pending.transform = Some([trm.m11, trm.m12, trm.m21, trm.m22, trm.m31, trm.m32]);
    }

    let Some(font) = gs.ts.font.clone() else {
        warn!("text shown without a font selected");
        pending.text.push_str(&pdf_to_utf8(s));
        return;
    };

    for (code, length) in font.char_codes(s) {
        pending.text.push_str(&font.decode_char(code));

        let ts = &gs.ts;
        let w0 = font.get_width(code) / 1000.;
        let mut spacing = ts.character_spacing;
        // Word spacing applies to single-byte code 32 only.
        if code == 32 && length == 1 {
            spacing += ts.word_spacing;
        }
        let tx = (w0 * ts.font_size + spacing) * ts.horizontal_scaling;
        gs.translate_text(tx);
    }
}

fn adjust_text(gs: &mut GraphicsState, adjustment: f64, pending: &mut PendingItem) {
    let em = -adjustment / 1000.;
    let tx = em * gs.ts.font_size * gs.ts.horizontal_scaling;
    gs.translate_text(tx);

    if em > TJ_SPACE_THRESHOLD
        && !pending.text.is_empty()
        && !pending.text.ends_with(char::is_whitespace)
    {
        pending.text.push(' ');
    }
}

fn nums<const N: usize>(operands: &[Object]) -> Option<[f64; N]> {
    if operands.len() < N {
        return None;
    }
    let mut out = [0.; N];
    for (slot, o) in out.iter_mut().zip(operands) {
        *slot = as_num(o)?;
    }
    Some(out)
}

fn matrix(operands: &[Object]) -> Option<Transform> {
    let [a, b, c, d, e, f] = nums::<6>(operands)?;
    Some(Transform::new(a, b, c, d, e, f))
}

/// Walks content streams and records one [`RawTextItem`] per show operation.
pub(crate) struct Processor<'a> {
    doc: &'a Document,
    page_num: u32,
    items: Vec<RawTextItem>,
}

impl<'a> Processor<'a> {
    pub(crate) fn new(doc: &'a Document, page_num: u32) -> Processor<'a> {
        Processor {
            doc,
            page_num,
            items: Vec::new(),
        }
    }

    pub(crate) fn into_items(self) -> Vec<RawTextItem> {
        self.items
    }

    pub(crate) fn process_stream(
        &mut self,
        content: &[u8],
        resources: Option<&'a Dictionary>,
        gs: GraphicsState,
        depth: usize,
    ) -> Result<(), DecodeError> {
        let content = Content::decode(content).map_err(|e| DecodeError::Content {
            page: self.page_num,
            reason: e.to_string(),
        })?;

        let mut font_table: HashMap<Vec<u8>, Option<Rc<dyn PdfFont>>> = HashMap::new();
        let mut gs = gs;
        let mut gs_stack = Vec::new();

        for operation in &content.operations {
            let operands = &operation.operands[..];
            match operation.operator.as_str() {
                "BT" => {
                    gs.ts.tm = Transform::identity();
                    gs.ts.tlm = Transform::identity();
                }
                "ET" => {}
                "q" => gs_stack.push(gs.clone()),
                "Q" => match gs_stack.pop() {
                    Some(s) => gs = s,
                    None => warn!("No state to pop"),
                },
                "cm" => match matrix(operands) {
                    Some(m) => gs.ctm = m.then(&gs.ctm),
                    None => self.malformed(operation),
                },
                "Tf" => {
                    let (Some(name), Some([size])) = (
                        operands.first().and_then(|o| o.as_name().ok()),
                        operands.get(1..).and_then(nums::<1>),
                    ) else {
                        self.malformed(operation);
                        continue;
                    };
                    let doc = self.doc;
                    let font = font_table
                        .entry(name.to_vec())
                        .or_insert_with(|| {
                            let dict = resources
                                .and_then(|r| maybe_get_dict(doc, r, b"Font"))
                                .and_then(|fonts| maybe_get_dict(doc, fonts, name));
                            if dict.is_none() {
                                warn!("font {} is not in the page resources", pdf_to_utf8(name));
                            }
                            dict.map(|d| make_font(doc, d))
                        })
                        .clone();
                    debug!(
                        "font {} ({}) size: {}",
                        pdf_to_utf8(name),
                        font.as_ref().map_or("none", |f| f.get_font_name()),
                        size
                    );
                    gs.ts.font = font;
                    gs.ts.font_size = size;
                }
                "Tc" => match nums::<1>(operands) {
                    Some([v]) => gs.ts.character_spacing = v,
                    None => self.malformed(operation),
                },
                "Tw" => match nums::<1>(operands) {
                    Some([v]) => gs.ts.word_spacing = v,
                    None => self.malformed(operation),
                },
                "Tz" => match nums::<1>(operands) {
                    Some([v]) => gs.ts.horizontal_scaling = v / 100.,
                    None => self.malformed(operation),
                },
                "TL" => match nums::<1>(operands) {
                    Some([v]) => gs.ts.leading = v,
                    None => self.malformed(operation),
                },
                "Ts" => match nums::<1>(operands) {
                    Some([v]) => gs.ts.rise = v,
                    None => self.malformed(operation),
                },
                "Td" => match nums::<2>(operands) {
                    Some([tx, ty]) => gs.move_to_next_line(tx, ty),
                    None => self.malformed(operation),
                },
                "TD" => match nums::<2>(operands) {
                    Some([tx, ty]) => {
                        gs.ts.leading = -ty;
                        gs.move_to_next_line(tx, ty);
                    }
                    None => self.malformed(operation),
                },
                "Tm" => match matrix(operands) {
                    Some(m) => {
                        gs.ts.tlm = m;
                        gs.ts.tm = m;
                    }
                    None => self.malformed(operation),
                },
                "T*" => {
                    let leading = gs.ts.leading;
                    gs.move_to_next_line(0., -leading);
                }
                "Tj" => match operands.first() {
                    Some(Object::String(s, _)) => self.show(&mut gs, s),
                    _ => self.malformed(operation),
                },
                "'" => match operands.first() {
                    Some(Object::String(s, _)) => {
                        let leading = gs.ts.leading;
                        gs.move_to_next_line(0., -leading);
                        self.show(&mut gs, s);
                    }
                    _ => self.malformed(operation),
                },
                "\"" => match (nums::<2>(operands), operands.get(2)) {
                    (Some([aw, ac]), Some(Object::String(s, _))) => {
                        gs.ts.word_spacing = aw;
                        gs.ts.character_spacing = ac;
                        let leading = gs.ts.leading;
                        gs.move_to_next_line(0., -leading);
                        self.show(&mut gs, s);
                    }
                    _ => self.malformed(operation),
                },
                "TJ" => match operands.first() {
                    Some(Object::Array(array)) => {
                        let mut pending = PendingItem::default();
                        for e in array {
                            match e {
                                Object::String(s, _) => show_text(&mut gs, s, &mut pending),
                                other => match as_num(other) {
                                    Some(adjustment) => {
                                        adjust_text(&mut gs, adjustment, &mut pending)
                                    }
                                    None => debug!("kind of {:?}", other),
                                },
                            }
                        }
                        self.items.extend(pending.into_item());
                    }
                    _ => self.malformed(operation),
                },
                "Do" => {
                    let Some(name) = operands.first().and_then(|o| o.as_name().ok()) else {
                        self.malformed(operation);
                        continue;
                    };
                    self.do_xobject(name, resources, &gs, depth)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn show(&mut self, gs: &mut GraphicsState, s: &[u8]) {
        let mut pending = PendingItem::default();
        show_text(gs, s, &mut pending);
        self.items.extend(pending.into_item());
    }

    /// `Do` processes an entire form, so recurse with the form's content and
    /// resources under the form matrix.
    fn do_xobject(
        &mut self,
        name: &[u8],
        resources: Option<&'a Dictionary>,
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<(), DecodeError> {
        let doc = self.doc;
        let Some(xf) = resources
            .and_then(|r| maybe_get_dict(doc, r, b"XObject"))
            .and_then(|x| maybe_get_obj(doc, x, name))
            .and_then(|o| o.as_stream().ok())
        else {
            warn!("XObject {} is not in the page resources", pdf_to_utf8(name));
            return Ok(());
        };

        if maybe_get_name(doc, &xf.dict, b"Subtype") != Some(b"Form".as_slice()) {
            return Ok(());
        }
        if depth >= MAX_FORM_DEPTH {
            warn!(
                "form XObject {} nested deeper than {}, skipping",
                pdf_to_utf8(name),
                MAX_FORM_DEPTH
            );
            return Ok(());
        }

        self.process_form(xf, resources, gs, depth)
    }

    fn process_form(
        &mut self,
        xf: &'a Stream,
        resources: Option<&'a Dictionary>,
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<(), DecodeError> {
        let doc = self.doc;
        let form_matrix = maybe_get_array(doc, &xf.dict, b"Matrix")
            .and_then(|m| as_nums::<6>(doc, m))
            .map(|[a, b, c, d, e, f]| Transform::new(a, b, c, d, e, f))
            .unwrap_or_else(Transform::identity);
        let form_resources = maybe_get_dict(doc, &xf.dict, b"Resources").or(resources);

        let mut form_gs = gs.clone();
        form_gs.ctm = form_matrix.then(&gs.ctm);

        let contents = get_contents(xf);
        self.process_stream(&contents, form_resources, form_gs, depth + 1)
    }

    fn malformed(&self, operation: &Operation) {
        debug!(
            "page {}: skipping malformed operation {:?}",
            self.page_num, operation
        );
    }
}
