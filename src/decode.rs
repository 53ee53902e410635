//! Page decoding: source PDF bytes to per-page geometry and positioned text.

use lopdf::{Document, ObjectId};
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::processor::{GraphicsState, Processor};
use crate::types::{DecodedPage, MediaBox, Transform};
use crate::utils::{get_inherited, get_media_box};

/// Page size assumed when no MediaBox is found in the page tree.
const US_LETTER: MediaBox = MediaBox {
    llx: 0.,
    lly: 0.,
    urx: 612.,
    ury: 792.,
};

/// Map MediaBox-relative coordinates into the upright page for a `/Rotate`
/// of 90, 180 or 270 degrees clockwise.
fn rotation(rotate: i64, width: f64, height: f64) -> Transform {
    match rotate {
        90 => Transform::new(0., -1., 1., 0., 0., width),
        180 => Transform::new(-1., 0., 0., -1., width, height),
        270 => Transform::new(0., 1., -1., 0., height, 0.),
        _ => Transform::identity(),
    }
}

/// A parsed source document whose pages can be decoded one at a time.
#[derive(Debug)]
pub struct SourceDocument {
    doc: Document,
}

impl SourceDocument {
    /// Parse `bytes`, decrypting with `password` (or the empty password)
    /// when the document is encrypted.
    pub fn load(bytes: &[u8], password: Option<&str>) -> Result<SourceDocument, DecodeError> {
        let mut doc = Document::load_mem(bytes)?;
        if doc.is_encrypted() {
            debug!("document is encrypted, decrypting");
            doc.decrypt(password.unwrap_or(""))?;
        }
        Ok(SourceDocument { doc })
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page numbers (1-based) paired with their object ids, in document order.
    pub(crate) fn page_ids(&self) -> Vec<(u32, ObjectId)> {
        self.doc.get_pages().into_iter().collect()
    }

    /// Decode every page in order. Stops at the first failing page.
    pub fn pages(&self) -> impl Iterator<Item = Result<DecodedPage, DecodeError>> + '_ {
        self.page_ids()
            .into_iter()
            .map(|(number, id)| self.decode_page(number, id))
    }

    pub(crate) fn decode_page(
        &self,
        number: u32,
        page_id: ObjectId,
    ) -> Result<DecodedPage, DecodeError> {
        let doc = &self.doc;
        let page_dict = doc.get_dictionary(page_id)?;
        let media_box = get_media_box(doc, page_dict).unwrap_or_else(|| {
            warn!("page {} has no MediaBox, assuming US Letter", number);
            US_LETTER
        });
        let rotate = get_inherited(doc, page_dict, b"Rotate")
            .and_then(|r| r.as_i64().ok())
            .map_or(0, |r| r.rem_euclid(360));
        if rotate % 90 != 0 {
            warn!("page {} has /Rotate {}, ignoring it", number, rotate);
        }

        let resources = get_inherited(doc, page_dict, b"Resources").and_then(|r| r.as_dict().ok());
        let content = doc
            .get_page_content(page_id)
            .map_err(|e| DecodeError::Content {
                page: number,
                reason: e.to_string(),
            })?;

        // Positions are reported relative to the lower-left corner of the
        // page as displayed.
        let (width, height) = (media_box.width(), media_box.height());
        let ctm = Transform::translation(-media_box.llx, -media_box.lly)
            .then(&rotation(rotate, width, height));
        let (width, height) = match rotate {
            90 | 270 => (height, width),
            _ => (width, height),
        };
        let mut processor = Processor::new(doc, number);
        processor.process_stream(&content, resources, GraphicsState::new(ctm), 0)?;
        let items = processor.into_items();

        debug!(
            "page {}: {}x{} with {} text items",
            number,
            width,
            height,
            items.len()
        );

        Ok(DecodedPage {
            number,
            width,
            height,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::{Dictionary, Object, Stream, dictionary};

    fn one_page_pdf(media_box: Vec<Object>, content: &[u8]) -> Vec<u8> {
        let mut pages = dictionary! {};
        if !media_box.is_empty() {
            pages.set("MediaBox", media_box);
        }
        page_tree_pdf(pages, content)
    }

    /// A one-page document whose `/Pages` node carries `inherited`.
    fn page_tree_pdf(inherited: Dictionary, content: &[u8]) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "Resources" => dictionary! {
                    "Font" => dictionary! { "F1" => font_id },
                },
            }),
        );
        if let Some(Object::Dictionary(pages)) = doc.objects.get_mut(&pages_id) {
            pages.extend(&inherited);
        }
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).unwrap();
        buf
    }

    #[test]
    fn inherited_geometry_and_resources() {
        let bytes = one_page_pdf(
            vec![0.into(), 0.into(), 595.into(), 842.into()],
            b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET",
        );
        let source = SourceDocument::load(&bytes, None).unwrap();
        assert_eq!(source.page_count(), 1);

        let pages: Vec<_> = source.pages().collect::<Result<_, _>>().unwrap();
        assert_eq!(pages[0].number, 1);
        assert_eq!((pages[0].width, pages[0].height), (595., 842.));
        assert_eq!(pages[0].items[0].text, "Hello");
        assert_eq!(pages[0].items[0].transform[4..], [72., 700.]);
    }

    #[test]
    fn positions_are_relative_to_the_media_box_origin() {
        let bytes = one_page_pdf(
            vec![100.into(), 50.into(), 700.into(), 850.into()],
            b"BT /F1 10 Tf 110 60 Td (corner) Tj ET",
        );
        let source = SourceDocument::load(&bytes, None).unwrap();
        let page = source.pages().next().unwrap().unwrap();
        assert_eq!((page.width, page.height), (600., 800.));
        assert_eq!(page.items[0].transform[4..], [10., 10.]);
    }

    #[test]
    fn blank_page_has_no_runs() {
        let bytes = one_page_pdf(
            vec![0.into(), 0.into(), 612.into(), 792.into()],
            b"BT /F1 12 Tf 72 700 Td (   ) Tj ET",
        );
        let source = SourceDocument::load(&bytes, None).unwrap();
        let page = source.pages().next().unwrap().unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.runs().count(), 0);
    }

    #[test]
    fn missing_media_box_defaults_to_letter() {
        let bytes = one_page_pdf(vec![], b"BT /F1 12 Tf 72 700 Td (Hi) Tj ET");
        let source = SourceDocument::load(&bytes, None).unwrap();
        let page = source.pages().next().unwrap().unwrap();
        assert_eq!((page.width, page.height), (612., 792.));
        assert_eq!(page.items[0].text, "Hi");
    }

    #[test]
    fn quarter_turn_swaps_the_page_size() {
        let inherited = dictionary! {
            "MediaBox" => vec![0.into(), 0.into(), 600.into(), 800.into()],
            "Rotate" => 90,
        };
        let bytes = page_tree_pdf(inherited, b"BT /F1 10 Tf 100 700 Td (side) Tj ET");
        let source = SourceDocument::load(&bytes, None).unwrap();
        let page = source.pages().next().unwrap().unwrap();
        assert_eq!((page.width, page.height), (800., 600.));
        // (x, y) on the unrotated page lands at (y, width - x).
        assert_eq!(page.items[0].transform[4..], [700., 500.]);
        let run = page.runs().next().unwrap();
        assert!((run.font_size - 10.).abs() < 1e-9);
    }

    #[test]
    fn negative_rotation_is_normalised() {
        let inherited = dictionary! {
            "MediaBox" => vec![0.into(), 0.into(), 600.into(), 800.into()],
            "Rotate" => -90,
        };
        let bytes = page_tree_pdf(inherited, b"BT /F1 10 Tf 100 700 Td (side) Tj ET");
        let source = SourceDocument::load(&bytes, None).unwrap();
        let page = source.pages().next().unwrap().unwrap();
        assert_eq!((page.width, page.height), (800., 600.));
        // 270 degrees: (x, y) lands at (height - y, x).
        assert_eq!(page.items[0].transform[4..], [100., 100.]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let err = SourceDocument::load(b"definitely not a pdf", None).unwrap_err();
        assert!(matches!(err, DecodeError::Pdf(_)));
    }
}
