//! Stamping an image overlay onto PDF pages.
//!
//! For every selected page a one-page PDF the size of that page is built
//! holding only the overlay image (with its alpha as a soft mask). Its
//! objects are imported into the target document and its content stream is
//! appended after the page's own content, which is wrapped in `q`/`Q` so
//! graphics state cannot leak into the overlay.

use std::collections::HashMap;

use image::RgbaImage;
use lopdf::content::{Content, Operation as PdfOp};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, trace};

use super::{media_box, operand, page_resources, remap_object_refs, resolve, PageBox};
use crate::error::{InksealError, Operation, PdfError, Result};
use crate::models::PlacementSpec;

const OP: Operation = Operation::ApplyOverlay;

/// A synthetic single-page document drawing the overlay.
pub struct OverlayPage {
    doc: Document,
    page_id: ObjectId,
    content_id: ObjectId,
    image_id: ObjectId,
    name: String,
}

/// Object ids of an overlay page after import into a target document.
#[derive(Debug, Clone)]
struct ImportedOverlay {
    content_id: ObjectId,
    image_id: ObjectId,
}

impl OverlayPage {
    /// Build the overlay page for a target page of size `page_box`.
    ///
    /// The image is drawn at `placement`, converted from top-left y-down
    /// coordinates to PDF user space, and referenced as XObject `name`.
    pub fn build(overlay: &RgbaImage, page_box: PageBox, placement: &PlacementSpec, name: &str) -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let (img_w, img_h) = overlay.dimensions();
        let mut rgb = Vec::with_capacity((img_w * img_h * 3) as usize);
        let mut alpha = Vec::with_capacity((img_w * img_h) as usize);
        for p in overlay.pixels() {
            rgb.extend_from_slice(&[p[0], p[1], p[2]]);
            alpha.push(p[3]);
        }

        let smask_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => img_w as i64,
                "Height" => img_h as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            alpha,
        ));
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => img_w as i64,
                "Height" => img_h as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "SMask" => smask_id,
            },
            rgb,
        ));

        let (x, y) = to_pdf_space(page_box, placement);
        let content = Content {
            operations: vec![
                PdfOp::new("q", vec![]),
                PdfOp::new(
                    "cm",
                    vec![
                        operand(placement.width),
                        operand(0.0),
                        operand(0.0),
                        operand(placement.height),
                        operand(x),
                        operand(y),
                    ],
                ),
                PdfOp::new("Do", vec![Object::Name(name.as_bytes().to_vec())]),
                PdfOp::new("Q", vec![]),
            ],
        };
        // Encoding only fails for operands lopdf cannot serialize; ours are numbers and names.
        let content_bytes = content.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content_bytes));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                operand(page_box.llx),
                operand(page_box.lly),
                operand(page_box.urx),
                operand(page_box.ury),
            ],
            "Resources" => dictionary! {
                "XObject" => dictionary! { name => image_id },
            },
            "Contents" => content_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Self {
            doc,
            page_id,
            content_id,
            image_id,
            name: name.to_string(),
        }
    }

    /// The synthetic document.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn page_id(&self) -> ObjectId {
        self.page_id
    }

    /// Copy every object into `target` under fresh ids.
    fn import_into(self, target: &mut Document) -> ImportedOverlay {
        let offset = target.max_id;
        for (id, object) in self.doc.objects {
            target
                .objects
                .insert((id.0 + offset, id.1), remap_object_refs(object, offset));
        }
        target.max_id = target.max_id.max(self.doc.max_id + offset);

        ImportedOverlay {
            content_id: (self.content_id.0 + offset, self.content_id.1),
            image_id: (self.image_id.0 + offset, self.image_id.1),
        }
    }
}

/// Lower-left corner of the placement in PDF user space.
fn to_pdf_space(page_box: PageBox, placement: &PlacementSpec) -> (f64, f64) {
    let x = page_box.llx + placement.x;
    let y = page_box.lly + page_box.height() - placement.y - placement.height;
    (x, y)
}

/// XObject name not yet used by `resources`.
fn free_xobject_name(doc: &Document, resources: &Dictionary) -> String {
    let existing = match resources.get(b"XObject").map(|x| resolve(doc, x)) {
        Ok(Object::Dictionary(dict)) => Some(dict),
        _ => None,
    };
    (0u32..)
        .map(|n| format!("InksealOverlay{}", n))
        .find(|name| existing.is_none_or(|d| !d.has(name.as_bytes())))
        .unwrap_or_else(|| "InksealOverlay".to_string())
}

/// Content stream references of a page, flattened.
fn content_refs(doc: &Document, page: &Dictionary) -> Vec<Object> {
    match page.get(b"Contents") {
        Ok(Object::Array(items)) => items.clone(),
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(*id)],
        },
        _ => Vec::new(),
    }
}

/// `q` / `Q` streams shared by every stamped page.
struct StateWrap {
    save: ObjectId,
    restore: ObjectId,
}

impl StateWrap {
    fn add_to(doc: &mut Document) -> Self {
        Self {
            save: doc.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec())),
            restore: doc.add_object(Stream::new(Dictionary::new(), b"Q\n".to_vec())),
        }
    }
}

fn merge_onto_page(
    doc: &mut Document,
    page_id: ObjectId,
    name: &str,
    imported: &ImportedOverlay,
    wrap: &StateWrap,
) -> Result<()> {
    let mut resources = page_resources(doc, page_id);
    let mut xobjects = match resources.get(b"XObject").map(|x| resolve(doc, x)) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    xobjects.set(name, imported.image_id);
    resources.set("XObject", xobjects);

    let page = doc
        .get_dictionary(page_id)
        .map_err(|e| InksealError::pdf(OP, PdfError::PageTree(e.to_string())))?;
    let existing = content_refs(doc, page);

    let mut contents = Vec::with_capacity(existing.len() + 3);
    if !existing.is_empty() {
        contents.push(Object::Reference(wrap.save));
        contents.extend(existing);
        contents.push(Object::Reference(wrap.restore));
    }
    contents.push(Object::Reference(imported.content_id));

    let page = doc
        .get_dictionary_mut(page_id)
        .map_err(|e| InksealError::pdf(OP, PdfError::PageTree(e.to_string())))?;
    page.set("Resources", resources);
    page.set("Contents", contents);
    Ok(())
}

/// Stamp `overlay` onto the selected pages of `doc`, returning how many
/// pages were stamped. Unselected pages are left exactly as they were.
pub fn stamp_pages(doc: &mut Document, overlay: &RgbaImage, placement: &PlacementSpec) -> Result<usize> {
    let pages = doc.get_pages();
    let page_count = pages.len() as u32;
    let selected: Vec<(u32, ObjectId)> = pages
        .into_iter()
        .filter(|(number, _)| placement.pages.includes(*number, page_count))
        .collect();
    if selected.is_empty() {
        debug!("No pages selected out of {}", page_count);
        return Ok(0);
    }

    let wrap = StateWrap::add_to(doc);
    // Pages of equal size that can use the same XObject name share one import.
    let mut imported: HashMap<([u64; 4], String), ImportedOverlay> = HashMap::new();

    for (number, page_id) in &selected {
        let page_box = media_box(doc, *page_id, *number).map_err(|e| InksealError::pdf(OP, e))?;
        let name = free_xobject_name(doc, &page_resources(doc, *page_id));
        let key = (
            [page_box.llx, page_box.lly, page_box.urx, page_box.ury].map(f64::to_bits),
            name.clone(),
        );

        let overlay_ids = match imported.get(&key) {
            Some(ids) => ids.clone(),
            None => {
                trace!(
                    "Building overlay page {}x{} for page {}",
                    page_box.width(),
                    page_box.height(),
                    number
                );
                let ids = OverlayPage::build(overlay, page_box, placement, &name).import_into(doc);
                imported.insert(key, ids.clone());
                ids
            }
        };

        merge_onto_page(doc, *page_id, &name, &overlay_ids, &wrap)?;
    }

    debug!("Stamped {} of {} pages", selected.len(), page_count);
    Ok(selected.len())
}

#[cfg(test)]
mod tests {
    use super::super::test_support::document_with_pages;
    use super::super::number;
    use super::*;
    use crate::models::PageSelection;
    use image::Rgba;
    use pretty_assertions::assert_eq;

    fn overlay() -> RgbaImage {
        RgbaImage::from_pixel(4, 2, Rgba([255, 0, 0, 128]))
    }

    fn last_content_ops(doc: &Document, page_id: ObjectId) -> Vec<PdfOp> {
        let page = doc.get_dictionary(page_id).unwrap();
        let refs = content_refs(doc, page);
        let last = refs.last().unwrap().as_reference().unwrap();
        let stream = doc.get_object(last).unwrap().as_stream().unwrap();
        let bytes = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        Content::decode(&bytes).unwrap().operations
    }

    fn cm_operands(ops: &[PdfOp]) -> Vec<f64> {
        let cm = ops.iter().find(|op| op.operator == "cm").unwrap();
        cm.operands.iter().map(|o| number(o).unwrap()).collect()
    }

    fn is_stamped(doc: &Document, page_id: ObjectId) -> bool {
        last_content_ops(doc, page_id).iter().any(|op| op.operator == "Do")
    }

    #[test]
    fn test_y_axis_flip() {
        let mut doc = document_with_pages(&[(200, 300)]);
        let placement = PlacementSpec::new(10.0, 20.0, 50.0, 30.0);
        assert_eq!(stamp_pages(&mut doc, &overlay(), &placement).unwrap(), 1);

        let page_id = doc.get_pages()[&1];
        let ops = last_content_ops(&doc, page_id);
        assert_eq!(cm_operands(&ops), vec![50.0, 0.0, 0.0, 30.0, 10.0, 250.0]);
        assert_eq!(ops.first().unwrap().operator, "q");
        assert_eq!(ops.last().unwrap().operator, "Q");
    }

    #[test]
    fn test_media_box_origin_is_added() {
        let mut doc = document_with_pages(&[(200, 300)]);
        let page_id = doc.get_pages()[&1];
        doc.get_dictionary_mut(page_id).unwrap().set(
            "MediaBox",
            vec![5.into(), 7.into(), 205.into(), 307.into()],
        );

        stamp_pages(&mut doc, &overlay(), &PlacementSpec::new(10.0, 20.0, 50.0, 30.0)).unwrap();
        let ops = last_content_ops(&doc, page_id);
        assert_eq!(cm_operands(&ops), vec![50.0, 0.0, 0.0, 30.0, 15.0, 257.0]);
    }

    #[test]
    fn test_out_of_range_pages_dropped() {
        let mut doc = document_with_pages(&[(200, 300), (200, 300)]);
        let placement = PlacementSpec::new(0.0, 0.0, 10.0, 10.0)
            .with_pages(PageSelection::Pages(vec![0, 1, 2, 999]));

        assert_eq!(stamp_pages(&mut doc, &overlay(), &placement).unwrap(), 2);
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);
        assert!(is_stamped(&doc, pages[&1]));
        assert!(is_stamped(&doc, pages[&2]));
    }

    #[test]
    fn test_unselected_pages_untouched() {
        let mut doc = document_with_pages(&[(200, 300), (200, 300), (200, 300)]);
        let before = doc.get_dictionary(doc.get_pages()[&2]).unwrap().clone();

        let placement = PlacementSpec::new(0.0, 0.0, 10.0, 10.0)
            .with_pages(PageSelection::Pages(vec![1, 3]));
        stamp_pages(&mut doc, &overlay(), &placement).unwrap();

        let pages = doc.get_pages();
        assert_eq!(pages.len(), 3);
        assert_eq!(doc.get_dictionary(pages[&2]).unwrap(), &before);
        assert!(is_stamped(&doc, pages[&1]));
        assert!(is_stamped(&doc, pages[&3]));
    }

    #[test]
    fn test_empty_selection_changes_nothing() {
        let mut doc = document_with_pages(&[(200, 300), (200, 300)]);
        let objects_before = doc.objects.len();
        let placement = PlacementSpec::new(0.0, 0.0, 10.0, 10.0).with_pages(PageSelection::Pages(vec![]));

        assert_eq!(stamp_pages(&mut doc, &overlay(), &placement).unwrap(), 0);
        assert_eq!(doc.objects.len(), objects_before);
    }

    #[test]
    fn test_original_content_wrapped_and_resources_kept() {
        let mut doc = document_with_pages(&[(200, 300)]);
        let page_id = doc.get_pages()[&1];
        stamp_pages(&mut doc, &overlay(), &PlacementSpec::new(0.0, 0.0, 10.0, 10.0)).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let contents = content_refs(&doc, page);
        assert_eq!(contents.len(), 4);

        let first = doc.get_object(contents[0].as_reference().unwrap()).unwrap().as_stream().unwrap();
        assert_eq!(first.content, b"q\n");
        let third = doc.get_object(contents[2].as_reference().unwrap()).unwrap().as_stream().unwrap();
        assert_eq!(third.content, b"Q\n");

        let resources = page.get(b"Resources").unwrap().as_dict().unwrap();
        assert!(resources.get(b"Font").is_ok(), "inherited fonts must survive");
        let xobjects = resources.get(b"XObject").unwrap().as_dict().unwrap();
        let image_id = xobjects.get(b"InksealOverlay0").unwrap().as_reference().unwrap();
        let image = doc.get_object(image_id).unwrap().as_stream().unwrap();
        assert!(image.dict.get(b"SMask").is_ok());
        assert_eq!(image.dict.get(b"Width").unwrap().as_i64().unwrap(), 4);
    }

    #[test]
    fn test_existing_xobject_name_not_reused() {
        let mut doc = document_with_pages(&[(200, 300)]);
        let page_id = doc.get_pages()[&1];
        let dummy = doc.add_object(Stream::new(Dictionary::new(), Vec::new()));
        doc.get_dictionary_mut(page_id).unwrap().set(
            "Resources",
            dictionary! { "XObject" => dictionary! { "InksealOverlay0" => dummy } },
        );

        stamp_pages(&mut doc, &overlay(), &PlacementSpec::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let xobjects = page
            .get(b"Resources")
            .unwrap()
            .as_dict()
            .unwrap()
            .get(b"XObject")
            .unwrap()
            .as_dict()
            .unwrap();
        assert_eq!(xobjects.get(b"InksealOverlay0").unwrap().as_reference().unwrap(), dummy);
        assert!(xobjects.has(b"InksealOverlay1"));
    }

    #[test]
    fn test_synthetic_page_is_standalone() {
        let page_box = PageBox { llx: 0.0, lly: 0.0, urx: 100.0, ury: 50.0 };
        let page = OverlayPage::build(&overlay(), page_box, &PlacementSpec::new(0.0, 0.0, 4.0, 2.0), "Ov");
        let doc = page.document();
        assert_eq!(doc.get_pages().len(), 1);
        let mb = media_box(doc, page.page_id(), 1).unwrap();
        assert_eq!((mb.width(), mb.height()), (100.0, 50.0));
    }
}
