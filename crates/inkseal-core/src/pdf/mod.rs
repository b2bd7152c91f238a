//! PDF loading, page geometry and page operations using lopdf.

mod extractor;
mod overlay_page;
mod pages;

pub use extractor::{PagePreview, PdfExtractor};
pub use overlay_page::{stamp_pages, OverlayPage};
pub use pages::PageOps;
pub(crate) use pages::describe;

use std::path::Path;

use lopdf::{Dictionary, Document, Object, ObjectId};
use tracing::debug;

use crate::error::{InksealError, Operation, PdfError, Result};

/// Page attributes a page inherits from its ancestors in the page tree.
pub(crate) const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"Resources", b"CropBox", b"Rotate"];

/// A page rectangle in PDF user space (bottom-left origin, y-up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl PageBox {
    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    fn from_array(values: &[Object], doc: &Document) -> Option<Self> {
        if values.len() != 4 {
            return None;
        }
        let mut n = [0f64; 4];
        for (slot, value) in n.iter_mut().zip(values) {
            *slot = number(resolve(doc, value))?;
        }
        // normalize corner order
        Some(Self {
            llx: n[0].min(n[2]),
            lly: n[1].min(n[3]),
            urx: n[0].max(n[2]),
            ury: n[1].max(n[3]),
        })
    }
}

/// Numeric value of an integer or real object.
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Number as a PDF operand, written as an integer when it has no fraction.
pub(crate) fn operand(value: f64) -> Object {
    if value.fract() == 0.0 && value.abs() < 1e9 {
        Object::Integer(value as i64)
    } else {
        Object::Real(value as f32)
    }
}

/// Follow a reference, returning the object itself otherwise.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Shift every indirect reference inside `obj` by `offset`.
pub(crate) fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Look up `key` on a page or the nearest ancestor that defines it.
pub(crate) fn inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    // Bound the walk; malformed files can contain Parent cycles.
    for _ in 0..64 {
        let id = current?;
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(value);
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// The page's media box, resolved through the page tree.
pub fn media_box(
    doc: &Document,
    page_id: ObjectId,
    page_number: u32,
) -> std::result::Result<PageBox, PdfError> {
    let value =
        inherited(doc, page_id, b"MediaBox").ok_or(PdfError::MissingMediaBox(page_number))?;
    match resolve(doc, value) {
        Object::Array(values) => {
            PageBox::from_array(values, doc).ok_or(PdfError::MissingMediaBox(page_number))
        }
        _ => Err(PdfError::MissingMediaBox(page_number)),
    }
}

/// Page's resource dictionary as an owned inline copy (inherited if absent).
pub(crate) fn page_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    match inherited(doc, page_id, b"Resources").map(|r| resolve(doc, r)) {
        Some(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    }
}

/// Load a PDF, decrypting documents protected only by an empty password.
pub fn load_document(path: &Path, operation: Operation) -> Result<Document> {
    if !path.exists() {
        return Err(InksealError::NotFound {
            operation,
            path: path.to_path_buf(),
        });
    }
    let mut doc = Document::load(path)
        .map_err(|e| InksealError::decode(operation, PdfError::Parse(e.to_string())))?;

    if doc.is_encrypted() {
        if doc.decrypt("").is_err() {
            return Err(InksealError::pdf(operation, PdfError::Encrypted));
        }
        debug!("Decrypted {} with empty password", path.display());
    }

    if doc.get_pages().is_empty() {
        return Err(InksealError::pdf(operation, PdfError::NoPages));
    }
    Ok(doc)
}

/// Serialize `doc` into `file`.
pub(crate) fn write_document(
    doc: &mut Document,
    file: &mut std::fs::File,
    operation: Operation,
) -> Result<()> {
    doc.save_to(file)
        .map(|_| ())
        .map_err(|e| InksealError::pdf(operation, PdfError::Write(e.to_string())))
}
