//! Whole-document page operations: merge, split, inspect, preview.

use std::path::{Path, PathBuf};

use lopdf::{Document, Object, ObjectId};
use tracing::{debug, info, warn};

use super::{
    INHERITABLE, PagePreview, PdfExtractor, inherited, load_document, media_box, remap_object_refs,
    write_document,
};
use crate::error::{InksealError, Operation, PdfError, Result};
use crate::models::{DocumentDescriptor, DocumentKind};
use crate::scratch::ScratchSpace;

/// PDF page operations writing their results into a [`ScratchSpace`].
#[derive(Debug, Clone, Default)]
pub struct PageOps {
    scratch: ScratchSpace,
}

impl PageOps {
    pub fn new(scratch: ScratchSpace) -> Self {
        Self { scratch }
    }

    /// Concatenate the pages of `paths` in order into one new PDF.
    ///
    /// Inherited page attributes are copied onto each page first, so every
    /// page keeps its own media box and resources after re-parenting.
    pub fn merge_documents<P: AsRef<Path>>(&self, paths: &[P]) -> Result<PathBuf> {
        const OP: Operation = Operation::MergeDocuments;
        if paths.is_empty() {
            return Err(InksealError::invalid(OP, "no documents to merge"));
        }

        let mut docs = Vec::with_capacity(paths.len());
        for path in paths {
            let path = path.as_ref();
            ensure_pdf(path, OP)?;
            let mut doc = load_document(path, OP)?;
            materialize_inherited(&mut doc);
            docs.push(doc);
        }

        let mut docs = docs.into_iter();
        let Some(mut dest) = docs.next() else {
            return Err(InksealError::invalid(OP, "no documents to merge"));
        };
        let mut page_refs: Vec<ObjectId> = dest.get_pages().values().copied().collect();

        for source in docs {
            let offset = dest.max_id;
            let source_pages: Vec<ObjectId> = source.get_pages().values().copied().collect();
            for (id, object) in source.objects {
                dest.objects
                    .insert((id.0 + offset, id.1), remap_object_refs(object, offset));
            }
            page_refs.extend(source_pages.into_iter().map(|id| (id.0 + offset, id.1)));
            dest.max_id = dest.max_id.max(source.max_id + offset);
        }

        update_page_tree(&mut dest, &page_refs).map_err(|e| InksealError::pdf(OP, e))?;
        dest.prune_objects();
        dest.compress();
        info!("Merged {} documents into {} pages", paths.len(), page_refs.len());

        self.scratch
            .persist_with("merged_", "pdf", OP, |file| write_document(&mut dest, file, OP))
    }

    /// Write one PDF per inclusive 1-based `(start, end)` range.
    ///
    /// Ranges are clipped to the document: a start below 1 counts as 1 and
    /// an end past the last page stops at the last page. A range selecting
    /// nothing yields a document without pages.
    pub fn split_document(&self, path: &Path, ranges: &[(u32, u32)]) -> Result<Vec<PathBuf>> {
        const OP: Operation = Operation::SplitDocument;
        ensure_pdf(path, OP)?;
        let doc = load_document(path, OP)?;
        let page_count = doc.get_pages().len() as u32;

        let mut outputs = Vec::with_capacity(ranges.len());
        for (i, &(start, end)) in ranges.iter().enumerate() {
            let first = start.max(1);
            let last = end.min(page_count);
            if first > last {
                warn!("Range {}-{} selects no pages of {}", start, end, page_count);
            }

            let mut part = doc.clone();
            let mut to_delete: Vec<u32> = (1..=page_count).filter(|p| *p < first || *p > last).collect();
            to_delete.reverse();
            for page in to_delete {
                part.delete_pages(&[page]);
            }
            part.prune_objects();
            part.compress();
            debug!("Split part {}: pages {}..={}", i, first, last);

            let prefix = format!("split_{}_", i);
            outputs.push(
                self.scratch
                    .persist_with(&prefix, "pdf", OP, |file| write_document(&mut part, file, OP))?,
            );
        }
        Ok(outputs)
    }

    /// Describe a PDF: page count, first page size, file size.
    pub fn inspect(&self, path: &Path) -> Result<DocumentDescriptor> {
        describe(path)
    }

    /// PNG preview of each page's first embedded raster image.
    ///
    /// Pages are not rendered. Text and vector drawing are ignored, so a
    /// preview shows only that one image, and pages with no decodable
    /// image (vector-only pages included) are left out of the result.
    pub fn preview_pages(&self, path: &Path) -> Result<Vec<PagePreview>> {
        ensure_pdf(path, Operation::PreviewPages)?;
        PdfExtractor::load(path)?.previews()
    }
}

/// Descriptor of the PDF at `path`.
pub(crate) fn describe(path: &Path) -> Result<DocumentDescriptor> {
    const OP: Operation = Operation::Inspect;
    let doc = load_document(path, OP)?;
    let pages = doc.get_pages();
    let (&first_number, &first_id) = pages
        .iter()
        .next()
        .ok_or_else(|| InksealError::pdf(OP, PdfError::NoPages))?;
    let page_box = media_box(&doc, first_id, first_number).map_err(|e| InksealError::pdf(OP, e))?;
    let byte_size = std::fs::metadata(path)
        .map_err(|e| InksealError::io(OP, e))?
        .len();

    Ok(DocumentDescriptor {
        kind: DocumentKind::Pdf,
        page_count: pages.len() as u32,
        width: page_box.width(),
        height: page_box.height(),
        byte_size,
        format: None,
    })
}

fn ensure_pdf(path: &Path, operation: Operation) -> Result<()> {
    if !path.exists() {
        return Err(InksealError::NotFound {
            operation,
            path: path.to_path_buf(),
        });
    }
    match DocumentKind::from_path(path, operation)? {
        DocumentKind::Pdf => Ok(()),
        DocumentKind::Raster => Err(InksealError::UnsupportedFormat {
            operation,
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
        }),
    }
}

/// Copy attributes inherited from the page tree onto every page.
fn materialize_inherited(doc: &mut Document) {
    let mut updates = Vec::new();
    for page_id in doc.get_pages().into_values() {
        let Ok(page) = doc.get_dictionary(page_id) else {
            continue;
        };
        for key in INHERITABLE {
            if page.has(key) {
                continue;
            }
            if let Some(value) = inherited(doc, page_id, key) {
                updates.push((page_id, key, value.clone()));
            }
        }
    }
    for (page_id, key, value) in updates {
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            page.set(key, value);
        }
    }
}

/// Make the catalog's page tree root the direct parent of `page_refs`.
fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> std::result::Result<(), PdfError> {
    let catalog = doc
        .catalog()
        .map_err(|e| PdfError::PageTree(format!("no catalog: {}", e)))?;
    let pages_id = catalog
        .get(b"Pages")
        .and_then(Object::as_reference)
        .map_err(|e| PdfError::PageTree(format!("no Pages in catalog: {}", e)))?;

    let pages = doc
        .get_dictionary_mut(pages_id)
        .map_err(|e| PdfError::PageTree(format!("invalid pages dictionary: {}", e)))?;
    pages.set(
        "Kids",
        page_refs.iter().map(|&id| Object::Reference(id)).collect::<Vec<_>>(),
    );
    pages.set("Count", page_refs.len() as i64);

    for &page_id in page_refs {
        let page = doc
            .get_dictionary_mut(page_id)
            .map_err(|e| PdfError::PageTree(format!("page {:?}: {}", page_id, e)))?;
        page.set("Parent", pages_id);
    }
    Ok(())
}
