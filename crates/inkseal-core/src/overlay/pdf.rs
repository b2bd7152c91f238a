//! PDF targets: the overlay is drawn on each selected page.

use std::path::{Path, PathBuf};

use tracing::debug;

use super::{DocumentTarget, OverlayAsset};
use crate::error::{Operation, Result};
use crate::models::{DocumentDescriptor, DocumentKind, PlacementSpec};
use crate::pdf::{describe, load_document, stamp_pages, write_document};
use crate::scratch::ScratchSpace;

pub struct PdfTarget;

impl DocumentTarget for PdfTarget {
    fn kind(&self) -> DocumentKind {
        DocumentKind::Pdf
    }

    fn inspect(&self, path: &Path) -> Result<DocumentDescriptor> {
        describe(path)
    }

    fn apply(
        &self,
        path: &Path,
        overlay: &OverlayAsset,
        placement: &PlacementSpec,
        scratch: &ScratchSpace,
    ) -> Result<PathBuf> {
        const OP: Operation = Operation::ApplyOverlay;
        let mut doc = load_document(path, OP)?;

        let stamped = stamp_pages(&mut doc, overlay.image(), placement)?;
        let pruned = doc.prune_objects();
        doc.compress();
        debug!(
            "Stamped {} page(s) of {}, pruned {} helper objects",
            stamped,
            path.display(),
            pruned.len()
        );

        scratch.persist_with("output_", "pdf", OP, |file| write_document(&mut doc, file, OP))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PageSelection;
    use crate::error::InksealError;
    use crate::pdf::media_box;
    use crate::overlay::OverlayCompositor;
    use crate::pdf::test_support::{document_with_pages, save};
    use image::{Rgba, RgbaImage};
    use lopdf::{Document, Object};
    use pretty_assertions::assert_eq;

    fn overlay() -> OverlayAsset {
        OverlayAsset::from_rgba(RgbaImage::from_pixel(8, 4, Rgba([0, 0, 255, 200])))
    }

    fn xobject_names(doc: &Document, page: u32) -> Vec<Vec<u8>> {
        let page_id = doc.get_pages()[&page];
        let page = doc.get_dictionary(page_id).unwrap();
        let resources = match page.get(b"Resources") {
            Ok(Object::Reference(id)) => doc.get_dictionary(*id).unwrap(),
            Ok(Object::Dictionary(dict)) => dict,
            _ => return Vec::new(),
        };
        match resources.get(b"XObject") {
            Ok(Object::Dictionary(dict)) => dict.iter().map(|(k, _)| k.clone()).collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn test_apply_keeps_pages_and_input() {
        let dir = tempfile::tempdir().unwrap();
        let input = save(&mut document_with_pages(&[(200, 300), (400, 500)]), dir.path(), "in.pdf");
        let before = std::fs::read(&input).unwrap();
        let scratch = ScratchSpace::in_dir(dir.path().join("out"));

        let output = PdfTarget
            .apply(&input, &overlay(), &PlacementSpec::new(10.0, 20.0, 50.0, 30.0), &scratch)
            .unwrap();

        assert_eq!(std::fs::read(&input).unwrap(), before);
        assert!(output.file_name().unwrap().to_string_lossy().starts_with("output_"));
        assert_eq!(output.extension().unwrap(), "pdf");

        let result = Document::load(&output).unwrap();
        assert_eq!(result.get_pages().len(), 2);
        assert_eq!(xobject_names(&result, 1), vec![b"InksealOverlay0".to_vec()]);
        assert_eq!(xobject_names(&result, 2), vec![b"InksealOverlay0".to_vec()]);

        let second = media_box(&result, result.get_pages()[&2], 2).unwrap();
        assert_eq!((second.width(), second.height()), (400.0, 500.0));
    }

    #[test]
    fn test_apply_only_selected_pages() {
        let dir = tempfile::tempdir().unwrap();
        let input = save(
            &mut document_with_pages(&[(200, 300), (200, 300), (200, 300)]),
            dir.path(),
            "in.pdf",
        );
        let placement = PlacementSpec::new(0.0, 0.0, 20.0, 20.0).with_pages(PageSelection::Pages(vec![2]));

        let output = OverlayCompositor::new(ScratchSpace::in_dir(dir.path()))
            .apply_asset(&input, &overlay(), &placement)
            .unwrap();
        let result = Document::load(&output).unwrap();

        assert_eq!(result.get_pages().len(), 3);
        assert!(xobject_names(&result, 1).is_empty());
        assert_eq!(xobject_names(&result, 2).len(), 1);
        assert!(xobject_names(&result, 3).is_empty());
    }

    #[test]
    fn test_inspect_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let input = save(&mut document_with_pages(&[(612, 792), (100, 100)]), dir.path(), "in.pdf");
        let info = PdfTarget.inspect(&input).unwrap();

        assert_eq!(info.kind, DocumentKind::Pdf);
        assert_eq!(info.page_count, 2);
        assert_eq!((info.width, info.height), (612.0, 792.0));
        assert_eq!(info.byte_size, std::fs::metadata(&input).unwrap().len());
    }

    #[test]
    fn test_corrupt_pdf_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("broken.pdf");
        std::fs::write(&input, b"definitely not a pdf").unwrap();

        let err = PdfTarget
            .apply(&input, &overlay(), &PlacementSpec::new(0.0, 0.0, 1.0, 1.0), &ScratchSpace::in_dir(dir.path()))
            .unwrap_err();
        assert!(matches!(err, InksealError::Decode { .. }));
    }
}
