//! Raster previews of PDF pages from their embedded images.

use std::path::Path;

use image::{DynamicImage, GrayImage, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{load_document, page_resources, resolve};
use crate::codec;
use crate::error::{Operation, Result};

/// Form XObjects nest; deeper trees are not searched.
const MAX_FORM_DEPTH: usize = 4;

/// Preview of one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PagePreview {
    /// 1-based page number.
    pub page: u32,
    /// PNG data URL.
    pub data_url: String,
}

/// Pulls the first decodable image out of each page.
///
/// Only DCT (JPEG) streams and raw 8-bit RGB or gray samples are decoded;
/// pages whose images use other encodings are skipped.
pub struct PdfExtractor {
    document: Document,
}

impl PdfExtractor {
    pub fn new(document: Document) -> Self {
        Self { document }
    }

    /// Load the PDF at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        load_document(path, Operation::PreviewPages).map(Self::new)
    }

    pub fn page_count(&self) -> u32 {
        self.document.get_pages().len() as u32
    }

    /// First decodable image on `page` (1-based), if any.
    pub fn page_image(&self, page: u32) -> Option<DynamicImage> {
        let page_id = *self.document.get_pages().get(&page)?;
        let resources = page_resources(&self.document, page_id);
        self.first_image(&resources, 0)
    }

    /// PNG data URLs of each page's first decodable image. This is not a
    /// page render: pages drawn only with text or vector paths are skipped.
    pub fn previews(&self) -> Result<Vec<PagePreview>> {
        let mut previews = Vec::new();
        for page in 1..=self.page_count() {
            let Some(image) = self.page_image(page) else {
                trace!("Page {} has no decodable image", page);
                continue;
            };
            let data_url = codec::png_data_url(&image.to_rgba8(), Operation::PreviewPages)?;
            previews.push(PagePreview { page, data_url });
        }
        debug!("Extracted {} of {} page previews", previews.len(), self.page_count());
        Ok(previews)
    }

    fn first_image(&self, resources: &Dictionary, depth: usize) -> Option<DynamicImage> {
        let doc = &self.document;
        let xobjects = match resources.get(b"XObject").map(|x| resolve(doc, x)) {
            Ok(Object::Dictionary(dict)) => dict,
            _ => return None,
        };

        for (name, value) in xobjects.iter() {
            let Ok(id) = value.as_reference() else {
                continue;
            };
            let Ok(Object::Stream(stream)) = doc.get_object(id) else {
                continue;
            };
            match stream.dict.get(b"Subtype").and_then(Object::as_name) {
                Ok(b"Image") => {
                    if let Some(image) = self.decode_image(id, stream) {
                        trace!("Using image /{}", String::from_utf8_lossy(name));
                        return Some(image);
                    }
                }
                Ok(b"Form") if depth < MAX_FORM_DEPTH => {
                    let nested = match stream.dict.get(b"Resources").map(|r| resolve(doc, r)) {
                        Ok(Object::Dictionary(dict)) => dict,
                        _ => continue,
                    };
                    if let Some(image) = self.first_image(nested, depth + 1) {
                        return Some(image);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn decode_image(&self, id: ObjectId, stream: &Stream) -> Option<DynamicImage> {
        let dict = &stream.dict;
        let width = dict.get(b"Width").ok()?.as_i64().ok()? as u32;
        let height = dict.get(b"Height").ok()?.as_i64().ok()? as u32;

        let filters = stream.filters().unwrap_or_default();
        match filters.split_last() {
            Some((&b"DCTDecode", head)) => {
                let jpeg = Self::strip_filters(stream, head)?;
                return image::load_from_memory_with_format(&jpeg, image::ImageFormat::Jpeg).ok();
            }
            Some((&(b"JPXDecode" | b"CCITTFaxDecode" | b"JBIG2Decode"), _)) => {
                trace!("Image {:?} uses an unsupported filter", id);
                return None;
            }
            _ => {}
        }

        let bits = dict
            .get(b"BitsPerComponent")
            .ok()
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(8);
        if bits != 8 {
            return None;
        }

        let data = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let pixels = (width as usize) * (height as usize);

        match self.components(dict.get(b"ColorSpace").ok()?)? {
            3 if data.len() >= pixels * 3 => {
                RgbImage::from_raw(width, height, data[..pixels * 3].to_vec()).map(DynamicImage::ImageRgb8)
            }
            1 if data.len() >= pixels => {
                GrayImage::from_raw(width, height, data[..pixels].to_vec()).map(DynamicImage::ImageLuma8)
            }
            n => {
                trace!("Image {:?}: {} components, {} bytes for {}x{}", id, n, data.len(), width, height);
                None
            }
        }
    }

    /// Undo the generic filters that wrap an image codec's payload.
    fn strip_filters(stream: &Stream, head: &[&[u8]]) -> Option<Vec<u8>> {
        if head.is_empty() {
            return Some(stream.content.clone());
        }
        let mut outer = stream.clone();
        let names = head.iter().map(|f| Object::Name(f.to_vec())).collect();
        outer.dict.set("Filter", Object::Array(names));
        outer.dict.remove(b"DecodeParms");
        outer.decompressed_content().ok()
    }

    /// Number of color components of an RGB or gray color space.
    fn components(&self, color_space: &Object) -> Option<u8> {
        match resolve(&self.document, color_space) {
            Object::Name(name) => match name.as_slice() {
                b"DeviceRGB" | b"RGB" | b"CalRGB" => Some(3),
                b"DeviceGray" | b"G" | b"CalGray" => Some(1),
                _ => None,
            },
            Object::Array(items) => match items.first().and_then(|o| o.as_name().ok())? {
                b"ICCBased" => {
                    let profile = items.get(1)?.as_reference().ok()?;
                    let profile = self.document.get_object(profile).ok()?.as_stream().ok()?;
                    let n = profile.dict.get(b"N").ok()?.as_i64().ok()?;
                    matches!(n, 1 | 3).then_some(n as u8)
                }
                b"CalRGB" => Some(3),
                b"CalGray" => Some(1),
                _ => None,
            },
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::document_with_pages;
    use super::*;
    use lopdf::dictionary;
    use pretty_assertions::assert_eq;

    fn add_image(doc: &mut Document, page: u32, color_space: &str, data: Vec<u8>, w: i64, h: i64) {
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w,
                "Height" => h,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
            },
            data,
        ));
        let page_id = doc.get_pages()[&page];
        doc.get_dictionary_mut(page_id).unwrap().set(
            "Resources",
            dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        );
    }

    #[test]
    fn test_raw_rgb_page_image() {
        let mut doc = document_with_pages(&[(100, 100)]);
        add_image(&mut doc, 1, "DeviceRGB", vec![255, 0, 0, 0, 255, 0], 2, 1);

        let image = PdfExtractor::new(doc).page_image(1).unwrap().to_rgb8();
        assert_eq!(image.dimensions(), (2, 1));
        assert_eq!(image.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(image.get_pixel(1, 0).0, [0, 255, 0]);
    }

    #[test]
    fn test_pages_without_images_skipped() {
        let mut doc = document_with_pages(&[(100, 100), (100, 100), (100, 100)]);
        add_image(&mut doc, 2, "DeviceGray", vec![0, 128, 255, 64], 2, 2);

        let previews = PdfExtractor::new(doc).previews().unwrap();
        assert_eq!(previews.len(), 1);
        assert_eq!(previews[0].page, 2);
        assert!(previews[0].data_url.starts_with("data:image/png;base64,"));

        let decoded = codec::decode_image(&previews[0].data_url, Operation::PreviewPages).unwrap();
        assert_eq!(decoded.to_luma8().get_pixel(1, 0).0, [128]);
    }

    fn red_jpeg() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(64, 64, image::Rgb([220, 10, 10])));
        let mut bytes = std::io::Cursor::new(Vec::new());
        img.write_to(&mut bytes, image::ImageFormat::Jpeg).unwrap();
        bytes.into_inner()
    }

    fn add_jpeg(doc: &mut Document, stream: Stream) {
        let image_id = doc.add_object(stream);
        let page_id = doc.get_pages()[&1];
        doc.get_dictionary_mut(page_id).unwrap().set(
            "Resources",
            dictionary! { "XObject" => dictionary! { "Im0" => image_id } },
        );
    }

    fn jpeg_dict() -> Dictionary {
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => 64,
            "Height" => 64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        }
    }

    fn assert_reddish(image: DynamicImage) {
        let image = image.to_rgb8();
        assert_eq!(image.dimensions(), (64, 64));
        let [r, g, b] = image.get_pixel(32, 32).0;
        assert!(r > 180 && g < 60 && b < 60, "got {:?}", (r, g, b));
    }

    #[test]
    fn test_dct_page_image() {
        let mut dict = jpeg_dict();
        dict.set("Filter", "DCTDecode");
        let mut doc = document_with_pages(&[(100, 100)]);
        add_jpeg(&mut doc, Stream::new(dict, red_jpeg()));

        assert_reddish(PdfExtractor::new(doc).page_image(1).unwrap());
    }

    #[test]
    fn test_flate_wrapped_dct_page_image() {
        let mut stream = Stream::new(jpeg_dict(), red_jpeg());
        stream.compress().unwrap();
        assert_eq!(stream.filters().unwrap(), vec![b"FlateDecode".as_slice()]);
        stream.dict.set(
            "Filter",
            vec![Object::Name(b"FlateDecode".to_vec()), Object::Name(b"DCTDecode".to_vec())],
        );

        let mut doc = document_with_pages(&[(100, 100)]);
        add_jpeg(&mut doc, stream);
        assert_reddish(PdfExtractor::new(doc).page_image(1).unwrap());
    }

    #[test]
    fn test_truncated_samples_rejected() {
        let mut doc = document_with_pages(&[(100, 100)]);
        add_image(&mut doc, 1, "DeviceRGB", vec![1, 2, 3], 2, 2);
        assert!(PdfExtractor::new(doc).page_image(1).is_none());
    }

    #[test]
    fn test_out_of_range_page() {
        let doc = document_with_pages(&[(100, 100)]);
        assert!(PdfExtractor::new(doc).page_image(5).is_none());
    }
}
