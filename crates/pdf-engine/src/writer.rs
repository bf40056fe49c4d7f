//! Output document assembly.
//!
//! Builds a fresh PDF whose pages each hold one full-bleed raster image.

use crate::PdfEngineError;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// An image XObject already stored in the output document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    id: ObjectId,
    name: String,
    width: u32,
    height: u32,
}

impl EmbeddedImage {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

pub struct PdfWriter {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    image_count: usize,
}

impl PdfWriter {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        Self { doc, pages_id, page_ids: Vec::new(), image_count: 0 }
    }

    /// Stores `image` as a Flate-compressed DeviceRGB XObject (lossless).
    pub fn embed_image(&mut self, image: &RgbImage) -> Result<EmbeddedImage, PdfEngineError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PdfEngineError::Backend(format!(
                "cannot embed empty image ({width}x{height})"
            )));
        }

        let mut stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            image.as_raw().clone(),
        );
        stream.compress()?;

        self.image_count += 1;
        let name = format!("Im{}", self.image_count);
        let id = self.doc.add_object(stream);

        Ok(EmbeddedImage { id, name, width, height })
    }

    /// Adds a page of `width` x `height` points and draws `image` over all of it.
    pub fn add_full_bleed_page(
        &mut self,
        width: f32,
        height: f32,
        image: &EmbeddedImage,
    ) -> Result<(), PdfEngineError> {
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0.into(),
                        0.into(),
                        height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(image.name.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    image.name.as_str() => image.id,
                },
            },
        });
        self.page_ids.push(page_id);

        Ok(())
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Finalizes the page tree and serializes the document.
    pub fn finish(mut self) -> Result<Vec<u8>, PdfEngineError> {
        let kids: Vec<Object> = self.page_ids.iter().map(|id| Object::Reference(*id)).collect();
        let count = kids.len() as i64;
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        Ok(bytes)
    }
}

impl Default for PdfWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn writes_one_page_per_image() {
        let mut writer = PdfWriter::new();
        let image = RgbImage::from_pixel(30, 20, Rgb([10, 20, 30]));

        for _ in 0..2 {
            let embedded = writer.embed_image(&image).expect("embed should succeed");
            writer.add_full_bleed_page(30.0, 20.0, &embedded).expect("page should be added");
        }
        assert_eq!(writer.page_count(), 2);

        let bytes = writer.finish().expect("serialize should succeed");
        let doc = Document::load_mem(&bytes).expect("output should parse");
        assert_eq!(doc.get_pages().len(), 2);
    }

    #[test]
    fn page_media_box_matches_image() {
        let mut writer = PdfWriter::new();
        let embedded = writer
            .embed_image(&RgbImage::from_pixel(918, 1188, Rgb([255, 255, 255])))
            .expect("embed should succeed");
        writer.add_full_bleed_page(918.0, 1188.0, &embedded).expect("page should be added");

        let bytes = writer.finish().expect("serialize should succeed");
        let doc = Document::load_mem(&bytes).expect("output should parse");
        let (_, page_id) = doc.get_pages().into_iter().next().expect("one page");
        let media_box = doc
            .get_dictionary(page_id)
            .and_then(|dict| dict.get(b"MediaBox"))
            .and_then(Object::as_array)
            .expect("media box");
        let values: Vec<f32> =
            media_box.iter().map(|v| v.as_float().expect("numeric")).collect();

        assert_eq!(values, vec![0.0, 0.0, 918.0, 1188.0]);
    }

    #[test]
    fn empty_image_is_rejected() {
        let mut writer = PdfWriter::new();
        let err = writer.embed_image(&RgbImage::new(0, 0)).expect_err("empty image");
        assert!(matches!(err, PdfEngineError::Backend(_)));
    }
}
