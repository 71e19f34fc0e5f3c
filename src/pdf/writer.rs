//! Reassembling a PDF from page rasters.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as LopdfDocument, Object, Stream};

use crate::error::{Error, Result};

/// One output page: the raster and the page size it is drawn at.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub image: RgbImage,
    /// Page width in points
    pub width: f32,
    /// Page height in points
    pub height: f32,
}

/// Build an image-only PDF, one full-page image per page.
pub fn images_to_pdf(pages: &[RasterPage]) -> Result<Vec<u8>> {
    if pages.is_empty() {
        return Err(Error::Redaction("no pages to write".to_string()));
    }

    let mut doc = LopdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for page in pages {
        let (px_width, px_height) = page.image.dimensions();
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(page.image.as_raw())?;
        let data = encoder.finish()?;

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => px_width as i64,
                "Height" => px_height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            data,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        page.width.into(),
                        0.into(),
                        0.into(),
                        page.height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content.encode().map_err(|e| Error::Pdf(e.to_string()))?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), page.width.into(), page.height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::backend::PdfDocument;
    use crate::pdf::raster::{EmbeddedImageRasterizer, PageRasterizer};
    use image::Rgb;

    #[test]
    fn test_images_to_pdf_roundtrip() {
        let mut image = RgbImage::from_pixel(20, 10, Rgb([255, 255, 255]));
        image.put_pixel(0, 0, Rgb([0, 0, 0]));
        let bytes = images_to_pdf(&[RasterPage {
            image,
            width: 144.0,
            height: 72.0,
        }])
        .unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let pdf = PdfDocument::load_bytes(&bytes).unwrap();
        assert_eq!(pdf.page_count(), 1);
        let page = *pdf.pages().get(&1).unwrap();
        assert_eq!(pdf.page_size(page), (144.0, 72.0));

        let raster = EmbeddedImageRasterizer.rasterize(&pdf, page, 10).unwrap();
        assert_eq!(raster.dimensions(), (20, 10));
        assert_eq!(raster.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(raster.get_pixel(10, 5), &Rgb([255, 255, 255]));
    }

    #[test]
    fn test_empty_input_rejected() {
        assert!(images_to_pdf(&[]).is_err());
    }
}
