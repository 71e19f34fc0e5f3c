//! Page rasterization.
//!
//! Scanned PDFs are image-only: each page paints one or more image
//! XObjects and nothing else worth keeping. [`EmbeddedImageRasterizer`]
//! reproduces such a page by compositing its images onto a white canvas
//! at the requested resolution.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use lopdf::{Object, Stream};

use super::backend::{number, PageId, PdfDocument};
use super::content::PageContent;
use crate::error::{Error, Result};

/// Points per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

/// Resolution pages are rasterized at for OCR.
pub const DEFAULT_DPI: u32 = 250;

/// Largest canvas side, in pixels.
const MAX_CANVAS_SIDE: u32 = 20_000;

/// Turns one PDF page into a raster.
pub trait PageRasterizer: Send + Sync {
    /// Render `page` at `dpi` dots per inch.
    fn rasterize(&self, pdf: &PdfDocument, page: PageId, dpi: u32) -> Result<RgbImage>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "rasterizer"
    }
}

/// Renders a page from the image XObjects it paints.
///
/// Text and vector graphics are not drawn; the output is only faithful
/// for image-only pages.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedImageRasterizer;

impl PageRasterizer for EmbeddedImageRasterizer {
    fn rasterize(&self, pdf: &PdfDocument, page: PageId, dpi: u32) -> Result<RgbImage> {
        let (width_pt, height_pt) = pdf.page_size(page);
        let scale = dpi.max(1) as f32 / POINTS_PER_INCH;
        let width = ((width_pt * scale).round() as u32).clamp(1, MAX_CANVAS_SIDE);
        let height = ((height_pt * scale).round() as u32).clamp(1, MAX_CANVAS_SIDE);
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));

        let content = PageContent::parse(pdf, page)?;
        let xobjects = pdf.resource_entries(page, b"XObject");

        for placement in &content.images {
            let Some(Object::Stream(stream)) = xobjects.get(&placement.name).copied() else {
                log::debug!(
                    "page {:?}: XObject {} not found",
                    page,
                    String::from_utf8_lossy(&placement.name)
                );
                continue;
            };
            if !is_image(stream) {
                continue;
            }
            let image = decode_image(pdf, stream)?;

            let rect = placement.rect();
            let x = (rect.x0 * scale).round() as i64;
            let y = ((height_pt - rect.y1) * scale).round() as i64;
            let w = ((rect.width() * scale).round() as u32).clamp(1, MAX_CANVAS_SIDE);
            let h = ((rect.height() * scale).round() as u32).clamp(1, MAX_CANVAS_SIDE);

            let scaled = if image.dimensions() == (w, h) {
                image
            } else {
                imageops::resize(&image, w, h, FilterType::Triangle)
            };
            imageops::overlay(&mut canvas, &scaled, x, y);
        }

        Ok(canvas)
    }

    fn name(&self) -> &str {
        "embedded-image"
    }
}

fn is_image(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n.as_slice() == b"Image")
}

/// Filter names applied to a stream, outermost first.
fn filters(pdf: &PdfDocument, stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter").map(|o| pdf.resolve(o)) {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|o| pdf.resolve(o).as_name().ok().map(|n| n.to_vec()))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode an image XObject to RGB.
pub fn decode_image(pdf: &PdfDocument, stream: &Stream) -> Result<RgbImage> {
    let filters = filters(pdf, stream);
    let last = filters.last().map(|f| f.as_slice());

    if last == Some(b"DCTDecode".as_slice()) {
        let data = if filters.len() == 1 {
            stream.content.clone()
        } else {
            // Outer filters wrap the JPEG bytes.
            let mut outer = stream.clone();
            let names: Vec<Object> = filters[..filters.len() - 1]
                .iter()
                .map(|f| Object::Name(f.clone()))
                .collect();
            outer.dict.set("Filter", Object::Array(names));
            outer.dict.remove(b"DecodeParms");
            outer
                .decompressed_content()
                .map_err(|e| Error::Image(format!("image stream: {}", e)))?
        };
        return Ok(image::load_from_memory(&data)?.to_rgb8());
    }

    let data = match last {
        None => stream.content.clone(),
        Some(b"FlateDecode") => stream
            .decompressed_content()
            .map_err(|e| Error::Image(format!("image stream: {}", e)))?,
        Some(other) => {
            return Err(Error::Image(format!(
                "unsupported image filter {}",
                String::from_utf8_lossy(other)
            )))
        }
    };

    let dim = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .ok()
            .and_then(|o| number(pdf.resolve(o)))
            .map(|v| v as u32)
            .filter(|v| *v > 0)
    };
    let (Some(width), Some(height)) = (dim(b"Width"), dim(b"Height")) else {
        return Err(Error::Image("image without dimensions".to_string()));
    };
    let bits = dim(b"BitsPerComponent").unwrap_or(8);
    let components = color_components(pdf, stream)?;

    raw_to_rgb(&data, width, height, bits, components)
}

fn color_components(pdf: &PdfDocument, stream: &Stream) -> Result<u32> {
    if matches!(stream.dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return Ok(1);
    }
    let space = match stream.dict.get(b"ColorSpace").map(|o| pdf.resolve(o)) {
        Ok(space) => space,
        Err(_) => return Ok(1),
    };
    match space {
        Object::Name(name) => match name.as_slice() {
            b"DeviceGray" | b"CalGray" => Ok(1),
            b"DeviceRGB" | b"CalRGB" => Ok(3),
            b"DeviceCMYK" => Ok(4),
            other => Err(Error::Image(format!(
                "unsupported color space {}",
                String::from_utf8_lossy(other)
            ))),
        },
        Object::Array(items) => {
            let family = items.first().and_then(|o| o.as_name().ok()).unwrap_or(b"");
            match family {
                b"ICCBased" => items
                    .get(1)
                    .and_then(|o| pdf.resolve(o).as_stream().ok())
                    .and_then(|s| s.dict.get(b"N").ok())
                    .and_then(number)
                    .map(|n| n as u32)
                    .ok_or_else(|| Error::Image("ICC profile without N".to_string())),
                b"CalGray" => Ok(1),
                b"CalRGB" => Ok(3),
                _ => Err(Error::Image(format!(
                    "unsupported color space {}",
                    String::from_utf8_lossy(family)
                ))),
            }
        }
        _ => Err(Error::Image("malformed color space".to_string())),
    }
}

/// Expand raw samples (1 or 8 bits per component) to RGB.
fn raw_to_rgb(data: &[u8], width: u32, height: u32, bits: u32, components: u32) -> Result<RgbImage> {
    if width > MAX_CANVAS_SIDE || height > MAX_CANVAS_SIDE {
        return Err(Error::Image(format!(
            "image of {}x{} exceeds the {} pixel limit",
            width, height, MAX_CANVAS_SIDE
        )));
    }
    let (w, h, comps) = (width as usize, height as usize, components as usize);
    match (bits, components) {
        (8, 1 | 3 | 4) => {
            let row = w
                .checked_mul(comps)
                .ok_or_else(|| Error::Image("image row too large".to_string()))?;
            let needed = row
                .checked_mul(h)
                .ok_or_else(|| Error::Image("image too large".to_string()))?;
            if data.len() < needed {
                return Err(Error::Image("truncated image data".to_string()));
            }
            Ok(RgbImage::from_fn(width, height, |x, y| {
                let at = y as usize * row + x as usize * comps;
                match components {
                    1 => Rgb([data[at], data[at], data[at]]),
                    3 => Rgb([data[at], data[at + 1], data[at + 2]]),
                    _ => {
                        let k = 255 - data[at + 3] as u32;
                        let channel = |v: u8| ((255 - v as u32) * k / 255) as u8;
                        Rgb([channel(data[at]), channel(data[at + 1]), channel(data[at + 2])])
                    }
                }
            }))
        }
        (1, 1) => {
            let row = w.div_ceil(8);
            if data.len() < row * h {
                return Err(Error::Image("truncated image data".to_string()));
            }
            Ok(RgbImage::from_fn(width, height, |x, y| {
                let byte = data[y as usize * row + (x / 8) as usize];
                let on = byte & (0x80 >> (x % 8)) != 0;
                let v = if on { 255 } else { 0 };
                Rgb([v, v, v])
            }))
        }
        _ => Err(Error::Image(format!(
            "unsupported sample layout: {} bits x {} components",
            bits, components
        ))),
    }
}
