//! First-page rasterization for scanned reports.
//!
//! Scanned inspection reports are PDFs whose pages each hold a single image
//! XObject. [`EmbeddedImageRasterizer`] pulls the largest such image off the
//! first page and decodes it, which is enough to feed OCR without linking a
//! full PDF renderer.

use image::DynamicImage;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::PdfError;

/// Converts the first page of a PDF into a raster image.
///
/// Implementations must be `Send + Sync` so one instance can be shared by
/// parallel extraction workers.
pub trait PageRasterizer: Send + Sync {
    /// Renders page 1 of `pdf_bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`PdfError`] if the PDF cannot be parsed or the page cannot
    /// be turned into an image.
    fn rasterize_first_page(&self, pdf_bytes: &[u8]) -> Result<DynamicImage, PdfError>;
}

/// Rasterizer that decodes the largest image embedded on the page.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedImageRasterizer;

impl PageRasterizer for EmbeddedImageRasterizer {
    fn rasterize_first_page(&self, pdf_bytes: &[u8]) -> Result<DynamicImage, PdfError> {
        let doc = Document::load_mem(pdf_bytes)
            .map_err(|e| PdfError::Parse(format!("failed to parse PDF: {e}")))?;

        let page_id = doc.page_iter().next().ok_or(PdfError::NoPages)?;
        let image = largest_page_image(&doc, page_id)?;

        log::debug!(
            "Rasterized first page as {}x{} image",
            image.width(),
            image.height()
        );

        Ok(image)
    }
}

/// Walks page → `/Resources` → `/XObject` and decodes the image with the
/// most pixels.
fn largest_page_image(doc: &Document, page_id: ObjectId) -> Result<DynamicImage, PdfError> {
    let page = doc
        .get_object(page_id)
        .and_then(Object::as_dict)
        .map_err(|e| PdfError::Parse(format!("page object error: {e}")))?;

    let Some(resources) = resolve_dict_entry(doc, page, b"Resources") else {
        return Err(PdfError::NoImage(1));
    };
    let Some(xobjects) = resolve_dict_entry(doc, resources, b"XObject") else {
        return Err(PdfError::NoImage(1));
    };

    let mut largest: Option<DynamicImage> = None;

    for (name, obj) in xobjects.iter() {
        let Object::Stream(stream) = resolve_object(doc, obj) else {
            continue;
        };
        if !is_image_subtype(&stream.dict) {
            continue;
        }

        match decode_image_stream(doc, stream) {
            Ok(image) => {
                let pixels = u64::from(image.width()) * u64::from(image.height());
                let larger = largest.as_ref().is_none_or(|prev| {
                    pixels > u64::from(prev.width()) * u64::from(prev.height())
                });
                if larger {
                    largest = Some(image);
                }
            }
            Err(e) => {
                log::warn!(
                    "Skipping undecodable image /{}: {e}",
                    String::from_utf8_lossy(name)
                );
            }
        }
    }

    largest.ok_or(PdfError::NoImage(1))
}

fn is_image_subtype(dict: &Dictionary) -> bool {
    matches!(dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image")
}

fn has_filter(dict: &Dictionary, filter: &[u8]) -> bool {
    match dict.get(b"Filter") {
        Ok(Object::Name(n)) => n == filter,
        Ok(Object::Array(arr)) => arr
            .iter()
            .any(|o| matches!(o, Object::Name(n) if n == filter)),
        _ => false,
    }
}

/// Decodes one image XObject.
///
/// `DCTDecode` streams are JPEG files as-is. Anything else is decompressed
/// and either recognized as a complete image file or rebuilt from raw
/// samples using the stream's geometry.
fn decode_image_stream(doc: &Document, stream: &Stream) -> Result<DynamicImage, PdfError> {
    if has_filter(&stream.dict, b"DCTDecode") {
        return image::load_from_memory(&stream.content)
            .map_err(|e| PdfError::Image(format!("failed to decode JPEG stream: {e}")));
    }

    let content = image_content(stream);

    if let Ok(image) = image::load_from_memory(&content) {
        return Ok(image);
    }

    reconstruct_raw_image(doc, &stream.dict, &content)
}

/// Decompressed bytes of an image stream, or the stored bytes if no filter
/// applies.
///
/// `lopdf` refuses to decompress streams whose `/Subtype` is `/Image`, so
/// the filters run on a copy without it.
fn image_content(stream: &Stream) -> Vec<u8> {
    let mut dict = stream.dict.clone();
    dict.remove(b"Subtype");
    Stream::new(dict, stream.content.clone())
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone())
}

/// Color space of raw image samples.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette lookup into `base`. `palette` holds `base` samples back to
    /// back, one entry per index.
    Indexed {
        base: Box<ColorSpace>,
        palette: Vec<u8>,
    },
}

impl ColorSpace {
    /// Components per sample as stored in the stream.
    const fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }
}

/// Rebuilds an image from raw samples using `/Width`, `/Height`,
/// `/BitsPerComponent`, `/ColorSpace` and `/Decode`.
///
/// Rows are padded to whole bytes. Samples narrower than 8 bits are scaled
/// up to 8 bits and 16-bit samples keep their high byte. CMYK is converted
/// to RGB.
fn reconstruct_raw_image(
    doc: &Document,
    dict: &Dictionary,
    samples: &[u8],
) -> Result<DynamicImage, PdfError> {
    let width = get_dimension(dict, b"Width")?;
    let height = get_dimension(dict, b"Height")?;
    if width == 0 || height == 0 {
        return Err(PdfError::Image(format!("empty image {width}x{height}")));
    }

    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let bpc = if is_mask {
        1
    } else {
        dict.get(b"BitsPerComponent")
            .and_then(Object::as_i64)
            .unwrap_or(8)
    };
    let bpc = match u8::try_from(bpc) {
        Ok(bits @ (1 | 2 | 4 | 8 | 16)) => bits,
        _ => {
            return Err(PdfError::Image(format!(
                "unsupported BitsPerComponent {bpc}"
            )));
        }
    };

    let color_space = if is_mask {
        ColorSpace::Gray
    } else {
        dict.get(b"ColorSpace")
            .map_or(ColorSpace::Rgb, |cs| color_space(doc, cs))
    };

    let indexed = matches!(color_space, ColorSpace::Indexed { .. });
    let mut values = unpack_samples(
        samples,
        dimension(width)?,
        dimension(height)?,
        color_space.components(),
        bpc,
        !indexed,
    )?;

    let (color_space, values) = match color_space {
        ColorSpace::Indexed { base, palette } => {
            let expanded = expand_palette(&values, base.components(), &palette);
            (*base, expanded)
        }
        other => {
            if let Some(ranges) = decode_ranges(dict, other.components()) {
                apply_decode(&mut values, &ranges);
            }
            (other, values)
        }
    };

    let image = match color_space {
        ColorSpace::Gray => {
            image::GrayImage::from_raw(width, height, values).map(DynamicImage::ImageLuma8)
        }
        ColorSpace::Rgb => {
            image::RgbImage::from_raw(width, height, values).map(DynamicImage::ImageRgb8)
        }
        ColorSpace::Cmyk => image::RgbImage::from_raw(width, height, cmyk_to_rgb(&values))
            .map(DynamicImage::ImageRgb8),
        ColorSpace::Indexed { .. } => {
            return Err(PdfError::Image("nested indexed color space".to_owned()));
        }
    };

    image.ok_or_else(|| PdfError::Image("sample buffer does not match geometry".to_owned()))
}

fn dimension(value: u32) -> Result<usize, PdfError> {
    usize::try_from(value).map_err(|_| PdfError::Image("image dimensions overflow".to_owned()))
}

/// Unpacks `height` rows of `width * components` samples of `bpc` bits
/// into one byte per sample. When `scale` is set, narrow samples are
/// stretched to the full 0..=255 range; otherwise they keep their integer
/// value (palette indices).
fn unpack_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bpc: u8,
    scale: bool,
) -> Result<Vec<u8>, PdfError> {
    let overflow = || PdfError::Image("image dimensions overflow".to_owned());
    let per_row = width.checked_mul(components).ok_or_else(overflow)?;
    let row_bytes = per_row
        .checked_mul(usize::from(bpc))
        .ok_or_else(overflow)?
        .div_ceil(8);
    let expected = row_bytes.checked_mul(height).ok_or_else(overflow)?;

    if data.len() < expected {
        return Err(PdfError::Image(format!(
            "raw sample buffer too small: {} bytes, expected {expected} \
             ({width}x{height}, {components} components, {bpc} bits)",
            data.len(),
        )));
    }

    let mut out = Vec::with_capacity(per_row * height);
    for row in data.chunks_exact(row_bytes).take(height) {
        match bpc {
            8 => out.extend_from_slice(&row[..per_row]),
            16 => out.extend(row.chunks_exact(2).take(per_row).map(|pair| pair[0])),
            _ => {
                let bits = usize::from(bpc);
                let per_byte = 8 / bits;
                let max = (1u16 << bpc) - 1;
                for i in 0..per_row {
                    let shift = 8 - bits * (i % per_byte + 1);
                    let value = u16::from(row[i / per_byte] >> shift) & max;
                    let value = if scale { value * 255 / max } else { value };
                    out.push(u8::try_from(value).unwrap_or(u8::MAX));
                }
            }
        }
    }

    Ok(out)
}

/// `/Decode` pairs for each component, or `None` when absent, malformed,
/// or the identity mapping.
fn decode_ranges(dict: &Dictionary, components: usize) -> Option<Vec<(f32, f32)>> {
    let array = dict.get(b"Decode").and_then(Object::as_array).ok()?;
    if array.len() != components * 2 {
        return None;
    }

    let values: Vec<f32> = array
        .iter()
        .map(Object::as_float)
        .collect::<Result<_, _>>()
        .ok()?;
    let ranges: Vec<(f32, f32)> = values.chunks_exact(2).map(|p| (p[0], p[1])).collect();

    #[allow(clippy::float_cmp)]
    let identity = ranges.iter().all(|&(lo, hi)| lo == 0.0 && hi == 1.0);
    (!identity).then_some(ranges)
}

/// Maps each sample through its component's decode range.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::suboptimal_flops
)]
fn apply_decode(values: &mut [u8], ranges: &[(f32, f32)]) {
    for (i, value) in values.iter_mut().enumerate() {
        let (lo, hi) = ranges[i % ranges.len()];
        let mapped = lo + (f32::from(*value) / 255.0) * (hi - lo);
        *value = (mapped.clamp(0.0, 1.0) * 255.0).round() as u8;
    }
}

/// Replaces each palette index with its `base` color. Indices past the end
/// of the palette become black.
fn expand_palette(indices: &[u8], base_components: usize, palette: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(indices.len() * base_components);
    for &index in indices {
        let start = usize::from(index) * base_components;
        match palette.get(start..start + base_components) {
            Some(color) => out.extend_from_slice(color),
            None => out.extend(std::iter::repeat_n(0, base_components)),
        }
    }
    out
}

/// Naive CMYK to RGB: each channel is `255 - min(255, color + black)`.
fn cmyk_to_rgb(values: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() / 4 * 3);
    for px in values.chunks_exact(4) {
        let k = u16::from(px[3]);
        for &c in &px[..3] {
            let ink = (u16::from(c) + k).min(255);
            out.push(u8::try_from(255 - ink).unwrap_or(0));
        }
    }
    out
}

/// Parses a `/ColorSpace` entry. Unknown spaces are read as RGB.
fn color_space(doc: &Document, object: &Object) -> ColorSpace {
    match resolve_object(doc, object) {
        Object::Name(n) => match n.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => ColorSpace::Gray,
            b"DeviceCMYK" | b"CMYK" => ColorSpace::Cmyk,
            _ => ColorSpace::Rgb,
        },
        Object::Array(arr) => match arr.first() {
            Some(Object::Name(n)) if n == b"ICCBased" => {
                let components = arr
                    .get(1)
                    .map(|o| resolve_object(doc, o))
                    .and_then(|o| o.as_stream().ok())
                    .and_then(|s| s.dict.get(b"N").and_then(Object::as_i64).ok());
                match components {
                    Some(1) => ColorSpace::Gray,
                    Some(4) => ColorSpace::Cmyk,
                    _ => ColorSpace::Rgb,
                }
            }
            Some(Object::Name(n)) if n == b"Indexed" || n == b"I" => {
                let base = arr
                    .get(1)
                    .map_or(ColorSpace::Rgb, |o| color_space(doc, o));
                let palette = arr
                    .get(3)
                    .map(|o| palette_bytes(doc, o))
                    .unwrap_or_default();
                ColorSpace::Indexed {
                    base: Box::new(base),
                    palette,
                }
            }
            Some(Object::Name(n)) if n == b"CalGray" => ColorSpace::Gray,
            _ => ColorSpace::Rgb,
        },
        _ => ColorSpace::Rgb,
    }
}

/// The lookup table of an indexed color space, stored inline as a string
/// or in a stream.
fn palette_bytes(doc: &Document, object: &Object) -> Vec<u8> {
    match resolve_object(doc, object) {
        Object::String(bytes, _) => bytes.clone(),
        Object::Stream(stream) => stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone()),
        _ => Vec::new(),
    }
}

fn resolve_object<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

fn resolve_dict_entry<'a>(
    doc: &'a Document,
    dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Dictionary> {
    let obj = dict.get(key).ok()?;
    resolve_object(doc, obj).as_dict().ok()
}

fn get_dimension(dict: &Dictionary, key: &[u8]) -> Result<u32, PdfError> {
    let value = dict.get(key).and_then(Object::as_i64).map_err(|_| {
        PdfError::Image(format!(
            "missing /{} in image dictionary",
            String::from_utf8_lossy(key)
        ))
    })?;

    u32::try_from(value).map_err(|_| {
        PdfError::Image(format!(
            "/{} out of range: {value}",
            String::from_utf8_lossy(key)
        ))
    })
}
