//! PNG text-chunk metadata embedding.
//!
//! Generation parameters travel inside the image itself as a PNG text
//! chunk under the [`PARAMETERS_KEYWORD`] keyword, which is where
//! image viewers and the backend's own image-info endpoint look for
//! them. Any raster format the `image` crate can decode is accepted on
//! input; output is always PNG since it is the only supported format
//! that carries the chunk.

use std::io::Cursor;

use image::DynamicImage;

/// Keyword of the text chunk holding the generation parameters.
pub const PARAMETERS_KEYWORD: &str = "parameters";

/// Errors from decoding the source raster or writing/reading PNG chunks.
#[derive(Debug, thiserror::Error)]
pub enum PngMetadataError {
    /// The input bytes are not a decodable image.
    #[error("Failed to decode image: {0}")]
    Decode(#[from] image::ImageError),

    /// The PNG encoder rejected the image data or text chunk.
    #[error("Failed to encode PNG: {0}")]
    Encode(#[from] png::EncodingError),

    /// The PNG could not be parsed while reading chunks back.
    #[error("Failed to read PNG: {0}")]
    Read(#[from] png::DecodingError),
}

/// Re-encode `image_bytes` as PNG with `parameters` embedded as a text chunk.
///
/// Colour type and bit depth of 8- and 16-bit sources are preserved;
/// floating-point rasters are narrowed to 8-bit RGBA. Text that fits in
/// Latin-1 goes into a `tEXt` chunk, anything else into `iTXt`.
pub fn embed_parameters(image_bytes: &[u8], parameters: &str) -> Result<Vec<u8>, PngMetadataError> {
    let decoded = image::load_from_memory(image_bytes)?;
    let (width, height) = (decoded.width(), decoded.height());
    let (color, depth, data) = raster_layout(decoded);

    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(color);
        encoder.set_depth(depth);

        if is_latin1(parameters) {
            encoder.add_text_chunk(PARAMETERS_KEYWORD.to_string(), parameters.to_string())?;
        } else {
            encoder.add_itxt_chunk(PARAMETERS_KEYWORD.to_string(), parameters.to_string())?;
        }

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&data)?;
        writer.finish()?;
    }

    Ok(out)
}

/// Read the [`PARAMETERS_KEYWORD`] text chunk from a PNG, if present.
///
/// Looks at `tEXt`, `zTXt` and `iTXt` chunks placed before the image data.
pub fn read_parameters(png_bytes: &[u8]) -> Result<Option<String>, PngMetadataError> {
    let reader = png::Decoder::new(Cursor::new(png_bytes)).read_info()?;
    let info = reader.info();

    if let Some(chunk) = info
        .uncompressed_latin1_text
        .iter()
        .find(|c| c.keyword == PARAMETERS_KEYWORD)
    {
        return Ok(Some(chunk.text.clone()));
    }
    if let Some(chunk) = info
        .compressed_latin1_text
        .iter()
        .find(|c| c.keyword == PARAMETERS_KEYWORD)
    {
        return Ok(Some(chunk.get_text()?));
    }
    if let Some(chunk) = info
        .utf8_text
        .iter()
        .find(|c| c.keyword == PARAMETERS_KEYWORD)
    {
        return Ok(Some(chunk.get_text()?));
    }

    Ok(None)
}

fn is_latin1(text: &str) -> bool {
    text.chars().all(|c| u32::from(c) <= 0xFF)
}

/// Map a decoded raster to the PNG colour type, bit depth and raw
/// scanline bytes the encoder expects (16-bit samples are big-endian).
fn raster_layout(image: DynamicImage) -> (png::ColorType, png::BitDepth, Vec<u8>) {
    use png::{BitDepth, ColorType};

    match image {
        DynamicImage::ImageLuma8(img) => (ColorType::Grayscale, BitDepth::Eight, img.into_raw()),
        DynamicImage::ImageLumaA8(img) => {
            (ColorType::GrayscaleAlpha, BitDepth::Eight, img.into_raw())
        }
        DynamicImage::ImageRgb8(img) => (ColorType::Rgb, BitDepth::Eight, img.into_raw()),
        DynamicImage::ImageRgba8(img) => (ColorType::Rgba, BitDepth::Eight, img.into_raw()),
        DynamicImage::ImageLuma16(img) => (
            ColorType::Grayscale,
            BitDepth::Sixteen,
            be_bytes(img.as_raw()),
        ),
        DynamicImage::ImageLumaA16(img) => (
            ColorType::GrayscaleAlpha,
            BitDepth::Sixteen,
            be_bytes(img.as_raw()),
        ),
        DynamicImage::ImageRgb16(img) => {
            (ColorType::Rgb, BitDepth::Sixteen, be_bytes(img.as_raw()))
        }
        DynamicImage::ImageRgba16(img) => {
            (ColorType::Rgba, BitDepth::Sixteen, be_bytes(img.as_raw()))
        }
        other => (ColorType::Rgba, BitDepth::Eight, other.to_rgba8().into_raw()),
    }
}

fn be_bytes(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}
