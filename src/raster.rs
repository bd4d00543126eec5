//! Raster image ingestion.
//!
//! PDF embeds PNG and JPEG payloads without re-encoding pixels, so both
//! formats are parsed by hand here: PNG at the chunk level (the IDAT stream
//! is kept zlib-compressed and handed to the viewer with a predictor
//! declaration), JPEG at the marker level (the whole file becomes a
//! DCTDecode stream). GIF has no PDF-native filter and is transcoded to an
//! in-memory PNG first.
//!
//! PNG images with an alpha channel are split into a color stream and a
//! soft-mask stream, both re-deflated, since PDF carries alpha as a
//! separate grayscale image.

use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{PdfError, Result};

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ColorSpace {
    DeviceGray,
    DeviceRgb,
    DeviceCmyk,
    Indexed,
}

impl ColorSpace {
    pub(crate) fn component_count(self) -> u8 {
        match self {
            ColorSpace::DeviceGray | ColorSpace::Indexed => 1,
            ColorSpace::DeviceRgb => 3,
            ColorSpace::DeviceCmyk => 4,
        }
    }
}

/// A decoded image ready for embedding. `data` is already in the form the
/// PDF stream will carry (zlib for PNG-sourced pixels, raw JFIF for JPEG).
#[derive(Debug, Clone)]
pub(crate) struct RasterImage {
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) color_space: ColorSpace,
    pub(crate) bits_per_component: u8,
    /// PDF stream filter name, e.g. "FlateDecode".
    pub(crate) filter: &'static str,
    /// /DecodeParms dictionary body, without the enclosing << >>.
    pub(crate) decode_parms: Option<String>,
    /// Raw palette bytes for Indexed images (RGB triplets).
    pub(crate) palette: Vec<u8>,
    /// Simple transparency sample values for the /Mask entry.
    pub(crate) transparency: Vec<u8>,
    /// Deflated 8-bit grayscale alpha plane, present for PNG color types
    /// 4 and 6. Serialized as a separate /SMask image object.
    pub(crate) soft_mask: Option<Vec<u8>>,
    pub(crate) data: Vec<u8>,
}

impl RasterImage {
    /// True when embedding this image requires PDF 1.4 semantics.
    pub(crate) fn needs_pdf_14(&self) -> bool {
        self.soft_mask.is_some()
    }
}

/// Decode an image file, dispatching on its extension.
pub(crate) fn decode_file(path: &Path) -> Result<RasterImage> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    let bytes = fs::read(path).map_err(|e| PdfError::ImageRead {
        file: path.display().to_string(),
        reason: e.to_string(),
    })?;
    decode_bytes(&bytes, &ext, &path.display().to_string())
}

/// Decode from memory with an explicit format name ("png", "jpg", "jpeg",
/// "gif").
pub(crate) fn decode_bytes(bytes: &[u8], format: &str, name: &str) -> Result<RasterImage> {
    match format {
        "png" => parse_png(bytes, name),
        "jpg" | "jpeg" => parse_jpeg(bytes, name),
        "gif" => parse_gif(bytes, name),
        other => Err(PdfError::UnsupportedImageType(other.to_string())),
    }
}

// ---------------------------------------------------------------- PNG ----

fn parse_png(bytes: &[u8], name: &str) -> Result<RasterImage> {
    if bytes.len() < 8 || bytes[..8] != PNG_SIGNATURE {
        return Err(PdfError::NotAPng(name.to_string()));
    }
    let mut pos = 8usize;

    // IHDR is mandatory and first.
    let (len, chunk_type) = read_chunk_header(bytes, pos, name)?;
    if chunk_type != *b"IHDR" || len != 13 {
        return Err(PdfError::NotAPng(name.to_string()));
    }
    let ihdr = &bytes[pos + 8..pos + 8 + 13];
    let width = be_u32(&ihdr[0..4]);
    let height = be_u32(&ihdr[4..8]);
    let bpc = ihdr[8];
    if bpc > 8 {
        return Err(PdfError::UnsupportedBitDepth(format!(
            "{name}: 16-bit channels"
        )));
    }
    let ct = ihdr[9];
    let color_space = match ct {
        0 | 4 => ColorSpace::DeviceGray,
        2 | 6 => ColorSpace::DeviceRgb,
        3 => ColorSpace::Indexed,
        other => {
            return Err(PdfError::ImageRead {
                file: name.to_string(),
                reason: format!("unknown PNG color type {other}"),
            })
        }
    };
    if ihdr[10] != 0 || ihdr[11] != 0 {
        return Err(PdfError::ImageRead {
            file: name.to_string(),
            reason: "nonzero compression or filter method".to_string(),
        });
    }
    if ihdr[12] != 0 {
        return Err(PdfError::InterlacingUnsupported(name.to_string()));
    }
    pos += 8 + 13 + 4;

    let colors = if ct == 2 || ct == 6 { 3 } else { 1 };
    let decode_parms = format!(
        "/Predictor 15 /Colors {colors} /BitsPerComponent {bpc} /Columns {width}"
    );

    let mut palette = Vec::new();
    let mut transparency = Vec::new();
    let mut idat = Vec::new();
    loop {
        let (len, chunk_type) = read_chunk_header(bytes, pos, name)?;
        let body_start = pos + 8;
        let body_end = body_start + len as usize;
        if body_end + 4 > bytes.len() {
            return Err(PdfError::ImageRead {
                file: name.to_string(),
                reason: "truncated chunk".to_string(),
            });
        }
        let body = &bytes[body_start..body_end];
        match &chunk_type {
            b"PLTE" => palette.extend_from_slice(body),
            b"tRNS" => {
                transparency = match ct {
                    // Grayscale and truecolor carry 16-bit sample values,
                    // take the low-order byte of each.
                    0 => body.get(1).map(|&b| vec![b]).unwrap_or_default(),
                    2 => {
                        if body.len() >= 6 {
                            vec![body[1], body[3], body[5]]
                        } else {
                            Vec::new()
                        }
                    }
                    // Indexed: the first fully transparent entry wins.
                    _ => body
                        .iter()
                        .position(|&b| b == 0)
                        .map(|p| vec![p as u8])
                        .unwrap_or_default(),
                };
            }
            b"IDAT" => idat.extend_from_slice(body),
            b"IEND" => break,
            _ => {}
        }
        pos = body_end + 4;
    }

    if color_space == ColorSpace::Indexed && palette.is_empty() {
        return Err(PdfError::MissingPalette(name.to_string()));
    }

    let mut image = RasterImage {
        width,
        height,
        color_space,
        bits_per_component: bpc,
        filter: "FlateDecode",
        decode_parms: Some(decode_parms),
        palette,
        transparency,
        soft_mask: None,
        data: idat,
    };

    if ct >= 4 {
        split_alpha(&mut image, ct, name)?;
    }
    Ok(image)
}

fn read_chunk_header(bytes: &[u8], pos: usize, name: &str) -> Result<(u32, [u8; 4])> {
    if pos + 8 > bytes.len() {
        return Err(PdfError::ImageRead {
            file: name.to_string(),
            reason: "truncated chunk header".to_string(),
        });
    }
    let len = be_u32(&bytes[pos..pos + 4]);
    let mut ty = [0u8; 4];
    ty.copy_from_slice(&bytes[pos + 4..pos + 8]);
    Ok((len, ty))
}

/// Pull the alpha channel out of an inflated PNG pixel stream. Scanline
/// filter bytes are duplicated into both streams so the predictor stays
/// valid for each.
fn split_alpha(image: &mut RasterImage, ct: u8, name: &str) -> Result<()> {
    let mut raw = Vec::new();
    ZlibDecoder::new(image.data.as_slice())
        .read_to_end(&mut raw)
        .map_err(|e| PdfError::ImageRead {
            file: name.to_string(),
            reason: format!("bad IDAT stream: {e}"),
        })?;

    let px = if ct == 4 { 2usize } else { 4usize };
    let line = 1 + px * image.width as usize;
    if raw.len() < line * image.height as usize {
        return Err(PdfError::ImageRead {
            file: name.to_string(),
            reason: "pixel data shorter than declared size".to_string(),
        });
    }

    let mut color = Vec::with_capacity(raw.len());
    let mut alpha = Vec::with_capacity(raw.len() / px + image.height as usize);
    for row in raw.chunks_exact(line).take(image.height as usize) {
        color.push(row[0]);
        alpha.push(row[0]);
        for pixel in row[1..].chunks_exact(px) {
            color.extend_from_slice(&pixel[..px - 1]);
            alpha.push(pixel[px - 1]);
        }
    }

    image.data = deflate(&color)?;
    image.soft_mask = Some(deflate(&alpha)?);
    Ok(())
}

pub(crate) fn deflate(raw: &[u8]) -> Result<Vec<u8>> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    enc.write_all(raw).map_err(PdfError::OutputWrite)?;
    enc.finish().map_err(PdfError::OutputWrite)
}

// --------------------------------------------------------------- JPEG ----

/// Walk the JFIF marker chain to the first frame header (SOF0/1/2) and read
/// the dimensions from it. The file bytes themselves become the stream.
fn parse_jpeg(bytes: &[u8], name: &str) -> Result<RasterImage> {
    if bytes.len() < 4 || bytes[0] != 0xff || bytes[1] != 0xd8 {
        return Err(PdfError::ImageRead {
            file: name.to_string(),
            reason: "missing JPEG SOI marker".to_string(),
        });
    }
    let mut pos = 2usize;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xff {
            break;
        }
        let marker = bytes[pos + 1];
        // Standalone markers have no length field.
        if (0xd0..=0xd9).contains(&marker) || marker == 0x01 {
            pos += 2;
            continue;
        }
        let seg_len = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        if matches!(marker, 0xc0 | 0xc1 | 0xc2) {
            if pos + 2 + seg_len > bytes.len() || seg_len < 8 {
                break;
            }
            let seg = &bytes[pos + 4..pos + 2 + seg_len];
            let precision = seg[0];
            let height = u16::from_be_bytes([seg[1], seg[2]]) as u32;
            let width = u16::from_be_bytes([seg[3], seg[4]]) as u32;
            let channels = seg[5];
            let color_space = match channels {
                1 => ColorSpace::DeviceGray,
                3 => ColorSpace::DeviceRgb,
                4 => ColorSpace::DeviceCmyk,
                other => {
                    return Err(PdfError::ImageRead {
                        file: name.to_string(),
                        reason: format!("unsupported JPEG channel count {other}"),
                    })
                }
            };
            return Ok(RasterImage {
                width,
                height,
                color_space,
                bits_per_component: precision,
                filter: "DCTDecode",
                decode_parms: None,
                palette: Vec::new(),
                transparency: Vec::new(),
                soft_mask: None,
                data: bytes.to_vec(),
            });
        }
        pos += 2 + seg_len;
    }
    Err(PdfError::ImageRead {
        file: name.to_string(),
        reason: "no SOF frame header found".to_string(),
    })
}

// ---------------------------------------------------------------- GIF ----

/// Decode the first GIF frame and re-enter through the PNG path.
fn parse_gif(bytes: &[u8], name: &str) -> Result<RasterImage> {
    let decoded = image::load_from_memory_with_format(bytes, image::ImageFormat::Gif)
        .map_err(|e| PdfError::ImageRead {
            file: name.to_string(),
            reason: e.to_string(),
        })?;
    let mut png = Cursor::new(Vec::new());
    decoded
        .write_to(&mut png, image::ImageFormat::Png)
        .map_err(|e| PdfError::ImageRead {
            file: name.to_string(),
            reason: format!("PNG transcode failed: {e}"),
        })?;
    parse_png(png.get_ref(), name)
}

fn be_u32(b: &[u8]) -> u32 {
    u32::from_be_bytes([b[0], b[1], b[2], b[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma, LumaA, Rgb, Rgba};

    fn encode_png<P, C>(buf: &ImageBuffer<P, C>) -> Vec<u8>
    where
        P: image::Pixel + image::PixelWithColorType,
        C: std::ops::Deref<Target = [P::Subpixel]>,
        [P::Subpixel]: image::EncodableLayout,
    {
        let mut out = Cursor::new(Vec::new());
        buf.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn rejects_non_png() {
        let err = parse_png(b"not a png at all", "x").unwrap_err();
        assert!(matches!(err, PdfError::NotAPng(_)));
    }

    #[test]
    fn rgb_png_keeps_idat_compressed() {
        let buf = ImageBuffer::from_fn(4, 3, |x, _| Rgb([x as u8 * 60, 10, 200]));
        let img = parse_png(&encode_png(&buf), "rgb").unwrap();
        assert_eq!((img.width, img.height), (4, 3));
        assert_eq!(img.color_space, ColorSpace::DeviceRgb);
        assert_eq!(img.filter, "FlateDecode");
        assert!(img.soft_mask.is_none());
        assert!(img
            .decode_parms
            .as_deref()
            .unwrap()
            .contains("/Colors 3"));

        // The stream must still be the raw filtered scanlines.
        let mut raw = Vec::new();
        ZlibDecoder::new(img.data.as_slice())
            .read_to_end(&mut raw)
            .unwrap();
        assert_eq!(raw.len(), 3 * (1 + 4 * 3));
    }

    #[test]
    fn rgba_png_splits_soft_mask() {
        let buf = ImageBuffer::from_fn(2, 2, |x, y| {
            Rgba([100u8, 150, 200, if (x + y) % 2 == 0 { 255 } else { 0 }])
        });
        let img = parse_png(&encode_png(&buf), "rgba").unwrap();
        assert_eq!(img.color_space, ColorSpace::DeviceRgb);
        assert!(img.needs_pdf_14());

        let mut color = Vec::new();
        ZlibDecoder::new(img.data.as_slice())
            .read_to_end(&mut color)
            .unwrap();
        // 2 rows, each: filter byte + 2 px * 3 bytes.
        assert_eq!(color.len(), 2 * 7);

        let mut alpha = Vec::new();
        ZlibDecoder::new(img.soft_mask.as_deref().unwrap())
            .read_to_end(&mut alpha)
            .unwrap();
        assert_eq!(alpha.len(), 2 * 3);
    }

    #[test]
    fn gray_alpha_png_splits_soft_mask() {
        let buf = ImageBuffer::from_fn(3, 1, |x, _| LumaA([x as u8 * 80, 128]));
        let img = parse_png(&encode_png(&buf), "ga").unwrap();
        assert_eq!(img.color_space, ColorSpace::DeviceGray);
        assert!(img.soft_mask.is_some());
    }

    #[test]
    fn gray_png_plain() {
        let buf = ImageBuffer::from_fn(5, 5, |x, y| Luma([(x * y) as u8]));
        let img = parse_png(&encode_png(&buf), "gray").unwrap();
        assert_eq!(img.color_space, ColorSpace::DeviceGray);
        assert_eq!(img.bits_per_component, 8);
        assert!(img.transparency.is_empty());
    }

    #[test]
    fn jpeg_dimensions_from_sof() {
        let buf = ImageBuffer::from_fn(6, 4, |x, _| Rgb([x as u8 * 40, 0, 0]));
        let mut out = Cursor::new(Vec::new());
        buf.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
        let bytes = out.into_inner();
        let img = parse_jpeg(&bytes, "j").unwrap();
        assert_eq!((img.width, img.height), (6, 4));
        assert_eq!(img.color_space, ColorSpace::DeviceRgb);
        assert_eq!(img.filter, "DCTDecode");
        assert_eq!(img.data, bytes);
    }

    #[test]
    fn gif_transcodes_to_flate() {
        let buf = ImageBuffer::from_fn(4, 4, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let mut out = Cursor::new(Vec::new());
        buf.write_to(&mut out, image::ImageFormat::Gif).unwrap();
        let img = parse_gif(out.get_ref(), "g").unwrap();
        assert_eq!((img.width, img.height), (4, 4));
        assert_eq!(img.filter, "FlateDecode");
    }

    #[test]
    fn unknown_extension_is_rejected() {
        let err = decode_bytes(&[], "bmp", "x").unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedImageType(_)));
    }
}
