//! Image optimization.
//!
//! Raster formats are re-encoded with the `image` crate; SVG is minified as
//! text. The optimizer never makes a file larger: when re-encoding does not
//! shrink the input, the original bytes are returned.

use super::{Transform, TransformError};
use ::image::codecs::jpeg::JpegEncoder;
use ::image::codecs::png::{CompressionType, FilterType as PngFilter, PngEncoder};
use ::image::{ColorType, DynamicImage, ImageEncoder, ImageError, ImageFormat};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Lossless PNG recompression, quality-bounded JPEG re-encoding, SVG cleanup.
///
/// GIFs pass through unchanged: re-encoding would drop animation frames.
#[derive(Debug, Clone, Copy)]
pub struct ImageOptimizer {
    jpeg_quality: u8,
}

impl ImageOptimizer {
    pub fn new(jpeg_quality: u8) -> Self {
        Self { jpeg_quality: jpeg_quality.clamp(1, 100) }
    }

    fn optimize_png(&self, input: &[u8]) -> Result<Option<Vec<u8>>, ImageError> {
        let img = ::image::load_from_memory_with_format(input, ImageFormat::Png)?;

        // Fully opaque RGBA loses nothing when the alpha channel is dropped
        let img = match img {
            DynamicImage::ImageRgba8(rgba) if rgba.pixels().all(|p| p[3] == u8::MAX) => {
                DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(rgba).to_rgb8())
            }
            other => other,
        };

        // 16-bit and float images are left alone
        if !matches!(img.color(), ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8)
        {
            return Ok(None);
        }

        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Best, PngFilter::Adaptive)
            .write_image(img.as_bytes(), img.width(), img.height(), img.color())?;
        Ok(Some(out))
    }

    fn optimize_jpeg(&self, input: &[u8]) -> Result<Option<Vec<u8>>, ImageError> {
        let img = ::image::load_from_memory_with_format(input, ImageFormat::Jpeg)?;
        let mut out = Vec::new();
        let encoder = JpegEncoder::new_with_quality(&mut out, self.jpeg_quality);

        match img {
            DynamicImage::ImageLuma8(gray) => {
                encoder.write_image(gray.as_raw(), gray.width(), gray.height(), ColorType::L8)?
            }
            other => {
                let rgb = other.to_rgb8();
                encoder.write_image(rgb.as_raw(), rgb.width(), rgb.height(), ColorType::Rgb8)?
            }
        }
        Ok(Some(out))
    }
}

impl Default for ImageOptimizer {
    fn default() -> Self {
        Self::new(85)
    }
}

impl Transform for ImageOptimizer {
    fn name(&self) -> &'static str {
        "imagemin"
    }

    fn fingerprint(&self) -> String {
        format!("jpeg_quality={}", self.jpeg_quality)
    }

    fn apply(&self, path: &Path, input: &[u8]) -> Result<Vec<u8>, TransformError> {
        let extension =
            path.extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default();
        let image_error = |source| TransformError::Image { file: path.to_path_buf(), source };

        let optimized = match extension.as_str() {
            "png" => self.optimize_png(input).map_err(image_error)?,
            "jpg" | "jpeg" => self.optimize_jpeg(input).map_err(image_error)?,
            "svg" => std::str::from_utf8(input).ok().map(|svg| minify_svg(svg).into_bytes()),
            _ => None,
        };

        Ok(match optimized {
            Some(bytes) if bytes.len() < input.len() => bytes,
            _ => input.to_vec(),
        })
    }
}

fn svg_patterns() -> &'static [(Regex, &'static str); 4] {
    static PATTERNS: OnceLock<[(Regex, &'static str); 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static SVG pattern compiles");
        [
            (re(r"(?s)<!--.*?-->"), ""),
            (re(r"(?s)<metadata\b.*?</metadata>"), ""),
            (re(r"(?s)<\?xml.*?\?>"), ""),
            (re(r">\s+<"), "><"),
        ]
    })
}

/// Strip comments, metadata, the XML declaration and inter-tag whitespace.
///
/// Whitespace is kept when the document contains text elements, where it is
/// significant.
fn minify_svg(svg: &str) -> String {
    let has_text = svg.contains("<text");
    let mut out = svg.to_string();
    for (i, (pattern, replacement)) in svg_patterns().iter().enumerate() {
        if i == 3 && has_text {
            continue;
        }
        out = pattern.replace_all(&out, *replacement).into_owned();
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::image::{ImageBuffer, Rgba};
    use std::io::Cursor;

    fn sample_png_uncompressed() -> Vec<u8> {
        let img = ImageBuffer::from_fn(64, 64, |x, y| {
            Rgba([(x % 4) as u8 * 60, (y % 4) as u8 * 60, 128, 255])
        });
        let mut out = Vec::new();
        PngEncoder::new_with_quality(&mut out, CompressionType::Fast, PngFilter::NoFilter)
            .write_image(img.as_raw(), 64, 64, ColorType::Rgba8)
            .unwrap();
        out
    }

    #[test]
    fn test_png_gets_smaller_and_stays_decodable() {
        let input = sample_png_uncompressed();
        let out = ImageOptimizer::default().apply(Path::new("a.png"), &input).unwrap();
        assert!(out.len() < input.len());

        let original = ::image::load_from_memory(&input).unwrap().to_rgba8();
        let optimized = ::image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(original.as_raw(), optimized.as_raw());
    }

    #[test]
    fn test_never_larger_than_input() {
        let input = sample_png_uncompressed();
        let optimizer = ImageOptimizer::default();
        let once = optimizer.apply(Path::new("a.png"), &input).unwrap();
        let twice = optimizer.apply(Path::new("a.png"), &once).unwrap();
        assert!(twice.len() <= once.len());
    }

    #[test]
    fn test_jpeg_roundtrip_decodes() {
        let img = ImageBuffer::from_fn(32, 32, |x, y| ::image::Rgb([x as u8 * 8, y as u8 * 8, 0]));
        let mut input = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut input), ImageFormat::Jpeg)
            .unwrap();

        let out = ImageOptimizer::new(50).apply(Path::new("photo.JPG"), &input).unwrap();
        assert!(out.len() <= input.len());
        let decoded = ::image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (32, 32));
    }

    #[test]
    fn test_gif_passthrough() {
        let input = b"GIF89a-not-really".to_vec();
        let out = ImageOptimizer::default().apply(Path::new("anim.gif"), &input).unwrap();
        assert_eq!(out, input);
    }

    #[test]
    fn test_corrupt_png_is_error() {
        let err = ImageOptimizer::default().apply(Path::new("bad.png"), b"not a png").unwrap_err();
        assert!(matches!(err, TransformError::Image { .. }));
    }

    #[test]
    fn test_minify_svg() {
        let svg = "<?xml version=\"1.0\"?>\n<!-- generator -->\n<svg xmlns=\"http://www.w3.org/2000/svg\">\n  <metadata>stuff</metadata>\n  <rect width=\"1\" height=\"1\"/>\n</svg>\n";
        assert_eq!(
            minify_svg(svg),
            "<svg xmlns=\"http://www.w3.org/2000/svg\"><rect width=\"1\" height=\"1\"/></svg>"
        );
    }

    #[test]
    fn test_minify_svg_keeps_text_spacing() {
        let svg = "<svg><text><tspan>a</tspan> <tspan>b</tspan></text></svg>";
        assert_eq!(minify_svg(svg), svg);
    }

    #[test]
    fn test_fingerprint_includes_quality() {
        assert_eq!(ImageOptimizer::new(70).fingerprint(), "jpeg_quality=70");
        assert_eq!(ImageOptimizer::new(0).fingerprint(), "jpeg_quality=1");
    }
}
