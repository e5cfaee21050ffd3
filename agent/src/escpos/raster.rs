//! Logo conversion to ESC/POS `GS v 0` raster bit images.

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use thiserror::Error;
use tracing::debug;

use super::decode_base64;

/// `GS v 0` with normal density (m = 0).
const GS_V0: [u8; 4] = [0x1d, 0x76, 0x30, 0x00];

#[derive(Debug, Error)]
pub enum RasterError {
    #[error("logo is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("logo is not a decodable image: {0}")]
    Image(#[from] image::ImageError),
    #[error("logo has no pixels")]
    Empty,
    #[error("logo is {0} rows tall, raster height is limited to 65535")]
    TooTall(u32),
}

/// A 1-bit image packed MSB first, one row per `width_bytes` bytes.
/// A set bit is a black dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Raster {
    pub width: u32,
    pub height: u32,
    pub bits: Vec<u8>,
}

impl Raster {
    pub fn width_bytes(&self) -> u32 {
        self.width.div_ceil(8)
    }

    #[cfg(test)]
    pub(crate) fn is_black(&self, x: u32, y: u32) -> bool {
        let byte = self.bits[(y * self.width_bytes() + x / 8) as usize];
        byte & (0x80 >> (x % 8)) != 0
    }

    pub fn encode_gs_v0(&self) -> Result<Vec<u8>, RasterError> {
        let height = u16::try_from(self.height).map_err(|_| RasterError::TooTall(self.height))?;
        // width_bytes fits: the rasterizer never exceeds its max width
        let width_bytes = self.width_bytes() as u16;
        let mut out = Vec::with_capacity(8 + self.bits.len());
        out.extend_from_slice(&GS_V0);
        out.extend_from_slice(&width_bytes.to_le_bytes());
        out.extend_from_slice(&height.to_le_bytes());
        out.extend_from_slice(&self.bits);
        Ok(out)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LogoRasterizer {
    pub max_width: u32,
    /// Luma at or below this prints black.
    pub threshold: u8,
}

impl Default for LogoRasterizer {
    fn default() -> Self {
        Self {
            max_width: 384,
            threshold: 190,
        }
    }
}

impl LogoRasterizer {
    pub fn new(max_width: u32, threshold: u8) -> Self {
        Self {
            max_width: max_width.clamp(8, 8 * u16::MAX as u32),
            threshold,
        }
    }

    /// Decodes a base64 image, optionally wrapped in a `data:` URL, and
    /// returns the ready-to-send `GS v 0` command.
    pub fn convert_base64(&self, input: &str) -> Result<Vec<u8>, RasterError> {
        debug!(len = input.len(), "converting logo");
        let payload = strip_data_url(input);
        let bytes = decode_base64(payload)?;
        let img = image::load_from_memory(&bytes)?;
        self.rasterize(&img)?.encode_gs_v0()
    }

    pub fn rasterize(&self, img: &DynamicImage) -> Result<Raster, RasterError> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Err(RasterError::Empty);
        }
        let scaled;
        let img = if w > self.max_width {
            let new_h = ((h as u64 * self.max_width as u64) / w as u64).max(1) as u32;
            scaled = img.resize_exact(self.max_width, new_h, FilterType::Lanczos3);
            &scaled
        } else {
            img
        };
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        let width_bytes = width.div_ceil(8) as usize;
        let mut bits = vec![0u8; width_bytes * height as usize];
        for (x, y, px) in rgba.enumerate_pixels() {
            let [r, g, b, a] = px.0;
            let luma = luma(over_white(r, a), over_white(g, a), over_white(b, a));
            if luma <= self.threshold {
                bits[y as usize * width_bytes + x as usize / 8] |= 0x80 >> (x % 8);
            }
        }
        Ok(Raster {
            width,
            height,
            bits,
        })
    }
}

/// Drops a `data:<mime>;base64,` header when present.
pub fn strip_data_url(input: &str) -> &str {
    match input.split_once(',') {
        Some((_, rest)) => rest,
        None => input,
    }
}

fn over_white(c: u8, a: u8) -> u8 {
    let (c, a) = (c as u32, a as u32);
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

// ITU-R 601-2 luma in 16-bit fixed point
fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((r as u32 * 19595 + g as u32 * 38470 + b as u32 * 7471 + 0x8000) >> 16) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine};
    use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};
    use proptest::prelude::*;
    use std::io::Cursor;

    fn png_base64(img: &RgbaImage) -> String {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        STANDARD.encode(buf.into_inner())
    }

    #[test]
    fn header_and_bits_for_small_checker() {
        // 10x2: left half black, right half white
        let img = ImageBuffer::from_fn(10, 2, |x, _| {
            if x < 5 {
                Rgba([0, 0, 0, 255])
            } else {
                Rgba([255, 255, 255, 255])
            }
        });
        let out = LogoRasterizer::default().convert_base64(&png_base64(&img)).unwrap();
        assert_eq!(&out[..8], &[0x1d, 0x76, 0x30, 0x00, 2, 0, 2, 0]);
        assert_eq!(&out[8..], &[0b1111_1000, 0, 0b1111_1000, 0]);
    }

    #[test]
    fn data_url_prefix_is_accepted() {
        let img = ImageBuffer::from_pixel(8, 1, Rgba([0u8, 0, 0, 255]));
        let url = format!("data:image/png;base64,{}", png_base64(&img));
        let out = LogoRasterizer::default().convert_base64(&url).unwrap();
        assert_eq!(out, vec![0x1d, 0x76, 0x30, 0x00, 1, 0, 1, 0, 0xff]);
    }

    #[test]
    fn transparent_pixels_print_white() {
        let img = ImageBuffer::from_pixel(8, 1, Rgba([0u8, 0, 0, 0]));
        let raster = LogoRasterizer::default()
            .rasterize(&DynamicImage::ImageRgba8(img))
            .unwrap();
        assert_eq!(raster.bits, vec![0]);
    }

    #[test]
    fn threshold_is_inclusive_for_black() {
        let r = LogoRasterizer::new(384, 190);
        let dark = ImageBuffer::from_pixel(1, 1, Rgba([190u8, 190, 190, 255]));
        let light = ImageBuffer::from_pixel(1, 1, Rgba([191u8, 191, 191, 255]));
        assert!(r.rasterize(&DynamicImage::ImageRgba8(dark)).unwrap().is_black(0, 0));
        assert!(!r.rasterize(&DynamicImage::ImageRgba8(light)).unwrap().is_black(0, 0));
    }

    #[test]
    fn wide_logo_is_scaled_to_max_width() {
        let img = ImageBuffer::from_pixel(800, 100, Rgba([0u8, 0, 0, 255]));
        let raster = LogoRasterizer::default()
            .rasterize(&DynamicImage::ImageRgba8(img))
            .unwrap();
        assert_eq!(raster.width, 384);
        assert_eq!(raster.height, 48);
        assert!(raster.is_black(200, 20));
    }

    #[test]
    fn garbage_is_rejected() {
        let r = LogoRasterizer::default();
        assert!(matches!(r.convert_base64("%%%"), Err(RasterError::Base64(_))));
        let not_image = STANDARD.encode(b"hello world");
        assert!(matches!(r.convert_base64(&not_image), Err(RasterError::Image(_))));
    }

    #[test]
    fn too_tall_raster_is_rejected() {
        let raster = Raster {
            width: 8,
            height: 70_000,
            bits: Vec::new(),
        };
        assert!(matches!(raster.encode_gs_v0(), Err(RasterError::TooTall(70_000))));
    }

    proptest! {
        #[test]
        fn raster_geometry(w in 1u32..64, h in 1u32..16, shade in any::<u8>()) {
            let img = ImageBuffer::from_pixel(w, h, Rgba([shade, shade, shade, 255]));
            let out = LogoRasterizer::default()
                .rasterize(&DynamicImage::ImageRgba8(img))
                .unwrap()
                .encode_gs_v0()
                .unwrap();
            let wb = (w as usize + 7) / 8;
            prop_assert_eq!(out.len(), 8 + wb * h as usize);
            prop_assert_eq!(u16::from_le_bytes([out[4], out[5]]) as usize, wb);
            prop_assert_eq!(u16::from_le_bytes([out[6], out[7]]) as u32, h);
            // padding bits past the right edge stay white
            if w % 8 != 0 {
                let pad_mask = 0xffu8 >> (w % 8);
                for row in 0..h as usize {
                    prop_assert_eq!(out[8 + row * wb + wb - 1] & pad_mask, 0);
                }
            }
        }
    }
}
