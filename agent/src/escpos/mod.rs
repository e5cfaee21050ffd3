//! ESC/POS byte sequences and receipt job assembly.

use base64::{
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
    Engine,
};
use tracing::{info, warn};

pub mod raster;

pub use raster::{LogoRasterizer, Raster, RasterError};

/// `ESC p 0 25 250`: pulse drawer pin 2 for 50ms on, 500ms off.
pub const DRAWER_KICK: &[u8] = &[0x1b, 0x70, 0x00, 0x19, 0xfa];
pub const ALIGN_CENTER: &[u8] = &[0x1b, 0x61, 0x01];
pub const ALIGN_LEFT: &[u8] = &[0x1b, 0x61, 0x00];

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Standard-alphabet base64, padding optional, embedded whitespace ignored.
pub fn decode_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    LENIENT.decode(compact)
}

/// A receipt as posted by the point-of-sale front end: pre-rendered
/// printer bytes plus an optional logo printed above them.
#[derive(Debug, Clone)]
pub struct ReceiptJob {
    pub text: Vec<u8>,
    pub logo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledJob {
    pub bytes: Vec<u8>,
    pub logo_printed: bool,
}

impl ReceiptJob {
    /// Drawer kick, then the centered logo if it converts, then the text.
    /// A logo that fails to convert is skipped, the receipt still prints.
    pub fn assemble(&self, rasterizer: &LogoRasterizer) -> AssembledJob {
        let mut bytes = Vec::with_capacity(DRAWER_KICK.len() + self.text.len());
        bytes.extend_from_slice(DRAWER_KICK);

        let mut logo_printed = false;
        if let Some(logo) = self.logo.as_deref().filter(|l| !l.is_empty()) {
            match rasterizer.convert_base64(logo) {
                Ok(raster) => {
                    bytes.extend_from_slice(ALIGN_CENTER);
                    bytes.extend_from_slice(&raster);
                    bytes.extend_from_slice(ALIGN_LEFT);
                    logo_printed = true;
                    info!(raster_bytes = raster.len(), "logo prepared");
                }
                Err(e) => warn!(error = %e, "logo conversion failed, printing without it"),
            }
        }

        bytes.extend_from_slice(&self.text);
        AssembledJob {
            bytes,
            logo_printed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use image::{ImageBuffer, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn logo() -> String {
        let img: RgbaImage = ImageBuffer::from_pixel(16, 2, Rgba([0, 0, 0, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png).unwrap();
        STANDARD.encode(buf.into_inner())
    }

    #[test]
    fn lenient_base64() {
        assert_eq!(decode_base64("SGk=").unwrap(), b"Hi");
        assert_eq!(decode_base64("SGk").unwrap(), b"Hi");
        assert_eq!(decode_base64("SG\r\nk=").unwrap(), b"Hi");
        assert!(decode_base64("S*k=").is_err());
    }

    #[test]
    fn text_only_receipt() {
        let job = ReceiptJob {
            text: b"TOTAL 9.99\n".to_vec(),
            logo: None,
        };
        let out = job.assemble(&LogoRasterizer::default());
        assert!(!out.logo_printed);
        assert_eq!(out.bytes, [DRAWER_KICK, b"TOTAL 9.99\n".as_slice()].concat());
    }

    #[test]
    fn logo_is_centered_then_alignment_reset() {
        let job = ReceiptJob {
            text: b"hello".to_vec(),
            logo: Some(logo()),
        };
        let out = job.assemble(&LogoRasterizer::default());
        assert!(out.logo_printed);
        let raster = [0x1d, 0x76, 0x30, 0x00, 2, 0, 2, 0, 0xff, 0xff, 0xff, 0xff];
        let expected = [
            DRAWER_KICK,
            ALIGN_CENTER,
            raster.as_slice(),
            ALIGN_LEFT,
            b"hello".as_slice(),
        ]
        .concat();
        assert_eq!(out.bytes, expected);
    }

    #[test]
    fn broken_logo_still_prints_receipt() {
        let job = ReceiptJob {
            text: b"receipt".to_vec(),
            logo: Some("data:image/png;base64,bm90IGFuIGltYWdl".into()),
        };
        let out = job.assemble(&LogoRasterizer::default());
        assert!(!out.logo_printed);
        assert!(out.bytes.starts_with(DRAWER_KICK));
        assert!(out.bytes.ends_with(b"receipt"));
        assert_eq!(out.bytes.len(), DRAWER_KICK.len() + 7);
    }
}
