//! Raw V4L2 buffer conversion to packed RGB8.

use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum ConvertError {
    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPG decode failed: {0}")]
    Decode(String),
    #[error("MJPG frame is {actual:?}, expected {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

/// Pixel formats we can turn into RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed, 2 bytes/pixel.
    Yuyv,
    /// Motion-JPEG, one JPEG per buffer.
    Mjpg,
    /// 8-bit grayscale.
    Grey,
}

impl PixelFormat {
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Option<Self> {
        match fourcc {
            b"YUYV" => Some(Self::Yuyv),
            b"MJPG" => Some(Self::Mjpg),
            b"GREY" => Some(Self::Grey),
            _ => None,
        }
    }

    pub fn to_rgb(self, buf: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
        match self {
            Self::Yuyv => yuyv_to_rgb(buf, width, height),
            Self::Mjpg => mjpg_to_rgb(buf, width, height),
            Self::Grey => grey_to_rgb(buf, width, height),
        }
    }
}

fn check_len(buf: &[u8], expected: usize) -> Result<(), ConvertError> {
    if buf.len() < expected {
        return Err(ConvertError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// BT.601 limited-range YCbCr to RGB.
fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> [u8; 3] {
    let c = (y as i32 - 16) * 298;
    let d = cb as i32 - 128;
    let e = cr as i32 - 128;
    let clamp = |v: i32| ((v + 128) >> 8).clamp(0, 255) as u8;
    [
        clamp(c + 409 * e),
        clamp(c - 100 * d - 208 * e),
        clamp(c + 516 * d),
    ]
}

/// Convert packed YUYV (4:2:2) to RGB.
///
/// Each 4-byte group `[Y0, U, Y1, V]` yields two pixels sharing chroma.
pub fn yuyv_to_rgb(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
    let pixels = (width * height) as usize;
    check_len(yuyv, pixels * 2)?;
    let mut rgb = Vec::with_capacity(pixels * 3);
    for group in yuyv[..pixels * 2].chunks_exact(4) {
        let (y0, u, y1, v) = (group[0], group[1], group[2], group[3]);
        rgb.extend_from_slice(&ycbcr_to_rgb(y0, u, v));
        rgb.extend_from_slice(&ycbcr_to_rgb(y1, u, v));
    }
    Ok(rgb)
}

pub fn grey_to_rgb(grey: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
    let pixels = (width * height) as usize;
    check_len(grey, pixels)?;
    Ok(grey[..pixels].iter().flat_map(|&p| [p, p, p]).collect())
}

pub fn mjpg_to_rgb(jpeg: &[u8], width: u32, height: u32) -> Result<Vec<u8>, ConvertError> {
    let decoded = image::load_from_memory_with_format(jpeg, image::ImageFormat::Jpeg)
        .map_err(|e| ConvertError::Decode(e.to_string()))?
        .to_rgb8();
    if decoded.dimensions() != (width, height) {
        return Err(ConvertError::SizeMismatch {
            expected: (width, height),
            actual: decoded.dimensions(),
        });
    }
    Ok(decoded.into_raw())
}

/// True if more than `threshold_pct` of the pixels are near black.
///
/// Webcams often deliver a few dark frames right after streaming starts.
pub fn is_dark_frame(rgb: &[u8], threshold_pct: f32) -> bool {
    if rgb.len() < 3 {
        return true;
    }
    let pixels = rgb.len() / 3;
    let dark = rgb
        .chunks_exact(3)
        .filter(|p| (p[0] as u16 + p[1] as u16 + p[2] as u16) < 96)
        .count();
    (dark as f32 / pixels as f32) > threshold_pct
}
