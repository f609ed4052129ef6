//! Shared types for the capture side of the pipeline.
//!
//! A [`CapturedImage`] is what a renderer or screen grabber hands to
//! [`VideoSource::post_frame`](crate::source::VideoSource::post_frame)
//! before it is turned into a planar [`YuvFrame`](crate::frame::YuvFrame).

// ── PixelFormat ──────────────────────────────────────────────────

/// Pixel layout of a captured image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// 4 bytes per pixel: Blue, Green, Red, Alpha (DXGI default).
    Bgra8,
    /// 4 bytes per pixel: Red, Green, Blue, Alpha.
    Rgba8,
    /// 3 bytes per pixel: Blue, Green, Red.
    Bgr8,
    /// 3 bytes per pixel: Red, Green, Blue.
    Rgb8,
    /// Already planar 4:2:0: full Y plane, then quarter-size U and V.
    I420,
}

impl PixelFormat {
    /// Bytes consumed by a single pixel for interleaved formats.
    ///
    /// `None` for planar formats.
    pub const fn bytes_per_pixel(self) -> Option<usize> {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Rgba8 => Some(4),
            PixelFormat::Bgr8 | PixelFormat::Rgb8 => Some(3),
            PixelFormat::I420 => None,
        }
    }

    /// Byte offsets of the R, G and B components inside one pixel.
    pub const fn rgb_offsets(self) -> Option<(usize, usize, usize)> {
        match self {
            PixelFormat::Bgra8 | PixelFormat::Bgr8 => Some((2, 1, 0)),
            PixelFormat::Rgba8 | PixelFormat::Rgb8 => Some((0, 1, 2)),
            PixelFormat::I420 => None,
        }
    }

    /// Parse the short names used on the command line and in config files.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "bgra" | "bgra8" => Some(PixelFormat::Bgra8),
            "rgba" | "rgba8" => Some(PixelFormat::Rgba8),
            "bgr" | "bgr8" => Some(PixelFormat::Bgr8),
            "rgb" | "rgb8" => Some(PixelFormat::Rgb8),
            "i420" | "yuv420" => Some(PixelFormat::I420),
            _ => None,
        }
    }
}

// ── CapturedImage ────────────────────────────────────────────────

/// A raw, uncompressed image obtained from a renderer or capture API.
///
/// For interleaved formats `data` holds `height` rows of `stride` bytes
/// each; `stride` may exceed `width * bpp` when the producer pads rows.
/// For [`PixelFormat::I420`] `data` holds the three tightly packed planes
/// back to back and `stride` is the luma row length.
#[derive(Debug, Clone)]
pub struct CapturedImage {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Row pitch in **bytes**.
    pub stride: u32,
    /// Pixel layout.
    pub format: PixelFormat,
    /// Raw pixel data.
    pub data: Vec<u8>,
    /// Capture timestamp in microseconds.
    pub timestamp_us: u64,
}

impl CapturedImage {
    /// Build a tightly packed image (no row padding).
    ///
    /// `None` if a row of `width` pixels does not fit in a `u32` stride.
    pub fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>) -> Option<Self> {
        let stride = match format.bytes_per_pixel() {
            Some(bpp) => width.checked_mul(u32::try_from(bpp).ok()?)?,
            None => width,
        };
        Some(Self {
            width,
            height,
            stride,
            format,
            data,
            timestamp_us: 0,
        })
    }

    /// Total bytes the image is expected to occupy.
    pub fn byte_len(&self) -> usize {
        let w = self.width as usize;
        let h = self.height as usize;
        match self.format {
            PixelFormat::I420 => w * h + 2 * (w / 2) * (h / 2),
            _ => self.stride as usize * h,
        }
    }
}
