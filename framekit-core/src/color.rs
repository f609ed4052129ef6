//! Fixed-point RGB to YUV conversion.
//!
//! Integer approximation of the BT.601 matrix, scaled by 256:
//!
//! ```text
//! |  66  129   25 |   | R |               |  16 |
//! | -38  -74  112 | X | G | X (1 / 256) + | 128 |
//! | 112  -94  -18 |   | B |               | 128 |
//! ```
//!
//! The chroma rows are applied in their half-scaled form
//! (`-19 -37 56` / `56 -47 -9`) with one less bit of shift. For 4:2:0 each
//! chroma cell is built in two half-steps: the even row stores the
//! contribution of a horizontal pixel pair (`>> 9`, `+ 64`), the odd row
//! adds its own pair on top.
//!
//! Output is bit-exact with the reference converter in
//! [`ChromaOverflow::Wrap`] mode: results are truncated to 8 bits with no
//! clamping. A client needs the matching inverse transform to preserve
//! color fidelity.

use crate::error::{ColorError, FrameError, FrameKitError};
use crate::frame::{ChromaSampling, YuvFrame};
use crate::types::PixelFormat;

// ── RgbLayout ────────────────────────────────────────────────────

/// Where the components of each source pixel live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbLayout {
    /// Byte offset of red inside a pixel.
    pub r_offset: usize,
    /// Byte offset of green inside a pixel.
    pub g_offset: usize,
    /// Byte offset of blue inside a pixel.
    pub b_offset: usize,
    /// Bytes from one pixel to the next.
    pub pixel_stride: usize,
    /// Bytes from one row to the next.
    pub scanline_stride: usize,
}

impl RgbLayout {
    /// Layout of an interleaved capture with rows `scanline_stride` bytes
    /// apart. `None` for planar formats.
    pub fn packed(format: PixelFormat, scanline_stride: usize) -> Option<Self> {
        let (r_offset, g_offset, b_offset) = format.rgb_offsets()?;
        Some(Self {
            r_offset,
            g_offset,
            b_offset,
            pixel_stride: format.bytes_per_pixel()?,
            scanline_stride,
        })
    }

    /// Bytes the source must hold to cover `width` x `height` pixels, or
    /// `None` if that does not fit in `usize`.
    fn required_len(&self, width: usize, height: usize) -> Option<usize> {
        if width == 0 || height == 0 {
            return Some(0);
        }
        let last_component = self.r_offset.max(self.g_offset).max(self.b_offset);
        (height - 1)
            .checked_mul(self.scanline_stride)?
            .checked_add((width - 1).checked_mul(self.pixel_stride)?)?
            .checked_add(last_component)?
            .checked_add(1)
    }

    #[inline]
    fn rgb_at(&self, src: &[u8], pixel: usize) -> (i32, i32, i32) {
        (
            i32::from(src[pixel + self.r_offset]),
            i32::from(src[pixel + self.g_offset]),
            i32::from(src[pixel + self.b_offset]),
        )
    }
}

// ── PlanesMut ────────────────────────────────────────────────────

/// Three mutable destination planes (Y, U, V) and their row strides.
#[derive(Debug)]
pub struct PlanesMut<'a> {
    pub planes: [&'a mut [u8]; 3],
    pub strides: [usize; 3],
}

impl<'a> PlanesMut<'a> {
    /// Tightly packed planes: luma rows `width` bytes apart, chroma rows
    /// `chroma_width` apart.
    pub fn packed(
        y: &'a mut [u8],
        u: &'a mut [u8],
        v: &'a mut [u8],
        width: usize,
        chroma_width: usize,
    ) -> Self {
        Self {
            planes: [y, u, v],
            strides: [width, chroma_width, chroma_width],
        }
    }

    fn check(&self, plane: usize, cols: usize, rows: usize) -> Result<(), ColorError> {
        if cols == 0 || rows == 0 {
            return Ok(());
        }
        let stride = self.strides[plane];
        let len = self.planes[plane].len();
        if stride < cols {
            return Err(ColorError::PlaneOutOfBounds {
                plane,
                needed: cols.saturating_mul(rows),
                len,
            });
        }
        let needed = (rows - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(cols))
            .unwrap_or(usize::MAX);
        if needed > len {
            return Err(ColorError::PlaneOutOfBounds { plane, needed, len });
        }
        Ok(())
    }
}

// ── ChromaOverflow ───────────────────────────────────────────────

/// How out-of-range results are narrowed to 8-bit samples.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChromaOverflow {
    /// Truncate to the low 8 bits; 4:2:0 accumulation wraps. Matches the
    /// reference output byte for byte.
    #[default]
    Wrap,
    /// Clamp every value to `0..=255`; 4:2:0 accumulation saturates.
    Saturate,
}

// ── Fixed-point kernels ──────────────────────────────────────────

#[inline]
fn luma(r: i32, g: i32, b: i32) -> i32 {
    ((66 * r + 129 * g + 25 * b) >> 8) + 16
}

#[inline]
fn chroma_u(r: i32, g: i32, b: i32, shift: u32, bias: i32) -> i32 {
    ((-19 * r - 37 * g + 56 * b) >> shift) + bias
}

#[inline]
fn chroma_v(r: i32, g: i32, b: i32, shift: u32, bias: i32) -> i32 {
    ((56 * r - 47 * g - 9 * b) >> shift) + bias
}

// ── ColorConverter ───────────────────────────────────────────────

/// Converts interleaved RGB buffers into planar YUV.
///
/// Every index the pixel loop will touch is validated first, so a
/// conversion either completes or fails without writing anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorConverter {
    overflow: ChromaOverflow,
}

impl ColorConverter {
    /// Create a converter with the given overflow behavior.
    pub fn new(overflow: ChromaOverflow) -> Self {
        Self { overflow }
    }

    /// Current overflow behavior.
    pub fn overflow(&self) -> ChromaOverflow {
        self.overflow
    }

    /// Convert to 4:2:0: full-size Y, half-width half-height U and V.
    ///
    /// `width` and `height` must both be even.
    pub fn to_yuv420(
        &self,
        src: &[u8],
        layout: &RgbLayout,
        width: u32,
        height: u32,
        dst: &mut PlanesMut<'_>,
    ) -> Result<(), ColorError> {
        if width % 2 != 0 || height % 2 != 0 {
            return Err(ColorError::InvalidDimensions {
                width,
                height,
                reason: "4:2:0 needs even width and height",
            });
        }

        let w = width as usize;
        let h = height as usize;
        Self::check_source(src, layout, w, h)?;
        dst.check(0, w, h)?;
        dst.check(1, w / 2, h / 2)?;
        dst.check(2, w / 2, h / 2)?;

        let half_width = w / 2;
        let [y_plane, u_plane, v_plane] = &mut dst.planes;
        let [y_stride, u_stride, v_stride] = dst.strides;

        for row in 0..h {
            let src_row = row * layout.scanline_stride;
            let y_row = row * y_stride;
            let u_row = (row >> 1) * u_stride;
            let v_row = (row >> 1) * v_stride;
            let accumulate = row % 2 == 1;

            for pair in 0..half_width {
                let first = src_row + 2 * pair * layout.pixel_stride;
                let (r1, g1, b1) = layout.rgb_at(src, first);
                let (r2, g2, b2) = layout.rgb_at(src, first + layout.pixel_stride);

                y_plane[y_row + 2 * pair] = self.narrow(luma(r1, g1, b1));
                y_plane[y_row + 2 * pair + 1] = self.narrow(luma(r2, g2, b2));

                let (rs, gs, bs) = (r1 + r2, g1 + g2, b1 + b2);
                let u = chroma_u(rs, gs, bs, 9, 64);
                let v = chroma_v(rs, gs, bs, 9, 64);

                let u_cell = &mut u_plane[u_row + pair];
                let v_cell = &mut v_plane[v_row + pair];
                if accumulate {
                    *u_cell = self.accumulate(*u_cell, u);
                    *v_cell = self.accumulate(*v_cell, v);
                } else {
                    *u_cell = self.narrow(u);
                    *v_cell = self.narrow(v);
                }
            }
        }
        Ok(())
    }

    /// Convert to 4:4:4: one Y, U and V sample per pixel.
    pub fn to_yuv444(
        &self,
        src: &[u8],
        layout: &RgbLayout,
        width: u32,
        height: u32,
        dst: &mut PlanesMut<'_>,
    ) -> Result<(), ColorError> {
        let w = width as usize;
        let h = height as usize;
        Self::check_source(src, layout, w, h)?;
        for plane in 0..3 {
            dst.check(plane, w, h)?;
        }

        let [y_plane, u_plane, v_plane] = &mut dst.planes;
        let [y_stride, u_stride, v_stride] = dst.strides;

        for row in 0..h {
            let src_row = row * layout.scanline_stride;
            for col in 0..w {
                let (r, g, b) = layout.rgb_at(src, src_row + col * layout.pixel_stride);
                y_plane[row * y_stride + col] = self.narrow(luma(r, g, b));
                u_plane[row * u_stride + col] = self.narrow(chroma_u(r, g, b, 7, 128));
                v_plane[row * v_stride + col] = self.narrow(chroma_v(r, g, b, 7, 128));
            }
        }
        Ok(())
    }

    /// Convert into the region of interest of `frame`, choosing the
    /// layout from the frame's chroma sampling.
    pub fn convert_into(
        &self,
        src: &[u8],
        layout: &RgbLayout,
        frame: &mut YuvFrame,
    ) -> Result<(), FrameKitError> {
        let width = frame.width();
        let height = frame.height();
        let sampling = frame.sampling();
        let mut planes = frame.planes_mut().ok_or(FrameError::NotInitialized)?;
        match sampling {
            ChromaSampling::Yuv420 => self.to_yuv420(src, layout, width, height, &mut planes)?,
            ChromaSampling::Yuv444 => self.to_yuv444(src, layout, width, height, &mut planes)?,
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────

    fn check_source(
        src: &[u8],
        layout: &RgbLayout,
        width: usize,
        height: usize,
    ) -> Result<(), ColorError> {
        let needed = layout.required_len(width, height).unwrap_or(usize::MAX);
        if needed > src.len() {
            return Err(ColorError::SourceOutOfBounds {
                needed,
                len: src.len(),
            });
        }
        Ok(())
    }

    #[inline]
    fn narrow(&self, value: i32) -> u8 {
        match self.overflow {
            ChromaOverflow::Wrap => value as u8,
            ChromaOverflow::Saturate => value.clamp(0, 255) as u8,
        }
    }

    #[inline]
    fn accumulate(&self, cell: u8, value: i32) -> u8 {
        match self.overflow {
            ChromaOverflow::Wrap => cell.wrapping_add(value as u8),
            ChromaOverflow::Saturate => cell.saturating_add(value.clamp(0, 255) as u8),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
