//! Planar YUV frames with a region-of-interest view.
//!
//! A [`YuvFrame`] owns three planes (Y, U, V). Consumers never see the
//! full allocation: [`planes`](YuvFrame::planes), [`width`](YuvFrame::width)
//! and [`height`](YuvFrame::height) all describe the current ROI, which is
//! just a set of byte offsets into the owned planes. A 1080p allocation can
//! therefore be streamed as a 720p sub-frame without copying.
//!
//! By default the ROI is the entire frame.
//!
//! # File format
//!
//! Raw, headerless, planar: every Y row, then every U row, then every V
//! row, each row exactly as wide as the plane (stride padding is never
//! written).

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

use tracing::warn;

use crate::color::PlanesMut;
use crate::error::FrameError;

/// Plane order used everywhere: luma, then the two chroma planes.
pub const PLANE_COUNT: usize = 3;

// ── ChromaSampling ───────────────────────────────────────────────

/// Chroma plane resolution relative to luma.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ChromaSampling {
    /// Half width, half height chroma.
    #[default]
    Yuv420,
    /// Full resolution chroma.
    Yuv444,
}

impl ChromaSampling {
    /// Right shift taking a luma coordinate to a chroma coordinate.
    pub const fn shift(self) -> u32 {
        match self {
            ChromaSampling::Yuv420 => 1,
            ChromaSampling::Yuv444 => 0,
        }
    }

    /// Parse `"420"`, `"yuv420"`, `"444"` or `"yuv444"`.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "420" | "yuv420" | "i420" => Some(ChromaSampling::Yuv420),
            "444" | "yuv444" => Some(ChromaSampling::Yuv444),
            _ => None,
        }
    }

    fn plane_shift(self, plane: usize) -> u32 {
        if plane == 0 { 0 } else { self.shift() }
    }
}

// ── Plane ────────────────────────────────────────────────────────

/// One owned sample plane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plane {
    data: Vec<u8>,
    stride: usize,
    width: usize,
    height: usize,
}

impl Plane {
    fn allocate(width: usize, height: usize) -> Result<Self, FrameError> {
        let bytes = width * height;
        let mut data = Vec::new();
        data.try_reserve_exact(bytes)
            .map_err(|_| FrameError::Allocation { bytes })?;
        data.resize(bytes, 0);
        Ok(Self {
            data,
            stride: width,
            width,
            height,
        })
    }

    /// Every byte of the plane, including stride padding.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Bytes between the starts of consecutive rows.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Samples per row.
    pub fn width(&self) -> usize {
        self.width
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.height
    }
}

// ── Roi ──────────────────────────────────────────────────────────

/// Region of interest, in luma pixels of the allocated frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Roi {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

// ── YuvFrame ─────────────────────────────────────────────────────

/// A planar YUV frame whose external view is its region of interest.
#[derive(Debug, Clone, Default)]
pub struct YuvFrame {
    width: u32,
    height: u32,
    sampling: ChromaSampling,
    planes: Option<[Plane; PLANE_COUNT]>,
    roi: Roi,
    /// Byte offset of the ROI origin inside each plane.
    roi_offsets: [usize; PLANE_COUNT],
    timestamp_us: u64,
}

impl YuvFrame {
    /// An unallocated frame.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate 4:2:0 planes: Y is `width x height`, U and V are
    /// `width/2 x height/2`. The ROI becomes the whole frame.
    pub fn initialize(&mut self, width: u32, height: u32) -> Result<(), FrameError> {
        self.initialize_with(ChromaSampling::Yuv420, width, height)
    }

    /// Allocate planes for the given chroma sampling.
    ///
    /// On failure the frame is left unallocated.
    pub fn initialize_with(
        &mut self,
        sampling: ChromaSampling,
        width: u32,
        height: u32,
    ) -> Result<(), FrameError> {
        self.free_planes();

        if sampling == ChromaSampling::Yuv420 && (width % 2 != 0 || height % 2 != 0) {
            warn!(width, height, "height and width must be divisible by 2");
            return Err(FrameError::OddDimensions { width, height });
        }

        let shift = sampling.shift();
        let (w, h) = (width as usize, height as usize);
        let (cw, ch) = (w >> shift, h >> shift);
        let planes = [
            Plane::allocate(w, h)?,
            Plane::allocate(cw, ch)?,
            Plane::allocate(cw, ch)?,
        ];

        self.width = width;
        self.height = height;
        self.sampling = sampling;
        self.planes = Some(planes);
        self.apply_roi(Roi {
            x: 0,
            y: 0,
            width,
            height,
        });
        Ok(())
    }

    /// Allocate 4:2:0 planes and fill them from a raw frame file.
    pub fn initialize_from_file(
        &mut self,
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
    ) -> Result<(), FrameError> {
        self.initialize_from_file_with(ChromaSampling::Yuv420, path, width, height)
    }

    /// Allocate planes and fill them from a raw frame file.
    ///
    /// A missing file or a short read leaves the frame unallocated.
    pub fn initialize_from_file_with(
        &mut self,
        sampling: ChromaSampling,
        path: impl AsRef<Path>,
        width: u32,
        height: u32,
    ) -> Result<(), FrameError> {
        self.initialize_with(sampling, width, height)?;
        if let Err(e) = self.read_from_file(path) {
            self.free_planes();
            return Err(e);
        }
        Ok(())
    }

    /// Reload the allocated planes from a raw frame file of matching size.
    pub fn read_from_file(&mut self, path: impl AsRef<Path>) -> Result<(), FrameError> {
        let path = path.as_ref();
        if self.planes.is_none() {
            warn!("cannot read {}: frame not initialized", path.display());
            return Err(FrameError::NotInitialized);
        }
        let file = File::open(path).map_err(|source| {
            warn!("couldn't open {}: {source}", path.display());
            FrameError::Open {
                path: path.display().to_string(),
                source,
            }
        })?;
        self.read_from(&mut BufReader::new(file))
    }

    /// Fill the allocated planes, Y then U then V, row by row.
    pub fn read_from<R: Read>(&mut self, reader: &mut R) -> Result<(), FrameError> {
        let planes = self.planes.as_mut().ok_or(FrameError::NotInitialized)?;
        for (index, plane) in planes.iter_mut().enumerate() {
            for line in 0..plane.height {
                let start = line * plane.stride;
                reader
                    .read_exact(&mut plane.data[start..start + plane.width])
                    .map_err(|source| {
                        warn!(plane = index, line, "short read: {source}");
                        FrameError::ShortRead {
                            plane: index,
                            line: line as u32,
                            source,
                        }
                    })?;
            }
        }
        Ok(())
    }

    /// Release the planes. The frame returns to the unallocated state.
    pub fn free_planes(&mut self) {
        self.planes = None;
        self.width = 0;
        self.height = 0;
        self.roi = Roi::default();
        self.roi_offsets = [0; PLANE_COUNT];
    }

    /// Whether planes are allocated.
    pub fn is_initialized(&self) -> bool {
        self.planes.is_some()
    }

    // ── Region of interest ───────────────────────────────────────

    /// Restrict the external view to `width x height` at `(x, y)`.
    ///
    /// Fails, leaving the ROI unchanged, if the rectangle does not fit
    /// inside the allocated frame.
    pub fn set_region_of_interest(
        &mut self,
        width: u32,
        height: u32,
        x: u32,
        y: u32,
    ) -> Result<(), FrameError> {
        let fits_x = x.checked_add(width).is_some_and(|right| right <= self.width);
        let fits_y = y.checked_add(height).is_some_and(|bottom| bottom <= self.height);
        if !fits_x || !fits_y {
            warn!(
                allocated_width = self.width,
                allocated_height = self.height,
                x,
                y,
                width,
                height,
                "ROI extends beyond the borders of the allocated frame"
            );
            return Err(FrameError::RoiOutOfBounds {
                width: self.width,
                height: self.height,
                roi_width: width,
                roi_height: height,
                roi_x: x,
                roi_y: y,
            });
        }
        self.apply_roi(Roi {
            x,
            y,
            width,
            height,
        });
        Ok(())
    }

    /// Adopt the ROI of `other`, which must have the same allocated size.
    pub fn copy_region_of_interest_params(&mut self, other: &YuvFrame) -> Result<(), FrameError> {
        if other.width != self.width || other.height != self.height {
            warn!("frames have different dimensions");
            return Err(FrameError::DimensionMismatch {
                ours: (self.width, self.height),
                theirs: (other.width, other.height),
            });
        }
        self.apply_roi(other.roi);
        Ok(())
    }

    /// Widen the ROI back to the whole allocated frame.
    pub fn reset_region_of_interest(&mut self) {
        self.apply_roi(Roi {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        });
    }

    fn apply_roi(&mut self, roi: Roi) {
        self.roi = roi;
        for plane in 0..PLANE_COUNT {
            let shift = self.sampling.plane_shift(plane);
            let stride = self.plane_stride(plane);
            self.roi_offsets[plane] =
                (roi.y >> shift) as usize * stride + (roi.x >> shift) as usize;
        }
    }

    // ── External (ROI) view ──────────────────────────────────────

    /// ROI width in pixels.
    pub fn width(&self) -> u32 {
        self.roi.width
    }

    /// ROI height in pixels.
    pub fn height(&self) -> u32 {
        self.roi.height
    }

    /// The Y, U and V planes starting at the ROI origin, or `None` before
    /// initialization.
    pub fn planes(&self) -> Option<[&[u8]; PLANE_COUNT]> {
        let [y, u, v] = self.planes.as_ref()?;
        let [oy, ou, ov] = self.roi_offsets;
        Some([
            y.data.get(oy..).unwrap_or(&[]),
            u.data.get(ou..).unwrap_or(&[]),
            v.data.get(ov..).unwrap_or(&[]),
        ])
    }

    /// Mutable ROI view, ready to be handed to a
    /// [`ColorConverter`](crate::color::ColorConverter).
    pub fn planes_mut(&mut self) -> Option<PlanesMut<'_>> {
        let [oy, ou, ov] = self.roi_offsets;
        let [y, u, v] = self.planes.as_mut()?;
        let strides = [y.stride, u.stride, v.stride];
        Some(PlanesMut {
            planes: [
                y.data.get_mut(oy..).unwrap_or_default(),
                u.data.get_mut(ou..).unwrap_or_default(),
                v.data.get_mut(ov..).unwrap_or_default(),
            ],
            strides,
        })
    }

    /// Row strides of the Y, U and V planes.
    pub fn strides(&self) -> [usize; PLANE_COUNT] {
        [0, 1, 2].map(|p| self.plane_stride(p))
    }

    /// Samples per row and rows of `plane` inside the ROI.
    pub fn plane_dimensions(&self, plane: usize) -> (usize, usize) {
        let shift = self.sampling.plane_shift(plane);
        (
            (self.roi.width >> shift) as usize,
            (self.roi.height >> shift) as usize,
        )
    }

    /// One ROI row of `plane`, or `None` when out of range.
    pub fn row(&self, plane: usize, y: usize) -> Option<&[u8]> {
        let (cols, rows) = self.plane_dimensions(plane);
        if plane >= PLANE_COUNT || y >= rows {
            return None;
        }
        let owned = &self.planes.as_ref()?[plane];
        let start = self.roi_offsets[plane] + y * owned.stride;
        owned.data.get(start..start + cols)
    }

    /// Mutable ROI row of `plane`.
    pub fn row_mut(&mut self, plane: usize, y: usize) -> Option<&mut [u8]> {
        let (cols, rows) = self.plane_dimensions(plane);
        if plane >= PLANE_COUNT || y >= rows {
            return None;
        }
        let offset = self.roi_offsets[plane];
        let owned = &mut self.planes.as_mut()?[plane];
        let start = offset + y * owned.stride;
        owned.data.get_mut(start..start + cols)
    }

    /// A single ROI sample of `plane` at plane coordinates `(x, y)`.
    pub fn sample(&self, plane: usize, x: usize, y: usize) -> Option<u8> {
        self.row(plane, y)?.get(x).copied()
    }

    /// Set every ROI sample of `plane` to `value`.
    pub fn fill_plane(&mut self, plane: usize, value: u8) {
        let (_, rows) = self.plane_dimensions(plane);
        for y in 0..rows {
            if let Some(row) = self.row_mut(plane, y) {
                row.fill(value);
            }
        }
    }

    // ── Allocation view ──────────────────────────────────────────

    /// Allocated width in pixels.
    pub fn allocated_width(&self) -> u32 {
        self.width
    }

    /// Allocated height in pixels.
    pub fn allocated_height(&self) -> u32 {
        self.height
    }

    /// Current region of interest.
    pub fn region_of_interest(&self) -> Roi {
        self.roi
    }

    /// Chroma sampling of the allocation.
    pub fn sampling(&self) -> ChromaSampling {
        self.sampling
    }

    /// The owned planes, or `None` before initialization.
    pub fn allocated_planes(&self) -> Option<&[Plane; PLANE_COUNT]> {
        self.planes.as_ref()
    }

    /// Presentation timestamp in microseconds.
    pub fn timestamp_us(&self) -> u64 {
        self.timestamp_us
    }

    pub fn set_timestamp_us(&mut self, timestamp_us: u64) {
        self.timestamp_us = timestamp_us;
    }

    // ── Serialization ────────────────────────────────────────────

    /// Dump the allocated planes to `sink`. Returns bytes written.
    pub fn write_to<W: Write>(&self, sink: &mut W) -> Result<usize, FrameError> {
        let full = Roi {
            x: 0,
            y: 0,
            width: self.width,
            height: self.height,
        };
        self.write_region(sink, full, [0; PLANE_COUNT])
    }

    /// Dump only the ROI planes to `sink`. Returns bytes written.
    pub fn write_roi_to<W: Write>(&self, sink: &mut W) -> Result<usize, FrameError> {
        self.write_region(sink, self.roi, self.roi_offsets)
    }

    /// blake3 digest of the ROI in file order.
    ///
    /// Two frames with the same ROI bytes hash equal regardless of stride
    /// or where the ROI sits in the allocation.
    pub fn digest(&self) -> Result<blake3::Hash, FrameError> {
        let mut hasher = blake3::Hasher::new();
        self.write_roi_to(&mut hasher)?;
        Ok(hasher.finalize())
    }

    fn write_region<W: Write>(
        &self,
        sink: &mut W,
        region: Roi,
        offsets: [usize; PLANE_COUNT],
    ) -> Result<usize, FrameError> {
        let planes = self.planes.as_ref().ok_or(FrameError::NotInitialized)?;
        let mut written = 0usize;

        for (index, plane) in planes.iter().enumerate() {
            let shift = self.sampling.plane_shift(index);
            let cols = (region.width >> shift) as usize;
            let rows = (region.height >> shift) as usize;

            for line in 0..rows {
                let start = offsets[index] + line * plane.stride;
                let bytes = plane.data.get(start..start + cols).ok_or_else(|| {
                    FrameError::ShortWrite {
                        written,
                        source: std::io::Error::new(
                            std::io::ErrorKind::InvalidInput,
                            "row outside plane",
                        ),
                    }
                })?;
                sink.write_all(bytes).map_err(|source| {
                    warn!(plane = index, line, written, "short write: {source}");
                    FrameError::ShortWrite { written, source }
                })?;
                written += cols;
            }
        }
        Ok(written)
    }

    fn plane_stride(&self, plane: usize) -> usize {
        match &self.planes {
            Some(planes) => planes[plane].stride,
            None => 0,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
