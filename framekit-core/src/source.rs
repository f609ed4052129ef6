//! Capture-side entry point: captured images in, pooled YUV frames out.
//!
//! A renderer hands each finished image to [`VideoSource::post_frame`].
//! The source takes a free frame from its pool, converts the image into
//! the frame's region of interest and returns the handle. When every
//! frame is still held downstream the capture is dropped instead of
//! blocking the renderer.

use tracing::{debug, warn};

use crate::color::{ChromaOverflow, ColorConverter, RgbLayout};
use crate::error::{ColorError, FrameKitError, PoolError};
use crate::frame::{ChromaSampling, Roi, YuvFrame};
use crate::pool::{FrameHandle, FramePool, YuvFrameAllocator};
use crate::types::{CapturedImage, PixelFormat};

// ── VideoSourceConfig ────────────────────────────────────────────

/// Configuration for [`VideoSource`].
#[derive(Debug, Clone)]
pub struct VideoSourceConfig {
    /// Capture width in pixels.
    pub width: u32,
    /// Capture height in pixels.
    pub height: u32,
    pub sampling: ChromaSampling,
    /// Frames kept in the pool.
    pub pool_capacity: usize,
    pub overflow: ChromaOverflow,
    /// Crop applied to every posted frame. `None` keeps the full frame.
    pub roi: Option<Roi>,
}

impl Default for VideoSourceConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            sampling: ChromaSampling::Yuv420,
            pool_capacity: 4,
            overflow: ChromaOverflow::Wrap,
            roi: None,
        }
    }
}

// ── VideoSource ──────────────────────────────────────────────────

/// Converts captured images into pooled [`YuvFrame`]s.
pub struct VideoSource {
    pool: FramePool<YuvFrameAllocator>,
    converter: ColorConverter,
    config: VideoSourceConfig,
    frames_posted: u64,
    frames_dropped: u64,
}

impl VideoSource {
    /// Build the source and allocate every pooled frame.
    pub fn new(config: VideoSourceConfig) -> Result<Self, FrameKitError> {
        let allocator = YuvFrameAllocator {
            width: config.width,
            height: config.height,
            sampling: config.sampling,
        };
        let pool = FramePool::warm(config.pool_capacity, allocator)?;
        Ok(Self {
            pool,
            converter: ColorConverter::new(config.overflow),
            config,
            frames_posted: 0,
            frames_dropped: 0,
        })
    }

    /// Convert `image` into a free pooled frame.
    ///
    /// Returns `Ok(None)` when the pool is exhausted and the capture was
    /// dropped. On a conversion error the frame goes straight back to the
    /// pool.
    pub fn post_frame(
        &mut self,
        image: &CapturedImage,
    ) -> Result<Option<FrameHandle>, FrameKitError> {
        let handle = match self.pool.allocate() {
            Ok(handle) => handle,
            Err(PoolError::Exhausted { .. }) => {
                self.frames_dropped += 1;
                debug!(
                    dropped = self.frames_dropped,
                    "no free frame, dropping capture"
                );
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let result = match self.pool.get_mut(handle) {
            Some(frame) => Self::fill(&self.converter, &self.config, image, frame),
            None => Err(FrameKitError::Other(format!(
                "pool returned unusable handle for slot {}",
                handle.index()
            ))),
        };

        if let Err(e) = result {
            warn!("failed to convert captured frame: {e}");
            self.pool.deallocate(handle);
            return Err(e);
        }

        self.frames_posted += 1;
        Ok(Some(handle))
    }

    /// The frame behind a handle returned by [`post_frame`](Self::post_frame).
    pub fn frame(&self, handle: FrameHandle) -> Option<&YuvFrame> {
        self.pool.get(handle)
    }

    /// Give a consumed frame back to the pool.
    pub fn recycle(&mut self, handle: FrameHandle) -> bool {
        self.pool.deallocate(handle)
    }

    pub fn frames_posted(&self) -> u64 {
        self.frames_posted
    }

    pub fn frames_dropped(&self) -> u64 {
        self.frames_dropped
    }

    pub fn pool(&self) -> &FramePool<YuvFrameAllocator> {
        &self.pool
    }

    pub fn config(&self) -> &VideoSourceConfig {
        &self.config
    }

    fn fill(
        converter: &ColorConverter,
        config: &VideoSourceConfig,
        image: &CapturedImage,
        frame: &mut YuvFrame,
    ) -> Result<(), FrameKitError> {
        if image.width != frame.allocated_width() || image.height != frame.allocated_height() {
            return Err(ColorError::InvalidDimensions {
                width: image.width,
                height: image.height,
                reason: "capture size differs from the pooled frame size",
            }
            .into());
        }

        let roi = config.roi.unwrap_or(Roi {
            x: 0,
            y: 0,
            width: image.width,
            height: image.height,
        });
        frame.set_region_of_interest(roi.width, roi.height, roi.x, roi.y)?;
        frame.set_timestamp_us(image.timestamp_us);

        match image.format {
            // Planar input is copied as whole planes; the ROI only narrows the view.
            PixelFormat::I420 => {
                frame.read_from(&mut image.data.as_slice())?;
            }
            format => {
                let layout = RgbLayout::packed(format, image.stride as usize)
                    .ok_or_else(|| FrameKitError::Other(format!("unsupported format {format:?}")))?;
                let start = roi.y as usize * layout.scanline_stride
                    + roi.x as usize * layout.pixel_stride;
                let src = image.data.get(start..).unwrap_or(&[]);
                converter.convert_into(src, &layout, frame)?;
            }
        }
        Ok(())
    }
}
