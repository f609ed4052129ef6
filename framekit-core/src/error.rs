//! Domain-specific error types for the framekit data plane.
//!
//! All fallible operations return `Result<T, FrameKitError>` or one of the
//! typed sub-errors below. No panics on invalid input: every bounds or
//! parity violation is reported as a value the caller can recover from.

use thiserror::Error;

/// The canonical error type for framekit.
#[derive(Debug, Error)]
pub enum FrameKitError {
    // ── Component Errors ─────────────────────────────────────────
    /// A bitstream read was rejected.
    #[error("bitstream error: {0}")]
    Bitstream(#[from] BitstreamError),

    /// An RGB to YUV conversion was rejected before touching any pixel.
    #[error("color conversion error: {0}")]
    Color(#[from] ColorError),

    /// A frame operation violated its allocation or ROI invariants.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The frame pool could not satisfy a request.
    #[error("pool error: {0}")]
    Pool(#[from] PoolError),

    // ── I/O Errors ───────────────────────────────────────────────
    /// A file or sink reported an error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── BitstreamError ───────────────────────────────────────────────

/// Rejected reads from a [`BitCursor`](crate::bitstream::BitCursor).
///
/// The cursor never advances when one of these is returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum BitstreamError {
    /// More than 32 bits were requested in a single read.
    #[error("cannot read {requested} bits at once (max 32)")]
    TooManyBits { requested: u32 },

    /// The buffer holds fewer bits than requested.
    #[error("not enough bits remaining: requested {requested}, remaining {remaining}")]
    Exhausted { requested: u32, remaining: usize },

    /// An exp-Golomb prefix had more leading zeros than a `u32` can carry.
    #[error("exp-Golomb prefix of {leading_zeros} zeros overflows 32 bits")]
    ExpGolombOverflow { leading_zeros: u32 },
}

// ── ColorError ───────────────────────────────────────────────────

/// Rejected RGB to YUV conversions.
///
/// `InvalidDimensions` is a caller mistake about the image shape; the
/// out-of-bounds variants are the faults the pixel loop would have hit.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColorError {
    /// Width or height is unusable for the requested layout.
    #[error("invalid dimensions {width}x{height}: {reason}")]
    InvalidDimensions {
        width: u32,
        height: u32,
        reason: &'static str,
    },

    /// The source buffer is shorter than the layout requires.
    #[error("source buffer too short: need {needed} bytes, have {len}")]
    SourceOutOfBounds { needed: usize, len: usize },

    /// A destination plane is too short or its stride too narrow.
    #[error("plane {plane} too short: need {needed} bytes, have {len}")]
    PlaneOutOfBounds {
        plane: usize,
        needed: usize,
        len: usize,
    },
}

// ── FrameError ───────────────────────────────────────────────────

/// Errors from [`YuvFrame`](crate::frame::YuvFrame) operations.
#[derive(Debug, Error)]
pub enum FrameError {
    /// 4:2:0 frames need even width and height.
    #[error("width and height must be divisible by 2, got {width}x{height}")]
    OddDimensions { width: u32, height: u32 },

    /// The frame has no planes yet.
    #[error("frame is not initialized")]
    NotInitialized,

    /// Plane memory could not be reserved.
    #[error("cannot allocate {bytes} bytes of plane memory")]
    Allocation { bytes: usize },

    /// The requested ROI extends past the allocated frame.
    #[error(
        "ROI {roi_width}x{roi_height}+{roi_x}+{roi_y} extends beyond allocated {width}x{height}"
    )]
    RoiOutOfBounds {
        width: u32,
        height: u32,
        roi_width: u32,
        roi_height: u32,
        roi_x: u32,
        roi_y: u32,
    },

    /// ROI parameters can only be copied between equally sized frames.
    #[error("frames have different dimensions: {ours:?} vs {theirs:?}")]
    DimensionMismatch { ours: (u32, u32), theirs: (u32, u32) },

    /// Loading plane data came up short.
    #[error("short read in plane {plane} at line {line}: {source}")]
    ShortRead {
        plane: usize,
        line: u32,
        #[source]
        source: std::io::Error,
    },

    /// Dumping plane data came up short; `written` bytes made it out.
    #[error("short write after {written} bytes: {source}")]
    ShortWrite {
        written: usize,
        #[source]
        source: std::io::Error,
    },

    /// A frame file could not be opened.
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

// ── PoolError ────────────────────────────────────────────────────

/// Errors from [`FramePool`](crate::pool::FramePool).
#[derive(Debug, Error)]
pub enum PoolError {
    /// Every slot is handed out.
    #[error("pool exhausted: all {capacity} frames in use")]
    Exhausted { capacity: usize },

    /// The deterministic slot asked for is handed out.
    #[error("pool slot {index} is in use")]
    SlotBusy { index: usize },

    /// The pool was created with zero capacity.
    #[error("pool capacity must be > 0")]
    ZeroCapacity,

    /// The allocation policy failed to construct a frame.
    #[error("allocator failed for slot {index}: {source}")]
    Allocation {
        index: usize,
        #[source]
        source: Box<FrameKitError>,
    },
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for FrameKitError {
    fn from(s: String) -> Self {
        FrameKitError::Other(s)
    }
}

impl From<&str> for FrameKitError {
    fn from(s: &str) -> Self {
        FrameKitError::Other(s.to_string())
    }
}
