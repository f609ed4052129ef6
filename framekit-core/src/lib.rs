//! # framekit-core
//!
//! Server-side data plane for streaming rendered frames to a client.
//!
//! This crate contains:
//! - **Bitstream**: `BitCursor` and `BitWriter` for MSB-first fields and
//!   exp-Golomb codes
//! - **Color**: `ColorConverter`, bit-exact fixed-point RGB to YUV 4:2:0 / 4:4:4
//! - **Frame**: `YuvFrame`, planar frames with a region-of-interest view
//! - **Audio**: `RawAudioFrame`, fixed-capacity PCM buffers
//! - **Pool**: `FramePool` / `SharedFramePool`, pre-allocated frame arenas
//!   driven by a `FrameAllocator` policy
//! - **Source**: `VideoSource`, the capture path from a rendered image to a
//!   pooled frame
//! - **Error**: `FrameKitError`, typed, `thiserror`-based error hierarchy

pub mod audio;
pub mod bitstream;
pub mod color;
pub mod error;
pub mod frame;
pub mod pool;
pub mod source;
pub mod types;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use audio::RawAudioFrame;
pub use bitstream::{BitCursor, BitWriter, MAX_READ_BITS};
pub use color::{ChromaOverflow, ColorConverter, PlanesMut, RgbLayout};
pub use error::{BitstreamError, ColorError, FrameError, FrameKitError, PoolError};
pub use frame::{ChromaSampling, Plane, Roi, YuvFrame};
pub use pool::{
    AudioBufferAllocator, FrameAllocator, FrameHandle, FramePool, SharedFramePool,
    YuvFileAllocator, YuvFrameAllocator,
};
pub use source::{VideoSource, VideoSourceConfig};
pub use types::{CapturedImage, PixelFormat};
