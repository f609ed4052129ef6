//! Configuration for the feeder.

use std::path::Path;

use serde::{Deserialize, Serialize};

use framekit_core::{
    ChromaOverflow, ChromaSampling, Roi, VideoSourceConfig, YuvFileAllocator,
};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeederConfig {
    /// Frame source settings.
    pub video: VideoConfig,
    /// Audio buffer pool settings.
    pub audio: AudioConfig,
    /// RGB to YUV conversion settings.
    pub color: ColorConfig,
    /// Frame dump settings.
    pub output: OutputConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Frame source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    /// Raw YUV file pattern; `%d` is replaced by the frame number.
    pub source_pattern: String,
    /// Number substituted for the first pooled frame.
    pub start_index: usize,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Chroma sampling: "420" or "444".
    pub sampling: String,
    /// Frames kept in the pool (the length of the looped sequence).
    pub pool_size: usize,
    /// Target frames per second.
    pub fps: u32,
    /// Region of interest. A zero width or height selects the full frame.
    pub roi_width: u32,
    pub roi_height: u32,
    pub roi_x: u32,
    pub roi_y: u32,
}

/// Audio buffer pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Cycle an audio pool alongside the video frames.
    pub enabled: bool,
    /// Bytes per audio buffer.
    pub buffer_size: usize,
    /// Buffers kept in the pool.
    pub pool_size: usize,
}

/// RGB to YUV conversion settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorConfig {
    /// Clamp chroma instead of wrapping it.
    pub saturate: bool,
}

/// Frame dump settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// File receiving raw ROI frames. Empty disables dumping.
    pub path: String,
    /// Dump one frame out of every `dump_every`.
    pub dump_every: u32,
    /// Log a blake3 digest of every frame at debug level.
    pub digest: bool,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs to stderr.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            source_pattern: "frames/frame_%d.yuv".into(),
            start_index: 1,
            width: 1280,
            height: 720,
            sampling: "420".into(),
            pool_size: 4,
            fps: 30,
            roi_width: 0,
            roi_height: 0,
            roi_x: 0,
            roi_y: 0,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // 20 ms of 48 kHz stereo s16
            buffer_size: 3840,
            pool_size: 8,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            dump_every: 1,
            digest: false,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl FeederConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let text = toml::to_string_pretty(&Self::default()).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Chroma sampling named in `[video]`, 4:2:0 when unrecognised.
    pub fn sampling(&self) -> ChromaSampling {
        ChromaSampling::from_name(&self.video.sampling).unwrap_or_else(|| {
            tracing::warn!(
                "unknown chroma sampling {:?}; using 420",
                self.video.sampling
            );
            ChromaSampling::Yuv420
        })
    }

    /// Overflow mode selected by `[color]`.
    pub fn overflow(&self) -> ChromaOverflow {
        if self.color.saturate {
            ChromaOverflow::Saturate
        } else {
            ChromaOverflow::Wrap
        }
    }

    /// Configured ROI, or `None` for the full frame.
    pub fn roi(&self) -> Option<Roi> {
        let v = &self.video;
        if v.roi_width == 0 || v.roi_height == 0 {
            return None;
        }
        Some(Roi {
            x: v.roi_x,
            y: v.roi_y,
            width: v.roi_width,
            height: v.roi_height,
        })
    }

    /// Target fps clamped to a usable range.
    pub fn fps(&self) -> u32 {
        self.video.fps.clamp(1, 240)
    }

    /// Allocator for the file-backed frame pool.
    pub fn to_file_allocator(&self) -> YuvFileAllocator {
        YuvFileAllocator {
            pattern: self.video.source_pattern.clone(),
            width: self.video.width,
            height: self.video.height,
            sampling: self.sampling(),
            start_index: self.video.start_index,
        }
    }

    /// Convert video settings into a `VideoSourceConfig`.
    pub fn to_source_config(&self) -> VideoSourceConfig {
        VideoSourceConfig {
            width: self.video.width,
            height: self.video.height,
            sampling: self.sampling(),
            pool_capacity: self.video.pool_size.max(1),
            overflow: self.overflow(),
            roi: self.roi(),
        }
    }

    /// Source settings for converting a single `width` x `height` capture.
    ///
    /// Sampling, ROI and `[color]` come from the file; a `sampling` given
    /// here replaces the configured one and `saturate` forces
    /// [`ChromaOverflow::Saturate`].
    pub fn to_convert_config(
        &self,
        width: u32,
        height: u32,
        sampling: Option<ChromaSampling>,
        saturate: bool,
    ) -> VideoSourceConfig {
        let mut source = self.to_source_config();
        source.width = width;
        source.height = height;
        source.pool_capacity = 1;
        if let Some(sampling) = sampling {
            source.sampling = sampling;
        }
        if saturate {
            source.overflow = ChromaOverflow::Saturate;
        }
        source
    }
}

// ── Tests ────────────────────────────────────────────────────────
