//! Feeder service core logic.
//!
//! Plays a numbered YUV file sequence through a warm frame pool at a
//! fixed frame rate, the way a hosted application would hand rendered
//! frames to the streaming server. Every tick checks out the next frame,
//! stamps it, applies the configured ROI, optionally dumps it, and hands
//! it back.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use framekit_core::{AudioBufferAllocator, FrameKitError, FramePool};

use crate::config::FeederConfig;

/// Counters reported when the loop ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeederStats {
    /// Video frames cycled through the pool.
    pub frames: u64,
    /// Frames written to the dump file.
    pub frames_dumped: u64,
    /// Bytes written to the dump file.
    pub bytes_written: u64,
    /// Audio buffers cycled through the audio pool.
    pub audio_blocks: u64,
}

// ── FeederService ────────────────────────────────────────────────

/// The top-level feeder service.
pub struct FeederService {
    config: FeederConfig,
    running: Arc<AtomicBool>,
}

impl FeederService {
    /// Create a new feeder with the given config.
    pub fn new(config: FeederConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that can be used to stop the loop from another
    /// task (the Ctrl-C handler).
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    /// Run the playback loop until stopped or `max_frames` have played.
    ///
    /// Pool warm-up reads every source file before the first tick, so a
    /// missing or truncated file fails here rather than mid-stream.
    pub async fn run(&self, max_frames: Option<u64>) -> Result<FeederStats, FrameKitError> {
        self.running.store(true, Ordering::SeqCst);
        let result = self.play(max_frames).await;
        self.running.store(false, Ordering::SeqCst);
        info!("feeder stopped");
        result
    }

    /// Signal the loop to stop.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    // ── Internal ─────────────────────────────────────────────────

    async fn play(&self, max_frames: Option<u64>) -> Result<FeederStats, FrameKitError> {
        let capacity = self.config.video.pool_size.max(1);
        let mut pool = FramePool::warm(capacity, self.config.to_file_allocator())?;
        info!(
            frames = capacity,
            width = self.config.video.width,
            height = self.config.video.height,
            "frame pool loaded from {}",
            self.config.video.source_pattern
        );

        let mut audio = if self.config.audio.enabled {
            Some(FramePool::warm(
                self.config.audio.pool_size.max(1),
                AudioBufferAllocator {
                    size_in_bytes: self.config.audio.buffer_size,
                },
            )?)
        } else {
            None
        };

        let mut dump = match self.config.output.path.as_str() {
            "" => None,
            path => {
                info!("dumping ROI frames to {path}");
                Some(BufWriter::new(File::create(path)?))
            }
        };

        let roi = self.config.roi();
        let dump_every = u64::from(self.config.output.dump_every.max(1));
        let interval = Duration::from_secs_f64(1.0 / f64::from(self.config.fps()));
        let frame_us = interval.as_micros() as u64;
        let mut stats = FeederStats::default();

        while self.running.load(Ordering::SeqCst) {
            if max_frames.is_some_and(|n| stats.frames >= n) {
                break;
            }
            let tick = Instant::now();
            let timestamp_us = stats.frames * frame_us;

            let handle = pool.allocate_at(stats.frames as usize)?;
            let frame = pool
                .get_mut(handle)
                .ok_or_else(|| FrameKitError::Other("pool lost a checked-out frame".into()))?;
            frame.set_timestamp_us(timestamp_us);
            if let Some(roi) = roi {
                frame.set_region_of_interest(roi.width, roi.height, roi.x, roi.y)?;
            }

            if self.config.output.digest {
                debug!(frame = stats.frames, digest = %frame.digest()?.to_hex(), "frame digest");
            }
            if let Some(sink) = dump.as_mut() {
                if stats.frames % dump_every == 0 {
                    stats.bytes_written += frame.write_roi_to(sink)? as u64;
                    stats.frames_dumped += 1;
                }
            }
            pool.deallocate(handle);

            if let Some(audio) = audio.as_mut() {
                Self::feed_audio(audio, timestamp_us)?;
                stats.audio_blocks += 1;
            }

            stats.frames += 1;
            Self::pace(tick, interval).await;
        }

        if let Some(mut sink) = dump {
            sink.flush()?;
        }
        info!(
            frames = stats.frames,
            dumped = stats.frames_dumped,
            bytes = stats.bytes_written,
            "playback finished"
        );
        Ok(stats)
    }

    /// Cycle one silent audio block through the audio pool.
    fn feed_audio(
        pool: &mut FramePool<AudioBufferAllocator>,
        timestamp_us: u64,
    ) -> Result<(), FrameKitError> {
        let handle = pool.allocate()?;
        if let Some(block) = pool.get_mut(handle) {
            block.buffer_mut().fill(0);
            let size = block.buffer_size();
            block.set_data_size(size);
            block.set_timestamp_us(timestamp_us);
        }
        pool.deallocate(handle);
        Ok(())
    }

    /// Sleep for the remainder of the frame interval.
    async fn pace(tick: Instant, interval: Duration) {
        let elapsed = tick.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
