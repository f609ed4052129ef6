//! One-shot commands: RGB file conversion and exp-Golomb field decoding.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::{debug, info};

use framekit_core::{
    BitCursor, BitstreamError, CapturedImage, FrameKitError, PixelFormat, VideoSource,
    VideoSourceConfig,
};

// ── convert ──────────────────────────────────────────────────────

/// Parameters for [`convert_file`].
#[derive(Debug, Clone)]
pub struct ConvertJob {
    /// Layout of the input file.
    pub format: PixelFormat,
    /// Capture size, sampling, overflow mode and ROI.
    pub source: VideoSourceConfig,
}

/// Outcome of a conversion.
#[derive(Debug, Clone)]
pub struct ConvertReport {
    pub bytes_written: usize,
    /// blake3 of the produced ROI planes, hex encoded.
    pub digest: String,
}

/// Convert one packed RGB image file into a raw planar YUV file.
///
/// The image is posted through a single-frame [`VideoSource`], so the
/// configured ROI crops the output the same way it crops live captures.
pub fn convert_file(
    input: &Path,
    output: &Path,
    job: &ConvertJob,
) -> Result<ConvertReport, FrameKitError> {
    if job.format.bytes_per_pixel().is_none() {
        return Err(FrameKitError::Other(format!(
            "{:?} is not an interleaved RGB format",
            job.format
        )));
    }

    let data = std::fs::read(input)?;
    debug!(bytes = data.len(), "read {}", input.display());
    let image = CapturedImage::packed(job.source.width, job.source.height, job.format, data)
        .ok_or_else(|| {
            FrameKitError::Other(format!("row of {} pixels is too wide", job.source.width))
        })?;

    let mut source = VideoSource::new(VideoSourceConfig {
        pool_capacity: 1,
        ..job.source.clone()
    })?;
    let handle = source
        .post_frame(&image)?
        .ok_or_else(|| FrameKitError::Other("no free frame for the capture".into()))?;
    let frame = source
        .frame(handle)
        .ok_or_else(|| FrameKitError::Other("converted frame went missing".into()))?;

    let mut sink = BufWriter::new(File::create(output)?);
    let bytes_written = frame.write_roi_to(&mut sink)?;
    sink.flush()?;

    let digest = frame.digest()?.to_hex().to_string();
    info!(
        bytes_written,
        digest = %digest,
        overflow = ?job.source.overflow,
        "converted {} -> {}",
        input.display(),
        output.display()
    );
    Ok(ConvertReport {
        bytes_written,
        digest,
    })
}

// ── golomb ───────────────────────────────────────────────────────

/// Parse a hex string such as `"a6 42 80"` or `"0xA64280"`.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, FrameKitError> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let digits: Vec<u8> = body
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b'_')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(FrameKitError::Other(format!(
            "odd number of hex digits in {text:?}"
        )));
    }
    digits
        .chunks(2)
        .map(|pair| {
            std::str::from_utf8(pair)
                .ok()
                .and_then(|s| u8::from_str_radix(s, 16).ok())
                .ok_or_else(|| FrameKitError::Other(format!("invalid hex byte in {text:?}")))
        })
        .collect()
}

/// Decode consecutive exp-Golomb fields from `data`.
///
/// With `count` set, exactly that many fields must decode. Without it,
/// decoding stops quietly at the first field the remaining bits cannot
/// hold, which skips trailing byte padding.
pub fn decode_exp_golomb(
    data: &[u8],
    signed: bool,
    count: Option<usize>,
) -> Result<Vec<i64>, FrameKitError> {
    let mut cursor = BitCursor::new(data);
    let mut values = Vec::new();

    while count.is_none_or(|n| values.len() < n) {
        let field = if signed {
            cursor.read_signed_exp_golomb().map(i64::from)
        } else {
            cursor.read_unsigned_exp_golomb().map(i64::from)
        };
        match field {
            Ok(v) => values.push(v),
            Err(BitstreamError::Exhausted { .. }) if count.is_none() => break,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(values)
}
