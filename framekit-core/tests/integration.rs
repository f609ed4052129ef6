//! Integration tests: file-backed pools, ROI dumps, the capture path and
//! exp-Golomb parsing of real header fields.

use std::fs;
use std::sync::mpsc;

use framekit_core::{
    BitCursor, BitstreamError, CapturedImage, ChromaOverflow, ChromaSampling, ColorConverter,
    FrameError, FramePool, PixelFormat, RgbLayout, SharedFramePool, VideoSource,
    VideoSourceConfig, YuvFileAllocator, YuvFrame, YuvFrameAllocator,
};

// ── Helpers ──────────────────────────────────────────────────────

/// Raw 4:2:0 frame of `width x height` where Y ramps across the row and
/// chroma holds fixed values.
fn ramp_frame_bytes(width: usize, height: usize, u: u8, v: u8) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(width * height * 3 / 2);
    for _ in 0..height {
        bytes.extend((0..width).map(|x| x as u8));
    }
    bytes.extend(std::iter::repeat_n(u, width * height / 4));
    bytes.extend(std::iter::repeat_n(v, width * height / 4));
    bytes
}

// ── Frame files ──────────────────────────────────────────────────

#[test]
fn test_roi_dump_reloads_as_smaller_frame() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("full.yuv");
    fs::write(&source_path, ramp_frame_bytes(16, 8, 90, 240)).unwrap();

    let mut full = YuvFrame::new();
    full.initialize_from_file(&source_path, 16, 8).unwrap();
    full.set_region_of_interest(8, 4, 4, 2).unwrap();

    let dump_path = dir.path().join("roi.yuv");
    let mut file = fs::File::create(&dump_path).unwrap();
    let written = full.write_roi_to(&mut file).unwrap();
    drop(file);
    assert_eq!(written, 8 * 4 * 3 / 2);

    let mut cropped = YuvFrame::new();
    cropped.initialize_from_file(&dump_path, 8, 4).unwrap();
    assert_eq!(cropped.sample(0, 0, 0), Some(4));
    assert_eq!(cropped.sample(0, 7, 3), Some(11));
    assert_eq!(cropped.sample(1, 3, 1), Some(90));
    assert_eq!(cropped.sample(2, 0, 0), Some(240));
    assert_eq!(cropped.digest().unwrap(), full.digest().unwrap());
}

#[test]
fn test_truncated_file_leaves_frame_unallocated() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("short.yuv");
    fs::write(&path, vec![0u8; 16 * 8]).unwrap();

    let mut frame = YuvFrame::new();
    let err = frame.initialize_from_file(&path, 16, 8).unwrap_err();
    assert!(matches!(err, FrameError::ShortRead { plane: 1, line: 0, .. }));
    assert!(!frame.is_initialized());

    let err = frame
        .initialize_from_file(dir.path().join("missing.yuv"), 16, 8)
        .unwrap_err();
    assert!(matches!(err, FrameError::Open { .. }));
}

#[test]
fn test_file_pool_cycles_sequence() {
    let dir = tempfile::tempdir().unwrap();
    for n in 1..=3u8 {
        fs::write(
            dir.path().join(format!("clip_{n}.yuv")),
            ramp_frame_bytes(8, 4, n, n),
        )
        .unwrap();
    }
    let pattern = dir.path().join("clip_%d.yuv").display().to_string();
    let mut pool = FramePool::warm(3, YuvFileAllocator::new(pattern, 8, 4)).unwrap();

    // Deterministic slots replay the sequence in order, twice over.
    for round in 0..6usize {
        let handle = pool.allocate_at(round).unwrap();
        let frame = pool.get(handle).unwrap();
        assert_eq!(frame.sample(1, 0, 0), Some((round % 3) as u8 + 1));
        assert!(pool.deallocate(handle));
    }
    assert_eq!(pool.available(), 3);
}

// ── Capture path ─────────────────────────────────────────────────

#[test]
fn test_capture_matches_direct_conversion() {
    let (width, height) = (8u32, 4u32);
    let data: Vec<u8> = (0..width * height)
        .flat_map(|i| {
            let i = i as u8;
            [i.wrapping_mul(7), i.wrapping_mul(13), i.wrapping_mul(29)]
        })
        .collect();
    let image = CapturedImage::packed(width, height, PixelFormat::Rgb8, data.clone()).unwrap();

    let mut source = VideoSource::new(VideoSourceConfig {
        width,
        height,
        pool_capacity: 2,
        ..Default::default()
    })
    .unwrap();
    let handle = source.post_frame(&image).unwrap().unwrap();

    let mut direct = YuvFrame::new();
    direct.initialize(width, height).unwrap();
    let layout = RgbLayout::packed(PixelFormat::Rgb8, (width * 3) as usize).unwrap();
    ColorConverter::default()
        .convert_into(&data, &layout, &mut direct)
        .unwrap();

    assert_eq!(
        source.frame(handle).unwrap().digest().unwrap(),
        direct.digest().unwrap()
    );
}

#[test]
fn test_saturate_and_wrap_agree_on_8bit_input() {
    let data: Vec<u8> = (0..=255u8).flat_map(|v| [v, 255 - v, v / 2, 0]).collect();
    let layout = RgbLayout::packed(PixelFormat::Rgba8, 16 * 4).unwrap();

    let mut wrapped = YuvFrame::new();
    wrapped.initialize_with(ChromaSampling::Yuv444, 16, 16).unwrap();
    let mut saturated = wrapped.clone();

    ColorConverter::new(ChromaOverflow::Wrap)
        .convert_into(&data, &layout, &mut wrapped)
        .unwrap();
    ColorConverter::new(ChromaOverflow::Saturate)
        .convert_into(&data, &layout, &mut saturated)
        .unwrap();
    assert_eq!(wrapped.digest().unwrap(), saturated.digest().unwrap());
}

#[test]
fn test_shared_pool_producer_consumer() {
    let pool = SharedFramePool::new(
        FramePool::warm(
            2,
            YuvFrameAllocator {
                width: 4,
                height: 4,
                sampling: ChromaSampling::Yuv420,
            },
        )
        .unwrap(),
    );
    let (tx, rx) = mpsc::sync_channel(2);

    let consumer = {
        let pool = pool.clone();
        std::thread::spawn(move || {
            let mut seen = Vec::new();
            for handle in rx {
                seen.push(pool.with_frame(handle, |f| f.timestamp_us()).unwrap());
                assert!(pool.deallocate(handle));
            }
            seen
        })
    };

    let mut sent = 0u64;
    while sent < 20 {
        match pool.allocate() {
            Ok(handle) => {
                pool.with_frame_mut(handle, |f| f.set_timestamp_us(sent))
                    .unwrap();
                tx.send(handle).unwrap();
                sent += 1;
            }
            Err(_) => std::thread::yield_now(),
        }
    }
    drop(tx);

    let seen = consumer.join().unwrap();
    assert_eq!(seen, (0..20).collect::<Vec<_>>());
    assert_eq!(pool.in_use(), 0);
}

// ── Bitstream ────────────────────────────────────────────────────

#[test]
fn test_parse_header_fields() {
    // u(4)=0b1011, ue=3, se=-2, u(1)=1, ue=0
    let data = [0b1011_0010, 0b0001_0111];
    let mut cursor = BitCursor::new(&data);

    assert_eq!(cursor.read_bits(4).unwrap(), 0b1011);
    assert_eq!(cursor.read_unsigned_exp_golomb().unwrap(), 3);
    assert_eq!(cursor.read_signed_exp_golomb().unwrap(), -2);
    assert!(cursor.read_bit().unwrap());
    assert_eq!(cursor.read_unsigned_exp_golomb().unwrap(), 0);
    assert_eq!(cursor.bits_remaining(), 0);

    let err = cursor.read_bits(1).unwrap_err();
    assert_eq!(
        err,
        BitstreamError::Exhausted {
            requested: 1,
            remaining: 0
        }
    );
}
