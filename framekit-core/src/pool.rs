//! Fixed-capacity frame pools.
//!
//! A [`FramePool`] is an arena of slots. Each slot owns at most one frame,
//! built by a [`FrameAllocator`] the first time the slot is needed (or up
//! front with [`FramePool::warm`]). Frames are never freed while the pool
//! lives: handing a frame back only marks its slot free again, so the
//! capture path never allocates once the pool is warm.
//!
//! Callers hold a [`FrameHandle`], a slot index plus a generation. Every
//! deallocation bumps the slot's generation, which turns any copy of the
//! old handle into a harmless stale value: `get` returns `None` and a
//! second `deallocate` is a no-op.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::audio::RawAudioFrame;
use crate::error::{FrameKitError, PoolError};
use crate::frame::{ChromaSampling, YuvFrame};

// ── FrameAllocator ───────────────────────────────────────────────

/// Construction policy for pooled frames.
pub trait FrameAllocator {
    type Frame;

    /// Build the frame for slot `index`.
    fn allocate(&self, index: usize) -> Result<Self::Frame, FrameKitError>;

    /// Prepare a frame that has just been handed back.
    fn recycle(&self, _frame: &mut Self::Frame) {}
}

/// Fixed-size [`RawAudioFrame`] buffers.
#[derive(Debug, Clone, Copy)]
pub struct AudioBufferAllocator {
    pub size_in_bytes: usize,
}

impl FrameAllocator for AudioBufferAllocator {
    type Frame = RawAudioFrame;

    fn allocate(&self, _index: usize) -> Result<RawAudioFrame, FrameKitError> {
        Ok(RawAudioFrame::new(self.size_in_bytes))
    }

    fn recycle(&self, frame: &mut RawAudioFrame) {
        frame.reset();
    }
}

/// Blank [`YuvFrame`]s of one size and sampling.
#[derive(Debug, Clone, Copy)]
pub struct YuvFrameAllocator {
    pub width: u32,
    pub height: u32,
    pub sampling: ChromaSampling,
}

impl FrameAllocator for YuvFrameAllocator {
    type Frame = YuvFrame;

    fn allocate(&self, _index: usize) -> Result<YuvFrame, FrameKitError> {
        let mut frame = YuvFrame::new();
        frame.initialize_with(self.sampling, self.width, self.height)?;
        Ok(frame)
    }

    fn recycle(&self, frame: &mut YuvFrame) {
        frame.reset_region_of_interest();
        frame.set_timestamp_us(0);
    }
}

/// [`YuvFrame`]s loaded from a numbered file sequence.
///
/// `%d` in `pattern` is replaced with `start_index + slot`, so
/// `"clip_%d.yuv"` with the default start index loads `clip_1.yuv`,
/// `clip_2.yuv`, and so on.
#[derive(Debug, Clone)]
pub struct YuvFileAllocator {
    pub pattern: String,
    pub width: u32,
    pub height: u32,
    pub sampling: ChromaSampling,
    pub start_index: usize,
}

impl YuvFileAllocator {
    pub fn new(pattern: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            pattern: pattern.into(),
            width,
            height,
            sampling: ChromaSampling::Yuv420,
            start_index: 1,
        }
    }

    /// File backing slot `index`.
    pub fn path_for(&self, index: usize) -> PathBuf {
        PathBuf::from(
            self.pattern
                .replace("%d", &(self.start_index + index).to_string()),
        )
    }
}

impl FrameAllocator for YuvFileAllocator {
    type Frame = YuvFrame;

    fn allocate(&self, index: usize) -> Result<YuvFrame, FrameKitError> {
        let path = self.path_for(index);
        let mut frame = YuvFrame::new();
        frame.initialize_from_file_with(self.sampling, &path, self.width, self.height)?;
        debug!(slot = index, path = %path.display(), "loaded pooled frame");
        Ok(frame)
    }

    fn recycle(&self, frame: &mut YuvFrame) {
        frame.reset_region_of_interest();
        frame.set_timestamp_us(0);
    }
}

// ── FrameHandle ──────────────────────────────────────────────────

/// Ticket for a frame checked out of a [`FramePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle {
    index: u32,
    generation: u32,
}

impl FrameHandle {
    /// Slot index inside the pool.
    pub fn index(&self) -> usize {
        self.index as usize
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

// ── FramePool ────────────────────────────────────────────────────

struct Slot<F> {
    frame: Option<F>,
    generation: u32,
    in_use: bool,
    /// Position in the free list while the slot is free.
    free_pos: usize,
}

/// Fixed-capacity arena of reusable frames.
pub struct FramePool<A: FrameAllocator> {
    allocator: A,
    slots: Vec<Slot<A::Frame>>,
    free: Vec<u32>,
}

impl<A: FrameAllocator> FramePool<A> {
    /// Create a pool whose frames are built on first use.
    pub fn new(capacity: usize, allocator: A) -> Result<Self, PoolError> {
        if capacity == 0 {
            return Err(PoolError::ZeroCapacity);
        }
        let slots = (0..capacity)
            .map(|i| Slot {
                frame: None,
                generation: 0,
                in_use: false,
                free_pos: capacity - 1 - i,
            })
            .collect();
        // Reversed so that `allocate` hands out slot 0 first.
        let free = (0..capacity as u32).rev().collect();
        Ok(Self {
            allocator,
            slots,
            free,
        })
    }

    /// Create a pool and build every frame immediately.
    pub fn warm(capacity: usize, allocator: A) -> Result<Self, PoolError> {
        let mut pool = Self::new(capacity, allocator)?;
        for index in 0..capacity {
            pool.construct(index)?;
        }
        debug!(capacity, "frame pool warmed");
        Ok(pool)
    }

    /// Check out any free frame. O(1).
    pub fn allocate(&mut self) -> Result<FrameHandle, PoolError> {
        let Some(&index) = self.free.last() else {
            debug!(capacity = self.capacity(), "frame pool exhausted");
            return Err(PoolError::Exhausted {
                capacity: self.capacity(),
            });
        };
        self.checkout(index as usize)
    }

    /// Check out the frame in slot `index % capacity`.
    pub fn allocate_at(&mut self, index: usize) -> Result<FrameHandle, PoolError> {
        let index = index % self.capacity();
        if self.slots[index].in_use {
            debug!(slot = index, "requested pool slot is busy");
            return Err(PoolError::SlotBusy { index });
        }
        self.checkout(index)
    }

    /// Hand a frame back. Returns `false` for stale or repeated handles.
    pub fn deallocate(&mut self, handle: FrameHandle) -> bool {
        let Some(slot) = self.slots.get_mut(handle.index()) else {
            return false;
        };
        if !slot.in_use || slot.generation != handle.generation {
            debug!(slot = handle.index, "ignoring stale frame handle");
            return false;
        }
        if let Some(frame) = slot.frame.as_mut() {
            self.allocator.recycle(frame);
        }
        slot.in_use = false;
        slot.generation = slot.generation.wrapping_add(1);
        slot.free_pos = self.free.len();
        self.free.push(handle.index);
        true
    }

    /// The frame behind a live handle.
    pub fn get(&self, handle: FrameHandle) -> Option<&A::Frame> {
        let slot = self.live_slot(handle)?;
        slot.frame.as_ref()
    }

    pub fn get_mut(&mut self, handle: FrameHandle) -> Option<&mut A::Frame> {
        let slot = self.slots.get_mut(handle.index())?;
        if !slot.in_use || slot.generation != handle.generation {
            return None;
        }
        slot.frame.as_mut()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Frames that can still be checked out.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    pub fn in_use(&self) -> usize {
        self.capacity() - self.available()
    }

    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    fn live_slot(&self, handle: FrameHandle) -> Option<&Slot<A::Frame>> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.in_use && slot.generation == handle.generation)
    }

    fn construct(&mut self, index: usize) -> Result<(), PoolError> {
        if self.slots[index].frame.is_none() {
            let frame = self
                .allocator
                .allocate(index)
                .map_err(|e| PoolError::Allocation {
                    index,
                    source: Box::new(e),
                })?;
            self.slots[index].frame = Some(frame);
        }
        Ok(())
    }

    /// Remove a free slot from the free list and mark it in use.
    fn checkout(&mut self, index: usize) -> Result<FrameHandle, PoolError> {
        self.construct(index)?;

        let pos = self.slots[index].free_pos;
        self.free.swap_remove(pos);
        if let Some(&moved) = self.free.get(pos) {
            self.slots[moved as usize].free_pos = pos;
        }

        let slot = &mut self.slots[index];
        slot.in_use = true;
        Ok(FrameHandle {
            index: index as u32,
            generation: slot.generation,
        })
    }
}

impl<A: FrameAllocator + fmt::Debug> fmt::Debug for FramePool<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FramePool")
            .field("allocator", &self.allocator)
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}

// ── SharedFramePool ──────────────────────────────────────────────

/// A [`FramePool`] behind one mutex, for producers and consumers on
/// different threads.
pub struct SharedFramePool<A: FrameAllocator> {
    inner: Arc<Mutex<FramePool<A>>>,
}

impl<A: FrameAllocator> SharedFramePool<A> {
    pub fn new(pool: FramePool<A>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(pool)),
        }
    }

    pub fn allocate(&self) -> Result<FrameHandle, PoolError> {
        self.inner.lock().allocate()
    }

    pub fn allocate_at(&self, index: usize) -> Result<FrameHandle, PoolError> {
        self.inner.lock().allocate_at(index)
    }

    pub fn deallocate(&self, handle: FrameHandle) -> bool {
        self.inner.lock().deallocate(handle)
    }

    /// Run `f` on the frame behind `handle` while holding the lock.
    pub fn with_frame<R>(&self, handle: FrameHandle, f: impl FnOnce(&A::Frame) -> R) -> Option<R> {
        let pool = self.inner.lock();
        pool.get(handle).map(f)
    }

    pub fn with_frame_mut<R>(
        &self,
        handle: FrameHandle,
        f: impl FnOnce(&mut A::Frame) -> R,
    ) -> Option<R> {
        let mut pool = self.inner.lock();
        pool.get_mut(handle).map(f)
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().capacity()
    }

    pub fn available(&self) -> usize {
        self.inner.lock().available()
    }

    pub fn in_use(&self) -> usize {
        self.inner.lock().in_use()
    }
}

impl<A: FrameAllocator> Clone for SharedFramePool<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::collections::HashSet;
    use std::io::Write;

    use super::*;
    use crate::frame::Roi;

    /// Counts constructions; every frame is its slot index.
    #[derive(Debug, Default)]
    struct CountingAllocator {
        built: Cell<usize>,
    }

    impl FrameAllocator for CountingAllocator {
        type Frame = usize;

        fn allocate(&self, index: usize) -> Result<usize, FrameKitError> {
            self.built.set(self.built.get() + 1);
            Ok(index)
        }
    }

    fn audio_pool(capacity: usize) -> FramePool<AudioBufferAllocator> {
        FramePool::new(capacity, AudioBufferAllocator { size_in_bytes: 64 }).unwrap()
    }

    #[test]
    fn capacity_four_hands_out_four_distinct_frames() {
        let mut pool = audio_pool(4);
        let handles: Vec<_> = (0..4).map(|_| pool.allocate().unwrap()).collect();
        let distinct: HashSet<_> = handles.iter().map(FrameHandle::index).collect();
        assert_eq!(distinct.len(), 4);
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.in_use(), 4);

        let err = pool.allocate().unwrap_err();
        assert!(matches!(err, PoolError::Exhausted { capacity: 4 }));
    }

    #[test]
    fn deallocate_then_reuse() {
        let mut pool = audio_pool(1);
        let first = pool.allocate().unwrap();
        pool.get_mut(first).unwrap().fill(&[1, 2, 3]);
        assert!(pool.deallocate(first));

        let second = pool.allocate().unwrap();
        assert_eq!(second.index(), first.index());
        assert_ne!(second, first);
        // recycled by the audio allocator
        assert_eq!(pool.get(second).unwrap().data_size(), 0);
        assert_eq!(pool.get(second).unwrap().buffer_size(), 64);
    }

    #[test]
    fn double_deallocate_is_a_noop() {
        let mut pool = audio_pool(2);
        let handle = pool.allocate().unwrap();
        assert!(pool.deallocate(handle));
        assert!(!pool.deallocate(handle));
        assert_eq!(pool.available(), 2);

        // a stale handle must not release the slot's new owner
        let fresh = pool.allocate_at(handle.index()).unwrap();
        assert!(!pool.deallocate(handle));
        assert!(pool.get(handle).is_none());
        assert!(pool.get(fresh).is_some());
        assert_eq!(pool.in_use(), 1);
    }

    #[test]
    fn allocate_at_is_deterministic() {
        let mut pool = audio_pool(3);
        let h = pool.allocate_at(7).unwrap();
        assert_eq!(h.index(), 1);

        let err = pool.allocate_at(1).unwrap_err();
        assert!(matches!(err, PoolError::SlotBusy { index: 1 }));

        // the remaining free slots are still reachable through allocate
        let a = pool.allocate().unwrap();
        let b = pool.allocate().unwrap();
        let mut got = vec![a.index(), b.index()];
        got.sort_unstable();
        assert_eq!(got, vec![0, 2]);
        assert!(pool.allocate().is_err());
    }

    #[test]
    fn new_is_lazy_and_warm_is_eager() {
        let lazy = FramePool::new(3, CountingAllocator::default()).unwrap();
        assert_eq!(lazy.allocator().built.get(), 0);

        let mut lazy = lazy;
        let h = lazy.allocate().unwrap();
        assert_eq!(*lazy.get(h).unwrap(), 0);
        assert_eq!(lazy.allocator().built.get(), 1);
        lazy.deallocate(h);
        lazy.allocate().unwrap();
        assert_eq!(lazy.allocator().built.get(), 1);

        let warm = FramePool::warm(3, CountingAllocator::default()).unwrap();
        assert_eq!(warm.allocator().built.get(), 3);
    }

    #[test]
    fn zero_capacity_rejected() {
        let err = FramePool::new(0, CountingAllocator::default()).unwrap_err();
        assert!(matches!(err, PoolError::ZeroCapacity));
    }

    #[test]
    fn failed_construction_keeps_slot_free() {
        let allocator = YuvFrameAllocator {
            width: 3,
            height: 2,
            sampling: ChromaSampling::Yuv420,
        };
        let mut pool = FramePool::new(2, allocator).unwrap();
        let err = pool.allocate().unwrap_err();
        assert!(matches!(err, PoolError::Allocation { index: 0, .. }));
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn file_allocator_loads_numbered_sequence() {
        let dir = tempfile::tempdir().unwrap();
        for (n, value) in [(1usize, 10u8), (2, 20)] {
            let mut file = std::fs::File::create(dir.path().join(format!("seq_{n}.yuv"))).unwrap();
            file.write_all(&[value; 4 * 2 + 2 * 2]).unwrap();
        }
        let pattern = dir.path().join("seq_%d.yuv").display().to_string();
        let allocator = YuvFileAllocator::new(pattern, 4, 2);
        assert!(allocator.path_for(0).ends_with("seq_1.yuv"));

        let mut pool = FramePool::warm(2, allocator).unwrap();
        let first = pool.allocate_at(0).unwrap();
        let second = pool.allocate_at(1).unwrap();
        assert_eq!(pool.get(first).unwrap().sample(0, 3, 1), Some(10));
        assert_eq!(pool.get(second).unwrap().sample(2, 1, 0), Some(20));
    }

    #[test]
    fn recycled_frame_returns_with_full_roi() {
        let allocator = YuvFrameAllocator {
            width: 4,
            height: 4,
            sampling: ChromaSampling::Yuv420,
        };
        let mut pool = FramePool::warm(1, allocator).unwrap();
        let first = pool.allocate().unwrap();
        let frame = pool.get_mut(first).unwrap();
        frame.set_region_of_interest(2, 2, 2, 2).unwrap();
        frame.set_timestamp_us(40);
        assert!(pool.deallocate(first));

        let second = pool.allocate().unwrap();
        let frame = pool.get(second).unwrap();
        assert_eq!((frame.width(), frame.height()), (4, 4));
        assert_eq!(
            frame.region_of_interest(),
            Roi {
                x: 0,
                y: 0,
                width: 4,
                height: 4
            }
        );
        assert_eq!(frame.timestamp_us(), 0);
    }

    #[test]
    fn file_allocator_missing_file_fails_warm() {
        let dir = tempfile::tempdir().unwrap();
        let pattern = dir.path().join("none_%d.yuv").display().to_string();
        let err = FramePool::warm(1, YuvFileAllocator::new(pattern, 4, 2)).unwrap_err();
        assert!(matches!(err, PoolError::Allocation { index: 0, .. }));
    }

    #[test]
    fn shared_pool_across_threads() {
        let pool = SharedFramePool::new(
            FramePool::warm(
                4,
                YuvFrameAllocator {
                    width: 4,
                    height: 4,
                    sampling: ChromaSampling::Yuv420,
                },
            )
            .unwrap(),
        );

        std::thread::scope(|s| {
            for worker in 0..4u8 {
                let pool = pool.clone();
                s.spawn(move || {
                    for _ in 0..50 {
                        let Ok(handle) = pool.allocate() else {
                            continue;
                        };
                        pool.with_frame_mut(handle, |frame| frame.fill_plane(0, worker))
                            .unwrap();
                        assert_eq!(
                            pool.with_frame(handle, |frame| frame.sample(0, 0, 0)),
                            Some(Some(worker))
                        );
                        assert!(pool.deallocate(handle));
                    }
                });
            }
        });

        assert_eq!(pool.available(), pool.capacity());
        assert_eq!(pool.in_use(), 0);
    }
}
