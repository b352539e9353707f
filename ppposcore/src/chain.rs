//! Chained fixed-capacity buffer segments and the counted pool they are
//! drawn from.
//!
//! One logical packet is a [`Chain`] of [`Segment`]s. Segments come from a
//! [`SegmentPool`] with a fixed number of credits; when the pool runs dry,
//! allocation fails and the caller drops the frame in progress. A segment
//! returns its credit when dropped, so releasing a chain is ordinary
//! ownership drop.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};

/// Capacity of one pool segment in octets.
pub const SEGMENT_CAPACITY: usize = 128;

/// The segment pool is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

struct PoolInner {
    free: AtomicUsize,
}

/// Cloneable handle to a fixed stock of segments.
#[derive(Clone)]
pub struct SegmentPool {
    inner: Arc<PoolInner>,
}

impl SegmentPool {
    pub fn new(segments: usize) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                free: AtomicUsize::new(segments),
            }),
        }
    }

    /// Take one segment, or `None` when the pool is exhausted.
    pub fn alloc(&self) -> Option<Segment> {
        self.inner
            .free
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()?;
        Some(Segment {
            buf: Box::new([0; SEGMENT_CAPACITY]),
            off: 0,
            len: 0,
            pool: self.inner.clone(),
        })
    }

    /// Segments currently available.
    pub fn free(&self) -> usize {
        self.inner.free.load(Ordering::Acquire)
    }
}

/// One fixed-capacity buffer drawn from a [`SegmentPool`].
pub struct Segment {
    buf: Box<[u8; SEGMENT_CAPACITY]>,
    off: u16,
    len: u16,
    pool: Arc<PoolInner>,
}

impl Segment {
    /// Octets stored, excluding reserved headroom.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free octets remaining.
    pub fn room(&self) -> usize {
        SEGMENT_CAPACITY - self.off as usize - self.len as usize
    }

    /// Leading octets reserved ahead of the payload.
    pub fn headroom(&self) -> usize {
        self.off as usize
    }

    /// Reserve `n` leading octets. Only meaningful while the segment is
    /// still empty.
    pub fn reserve(&mut self, n: usize) {
        debug_assert!(self.len == 0 && n <= SEGMENT_CAPACITY);
        self.off = n as u16;
    }

    /// Store one octet. The caller checks [`Segment::room`] first.
    pub fn push(&mut self, c: u8) {
        debug_assert!(self.room() > 0);
        self.buf[self.off as usize + self.len as usize] = c;
        self.len += 1;
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buf[self.off as usize..self.off as usize + self.len as usize]
    }

    fn truncate(&mut self, len: usize) {
        debug_assert!(len <= self.len as usize);
        self.len = len as u16;
    }
}

impl Drop for Segment {
    fn drop(&mut self) {
        self.pool.free.fetch_add(1, Ordering::AcqRel);
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Segment")
            .field("off", &self.off)
            .field("len", &self.len)
            .finish()
    }
}

/// Ordered segments forming one logical packet.
#[derive(Debug, Default)]
pub struct Chain {
    segs: Vec<Segment>,
}

impl Chain {
    pub fn new() -> Self {
        Self { segs: Vec::new() }
    }

    /// Build a chain holding a copy of `data`.
    pub fn from_slice(pool: &SegmentPool, data: &[u8]) -> Result<Self, AllocError> {
        let mut chain = Chain::new();
        for chunk in data.chunks(SEGMENT_CAPACITY) {
            let mut seg = pool.alloc().ok_or(AllocError)?;
            for &c in chunk {
                seg.push(c);
            }
            chain.push_segment(seg);
        }
        Ok(chain)
    }

    /// Append `seg` as the new last segment; its ownership transfers into
    /// the chain.
    pub fn push_segment(&mut self, seg: Segment) {
        self.segs.push(seg);
    }

    /// Total payload length across all segments.
    pub fn total_len(&self) -> usize {
        self.segs.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_len() == 0
    }

    pub fn segments(&self) -> impl Iterator<Item = &Segment> {
        self.segs.iter()
    }

    /// Every payload octet in order.
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.segs.iter().flat_map(|s| s.as_slice().iter().copied())
    }

    /// Drop the trailing `n` octets, releasing segments emptied on the way.
    pub fn trim_trailing(&mut self, mut n: usize) {
        while n > 0 {
            let last_len = match self.segs.last() {
                Some(seg) => seg.len(),
                None => return,
            };
            if last_len > n {
                if let Some(last) = self.segs.last_mut() {
                    last.truncate(last_len - n);
                }
                return;
            }
            n -= last_len;
            self.segs.pop();
        }
    }

    /// Copy every octet into one contiguous vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.total_len());
        for seg in &self.segs {
            out.extend_from_slice(seg.as_slice());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_credits_return_on_drop() {
        let pool = SegmentPool::new(2);
        let a = pool.alloc().unwrap();
        let b = pool.alloc().unwrap();
        assert!(pool.alloc().is_none());
        drop(a);
        assert_eq!(pool.free(), 1);
        let c = pool.alloc().unwrap();
        assert!(pool.alloc().is_none());
        drop((b, c));
        assert_eq!(pool.free(), 2);
    }

    #[test]
    fn chain_drop_releases_all_segments() {
        let pool = SegmentPool::new(4);
        let chain = Chain::from_slice(&pool, &[0xaa; SEGMENT_CAPACITY * 3]).unwrap();
        assert_eq!(pool.free(), 1);
        assert_eq!(chain.total_len(), SEGMENT_CAPACITY * 3);
        drop(chain);
        assert_eq!(pool.free(), 4);
    }

    #[test]
    fn from_slice_fails_when_pool_runs_dry() {
        let pool = SegmentPool::new(1);
        let err = Chain::from_slice(&pool, &[0; SEGMENT_CAPACITY + 1]);
        assert!(err.is_err());
        // the partial chain was released
        assert_eq!(pool.free(), 1);
    }

    #[test]
    fn trim_within_last_segment() {
        let pool = SegmentPool::new(2);
        let mut chain = Chain::from_slice(&pool, &[1, 2, 3, 4, 5]).unwrap();
        chain.trim_trailing(2);
        assert_eq!(chain.to_vec(), [1, 2, 3]);
    }

    #[test]
    fn trim_across_segment_boundary() {
        let pool = SegmentPool::new(3);
        let mut data = vec![0x55u8; SEGMENT_CAPACITY];
        data.push(0xf0);
        let mut chain = Chain::from_slice(&pool, &data).unwrap();
        chain.trim_trailing(2);
        assert_eq!(chain.total_len(), SEGMENT_CAPACITY - 1);
        assert_eq!(pool.free(), 2);
    }

    #[test]
    fn headroom_is_excluded_from_payload() {
        let pool = SegmentPool::new(1);
        let mut seg = pool.alloc().unwrap();
        seg.reserve(14);
        seg.push(0x42);
        assert_eq!(seg.headroom(), 14);
        assert_eq!(seg.as_slice(), [0x42]);
        assert_eq!(seg.room(), SEGMENT_CAPACITY - 15);
    }
}
