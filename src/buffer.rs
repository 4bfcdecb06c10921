//! Size-bucketed reusable byte buffers for scanner working memory.
//!
//! Grounded on the crate's existing `crossbeam-channel` dependency: each
//! bucket is a bounded channel acting as a free list, so `get`/`put` never
//! block on a global lock the way a single `Mutex<Vec<Vec<u8>>>` would.

use crossbeam_channel::{Receiver, Sender, bounded};

/// A buffer handed out by [`BufferPool::get`]. `Deref`/`DerefMut` to
/// `[u8]`; callers must not retain it past the matching `put`.
pub struct PooledBuffer {
    data: Vec<u8>,
}

impl PooledBuffer {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl std::ops::Deref for PooledBuffer {
    type Target = [u8];
    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl std::ops::DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

struct Bucket {
    capacity: usize,
    tx: Sender<Vec<u8>>,
    rx: Receiver<Vec<u8>>,
}

/// Pool of fixed-capacity buffers bucketed by power-of-two sizes.
/// Bucket `i` holds buffers of capacity `start_size << i`.
pub struct BufferPool {
    buckets: Vec<Bucket>,
    max_bucket: usize,
}

impl BufferPool {
    /// `start_size` is bucket 0's capacity; `bucket_count` buckets are
    /// created, doubling each time. Each bucket can hold up to
    /// `per_bucket_capacity` idle buffers before `put` discards overflow.
    pub fn new(start_size: usize, bucket_count: usize, per_bucket_capacity: usize) -> Self {
        let mut buckets = Vec::with_capacity(bucket_count);
        let mut capacity = start_size.max(1);
        for _ in 0..bucket_count {
            let (tx, rx) = bounded(per_bucket_capacity.max(1));
            buckets.push(Bucket { capacity, tx, rx });
            capacity <<= 1;
        }
        let max_bucket = buckets.last().map(|b| b.capacity).unwrap_or(0);
        Self { buckets, max_bucket }
    }

    /// Sensible default used by the scanner: 4 KiB start, 8 buckets (up to
    /// 512 KiB), 32 idle buffers per bucket.
    pub fn with_defaults() -> Self {
        Self::new(4096, 8, 32)
    }

    fn smallest_bucket_for(&self, n: usize) -> Option<usize> {
        self.buckets.iter().position(|b| b.capacity >= n)
    }

    /// Returns a buffer of length exactly `n`. When `n` fits within the
    /// largest bucket, a reused buffer (or a fresh one of bucket capacity)
    /// is resized down to `n`; otherwise a one-off, unpooled allocation is
    /// returned.
    pub fn get(&self, n: usize) -> PooledBuffer {
        if n > self.max_bucket {
            return PooledBuffer { data: vec![0u8; n] };
        }
        let idx = self
            .smallest_bucket_for(n)
            .expect("n <= max_bucket implies some bucket fits");
        let bucket = &self.buckets[idx];
        let mut data = bucket.rx.try_recv().unwrap_or_else(|_| vec![0u8; bucket.capacity]);
        data.resize(n, 0);
        PooledBuffer { data }
    }

    /// Returns a buffer to its bucket iff its capacity exactly equals some
    /// bucket's capacity. Buffers of any other capacity are discarded.
    pub fn put(&self, mut buffer: PooledBuffer) {
        let cap = buffer.data.capacity();
        if let Some(bucket) = self.buckets.iter().find(|b| b.capacity == cap) {
            buffer.data.clear();
            buffer.data.resize(bucket.capacity, 0);
            let _ = bucket.tx.try_send(buffer.data);
        }
        // capacity matches no bucket (or pool is full): drop silently.
    }

    pub fn max_bucket(&self) -> usize {
        self.max_bucket
    }
}

impl Default for BufferPool {
    fn default() -> Self {
        Self::with_defaults()
    }
}
