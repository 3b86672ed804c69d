use parking_lot::Mutex;

pub const BUFFER_SIZE: usize = 8 * 1024;

/// Fixed slab of reusable read buffers. `acquire`/`release` are O(1); the
/// pool never grows past its initial capacity, so exhaustion is a signal to
/// the caller to reject the connection rather than allocate more memory,
/// mirroring the original's `mempool_init`/`mempool_acquire`.
pub struct BufferPool {
    free: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    pub fn new(capacity: usize) -> Self {
        let mut free = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            free.push(vec![0u8; BUFFER_SIZE]);
        }
        Self {
            free: Mutex::new(free),
        }
    }

    pub fn acquire(&self) -> Option<Vec<u8>> {
        self.free.lock().pop()
    }

    pub fn release(&self, mut buffer: Vec<u8>) {
        buffer.clear();
        buffer.resize(BUFFER_SIZE, 0);
        let mut free = self.free.lock();
        // The pool never grows: a buffer released after the slab shrank
        // (shouldn't happen in practice) is simply dropped.
        if free.len() < free.capacity() {
            free.push(buffer);
        }
    }

    pub fn available(&self) -> usize {
        self.free.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_round_trip() {
        let pool = BufferPool::new(2);
        assert_eq!(pool.available(), 2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        pool.release(a);
        assert_eq!(pool.available(), 1);
        pool.release(b);
        assert_eq!(pool.available(), 2);
    }

    #[test]
    fn buffers_are_fixed_size() {
        let pool = BufferPool::new(1);
        let buf = pool.acquire().unwrap();
        assert_eq!(buf.len(), BUFFER_SIZE);
    }
}
