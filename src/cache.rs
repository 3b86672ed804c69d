use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// djb2: `hash = hash*33 + c`, seeded at 5381 — matches the original's
/// `hash_key` used for both the response cache and the rate-limit table.
pub fn djb2(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 5381;
    for &b in bytes {
        hash = hash.wrapping_mul(33).wrapping_add(b as u64);
    }
    hash
}

/// `"<resolved_path>:<encoding-token>"`, the cache's vary key.
pub fn vary_key(path: &str, encoding: &str) -> String {
    format!("{}:{}", path, encoding)
}

#[derive(Clone)]
struct CacheEntry {
    resolved_path: String,
    vary_key: String,
    etag: String,
    bytes: Arc<[u8]>,
    header_len: usize,
    inserted_at: Instant,
}

#[derive(Default, Clone, Copy, Debug)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

struct Table {
    slots: Vec<Option<CacheEntry>>,
    total_memory_used: usize,
    eviction_cursor: usize,
    last_cleanup: Instant,
    stats: CacheStats,
}

pub struct Cache {
    table: Mutex<Table>,
    capacity: usize,
    max_entry_bytes: usize,
    max_total_bytes: usize,
    ttl: Duration,
    cleanup_interval: Duration,
}

pub struct CacheHit {
    pub bytes: Arc<[u8]>,
    pub header_len: usize,
    pub etag: String,
}

impl Cache {
    pub fn new(
        capacity: usize,
        max_entry_bytes: usize,
        max_total_bytes: usize,
        ttl_secs: u64,
    ) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize(capacity, None);
        Self {
            table: Mutex::new(Table {
                slots,
                total_memory_used: 0,
                eviction_cursor: 0,
                last_cleanup: Instant::now(),
                stats: CacheStats::default(),
            }),
            capacity,
            max_entry_bytes,
            max_total_bytes,
            ttl: Duration::from_secs(ttl_secs),
            cleanup_interval: Duration::from_secs(300),
        }
    }

    fn slot_for(&self, key: &str) -> usize {
        (djb2(key.as_bytes()) as usize) % self.capacity
    }

    pub fn lookup(&self, resolved_path: &str, encoding: &str) -> Option<CacheHit> {
        let key = vary_key(resolved_path, encoding);
        let primary = self.slot_for(&key);
        let mut table = self.table.lock();

        self.cleanup_locked(&mut table);

        if let Some(entry) = &table.slots[primary] {
            if entry_is_fresh(entry, self.ttl) && entry.vary_key == key {
                let hit = CacheHit {
                    bytes: entry.bytes.clone(),
                    header_len: entry.header_len,
                    etag: entry.etag.clone(),
                };
                table.stats.hits += 1;
                return Some(hit);
            }
        }

        // Primary-slot collision fallback: linear scan, since two different
        // vary keys can hash to the same slot.
        for entry in table.slots.iter().flatten() {
            if entry.vary_key == key && entry_is_fresh(entry, self.ttl) {
                let hit = CacheHit {
                    bytes: entry.bytes.clone(),
                    header_len: entry.header_len,
                    etag: entry.etag.clone(),
                };
                table.stats.hits += 1;
                return Some(hit);
            }
        }

        table.stats.misses += 1;
        None
    }

    pub fn insert(&self, resolved_path: &str, encoding: &str, etag: &str, framed_bytes: Vec<u8>) {
        if framed_bytes.len() > self.max_entry_bytes {
            return;
        }
        let key = vary_key(resolved_path, encoding);
        let primary = self.slot_for(&key);
        let len = framed_bytes.len();

        let mut table = self.table.lock();

        if table.total_memory_used + len > self.max_total_bytes {
            self.cleanup_locked(&mut table);
        }
        if table.total_memory_used + len > self.max_total_bytes {
            return;
        }

        let slot_index = match &table.slots[primary] {
            None => primary,
            Some(existing) if existing.vary_key == key => primary,
            Some(_) => {
                // Collision with a different key: evict via the round-robin
                // cursor rather than overwrite the primary slot outright.
                let cursor = table.eviction_cursor;
                table.eviction_cursor = (cursor + 1) % self.capacity;
                cursor
            }
        };

        if let Some(old) = table.slots[slot_index].take() {
            table.total_memory_used -= old.bytes.len();
            table.stats.evictions += 1;
        }

        let header_len = find_header_end(&framed_bytes).unwrap_or(framed_bytes.len());

        table.total_memory_used += len;
        table.slots[slot_index] = Some(CacheEntry {
            resolved_path: resolved_path.to_string(),
            vary_key: key,
            etag: etag.to_string(),
            bytes: Arc::from(framed_bytes.into_boxed_slice()),
            header_len,
            inserted_at: Instant::now(),
        });
        table.stats.insertions += 1;
    }

    pub fn purge_all(&self) {
        let mut table = self.table.lock();
        for slot in table.slots.iter_mut() {
            *slot = None;
        }
        table.total_memory_used = 0;
    }

    pub fn stats(&self) -> CacheStats {
        self.table.lock().stats
    }

    pub fn total_memory_used(&self) -> usize {
        self.table.lock().total_memory_used
    }

    /// Sweeps expired entries at most once per `cleanup_interval`.
    fn cleanup_locked(&self, table: &mut Table) {
        if table.last_cleanup.elapsed() < self.cleanup_interval {
            return;
        }
        table.last_cleanup = Instant::now();
        let ttl = self.ttl;
        for slot in table.slots.iter_mut() {
            if let Some(entry) = slot {
                if !entry_is_fresh(entry, ttl) {
                    table.total_memory_used -= entry.bytes.len();
                    table.stats.evictions += 1;
                    *slot = None;
                }
            }
        }
    }
}

fn entry_is_fresh(entry: &CacheEntry, ttl: Duration) -> bool {
    entry.inserted_at.elapsed() < ttl
}

/// Position right after the blank line terminating a framed response's
/// headers, i.e. where the body begins.
fn find_header_end(framed: &[u8]) -> Option<usize> {
    framed.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cache() -> Cache {
        Cache::new(16, 1024, 4096, 3600)
    }

    #[test]
    fn miss_before_insert() {
        let cache = small_cache();
        assert!(cache.lookup("/a.html", "none").is_none());
    }

    #[test]
    fn hit_after_insert_with_matching_vary_key() {
        let cache = small_cache();
        cache.insert("/a.html", "none", "\"etag-1\"", b"HTTP/1.1 200 OK\r\n\r\nbody".to_vec());
        let hit = cache.lookup("/a.html", "none").unwrap();
        assert_eq!(&*hit.bytes, &b"HTTP/1.1 200 OK\r\n\r\nbody"[..]);
        assert_eq!(hit.etag, "\"etag-1\"");
    }

    #[test]
    fn different_encoding_is_a_different_entry() {
        let cache = small_cache();
        cache.insert("/a.html", "none", "\"e\"", b"plain".to_vec());
        cache.insert("/a.html", "gzip", "\"e\"", b"gzipped".to_vec());
        assert_eq!(&*cache.lookup("/a.html", "none").unwrap().bytes, &b"plain"[..]);
        assert_eq!(&*cache.lookup("/a.html", "gzip").unwrap().bytes, &b"gzipped"[..]);
    }

    #[test]
    fn entry_over_max_size_is_rejected() {
        let cache = small_cache();
        let oversized = vec![0u8; 2048];
        cache.insert("/big.bin", "none", "\"e\"", oversized);
        assert!(cache.lookup("/big.bin", "none").is_none());
    }

    #[test]
    fn total_memory_tracks_insertions() {
        let cache = small_cache();
        cache.insert("/a", "none", "\"e\"", vec![0u8; 100]);
        assert_eq!(cache.total_memory_used(), 100);
        cache.insert("/b", "none", "\"e\"", vec![0u8; 50]);
        assert_eq!(cache.total_memory_used(), 150);
    }

    #[test]
    fn purge_all_clears_memory_accounting() {
        let cache = small_cache();
        cache.insert("/a", "none", "\"e\"", vec![0u8; 100]);
        cache.purge_all();
        assert_eq!(cache.total_memory_used(), 0);
        assert!(cache.lookup("/a", "none").is_none());
    }

    #[test]
    fn djb2_matches_known_vector() {
        // djb2("") == 5381
        assert_eq!(djb2(b""), 5381);
    }
}
