//! Guest id generation strategies.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::{GuestId, IdGenerator};

/// Wall-clock id generator: creation millis in hex plus a process-local
/// sequence, so two registrations inside the same millisecond still get
/// distinct ids.
pub struct TimestampIds {
    seq: AtomicU64,
}

impl TimestampIds {
    pub fn new() -> Self {
        Self {
            seq: AtomicU64::new(0),
        }
    }
}

impl Default for TimestampIds {
    fn default() -> Self {
        Self::new()
    }
}

impl IdGenerator for TimestampIds {
    fn next_id(&self, now: SystemTime) -> GuestId {
        let ms = now
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_millis() as u64;
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        // Non-empty by construction; if this fails (shouldn't), fall back to
        // a safe minimal id
        GuestId::new(format!("{:x}-{:04x}", ms, n & 0xffff))
            .unwrap_or_else(|_| GuestId::new("0-0").expect("'0-0' is valid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_instant_yields_distinct_ids() {
        let ids = TimestampIds::new();
        let now = UNIX_EPOCH + Duration::from_millis(1_700_000_000_000);
        let a = ids.next_id(now);
        let b = ids.next_id(now);
        assert_ne!(a, b);
    }

    #[test]
    fn id_embeds_the_instant() {
        let ids = TimestampIds::new();
        let now = UNIX_EPOCH + Duration::from_millis(0x10);
        assert_eq!(ids.next_id(now).as_str(), "10-0000");
    }
}
