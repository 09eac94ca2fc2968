//! Store Entry Module
//!
//! A single stored value together with its optional expiry deadline.

use std::time::{SystemTime, UNIX_EPOCH};

// == Store Entry ==
/// Represents a single key's value and expiry metadata.
#[derive(Debug, Clone)]
pub struct StoreEntry {
    /// The stored value
    pub value: String,
    /// Expiration timestamp (Unix milliseconds), None = no expiration
    pub expires_at: Option<u64>,
}

impl StoreEntry {
    // == Constructor ==
    /// Creates an entry that expires `ttl_seconds` from now, or never when `None`.
    pub fn new(value: String, ttl_seconds: Option<u64>) -> Self {
        Self {
            value,
            expires_at: ttl_seconds.map(deadline_after),
        }
    }

    // == Is Expired ==
    /// An entry is expired once the current time reaches its deadline.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(current_timestamp_ms())
    }

    /// Expiry check against an explicit clock reading.
    fn is_expired_at(&self, now_ms: u64) -> bool {
        matches!(self.expires_at, Some(expires) if now_ms >= expires)
    }

    // == Expire ==
    /// Replaces the deadline with one `ttl_seconds` from now.
    pub fn expire_in(&mut self, ttl_seconds: u64) {
        self.expires_at = Some(deadline_after(ttl_seconds));
    }

    // == Time To Live ==
    /// Remaining lifetime in whole seconds, rounded up so a fresh `EX 3` reports 3.
    ///
    /// Returns `None` when the entry never expires.
    pub fn ttl_remaining_secs(&self) -> Option<u64> {
        self.expires_at.map(|expires| {
            let remaining_ms = expires.saturating_sub(current_timestamp_ms());
            remaining_ms.div_ceil(1000)
        })
    }
}

fn deadline_after(ttl_seconds: u64) -> u64 {
    current_timestamp_ms().saturating_add(ttl_seconds.saturating_mul(1000))
}

// == Utility Functions ==
/// Returns current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;
    use std::time::Duration;

    #[test]
    fn test_entry_without_ttl_never_expires() {
        let entry = StoreEntry::new("v".to_string(), None);
        assert!(entry.expires_at.is_none());
        assert!(!entry.is_expired());
        assert!(entry.ttl_remaining_secs().is_none());
    }

    #[test]
    fn test_entry_expiration() {
        let entry = StoreEntry::new("v".to_string(), Some(1));
        assert!(!entry.is_expired());

        sleep(Duration::from_millis(1100));

        assert!(entry.is_expired());
        assert_eq!(entry.ttl_remaining_secs(), Some(0));
    }

    #[test]
    fn test_ttl_rounds_up() {
        let entry = StoreEntry::new("v".to_string(), Some(3));
        assert_eq!(entry.ttl_remaining_secs(), Some(3));
    }

    #[test]
    fn test_expire_in_replaces_deadline() {
        let mut entry = StoreEntry::new("v".to_string(), None);
        entry.expire_in(10);
        let remaining = entry.ttl_remaining_secs().unwrap();
        assert!((9..=10).contains(&remaining));
    }

    #[test]
    fn test_expiration_boundary_condition() {
        let now = current_timestamp_ms();
        let entry = StoreEntry {
            value: "v".to_string(),
            expires_at: Some(now),
        };
        assert!(entry.is_expired_at(now));
        assert!(!entry.is_expired_at(now - 1));
    }
}
