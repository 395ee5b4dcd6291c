//! In-flight request registry
//!
//! Maps fingerprints to the cancel handle of the request currently holding
//! that slot. Registration cancels and replaces any predecessor inside one
//! critical section, so a superseded request can never outlive its
//! replacement in the map.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tollgate_domain::constants::SUPERSEDED_REASON;
use tollgate_domain::{DedupConfig, RequestDescriptor};
use tracing::debug;

use crate::cancel::CancelHandle;
use crate::fingerprint::Fingerprint;

/// Identifies one registration so a late settle cannot evict a successor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket(u64);

#[derive(Debug)]
struct InFlightEntry {
    handle: CancelHandle,
    ticket: Ticket,
    created_at: Instant,
}

/// Registry of outstanding requests keyed by fingerprint
#[derive(Debug, Default)]
pub struct InFlightRegistry {
    entries: Mutex<HashMap<Fingerprint, InFlightEntry>>,
    next_ticket: AtomicU64,
    allow_duplicate_patterns: Vec<String>,
}

impl InFlightRegistry {
    pub fn new(allow_duplicate_patterns: Vec<String>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            next_ticket: AtomicU64::new(1),
            allow_duplicate_patterns,
        }
    }

    pub fn from_config(config: &DedupConfig) -> Self {
        Self::new(config.allow_duplicate_patterns.clone())
    }

    /// True when `request` skips the registry entirely (explicit flag or an
    /// allow-listed URL substring).
    pub fn is_duplicate_allowed(&self, request: &RequestDescriptor) -> bool {
        request.options.allow_duplicate
            || self
                .allow_duplicate_patterns
                .iter()
                .any(|pattern| !pattern.is_empty() && request.url.contains(pattern.as_str()))
    }

    pub fn has(&self, fingerprint: &Fingerprint) -> bool {
        self.entries.lock().contains_key(fingerprint)
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<CancelHandle> {
        self.entries.lock().get(fingerprint).map(|entry| entry.handle.clone())
    }

    /// Store `handle` under `fingerprint`, cancelling and removing whatever
    /// held the slot before.
    pub fn register(&self, fingerprint: Fingerprint, handle: CancelHandle) -> Ticket {
        let ticket = Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed));
        let mut entries = self.entries.lock();

        if let Some(previous) = entries.remove(&fingerprint) {
            debug!(
                fingerprint = %fingerprint,
                age_ms = previous.created_at.elapsed().as_millis() as u64,
                "cancelling superseded request"
            );
            previous.handle.cancel(SUPERSEDED_REASON);
        }

        entries.insert(fingerprint, InFlightEntry { handle, ticket, created_at: Instant::now() });
        ticket
    }

    /// Remove the entry for `fingerprint` unconditionally.
    pub fn evict(&self, fingerprint: &Fingerprint) -> Option<CancelHandle> {
        self.entries.lock().remove(fingerprint).map(|entry| entry.handle)
    }

    /// Remove the entry only if it still belongs to `ticket`.
    ///
    /// Returns `false` when the slot was already taken over by a newer
    /// request, in which case the registry is left untouched.
    pub fn release(&self, fingerprint: &Fingerprint, ticket: Ticket) -> bool {
        let mut entries = self.entries.lock();
        match entries.get(fingerprint) {
            Some(entry) if entry.ticket == ticket => {
                entries.remove(fingerprint);
                true
            }
            _ => false,
        }
    }

    /// How long the current holder of `fingerprint` has been outstanding.
    pub fn age(&self, fingerprint: &Fingerprint) -> Option<Duration> {
        self.entries.lock().get(fingerprint).map(|entry| entry.created_at.elapsed())
    }

    /// Cancel and drop every outstanding request. Returns how many were
    /// cancelled.
    pub fn cancel_all(&self, reason: &str) -> usize {
        let drained: Vec<InFlightEntry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        for entry in &drained {
            entry.handle.cancel(reason);
        }
        drained.len()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use tollgate_domain::HttpMethod;

    use super::*;
    use crate::fingerprint::RequestFingerprinter;

    fn key(url: &str) -> Fingerprint {
        RequestFingerprinter::fingerprint(HttpMethod::Get, url, None, None)
    }

    #[test]
    fn test_register_cancels_predecessor() {
        let registry = InFlightRegistry::default();
        let first = CancelHandle::new();
        let second = CancelHandle::new();

        registry.register(key("/items"), first.clone());
        registry.register(key("/items"), second.clone());

        assert!(first.is_cancelled());
        assert_eq!(first.reason().as_deref(), Some(SUPERSEDED_REASON));
        assert!(!second.is_cancelled());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_release_ignores_stale_ticket() {
        let registry = InFlightRegistry::default();
        let stale = registry.register(key("/items"), CancelHandle::new());
        let current = registry.register(key("/items"), CancelHandle::new());

        assert!(!registry.release(&key("/items"), stale));
        assert!(registry.has(&key("/items")));
        assert!(registry.release(&key("/items"), current));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_evict_and_get() {
        let registry = InFlightRegistry::default();
        let handle = CancelHandle::new();
        registry.register(key("/a"), handle);

        assert!(registry.get(&key("/a")).is_some());
        assert!(registry.age(&key("/a")).is_some());
        assert!(registry.evict(&key("/a")).is_some());
        assert!(registry.get(&key("/a")).is_none());
        assert!(registry.evict(&key("/a")).is_none());
    }

    #[test]
    fn test_duplicate_allowed_by_flag_or_pattern() {
        let registry = InFlightRegistry::new(vec!["/upload-progress".to_string()]);

        assert!(registry.is_duplicate_allowed(&RequestDescriptor::get("/files/upload-progress")));
        assert!(registry.is_duplicate_allowed(&RequestDescriptor::get("/poll").allow_duplicate()));
        assert!(!registry.is_duplicate_allowed(&RequestDescriptor::get("/poll")));
    }

    #[test]
    fn test_cancel_all() {
        let registry = InFlightRegistry::default();
        let a = CancelHandle::new();
        let b = CancelHandle::new();
        registry.register(key("/a"), a.clone());
        registry.register(key("/b"), b.clone());

        assert_eq!(registry.cancel_all("signed out"), 2);
        assert!(a.is_cancelled() && b.is_cancelled());
        assert!(registry.is_empty());
    }
}
