use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies one load request in notifications and logs.
pub type RequestId = u64;

/// Validity handle for one load request.
///
/// A token stays current until the [`TokenSource`] that issued it issues a
/// newer one or is invalidated. Holders consult it before every state change;
/// invalidation never interrupts work already running.
#[derive(Debug, Clone)]
pub struct LoadToken {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl LoadToken {
    pub fn request_id(&self) -> RequestId {
        self.generation
    }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.generation
    }
}

/// Issues load tokens; exactly one issued token is current at a time.
#[derive(Debug, Default)]
pub struct TokenSource {
    current: Arc<AtomicU64>,
}

impl TokenSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh token, superseding every earlier one.
    pub fn issue(&self) -> LoadToken {
        let generation = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        LoadToken {
            generation,
            current: Arc::clone(&self.current),
        }
    }

    /// Supersede every outstanding token without issuing a new one.
    pub fn invalidate(&self) {
        self.current.fetch_add(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_newer_token_supersedes() {
        let source = TokenSource::new();
        let a = source.issue();
        assert!(a.is_current());
        let b = source.issue();
        assert!(!a.is_current());
        assert!(b.is_current());
        assert!(b.request_id() > a.request_id());
    }

    #[test]
    fn test_invalidate_leaves_nothing_current() {
        let source = TokenSource::new();
        let a = source.issue();
        source.invalidate();
        assert!(!a.is_current());
        assert!(source.issue().is_current());
    }

    #[test]
    fn test_clones_share_validity() {
        let source = TokenSource::new();
        let a = source.issue();
        let copy = a.clone();
        let handle = std::thread::spawn(move || copy.is_current());
        assert!(handle.join().unwrap());
        source.issue();
        assert!(!a.is_current());
    }
}
