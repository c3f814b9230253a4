//! Correlation ids.

use std::sync::atomic::{AtomicU64, Ordering};

/// Hands out strictly increasing request ids.
///
/// Clients built from the same [`crate::ClientOptions`] share one
/// generator, so ids never repeat across attempts of a retried call.
#[derive(Debug)]
pub struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    /// Creates a generator whose first id is 1.
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Returns the next id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_sequential() {
        let ids = RequestIdGenerator::starting_at(41);
        assert_eq!(ids.next_id(), 41);
        assert_eq!(ids.next_id(), 42);
    }

    #[test]
    fn test_unique_across_threads() {
        let ids = Arc::new(RequestIdGenerator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = ids.clone();
                std::thread::spawn(move || (0..1000).map(|_| ids.next_id()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id));
            }
        }
        assert_eq!(seen.len(), 4000);
    }
}
