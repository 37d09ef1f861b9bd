use tokio::time::{Duration, Instant};

/// List snapshot with a freshness window
#[derive(Debug, Clone)]
pub struct ListCache<T> {
    entries: Vec<T>,
    fetched_at: Option<Instant>,
    ttl: Duration,
}

impl<T: Clone> ListCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Vec::new(),
            fetched_at: None,
            ttl,
        }
    }

    /// Populated and younger than the TTL
    pub fn is_fresh(&self) -> bool {
        self.fetched_at
            .is_some_and(|at| at.elapsed() < self.ttl)
    }

    /// Last stored list, stale or not
    pub fn entries(&self) -> &[T] {
        &self.entries
    }

    pub fn fetched_at(&self) -> Option<Instant> {
        self.fetched_at
    }

    pub fn store(&mut self, entries: Vec<T>) {
        self.entries = entries;
        self.fetched_at = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn freshness_follows_ttl() {
        let mut cache: ListCache<u8> = ListCache::new(Duration::from_secs(300));
        assert!(!cache.is_fresh());
        assert!(cache.entries().is_empty());

        cache.store(vec![1, 2]);
        assert!(cache.is_fresh());

        tokio::time::advance(Duration::from_secs(299)).await;
        assert!(cache.is_fresh());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(!cache.is_fresh());
        assert_eq!(cache.entries(), &[1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_is_never_fresh() {
        let mut cache: ListCache<u8> = ListCache::new(Duration::ZERO);
        cache.store(vec![1]);
        assert!(!cache.is_fresh());
    }
}
