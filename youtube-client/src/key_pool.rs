use tubegraph_core::PlatformApiError;

/// Pool of API credentials. Every request draws one key at random, which
/// spreads quota consumption across the pool without tracking per-key usage.
#[derive(Debug, Clone)]
pub struct KeyPool {
    keys: Vec<String>,
}

impl KeyPool {
    pub fn new(keys: Vec<String>) -> Self {
        Self { keys }
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Pick one key at random.
    pub fn pick(&self) -> Result<&str, PlatformApiError> {
        if self.keys.is_empty() {
            return Err(PlatformApiError::NoCredentials);
        }
        let idx = fastrand::usize(..self.keys.len());
        Ok(&self.keys[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_pool_errors() {
        let pool = KeyPool::new(vec![]);
        assert!(matches!(pool.pick(), Err(PlatformApiError::NoCredentials)));
    }

    #[test]
    fn test_pick_returns_pool_member() {
        let pool = KeyPool::new(vec!["k1".to_string(), "k2".to_string()]);
        for _ in 0..20 {
            let key = pool.pick().unwrap();
            assert!(key == "k1" || key == "k2");
        }
    }

    #[test]
    fn test_pick_covers_all_keys_eventually() {
        let pool = KeyPool::new(vec!["a".to_string(), "b".to_string(), "c".to_string()]);
        let mut seen = std::collections::HashSet::new();
        for _ in 0..200 {
            seen.insert(pool.pick().unwrap().to_string());
        }
        assert_eq!(seen.len(), 3);
    }
}
