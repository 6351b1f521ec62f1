//! Engine configuration
//!
//! Small, copyable knobs consumed by the query layer. Defaults match the
//! behavior documented on the collection surface; nothing here changes query
//! semantics, only presentation and the temp-key leak guard.

/// Tuning knobs for collection resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of items shown before a textual representation truncates.
    pub max_repr_items: usize,
    /// Safety-net TTL (seconds) set on temporary computation keys. Only
    /// relevant if the process dies before the guaranteed delete runs.
    pub temp_key_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_repr_items: 20,
            temp_key_ttl_secs: 60,
        }
    }
}

impl Config {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Overrides the representation truncation threshold
    pub fn with_max_repr_items(mut self, count: usize) -> Self {
        self.max_repr_items = count;
        self
    }

    /// Overrides the temp-key safety TTL
    pub fn with_temp_key_ttl(mut self, secs: u64) -> Self {
        self.temp_key_ttl_secs = secs;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.max_repr_items, 20);
        assert_eq!(config.temp_key_ttl_secs, 60);
    }

    #[test]
    fn test_overrides_chain() {
        let config = Config::new().with_max_repr_items(2).with_temp_key_ttl(5);
        assert_eq!(config.max_repr_items, 2);
        assert_eq!(config.temp_key_ttl_secs, 5);
    }
}
