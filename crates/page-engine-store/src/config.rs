//! Configuration for opening a [`crate::CacheStore`].

use std::path::PathBuf;
use std::time::Duration;

/// Overridable knobs for [`crate::CacheStore::open`].
///
/// Production code should use [`StoreConfig::default`], which resolves the
/// cache database under the platform user-data directory (via `dirs`) and
/// uses the spec's 3-second busy timeout. Tests override `cache_dir` to a
/// `tempfile::TempDir` path and may shrink `busy_timeout` to fail fast.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory the SQLite file is created in. `None` resolves via `dirs`.
    pub cache_dir: Option<PathBuf>,
    /// How long a writer waits for the SQLite lock before giving up.
    pub busy_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            cache_dir: None,
            busy_timeout: Duration::from_secs(3),
        }
    }
}

impl StoreConfig {
    /// Override the cache directory, e.g. to a `tempfile::TempDir` in tests.
    pub fn with_cache_dir(mut self, dir: PathBuf) -> Self {
        self.cache_dir = Some(dir);
        self
    }

    /// Override the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub(crate) fn resolve_cache_dir(&self) -> Result<PathBuf, crate::error::StoreError> {
        match &self.cache_dir {
            Some(dir) => Ok(dir.clone()),
            None => dirs::data_local_dir()
                .map(|base| base.join("page-engine"))
                .ok_or_else(|| crate::error::StoreError::CacheDirUnavailable {
                    message: "no platform user-data directory available".to_string(),
                }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_has_no_explicit_dir_and_three_second_timeout() {
        let config = StoreConfig::default();
        assert!(config.cache_dir.is_none());
        assert_eq!(config.busy_timeout, Duration::from_secs(3));
    }

    #[test]
    fn with_cache_dir_overrides_resolution() {
        let config = StoreConfig::default().with_cache_dir(PathBuf::from("/tmp/x"));
        assert_eq!(config.resolve_cache_dir().unwrap(), PathBuf::from("/tmp/x"));
    }
}
