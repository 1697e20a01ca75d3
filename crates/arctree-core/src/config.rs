//! Session configuration for archive reading and extraction.

use std::path::PathBuf;

/// Configuration shared by tree construction and batch extraction.
///
/// # Examples
///
/// ```
/// use arctree_core::SessionConfig;
///
/// let config = SessionConfig {
///     max_entry_size: 10 * 1024 * 1024, // 10 MB
///     ..Default::default()
/// };
/// assert!(config.verify_sizes);
/// ```
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Directory for temporary output files (`None` = system temp dir).
    pub temp_dir: Option<PathBuf>,

    /// Prefix for temporary output file names.
    pub temp_prefix: String,

    /// Maximum number of entries an archive may contain.
    pub max_entry_count: usize,

    /// Maximum declared uncompressed size of a single extracted entry.
    pub max_entry_size: u64,

    /// Treat a mismatch between written and declared entry size as an entry
    /// failure.
    pub verify_sizes: bool,
}

impl Default for SessionConfig {
    /// Default values:
    /// - `temp_dir`: `None` (system temp dir)
    /// - `temp_prefix`: `"arctree-"`
    /// - `max_entry_count`: 100,000
    /// - `max_entry_size`: 1 GB
    /// - `verify_sizes`: true
    fn default() -> Self {
        Self {
            temp_dir: None,
            temp_prefix: "arctree-".to_string(),
            max_entry_count: 100_000,
            max_entry_size: 1024 * 1024 * 1024, // 1 GB
            verify_sizes: true,
        }
    }
}

impl SessionConfig {
    /// Creates a configuration without entry count or size limits.
    ///
    /// Use only for archives from trusted sources.
    #[must_use]
    pub fn permissive() -> Self {
        Self {
            max_entry_count: usize::MAX,
            max_entry_size: u64::MAX,
            ..Default::default()
        }
    }

    /// Sets the directory temporary output files are created in.
    #[must_use]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Returns `true` if an entry of `size` bytes may be extracted.
    #[must_use]
    pub const fn is_entry_size_allowed(&self, size: u64) -> bool {
        size <= self.max_entry_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SessionConfig::default();
        assert!(config.temp_dir.is_none());
        assert_eq!(config.temp_prefix, "arctree-");
        assert_eq!(config.max_entry_count, 100_000);
        assert!(config.verify_sizes);
    }

    #[test]
    fn test_permissive_config() {
        let config = SessionConfig::permissive();
        assert_eq!(config.max_entry_count, usize::MAX);
        assert!(config.is_entry_size_allowed(u64::MAX));
    }

    #[test]
    fn test_entry_size_limit() {
        let config = SessionConfig {
            max_entry_size: 100,
            ..Default::default()
        };
        assert!(config.is_entry_size_allowed(100));
        assert!(!config.is_entry_size_allowed(101));
    }

    #[test]
    fn test_with_temp_dir() {
        let config = SessionConfig::default().with_temp_dir("/tmp/arctree");
        assert_eq!(config.temp_dir, Some(PathBuf::from("/tmp/arctree")));
    }
}
