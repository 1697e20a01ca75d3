//! Temporary output files for extracted entries.

use std::path::PathBuf;

use tempfile::NamedTempFile;

use crate::Result;
use crate::SessionConfig;
use crate::tree::TreeNode;

/// Longest entry name kept verbatim in a temp file suffix.
const MAX_SUFFIX_NAME_LEN: usize = 96;

/// Creates the temporary file an entry is written to.
pub trait TempFileFactory {
    /// Creates a new, empty temporary file for `node`.
    fn create_temp_file(&self, node: &TreeNode) -> Result<NamedTempFile>;
}

/// Creates temp files in a directory (the system temp dir by default).
///
/// File names look like `<prefix><random>-<entry name>`, so the extension of
/// the entry survives and nested archives can be recognized by name.
///
/// # Examples
///
/// ```
/// use arctree_core::SessionConfig;
/// use arctree_core::extraction::TempDirFactory;
///
/// let factory = TempDirFactory::from_config(&SessionConfig::default());
/// assert_eq!(factory.prefix(), "arctree-");
/// ```
#[derive(Debug, Clone)]
pub struct TempDirFactory {
    dir: Option<PathBuf>,
    prefix: String,
}

impl TempDirFactory {
    /// Creates a factory writing into `dir` (`None` = system temp dir).
    #[must_use]
    pub fn new(dir: Option<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir,
            prefix: prefix.into(),
        }
    }

    /// Creates a factory from the temp settings of `config`.
    #[must_use]
    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.temp_dir.clone(), config.temp_prefix.clone())
    }

    /// File name prefix.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for TempDirFactory {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

impl TempFileFactory for TempDirFactory {
    fn create_temp_file(&self, node: &TreeNode) -> Result<NamedTempFile> {
        let suffix = suffix_for(node.name());
        let mut builder = tempfile::Builder::new();
        builder.prefix(&self.prefix).suffix(&suffix);

        let file = match &self.dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        log::debug!("created {} for {}", file.path().display(), node.path());
        Ok(file)
    }
}

fn suffix_for(name: &str) -> String {
    let name: String = name
        .chars()
        .map(|c| if c.is_control() || matches!(c, '\\' | ':') { '_' } else { c })
        .collect();

    if name.len() <= MAX_SUFFIX_NAME_LEN {
        return format!("-{name}");
    }

    // keep only the extension of very long names
    match name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.len() < MAX_SUFFIX_NAME_LEN => format!("-.{ext}"),
        _ => String::new(),
    }
}
