//! Archive-relative entry paths.

use std::borrow::Cow;
use std::fmt;

/// A path relative to the archive root, using `/` as the only separator.
///
/// `InnerPath` is what format adapters hand to the content tree. It never
/// starts with `/`, never ends with `/`, never contains `\`, and has no empty
/// or `.` segments. The root of the archive is the empty path.
///
/// # Examples
///
/// ```
/// use arctree_core::types::InnerPath;
///
/// let path = InnerPath::normalize("./docs\\guide//intro.txt");
/// assert_eq!(path.as_str(), "docs/guide/intro.txt");
/// assert_eq!(path.file_name(), "intro.txt");
/// assert_eq!(path.segments().count(), 3);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct InnerPath(String);

impl InnerPath {
    /// Normalizes a raw entry name as stored by an archive format.
    ///
    /// Backslashes become `/`, leading `/` and `./` are stripped, empty and
    /// `.` segments are dropped. `..` segments are kept as ordinary names;
    /// nothing is ever written to a location derived from an inner path.
    #[must_use]
    pub fn normalize(raw: &str) -> Self {
        if is_normalized(raw) {
            return Self(raw.to_string());
        }

        let unified: Cow<'_, str> = if raw.contains('\\') {
            Cow::Owned(raw.replace('\\', "/"))
        } else {
            Cow::Borrowed(raw)
        };

        let mut normalized = String::with_capacity(unified.len());
        for segment in unified.split('/') {
            if segment.is_empty() || segment == "." {
                continue;
            }
            if !normalized.is_empty() {
                normalized.push('/');
            }
            normalized.push_str(segment);
        }
        Self(normalized)
    }

    /// Returns the path as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for the archive root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the path segments from the root down.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Returns the last segment (empty for the root).
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or_default()
    }

    /// Returns the extension of the last segment, if any.
    #[must_use]
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(0) | None => None,
            Some(pos) => Some(&name[pos + 1..]),
        }
    }

    /// Appends one segment.
    #[must_use]
    pub fn join(&self, segment: &str) -> Self {
        if self.is_root() {
            Self(segment.to_string())
        } else {
            Self(format!("{}/{segment}", self.0))
        }
    }
}

impl fmt::Display for InnerPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for InnerPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Returns `true` if `path` honors the separator contract for raw entry paths:
/// no backslash, no leading `/`.
#[must_use]
pub fn honors_separator_contract(path: &str) -> bool {
    !path.contains('\\') && !path.starts_with('/')
}

fn is_normalized(raw: &str) -> bool {
    honors_separator_contract(raw)
        && !raw.ends_with('/')
        && raw.split('/').all(|s| !s.is_empty() && s != ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path_unchanged() {
        let path = InnerPath::normalize("dir/b.txt");
        assert_eq!(path.as_str(), "dir/b.txt");
        assert_eq!(path.file_name(), "b.txt");
    }

    #[test]
    fn test_directory_trailing_slash_stripped() {
        assert_eq!(InnerPath::normalize("dir/sub/").as_str(), "dir/sub");
    }

    #[test]
    fn test_tar_dot_prefix_stripped() {
        assert_eq!(InnerPath::normalize("./a.txt").as_str(), "a.txt");
        assert!(InnerPath::normalize("./").is_root());
    }

    #[test]
    fn test_backslashes_converted() {
        assert_eq!(
            InnerPath::normalize("win\\style\\file.doc").as_str(),
            "win/style/file.doc"
        );
    }

    #[test]
    fn test_leading_slash_stripped() {
        assert_eq!(InnerPath::normalize("/etc/hosts").as_str(), "etc/hosts");
    }

    #[test]
    fn test_case_is_preserved() {
        let upper = InnerPath::normalize("Dir/File.TXT");
        let lower = InnerPath::normalize("dir/file.txt");
        assert_ne!(upper, lower);
    }

    #[test]
    fn test_extension() {
        assert_eq!(InnerPath::normalize("a/b.tar.gz").extension(), Some("gz"));
        assert_eq!(InnerPath::normalize("a/.hidden").extension(), None);
        assert_eq!(InnerPath::normalize("a/noext").extension(), None);
    }

    #[test]
    fn test_join() {
        let root = InnerPath::default();
        let dir = root.join("dir");
        assert_eq!(dir.as_str(), "dir");
        assert_eq!(dir.join("c.txt").as_str(), "dir/c.txt");
    }

    #[test]
    fn test_separator_contract() {
        assert!(honors_separator_contract("a/b"));
        assert!(!honors_separator_contract("/a/b"));
        assert!(!honors_separator_contract("a\\b"));
    }
}
