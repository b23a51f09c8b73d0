use std::path::{Path, PathBuf};

/// Directory segment of a language distribution checkout
pub const RESERVED_SEGMENT: &str = "tabula-lang";

/// Runtime archives that ship with the shell itself
pub const RESERVED_ARCHIVES: &[&str] = &["tabula-rt.zip", "tabula-tools.zip"];

/// Splits a classpath into platform-owned entries and local ones.
///
/// Matching is case-insensitive. An entry is platform-owned when it is the
/// runtime root or lies under it, when one of its components is
/// [`RESERVED_SEGMENT`], or when its file name is a reserved archive.
#[derive(Debug, Clone, Default)]
pub struct ClasspathFilter {
    runtime_root: Option<PathBuf>,
}

impl ClasspathFilter {
    pub fn new(runtime_root: Option<PathBuf>) -> Self {
        Self {
            runtime_root: runtime_root.map(|p| lowercase(&p)),
        }
    }

    pub fn is_platform_entry(&self, entry: &Path) -> bool {
        let entry = lowercase(entry);

        if let Some(root) = &self.runtime_root {
            if entry.starts_with(root) {
                return true;
            }
        }

        if entry.components().any(|c| c.as_os_str() == RESERVED_SEGMENT) {
            return true;
        }

        entry
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| RESERVED_ARCHIVES.contains(&name))
            .unwrap_or(false)
    }

    /// Local entries of `classpath`, order preserved
    pub fn local(&self, classpath: &[PathBuf]) -> Vec<PathBuf> {
        classpath
            .iter()
            .filter(|entry| !self.is_platform_entry(entry))
            .cloned()
            .collect()
    }
}

fn lowercase(path: &Path) -> PathBuf {
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    PathBuf::from(absolute.to_string_lossy().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> ClasspathFilter {
        ClasspathFilter::new(Some(PathBuf::from("/opt/tabula/runtime")))
    }

    #[test]
    fn runtime_root_itself_is_excluded() {
        assert!(filter().is_platform_entry(Path::new("/opt/tabula/runtime")));
    }

    #[test]
    fn entries_under_runtime_root_are_excluded() {
        assert!(filter().is_platform_entry(Path::new("/opt/tabula/runtime/lib/core")));
        assert!(filter().is_platform_entry(Path::new("/OPT/Tabula/Runtime/lib")));
    }

    #[test]
    fn sibling_with_common_prefix_is_kept() {
        assert!(!filter().is_platform_entry(Path::new("/opt/tabula/runtime-extras")));
    }

    #[test]
    fn reserved_segment_is_excluded() {
        assert!(filter().is_platform_entry(Path::new("/home/me/src/tabula-lang/stdlib")));
    }

    #[test]
    fn reserved_archives_are_excluded() {
        assert!(filter().is_platform_entry(Path::new("/usr/share/java/tabula-rt.zip")));
        assert!(filter().is_platform_entry(Path::new("/tmp/TABULA-TOOLS.ZIP")));
    }

    #[test]
    fn user_directories_are_kept() {
        let classpath = vec![
            PathBuf::from("/home/me/scripts"),
            PathBuf::from("/opt/tabula/runtime"),
            PathBuf::from("/home/me/lib/tabula-rt.zip"),
            PathBuf::from("/srv/shared"),
        ];
        assert_eq!(
            filter().local(&classpath),
            vec![PathBuf::from("/home/me/scripts"), PathBuf::from("/srv/shared")]
        );
    }

    #[test]
    fn no_runtime_root_keeps_everything_else() {
        let filter = ClasspathFilter::new(None);
        assert!(!filter.is_platform_entry(Path::new("/opt/tabula/runtime")));
    }
}
