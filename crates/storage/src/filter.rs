//! Exclusion rules for archive discovery.

use std::path::{Component, Path, PathBuf};

/// Extension of a deletion marker: `<stem>.delete` next to a file, or
/// `<name>.delete` next to a directory, takes it out of every listing.
pub const DELETE_MARKER: &str = "delete";

const DEFAULT_EXTENSION: &str = "zim";
const DEFAULT_DENYLIST: [&str; 2] = ["test_", "bench_"];

/// Decides which directory entries a listing yields.
///
/// Every path segment between the root and a file is checked, so a hidden or
/// marked directory hides everything beneath it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanFilter {
    /// Yield (and descend into) entries whose name starts with `.`.
    pub include_hidden: bool,
    /// Only files with this extension are yielded.
    pub extension: String,
    /// Entries whose name starts with any of these prefixes are skipped.
    pub denylist: Vec<String>,
}
impl Default for ScanFilter {
    fn default() -> Self {
        Self {
            include_hidden: false,
            extension: DEFAULT_EXTENSION.to_string(),
            denylist: DEFAULT_DENYLIST.iter().map(ToString::to_string).collect(),
        }
    }
}
impl ScanFilter {
    pub fn with_hidden(mut self, include_hidden: bool) -> Self {
        self.include_hidden = include_hidden;
        self
    }

    /// Whether a directory called `name` should be descended into.
    /// `has_sibling` answers whether an entry of the given name exists in the
    /// same directory.
    pub fn allows_dir(&self, name: &str, has_sibling: impl Fn(&str) -> bool) -> bool {
        self.allows_name(name) && !has_sibling(&format!("{name}.{DELETE_MARKER}"))
    }

    /// Whether a file called `name` should be yielded.
    pub fn allows_file(&self, name: &str, has_sibling: impl Fn(&str) -> bool) -> bool {
        let path = Path::new(name);
        let (Some(stem), Some(extension)) = (path.file_stem().and_then(|s| s.to_str()), path.extension()) else {
            return false;
        };
        extension == self.extension.as_str()
            && self.allows_name(name)
            && !has_sibling(&format!("{stem}.{DELETE_MARKER}"))
    }

    /// Checks a whole relative path at once, for backends that cannot walk
    /// directory by directory. `exists` receives paths relative to the same
    /// root as `relative`.
    pub fn allows_path(&self, relative: &Path, exists: impl Fn(&Path) -> bool) -> bool {
        let names: Vec<&str> = match relative
            .components()
            .map(|c| match c {
                Component::Normal(s) => s.to_str(),
                _ => None,
            })
            .collect::<Option<_>>()
        {
            Some(names) => names,
            None => return false,
        };
        let Some((file, dirs)) = names.split_last() else {
            return false;
        };
        let mut parent = PathBuf::new();
        for dir in dirs {
            if !self.allows_dir(dir, |sibling| exists(&parent.join(sibling))) {
                return false;
            }
            parent.push(dir);
        }
        self.allows_file(file, |sibling| exists(&parent.join(sibling)))
    }

    fn allows_name(&self, name: &str) -> bool {
        if !self.include_hidden && name.starts_with('.') {
            return false;
        }
        !self.denylist.iter().any(|prefix| name.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashSet;

    fn no_siblings(_: &str) -> bool {
        false
    }

    #[rstest]
    #[case("ted_en_2024-01.zim", true)]
    #[case("ted_en_2024-01.zim.part", false)]
    #[case("README", false)]
    #[case(".ted_en_2024-01.zim", false)]
    #[case("test_en_2024-01.zim", false)]
    #[case("bench_fr_2024-01.zim", false)]
    fn test_allows_file(#[case] name: &str, #[case] allowed: bool) {
        assert_eq!(ScanFilter::default().allows_file(name, no_siblings), allowed);
    }

    #[test]
    fn test_hidden_can_be_included() {
        let filter = ScanFilter::default().with_hidden(true);
        assert!(filter.allows_file(".ted_en_2024-01.zim", no_siblings));
        assert!(filter.allows_dir(".staging", no_siblings));
    }

    #[test]
    fn test_delete_markers() {
        let filter = ScanFilter::default();
        let siblings: HashSet<&str> = ["ted_en_2024-01.delete", "old.delete"].into();
        assert!(!filter.allows_file("ted_en_2024-01.zim", |s| siblings.contains(s)));
        assert!(filter.allows_file("ted_en_2024-02.zim", |s| siblings.contains(s)));
        assert!(!filter.allows_dir("old", |s| siblings.contains(s)));
        assert!(filter.allows_dir("new", |s| siblings.contains(s)));
    }

    #[rstest]
    #[case("wikipedia/wikipedia_en_all_2024-01.zim", true)]
    #[case(".hidden/wikipedia_en_all_2024-01.zim", false)]
    #[case("retired/wikipedia_en_all_2024-01.zim", false)]
    #[case("wikipedia/marked_en_all_2024-01.zim", false)]
    #[case("test_dir/wikipedia_en_all_2024-01.zim", false)]
    fn test_allows_path(#[case] path: &str, #[case] allowed: bool) {
        let existing: HashSet<PathBuf> =
            ["retired.delete", "wikipedia/marked_en_all_2024-01.delete"].into_iter().map(PathBuf::from).collect();
        let filter = ScanFilter::default();
        assert_eq!(filter.allows_path(Path::new(path), |p| existing.contains(p)), allowed);
    }
}
