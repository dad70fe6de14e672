//! Path validation.
//!
//! Every path handed to a backend is relative to that backend's root; this
//! module makes sure it stays that way.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates and normalises a storage path, ensuring it never escapes the
/// storage root.
///
/// `.` components and repeated separators are dropped, `..` is resolved
/// lexically and rejected once it would leave the root. Null bytes are
/// rejected outright, and so is anything that normalises to nothing.
///
/// ```
/// use std::path::Path;
/// use zimshelf_storage::validate_path;
///
/// assert!(validate_path("wikipedia/wikipedia_en_all_2024-01.zim").is_ok());
/// assert!(validate_path("a/../other/archive.zim").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("a/../../b").is_err());
/// assert!(validate_path("a\0b").is_err());
/// assert_eq!(
///     validate_path("./ted//../wikipedia/./ted_en_2024-01.zim/").unwrap(),
///     Path::new("wikipedia/ted_en_2024-01.zim")
/// );
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // Survives Path::components() on Unix but truncates in syscalls.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
                components.push(s)
            },
            Component::CurDir | Component::RootDir => {},
            Component::Prefix(_) => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
                }
            },
        }
    }
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidPath(original.to_path_buf()));
    }
    Ok(components.into_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ted_en_2024-01.zim", "ted_en_2024-01.zim")]
    #[case("wikipedia/en/wikipedia_en_all_2024-01.zim", "wikipedia/en/wikipedia_en_all_2024-01.zim")]
    #[case("a//b//c.zim", "a/b/c.zim")]
    #[case("a/./b/./c.zim", "a/b/c.zim")]
    #[case("a/b/..", "a")]
    #[case("wikipedia///", "wikipedia")]
    #[case("/absolute/inside.zim", "absolute/inside.zim")]
    fn test_normalises(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("..")]
    #[case("../..")]
    #[case("a\0b")]
    #[case("\0")]
    #[case("")]
    #[case(".")]
    #[case("./.")]
    #[case("//")]
    fn test_rejects(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
