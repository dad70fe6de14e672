//! Version-independent redirects to the latest version of each archive.

use crate::error::{ErrorKind, Result};
use crate::group::Library;
use exn::ResultExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::instrument;
use zimshelf_config::LegacyOption;
use zimshelf_naming::{alias_of, without_period};

/// Companion files published next to every archive.
pub const SUFFIXES: [&str; 6] = ["", ".torrent", ".meta4", ".magnet", ".md5", ".sha256"];

/// Redirects `source` to `target`, both relative to the redirects root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectRule {
    pub source: PathBuf,
    pub target: PathBuf,
}
impl RedirectRule {
    fn render_into(&self, out: &mut String) {
        let (source, target) = (escape(&self.source), escape(&self.target));
        for suffix in SUFFIXES {
            out.push_str(&format!("/{source}{suffix} /{target}{suffix}\n"));
        }
    }
}

/// Percent-encodes whitespace (and `%` itself) so that each path stays a
/// single field of its line.
fn escape(path: &Path) -> String {
    let mut escaped = String::new();
    for c in path.to_string_lossy().chars() {
        match c {
            '%' | ' ' | '\t' | '\n' | '\r' => escaped.push_str(&format!("%{:02X}", u32::from(c))),
            c => escaped.push(c),
        }
    }
    escaped
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectMap {
    rules: Vec<RedirectRule>,
}
impl RedirectMap {
    /// One rule per alias, pointing its period-less name at the latest
    /// version, plus rules under deprecated option names.
    ///
    /// A deprecated name is only emitted when no current alias already owns
    /// it, and only once.
    #[instrument(skip(library, legacy_options), fields(aliases = library.len()))]
    pub fn build(
        library: &Library,
        zim_root: &Path,
        redirects_root: &Path,
        legacy_options: &[LegacyOption],
    ) -> Result<Self> {
        let current: HashSet<&str> = library.groups().iter().map(|group| group.alias.as_str()).collect();
        let mut emitted = HashSet::new();
        let mut rules = Vec::new();
        for entry in library.groups().iter().filter_map(|group| group.head()) {
            let target = zim_root
                .join(entry.path())
                .strip_prefix(redirects_root)
                .or_raise(|| ErrorKind::Redirects)?
                .to_path_buf();
            let extension = target.extension().map(|ext| ext.to_string_lossy().into_owned()).unwrap_or_default();
            let undated = without_period(&entry.core);
            let source_for = |stem: &str| target.with_file_name(format!("{stem}.{extension}"));

            rules.push(RedirectRule { source: source_for(&undated), target: target.clone() });
            emitted.insert(alias_of(&undated));

            for legacy in legacy_options {
                let Some(deprecated) = substitute(&undated, legacy) else {
                    continue;
                };
                let deprecated_alias = alias_of(&deprecated);
                if current.contains(deprecated_alias.as_str()) || !emitted.insert(deprecated_alias) {
                    tracing::debug!(deprecated = %deprecated, "Deprecated name is taken; no legacy redirect");
                    continue;
                }
                rules.push(RedirectRule { source: source_for(&deprecated), target: target.clone() });
            }
        }
        tracing::info!(rules = rules.len(), "Built redirect map");
        Ok(Self { rules })
    }

    pub fn rules(&self) -> &[RedirectRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// `/source /target` lines, one per rule and suffix.
    pub fn render(&self) -> Vec<u8> {
        let mut out = String::new();
        for rule in &self.rules {
            rule.render_into(&mut out);
        }
        out.into_bytes()
    }
}

/// `stem` with its trailing `_{current}` replaced by `_{deprecated}`.
fn substitute(stem: &str, legacy: &LegacyOption) -> Option<String> {
    let prefix = stem.strip_suffix(legacy.current.as_str())?;
    prefix.ends_with('_').then(|| format!("{prefix}{}", legacy.deprecated))
}

/// Checks that every line of a rendered map is a `/source /target` pair.
pub fn validate(document: &[u8]) -> std::result::Result<(), String> {
    let text = std::str::from_utf8(document).map_err(|e| e.to_string())?;
    for (number, line) in text.lines().enumerate() {
        let fields: Vec<&str> = line.split(' ').collect();
        if fields.len() != 2 || fields.iter().any(|field| !field.starts_with('/')) {
            return Err(format!("malformed redirect on line {}: {line:?}", number + 1));
        }
    }
    Ok(())
}
