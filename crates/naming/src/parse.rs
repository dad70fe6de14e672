use crate::consts::{CURRENT_REGEX, LEGACY_REGEX};
use crate::error::{ErrorKind, Result};
use crate::period::Period;
use exn::ResultExt;
use regex::Captures;

/// Language assumed when a filename carries none.
pub const DEFAULT_LANG: &str = "en";

/// Which filename convention a stem was written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    /// `project[_lang][_option]_YYYY-MM`
    Current,
    /// `project[_lang][_option]_MM_YYYY`
    Legacy,
}

/// Structured fields extracted from an archive file stem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedName {
    pub project: String,
    /// Language code, [`DEFAULT_LANG`] when absent from the name.
    pub lang: String,
    /// Free-form modifier (`all_maxi`, `nopic`, ...), empty when absent.
    pub option: String,
    pub period: Period,
    pub format: Format,
}
impl ParsedName {
    /// Rebuilds a stem from the parsed fields, in the format it was parsed
    /// from. The language is always written out, so a stem that relied on the
    /// default language comes back with an explicit `_en_`.
    pub fn to_stem(&self) -> String {
        let mut stem = format!("{}_{}_", self.project, self.lang);
        if !self.option.is_empty() {
            stem.push_str(&self.option);
            stem.push('_');
        }
        match self.format {
            Format::Current => stem.push_str(&format!("{}-{}", self.period.year(), self.period.month())),
            Format::Legacy => stem.push_str(&format!("{}_{}", self.period.month(), self.period.year())),
        }
        stem
    }
}

/// Parses a file stem, trying the current format first and the legacy one
/// second.
///
/// Returns [`ErrorKind::FilenameFormat`] when neither matches.
pub fn parse(stem: &str) -> Result<ParsedName> {
    let (captures, format) = match CURRENT_REGEX.captures(stem) {
        Some(c) => (c, Format::Current),
        None => match LEGACY_REGEX.captures(stem) {
            Some(c) => (c, Format::Legacy),
            None => exn::bail!(ErrorKind::FilenameFormat(stem.to_string())),
        },
    };
    let period = Period::new(group(&captures, "year"), group(&captures, "month"))
        .or_raise(|| ErrorKind::FilenameFormat(stem.to_string()))?;
    let lang = strip_separator(group(&captures, "lang"));
    Ok(ParsedName {
        project: strip_separator(group(&captures, "project")).to_string(),
        lang: if lang.is_empty() { DEFAULT_LANG.to_string() } else { lang.to_string() },
        option: strip_separator(group(&captures, "option")).to_string(),
        period,
        format,
    })
}

fn group<'h>(captures: &Captures<'h>, name: &str) -> &'h str {
    captures.name(name).map(|m| m.as_str()).unwrap_or_default()
}

fn strip_separator(s: &str) -> &str {
    s.strip_suffix('_').unwrap_or(s)
}
