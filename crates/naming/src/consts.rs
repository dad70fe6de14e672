use regex::Regex;
use std::sync::LazyLock;

const PROJECT: &str = r"(?P<project>.+?_)";
const LANG: &str = r"(?P<lang>[a-z\-]{2,10}?_|)";
const OPTION: &str = r"(?P<option>.+_|)";

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Current filename format (period is YYYY-MM).
regex!(CURRENT_REGEX, format!(r"(?i)^{PROJECT}{LANG}{OPTION}(?P<year>\d{{4}})-(?P<month>\d{{2}})$").as_str());
// Former filename format (period was MM_YYYY).
regex!(LEGACY_REGEX, format!(r"(?i)^{PROJECT}{LANG}{OPTION}(?P<month>\d{{2}})_(?P<year>\d{{4}})$").as_str());
// Trailing period of either format, including its leading separator.
regex!(PERIOD_SUFFIX_REGEX, r"_(?:\d{4}-\d{2}|\d{2}_\d{4})$");
