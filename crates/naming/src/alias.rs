use crate::consts::PERIOD_SUFFIX_REGEX;

/// Human-friendly identifier of a stem: spaces become underscores, `+`
/// becomes `plus`, and everything is transliterated to ASCII.
///
/// ```
/// use zimshelf_naming::normalize;
/// assert_eq!(normalize("café notes+extra_2024-01"), "cafe_notesplusextra_2024-01");
/// ```
pub fn normalize(stem: &str) -> String {
    deunicode::deunicode(&stem.replace(' ', "_").replace('+', "plus"))
}

/// Version-independent identity of a stem: its [normalized](normalize) form
/// without the trailing period.
///
/// ```
/// use zimshelf_naming::alias_of;
/// assert_eq!(alias_of("encyclopedia_en_all_2024-01"), "encyclopedia_en_all");
/// assert_eq!(alias_of("topic_fr_all_02_2020"), "topic_fr_all");
/// ```
pub fn alias_of(stem: &str) -> String {
    without_period(&normalize(stem))
}

/// Strips the trailing period (either format) from a raw stem, leaving
/// everything else untouched. Stems without a period are returned as-is.
pub fn without_period(stem: &str) -> String {
    PERIOD_SUFFIX_REGEX.replace(stem, "").into_owned()
}
