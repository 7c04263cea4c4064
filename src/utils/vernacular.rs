//! Vernacular name handling utility
//!
//! Catalog sources store common names as one `;`- or `|`-separated string
//! (e.g. "Swiss cheese plant; split-leaf philodendron"), while model output
//! delivers them as a list. Both end up as a trimmed, deduplicated list here.

/// Split a separated vernacular string into individual names
pub fn split_vernacular(raw: &str) -> Vec<String> {
    let separators = [';', '|'];
    clean_names(raw.split(|c| separators.contains(&c)))
}

/// Trim, drop empties and drop case-insensitive duplicates (first wins)
pub fn clean_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for name in names {
        let trimmed = name.as_ref().trim();
        if trimmed.is_empty() {
            continue;
        }
        let folded = trimmed.to_lowercase();
        if seen.contains(&folded) {
            continue;
        }
        seen.push(folded);
        out.push(trimmed.to_string());
    }
    out
}

/// Title case a common name ("swiss cheese plant" -> "Swiss Cheese Plant")
pub fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                None => String::new(),
                Some(first) => format!("{}{}", first.to_uppercase(), chars.collect::<String>().to_lowercase()),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Display name for a plant: first listed common name, else the scientific name
pub fn display_name(common_names: &[String], scientific_name: &str) -> String {
    common_names
        .first()
        .map(|s| title_case(s))
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| scientific_name.to_string())
}
