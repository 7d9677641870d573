//! Text normalization shared by every similarity feature in Phase 3.
//! Spec §4.9: "lowercase, strip punctuation, collapse whitespace."

const CORP_SUFFIXES: &[&str] = &["inc", "llc", "ltd", "corp", "company", "organization", "org"];

/// Lowercase, strip punctuation, collapse whitespace — the common
/// normalization every text feature in the Matcher is built on.
pub fn normalize_text(s: &str) -> String {
    let replaced: String = s.chars().map(|c| if c.is_alphanumeric() { c } else { ' ' }).collect();
    replaced.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `normalize_text` plus corp-suffix stripping, for organizer names.
pub fn normalize_organizer(s: &str) -> String {
    let normalized = normalize_text(s);
    let tokens: Vec<&str> = normalized.split_whitespace().filter(|t| !CORP_SUFFIXES.contains(t)).collect();
    tokens.join(" ")
}

/// Whitespace-delimited token set of a normalized string, used by
/// `token_set_ratio`.
pub fn token_set(s: &str) -> std::collections::BTreeSet<String> {
    s.split_whitespace().map(String::from).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_punctuation_and_collapses_whitespace() {
        assert_eq!(normalize_text("Farmers   Market!!  (Summer)"), "farmers market summer");
    }

    #[test]
    fn strips_corp_suffixes() {
        assert_eq!(normalize_organizer("Acme Events, LLC."), "acme events");
        assert_eq!(normalize_organizer("The Gathering Company"), "the gathering");
    }

    #[test]
    fn empty_input_normalizes_to_empty() {
        assert_eq!(normalize_text(""), "");
        assert_eq!(normalize_text("   !!!   "), "");
    }
}
