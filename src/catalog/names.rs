//! Phase lookup by display name, for callers that never received a phase id.
//!
//! Three tiers, tried in order over the whole sequence; the first tier with a
//! hit wins and, within a tier, the lowest ordinal wins:
//!
//! 1. case-insensitive exact match
//! 2. case-insensitive substring, in either direction
//! 3. accent-stripped match (exact, then substring)

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::model::Phase;

/// Find the phase a free-text name refers to.
pub fn resolve<'a>(phases: &'a [Phase], name: &str) -> Option<&'a Phase> {
    let query = name.trim().to_lowercase();
    if query.is_empty() {
        return None;
    }

    if let Some(phase) = phases.iter().find(|p| p.name.to_lowercase() == query) {
        return Some(phase);
    }

    if let Some(phase) = phases.iter().find(|p| overlaps(&p.name.to_lowercase(), &query)) {
        return Some(phase);
    }

    let folded = fold(&query);
    phases
        .iter()
        .find(|p| fold(&p.name) == folded)
        .or_else(|| phases.iter().find(|p| overlaps(&fold(&p.name), &folded)))
}

/// Lowercase and strip diacritics: "Idéation" -> "ideation".
pub fn fold(s: &str) -> String {
    s.trim()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
}

fn overlaps(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.contains(b) || b.contains(a))
}
