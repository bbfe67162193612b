use std::collections::HashMap;

use tracing::warn;

/// Identifier columns that keep a fixed canonical name regardless of how the
/// rest of the header is spelled.
pub const IDENTIFIER_COLUMNS: [(&str, &str); 5] = [
    ("Dist Code", "district_code"),
    ("Year", "year"),
    ("State Code", "state_code"),
    ("State Name", "state_name"),
    ("Dist Name", "district_name"),
];

/// Canonical lower-snake-case form of a single raw label.
pub fn standardize_label(raw: &str) -> String {
    let trimmed = raw.trim();

    if let Some((_, canonical)) = IDENTIFIER_COLUMNS
        .iter()
        .find(|(source, _)| *source == trimmed)
    {
        return (*canonical).to_string();
    }

    trimmed
        .to_lowercase()
        .replace(' ', "_")
        .replace(['(', ')'], "")
        .replace('/', "_")
}

/// Standardizes a whole header.
///
/// Two raw labels can collapse onto the same canonical name; later ones get a
/// `_2`, `_3`, ... suffix so every column stays addressable.
pub fn standardize_labels<S: AsRef<str>>(raw: &[S]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut out = Vec::with_capacity(raw.len());

    for label in raw {
        let canonical = standardize_label(label.as_ref());
        let count = seen.entry(canonical.clone()).or_insert(0);
        *count += 1;

        if *count == 1 {
            out.push(canonical);
            continue;
        }

        let mut suffix = *count;
        let mut candidate = format!("{canonical}_{suffix}");
        while seen.contains_key(&candidate) {
            suffix += 1;
            candidate = format!("{canonical}_{suffix}");
        }
        warn!(
            raw = label.as_ref(),
            canonical = %canonical,
            renamed = %candidate,
            "column label collides after standardization"
        );
        seen.insert(candidate.clone(), 1);
        out.push(candidate);
    }

    out
}
