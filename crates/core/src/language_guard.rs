//! Detection of English residue in narrative pt-BR model outputs.

use std::sync::OnceLock;

use regex::Regex;

fn forbidden_terms_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?i)\b(accept|accepted|deny|denied|support|reason|because|therefore|however|patient|summary|recommendation|recommended|required|insufficient|unknown|none|dinai|die)\b",
        )
        .expect("static regex")
    })
}

/// Sorted unique forbidden English tokens found across narrative texts.
pub fn collect_forbidden_terms<'a, I>(texts: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut found: Vec<String> = Vec::new();
    for text in texts {
        for token in forbidden_terms_pattern().find_iter(text) {
            let lowered = token.as_str().to_lowercase();
            if !found.contains(&lowered) {
                found.push(lowered);
            }
        }
    }
    found.sort();
    found
}
