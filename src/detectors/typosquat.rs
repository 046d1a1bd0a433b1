use strsim::levenshtein;

use crate::core::types::{DomainMatch, MatchType};

const DIRECT_CONFIDENCE: u8 = 100;
const OMISSION_CONFIDENCE: u8 = 95;
const ADDITION_CONFIDENCE: u8 = 90;
const SWAP_CONFIDENCE: u8 = 95;
const HOMOGLYPH_CONFIDENCE: u8 = 85;
const HIGH_SIMILARITY_FLOOR: f64 = 80.0;

/// Look-alike replacements per ASCII letter. Cyrillic entries are written as escapes.
const HOMOGLYPHS: &[(char, &[char])] = &[
    ('a', &['\u{0430}', '@', '4']),
    ('b', &['8']),
    ('c', &['\u{0441}']),
    ('e', &['\u{0435}', '3']),
    ('g', &['9', 'q']),
    ('i', &['1', 'l', '\u{0456}']),
    ('l', &['1', 'i']),
    ('m', &['n']),
    ('o', &['0', '\u{043e}']),
    ('p', &['\u{0440}']),
    ('s', &['5', '$']),
    ('t', &['7']),
    ('x', &['\u{0445}']),
    ('y', &['\u{0443}']),
    ('z', &['2']),
];

/// Classify `candidate` against one brand `keyword`.
///
/// Rules run in a fixed order and the first one that fires wins, even when a
/// later rule would report a higher confidence.
pub fn detect(candidate: &str, keyword: &str) -> DomainMatch {
    let candidate = candidate.trim().to_lowercase();
    let keyword = keyword.trim().to_lowercase();
    if keyword.is_empty() || candidate.is_empty() {
        return DomainMatch::none(&keyword);
    }

    let cand: Vec<char> = candidate.chars().collect();
    let key: Vec<char> = keyword.chars().collect();

    let hit = |match_type, confidence| DomainMatch {
        keyword: keyword.clone(),
        match_type,
        confidence,
    };

    if candidate.contains(&keyword) {
        return hit(MatchType::Direct, DIRECT_CONFIDENCE);
    }
    if cand.len() + 1 == key.len() && is_omission(&cand, &key) {
        return hit(MatchType::CharacterOmission, OMISSION_CONFIDENCE);
    }
    if cand.len() == key.len() + 1 && is_addition(&cand, &key) {
        return hit(MatchType::CharacterAddition, ADDITION_CONFIDENCE);
    }
    if cand.len() == key.len() && is_adjacent_swap(&cand, &key) {
        return hit(MatchType::CharacterSwap, SWAP_CONFIDENCE);
    }
    if has_homoglyph_variant(&candidate, &key) {
        return hit(MatchType::Homoglyph, HOMOGLYPH_CONFIDENCE);
    }

    let similarity = similarity_percent(&candidate, &keyword);
    if similarity > HIGH_SIMILARITY_FLOOR {
        return hit(MatchType::HighSimilarity, similarity.round() as u8);
    }
    DomainMatch::none(&keyword)
}

/// Highest-confidence match of `domain` over every keyword, if any matched.
///
/// Each keyword is tested against the full host and against its registrable
/// label, so `login.acme-secure.com` and `acmme.com` are both caught.
pub fn best_match(domain: &str, keywords: &[String]) -> Option<DomainMatch> {
    let host = domain.trim().to_lowercase();
    let label = registrable_label(&host);
    let mut best: Option<DomainMatch> = None;
    for keyword in keywords {
        for subject in [host.as_str(), label.as_str()] {
            let found = detect(subject, keyword);
            if !found.is_match() {
                continue;
            }
            let better = best
                .as_ref()
                .map(|b| found.confidence > b.confidence)
                .unwrap_or(true);
            if better {
                best = Some(found);
            }
        }
    }
    best
}

/// Edit-distance similarity in percent; 0 when both sides are empty.
pub fn similarity_percent(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 0.0;
    }
    let distance = levenshtein(a, b);
    (max_len - distance) as f64 / max_len as f64 * 100.0
}

/// Second-level label of a host, skipping common two-part suffixes like `co.uk`.
pub fn registrable_label(host: &str) -> String {
    let host = host.trim_end_matches('.');
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    match labels.len() {
        0 => String::new(),
        1 => labels[0].to_string(),
        n => {
            let second = labels[n - 2];
            let generic_second = matches!(second, "co" | "com" | "net" | "org" | "gov" | "ac" | "edu");
            if generic_second && n >= 3 {
                labels[n - 3].to_string()
            } else {
                second.to_string()
            }
        }
    }
}

fn is_omission(cand: &[char], key: &[char]) -> bool {
    (0..key.len()).any(|skip| {
        key.iter()
            .enumerate()
            .filter(|(i, _)| *i != skip)
            .map(|(_, c)| c)
            .eq(cand.iter())
    })
}

fn is_addition(cand: &[char], key: &[char]) -> bool {
    for pos in 0..=key.len() {
        for letter in 'a'..='z' {
            let inserted = key[..pos]
                .iter()
                .chain(std::iter::once(&letter))
                .chain(key[pos..].iter());
            if inserted.eq(cand.iter()) {
                return true;
            }
        }
    }
    false
}

fn is_adjacent_swap(cand: &[char], key: &[char]) -> bool {
    (0..key.len().saturating_sub(1)).any(|i| {
        let mut swapped = key.to_vec();
        swapped.swap(i, i + 1);
        swapped == cand
    })
}

fn has_homoglyph_variant(candidate: &str, key: &[char]) -> bool {
    for (pos, ch) in key.iter().enumerate() {
        let Some(alternatives) = homoglyphs_for(*ch) else {
            continue;
        };
        for alt in alternatives {
            let mut single = key.to_vec();
            single[pos] = *alt;
            let single: String = single.into_iter().collect();
            if candidate.contains(&single) {
                return true;
            }
            let every: String = key
                .iter()
                .map(|c| if c == ch { *alt } else { *c })
                .collect();
            if candidate.contains(&every) {
                return true;
            }
        }
    }
    false
}

fn homoglyphs_for(ch: char) -> Option<&'static [char]> {
    HOMOGLYPHS
        .iter()
        .find(|(base, _)| *base == ch)
        .map(|(_, alts)| *alts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_containment_wins() {
        let m = detect("google-login.com", "google");
        assert_eq!(m.match_type, MatchType::Direct);
        assert_eq!(m.confidence, 100);
    }

    #[test]
    fn adjacent_swap() {
        let m = detect("googel", "google");
        assert_eq!(m.match_type, MatchType::CharacterSwap);
        assert_eq!(m.confidence, 95);
    }

    #[test]
    fn omission_and_addition() {
        assert_eq!(detect("gogle", "google").match_type, MatchType::CharacterOmission);
        assert_eq!(detect("gooogle", "google").match_type, MatchType::CharacterAddition);
        assert_eq!(detect("gooogle", "google").confidence, 90);
    }

    #[test]
    fn addition_only_considers_letters() {
        // A digit insertion falls through to the similarity rule.
        let m = detect("goog1le", "google");
        assert_ne!(m.match_type, MatchType::CharacterAddition);
    }

    #[test]
    fn homoglyph_substitution() {
        let m = detect("g00gle", "google");
        assert!(matches!(
            m.match_type,
            MatchType::Homoglyph | MatchType::HighSimilarity
        ));
        assert!(m.confidence >= 80);

        let cyrillic = detect("p\u{0430}ypal-verify", "paypal");
        assert_eq!(cyrillic.match_type, MatchType::Homoglyph);
        assert_eq!(cyrillic.confidence, 85);
    }

    #[test]
    fn priority_order_beats_confidence() {
        // An addition scores 90 even though its similarity would be ~93.
        let m = detect("bankofamerrica", "bankofamerica");
        assert_eq!(m.match_type, MatchType::CharacterAddition);
        assert_eq!(m.confidence, 90);
        // Direct always wins even if the candidate is also a swap of something.
        let m = detect("xacmex", "acme");
        assert_eq!(m.match_type, MatchType::Direct);
    }

    #[test]
    fn high_similarity_fallback() {
        let m = detect("mikrosoft", "microsoft");
        assert_eq!(m.match_type, MatchType::HighSimilarity);
        assert_eq!(m.confidence, 89);
    }

    #[test]
    fn unrelated_domain_is_none() {
        let m = detect("weatherapp", "google");
        assert_eq!(m.match_type, MatchType::None);
        assert_eq!(m.confidence, 0);
        assert!(!detect("anything", "").is_match());
    }

    #[test]
    fn levenshtein_is_symmetric() {
        for (a, b) in [("kitten", "sitting"), ("acme", ""), ("g00gle", "google")] {
            assert_eq!(levenshtein(a, b), levenshtein(b, a));
            assert_eq!(levenshtein(a, a), 0);
        }
    }

    #[test]
    fn best_match_keeps_highest_confidence() {
        let keywords = vec!["acme".to_string(), "acmepay".to_string()];
        let m = best_match("www.acmepya.com", &keywords).unwrap();
        // "acmepya" contains "acme" directly.
        assert_eq!(m.match_type, MatchType::Direct);
        assert_eq!(m.keyword, "acme");

        let m = best_match("acmepau.net", &["acmepay".to_string()]).unwrap();
        assert_eq!(m.match_type, MatchType::HighSimilarity);
        assert!(best_match("weather.io", &keywords).is_none());
    }

    #[test]
    fn punycode_link_matches_cyrillic_homoglyph() {
        let domain = crate::sources::normalize::domain_from_str("https://xn--pypal-4ve.com/login")
            .unwrap();
        let m = best_match(&domain, &["paypal".to_string()]).unwrap();
        assert_eq!(m.match_type, MatchType::Homoglyph);
        assert_eq!(m.confidence, 85);
    }

    #[test]
    fn registrable_label_handles_two_part_suffixes() {
        assert_eq!(registrable_label("login.googel.com"), "googel");
        assert_eq!(registrable_label("shop.acme.co.uk"), "acme");
        assert_eq!(registrable_label("localhost"), "localhost");
    }
}
