use std::collections::{BTreeSet, HashMap};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::types::{InputDescriptor, SimilarityScore, StructuralFingerprint};
use crate::detectors::document::{ElementData, HtmlDocument, QueryDocument};

const TOP_CSS_CLASSES: usize = 20;

static LOGIN_TEXT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(log\s?in|sign\s?in|log\s?on|password|username|verify your account|my account|authenticate)\b")
        .expect("static login pattern")
});

pub fn extract_fingerprint(html: &str) -> StructuralFingerprint {
    fingerprint_of(&HtmlDocument::parse(html))
}

pub fn fingerprint_of<D: QueryDocument>(doc: &D) -> StructuralFingerprint {
    let title = doc.first_text("title").unwrap_or_default();

    let inputs = doc
        .select("input")
        .iter()
        .map(|el| InputDescriptor {
            input_type: el
                .attr("type")
                .map(|t| t.trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "text".to_string()),
            name: el.attr("name").unwrap_or_default().to_string(),
            id: el.attr("id").unwrap_or_default().to_string(),
        })
        .collect();

    let class_attrs = doc.attr_values("[class]", "class");
    let css_classes = rank_tokens(
        class_attrs.iter().flat_map(|c| c.split_whitespace()),
        TOP_CSS_CLASSES,
    );

    let mut ids: Vec<String> = Vec::new();
    for id in doc.attr_values("[id]", "id") {
        if !id.is_empty() && !ids.contains(&id) {
            ids.push(id);
        }
    }

    StructuralFingerprint {
        title,
        inputs,
        css_classes,
        ids,
        links: doc.attr_values("a[href]", "href"),
        images: doc.attr_values("img[src]", "src"),
    }
}

/// Most frequent tokens first; equal counts keep first-occurrence order.
fn rank_tokens<'a>(tokens: impl Iterator<Item = &'a str>, limit: usize) -> Vec<String> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for token in tokens {
        let count = counts.entry(token).or_insert(0);
        if *count == 0 {
            order.push(token);
        }
        *count += 1;
    }
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .take(limit)
        .map(|t| t.to_string())
        .collect()
}

/// |A ∩ B| / |A ∪ B|, and 0 for two empty sets.
pub fn jaccard<T, A, B>(a: A, b: B) -> f64
where
    T: Ord,
    A: IntoIterator<Item = T>,
    B: IntoIterator<Item = T>,
{
    let a: BTreeSet<T> = a.into_iter().collect();
    let b: BTreeSet<T> = b.into_iter().collect();
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

/// Weighted similarity of two fingerprints.
///
/// A component that neither page carries (no classes, no ids) is left out of
/// the weighting instead of counting as a mismatch. Inputs and title always
/// take part; a pair without any inputs scores 0 there.
pub fn compare(a: &StructuralFingerprint, b: &StructuralFingerprint) -> SimilarityScore {
    let inputs = input_similarity(&a.inputs, &b.inputs);
    let css = jaccard(&a.css_classes, &b.css_classes);
    let ids = jaccard(&a.ids, &b.ids);
    let title = title_similarity(&a.title, &b.title);

    let overall = weighted(&[
        (inputs, 0.4, true),
        (css, 0.3, present(&a.css_classes, &b.css_classes)),
        (ids, 0.2, present(&a.ids, &b.ids)),
        (title, 0.1, true),
    ]);
    SimilarityScore {
        overall: percent(overall),
        input_fields: percent(inputs),
        css_classes: percent(css),
        ids: percent(ids),
        title: percent(title),
    }
}

fn present<T>(a: &[T], b: &[T]) -> bool {
    !a.is_empty() || !b.is_empty()
}

/// Mean of the `(score, weight, counted)` parts that are counted.
fn weighted(parts: &[(f64, f64, bool)]) -> f64 {
    let total: f64 = parts.iter().filter(|p| p.2).map(|p| p.1).sum();
    if total == 0.0 {
        return 0.0;
    }
    parts.iter().filter(|p| p.2).map(|p| p.0 * p.1).sum::<f64>() / total
}

fn input_similarity(a: &[InputDescriptor], b: &[InputDescriptor]) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let types = |inputs: &[InputDescriptor]| {
        let mut t: Vec<String> = inputs.iter().map(|i| i.input_type.clone()).collect();
        t.sort();
        t
    };
    let names = |inputs: &[InputDescriptor]| -> Vec<String> {
        inputs
            .iter()
            .filter(|i| !i.name.is_empty())
            .map(|i| i.name.clone())
            .collect()
    };
    let ids = |inputs: &[InputDescriptor]| -> Vec<String> {
        inputs
            .iter()
            .filter(|i| !i.id.is_empty())
            .map(|i| i.id.clone())
            .collect()
    };
    let (names_a, names_b) = (names(a), names(b));
    let (ids_a, ids_b) = (ids(a), ids(b));
    weighted(&[
        (jaccard(types(a), types(b)), 0.4, true),
        (jaccard(&names_a, &names_b), 0.3, present(&names_a, &names_b)),
        (jaccard(&ids_a, &ids_b), 0.3, present(&ids_a, &ids_b)),
    ])
}

/// Not transitive: "Acme" vs "Acme Login" is 0.5 without implying anything about a third title.
fn title_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    let contained = (!a.is_empty() && b.contains(a)) || (!b.is_empty() && a.contains(b));
    if contained {
        0.5
    } else {
        0.0
    }
}

fn percent(value: f64) -> u8 {
    (value * 100.0).round().clamp(0.0, 100.0) as u8
}

pub fn has_login_form(html: &str) -> bool {
    login_form_in(&HtmlDocument::parse(html))
}

pub fn login_form_in<D: QueryDocument>(doc: &D) -> bool {
    let inputs = doc.select("input");
    let input_type = |el: &ElementData| {
        el.attr("type").unwrap_or("text").trim().to_ascii_lowercase()
    };
    let has_password = inputs.iter().any(|el| input_type(el) == "password");
    if !has_password {
        return false;
    }
    if LOGIN_TEXT.is_match(&doc.body_text()) {
        return true;
    }
    inputs.iter().any(|el| {
        let name = el.attr("name").unwrap_or_default().to_ascii_lowercase();
        input_type(el) == "email" || name.contains("user") || name.contains("email")
    })
}
