use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

use crate::core::types::KeywordHit;
use crate::detectors::document::{HtmlDocument, QueryDocument};
use crate::sources::normalize::domain_of;

const MAX_CREDENTIAL_STRINGS: usize = 25;

static CREDENTIAL_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"(?i)\b(?:password|passwd|pwd|api[_-]?key|secret|access[_-]?token)\s*[:=]\s*["']?[^\s"'<>]{4,}"#,
        r"\bAKIA[0-9A-Z]{16}\b",
        r#"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}:[^\s"'<>@]{4,}"#,
    ]
    .iter()
    .map(|p| Regex::new(p).expect("static credential pattern"))
    .collect()
});

/// What the pipeline reads out of a fetched page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub keyword_hits: Vec<KeywordHit>,
    pub credential_like_strings: Vec<String>,
    pub outbound_links: Vec<String>,
}

pub trait Extractor: Send + Sync {
    fn extract(&self, html: &str, page_url: &str, keywords: &[String]) -> Extraction;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PageExtractor;

impl Extractor for PageExtractor {
    fn extract(&self, html: &str, page_url: &str, keywords: &[String]) -> Extraction {
        let doc = HtmlDocument::parse(html);
        let text = doc.body_text().to_lowercase();
        let keyword_hits = keywords
            .iter()
            .filter(|k| !k.is_empty())
            .filter_map(|k| {
                let count = text.matches(k.to_lowercase().as_str()).count();
                (count > 0).then(|| KeywordHit {
                    keyword: k.clone(),
                    count,
                })
            })
            .collect();

        Extraction {
            keyword_hits,
            credential_like_strings: credential_strings(html),
            outbound_links: outbound_links(&doc, page_url),
        }
    }
}

fn credential_strings(html: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for re in CREDENTIAL_PATTERNS.iter() {
        for m in re.find_iter(html) {
            let s = m.as_str().to_string();
            if !found.contains(&s) {
                found.push(s);
            }
            if found.len() >= MAX_CREDENTIAL_STRINGS {
                return found;
            }
        }
    }
    found
}

/// Absolute anchor targets on a different host than the page itself.
fn outbound_links<D: QueryDocument>(doc: &D, page_url: &str) -> Vec<String> {
    let Ok(base) = Url::parse(page_url) else {
        return Vec::new();
    };
    let own_host = domain_of(&base);
    let mut links: Vec<String> = Vec::new();
    for href in doc.attr_values("a[href]", "href") {
        let Ok(target) = base.join(href.trim()) else {
            continue;
        };
        if !matches!(target.scheme(), "http" | "https") {
            continue;
        }
        let host = domain_of(&target);
        if host.is_none() || host == own_host {
            continue;
        }
        let link = target.to_string();
        if !links.contains(&link) {
            links.push(link);
        }
    }
    links
}
