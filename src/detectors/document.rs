//! Minimal queryable-document surface the structural heuristics run against.
//!
//! The heuristics only ever need "select by CSS selector, read attributes and
//! text", so they are written over [`QueryDocument`] and the `scraper` backed
//! [`HtmlDocument`] is one implementation of it.

use scraper::{Html, Selector};

/// Attribute and text snapshot of one matched element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ElementData {
    pub attrs: Vec<(String, String)>,
    pub text: String,
}

impl ElementData {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub trait QueryDocument {
    /// Elements matching `selector` in document order. Invalid selectors match nothing.
    fn select(&self, selector: &str) -> Vec<ElementData>;

    /// Visible text of the body (or the whole document when there is no body).
    fn body_text(&self) -> String;

    fn first_text(&self, selector: &str) -> Option<String> {
        self.select(selector)
            .into_iter()
            .next()
            .map(|el| el.text.trim().to_string())
    }

    fn attr_values(&self, selector: &str, attr: &str) -> Vec<String> {
        self.select(selector)
            .iter()
            .filter_map(|el| el.attr(attr).map(|v| v.to_string()))
            .collect()
    }
}

pub struct HtmlDocument {
    html: Html,
}

impl HtmlDocument {
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }
}

impl QueryDocument for HtmlDocument {
    fn select(&self, selector: &str) -> Vec<ElementData> {
        let Ok(sel) = Selector::parse(selector) else {
            return vec![];
        };
        self.html
            .select(&sel)
            .map(|el| ElementData {
                attrs: el
                    .value()
                    .attrs()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                text: el.text().collect::<Vec<_>>().join(" "),
            })
            .collect()
    }

    fn body_text(&self) -> String {
        let body = self.select("body");
        let text = match body.into_iter().next() {
            Some(el) => el.text,
            None => self.html.root_element().text().collect::<Vec<_>>().join(" "),
        };
        text.split_whitespace().collect::<Vec<_>>().join(" ")
    }
}
