use std::collections::HashMap;

use dd_core::{Error, Result};
use scraper::{Html, Selector};

/// A parsed retailer page. Only lives for one evaluation.
pub struct ParsedDocument {
    html: Html,
}

/// The first element matching a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    pub text: String,
    pub attributes: HashMap<String, String>,
}

impl ParsedDocument {
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_document(markup),
        }
    }

    pub fn query(&self, selector: &Selector) -> Option<Element> {
        self.html.select(selector).next().map(|el| Element {
            text: el.text().collect::<String>(),
            attributes: el
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        })
    }
}

pub fn parse_selector(query: &str) -> Result<Selector> {
    Selector::parse(query).map_err(|e| Error::Schema(format!("Invalid selector {:?}: {}", query, e)))
}
