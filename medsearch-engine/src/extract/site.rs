//! Source-specific extractors driven by CSS selector candidate lists.
//!
//! For each field a profile lists candidate selectors; the first candidate
//! that yields a non-empty value wins. Item selectors work the same way: the
//! first candidate matching at least one element defines the result list.

use std::collections::HashMap;

use scraper::{ElementRef, Html, Selector};

use super::generic::date_within;
use super::text::element_text;
use super::{urls, RawHit};
use crate::error::SearchError;

/// Selector candidates for one site's result page.
#[derive(Debug, Clone, Copy)]
pub struct SelectorProfile {
    /// Result item containers.
    pub items: &'static [&'static str],
    /// Title element inside an item.
    pub title: &'static [&'static str],
    /// Link inside an item; falls back to the title element or first link.
    pub link: &'static [&'static str],
    /// Excerpt inside an item.
    pub snippet: &'static [&'static str],
    /// Date element inside an item.
    pub date: &'static [&'static str],
    /// Author/holder elements inside an item.
    pub authors: &'static [&'static str],
    /// Whether one author element holds a comma-separated list.
    pub split_authors: bool,
}

/// Built-in profiles for sites with stable result markup.
pub fn builtin_profiles() -> Vec<(&'static str, SelectorProfile)> {
    let tga = SelectorProfile {
        items: &[
            ".view-content .views-row",
            ".search-results .search-result",
            ".product-item",
            ".medicine-item",
        ],
        title: &["h2 a", "h3 a", ".title a", ".views-field-title a", "h2", "h3"],
        link: &["h2 a", "h3 a", ".title a", ".views-field-title a"],
        snippet: &[".summary", ".description", ".views-field-body"],
        date: &[".date", ".publication-date", ".views-field-field-publication-date"],
        authors: &[".manufacturer", ".sponsor", ".views-field-field-sponsor"],
        split_authors: false,
    };
    vec![
        (
            "pubmed",
            SelectorProfile {
                items: &["article.full-docsum", ".docsum-content"],
                title: &[".docsum-title"],
                link: &["a.docsum-title"],
                snippet: &[".full-view-snippet", ".docsum-snippet"],
                date: &[".docsum-journal-citation.full-journal-citation", ".docsum-journal-citation"],
                authors: &[".docsum-authors.full-authors", ".docsum-authors"],
                split_authors: true,
            },
        ),
        (
            "mhra",
            SelectorProfile {
                items: &[".search-results .search-result"],
                title: &["h2 a", ".title a", "h2", ".title"],
                link: &["h2 a", ".title a"],
                snippet: &[".description", ".summary"],
                date: &[".date", ".authorisation-date"],
                authors: &[".manufacturer", ".marketing-authorisation-holder"],
                split_authors: false,
            },
        ),
        ("tga", tga),
        ("tga-cmi", tga),
        (
            "ema-medicines",
            SelectorProfile {
                items: &[".ecl-list-item", ".search-result", ".views-row"],
                title: &["h3 a", "h2 a", ".ecl-link", "h3"],
                link: &["h3 a", "h2 a", "a.ecl-link"],
                snippet: &[".ecl-content-block__description", ".field-content p", "p"],
                date: &["time", ".date"],
                authors: &[".marketing-authorisation-holder"],
                split_authors: false,
            },
        ),
    ]
}

/// A compiled [`SelectorProfile`].
#[derive(Debug, Clone)]
pub struct SiteExtractor {
    items: Vec<Selector>,
    title: Vec<Selector>,
    link: Vec<Selector>,
    snippet: Vec<Selector>,
    date: Vec<Selector>,
    authors: Vec<Selector>,
    split_authors: bool,
    anchor: Selector,
}

fn compile_one(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("invalid selector {css:?}: {e:?}")))
}

fn compile(list: &[&str]) -> Result<Vec<Selector>, SearchError> {
    list.iter().map(|css| compile_one(css)).collect()
}

impl SiteExtractor {
    /// Compile every selector in `profile`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Parse`] naming the first invalid selector.
    pub fn compile(profile: &SelectorProfile) -> Result<Self, SearchError> {
        Ok(Self {
            items: compile(profile.items)?,
            title: compile(profile.title)?,
            link: compile(profile.link)?,
            snippet: compile(profile.snippet)?,
            date: compile(profile.date)?,
            authors: compile(profile.authors)?,
            split_authors: profile.split_authors,
            anchor: compile_one("a[href]")?,
        })
    }

    /// Extract candidates from a parsed result page.
    pub fn extract(&self, document: &Html, base_url: &str) -> Vec<RawHit> {
        let Some(items) = self
            .items
            .iter()
            .map(|sel| document.select(sel).collect::<Vec<_>>())
            .find(|items| !items.is_empty())
        else {
            return Vec::new();
        };

        items
            .into_iter()
            .filter_map(|item| self.item_hit(item, base_url))
            .collect()
    }

    fn item_hit(&self, item: ElementRef<'_>, base_url: &str) -> Option<RawHit> {
        let title_el = first_with_text(item, &self.title)?;
        let title = element_text(title_el);

        let href = self
            .link
            .iter()
            .find_map(|sel| item.select(sel).find_map(|a| a.value().attr("href")))
            .or_else(|| title_el.value().attr("href"))
            .or_else(|| item.select(&self.anchor).find_map(|a| a.value().attr("href")))?;
        let url = urls::resolve(base_url, href)?;

        let snippet = first_with_text(item, &self.snippet)
            .map(element_text)
            .unwrap_or_default();

        let date = self
            .date
            .iter()
            .flat_map(|sel| item.select(sel))
            .find_map(date_within);

        let authors = self
            .authors
            .iter()
            .map(|sel| item.select(sel).map(element_text).filter(|a| !a.is_empty()).collect::<Vec<_>>())
            .find(|found| !found.is_empty())
            .unwrap_or_default();
        let authors = if self.split_authors {
            authors
                .iter()
                .flat_map(|list| list.split([',', ';']))
                .map(|a| a.trim().trim_end_matches('.').trim().to_owned())
                .filter(|a| !a.is_empty())
                .collect()
        } else {
            authors
        };

        Some(RawHit {
            title,
            url,
            date,
            snippet,
            authors,
            relevance_score: None,
        })
    }
}

fn first_with_text<'a>(item: ElementRef<'a>, candidates: &[Selector]) -> Option<ElementRef<'a>> {
    candidates
        .iter()
        .flat_map(|sel| item.select(sel))
        .find(|el| !element_text(*el).is_empty())
}

/// Source id → compiled site extractor.
#[derive(Debug, Clone, Default)]
pub struct SiteRegistry {
    extractors: HashMap<String, SiteExtractor>,
}

impl SiteRegistry {
    /// A registry with no site extractors.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with every [`builtin_profiles`] entry.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Parse`] if a built-in selector is invalid.
    pub fn builtin() -> Result<Self, SearchError> {
        let mut registry = Self::empty();
        for (source_id, profile) in builtin_profiles() {
            registry.register(source_id, &profile)?;
        }
        Ok(registry)
    }

    /// Compile and add (or replace) the profile for `source_id`.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Parse`] if a selector is invalid.
    pub fn register(&mut self, source_id: &str, profile: &SelectorProfile) -> Result<(), SearchError> {
        let extractor = SiteExtractor::compile(profile)?;
        self.extractors.insert(source_id.to_owned(), extractor);
        Ok(())
    }

    /// The extractor for `source_id`.
    pub fn get(&self, source_id: &str) -> Option<&SiteExtractor> {
        self.extractors.get(source_id)
    }
}
