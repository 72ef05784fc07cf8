//! Layered generic extraction for pages without a site profile.
//!
//! The standard passes run in order and stop at the first that yields a
//! candidate:
//!
//! - (a) headings mentioning a query term that wrap, sit inside, or are
//!   directly followed by a link
//! - (b) result containers: `article` and classes containing `result`,
//!   `card`, `search-item`, `teaser`, `views-row`, or `list-item`
//! - (c) any link with at least 10 characters of text
//!
//! The aggressive pass looks for elements whose own text mentions a query
//! term and builds a candidate from the nearest ancestor that carries a
//! link, heading, or paragraph.
//!
//! Everything inside `nav`, `header`, or `footer` is ignored, and every pass
//! dedupes by canonical URL.

use std::collections::HashSet;

use chrono::NaiveDate;
use scraper::{ElementRef, Html, Selector};

use super::date::scan_date;
use super::text::{element_text, normalize_whitespace};
use super::{urls, RawHit};
use crate::error::SearchError;
use crate::types::SearchQuery;

/// Minimum anchor text length for pass (c).
const MIN_ANCHOR_TEXT: usize = 10;

/// Containers with more text than this are too broad to scan for a date.
const DATE_SCAN_MAX_CHARS: usize = 600;

/// How far up the aggressive pass walks from a matching element.
const MAX_ANCESTOR_DEPTH: usize = 5;

const CHROME_TAGS: &[&str] = &["nav", "header", "footer"];
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "head", "title"];

const DATE_SELECTORS: &str = ".date, time, .published, .publication-date, \
    [itemprop=\"datePublished\"], .meta-date, .timestamp";

const CONTAINER_SELECTORS: &str = "article, [class*=\"result\"], [class*=\"card\"], \
    [class*=\"search-item\"], [class*=\"teaser\"], [class*=\"views-row\"], [class*=\"list-item\"]";

/// Compiled selectors for the generic passes.
#[derive(Debug, Clone)]
pub struct GenericExtractor {
    headings: Selector,
    links: Selector,
    paragraphs: Selector,
    containers: Selector,
    dates: Selector,
}

fn parse(css: &str) -> Result<Selector, SearchError> {
    Selector::parse(css).map_err(|e| SearchError::Parse(format!("invalid selector {css:?}: {e:?}")))
}

impl GenericExtractor {
    /// Compile the generic selectors.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Parse`] if a selector fails to compile.
    pub fn new() -> Result<Self, SearchError> {
        Ok(Self {
            headings: parse("h1, h2, h3, h4, h5, h6")?,
            links: parse("a[href]")?,
            paragraphs: parse("p")?,
            containers: parse(CONTAINER_SELECTORS)?,
            dates: parse(DATE_SELECTORS)?,
        })
    }

    /// Run the standard passes (a), (b), (c) in order.
    pub fn standard(&self, document: &Html, base_url: &str, query: &SearchQuery) -> Vec<RawHit> {
        let passes: [(&str, fn(&Self, &Html, &str, &SearchQuery) -> Vec<RawHit>); 3] = [
            ("headings", Self::heading_pass),
            ("containers", |this, doc, base, _| this.container_pass(doc, base)),
            ("anchors", |this, doc, base, _| this.anchor_pass(doc, base)),
        ];
        for (name, pass) in passes {
            let hits = pass(self, document, base_url, query);
            if !hits.is_empty() {
                tracing::trace!(pass = name, count = hits.len(), "generic pass matched");
                return hits;
            }
        }
        Vec::new()
    }

    /// Pass (a): headings tied to a link whose text mentions a query term.
    pub fn heading_pass(&self, document: &Html, base_url: &str, query: &SearchQuery) -> Vec<RawHit> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for heading in document.select(&self.headings) {
            if in_chrome(heading) {
                continue;
            }
            let title = element_text(heading);
            if title.is_empty() || !query.matches_text(&title) {
                continue;
            }
            let Some(url) = self
                .heading_link(heading)
                .and_then(|href| urls::resolve(base_url, href))
            else {
                continue;
            };
            if !seen.insert(urls::canonical(&url)) {
                continue;
            }

            let snippet = following_elements(heading)
                .find(|el| el.value().name() == "p")
                .map(element_text)
                .unwrap_or_default();
            let container = parent_element(heading).unwrap_or(heading);
            hits.push(RawHit {
                title,
                url,
                date: self.find_date(container),
                snippet,
                ..RawHit::default()
            });
        }
        hits
    }

    fn heading_link<'a>(&self, heading: ElementRef<'a>) -> Option<&'a str> {
        heading
            .select(&self.links)
            .find_map(|a| a.value().attr("href"))
            .or_else(|| {
                ancestors(heading)
                    .take(2)
                    .find(|el| el.value().name() == "a")
                    .and_then(|a| a.value().attr("href"))
            })
            .or_else(|| {
                following_elements(heading)
                    .next()
                    .filter(|el| el.value().name() == "a")
                    .and_then(|a| a.value().attr("href"))
            })
    }

    /// Pass (b): result/card/article containers.
    ///
    /// Containers that hold other matching containers (result lists) are
    /// skipped in favour of their children.
    pub fn container_pass(&self, document: &Html, base_url: &str) -> Vec<RawHit> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for container in document.select(&self.containers) {
            if in_chrome(container) || container.select(&self.containers).next().is_some() {
                continue;
            }
            let heading = container.select(&self.headings).find(|h| !element_text(*h).is_empty());
            let link = heading
                .and_then(|h| h.select(&self.links).next())
                .or_else(|| container.select(&self.links).next());
            let Some(url) = link
                .and_then(|a| a.value().attr("href"))
                .and_then(|href| urls::resolve(base_url, href))
            else {
                continue;
            };
            let title = heading
                .or(link)
                .map(element_text)
                .filter(|t| !t.is_empty());
            let Some(title) = title else {
                continue;
            };
            if !seen.insert(urls::canonical(&url)) {
                continue;
            }

            let snippet = container
                .select(&self.paragraphs)
                .map(element_text)
                .find(|p| !p.is_empty() && *p != title)
                .unwrap_or_default();
            hits.push(RawHit {
                title,
                url,
                date: self.find_date(container),
                snippet,
                ..RawHit::default()
            });
        }
        hits
    }

    /// Pass (c): any link with enough text.
    pub fn anchor_pass(&self, document: &Html, base_url: &str) -> Vec<RawHit> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        for anchor in document.select(&self.links) {
            if in_chrome(anchor) {
                continue;
            }
            let title = element_text(anchor);
            if title.chars().count() < MIN_ANCHOR_TEXT {
                continue;
            }
            let Some(url) = anchor
                .value()
                .attr("href")
                .and_then(|href| urls::resolve(base_url, href))
            else {
                continue;
            };
            if !seen.insert(urls::canonical(&url)) {
                continue;
            }

            let parent = parent_element(anchor);
            let snippet = parent
                .map(element_text)
                .filter(|text| *text != title && text.chars().count() <= DATE_SCAN_MAX_CHARS)
                .unwrap_or_default();
            hits.push(RawHit {
                title,
                url,
                date: parent.and_then(|p| self.find_date(p)),
                snippet,
                ..RawHit::default()
            });
        }
        hits
    }

    /// Aggressive pass: elements whose own text mentions a query term.
    ///
    /// Candidates without any link point at `base_url`, so at most one such
    /// candidate survives deduplication.
    pub fn aggressive(&self, document: &Html, base_url: &str, query: &SearchQuery) -> Vec<RawHit> {
        let mut seen = HashSet::new();
        let mut hits = Vec::new();
        let elements = document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap);

        for element in elements {
            if SKIPPED_TAGS.contains(&element.value().name()) || in_chrome(element) {
                continue;
            }
            if !query.matches_text(&own_text(element)) {
                continue;
            }
            let Some(hit) = self.synthesize(element, base_url) else {
                continue;
            };
            if seen.insert(urls::canonical(&hit.url)) {
                hits.push(hit);
            }
        }
        hits
    }

    fn synthesize(&self, element: ElementRef<'_>, base_url: &str) -> Option<RawHit> {
        let lineage: Vec<ElementRef<'_>> = std::iter::once(element)
            .chain(ancestors(element))
            .take(MAX_ANCESTOR_DEPTH + 1)
            .take_while(|el| el.value().name() != "body")
            .collect();

        // Nearest enclosing link, or the nearest ancestor holding one.
        let linked = lineage.iter().find_map(|el| {
            if el.value().name() == "a" {
                el.value().attr("href").map(|href| (*el, href))
            } else {
                el.select(&self.links)
                    .find_map(|a| a.value().attr("href"))
                    .map(|href| (*el, href))
            }
        });
        let resolved = linked.and_then(|(el, href)| urls::resolve(base_url, href).map(|url| (el, url)));

        let (carrier, url) = match resolved {
            Some((el, url)) => (el, url),
            None => {
                let carrier = lineage.iter().copied().find(|el| {
                    matches!(el.value().name(), "p" | "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
                        || el.select(&self.headings).next().is_some()
                        || el.select(&self.paragraphs).next().is_some()
                })?;
                (carrier, urls::resolve(base_url, base_url)?)
            }
        };

        let title = carrier
            .select(&self.headings)
            .map(element_text)
            .find(|t| !t.is_empty())
            .or_else(|| {
                carrier
                    .select(&self.links)
                    .map(element_text)
                    .find(|t| !t.is_empty())
            })
            .unwrap_or_else(|| normalize_whitespace(&own_text(element)));
        let title: String = title.chars().take(200).collect();
        if title.is_empty() {
            return None;
        }

        Some(RawHit {
            snippet: element_text(carrier),
            date: self.find_date(carrier),
            title,
            url,
            ..RawHit::default()
        })
    }

    /// A date from a dedicated date element, else from the container text
    /// when the container is small.
    fn find_date(&self, container: ElementRef<'_>) -> Option<NaiveDate> {
        container
            .select(&self.dates)
            .find_map(date_within)
            .or_else(|| {
                let text = element_text(container);
                (text.chars().count() <= DATE_SCAN_MAX_CHARS)
                    .then(|| scan_date(&text))
                    .flatten()
            })
    }
}

/// Date carried by one element: its `datetime`/`content` attribute, else
/// its text.
pub fn date_within(element: ElementRef<'_>) -> Option<NaiveDate> {
    ["datetime", "content"]
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .find_map(scan_date)
        .or_else(|| scan_date(&element_text(element)))
}

fn ancestors<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.ancestors().filter_map(ElementRef::wrap)
}

fn parent_element(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    ancestors(element).next()
}

fn following_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.next_siblings().filter_map(ElementRef::wrap)
}

/// Whether `element` is, or sits inside, page chrome.
fn in_chrome(element: ElementRef<'_>) -> bool {
    std::iter::once(element)
        .chain(ancestors(element))
        .any(|el| CHROME_TAGS.contains(&el.value().name()) || el.value().attr("role") == Some("navigation"))
}

/// Text nodes directly under `element`, excluding descendants' text.
fn own_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|node| node.value().as_text())
        .map(|text| &**text)
        .collect::<Vec<&str>>()
        .join(" ")
}
