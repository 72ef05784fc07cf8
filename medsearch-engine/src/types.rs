//! Core types: sources, queries, results, and fetch strategies.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::SearchError;

/// One external database, journal, or registry, as listed in the catalog.
///
/// `id` is the stable key used for cache keys, result-id prefixes, rate
/// limits, and health tracking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Stable identifier, e.g. `pubmed` or `fda-drugs`.
    pub id: String,
    /// Display name shown in results.
    pub name: String,
    /// Site root; relative result links resolve against it.
    #[serde(rename = "url")]
    pub base_url: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
}

impl SourceDescriptor {
    /// Construct a descriptor with an empty description.
    pub fn new(id: impl Into<String>, name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            base_url: base_url.into(),
            description: String::new(),
        }
    }
}

/// Inclusive publication-date window. Either end may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Earliest accepted date.
    pub from: Option<NaiveDate>,
    /// Latest accepted date.
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// A range with both ends open.
    pub fn open() -> Self {
        Self::default()
    }

    /// A range bounded on both ends.
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self {
            from: Some(from),
            to: Some(to),
        }
    }

    /// Whether neither end is set.
    pub fn is_open(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    /// Whether `date` lies inside the range (inclusive).
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from.is_none_or(|from| date >= from) && self.to.is_none_or(|to| date <= to)
    }
}

/// A search for one or more ingredient terms, OR-combined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    terms: Vec<String>,
    #[serde(default)]
    date_range: DateRange,
}

impl SearchQuery {
    /// A query for a single term with an open date range.
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            terms: vec![term.into()],
            date_range: DateRange::open(),
        }
    }

    /// A query for several terms, OR-combined.
    pub fn with_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            terms: terms.into_iter().map(Into::into).collect(),
            date_range: DateRange::open(),
        }
    }

    /// Restrict the query to a date range.
    #[must_use]
    pub fn with_date_range(mut self, range: DateRange) -> Self {
        self.date_range = range;
        self
    }

    /// The raw terms.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// The date window.
    pub fn date_range(&self) -> &DateRange {
        &self.date_range
    }

    /// Terms rendered as a boolean OR expression, trimmed.
    pub fn expression(&self) -> String {
        self.terms
            .iter()
            .map(|t| t.trim())
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    /// Exact, case-sensitive cache key: the expression plus the date range
    /// when one is set.
    pub fn cache_key(&self) -> String {
        let mut key = self.expression();
        if !self.date_range.is_open() {
            let from = self.date_range.from.map(|d| d.to_string()).unwrap_or_default();
            let to = self.date_range.to.map(|d| d.to_string()).unwrap_or_default();
            key.push_str(&format!("|{from}..{to}"));
        }
        key
    }

    /// Whether `text` mentions any term, ignoring case.
    pub fn matches_text(&self, text: &str) -> bool {
        let haystack = text.to_lowercase();
        self.terms
            .iter()
            .map(|t| t.trim().to_lowercase())
            .any(|t| !t.is_empty() && haystack.contains(&t))
    }

    /// Reject queries that cannot be searched.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidQuery`] for an empty term list, a blank
    /// term, or a range whose start is after its end.
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.terms.is_empty() {
            return Err(SearchError::InvalidQuery("no search terms".into()));
        }
        if self.terms.iter().any(|t| t.trim().is_empty()) {
            return Err(SearchError::InvalidQuery("search terms must not be blank".into()));
        }
        if let (Some(from), Some(to)) = (self.date_range.from, self.date_range.to) {
            if from > to {
                return Err(SearchError::InvalidQuery(format!(
                    "date range start {from} is after end {to}"
                )));
            }
        }
        Ok(())
    }
}

/// A single normalized result record.
///
/// Every field except `id` defaults when missing, so partial records from a
/// batch job still deserialize.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// `{sourceId}-{n}` or `{sourceId}-error`.
    pub id: String,
    /// Result title.
    #[serde(default)]
    pub title: String,
    /// Absolute link to the result.
    #[serde(default)]
    pub url: String,
    /// Display name of the source.
    #[serde(default)]
    pub source: String,
    /// ISO `YYYY-MM-DD`; today's date when the source gave none.
    #[serde(default = "crate::extract::date::today_iso", deserialize_with = "iso_or_today")]
    pub date: String,
    /// Short text excerpt.
    #[serde(default)]
    pub snippet: String,
    /// Authors or marketing-authorisation holders, in source order.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Pass-through relevance in `0.0..=1.0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f64>,
    /// Marks a placeholder standing in for a failed or unsupported source.
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_error: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Normalize a date read back from a batch job to ISO, falling back to today.
fn iso_or_today<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?.unwrap_or_default();
    Ok(crate::extract::date::scan_date(&raw)
        .map_or_else(crate::extract::date::today_iso, crate::extract::date::iso))
}

impl SearchResult {
    /// Placeholder emitted when every attempt against `source` failed.
    pub fn error_placeholder(source: &SourceDescriptor, reason: &str) -> Self {
        Self {
            id: format!("{}-error", source.id),
            title: format!("{}: search failed", source.name),
            url: source.base_url.clone(),
            source: source.name.clone(),
            date: crate::extract::date::today_iso(),
            snippet: format!("No results could be retrieved from {}: {reason}", source.name),
            authors: Vec::new(),
            relevance_score: None,
            is_error: true,
        }
    }

    /// Placeholder emitted for sources known to refuse automated access.
    pub fn unsupported(source: &SourceDescriptor) -> Self {
        Self {
            id: format!("{}-error", source.id),
            title: format!("{}: automated search not supported", source.name),
            url: source.base_url.clone(),
            source: source.name.clone(),
            date: crate::extract::date::today_iso(),
            snippet: format!(
                "{} blocks automated access. Open the site directly to search it.",
                source.name
            ),
            authors: Vec::new(),
            relevance_score: None,
            is_error: true,
        }
    }
}

/// How a source is fetched on a given attempt.
///
/// Ordered weakest to strongest; escalation moves right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
    /// Official API of the source.
    Api,
    /// Plain page fetch with rotated user agents.
    Proxy,
    /// Page fetch with a longer timeout, broader headers, cookies, and the
    /// aggressive extraction pass.
    AdvancedProxy,
}

impl Strategy {
    /// Returns the wire name of this strategy.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Api => "api",
            Self::Proxy => "proxy",
            Self::AdvancedProxy => "advancedProxy",
        }
    }

    /// The next stronger strategy, if any.
    pub fn escalate(self) -> Option<Self> {
        match self {
            Self::Api => Some(Self::Proxy),
            Self::Proxy => Some(Self::AdvancedProxy),
            Self::AdvancedProxy => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The settled outcome of one source task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceBatch {
    /// The source this batch belongs to.
    pub source_id: String,
    /// Results in extraction order, or a single placeholder.
    pub results: Vec<SearchResult>,
    /// Whether the batch was served from the result cache.
    pub from_cache: bool,
    /// The strategy of the successful attempt, `None` for cache hits and
    /// placeholders.
    pub strategy: Option<Strategy>,
}

impl SourceBatch {
    /// Whether this batch is a placeholder rather than real hits.
    pub fn is_error(&self) -> bool {
        self.results.iter().any(|r| r.is_error)
    }
}

/// Streamed once per completed source task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchProgress {
    /// The batch that just completed.
    pub batch: SourceBatch,
    /// Source tasks settled so far, including this one.
    pub completed: usize,
    /// Source tasks in the search.
    pub total: usize,
    /// Results accumulated across all settled sources.
    pub running_total: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    #[test]
    fn expression_joins_terms_with_or() {
        let q = SearchQuery::with_terms(["methotrexate", " folic acid "]);
        assert_eq!(q.expression(), "methotrexate OR folic acid");
    }

    #[test]
    fn cache_key_is_case_sensitive() {
        let a = SearchQuery::new("Methotrexate");
        let b = SearchQuery::new("methotrexate");
        assert_ne!(a.cache_key(), b.cache_key());
    }

    #[test]
    fn cache_key_includes_date_range() {
        let open = SearchQuery::new("aspirin");
        let ranged = SearchQuery::new("aspirin")
            .with_date_range(DateRange::between(date("2020-01-01"), date("2021-12-31")));
        assert_eq!(open.cache_key(), "aspirin");
        assert_eq!(ranged.cache_key(), "aspirin|2020-01-01..2021-12-31");
    }

    #[test]
    fn validate_rejects_empty_and_blank_terms() {
        assert!(SearchQuery::with_terms(Vec::<String>::new()).validate().is_err());
        assert!(SearchQuery::with_terms(["ok", "  "]).validate().is_err());
        assert!(SearchQuery::new("ok").validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let q = SearchQuery::new("x")
            .with_date_range(DateRange::between(date("2022-01-01"), date("2021-01-01")));
        let err = q.validate().unwrap_err();
        assert!(err.to_string().contains("after end"));
    }

    #[test]
    fn date_range_contains_is_inclusive() {
        let range = DateRange::between(date("2020-01-01"), date("2020-12-31"));
        assert!(range.contains(date("2020-01-01")));
        assert!(range.contains(date("2020-12-31")));
        assert!(!range.contains(date("2021-01-01")));
        assert!(DateRange::open().contains(date("1900-01-01")));
    }

    #[test]
    fn matches_text_ignores_case() {
        let q = SearchQuery::with_terms(["Paracetamol", "acetaminophen"]);
        assert!(q.matches_text("ACETAMINOPHEN tablets"));
        assert!(!q.matches_text("ibuprofen"));
    }

    #[test]
    fn error_placeholder_shape() {
        let source = SourceDescriptor::new("pubmed", "PubMed", "https://pubmed.ncbi.nlm.nih.gov/");
        let r = SearchResult::error_placeholder(&source, "timed out");
        assert_eq!(r.id, "pubmed-error");
        assert!(r.is_error);
        assert!(r.authors.is_empty());
        assert_eq!(r.date.len(), 10);
    }

    #[test]
    fn result_serializes_camel_case_and_skips_defaults() {
        let r = SearchResult {
            id: "x-0".into(),
            title: "T".into(),
            url: "https://x".into(),
            source: "X".into(),
            date: "2023-01-01".into(),
            snippet: String::new(),
            authors: vec![],
            relevance_score: Some(0.5),
            is_error: false,
        };
        let json = serde_json::to_value(&r).expect("serialize");
        assert_eq!(json["relevanceScore"], 0.5);
        assert!(json.get("isError").is_none());
    }

    #[test]
    fn partial_result_deserializes() {
        let r: SearchResult = serde_json::from_str(r#"{"id":"x","isError":true}"#).expect("parse");
        assert_eq!(r.id, "x");
        assert!(r.is_error);
        assert!(r.title.is_empty());
    }

    #[test]
    fn source_descriptor_uses_url_key() {
        let s: SourceDescriptor = serde_json::from_str(
            r#"{"id":"mhra","name":"MHRA","url":"https://products.mhra.gov.uk/","description":"UK"}"#,
        )
        .expect("parse");
        assert_eq!(s.base_url, "https://products.mhra.gov.uk/");
    }

    #[test]
    fn strategy_escalation_chain() {
        assert_eq!(Strategy::Api.escalate(), Some(Strategy::Proxy));
        assert_eq!(Strategy::Proxy.escalate(), Some(Strategy::AdvancedProxy));
        assert_eq!(Strategy::AdvancedProxy.escalate(), None);
        assert!(Strategy::Api < Strategy::AdvancedProxy);
    }

    #[test]
    fn strategy_serde_names() {
        let json = serde_json::to_string(&Strategy::AdvancedProxy).expect("serialize");
        assert_eq!(json, "\"advancedProxy\"");
        assert_eq!(Strategy::Proxy.to_string(), "proxy");
    }

    #[test]
    fn result_without_date_reads_back_as_today() {
        let today = crate::extract::date::today_iso();
        let missing: SearchResult = serde_json::from_str(r#"{"id":"job-1"}"#).expect("parse");
        assert_eq!(missing.date, today);
        let blank: SearchResult = serde_json::from_str(r#"{"id":"job-2","date":""}"#).expect("parse");
        assert_eq!(blank.date, today);
        let null: SearchResult = serde_json::from_str(r#"{"id":"job-3","date":null}"#).expect("parse");
        assert_eq!(null.date, today);
        let dated: SearchResult = serde_json::from_str(r#"{"id":"job-4","date":"2023-03-15"}"#).expect("parse");
        assert_eq!(dated.date, "2023-03-15");
    }
}
