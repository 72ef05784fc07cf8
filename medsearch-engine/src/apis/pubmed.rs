//! PubMed via NCBI E-utilities: `esearch` for ids, then `esummary` for
//! the article summaries.

use serde_json::Value;
use url::Url;

use super::{endpoint_url, ApiEndpoint};
use crate::error::FetchError;
use crate::extract::date::{parse_pubdate, today};
use crate::extract::RawHit;
use crate::types::SearchQuery;

/// Identifies this client to NCBI.
const TOOL: &str = "medsearch";
const ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// PubMed E-utilities endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct PubMedEndpoint;

impl ApiEndpoint for PubMedEndpoint {
    fn source_id(&self) -> &'static str {
        "pubmed"
    }

    fn default_base_url(&self) -> &'static str {
        "https://eutils.ncbi.nlm.nih.gov/entrez/eutils"
    }

    fn search_url(&self, base: &str, query: &SearchQuery, max_results: usize) -> Result<Url, FetchError> {
        let mut params = vec![
            ("db", "pubmed".to_owned()),
            ("term", query.expression()),
            ("retmax", max_results.to_string()),
            ("retmode", "json".to_owned()),
            ("tool", TOOL.to_owned()),
        ];
        let range = query.date_range();
        if !range.is_open() {
            let min = range.from.map_or_else(|| "1800/01/01".to_owned(), |d| d.format("%Y/%m/%d").to_string());
            let max = range.to.unwrap_or_else(today).format("%Y/%m/%d").to_string();
            params.push(("datetype", "pdat".to_owned()));
            params.push(("mindate", min));
            params.push(("maxdate", max));
        }
        endpoint_url(base, "/esearch.fcgi", &params)
    }

    fn follow_up_url(&self, base: &str, first: &Value) -> Result<Option<Url>, FetchError> {
        let ids = id_list(first)?;
        if ids.is_empty() {
            return Ok(None);
        }
        let params = [
            ("db", "pubmed".to_owned()),
            ("id", ids.join(",")),
            ("retmode", "json".to_owned()),
            ("tool", TOOL.to_owned()),
        ];
        endpoint_url(base, "/esummary.fcgi", &params).map(Some)
    }

    fn parse(&self, body: &Value) -> Result<Vec<RawHit>, FetchError> {
        // An esearch document with no ids reaches here when there was no follow-up.
        if body.get("esearchresult").is_some() {
            return Ok(Vec::new());
        }
        let result = body
            .get("result")
            .ok_or_else(|| FetchError::EmptyOrInvalidContent("esummary response has no result".into()))?;
        let uids: Vec<&str> = result
            .get("uids")
            .and_then(Value::as_array)
            .map(|uids| uids.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let hits = uids
            .into_iter()
            .filter_map(|uid| result.get(uid).map(|article| article_hit(uid, article)))
            .collect();
        Ok(hits)
    }
}

fn id_list(esearch: &Value) -> Result<Vec<String>, FetchError> {
    let ids = esearch
        .get("esearchresult")
        .and_then(|r| r.get("idlist"))
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::EmptyOrInvalidContent("esearch response has no idlist".into()))?;
    Ok(ids.iter().filter_map(Value::as_str).map(str::to_owned).collect())
}

fn article_hit(uid: &str, article: &Value) -> RawHit {
    let text = |key: &str| {
        article
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default()
            .to_owned()
    };
    let authors = article
        .get("authors")
        .and_then(Value::as_array)
        .map(|authors| {
            authors
                .iter()
                .filter_map(|a| a.get("name").and_then(Value::as_str))
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default();

    let pubdate = text("pubdate");
    let journal = Some(text("fulljournalname"))
        .filter(|j| !j.is_empty())
        .unwrap_or_else(|| text("source"));
    let snippet = [journal, pubdate.clone()]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(". ");

    RawHit {
        title: text("title"),
        url: format!("{ARTICLE_URL}/{uid}/"),
        date: parse_pubdate(&pubdate),
        snippet,
        authors,
        relevance_score: None,
    }
}
