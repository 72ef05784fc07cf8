//! EMA medicines search API.
//!
//! The endpoint answers with a bare JSON list of medicine records; some
//! deployments wrap it as `{"data": [...]}` or `{"results": [...]}`.

use chrono::NaiveDate;
use serde_json::Value;
use url::Url;

use super::{endpoint_url, first_str, ApiEndpoint};
use crate::error::FetchError;
use crate::extract::text::strip_markup;
use crate::extract::{urls, RawHit};
use crate::types::SearchQuery;

/// Site root that relative medicine links resolve against.
const SITE: &str = "https://www.ema.europa.eu/";

/// EMA medicines search.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmaEndpoint;

impl ApiEndpoint for EmaEndpoint {
    fn source_id(&self) -> &'static str {
        "ema-medicines"
    }

    fn default_base_url(&self) -> &'static str {
        "https://www.ema.europa.eu/en/medicines/api"
    }

    fn search_url(&self, base: &str, query: &SearchQuery, max_results: usize) -> Result<Url, FetchError> {
        endpoint_url(
            base,
            "/medicines",
            &[
                ("search_api_fulltext", query.expression()),
                ("items_per_page", max_results.to_string()),
            ],
        )
    }

    fn parse(&self, body: &Value) -> Result<Vec<RawHit>, FetchError> {
        let records = body
            .as_array()
            .or_else(|| body.get("data").and_then(Value::as_array))
            .or_else(|| body.get("results").and_then(Value::as_array))
            .ok_or_else(|| FetchError::EmptyOrInvalidContent("EMA response is not a list".into()))?;
        Ok(records.iter().filter_map(medicine_hit).collect())
    }
}

fn medicine_hit(record: &Value) -> Option<RawHit> {
    let title = first_str(record, "title")?.to_owned();
    let url = first_str(record, "url")
        .and_then(|href| urls::resolve(SITE, href))
        .unwrap_or_else(|| SITE.to_owned());
    let snippet = first_str(record, "field_overview")
        .or_else(|| first_str(record, "field_therapeutic_area"))
        .map(strip_markup)
        .unwrap_or_default();

    Some(RawHit {
        title,
        url,
        date: first_str(record, "field_authorisation_date").and_then(parse_authorisation_date),
        snippet,
        authors: first_str(record, "field_authorisation_holder")
            .map(|h| vec![h.to_owned()])
            .unwrap_or_default(),
        relevance_score: None,
    })
}

/// Authorisation dates come as `YYYY-MM-DD`, `DD/MM/YYYY`, `YYYYMMDD`, or
/// a full ISO timestamp.
fn parse_authorisation_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let candidates = [raw, raw.get(..10).unwrap_or(raw)];
    candidates.iter().find_map(|text| {
        ["%Y-%m-%d", "%d/%m/%Y", "%Y%m%d"]
            .iter()
            .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_url_uses_fulltext_param() {
        let url = EmaEndpoint
            .search_url("https://ema.test/api", &SearchQuery::new("methotrexate"), 10)
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://ema.test/api/medicines?search_api_fulltext=methotrexate&items_per_page=10"
        );
    }

    #[test]
    fn parses_bare_list() {
        let body = json!([
            {"title": "Jylamvo", "url": "/en/medicines/human/EPAR/jylamvo",
             "field_authorisation_date": "29/03/2017",
             "field_overview": "<p>Jylamvo is a medicine used to treat <b>arthritis</b>.</p>",
             "field_authorisation_holder": "Therakind"},
            {"title": "Nordimet", "field_therapeutic_area": "Psoriasis",
             "field_authorisation_date": "2016-08-18T00:00:00Z"},
            {"url": "/no-title"}
        ]);
        let hits = EmaEndpoint.parse(&body).expect("parse");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].url, "https://www.ema.europa.eu/en/medicines/human/EPAR/jylamvo");
        assert_eq!(hits[0].snippet, "Jylamvo is a medicine used to treat arthritis.");
        assert_eq!(hits[0].authors, vec!["Therakind"]);
        assert_eq!(hits[0].date, NaiveDate::from_ymd_opt(2017, 3, 29));
        assert_eq!(hits[1].snippet, "Psoriasis");
        assert_eq!(hits[1].date, NaiveDate::from_ymd_opt(2016, 8, 18));
        assert_eq!(hits[1].url, SITE);
    }

    #[test]
    fn parses_wrapped_list() {
        let body = json!({"data": [{"title": "Nordimet"}]});
        assert_eq!(EmaEndpoint.parse(&body).expect("parse").len(), 1);
    }

    #[test]
    fn rejects_non_list() {
        assert!(EmaEndpoint.parse(&json!({"message": "oops"})).is_err());
    }

    #[test]
    fn authorisation_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2020, 5, 4);
        assert_eq!(parse_authorisation_date("2020-05-04"), expected);
        assert_eq!(parse_authorisation_date("04/05/2020"), expected);
        assert_eq!(parse_authorisation_date("20200504"), expected);
        assert_eq!(parse_authorisation_date("2020-05-04T10:00:00+02:00"), expected);
        assert_eq!(parse_authorisation_date("soon"), None);
    }
}
