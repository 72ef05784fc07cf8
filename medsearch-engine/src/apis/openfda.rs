//! openFDA drug labels (`/drug/label.json`).

use serde_json::Value;
use url::Url;

use super::{endpoint_url, first_str, ApiEndpoint};
use crate::error::FetchError;
use crate::extract::date::parse_compact;
use crate::extract::RawHit;
use crate::types::SearchQuery;

const OVERVIEW_URL: &str = "https://www.accessdata.fda.gov/scripts/cder/daf/index.cfm?event=overview.process";

/// Label fields tried, in order, for the snippet.
const SNIPPET_FIELDS: &[&str] = &["description", "indications_and_usage", "purpose"];

/// openFDA drug label search.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenFdaEndpoint;

impl OpenFdaEndpoint {
    /// The openFDA `search` expression: each term against generic, brand,
    /// and substance names, plus an `effective_time` window when set.
    pub fn search_expression(query: &SearchQuery) -> String {
        let names = query
            .terms()
            .iter()
            .map(|t| t.trim().replace('"', ""))
            .flat_map(|term| {
                ["generic_name", "brand_name", "substance_name"]
                    .map(|field| format!("openfda.{field}:\"{term}\""))
            })
            .collect::<Vec<_>>()
            .join(" OR ");
        let mut expression = format!("({names})");

        let range = query.date_range();
        if !range.is_open() {
            let from = range.from.map_or_else(|| "19000101".to_owned(), |d| d.format("%Y%m%d").to_string());
            let to = range.to.map_or_else(|| "29991231".to_owned(), |d| d.format("%Y%m%d").to_string());
            expression.push_str(&format!(" AND effective_time:[{from} TO {to}]"));
        }
        expression
    }
}

impl ApiEndpoint for OpenFdaEndpoint {
    fn source_id(&self) -> &'static str {
        "fda-drugs"
    }

    fn default_base_url(&self) -> &'static str {
        "https://api.fda.gov/drug"
    }

    fn search_url(&self, base: &str, query: &SearchQuery, max_results: usize) -> Result<Url, FetchError> {
        endpoint_url(
            base,
            "/label.json",
            &[
                ("search", Self::search_expression(query)),
                ("limit", max_results.to_string()),
            ],
        )
    }

    // openFDA answers "no matches" with 404 NOT_FOUND.
    fn not_found_is_empty(&self) -> bool {
        true
    }

    fn parse(&self, body: &Value) -> Result<Vec<RawHit>, FetchError> {
        let Some(results) = body.get("results") else {
            return if body.get("error").is_some() {
                Ok(Vec::new())
            } else {
                Err(FetchError::EmptyOrInvalidContent(
                    "openFDA response has no results".into(),
                ))
            };
        };
        let labels = results
            .as_array()
            .ok_or_else(|| FetchError::EmptyOrInvalidContent("openFDA results is not a list".into()))?;
        Ok(labels.iter().map(label_hit).collect())
    }
}

fn label_hit(label: &Value) -> RawHit {
    let openfda = label.get("openfda").unwrap_or(&Value::Null);
    let title = first_str(openfda, "brand_name")
        .or_else(|| first_str(openfda, "generic_name"))
        .unwrap_or("Unnamed drug")
        .to_owned();
    let url = match first_str(openfda, "application_number") {
        Some(number) => format!("{OVERVIEW_URL}&ApplNo={number}"),
        None => OVERVIEW_URL.to_owned(),
    };
    let snippet = SNIPPET_FIELDS
        .iter()
        .find_map(|field| first_str(label, field))
        .unwrap_or_default()
        .to_owned();

    RawHit {
        title,
        url,
        date: label
            .get("effective_time")
            .and_then(Value::as_str)
            .and_then(parse_compact),
        snippet,
        authors: first_str(openfda, "manufacturer_name")
            .map(|m| vec![m.to_owned()])
            .unwrap_or_default(),
        relevance_score: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DateRange;
    use chrono::NaiveDate;
    use serde_json::json;

    #[test]
    fn expression_covers_all_name_fields() {
        let expr = OpenFdaEndpoint::search_expression(&SearchQuery::new("methotrexate"));
        assert_eq!(
            expr,
            "(openfda.generic_name:\"methotrexate\" OR openfda.brand_name:\"methotrexate\" \
             OR openfda.substance_name:\"methotrexate\")"
        );
    }

    #[test]
    fn expression_adds_effective_time_window() {
        let from = NaiveDate::from_ymd_opt(2020, 1, 1).expect("date");
        let query = SearchQuery::new("aspirin").with_date_range(DateRange {
            from: Some(from),
            to: None,
        });
        let expr = OpenFdaEndpoint::search_expression(&query);
        assert!(expr.ends_with(" AND effective_time:[20200101 TO 29991231]"));
    }

    #[test]
    fn search_url_targets_label_json() {
        let url = OpenFdaEndpoint
            .search_url("https://api.test/drug", &SearchQuery::new("aspirin"), 7)
            .expect("url");
        assert!(url.as_str().starts_with("https://api.test/drug/label.json?search="));
        assert!(url.as_str().ends_with("&limit=7"));
    }

    #[test]
    fn parses_labels() {
        let body = json!({"results": [
            {"effective_time": "20210415",
             "indications_and_usage": ["Methotrexate is indicated for psoriasis."],
             "openfda": {"brand_name": ["Trexall"], "generic_name": ["METHOTREXATE"],
                         "manufacturer_name": ["Teva"], "application_number": ["ANDA040054"]}},
            {"openfda": {"generic_name": ["METHOTREXATE SODIUM"]}}
        ]});
        let hits = OpenFdaEndpoint.parse(&body).expect("parse");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Trexall");
        assert!(hits[0].url.ends_with("&ApplNo=ANDA040054"));
        assert_eq!(hits[0].authors, vec!["Teva"]);
        assert_eq!(hits[0].date, NaiveDate::from_ymd_opt(2021, 4, 15));
        assert_eq!(hits[0].snippet, "Methotrexate is indicated for psoriasis.");
        assert_eq!(hits[1].title, "METHOTREXATE SODIUM");
        assert!(hits[1].date.is_none());
        assert!(hits[1].authors.is_empty());
    }

    #[test]
    fn not_found_document_is_empty() {
        let body = json!({"error": {"code": "NOT_FOUND", "message": "No matches found!"}});
        assert!(OpenFdaEndpoint.parse(&body).expect("parse").is_empty());
        assert!(OpenFdaEndpoint.not_found_is_empty());
    }

    #[test]
    fn unexpected_shape_is_invalid_content() {
        assert!(OpenFdaEndpoint.parse(&json!({"meta": {}})).is_err());
        assert!(OpenFdaEndpoint.parse(&json!({"results": {}})).is_err());
    }
}
