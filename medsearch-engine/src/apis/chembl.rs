//! ChEMBL molecule search.

use serde_json::Value;
use url::Url;

use super::{endpoint_url, ApiEndpoint};
use crate::error::FetchError;
use crate::extract::RawHit;
use crate::types::SearchQuery;

const REPORT_CARD_URL: &str = "https://www.ebi.ac.uk/chembl/compound_report_card";

/// ChEMBL `molecule/search`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChemblEndpoint;

impl ApiEndpoint for ChemblEndpoint {
    fn source_id(&self) -> &'static str {
        "chembl"
    }

    fn default_base_url(&self) -> &'static str {
        "https://www.ebi.ac.uk/chembl/api/data"
    }

    fn search_url(&self, base: &str, query: &SearchQuery, max_results: usize) -> Result<Url, FetchError> {
        endpoint_url(
            base,
            "/molecule/search",
            &[
                ("q", query.terms().join(" ")),
                ("limit", max_results.to_string()),
                ("format", "json".to_owned()),
            ],
        )
    }

    fn parse(&self, body: &Value) -> Result<Vec<RawHit>, FetchError> {
        let molecules = body
            .get("molecules")
            .and_then(Value::as_array)
            .ok_or_else(|| FetchError::EmptyOrInvalidContent("ChEMBL response has no molecules".into()))?;
        Ok(molecules.iter().filter_map(molecule_hit).collect())
    }
}

fn molecule_hit(molecule: &Value) -> Option<RawHit> {
    let chembl_id = molecule.get("molecule_chembl_id")?.as_str()?.trim();
    if chembl_id.is_empty() {
        return None;
    }
    let title = molecule
        .get("pref_name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .map_or_else(|| format!("ChEMBL: {chembl_id}"), str::to_owned);

    Some(RawHit {
        title,
        url: format!("{REPORT_CARD_URL}/{chembl_id}/"),
        date: None,
        snippet: describe(chembl_id, molecule),
        authors: Vec::new(),
        relevance_score: None,
    })
}

/// One-line summary: id, molecule type, development phase, formula, weight.
fn describe(chembl_id: &str, molecule: &Value) -> String {
    let mut parts = vec![chembl_id.to_owned()];
    if let Some(kind) = molecule.get("molecule_type").and_then(Value::as_str) {
        parts.push(kind.to_owned());
    }
    let phase = match molecule.get("max_phase") {
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    };
    if let Some(phase) = phase {
        parts.push(format!("max phase {phase}"));
    }
    let properties = molecule.get("molecule_properties").unwrap_or(&Value::Null);
    if let Some(formula) = properties.get("full_molformula").and_then(Value::as_str) {
        parts.push(formula.to_owned());
    }
    if let Some(weight) = properties.get("full_mwt").and_then(Value::as_str) {
        parts.push(format!("MW {weight}"));
    }
    parts.join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn search_url_requests_json() {
        let url = ChemblEndpoint
            .search_url("https://chembl.test/data", &SearchQuery::new("methotrexate"), 10)
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://chembl.test/data/molecule/search?q=methotrexate&limit=10&format=json"
        );
    }

    #[test]
    fn parses_molecules() {
        let body = json!({"molecules": [
            {"molecule_chembl_id": "CHEMBL34259", "pref_name": "METHOTREXATE",
             "molecule_type": "Small molecule", "max_phase": "4.0",
             "molecule_properties": {"full_molformula": "C20H22N8O5", "full_mwt": "454.44"}},
            {"molecule_chembl_id": "CHEMBL1", "pref_name": null},
            {"pref_name": "NO ID"}
        ]});
        let hits = ChemblEndpoint.parse(&body).expect("parse");
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "METHOTREXATE");
        assert_eq!(
            hits[0].url,
            "https://www.ebi.ac.uk/chembl/compound_report_card/CHEMBL34259/"
        );
        assert_eq!(
            hits[0].snippet,
            "CHEMBL34259; Small molecule; max phase 4.0; C20H22N8O5; MW 454.44"
        );
        assert_eq!(hits[1].title, "ChEMBL: CHEMBL1");
        assert!(hits[1].date.is_none());
    }

    #[test]
    fn missing_molecules_is_invalid() {
        assert!(ChemblEndpoint.parse(&json!({"page_meta": {}})).is_err());
    }
}
