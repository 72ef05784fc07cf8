//! Extraction through the public [`Extractor`] entry point.

use std::sync::Arc;

use medsearch_engine::apis::ApiRegistry;
use medsearch_engine::extract::{Extractor, SiteRegistry};
use medsearch_engine::fetch::Payload;
use medsearch_engine::{DateRange, FetchError, SearchQuery, SourceDescriptor};

fn extractor() -> Extractor {
    Extractor::new(SiteRegistry::builtin().expect("sites"), Arc::new(ApiRegistry::builtin()), 10).expect("extractor")
}

fn page(body: &str, aggressive: bool) -> Payload {
    Payload::Html {
        body: body.to_owned(),
        base_url: "https://www.swissmedic.ch/".to_owned(),
        aggressive,
    }
}

fn swissmedic() -> SourceDescriptor {
    SourceDescriptor::new("swissmedic", "Swissmedic", "https://www.swissmedic.ch/")
}

#[test]
fn container_pass_reads_cards_without_headings() {
    let body = r#"<html><body>
        <nav><a href="/en/home.html">Swissmedic home page</a></nav>
        <ul>
          <li class="list-item"><a href="/hpc/mtx-2023.html">Methotrexate: DHPC weekly dosing</a>
              <p>Risk of fatal overdose.</p><span class="date">02.05.2023</span></li>
          <li class="list-item"><a href="/hpc/mtx-2019.html">Methotrexate: prior notice</a>
              <span class="date">11.11.2019</span></li>
        </ul>
    </body></html>"#;
    let query = SearchQuery::new("methotrexate").with_date_range(DateRange::between(
        chrono::NaiveDate::from_ymd_opt(2020, 1, 1).expect("date"),
        chrono::NaiveDate::from_ymd_opt(2024, 12, 31).expect("date"),
    ));
    let results = extractor()
        .extract(&swissmedic(), &page(body, false), &query)
        .expect("results");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, "swissmedic-1");
    assert_eq!(results[0].title, "Methotrexate: DHPC weekly dosing");
    assert_eq!(results[0].url, "https://www.swissmedic.ch/hpc/mtx-2023.html");
    assert_eq!(results[0].date, "2023-05-02");
    assert_eq!(results[0].snippet, "Risk of fatal overdose.");
}

#[test]
fn anchor_pass_is_last_resort() {
    let body = r#"<html><body>
        <header><a href="/en/search.html">Search the website</a></header>
        <div><span><a href="/docs/mtx.pdf">Methotrexate product information</a></span></div>
        <div><a href="/x">tiny</a></div>
    </body></html>"#;
    let results = extractor()
        .extract(&swissmedic(), &page(body, false), &SearchQuery::new("methotrexate"))
        .expect("results");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].url, "https://www.swissmedic.ch/docs/mtx.pdf");
}

#[test]
fn aggressive_pass_runs_only_when_authorized() {
    let body = r#"<html><body>
        <div><span>Methotrexate shortage notice</span><a href="/notice">more</a></div>
    </body></html>"#;
    let query = SearchQuery::new("methotrexate");

    let err = extractor()
        .extract(&swissmedic(), &page(body, false), &query)
        .unwrap_err();
    assert!(matches!(err, FetchError::ExtractionFailure(_)));

    let results = extractor()
        .extract(&swissmedic(), &page(body, true), &query)
        .expect("aggressive results");
    assert_eq!(results[0].url, "https://www.swissmedic.ch/notice");
}
