//! Integration tests for the search orchestrator.
//!
//! Providers are scripted in-process (no network calls), so these tests
//! exercise caching, retry, escalation, rate limiting, cancellation and the
//! progress stream end to end.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use medsearch_engine::apis::ApiRegistry;
use medsearch_engine::extract::{Extractor, SiteRegistry};
use medsearch_engine::fetch::{FetchProvider, Payload, ProviderSet};
use medsearch_engine::retry::RetryConfig;
use medsearch_engine::{
    EngineConfig, FetchError, Orchestrator, SearchProgress, SearchQuery, SharedState, SourceDescriptor, Strategy,
};

type Respond = dyn Fn(&SourceDescriptor) -> Result<Payload, FetchError> + Send + Sync;

/// A provider answering from a closure and counting calls per source.
struct Scripted {
    respond: Box<Respond>,
    slow: Option<(&'static str, Duration)>,
    calls: Mutex<HashMap<String, usize>>,
}

impl Scripted {
    fn new(respond: impl Fn(&SourceDescriptor) -> Result<Payload, FetchError> + Send + Sync + 'static) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            slow: None,
            calls: Mutex::new(HashMap::new()),
        })
    }

    fn slow_for(
        source_id: &'static str,
        delay: Duration,
        respond: impl Fn(&SourceDescriptor) -> Result<Payload, FetchError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            respond: Box::new(respond),
            slow: Some((source_id, delay)),
            calls: Mutex::new(HashMap::new()),
        })
    }

    fn failing(error: FetchError) -> Arc<Self> {
        Self::new(move |_| Err(error.clone()))
    }

    fn calls(&self, source_id: &str) -> usize {
        self.calls.lock().expect("calls").get(source_id).copied().unwrap_or(0)
    }
}

#[async_trait]
impl FetchProvider for Scripted {
    async fn fetch(
        &self,
        source: &SourceDescriptor,
        _query: &SearchQuery,
        _timeout: Duration,
    ) -> Result<Payload, FetchError> {
        *self.calls.lock().expect("calls").entry(source.id.clone()).or_default() += 1;
        if let Some((slow_id, delay)) = self.slow {
            if source.id == slow_id {
                tokio::time::sleep(delay).await;
            }
        }
        (self.respond)(source)
    }
}

const RESULTS_PAGE: &str = r#"<html><body>
<header><a href="/">Home of the site</a></header>
<div class="results">
  <div class="result"><h3><a href="/a1">Methotrexate and folate</a></h3><p>Summary one</p></div>
  <div class="result"><h3><a href="/a2">Methotrexate toxicity</a></h3><p>Summary two</p></div>
</div>
</body></html>"#;

fn html_page(source: &SourceDescriptor, aggressive: bool) -> Payload {
    Payload::Html {
        body: RESULTS_PAGE.to_owned(),
        base_url: source.base_url.clone(),
        aggressive,
    }
}

fn openfda_labels() -> Payload {
    Payload::Structured {
        source_id: "fda-drugs".into(),
        body: json!({"results": [
            {"effective_time": "20210415",
             "indications_and_usage": ["Methotrexate is indicated for rheumatoid arthritis."],
             "openfda": {"brand_name": ["Trexall"], "manufacturer_name": ["Teva"],
                         "application_number": ["ANDA040054"]}},
            {"openfda": {"generic_name": ["METHOTREXATE SODIUM"]}}
        ]}),
    }
}

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig {
        max_retries,
        initial_delay_ms: 10,
        max_delay_ms: 100,
        backoff_factor: 2.0,
        jitter_factor: 0.0,
    }
}

fn config(max_retries: u32) -> EngineConfig {
    EngineConfig {
        retry: fast_retry(max_retries),
        ..EngineConfig::default()
    }
}

fn build(config: EngineConfig, api: Arc<Scripted>, proxy: Arc<Scripted>, advanced: Arc<Scripted>) -> Orchestrator {
    let apis = Arc::new(ApiRegistry::builtin());
    let extractor = Extractor::new(SiteRegistry::builtin().expect("sites"), apis, config.max_results_per_source)
        .expect("extractor");
    let providers = ProviderSet {
        api,
        proxy,
        advanced,
    };
    let state = SharedState::shared(&config);
    Orchestrator::new(config, state, providers, extractor).expect("orchestrator")
}

fn source(id: &str) -> SourceDescriptor {
    SourceDescriptor::new(id, id.to_uppercase(), format!("https://{id}.example/"))
}

async fn drain(run: &mut medsearch_engine::SearchRun) -> Vec<SearchProgress> {
    let mut events = Vec::new();
    while let Some(progress) = run.next_progress().await {
        events.push(progress);
    }
    events
}

#[tokio::test(start_paused = true)]
async fn methotrexate_end_to_end() {
    let api = Scripted::new(|source| match source.id.as_str() {
        "fda-drugs" => Ok(openfda_labels()),
        _ => Err(FetchError::Timeout("esearch".into())),
    });
    let proxy = Scripted::failing(FetchError::Timeout("page".into()));
    let advanced = Scripted::failing(FetchError::Timeout("page".into()));
    let orch = build(config(3), api.clone(), proxy.clone(), advanced.clone());

    let sources = vec![
        SourceDescriptor::new("fda-drugs", "FDA - Drugs", "https://www.fda.gov/"),
        SourceDescriptor::new("pubmed", "PubMed", "https://pubmed.ncbi.nlm.nih.gov/"),
    ];
    let mut run = orch
        .search(SearchQuery::new("methotrexate"), sources, CancellationToken::new())
        .expect("search");
    let events = drain(&mut run).await;
    let results = run.finish().await;

    assert_eq!(events.len(), 2);
    assert_eq!(events.last().map(|e| (e.completed, e.total, e.running_total)), Some((2, 2, 3)));

    let mut ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["fda-drugs-1", "fda-drugs-2", "pubmed-error"]);

    let trexall = results.iter().find(|r| r.id == "fda-drugs-1").expect("first label");
    assert_eq!(trexall.title, "Trexall");
    assert_eq!(trexall.source, "FDA - Drugs");
    assert_eq!(trexall.date, "2021-04-15");
    assert_eq!(trexall.authors, vec!["Teva"]);

    let placeholder = results.iter().find(|r| r.is_error).expect("placeholder");
    assert_eq!(placeholder.source, "PubMed");
    assert!(placeholder.snippet.contains("4 attempts"), "{}", placeholder.snippet);

    // Two API attempts degrade the API; the failure streak then selects the advanced fetch.
    assert_eq!(api.calls("pubmed"), 2);
    assert_eq!(proxy.calls("pubmed"), 0);
    assert_eq!(advanced.calls("pubmed"), 2);

    let pubmed = orch.state().health.health("pubmed");
    assert!(!pubmed.available);
    assert!(pubmed.api_degraded);
    assert!(orch.state().health.health("fda-drugs").available);
}

#[tokio::test(start_paused = true)]
async fn one_batch_per_source() {
    let proxy = Scripted::new(|source| match source.id.as_str() {
        "broken" => Err(FetchError::HttpError(500)),
        _ => Ok(html_page(source, false)),
    });
    let advanced = Scripted::failing(FetchError::HttpError(500));
    let orch = build(config(1), Scripted::failing(FetchError::Timeout("unused".into())), proxy, advanced);

    let ids = ["medsafe", "bmj", "embase", "broken", "nejm"];
    let sources = ids.iter().map(|id| source(id)).collect();
    let run = orch
        .search(SearchQuery::new("methotrexate"), sources, CancellationToken::new())
        .expect("search");
    let events: Vec<SearchProgress> = run.collect().await;

    assert_eq!(events.len(), ids.len());
    let mut seen: Vec<&str> = events.iter().map(|e| e.batch.source_id.as_str()).collect();
    seen.sort_unstable();
    let mut expected = ids.to_vec();
    expected.sort_unstable();
    assert_eq!(seen, expected);

    let completed: Vec<usize> = events.iter().map(|e| e.completed).collect();
    assert_eq!(completed, vec![1, 2, 3, 4, 5]);
    assert!(events.iter().all(|e| e.total == 5));

    let by_id: HashMap<&str, &SearchProgress> = events.iter().map(|e| (e.batch.source_id.as_str(), e)).collect();
    assert!(by_id["embase"].batch.is_error());
    assert!(by_id["broken"].batch.is_error());
    assert_eq!(by_id["medsafe"].batch.results.len(), 2);
    assert_eq!(by_id["medsafe"].batch.results[0].id, "medsafe-1");
    assert_eq!(by_id["medsafe"].batch.strategy, Some(Strategy::Proxy));
}

#[tokio::test(start_paused = true)]
async fn retry_source_is_served_from_warm_cache() {
    let proxy = Scripted::new(|source| Ok(html_page(source, false)));
    let orch = build(
        config(0),
        Scripted::failing(FetchError::Timeout("unused".into())),
        proxy.clone(),
        Scripted::failing(FetchError::HttpError(500)),
    );
    let query = SearchQuery::new("methotrexate");
    let medsafe = source("medsafe");

    let first = orch
        .search(query.clone(), vec![medsafe.clone()], CancellationToken::new())
        .expect("search")
        .finish()
        .await;
    assert_eq!(first.len(), 2);
    assert_eq!(proxy.calls("medsafe"), 1);

    let batch = orch.retry_source(&query, &medsafe, &CancellationToken::new()).await;
    assert!(batch.from_cache);
    assert_eq!(batch.strategy, None);
    assert_eq!(batch.results, first);
    assert_eq!(proxy.calls("medsafe"), 1);

    // A different query key is a miss.
    let other = orch
        .retry_source(&SearchQuery::new("Methotrexate"), &medsafe, &CancellationToken::new())
        .await;
    assert!(!other.from_cache);
    assert_eq!(proxy.calls("medsafe"), 2);
}

#[tokio::test(start_paused = true)]
async fn blocked_page_escalates_to_advanced_fetch() {
    let proxy = Scripted::failing(FetchError::FetchBlocked("captcha".into()));
    let advanced = Scripted::new(|source| Ok(html_page(source, true)));
    let orch = build(
        config(3),
        Scripted::failing(FetchError::Timeout("unused".into())),
        proxy.clone(),
        advanced.clone(),
    );

    let batch = orch
        .retry_source(&SearchQuery::new("methotrexate"), &source("nejm"), &CancellationToken::new())
        .await;
    assert!(!batch.is_error());
    assert_eq!(batch.strategy, Some(Strategy::AdvancedProxy));
    assert_eq!(batch.results[0].title, "Methotrexate and folate");
    assert_eq!(batch.results[0].url, "https://nejm.example/a1");
    assert_eq!(proxy.calls("nejm"), 1);
    assert_eq!(advanced.calls("nejm"), 1);
    assert!(orch.state().health.health("nejm").available);
}

#[tokio::test(start_paused = true)]
async fn blocked_advanced_fetch_stops_retrying() {
    let proxy = Scripted::failing(FetchError::FetchBlocked("captcha".into()));
    let advanced = Scripted::failing(FetchError::FetchBlocked("access denied".into()));
    let orch = build(
        config(3),
        Scripted::failing(FetchError::Timeout("unused".into())),
        proxy.clone(),
        advanced.clone(),
    );

    let batch = orch
        .retry_source(&SearchQuery::new("methotrexate"), &source("nejm"), &CancellationToken::new())
        .await;
    assert!(batch.is_error());
    assert_eq!(batch.results[0].id, "nejm-error");
    assert!(batch.results[0].snippet.contains("2 attempts"));
    assert_eq!(proxy.calls("nejm") + advanced.calls("nejm"), 2);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_denies_call_beyond_budget() {
    let mut cfg = config(0);
    cfg.cache_ttl_seconds = 0;
    cfg.rate_limits = HashMap::from([("medsafe".to_owned(), 1)]);
    let proxy = Scripted::new(|source| Ok(html_page(source, false)));
    let orch = build(
        cfg,
        Scripted::failing(FetchError::Timeout("unused".into())),
        proxy.clone(),
        Scripted::failing(FetchError::HttpError(500)),
    );
    let query = SearchQuery::new("methotrexate");

    let first = orch.retry_source(&query, &source("medsafe"), &CancellationToken::new()).await;
    assert!(!first.is_error());

    let second = orch.retry_source(&query, &source("medsafe"), &CancellationToken::new()).await;
    assert!(second.is_error());
    assert!(second.results[0].snippet.contains("rate limited"));
    assert_eq!(proxy.calls("medsafe"), 1);
}

#[tokio::test]
async fn cancellation_keeps_settled_batches() {
    let mut cfg = config(0);
    cfg.standard_timeout_seconds = 600;
    let proxy = Scripted::slow_for("sluggish", Duration::from_secs(300), |source| Ok(html_page(source, false)));
    let orch = build(
        cfg,
        Scripted::failing(FetchError::Timeout("unused".into())),
        proxy,
        Scripted::failing(FetchError::HttpError(500)),
    );

    let cancel = CancellationToken::new();
    let mut run = orch
        .search(
            SearchQuery::new("methotrexate"),
            vec![source("quick"), source("sluggish")],
            cancel.clone(),
        )
        .expect("search");

    let first = run.next_progress().await.expect("first batch");
    assert_eq!(first.batch.source_id, "quick");
    cancel.cancel();

    let results = tokio::time::timeout(Duration::from_secs(5), run.finish())
        .await
        .expect("finish promptly after cancel");
    assert_eq!(results.len(), 2);
    assert!(results.iter().all(|r| r.id.starts_with("quick-")));
}
