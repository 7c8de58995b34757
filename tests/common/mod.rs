#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use leadscout::services::{
    build_http_client, DiscoveryConfig, DomainDiscoveryService, DomainIntelligence,
    MentionSearcher, OrchestratorConfig, PageFetcher, RegexHtmlExtractor, ScrapeOrchestrator,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const TEST_USER_AGENT: &str = "LeadScoutTest/0.1";

/// Domain intelligence source answering a fixed list.
pub struct FixedIntelligence(pub Vec<&'static str>);

#[async_trait]
impl DomainIntelligence for FixedIntelligence {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn lookup_domains(&self, limit: usize) -> anyhow::Result<Vec<String>> {
        Ok(self.0.iter().take(limit).map(|d| d.to_string()).collect())
    }
}

/// Origin template sending every domain to `server`.
pub fn origin_template_for(server: &MockServer) -> String {
    format!("http://{{domain}}:{}", server.address().port())
}

/// Number of requests `server` received for `url_path`.
pub async fn requests_to(server: &MockServer, url_path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.url.path() == url_path)
        .count()
}

/// Builds a results page in the markup the HTML search endpoint serves.
pub fn search_results_html(urls: &[String]) -> String {
    let results: String = urls
        .iter()
        .enumerate()
        .map(|(i, url)| {
            format!(
                r#"<div class="result">
                     <h2><a rel="nofollow" class="result__a" href="{url}">Result {i}</a></h2>
                     <a class="result__snippet" href="{url}">Snippet {i}</a>
                   </div>"#,
            )
        })
        .collect();

    format!("<html><body>{}</body></html>", results)
}

/// Mounts the search endpoint at `/html/` answering the mention query for `competitor`.
pub async fn mount_search(server: &MockServer, competitor: &str, urls: &[String]) {
    Mock::given(method("GET"))
        .and(path("/html/"))
        .and(query_param("q", format!(r#""{}" contact email"#, competitor)))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(search_results_html(urls))
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Mounts an HTML page at `url_path`.
pub async fn mount_page(server: &MockServer, url_path: &str, html: &str) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(html.to_string())
                .insert_header("content-type", "text/html; charset=utf-8"),
        )
        .mount(server)
        .await;
}

/// Mounts a page that answers only after `delay`.
pub async fn mount_slow_page(server: &MockServer, url_path: &str, delay: Duration) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("<html><body>Acme</body></html>")
                .set_delay(delay),
        )
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, url_path: &str, status: u16) {
    Mock::given(method("GET"))
        .and(path(url_path))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
}

pub fn fetcher_with_timeout(timeout: Duration) -> Arc<PageFetcher> {
    let client = build_http_client(TEST_USER_AGENT, timeout).unwrap();
    Arc::new(PageFetcher::new(client, Arc::new(RegexHtmlExtractor)))
}

/// Orchestrator searching through `server`.
pub fn build_orchestrator(
    server: &MockServer,
    fetcher: Arc<PageFetcher>,
    discovery: DomainDiscoveryService,
    config: OrchestratorConfig,
) -> ScrapeOrchestrator {
    let search_client = build_http_client(TEST_USER_AGENT, Duration::from_secs(5)).unwrap();
    let searcher = Arc::new(MentionSearcher::new(
        search_client,
        format!("{}/html/", server.uri()),
    ));

    ScrapeOrchestrator::new(Arc::new(discovery), searcher, fetcher, config)
}

/// Orchestrator pointed at `server`, with discovery and the privacy crawl switched off.
pub fn test_orchestrator(server: &MockServer, page_timeout: Duration) -> ScrapeOrchestrator {
    test_orchestrator_with_delay(server, page_timeout, Duration::ZERO)
}

pub fn test_orchestrator_with_delay(
    server: &MockServer,
    page_timeout: Duration,
    page_delay: Duration,
) -> ScrapeOrchestrator {
    let fetcher = fetcher_with_timeout(page_timeout);
    let discovery =
        DomainDiscoveryService::new(fetcher.clone(), TEST_USER_AGENT, DiscoveryConfig::disabled());

    build_orchestrator(
        server,
        fetcher,
        discovery,
        OrchestratorConfig {
            page_delay,
            enable_privacy_crawl: false,
            ..Default::default()
        },
    )
}
