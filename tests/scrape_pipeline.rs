mod common;

use std::{
    sync::{Arc, Mutex},
    time::{Duration, Instant},
};

use common::{
    build_orchestrator, fetcher_with_timeout, mount_page, mount_search, mount_slow_page,
    mount_status, origin_template_for, requests_to, test_orchestrator,
    test_orchestrator_with_delay, FixedIntelligence, TEST_USER_AGENT,
};
use leadscout::services::{
    DiscoveryConfig, DomainDiscoveryService, NullSink, OrchestratorConfig, ProgressEvent,
    ProgressPhase, ScrapeError, ScrapeEventSink,
};
use wiremock::MockServer;

const ACME_PARTNER_PAGE: &str = r#"
<html>
  <head><title>Mueller Bau - Home</title></head>
  <body>
    <p>Acme is a rival of ours.</p>
    <p>Ansprechpartnerin: Jane Doe <a href="mailto:jane.doe@example.org">jane.doe@example.org</a></p>
    <p>Technik: admin@example.org</p>
  </body>
</html>
"#;

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<ProgressEvent>>,
}

impl ScrapeEventSink for RecordingSink {
    fn publish(&self, event: ProgressEvent) {
        self.events.lock().unwrap().push(event);
    }
}

#[tokio::test]
async fn scrape_finds_lead_on_mentioning_page() {
    let server = MockServer::start().await;
    mount_search(&server, "Acme", &[format!("{}/partner", server.uri())]).await;
    mount_page(&server, "/partner", ACME_PARTNER_PAGE).await;

    let orchestrator = test_orchestrator(&server, Duration::from_secs(5));
    let sink = RecordingSink::default();

    let result = orchestrator.run("Acme", 0, &sink).await.unwrap();

    assert_eq!(result.total_searched, 1);
    assert_eq!(result.total_leads_found, 1);
    assert_eq!(result.leads.len(), 1);
    assert_eq!(result.leads[0].email, "jane.doe@example.org");
    assert_eq!(result.leads[0].domain, "127.0.0.1");
    assert_eq!(result.leads[0].source_url, format!("{}/partner", server.uri()));
    assert_eq!(result.companies.len(), 1);
    assert_eq!(result.companies[0].domain, "127.0.0.1");
    assert_eq!(result.companies[0].name, "Mueller Bau");
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    // Lead extraction plus the company-name fetch for the newly seen domain.
    assert_eq!(requests_to(&server, "/partner").await, 2);

    let events = sink.events.lock().unwrap();
    assert_eq!(events.first().map(|e| e.phase), Some(ProgressPhase::Init));
    assert!(events
        .windows(2)
        .all(|pair| pair[0].phase <= pair[1].phase));
    assert!(events.iter().all(|e| (0.0..=1.0).contains(&e.progress)));
}

#[tokio::test]
async fn scrape_with_no_search_results_reports_error() {
    let server = MockServer::start().await;
    mount_search(&server, "Acme", &[]).await;

    let orchestrator = test_orchestrator(&server, Duration::from_secs(5));

    let result = orchestrator.run("Acme", 0, &NullSink).await.unwrap();

    assert_eq!(result.total_searched, 0);
    assert!(result.leads.is_empty());
    assert!(result.companies.is_empty());
    assert!(!result.errors.is_empty());
}

#[tokio::test]
async fn scrape_survives_search_failure() {
    let server = MockServer::start().await;
    mount_status(&server, "/html/", 500).await;

    let orchestrator = test_orchestrator(&server, Duration::from_secs(5));

    let result = orchestrator.run("Acme", 0, &NullSink).await.unwrap();

    assert!(result.search_results.is_empty());
    assert!(result.leads.is_empty());
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("500"), "{}", result.errors[0]);
}

#[tokio::test]
async fn scrape_continues_after_page_timeout() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "Acme",
        &[
            format!("{}/slow", server.uri()),
            format!("{}/partner", server.uri()),
        ],
    )
    .await;
    mount_slow_page(&server, "/slow", Duration::from_secs(3)).await;
    mount_page(&server, "/partner", ACME_PARTNER_PAGE).await;

    let orchestrator = test_orchestrator(&server, Duration::from_millis(300));

    let result = orchestrator.run("Acme", 0, &NullSink).await.unwrap();

    assert_eq!(result.total_searched, 2);
    assert_eq!(result.errors.len(), 1);
    assert!(result.errors[0].contains("timed out"), "{}", result.errors[0]);
    assert_eq!(result.leads.len(), 1);
    assert_eq!(result.leads[0].email, "jane.doe@example.org");
    assert!(result.is_partial());
}

#[tokio::test]
async fn scrape_ignores_pages_without_mention() {
    let server = MockServer::start().await;
    mount_search(&server, "Acme", &[format!("{}/other", server.uri())]).await;
    mount_page(
        &server,
        "/other",
        "<html><body>Contact: jane.doe@example.org</body></html>",
    )
    .await;

    let orchestrator = test_orchestrator(&server, Duration::from_secs(5));

    let result = orchestrator.run("Acme", 0, &NullSink).await.unwrap();

    assert_eq!(result.total_searched, 1);
    assert!(result.leads.is_empty());
    assert!(result.companies.is_empty());
    assert!(result.errors.is_empty());
}

#[tokio::test]
async fn scrape_rejects_blank_competitor() {
    let server = MockServer::start().await;
    let orchestrator = test_orchestrator(&server, Duration::from_secs(5));

    let err = orchestrator.run("   ", 0, &NullSink).await.unwrap_err();

    assert!(matches!(err, ScrapeError::InvalidCompetitor(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_leads_across_pages_are_merged() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "Acme",
        &[
            format!("{}/partner", server.uri()),
            format!("{}/team", server.uri()),
        ],
    )
    .await;
    mount_page(&server, "/partner", ACME_PARTNER_PAGE).await;
    mount_page(&server, "/team", ACME_PARTNER_PAGE).await;

    let orchestrator = test_orchestrator(&server, Duration::from_secs(5));

    let result = orchestrator.run("Acme", 0, &NullSink).await.unwrap();

    assert_eq!(result.total_searched, 2);
    assert_eq!(result.leads.len(), 1);
    assert_eq!(result.companies.len(), 1);
    assert_eq!(requests_to(&server, "/partner").await, 2);
    assert_eq!(requests_to(&server, "/team").await, 1);
}

#[tokio::test]
async fn fixed_delay_separates_pages_but_not_after_the_last() {
    let server = MockServer::start().await;
    mount_search(
        &server,
        "Acme",
        &[format!("{}/a", server.uri()), format!("{}/b", server.uri())],
    )
    .await;
    mount_search(&server, "Globex", &[format!("{}/a", server.uri())]).await;
    mount_page(&server, "/a", "<p>nothing relevant</p>").await;
    mount_page(&server, "/b", "<p>nothing relevant</p>").await;

    let delay = Duration::from_millis(500);
    let orchestrator = test_orchestrator_with_delay(&server, Duration::from_secs(5), delay);

    let started = Instant::now();
    let result = orchestrator.run("Acme", 0, &NullSink).await.unwrap();
    let two_pages = started.elapsed();
    assert_eq!(result.total_searched, 2);
    assert!(two_pages >= delay, "{:?}", two_pages);
    assert!(two_pages < delay * 2, "{:?}", two_pages);

    let started = Instant::now();
    let result = orchestrator.run("Globex", 0, &NullSink).await.unwrap();
    let one_page = started.elapsed();
    assert_eq!(result.total_searched, 1);
    assert!(one_page < delay, "{:?}", one_page);
}

#[tokio::test]
async fn privacy_crawl_checks_discovered_domains() {
    let server = MockServer::start().await;
    mount_search(&server, "Acme", &[]).await;
    mount_status(&server, "/datenschutz", 404).await;
    mount_page(&server, "/privacy", ACME_PARTNER_PAGE).await;

    let fetcher = fetcher_with_timeout(Duration::from_secs(5));
    let discovery = DomainDiscoveryService::new(
        fetcher.clone(),
        TEST_USER_AGENT,
        DiscoveryConfig {
            enable_static_list: false,
            enable_api_discovery: true,
            ..Default::default()
        },
    )
    .with_intelligence(Arc::new(FixedIntelligence(vec!["127.0.0.1"])));
    let delay = Duration::from_millis(300);
    let orchestrator = build_orchestrator(
        &server,
        fetcher,
        discovery,
        OrchestratorConfig {
            page_delay: delay,
            origin_template: origin_template_for(&server),
            ..Default::default()
        },
    );
    let sink = RecordingSink::default();

    let started = Instant::now();
    let result = orchestrator.run("Acme", 10, &sink).await.unwrap();

    // One pause between the two privacy paths tried.
    assert!(started.elapsed() >= delay);
    assert_eq!(result.domains_checked, 1);
    assert_eq!(result.total_searched, 0);
    assert_eq!(result.leads.len(), 1);
    assert_eq!(result.leads[0].email, "jane.doe@example.org");
    assert!(result.leads[0].source_url.ends_with("/privacy"));
    assert_eq!(result.companies.len(), 1);
    assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
    assert!(result.errors[0].contains("No search results"));

    assert_eq!(requests_to(&server, "/datenschutz").await, 1);
    assert_eq!(requests_to(&server, "/privacy").await, 2);
    assert_eq!(requests_to(&server, "/privacy-policy").await, 0);

    let events = sink.events.lock().unwrap();
    let phases: Vec<ProgressPhase> = events.iter().map(|e| e.phase).collect();
    assert!(phases.contains(&ProgressPhase::DomainDiscovery));
    assert!(phases.contains(&ProgressPhase::PrivacyCrawl));
    assert!(phases.windows(2).all(|pair| pair[0] <= pair[1]));
}
