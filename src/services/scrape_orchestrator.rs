use std::{collections::HashSet, sync::Arc, time::Duration};

use futures::{stream, StreamExt};
use serde_json::json;
use thiserror::Error;

use crate::configuration::ScraperSettings;
use crate::domain::{
    company::CompanyRecord,
    job::parse_competitor,
    lead::ExtractedLead,
    scraping_result::ScrapingResult,
    web_domain::{site_origin, DEFAULT_ORIGIN_TEMPLATE},
};

use super::{
    build_http_client, DiscoveryConfig, DomainDiscoveryService, FetchError, MentionSearcher,
    PageFetcher, ProgressEvent, ProgressPhase, RegexHtmlExtractor, ScrapeEventSink,
};

pub const PAGE_DELAY: Duration = Duration::from_millis(1000);
pub const DEFAULT_MAX_SEARCH_RESULTS: usize = 20;

#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("invalid competitor: {0}")]
    InvalidCompetitor(String),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrapeState {
    Idle,
    Searching,
    Extracting,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub page_delay: Duration,
    /// Pages in flight at once. 1 keeps the run strictly sequential.
    pub concurrency: usize,
    pub max_search_results: usize,
    pub enable_privacy_crawl: bool,
    pub privacy_paths: Vec<String>,
    pub origin_template: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        OrchestratorConfig {
            page_delay: PAGE_DELAY,
            concurrency: 1,
            max_search_results: DEFAULT_MAX_SEARCH_RESULTS,
            enable_privacy_crawl: true,
            privacy_paths: vec![
                "/datenschutz".to_string(),
                "/privacy".to_string(),
                "/privacy-policy".to_string(),
            ],
            origin_template: DEFAULT_ORIGIN_TEMPLATE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum PageTask {
    SearchResult { url: String },
    PrivacyCheck { domain: String },
}

impl PageTask {
    fn phase(&self) -> ProgressPhase {
        match self {
            PageTask::SearchResult { .. } => ProgressPhase::LeadExtraction,
            PageTask::PrivacyCheck { .. } => ProgressPhase::PrivacyCrawl,
        }
    }

    fn label(&self) -> &str {
        match self {
            PageTask::SearchResult { url } => url,
            PageTask::PrivacyCheck { domain } => domain,
        }
    }
}

struct PageOutcome {
    task: PageTask,
    /// Page the leads came from; for privacy checks the first path that answered.
    url: Option<String>,
    leads: Vec<ExtractedLead>,
    error: Option<String>,
}

pub fn privacy_check_urls(origin: &str, paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .map(|path| format!("{}/{}", origin, path.trim_start_matches('/')))
        .collect()
}

struct Run<'a> {
    state: ScrapeState,
    result: ScrapingResult,
    seen_leads: HashSet<(String, String)>,
    seen_domains: HashSet<String>,
    sink: &'a dyn ScrapeEventSink,
}

impl<'a> Run<'a> {
    fn transition(&mut self, next: ScrapeState) {
        log::debug!("Scrape {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn emit(&self, phase: ProgressPhase, operation: &str, progress: f64, details: serde_json::Value) {
        self.sink
            .publish(ProgressEvent::new(phase, operation, progress, details));
    }
}

pub struct ScrapeOrchestrator {
    discovery: Arc<DomainDiscoveryService>,
    searcher: Arc<MentionSearcher>,
    fetcher: Arc<PageFetcher>,
    config: OrchestratorConfig,
}

impl ScrapeOrchestrator {
    pub fn new(
        discovery: Arc<DomainDiscoveryService>,
        searcher: Arc<MentionSearcher>,
        fetcher: Arc<PageFetcher>,
        config: OrchestratorConfig,
    ) -> Self {
        ScrapeOrchestrator {
            discovery,
            searcher,
            fetcher,
            config,
        }
    }

    pub fn from_settings(
        settings: &ScraperSettings,
        discovery: DiscoveryConfig,
    ) -> Result<Self, ScrapeError> {
        let page_client = build_http_client(&settings.user_agent, settings.request_timeout())?;
        let search_client = build_http_client(&settings.user_agent, settings.search_timeout())?;

        let fetcher = Arc::new(PageFetcher::new(page_client, Arc::new(RegexHtmlExtractor)));
        let discovery = Arc::new(DomainDiscoveryService::new(
            fetcher.clone(),
            &settings.user_agent,
            discovery,
        ));
        let searcher = Arc::new(MentionSearcher::new(search_client, settings.search_url.clone()));

        Ok(ScrapeOrchestrator::new(
            discovery,
            searcher,
            fetcher,
            settings.orchestrator_config(),
        ))
    }

    /// Discovery -> search -> fetch -> extract. Per-page failures land in
    /// `errors`; only invalid input fails the whole run.
    pub async fn run(
        &self,
        competitor: &str,
        domain_budget: usize,
        sink: &dyn ScrapeEventSink,
    ) -> Result<ScrapingResult, ScrapeError> {
        let mut run = Run {
            state: ScrapeState::Idle,
            result: ScrapingResult::new(competitor.trim()),
            seen_leads: HashSet::new(),
            seen_domains: HashSet::new(),
            sink,
        };

        let competitor = match parse_competitor(competitor) {
            Ok(c) => c,
            Err(e) => {
                run.transition(ScrapeState::Failed);
                return Err(ScrapeError::InvalidCompetitor(e));
            }
        };

        run.emit(
            ProgressPhase::Init,
            "starting scrape",
            0.0,
            json!({ "competitor": competitor, "domainBudget": domain_budget }),
        );
        run.transition(ScrapeState::Searching);

        if self.config.enable_privacy_crawl && domain_budget > 0 {
            run.emit(ProgressPhase::DomainDiscovery, "discovering domains", 0.0, json!({}));
            let report = self
                .discovery
                .discover_domains(domain_budget, self.discovery.config())
                .await;
            run.emit(
                ProgressPhase::DomainDiscovery,
                "domains discovered",
                1.0,
                json!({
                    "domains": report.domains.len(),
                    "sources": report.sources,
                    "statistics": report.statistics,
                    "errors": report.errors.len(),
                }),
            );
            run.result.errors.extend(report.errors);
            run.result.domains_checked = report.domains.len();

            let checks = report
                .domains
                .into_iter()
                .map(|domain| PageTask::PrivacyCheck { domain })
                .collect();
            self.process_tasks(&mut run, &competitor, checks).await;
        }

        run.emit(
            ProgressPhase::LeadExtraction,
            "searching mentions",
            0.0,
            json!({ "competitor": competitor }),
        );
        let outcome = self
            .searcher
            .search_mentions(&competitor, self.config.max_search_results)
            .await;
        run.result.total_searched = outcome.results.len();
        match outcome.error {
            Some(error) => run.result.errors.push(error),
            None if outcome.results.is_empty() => run
                .result
                .errors
                .push(format!("No search results found for \"{}\"", competitor)),
            None => {}
        }
        let pages = outcome
            .results
            .iter()
            .map(|r| PageTask::SearchResult { url: r.url.clone() })
            .collect();
        run.result.search_results = outcome.results;

        run.transition(ScrapeState::Extracting);
        self.process_tasks(&mut run, &competitor, pages).await;

        run.result.total_leads_found = run.result.leads.len();
        run.transition(ScrapeState::Done);

        run.emit(
            ProgressPhase::LeadExtraction,
            "extraction finished",
            1.0,
            json!({
                "leads": run.result.total_leads_found,
                "companies": run.result.companies.len(),
                "errors": run.result.errors.len(),
            }),
        );

        Ok(run.result)
    }

    /// Runs tasks of a single phase through the page queue.
    async fn process_tasks(&self, run: &mut Run<'_>, competitor: &str, tasks: Vec<PageTask>) {
        let total = tasks.len();

        let mut outcomes = stream::iter(tasks)
            .map(|task| self.process_task(task, competitor))
            .buffered(self.config.concurrency.max(1));

        let mut done = 0;
        while let Some(outcome) = outcomes.next().await {
            done += 1;
            let phase = outcome.task.phase();

            let new_leads = self.merge_outcome(run, outcome).await;
            run.emit(
                phase,
                "page processed",
                done as f64 / total as f64,
                json!({ "processed": done, "total": total, "newLeads": new_leads }),
            );

            if done < total {
                tokio::time::sleep(self.config.page_delay).await;
            }
        }
    }

    async fn process_task(&self, task: PageTask, competitor: &str) -> PageOutcome {
        match &task {
            PageTask::SearchResult { url } => {
                match self.fetcher.fetch_and_verify(url, competitor).await {
                    Ok(leads) => PageOutcome {
                        url: Some(url.clone()),
                        task,
                        leads,
                        error: None,
                    },
                    Err(e) => PageOutcome {
                        task,
                        url: None,
                        leads: vec![],
                        error: Some(e.to_string()),
                    },
                }
            }
            PageTask::PrivacyCheck { domain } => {
                let origin = site_origin(&self.config.origin_template, domain);
                for (i, url) in privacy_check_urls(&origin, &self.config.privacy_paths)
                    .into_iter()
                    .enumerate()
                {
                    if i > 0 {
                        tokio::time::sleep(self.config.page_delay).await;
                    }
                    match self.fetcher.fetch_page(&url).await {
                        Ok(html) => {
                            let leads = self.fetcher.verify_and_extract(&html, &url, competitor);
                            return PageOutcome {
                                task,
                                url: Some(url),
                                leads,
                                error: None,
                            };
                        }
                        // Try the next well-known path.
                        Err(FetchError::Status { .. }) => continue,
                        Err(e) => {
                            return PageOutcome {
                                task,
                                url: None,
                                leads: vec![],
                                error: Some(e.to_string()),
                            }
                        }
                    }
                }
                log::debug!("No privacy page found on {}", domain);
                PageOutcome {
                    task,
                    url: None,
                    leads: vec![],
                    error: None,
                }
            }
        }
    }

    /// Returns how many new leads the page contributed.
    async fn merge_outcome(&self, run: &mut Run<'_>, outcome: PageOutcome) -> usize {
        if let Some(error) = outcome.error {
            log::warn!("Page {} failed: {}", outcome.task.label(), error);
            run.result.errors.push(error);
        }
        let Some(url) = outcome.url else {
            return 0;
        };

        let mut added = 0;
        for lead in outcome.leads {
            if !run
                .seen_leads
                .insert((lead.domain.clone(), lead.email.clone()))
            {
                continue;
            }

            if run.seen_domains.insert(lead.domain.clone()) {
                // Refetches the page to read its title.
                let name = match self.fetcher.fetch_company_name(&url, &lead.domain).await {
                    Ok(name) => name,
                    Err(e) => {
                        run.result.errors.push(e.to_string());
                        self.fetcher.extractor().extract_company_name("", &lead.domain)
                    }
                };
                run.result.companies.push(CompanyRecord {
                    domain: lead.domain.clone(),
                    name,
                });
            }

            run.result.leads.push(lead);
            added += 1;
        }

        added
    }
}
