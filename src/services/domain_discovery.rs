use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use itertools::Itertools;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::web_domain::{
    domain_from_url, is_excluded_domain, normalize_domain, site_origin, DEFAULT_ORIGIN_TEMPLATE,
};

use super::{calculate_confidence, classify_domain, fetch_robots, PageFetcher, RobotsRules};

/// Deterministic seed list, always offered first.
pub const STATIC_SEED_DOMAINS: [&str; 32] = [
    "hornbach.de",
    "obi.de",
    "bauhaus.info",
    "hagebau.de",
    "toom.de",
    "globus-baumarkt.de",
    "fressnapf.de",
    "rossmann.de",
    "tchibo.de",
    "otto.de",
    "conrad.de",
    "reichelt.de",
    "alternate.de",
    "cyberport.de",
    "notebooksbilliger.de",
    "thomann.de",
    "bergfreunde.de",
    "globetrotter.de",
    "baur.de",
    "weltbild.de",
    "thalia.de",
    "hugendubel.de",
    "galeria.de",
    "breuninger.com",
    "engelhorn.de",
    "mytoys.de",
    "home24.de",
    "porta.de",
    "moebel-kraft.de",
    "segmueller.de",
    "hoeffner.de",
    "xxxlutz.de",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryChannel {
    StaticList,
    Api,
    WebCrawl,
}

fn default_true() -> bool {
    true
}

fn default_max_domains_per_source() -> usize {
    200
}

fn default_min_business_confidence() -> f64 {
    0.5
}

fn default_crawl_delay_millis() -> u64 {
    1000
}

fn default_origin_template() -> String {
    DEFAULT_ORIGIN_TEMPLATE.to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscoveryConfig {
    #[serde(default = "default_true")]
    pub enable_static_list: bool,
    #[serde(default)]
    pub enable_api_discovery: bool,
    #[serde(default)]
    pub enable_web_crawling: bool,
    #[serde(default)]
    pub enable_business_filter: bool,
    #[serde(default = "default_max_domains_per_source")]
    pub max_domains_per_source: usize,
    #[serde(default = "default_min_business_confidence")]
    pub min_business_confidence: f64,
    #[serde(default = "default_crawl_delay_millis")]
    pub crawl_delay_millis: u64,
    #[serde(default)]
    pub crawl_seeds: Vec<String>,
    #[serde(default)]
    pub api_endpoints: Vec<String>,
    /// Where a domain's homepage lives, e.g. `https://{domain}`.
    #[serde(default = "default_origin_template")]
    pub origin_template: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        DiscoveryConfig {
            enable_static_list: true,
            enable_api_discovery: false,
            enable_web_crawling: false,
            enable_business_filter: false,
            max_domains_per_source: default_max_domains_per_source(),
            min_business_confidence: default_min_business_confidence(),
            crawl_delay_millis: default_crawl_delay_millis(),
            crawl_seeds: vec![],
            api_endpoints: vec![],
            origin_template: default_origin_template(),
        }
    }
}

impl DiscoveryConfig {
    pub fn static_only() -> Self {
        DiscoveryConfig::default()
    }

    pub fn disabled() -> Self {
        DiscoveryConfig {
            enable_static_list: false,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DiscoveryStatistics {
    pub candidates_found: usize,
    pub invalid_dropped: usize,
    pub duplicates_removed: usize,
    pub filtered_by_classifier: usize,
    pub returned: usize,
    pub duration_ms: u128,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DiscoveryReport {
    pub domains: Vec<String>,
    pub sources: BTreeMap<DiscoveryChannel, usize>,
    pub statistics: DiscoveryStatistics,
    pub errors: Vec<String>,
}

/// External domain-intelligence lookup backing the API channel.
#[async_trait]
pub trait DomainIntelligence: Send + Sync {
    fn name(&self) -> &str;
    async fn lookup_domains(&self, limit: usize) -> anyhow::Result<Vec<String>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DomainListResponse {
    Plain(Vec<String>),
    Wrapped { domains: Vec<String> },
}

/// JSON endpoint answering either `["a.de", ...]` or `{"domains": [...]}`.
pub struct HttpDomainIntelligence {
    client: Client,
    endpoint: String,
}

impl HttpDomainIntelligence {
    pub fn new(client: Client, endpoint: impl Into<String>) -> Self {
        HttpDomainIntelligence {
            client,
            endpoint: endpoint.into(),
        }
    }
}

#[derive(Serialize)]
struct LimitQuery {
    limit: usize,
}

#[async_trait]
impl DomainIntelligence for HttpDomainIntelligence {
    fn name(&self) -> &str {
        &self.endpoint
    }

    async fn lookup_domains(&self, limit: usize) -> anyhow::Result<Vec<String>> {
        let res = self
            .client
            .get(&self.endpoint)
            .query(&LimitQuery { limit })
            .send()
            .await?
            .error_for_status()?;

        let domains = match res.json::<DomainListResponse>().await? {
            DomainListResponse::Plain(domains) => domains,
            DomainListResponse::Wrapped { domains } => domains,
        };

        Ok(domains)
    }
}

struct ChannelOutput {
    domains: Vec<String>,
    errors: Vec<String>,
}

pub struct DomainDiscoveryService {
    fetcher: Arc<PageFetcher>,
    /// Sources queried in addition to the `api_endpoints` of the active config.
    intelligence: Vec<Arc<dyn DomainIntelligence>>,
    user_agent: String,
    config: DiscoveryConfig,
}

impl DomainDiscoveryService {
    pub fn new(fetcher: Arc<PageFetcher>, user_agent: &str, config: DiscoveryConfig) -> Self {
        DomainDiscoveryService {
            fetcher,
            intelligence: vec![],
            user_agent: user_agent.to_string(),
            config,
        }
    }

    pub fn with_intelligence(mut self, source: Arc<dyn DomainIntelligence>) -> Self {
        self.intelligence.push(source);
        self
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Flat domain list for callers that predate channel metadata.
    pub async fn get_domains_to_check(&self, limit: usize) -> Vec<String> {
        self.discover_domains(limit, &self.config).await.domains
    }

    pub async fn discover_domains(&self, max_domains: usize, config: &DiscoveryConfig) -> DiscoveryReport {
        let started = Instant::now();
        let mut report = DiscoveryReport::default();

        if max_domains == 0 {
            return report;
        }

        let per_source = config.max_domains_per_source;

        let static_output = match config.enable_static_list {
            true => Some(static_channel(per_source)),
            false => None,
        };

        let (api_output, crawl_output) = tokio::join!(
            async {
                match config.enable_api_discovery {
                    true => Some(self.api_channel(per_source, config).await),
                    false => None,
                }
            },
            async {
                match config.enable_web_crawling {
                    true => Some(self.crawl_channel(per_source, config).await),
                    false => None,
                }
            }
        );

        let mut candidates: Vec<(DiscoveryChannel, String)> = vec![];
        for (channel, output) in [
            (DiscoveryChannel::StaticList, static_output),
            (DiscoveryChannel::Api, api_output),
            (DiscoveryChannel::WebCrawl, crawl_output),
        ] {
            let Some(output) = output else {
                continue;
            };
            report.errors.extend(output.errors);
            candidates.extend(output.domains.into_iter().map(|d| (channel, d)));
        }
        report.statistics.candidates_found = candidates.len();

        let normalized: Vec<(DiscoveryChannel, String)> = candidates
            .into_iter()
            .filter_map(|(channel, raw)| normalize_domain(&raw).map(|d| (channel, d)))
            .collect();
        report.statistics.invalid_dropped = report.statistics.candidates_found - normalized.len();

        let unique: Vec<(DiscoveryChannel, String)> = normalized
            .iter()
            .cloned()
            .unique_by(|(_, domain)| domain.clone())
            .collect();
        report.statistics.duplicates_removed = normalized.len() - unique.len();

        let mut accepted: Vec<(DiscoveryChannel, String)> = vec![];
        let mut classified = 0;
        for (channel, domain) in unique {
            if accepted.len() >= max_domains {
                break;
            }
            if channel == DiscoveryChannel::WebCrawl && config.enable_business_filter {
                if classified > 0 {
                    tokio::time::sleep(Duration::from_millis(config.crawl_delay_millis)).await;
                }
                classified += 1;
                if !self.looks_like_business(&domain, config).await {
                    report.statistics.filtered_by_classifier += 1;
                    continue;
                }
            }
            accepted.push((channel, domain));
        }

        for (channel, domain) in accepted {
            *report.sources.entry(channel).or_insert(0) += 1;
            report.domains.push(domain);
        }
        report.statistics.returned = report.domains.len();
        report.statistics.duration_ms = started.elapsed().as_millis();

        log::info!(
            "Discovered {} domains from {} candidates ({} errors)",
            report.statistics.returned,
            report.statistics.candidates_found,
            report.errors.len()
        );

        report
    }

    async fn api_channel(&self, limit: usize, config: &DiscoveryConfig) -> ChannelOutput {
        let mut output = ChannelOutput {
            domains: vec![],
            errors: vec![],
        };

        let sources: Vec<Arc<dyn DomainIntelligence>> = config
            .api_endpoints
            .iter()
            .map(|endpoint| {
                Arc::new(HttpDomainIntelligence::new(
                    self.fetcher.client().clone(),
                    endpoint.clone(),
                )) as Arc<dyn DomainIntelligence>
            })
            .chain(self.intelligence.iter().cloned())
            .collect();

        if sources.is_empty() {
            output
                .errors
                .push("api: discovery enabled but no domain intelligence source configured".to_string());
            return output;
        }

        for source in sources.iter() {
            match source.lookup_domains(limit).await {
                Ok(domains) => {
                    log::debug!("{} returned {} domains", source.name(), domains.len());
                    output.domains.extend(domains);
                }
                Err(e) => {
                    log::error!("Domain intelligence {} failed: {:?}", source.name(), e);
                    output.errors.push(format!("api: {} failed: {}", source.name(), e));
                }
            }
        }
        output.domains.truncate(limit);

        output
    }

    async fn crawl_channel(&self, limit: usize, config: &DiscoveryConfig) -> ChannelOutput {
        let mut output = ChannelOutput {
            domains: vec![],
            errors: vec![],
        };
        let mut robots_by_host: HashMap<String, RobotsRules> = HashMap::new();
        let delay = Duration::from_millis(config.crawl_delay_millis);

        for (i, seed) in config.crawl_seeds.iter().enumerate() {
            if output.domains.len() >= limit {
                break;
            }
            if i > 0 {
                tokio::time::sleep(delay).await;
            }

            let seed_url = match Url::parse(seed) {
                Ok(url) => url,
                Err(e) => {
                    output.errors.push(format!("web_crawl: invalid seed {}: {}", seed, e));
                    continue;
                }
            };
            let host = seed_url.host_str().unwrap_or_default().to_string();

            if !robots_by_host.contains_key(&host) {
                let rules = fetch_robots(self.fetcher.client(), &seed_url).await;
                robots_by_host.insert(host.clone(), rules);
            }
            let allowed = robots_by_host
                .get(&host)
                .map(|rules| rules.is_allowed(&self.user_agent, seed_url.path()))
                .unwrap_or(true);
            if !allowed {
                log::info!("robots.txt disallows {}, skipping", seed_url);
                output
                    .errors
                    .push(format!("web_crawl: {} disallowed by robots.txt", seed_url));
                continue;
            }

            match self.fetcher.fetch_page(seed_url.as_str()).await {
                Ok(html) => {
                    let remaining = limit - output.domains.len();
                    let found = extract_outbound_domains(&html, &seed_url);
                    log::debug!("{} links to {} outbound domains", seed_url, found.len());
                    output.domains.extend(found.into_iter().take(remaining));
                }
                Err(e) => {
                    log::error!("Failed to crawl seed {}: {:?}", seed_url, e);
                    output.errors.push(format!("web_crawl: {}", e));
                }
            }
        }

        output
    }

    async fn looks_like_business(&self, domain: &str, config: &DiscoveryConfig) -> bool {
        let url = format!("{}/", site_origin(&config.origin_template, domain));
        match self.fetcher.fetch_page(&url).await {
            Ok(html) => {
                let confidence = calculate_confidence(&classify_domain(&html));
                log::debug!("{} business confidence {:.2}", domain, confidence);
                confidence >= config.min_business_confidence
            }
            Err(e) => {
                log::debug!("Could not classify {}: {}", domain, e);
                false
            }
        }
    }
}

fn static_channel(limit: usize) -> ChannelOutput {
    ChannelOutput {
        domains: STATIC_SEED_DOMAINS
            .iter()
            .take(limit)
            .map(|d| d.to_string())
            .collect(),
        errors: vec![],
    }
}

/// Distinct external domains linked from a portal page, in document order.
pub fn extract_outbound_domains(html: &str, page_url: &Url) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return vec![];
    };
    let own_domain = page_url.host_str().and_then(normalize_domain);
    let mut seen = HashSet::new();

    document
        .select(&selector)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| page_url.join(href).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter_map(|url| domain_from_url(url.as_str()))
        .filter(|domain| Some(domain) != own_domain.as_ref())
        .filter(|domain| !is_excluded_domain(domain))
        .filter(|domain| seen.insert(domain.clone()))
        .collect()
}
