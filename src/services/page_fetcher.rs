use std::{sync::Arc, time::Duration};

use reqwest::Client;
use thiserror::Error;

use crate::domain::lead::ExtractedLead;

use super::HtmlExtractor;

pub const PAGE_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_USER_AGENT: &str = "LeadScoutBot/0.1 (+https://github.com/leadscout/leadscout)";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} timed out")]
    Timeout { url: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<Client, reqwest::Error> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
}

/// Case-insensitive substring check against the raw page, markup included.
pub fn mentions_competitor(html: &str, competitor: &str) -> bool {
    html.to_lowercase().contains(&competitor.to_lowercase())
}

pub struct PageFetcher {
    client: Client,
    extractor: Arc<dyn HtmlExtractor>,
}

impl PageFetcher {
    pub fn new(client: Client, extractor: Arc<dyn HtmlExtractor>) -> Self {
        PageFetcher { client, extractor }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn extractor(&self) -> &dyn HtmlExtractor {
        self.extractor.as_ref()
    }

    pub async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        log::debug!("GET {}", url);

        let res = self.client.get(url).send().await.map_err(|e| match e.is_timeout() {
            true => FetchError::Timeout {
                url: url.to_string(),
            },
            false => FetchError::Request {
                url: url.to_string(),
                source: e,
            },
        })?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        res.text().await.map_err(|e| match e.is_timeout() {
            true => FetchError::Timeout {
                url: url.to_string(),
            },
            false => FetchError::Body {
                url: url.to_string(),
                source: e,
            },
        })
    }

    /// Empty when the page does not mention the competitor; that is not an error.
    pub async fn fetch_and_verify(
        &self,
        url: &str,
        competitor: &str,
    ) -> Result<Vec<ExtractedLead>, FetchError> {
        let html = self.fetch_page(url).await?;
        Ok(self.verify_and_extract(&html, url, competitor))
    }

    pub fn verify_and_extract(&self, html: &str, url: &str, competitor: &str) -> Vec<ExtractedLead> {
        match mentions_competitor(html, competitor) {
            true => self.extractor.extract_emails(html, url),
            false => {
                log::debug!("{} does not mention {}", url, competitor);
                vec![]
            }
        }
    }

    pub async fn fetch_company_name(&self, url: &str, domain: &str) -> Result<String, FetchError> {
        let html = self.fetch_page(url).await?;
        Ok(self.extractor.extract_company_name(&html, domain))
    }
}

#[cfg(test)]
mod tests {
    use super::mentions_competitor;

    #[test]
    fn mention_is_case_insensitive_and_includes_markup() {
        assert!(mentions_competitor("<p>ACME is a rival</p>", "Acme"));
        assert!(mentions_competitor(r#"<img alt="acme logo">"#, "Acme"));
        assert!(mentions_competitor("<!-- acme -->", "ACME"));
        assert!(!mentions_competitor("<p>Ac me</p>", "Acme"));
    }
}
