use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use serde::Serialize;

use crate::domain::{
    search_result::SearchResult,
    web_domain::{domain_from_url, is_excluded_domain, resolve_result_href},
};

use super::FetchError;

pub const DEFAULT_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

static ANCHOR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<a\s+([^>]*)>(.*?)</a>").unwrap());
static ATTR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?is)\b(class|href)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).unwrap());
static SNIPPET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<(a|div|td)\s[^>]*class\s*=\s*["'][^"']*result__snippet[^"']*["'][^>]*>(.*?)</(?:a|div|td)>"#)
        .unwrap()
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());

#[derive(Serialize)]
struct SearchQuery {
    q: String,
}

/// Outcome of one search request. A failed request leaves `results` empty and sets `error`.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub results: Vec<SearchResult>,
    pub error: Option<String>,
}

pub fn build_mention_query(competitor: &str) -> String {
    format!(r#""{}" contact email"#, competitor)
}

pub struct MentionSearcher {
    client: Client,
    search_url: String,
}

impl MentionSearcher {
    pub fn new(client: Client, search_url: impl Into<String>) -> Self {
        MentionSearcher {
            client,
            search_url: search_url.into(),
        }
    }

    pub async fn search_mentions(&self, competitor: &str, max_results: usize) -> SearchOutcome {
        let query = SearchQuery {
            q: build_mention_query(competitor),
        };

        match self.fetch_results_page(&query).await {
            Ok(html) => {
                let results = parse_search_results(&html, max_results);
                log::info!("Found {} results on query: {}", results.len(), query.q);
                SearchOutcome {
                    results,
                    error: None,
                }
            }
            Err(e) => {
                log::error!("Search failed on query {}: {:?}", query.q, e);
                SearchOutcome {
                    results: vec![],
                    error: Some(format!("Search failed: {}", e)),
                }
            }
        }
    }

    async fn fetch_results_page(&self, query: &SearchQuery) -> Result<String, FetchError> {
        let url = self.search_url.clone();
        let res = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| match e.is_timeout() {
                true => FetchError::Timeout { url: url.clone() },
                false => FetchError::Request {
                    url: url.clone(),
                    source: e,
                },
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
            });
        }

        res.text()
            .await
            .map_err(|e| FetchError::Body { url, source: e })
    }
}

fn clean_text(fragment: &str) -> String {
    let text = TAG_RE.replace_all(fragment, " ");
    html_escape::decode_html_entities(&text)
        .split_whitespace()
        .collect::<Vec<&str>>()
        .join(" ")
}

struct Anchor {
    class: String,
    href: String,
    text: String,
}

fn parse_anchors(html: &str) -> Vec<Anchor> {
    ANCHOR_RE
        .captures_iter(html)
        .map(|cap| {
            let attrs = cap.get(1).map(|m| m.as_str()).unwrap_or_default();
            let mut anchor = Anchor {
                class: String::new(),
                href: String::new(),
                text: clean_text(cap.get(2).map(|m| m.as_str()).unwrap_or_default()),
            };
            for attr in ATTR_RE.captures_iter(attrs) {
                let value = attr
                    .get(2)
                    .or_else(|| attr.get(3))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                match attr[1].to_lowercase().as_str() {
                    "class" => anchor.class = value,
                    _ => anchor.href = value,
                }
            }
            anchor
        })
        .collect()
}

/// Regex-only parse of a results page. Prefers `result__a` anchors and falls
/// back to every outbound link when the markup has none.
pub fn parse_search_results(html: &str, max_results: usize) -> Vec<SearchResult> {
    let anchors = parse_anchors(html);
    let snippets: Vec<String> = SNIPPET_RE
        .captures_iter(html)
        .map(|cap| clean_text(cap.get(2).map(|m| m.as_str()).unwrap_or_default()))
        .collect();

    let has_result_anchors = anchors.iter().any(|a| a.class.contains("result__a"));
    let candidates = anchors
        .into_iter()
        .filter(|a| !has_result_anchors || a.class.contains("result__a"));

    let mut seen_urls = HashSet::new();

    candidates
        .enumerate()
        .filter_map(|(i, anchor)| {
            let url = resolve_result_href(&anchor.href)?;
            let domain = domain_from_url(url.as_str())?;
            if is_excluded_domain(&domain) {
                return None;
            }
            let snippet = match has_result_anchors {
                true => snippets.get(i).cloned().unwrap_or_default(),
                false => String::new(),
            };
            Some(SearchResult {
                title: anchor.text,
                url: url.to_string(),
                snippet,
            })
        })
        .filter(|result| seen_urls.insert(result.url.clone()))
        .take(max_results)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESULTS_PAGE: &str = r##"
        <div class="result">
          <h2><a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fwww.mueller-bau.de%2Fpartner&amp;rut=1">Müller Bau &amp; Söhne</a></h2>
          <a class="result__snippet" href="//duckduckgo.com/l/?uddg=x">Wir arbeiten mit <b>Acme</b> zusammen</a>
        </div>
        <div class="result">
          <h2><a class="result__a" href="https://de.linkedin.com/company/acme">Acme | LinkedIn</a></h2>
          <a class="result__snippet" href="#">Acme on LinkedIn</a>
        </div>
        <div class="result">
          <h2><a href='https://lang-dach.de/referenzen' class='result__a'>Dach Lang</a></h2>
          <div class="result__snippet">Referenzen: Acme</div>
        </div>
        <a href="https://duckduckgo.com/settings">Settings</a>
    "##;

    #[test]
    fn parse_search_results_valid() {
        let results = parse_search_results(RESULTS_PAGE, 10);

        assert_eq!(
            results,
            vec![
                SearchResult {
                    title: "Müller Bau & Söhne".to_string(),
                    url: "https://www.mueller-bau.de/partner".to_string(),
                    snippet: "Wir arbeiten mit Acme zusammen".to_string(),
                },
                SearchResult {
                    title: "Dach Lang".to_string(),
                    url: "https://lang-dach.de/referenzen".to_string(),
                    snippet: "Referenzen: Acme".to_string(),
                },
            ]
        );
    }

    #[test]
    fn parse_search_results_respects_limit() {
        assert_eq!(parse_search_results(RESULTS_PAGE, 1).len(), 1);
    }

    #[test]
    fn parse_search_results_falls_back_to_plain_links() {
        let html = r#"
            <a href="https://www.youtube.com/watch?v=1">video</a>
            <a href="https://lang-dach.de/">Lang</a>
            <a href="https://lang-dach.de/">Lang again</a>
            <a href="/relative">relative</a>
        "#;

        let results = parse_search_results(html, 10);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].url, "https://lang-dach.de/");
        assert_eq!(results[0].title, "Lang");
    }

    #[test]
    fn parse_search_results_empty() {
        assert!(parse_search_results("<html><body>No results.</body></html>", 10).is_empty());
    }

    #[test]
    fn mention_query_is_quoted() {
        assert_eq!(build_mention_query("Acme"), r#""Acme" contact email"#);
    }
}
