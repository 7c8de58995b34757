use url::Url;

/// Hosts that never yield leads: social networks, encyclopedias, video
/// platforms and the search engines themselves.
pub const EXCLUDED_DOMAINS: [&str; 14] = [
    "facebook.com",
    "twitter.com",
    "x.com",
    "linkedin.com",
    "instagram.com",
    "youtube.com",
    "youtu.be",
    "tiktok.com",
    "pinterest.com",
    "wikipedia.org",
    "wikimedia.org",
    "duckduckgo.com",
    "google.com",
    "bing.com",
];

pub fn is_excluded_domain(domain: &str) -> bool {
    EXCLUDED_DOMAINS
        .iter()
        .any(|&ex| domain == ex || domain.ends_with(&format!(".{}", ex)))
}

/// Lowercases, drops any scheme/path, trailing dot and `www.` prefix.
pub fn normalize_domain(raw: &str) -> Option<String> {
    let raw = raw.trim().to_lowercase();
    let host = match raw.contains("://") {
        true => Url::parse(&raw).ok()?.host_str()?.to_string(),
        false => raw
            .split(['/', '?', '#'])
            .next()
            .unwrap_or_default()
            .split(':')
            .next()
            .unwrap_or_default()
            .to_string(),
    };
    let host = host.trim_end_matches('.');
    let host = host.strip_prefix("www.").unwrap_or(host);

    let valid = host.contains('.')
        && !host.starts_with('.')
        && !host.contains("..")
        && host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');

    match valid {
        true => Some(host.to_string()),
        false => None,
    }
}

pub const DEFAULT_ORIGIN_TEMPLATE: &str = "https://{domain}";

/// Fills `{domain}` in an origin template such as `https://{domain}`.
pub fn site_origin(template: &str, domain: &str) -> String {
    template
        .replace("{domain}", domain)
        .trim_end_matches('/')
        .to_string()
}

pub fn domain_from_url(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().and_then(normalize_domain))
}

/// Turns an anchor `href` from a search results page into the target URL,
/// unwrapping redirect links (`/l/?uddg=`, `/url?q=`).
pub fn resolve_result_href(href: &str) -> Option<Url> {
    let href = html_escape::decode_html_entities(href.trim()).to_string();
    let base = Url::parse("https://duckduckgo.com").ok()?;
    let parsed = match href.starts_with("//") {
        true => Url::parse(&format!("https:{}", href)).ok()?,
        false => base.join(&href).ok()?,
    };

    let is_redirect = parsed
        .host_str()
        .map(|host| host.ends_with("duckduckgo.com") || host.ends_with("google.com"))
        .unwrap_or(false)
        && matches!(parsed.path(), "/l/" | "/url");

    let target = match is_redirect {
        true => {
            let redirect = parsed
                .query_pairs()
                .find(|(key, _)| key == "uddg" || key == "q")
                .map(|(_, value)| value.to_string())?;
            Url::parse(&redirect).ok()?
        }
        false => parsed,
    };

    match target.scheme() {
        "http" | "https" => Some(target),
        _ => None,
    }
}
