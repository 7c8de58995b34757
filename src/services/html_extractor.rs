use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::{lead::ExtractedLead, web_domain::domain_from_url};

const NAME_WINDOW_CHARS: usize = 200;
const MAX_TITLE_NAME_LEN: usize = 50;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b[a-z0-9._%+-]+@[a-z0-9.-]+\.[a-z]{2,}\b").unwrap());
static MAILTO_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)mailto:([^"'?>\s]+)"#).unwrap());
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").unwrap());
static NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\p{Lu}\p{Ll}+(?:[ \t]+\p{Lu}\p{Ll}+)*").unwrap());
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").unwrap());

const DENIED_LOCAL_FRAGMENTS: [&str; 3] = ["noreply", "no-reply", "donotreply"];
const DENIED_LOCAL_PARTS: [&str; 6] = [
    "admin",
    "webmaster",
    "support",
    "test",
    "postmaster",
    "hostmaster",
];
const DENIED_DOMAINS: [&str; 1] = ["example.com"];
const ASSET_SUFFIXES: [&str; 8] = [".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".css", ".js"];
const GENERIC_NAME_TOKENS: [&str; 3] = ["Email", "Contact", "Info"];
const TITLE_NOISE_SUFFIXES: [&str; 2] = ["home", "welcome"];

/// Heuristics that read raw page HTML.
pub trait HtmlExtractor: Send + Sync {
    fn extract_emails(&self, html: &str, source_url: &str) -> Vec<ExtractedLead>;
    fn extract_name_near_email(&self, html: &str, email: &str) -> Option<String>;
    fn extract_company_name(&self, html: &str, domain: &str) -> String;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct RegexHtmlExtractor;

impl HtmlExtractor for RegexHtmlExtractor {
    fn extract_emails(&self, html: &str, source_url: &str) -> Vec<ExtractedLead> {
        extract_emails(html, source_url)
    }

    fn extract_name_near_email(&self, html: &str, email: &str) -> Option<String> {
        extract_name_near_email(html, email)
    }

    fn extract_company_name(&self, html: &str, domain: &str) -> String {
        extract_company_name(html, domain)
    }
}

pub fn is_denied_email(email: &str) -> bool {
    let Some((local, domain)) = email.rsplit_once('@') else {
        return true;
    };

    DENIED_LOCAL_FRAGMENTS.iter().any(|f| local.contains(f))
        || DENIED_LOCAL_PARTS.contains(&local)
        || DENIED_DOMAINS
            .iter()
            .any(|&d| domain == d || domain.ends_with(&format!(".{}", d)))
        || ASSET_SUFFIXES.iter().any(|s| email.ends_with(s))
}

pub fn extract_emails(html: &str, source_url: &str) -> Vec<ExtractedLead> {
    let domain = domain_from_url(source_url).unwrap_or_default();
    let mut seen = HashSet::new();

    let mailto_targets = MAILTO_RE.captures_iter(html).filter_map(|cap| {
        let target = html_escape::decode_html_entities(cap.get(1)?.as_str()).to_string();
        EMAIL_RE.find(&target).map(|m| m.as_str().to_string())
    });
    let text_matches = EMAIL_RE.find_iter(html).map(|m| m.as_str().to_string());

    mailto_targets
        .chain(text_matches)
        .map(|email| email.to_lowercase())
        .filter(|email| !is_denied_email(email))
        .filter(|email| seen.insert(email.clone()))
        .map(|email| ExtractedLead {
            name: extract_name_near_email(html, &email),
            email,
            source_url: source_url.to_string(),
            domain: domain.clone(),
        })
        .collect()
}

pub fn extract_name_near_email(html: &str, email: &str) -> Option<String> {
    let email_re = Regex::new(&format!("(?i){}", regex::escape(email))).ok()?;
    let position = email_re.find(html)?.start();

    let preceding = &html[..position];
    let window_start = preceding
        .char_indices()
        .rev()
        .nth(NAME_WINDOW_CHARS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);
    let window = &preceding[window_start..];

    // The window may open inside a tag or end inside an unterminated one.
    let window = match (window.find('>'), window.find('<')) {
        (Some(close), Some(open)) if close < open => &window[close + 1..],
        (Some(close), None) => &window[close + 1..],
        _ => window,
    };
    // Newlines keep a name from spanning two elements.
    let text = TAG_RE.replace_all(window, "\n");
    let text = match text.rfind('<') {
        Some(open) => &text[..open],
        None => &text[..],
    };
    let text = html_escape::decode_html_entities(text);

    let candidate = NAME_RE.find_iter(&text).last()?.as_str().trim().to_string();

    let is_generic = GENERIC_NAME_TOKENS
        .iter()
        .any(|token| candidate.contains(token));

    match is_generic || candidate.chars().count() < 4 {
        true => None,
        false => Some(candidate),
    }
}

pub fn extract_company_name(html: &str, domain: &str) -> String {
    TITLE_RE
        .captures(html)
        .and_then(|cap| cap.get(1))
        .and_then(|title| clean_title(title.as_str()))
        .unwrap_or_else(|| prettify_domain(domain))
}

fn clean_title(raw: &str) -> Option<String> {
    let decoded = html_escape::decode_html_entities(raw);
    let collapsed = decoded.split_whitespace().collect::<Vec<&str>>().join(" ");

    let mut name = collapsed
        .split(['-', '|', '–', '—'])
        .next()
        .unwrap_or_default()
        .trim()
        .to_string();

    for suffix in TITLE_NOISE_SUFFIXES {
        if let Some(stripped) = strip_trailing_word(&name, suffix) {
            name = stripped.trim_end_matches([' ', ':', ',', '.']).to_string();
        }
    }

    let len = name.chars().count();
    match len > 2 && len <= MAX_TITLE_NAME_LEN {
        true => Some(name),
        false => None,
    }
}

/// Strips `word` (ASCII, case-insensitive) from the end of `text` when it
/// stands alone, so `Stayhome` keeps its `home`.
fn strip_trailing_word<'a>(text: &'a str, word: &str) -> Option<&'a str> {
    let split = text.len().checked_sub(word.len())?;
    if !text.is_char_boundary(split) || !text[split..].eq_ignore_ascii_case(word) {
        return None;
    }

    let head = &text[..split];
    match head.chars().last() {
        None => Some(head),
        Some(c) if !c.is_alphanumeric() => Some(head),
        Some(_) => None,
    }
}

const SECOND_LEVEL_LABELS: [&str; 6] = ["co", "com", "org", "net", "ac", "gov"];

/// `www.big-company.co.uk` -> `Big Company`.
pub fn prettify_domain(domain: &str) -> String {
    let host = domain.trim().to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);
    let mut labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();

    if labels.len() > 1 {
        labels.pop();
    }
    if labels.len() > 1 && labels.last().is_some_and(|l| SECOND_LEVEL_LABELS.contains(l)) {
        labels.pop();
    }

    labels
        .join(" ")
        .split(['-', '_', ' '])
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}
