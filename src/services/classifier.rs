use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static LEGAL_NOTICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["'][^"']*(impressum|imprint|legal-notice|mentions-legales)[^"']*["']|>\s*(impressum|imprint|legal notice)\s*<"#)
        .unwrap()
});
static VAT_ID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:DE|AT|ATU|CH|NL|FR|BE|LU|IT|ES)\s?[0-9]{8,11}(?:\s?(?:MWST|TVA|IVA|B[0-9]{2}))?\b|\bCHE-[0-9]{3}\.[0-9]{3}\.[0-9]{3}\b|\bUSt-?IdNr\.?")
        .unwrap()
});
static CONTACT_PAGE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["'][^"']*(kontakt|contact)[^"']*["']"#).unwrap()
});
static PRIVACY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)href\s*=\s*["'][^"']*(datenschutz|privacy|dsgvo|gdpr)[^"']*["']"#).unwrap()
});
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+").unwrap());

const LANGUAGE_MARKERS: [&str; 12] = [
    "und", "der", "die", "das", "mit", "für", "wir", "ihre", "sie", "nicht", "auch", "über",
];
const MIN_LANGUAGE_MARKER_HITS: usize = 5;

const BUSINESS_KEYWORDS: [&str; 14] = [
    "gmbh",
    "ug (haftungsbeschränkt)",
    "e.k.",
    "ohg",
    "kg",
    "ag",
    "geschäftsführer",
    "handelsregister",
    "amtsgericht",
    "inhaber",
    "öffnungszeiten",
    "dienstleistungen",
    "angebot",
    "unternehmen",
];
const MIN_KEYWORD_HITS: usize = 2;

const LEGAL_NOTICE_WEIGHT: f64 = 0.25;
const VAT_ID_WEIGHT: f64 = 0.25;
const PRIVACY_WEIGHT: f64 = 0.15;
const CONTACT_WEIGHT: f64 = 0.15;
const LANGUAGE_WEIGHT: f64 = 0.10;
const KEYWORD_WEIGHT: f64 = 0.10;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BusinessIndicator {
    pub has_legal_notice: bool,
    pub has_vat_id: bool,
    pub has_local_language: bool,
    pub has_business_keywords: bool,
    pub has_contact_page: bool,
    pub has_privacy_policy: bool,
    pub keyword_hits: usize,
}

pub fn classify_domain(html: &str) -> BusinessIndicator {
    let lowercase = html.to_lowercase();

    let marker_hits = WORD_RE
        .find_iter(&lowercase)
        .filter(|w| LANGUAGE_MARKERS.contains(&w.as_str()))
        .count();

    let keyword_hits = BUSINESS_KEYWORDS
        .iter()
        .filter(|&&keyword| contains_word(&lowercase, keyword))
        .count();

    BusinessIndicator {
        has_legal_notice: LEGAL_NOTICE_RE.is_match(html),
        has_vat_id: VAT_ID_RE.is_match(html),
        has_local_language: marker_hits >= MIN_LANGUAGE_MARKER_HITS,
        has_business_keywords: keyword_hits >= MIN_KEYWORD_HITS,
        has_contact_page: CONTACT_PAGE_RE.is_match(html),
        has_privacy_policy: PRIVACY_RE.is_match(html),
        keyword_hits,
    }
}

/// Weighted score in `[0, 1]`. Advisory only.
pub fn calculate_confidence(indicators: &BusinessIndicator) -> f64 {
    let signals = [
        (indicators.has_legal_notice, LEGAL_NOTICE_WEIGHT),
        (indicators.has_vat_id, VAT_ID_WEIGHT),
        (indicators.has_privacy_policy, PRIVACY_WEIGHT),
        (indicators.has_contact_page, CONTACT_WEIGHT),
        (indicators.has_local_language, LANGUAGE_WEIGHT),
        (indicators.has_business_keywords, KEYWORD_WEIGHT),
    ];

    let score: f64 = signals
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, weight)| weight)
        .sum();

    score.clamp(0.0, 1.0)
}

// Keywords like "ag" or "kg" would match inside every other word otherwise.
fn contains_word(haystack: &str, keyword: &str) -> bool {
    haystack.match_indices(keyword).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + keyword.len()..].chars().next();
        !before.is_some_and(char::is_alphanumeric) && !after.is_some_and(char::is_alphanumeric)
    })
}
