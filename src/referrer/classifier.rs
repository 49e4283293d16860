//! Vendor table and referrer classification

use regex::Regex;
use std::sync::LazyLock;

use super::models::{Classification, TrafficKind, NO_REFERRER};

/// Which query parameter a search vendor puts the search terms in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeywordParam {
    Q,
    P,
}

struct Vendor {
    name: &'static str,
    pattern: Regex,
    kind: TrafficKind,
    keyword_param: Option<KeywordParam>,
}

/// Known vendors in match priority order.
const VENDOR_TABLE: &[(&str, &str, TrafficKind, Option<KeywordParam>)] = &[
    ("criteo", r"https?://(.*)criteo.([^/?]*)", TrafficKind::Display, None),
    ("doubleclick", r"https?://(.*)doubleclick.([^/?]*)", TrafficKind::Display, None),
    ("turn", r"https?://(.*)turn.([^/?]*)", TrafficKind::Display, None),
    ("appnexus", r"https?://(.*)adnxs.([^/?]*)", TrafficKind::Display, None),
    ("rubicon", r"https?://(.*)rubiconproject.([^/?]*)", TrafficKind::Display, None),
    ("yieldr", r"https?://(.*)254a.([^/?]*)", TrafficKind::Display, None),
    ("google", r"https?://(.*)google.([^/?]*)", TrafficKind::Search, Some(KeywordParam::Q)),
    ("bing", r"https?://(.*)bing.com", TrafficKind::Search, Some(KeywordParam::Q)),
    ("yahoo", r"https?://(.*)yahoo.com", TrafficKind::Search, Some(KeywordParam::P)),
];

static VENDORS: LazyLock<Vec<Vendor>> = LazyLock::new(|| {
    VENDOR_TABLE
        .iter()
        .map(|&(name, pattern, kind, keyword_param)| Vendor {
            name,
            pattern: Regex::new(pattern).expect("vendor patterns are valid"),
            kind,
            keyword_param,
        })
        .collect()
});

static Q_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"q=([A-Za-z0-9_%+-]*)").expect("keyword pattern is valid"));

static P_KEYWORDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"p=([A-Za-z0-9_%+-]*)").expect("keyword pattern is valid"));

static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://").expect("scheme pattern is valid"));

/// Classifies referrer URLs against the built-in vendor table.
///
/// Classification is pure: the same URL always yields the same result.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferrerClassifier;

impl ReferrerClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a referrer. Empty input is treated as no referrer.
    pub fn classify(&self, referrer: &str) -> Classification {
        if referrer.is_empty() {
            return Classification {
                name: NO_REFERRER.to_string(),
                kind: TrafficKind::Other,
                keywords: None,
            };
        }

        match self.vendor(referrer) {
            Some(vendor) => Classification {
                name: vendor.name.to_string(),
                kind: vendor.kind,
                keywords: vendor
                    .keyword_param
                    .and_then(|param| extract_keywords(referrer, param)),
            },
            None => Classification {
                name: clean(referrer),
                kind: TrafficKind::Other,
                keywords: None,
            },
        }
    }

    /// Classify a referrer for a page served from `page_host`.
    ///
    /// Referrers from the page's own host that match no vendor are marked as
    /// self-referrals.
    pub fn classify_for_page(&self, referrer: &str, page_host: &str) -> Classification {
        let mut classification = self.classify(referrer);
        if classification.kind == TrafficKind::Other
            && !page_host.is_empty()
            && classification.name.eq_ignore_ascii_case(page_host)
        {
            classification.kind = TrafficKind::SelfReferral;
        }
        classification
    }

    /// Vendor name for a referrer, falling back to its bare host.
    pub fn name(&self, referrer: &str) -> String {
        self.classify(referrer).name
    }

    fn vendor(&self, referrer: &str) -> Option<&'static Vendor> {
        VENDORS.iter().find(|vendor| vendor.pattern.is_match(referrer))
    }
}

/// Strip the scheme and everything from the first `/`, `?` or `#`.
///
/// An empty input yields the no-referrer sentinel.
pub fn clean(url: &str) -> String {
    if url.is_empty() {
        return NO_REFERRER.to_string();
    }
    let without_scheme = SCHEME.replace(url, "");
    without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_string()
}

fn extract_keywords(referrer: &str, param: KeywordParam) -> Option<String> {
    let pattern = match param {
        KeywordParam::Q => &*Q_KEYWORDS,
        KeywordParam::P => &*P_KEYWORDS,
    };
    pattern
        .captures(referrer)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}
