//! Merges data-layer values, URL query parameters and session state into the
//! flat parameter set carried by the pixel.

use url::Url;

use crate::datalayer::{to_fixed_2, ParamSet, ParamValue};
use crate::encoding::escape;
use crate::referrer::clean;
use crate::session::SessionSnapshot;

const UTM_PREFIX: &str = "utm_";
const QUERY_PREFIX: &str = "q_";

/// The page being tracked
#[derive(Debug, Clone)]
pub struct PageContext {
    pub url: Url,
    /// Referrer URL, empty when the visitor arrived directly
    pub referrer: String,
    /// Unix seconds
    pub now: i64,
}

impl PageContext {
    pub fn new(url: Url, referrer: impl Into<String>, now: i64) -> Self {
        Self {
            url,
            referrer: referrer.into(),
            now,
        }
    }

    pub fn host(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// `host[:port]` as `location.host` reports it
    fn host_with_port(&self) -> String {
        match self.url.port() {
            Some(port) => format!("{}:{port}", self.host()),
            None => self.host().to_string(),
        }
    }

    /// `#fragment`, or empty when the URL has none
    fn hash(&self) -> String {
        match self.url.fragment() {
            Some(fragment) if !fragment.is_empty() => format!("#{fragment}"),
            _ => String::new(),
        }
    }
}

/// Query parameters of `url`, renamed for the pixel.
///
/// Only `key=value` pairs with exactly one `=` survive. Values are kept
/// percent-encoded as they appear in the URL.
pub fn query_params(url: &Url) -> ParamSet {
    let mut params = ParamSet::new();
    let Some(query) = url.query() else {
        return params;
    };

    for pair in query.split('&') {
        let mut parts = pair.split('=');
        let (Some(key), Some(value), None) = (parts.next(), parts.next(), parts.next()) else {
            continue;
        };
        let key = if key.starts_with(UTM_PREFIX) {
            key.to_string()
        } else {
            format!("{QUERY_PREFIX}{key}")
        };
        params.insert(key, ParamValue::from(value));
    }
    params
}

/// Build the pixel parameters. Later sources override earlier ones: `data`,
/// then the page query, then the session fields and A/B group.
pub fn assemble(
    data: &ParamSet,
    page: &PageContext,
    session: &SessionSnapshot,
    ab_group: &str,
) -> ParamSet {
    let mut params = data.clone();
    params.extend(query_params(&page.url));

    let path = page.url.path();
    let traffic = &session.traffic;

    params.insert("ab".into(), ParamValue::from(ab_group));
    params.insert("sessid".into(), ParamValue::from(session.session_id.as_str()));
    params.insert("uer".into(), ParamValue::from(to_fixed_2(session.user_engagement)));
    params.insert("ser".into(), ParamValue::from(to_fixed_2(session.session_engagement)));
    params.insert("ufq".into(), ParamValue::from(session.user_frequency));
    params.insert("sfq".into(), ParamValue::from(session.session_frequency));
    params.insert(
        "referrer".into(),
        ParamValue::from(escape(&format!("{}{path}{}", page.host_with_port(), page.hash()))),
    );
    params.insert("path".into(), ParamValue::from(escape(path)));
    params.insert("prev".into(), ParamValue::from(clean(&page.referrer)));
    params.insert("traffic_source".into(), ParamValue::from(traffic.name.as_str()));
    params.insert("traffic_type".into(), ParamValue::from(traffic.kind.as_str()));
    if let Some(keywords) = &traffic.keywords {
        params.insert("traffic_keywords".into(), ParamValue::from(keywords.as_str()));
    }
    params.insert("traffic_history".into(), ParamValue::from(session.history.to_string()));

    params
}
