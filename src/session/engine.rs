//! Session and attribution derivation
//!
//! Every tracked page view passes through [`SessionEngine::process`], which
//! reads the visitor's cookies and the tab's session storage, decides whether
//! a new session begins, carries or refreshes the traffic attribution, bumps
//! the visit counters and writes everything back.
//!
//! Storage is best-effort: a failing read counts as "not set" and a failing
//! write is logged and skipped, so one page view never fails because the
//! browser refused storage.

use rand::Rng;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use super::history::TrafficHistory;
use super::keys;
use crate::referrer::{Classification, ReferrerClassifier, TrafficKind};
use crate::storage::KeyValueStore;

/// What the engine needs to know about the page being viewed
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    /// `document.referrer`, empty when there is none
    pub referrer: &'a str,
    /// Hostname of the page itself
    pub page_host: &'a str,
    /// Current time (Unix seconds)
    pub now: i64,
}

/// Session and visitor state after a page view was processed
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: String,
    pub new_session: bool,
    pub session_start_ts: i64,
    pub session_frequency: u64,
    pub session_number: u64,
    pub user_frequency: u64,
    /// Attribution for the session (fixed at session start)
    pub traffic: Classification,
    pub history: TrafficHistory,
    pub session_engagement: f64,
    pub user_engagement: f64,
}

pub struct SessionEngine<'a> {
    cookies: &'a dyn KeyValueStore,
    session: &'a dyn KeyValueStore,
    classifier: &'a ReferrerClassifier,
    cookie_ttl: Duration,
}

impl<'a> SessionEngine<'a> {
    pub fn new(
        cookies: &'a dyn KeyValueStore,
        session: &'a dyn KeyValueStore,
        classifier: &'a ReferrerClassifier,
        cookie_ttl: Duration,
    ) -> Self {
        Self {
            cookies,
            session,
            classifier,
            cookie_ttl,
        }
    }

    pub fn process<R: Rng>(&self, page: &PageView<'_>, rng: &mut R) -> SessionSnapshot {
        let stored_id = read(self.session, keys::SESSION_ID);
        let mut session_number = parse_count(read(self.cookies, keys::SESSION_NUMBER))
            .filter(|n| *n > 0)
            .unwrap_or(1);
        let user_frequency = next_count(read(self.cookies, keys::USER_FREQUENCY));

        let new_session = stored_id.is_none();
        let (session_id, session_start_ts, session_frequency, traffic) = match stored_id {
            None => {
                let session_id = new_session_id(rng);
                // A visitor's very first page view already counts as session 1.
                if user_frequency > 1 {
                    session_number = session_number.saturating_add(1);
                }
                let traffic = self.classify(page);
                self.cache_traffic(&traffic);
                debug!(
                    session_id = %session_id,
                    session_number,
                    traffic_source = %traffic.name,
                    traffic_type = %traffic.kind,
                    "started new session"
                );
                (session_id, page.now, 1, traffic)
            }
            Some(session_id) => {
                // A start outside [0, now] cannot come from this engine.
                let session_start_ts = read(self.session, keys::SESSION_START)
                    .and_then(|ts| ts.trim().parse::<i64>().ok())
                    .filter(|ts| (0..=page.now).contains(ts))
                    .unwrap_or(page.now);
                let session_frequency = next_count(read(self.session, keys::SESSION_FREQUENCY));
                let traffic = match self.cached_traffic() {
                    Some(traffic) => traffic,
                    None => {
                        debug!(session_id = %session_id, "session attribution missing, reclassifying");
                        let traffic = self.classify(page);
                        self.cache_traffic(&traffic);
                        traffic
                    }
                };
                (session_id, session_start_ts, session_frequency, traffic)
            }
        };

        let mut history = TrafficHistory::parse(&read(self.cookies, keys::HISTORY).unwrap_or_default());
        history.add(&traffic.name);

        let elapsed = page.now.saturating_sub(session_start_ts);
        let session_engagement = session_engagement(session_frequency, elapsed);
        let user_engagement = user_engagement(session_number, user_frequency);

        write(self.session, keys::SESSION_ID, &session_id, None);
        write(self.session, keys::SESSION_START, &session_start_ts.to_string(), None);
        write(self.session, keys::SESSION_FREQUENCY, &session_frequency.to_string(), None);

        let ttl = Some(self.cookie_ttl);
        write(self.cookies, keys::HISTORY, &history.to_string(), ttl);
        write(self.cookies, keys::USER_FREQUENCY, &user_frequency.to_string(), ttl);
        write(self.cookies, keys::SESSION_NUMBER, &session_number.to_string(), ttl);

        SessionSnapshot {
            session_id,
            new_session,
            session_start_ts,
            session_frequency,
            session_number,
            user_frequency,
            traffic,
            history,
            session_engagement,
            user_engagement,
        }
    }

    fn classify(&self, page: &PageView<'_>) -> Classification {
        self.classifier.classify_for_page(page.referrer, page.page_host)
    }

    fn cached_traffic(&self) -> Option<Classification> {
        let name = read(self.session, keys::TRAFFIC_SOURCE)?;
        let kind = read(self.session, keys::TRAFFIC_TYPE)?
            .parse::<TrafficKind>()
            .ok()?;
        let keywords = read(self.session, keys::TRAFFIC_KEYWORDS);
        Some(Classification {
            name,
            kind,
            keywords,
        })
    }

    fn cache_traffic(&self, traffic: &Classification) {
        write(self.session, keys::TRAFFIC_SOURCE, &traffic.name, None);
        write(self.session, keys::TRAFFIC_TYPE, traffic.kind.as_str(), None);
        write(
            self.session,
            keys::TRAFFIC_KEYWORDS,
            traffic.keywords.as_deref().unwrap_or_default(),
            None,
        );
    }
}

/// `ln(session page views) / ln(seconds since session start)`.
///
/// NaN and infinities are legitimate results (first view, sub-second
/// sessions) and are reported as-is.
pub fn session_engagement(session_frequency: u64, elapsed_secs: i64) -> f64 {
    (session_frequency as f64).ln() / (elapsed_secs as f64).ln()
}

/// `1 - sessions / visits`: many visits per session scores close to 1.
pub fn user_engagement(session_number: u64, user_frequency: u64) -> f64 {
    1.0 - (session_number as f64 / user_frequency as f64)
}

fn new_session_id<R: Rng>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);
    uuid::Builder::from_random_bytes(bytes).into_uuid().to_string()
}

fn parse_count(raw: Option<String>) -> Option<u64> {
    raw.and_then(|raw| raw.trim().parse::<u64>().ok())
}

/// One more than the stored count; absent or malformed counts restart at 1.
fn next_count(raw: Option<String>) -> u64 {
    parse_count(raw).map(|n| n.saturating_add(1)).unwrap_or(1)
}

fn read(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(err) => {
            warn!(key = %key, error = %err, "storage read failed, using default");
            None
        }
    }
}

fn write(store: &dyn KeyValueStore, key: &str, value: &str, ttl: Option<Duration>) {
    if let Err(err) = store.set(key, value, ttl) {
        warn!(key = %key, error = %err, "storage write failed");
    }
}
