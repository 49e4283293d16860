//! The tracker context
//!
//! A [`Tracker`] owns everything one tag instance needs: configuration,
//! storage handles, the accumulated data layer and debug stats. The host page
//! drives it through `set`/`map`/`remote`/`ab`/`track`, either directly or
//! through a command queue.

pub mod assembler;
pub mod command;
pub mod stats;

pub use assembler::{assemble, query_params, PageContext};
pub use command::{legacy, Command, CommandError};
pub use stats::{Stats, StatsReport};

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::ab::{AbAssigner, GroupWeights};
use crate::config::Config;
use crate::datalayer::{flatten, map_and_flatten, DataValue, Mapping, ParamSet};
use crate::delivery::{CollectorResponse, Piggyback, PixelRequest, Transport};
use crate::referrer::ReferrerClassifier;
use crate::session::{PageView, SessionEngine};
use crate::storage::KeyValueStore;

pub struct Tracker {
    config: Config,
    domain: String,
    cookies: Arc<dyn KeyValueStore>,
    session: Arc<dyn KeyValueStore>,
    classifier: ReferrerClassifier,
    data: ParamSet,
    /// Distribution from the last explicit `ab` call
    ab_groups: Option<GroupWeights>,
    stats: Stats,
    rng: StdRng,
}

impl Tracker {
    pub fn new(
        config: Config,
        cookies: Arc<dyn KeyValueStore>,
        session: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            domain: config.domain.clone(),
            config,
            cookies,
            session,
            classifier: ReferrerClassifier::new(),
            data: ParamSet::new(),
            ab_groups: None,
            stats: Stats::default(),
            rng: StdRng::from_rng(&mut rand::rng()),
        }
    }

    /// Replace the random source, e.g. with a seeded one in tests.
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Collector host pixels are sent to
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Parameters accumulated so far through `set` and `map`
    pub fn data(&self) -> &ParamSet {
        &self.data
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn report(&self) -> StatsReport<'_> {
        StatsReport {
            y: true,
            version: env!("CARGO_PKG_VERSION"),
            domain: &self.domain,
            alias: &self.config.alias,
            stats: &self.stats,
        }
    }

    /// Store a value under `key`. Nested values are flattened below the key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<DataValue>) {
        let key: String = key.into();
        let flat = flatten(&DataValue::object([(key, value.into())]));
        self.data.extend(flat);
    }

    /// Merge the mapped and flattened projection of `source` into the data.
    pub fn map(&mut self, source: &DataValue, mapping: &Mapping, include_all: bool) {
        let flat = map_and_flatten(source, mapping, include_all);
        debug!(parameters = flat.len(), include_all, "mapped data layer");
        self.data.extend(flat);
    }

    /// Send subsequent pixels to `domain`.
    pub fn remote(&mut self, domain: impl Into<String>) {
        self.domain = domain.into();
        debug!(domain = %self.domain, "collector domain changed");
    }

    /// Use `groups` for A/B assignment from now on and return the visitor's
    /// group under it.
    pub fn ab(&mut self, groups: Option<&GroupWeights>) -> String {
        self.ab_groups = groups.cloned();
        self.assign_group()
    }

    /// Process a page view and build its pixel request.
    ///
    /// The A/B group is resolved on every call, so the sticky cookie is
    /// written even when the page never calls `ab`.
    pub fn track(&mut self, page: &PageContext) -> PixelRequest {
        let group = self.assign_group();

        let engine = SessionEngine::new(
            self.cookies.as_ref(),
            self.session.as_ref(),
            &self.classifier,
            self.config.cookie_ttl(),
        );
        let view = PageView {
            referrer: &page.referrer,
            page_host: page.host(),
            now: page.now,
        };
        let snapshot = engine.process(&view, &mut self.rng);

        let params = assemble(&self.data, page, &snapshot, &group);
        self.stats.track_count += 1;

        let request = PixelRequest::new(
            page.url.scheme(),
            &self.domain,
            params,
            self.config.transmit_undefined,
        );
        self.stats.parameters = request.params.clone();
        self.stats.fire += 1;

        debug!(
            session_id = %snapshot.session_id,
            new_session = snapshot.new_session,
            ab = %group,
            parameters = request.params.len(),
            "built pixel request"
        );
        request
    }

    fn assign_group(&mut self) -> String {
        let assigner = AbAssigner::new(self.cookies.as_ref(), self.config.cookie_ttl());
        assigner.assign(self.ab_groups.as_ref(), &mut self.rng)
    }

    /// Fire `request` and handle the collector's answer.
    ///
    /// Delivery failures are logged and yield no piggybacks.
    pub async fn deliver(&mut self, request: &PixelRequest, transport: &dyn Transport) -> Vec<Piggyback> {
        match transport.send(request).await {
            Ok(Some(response)) => self.handle_response(&response),
            Ok(None) => Vec::new(),
            Err(err) => {
                warn!(url = %request.url, error = %err, "pixel delivery failed");
                Vec::new()
            }
        }
    }

    /// Record a collector response and return the piggybacks to render.
    pub fn handle_response(&mut self, response: &CollectorResponse) -> Vec<Piggyback> {
        let mut placed = Vec::new();
        if response.is_success() {
            self.stats.cases = response.cases().cloned();
            for piggyback in response.piggybacks() {
                if piggyback.render().is_none() {
                    debug!(piggyback = ?piggyback, "skipping piggyback of unknown type");
                    continue;
                }
                self.stats.piggybacks.push(piggyback.value().to_string());
                placed.push(piggyback);
            }
        }
        self.stats.callback += 1;
        placed
    }

    /// Run `commands` in order, returning the pixels built by `track`.
    pub fn apply(
        &mut self,
        commands: impl IntoIterator<Item = Command>,
        page: &PageContext,
    ) -> Vec<PixelRequest> {
        let mut requests = Vec::new();
        for command in commands {
            match command {
                Command::Set { key, value } => self.set(key, value),
                Command::Map {
                    source,
                    mapping,
                    include_all,
                } => self.map(&source, &mapping, include_all),
                Command::Remote(domain) => self.remote(domain),
                Command::Ab(groups) => {
                    self.ab(groups.as_ref());
                }
                Command::Track => requests.push(self.track(page)),
                Command::Unknown(method) => {
                    debug!(method = %method, "skipping unsupported command");
                }
            }
        }
        requests
    }

    /// Parse a raw host-page queue (current or legacy form) and run it.
    pub fn run_queue(&mut self, queue: serde_json::Value, page: &PageContext) -> Vec<PixelRequest> {
        let commands = legacy::make_compatible(queue)
            .into_iter()
            .filter_map(|raw| match Command::try_from(raw) {
                Ok(command) => Some(command),
                Err(err) => {
                    warn!(error = %err, "skipping malformed command");
                    None
                }
            })
            .collect::<Vec<_>>();
        self.apply(commands, page)
    }
}
