//! Sticky A/B group assignment
//!
//! Groups are drawn from an arbitrary named-weight distribution. Weights need
//! not sum to 1; `{a: 3, b: 6, c: 5}` draws from `[0, 14)`. Once a visitor
//! holds a group that still exists in the distribution they keep it.

use rand::Rng;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::session::keys;
use crate::storage::KeyValueStore;

/// Named group weights in declaration order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(from = "serde_json::Map<String, serde_json::Value>")]
pub struct GroupWeights(Vec<(String, f64)>);

impl GroupWeights {
    pub fn new<K, I>(groups: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, f64)>,
    {
        Self(groups.into_iter().map(|(k, w)| (k.into(), w)).collect())
    }

    pub fn contains(&self, group: &str) -> bool {
        self.0.iter().any(|(name, _)| name == group)
    }

    fn usable(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0
            .iter()
            .filter(|(_, weight)| weight.is_finite() && *weight > 0.0)
            .map(|(name, weight)| (name.as_str(), *weight))
    }

    fn total(&self) -> f64 {
        self.usable().map(|(_, weight)| weight).sum()
    }

    /// Group whose cumulative range contains `draw`, walking in declaration order.
    fn pick(&self, draw: f64) -> Option<&str> {
        let mut cumulative = 0.0;
        let mut last = None;
        for (name, weight) in self.usable() {
            cumulative += weight;
            if draw <= cumulative {
                return Some(name);
            }
            last = Some(name);
        }
        // Float accumulation can leave the draw a hair above the final sum.
        last
    }
}

impl Default for GroupWeights {
    fn default() -> Self {
        Self::new([("a", 0.5), ("b", 0.5)])
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for GroupWeights {
    fn from(map: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::new(
            map.into_iter()
                .map(|(name, weight)| (name, weight.as_f64().unwrap_or(0.0))),
        )
    }
}

pub struct AbAssigner<'a> {
    cookies: &'a dyn KeyValueStore,
    ttl: Duration,
}

impl<'a> AbAssigner<'a> {
    pub fn new(cookies: &'a dyn KeyValueStore, ttl: Duration) -> Self {
        Self { cookies, ttl }
    }

    /// Return the visitor's group, drawing a fresh one when needed.
    pub fn assign<R: Rng>(&self, groups: Option<&GroupWeights>, rng: &mut R) -> String {
        let default_groups = GroupWeights::default();
        let groups = groups.unwrap_or(&default_groups);

        let stored = match self.cookies.get(keys::AB_GROUP) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(error = %err, "could not read A/B group, drawing a new one");
                None
            }
        };

        let group = match stored.filter(|group| groups.contains(group)) {
            Some(group) => group,
            None => {
                let group = draw(groups, rng)
                    .or_else(|| draw(&default_groups, rng))
                    .unwrap_or_else(|| "a".to_string());
                debug!(group = %group, "assigned A/B group");
                group
            }
        };

        if let Err(err) = self.cookies.set(keys::AB_GROUP, &group, Some(self.ttl)) {
            warn!(error = %err, "could not persist A/B group");
        }

        group
    }
}

fn draw<R: Rng>(groups: &GroupWeights, rng: &mut R) -> Option<String> {
    let total = groups.total();
    if total <= 0.0 {
        return None;
    }
    let draw = rng.random::<f64>() * total;
    groups.pick(draw).map(str::to_string)
}
