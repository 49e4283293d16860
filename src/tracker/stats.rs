use serde::Serialize;

use crate::datalayer::ParamSet;

/// Counters and last-seen values exposed to debugging tools
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    /// Pixels built
    pub fire: u64,
    /// Collector responses handled
    pub callback: u64,
    #[serde(rename = "track.count")]
    pub track_count: u64,
    /// Parameters of the last pixel
    pub parameters: ParamSet,
    /// Values of every rendered piggyback
    pub piggybacks: Vec<String>,
    /// Cases matched by the last successful response
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cases: Option<serde_json::Value>,
}

/// What the debugging bookmarklet is told about a tracker
#[derive(Debug, Clone, Serialize)]
pub struct StatsReport<'a> {
    pub y: bool,
    pub version: &'static str,
    pub domain: &'a str,
    pub alias: &'a str,
    #[serde(flatten)]
    pub stats: &'a Stats,
}
