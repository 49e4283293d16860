//! Data models for referrer attribution

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel source name used when the page has no referrer.
pub const NO_REFERRER: &str = "NO_REFERRER";

/// Marketing channel category of a traffic source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrafficKind {
    Display,
    Search,
    #[serde(rename = "self")]
    SelfReferral,
    Other,
}

impl TrafficKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrafficKind::Display => "display",
            TrafficKind::Search => "search",
            TrafficKind::SelfReferral => "self",
            TrafficKind::Other => "other",
        }
    }
}

impl fmt::Display for TrafficKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TrafficKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "display" => Ok(TrafficKind::Display),
            "search" => Ok(TrafficKind::Search),
            "self" => Ok(TrafficKind::SelfReferral),
            "other" => Ok(TrafficKind::Other),
            other => Err(format!("unknown traffic kind '{other}'")),
        }
    }
}

/// Attribution derived from a referrer URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Vendor name, or the bare referrer host for unknown vendors
    pub name: String,

    /// Channel category
    #[serde(rename = "type")]
    pub kind: TrafficKind,

    /// Search terms, only for search vendors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}
