//! Referrer attribution
//!
//! Maps the page referrer onto a known ad or search vendor and its channel
//! category. Unknown referrers are attributed to their bare host.

pub mod classifier;
pub mod models;

pub use classifier::{clean, ReferrerClassifier};
pub use models::{Classification, TrafficKind, NO_REFERRER};
