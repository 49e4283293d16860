//! Session and visitor attribution
//!
//! Derives session identity, visit counters and engagement scores from the
//! visitor's cookies and the tab's session storage.

pub mod engine;
pub mod history;
pub mod keys;

pub use engine::{session_engagement, user_engagement, PageView, SessionEngine, SessionSnapshot};
pub use history::TrafficHistory;
