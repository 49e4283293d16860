//! Storage key names shared with tags already deployed in the wild

// Persistent visitor cookies
pub const AB_GROUP: &str = "_yldr_ab";
pub const HISTORY: &str = "_yldr_history";
pub const SESSION_NUMBER: &str = "_yldr_session_nr";
pub const USER_FREQUENCY: &str = "_yldr_user_fq";

// Per-tab session storage
pub const SESSION_ID: &str = "_yldr_session";
pub const SESSION_START: &str = "_yldr_session_ts";
pub const SESSION_FREQUENCY: &str = "_yldr_session_fq";
pub const TRAFFIC_SOURCE: &str = "_yldr_traffic_src";
pub const TRAFFIC_TYPE: &str = "_yldr_traffic_type";
pub const TRAFFIC_KEYWORDS: &str = "_yldr_traffic_kw";
