use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use super::trait_def::{KeyValueStore, StorageError, StorageResult};
use crate::encoding::{decode_uri_component, encode_uri_component};

/// Cookie storage backed by a `document.cookie`-style header.
///
/// Reads come from the parsed header, writes update the jar and are recorded
/// as `Set-Cookie` lines scoped to the page hostname with path `/`.
pub struct CookieJar {
    hostname: String,
    state: Mutex<JarState>,
}

#[derive(Default)]
struct JarState {
    cookies: Vec<(String, String)>,
    set_cookies: Vec<String>,
}

impl CookieJar {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            state: Mutex::new(JarState::default()),
        }
    }

    /// Parse a header such as `"_yldr_ab=a; _yldr_user_fq=3"`.
    pub fn from_header(hostname: impl Into<String>, header: &str) -> Self {
        let cookies = header
            .split(';')
            .filter_map(|pair| {
                let (name, value) = pair.trim().split_once('=')?;
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        Self {
            hostname: hostname.into(),
            state: Mutex::new(JarState {
                cookies,
                set_cookies: Vec::new(),
            }),
        }
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    /// Current jar contents in header form
    pub fn header(&self) -> StorageResult<String> {
        let state = self.lock()?;
        Ok(state
            .cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("; "))
    }

    /// `Set-Cookie` lines produced by writes, oldest first
    pub fn set_cookie_headers(&self) -> StorageResult<Vec<String>> {
        Ok(self.lock()?.set_cookies.clone())
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, JarState>> {
        self.state.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl KeyValueStore for CookieJar {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let state = self.lock()?;
        let Some((_, raw)) = state.cookies.iter().find(|(name, _)| name == key) else {
            return Ok(None);
        };

        match decode_uri_component(raw) {
            Some(decoded) => Ok(Some(decoded)),
            None => {
                tracing::debug!(cookie = %key, "cookie value is not valid URI encoding, using raw value");
                Ok(Some(raw.clone()))
            }
        }
    }

    fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<()> {
        let encoded = encode_uri_component(value);
        let mut line = format!("{key}={encoded}");

        let expires = ttl
            .and_then(|ttl| i64::try_from(ttl.as_secs()).ok())
            .and_then(chrono::TimeDelta::try_seconds)
            .and_then(|delta| chrono::Utc::now().checked_add_signed(delta));
        if let Some(expires) = expires {
            line.push_str(&format!(
                ";expires={}",
                expires.format("%a, %d %b %Y %H:%M:%S GMT")
            ));
        }
        line.push_str(&format!(";domain={};path=/", self.hostname));

        let mut state = self.lock()?;
        match state.cookies.iter_mut().find(|(name, _)| name == key) {
            Some(slot) => slot.1 = encoded,
            None => state.cookies.push((key.to_string(), encoded)),
        }
        state.set_cookies.push(line);

        Ok(())
    }
}
