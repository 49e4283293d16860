//! Collector responses and the third-party markup they carry

use serde::{Deserialize, Serialize};

use super::DeliveryError;

/// Keys in the response data that describe matched cases, not markup.
const CASE_KEYS: &[&str] = &["cases", "case_id", "case_ids"];

/// Markup the collector asks the page to render
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum Piggyback {
    /// Raw HTML written into a hidden iframe
    Html(String),
    /// Image URL
    Image(String),
    /// Script URL
    Script(String),
    /// Iframe URL
    Iframe(String),
    Unknown { kind: String, value: String },
}

impl Piggyback {
    pub fn from_kind(kind: &str, value: String) -> Self {
        match kind {
            "html" => Piggyback::Html(value),
            "image" => Piggyback::Image(value),
            "script" | "javascript" => Piggyback::Script(value),
            "iframe" => Piggyback::Iframe(value),
            other => Piggyback::Unknown {
                kind: other.to_string(),
                value,
            },
        }
    }

    /// Zero-size markup for the piggyback; unknown kinds render nothing.
    pub fn render(&self) -> Option<String> {
        match self {
            Piggyback::Html(content) => Some(format!(
                r#"<iframe frameborder="0" width="0" height="0" style="display:none;visibility:hidden" srcdoc="{}"></iframe>"#,
                escape_attr(content)
            )),
            Piggyback::Image(url) => Some(format!(
                r#"<img width="0" height="0" border="0" src="{}">"#,
                escape_attr(url)
            )),
            Piggyback::Script(url) => Some(format!(
                r#"<script type="text/javascript" async src="{}"></script>"#,
                escape_attr(url)
            )),
            Piggyback::Iframe(url) => Some(format!(
                r#"<iframe frameborder="0" width="0" height="0" style="display:none;visibility:hidden" src="{}"></iframe>"#,
                escape_attr(url)
            )),
            Piggyback::Unknown { .. } => None,
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Piggyback::Html(v) | Piggyback::Image(v) | Piggyback::Script(v) | Piggyback::Iframe(v) => v,
            Piggyback::Unknown { value, .. } => value,
        }
    }
}

/// Body returned by the collector for a pixel request
#[derive(Debug, Clone, Deserialize)]
pub struct CollectorResponse {
    pub status: String,
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl CollectorResponse {
    /// Parse a JSON body, or a JSONP body such as `ydResponse({...});`.
    pub fn parse(body: &str) -> Result<Self, DeliveryError> {
        let body = body.trim();
        if let Ok(response) = serde_json::from_str(body) {
            return Ok(response);
        }

        let json = strip_jsonp(body)
            .ok_or_else(|| DeliveryError::Malformed("neither JSON nor JSONP".to_string()))?;
        serde_json::from_str(json).map_err(|e| DeliveryError::Malformed(e.to_string()))
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Matched case identifiers, under whichever key the collector used
    pub fn cases(&self) -> Option<&serde_json::Value> {
        CASE_KEYS.iter().find_map(|key| self.data.get(*key))
    }

    /// Piggybacks in response order. Empty for unsuccessful responses.
    pub fn piggybacks(&self) -> Vec<Piggyback> {
        if !self.is_success() {
            return Vec::new();
        }

        let mut piggybacks = Vec::new();
        for (kind, entries) in &self.data {
            if CASE_KEYS.contains(&kind.as_str()) {
                continue;
            }
            let values: Vec<&serde_json::Value> = match entries {
                serde_json::Value::Array(items) => items.iter().collect(),
                serde_json::Value::Object(items) => items.values().collect(),
                other => vec![other],
            };
            for value in values {
                if let Some(value) = value.as_str().filter(|v| !v.is_empty()) {
                    piggybacks.push(Piggyback::from_kind(kind, value.to_string()));
                }
            }
        }
        piggybacks
    }
}

fn strip_jsonp(body: &str) -> Option<&str> {
    let open = body.find('(')?;
    let callback = &body[..open];
    let is_identifier = !callback.is_empty()
        && callback
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '$' | '.'));
    if !is_identifier {
        return None;
    }
    let close = body.rfind(')')?;
    if close <= open || !body[close + 1..].trim().trim_end_matches(';').is_empty() {
        return None;
    }
    Some(&body[open + 1..close])
}

fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
