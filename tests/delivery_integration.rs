//! Pixel delivery against a scripted collector

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::{Arc, Mutex};
use url::Url;
use yieldr::config::Config;
use yieldr::delivery::{CollectorResponse, DeliveryError, Piggyback, PixelRequest, Transport};
use yieldr::storage::MemoryStore;
use yieldr::tracker::{PageContext, Tracker};

/// Answers every request with a fixed body and remembers what was sent
struct ScriptedCollector {
    body: Option<&'static str>,
    fail: bool,
    sent: Mutex<Vec<String>>,
}

impl ScriptedCollector {
    fn answering(body: &'static str) -> Self {
        Self {
            body: Some(body),
            fail: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn silent() -> Self {
        Self {
            body: None,
            fail: false,
            sent: Mutex::new(Vec::new()),
        }
    }

    fn failing() -> Self {
        Self {
            body: None,
            fail: true,
            sent: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Transport for ScriptedCollector {
    async fn send(&self, request: &PixelRequest) -> Result<Option<CollectorResponse>, DeliveryError> {
        self.sent.lock().unwrap().push(request.url.clone());
        if self.fail {
            return Err(DeliveryError::Status(503));
        }
        self.body.map(CollectorResponse::parse).transpose()
    }
}

fn tracker() -> Tracker {
    Tracker::new(
        Config::default(),
        Arc::new(MemoryStore::new()),
        Arc::new(MemoryStore::new()),
    )
    .with_rng(StdRng::seed_from_u64(99))
}

fn page() -> PageContext {
    PageContext::new(
        Url::parse("https://shop.test/product/7?utm_campaign=spring").unwrap(),
        "",
        1_700_000_000,
    )
}

#[tokio::test]
async fn test_jsonp_response_places_piggybacks() {
    let collector = ScriptedCollector::answering(
        r#"ydResponse({"status":"success","data":{"case_ids":[5,8],"script":["https://cdn.test/a.js"],"iframe":["https://frame.test/"]}});"#,
    );
    let mut tracker = tracker();
    let request = tracker.track(&page());

    let placed = tracker.deliver(&request, &collector).await;

    assert_eq!(collector.sent.lock().unwrap().as_slice(), &[request.url.clone()]);
    assert_eq!(
        placed,
        vec![
            Piggyback::Script("https://cdn.test/a.js".to_string()),
            Piggyback::Iframe("https://frame.test/".to_string()),
        ]
    );
    let stats = tracker.stats();
    assert_eq!(stats.callback, 1);
    assert_eq!(stats.fire, 1);
    assert_eq!(stats.cases, Some(serde_json::json!([5, 8])));
    assert_eq!(stats.piggybacks.len(), 2);
}

#[tokio::test]
async fn test_error_status_skips_piggybacks() {
    let collector = ScriptedCollector::answering(r#"{"status":"error","data":{"image":["https://px.test/"]}}"#);
    let mut tracker = tracker();
    let request = tracker.track(&page());

    assert!(tracker.deliver(&request, &collector).await.is_empty());
    assert_eq!(tracker.stats().callback, 1);
    assert!(tracker.stats().piggybacks.is_empty());
    assert_eq!(tracker.stats().cases, None);
}

#[tokio::test]
async fn test_empty_body_is_not_a_callback() {
    let collector = ScriptedCollector::silent();
    let mut tracker = tracker();
    let request = tracker.track(&page());

    assert!(tracker.deliver(&request, &collector).await.is_empty());
    assert_eq!(tracker.stats().callback, 0);
}

#[tokio::test]
async fn test_delivery_failure_is_swallowed() {
    let collector = ScriptedCollector::failing();
    let mut tracker = tracker();
    let request = tracker.track(&page());

    assert!(tracker.deliver(&request, &collector).await.is_empty());
    assert_eq!(collector.sent.lock().unwrap().len(), 1);
    assert_eq!(tracker.stats().fire, 1);
    assert_eq!(tracker.stats().callback, 0);
}

#[tokio::test]
async fn test_pixel_carries_page_parameters() {
    let collector = ScriptedCollector::silent();
    let mut tracker = tracker();
    tracker.set("sku", "SKU 7");
    let request = tracker.track(&page());
    tracker.deliver(&request, &collector).await;

    let sent = collector.sent.lock().unwrap();
    assert!(sent[0].contains("sku=SKU%207"));
    assert!(sent[0].contains("utm_campaign=spring"));
    assert!(sent[0].contains("path=%2Fproduct%2F7"));
}
