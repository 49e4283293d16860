use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{CollectorResponse, DeliveryError, PixelRequest};

/// Sends pixel requests to the collector.
///
/// Delivery is fire-and-forget: a request is sent once and never retried.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fire `request`, returning the parsed collector response when the body
    /// carried one.
    async fn send(&self, request: &PixelRequest) -> Result<Option<CollectorResponse>, DeliveryError>;
}

/// HTTP GET transport backed by reqwest
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("yieldr/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &PixelRequest) -> Result<Option<CollectorResponse>, DeliveryError> {
        let response = self.client.get(&request.url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DeliveryError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(None);
        }

        // Pixels may answer with an image or plain text; only structured
        // bodies carry piggybacks.
        match CollectorResponse::parse(&body) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => {
                debug!(error = %err, "collector body carried no response");
                Ok(None)
            }
        }
    }
}
