//! Pixel delivery
//!
//! Builds the pixel URL, fires it through a [`Transport`] and interprets the
//! collector's optional JSON/JSONP answer.

pub mod piggyback;
pub mod pixel;
pub mod transport;

pub use piggyback::{CollectorResponse, Piggyback};
pub use pixel::{PixelRequest, PIXEL_PATH};
pub use transport::{HttpTransport, Transport};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("collector answered with status {0}")]
    Status(u16),

    #[error("malformed collector response: {0}")]
    Malformed(String),
}
