use serde::Serialize;

use crate::datalayer::ParamSet;
use crate::encoding::encode_uri_component;

pub const PIXEL_PATH: &str = "/pixel";

/// A fully assembled tracking request, ready to be fired.
#[derive(Debug, Clone, Serialize)]
pub struct PixelRequest {
    pub url: String,
    pub params: ParamSet,
}

impl PixelRequest {
    /// Build the pixel URL on `collector`, using the page's own scheme.
    ///
    /// Undefined parameters are skipped unless `transmit_undefined` is set, in
    /// which case they are sent as the literal `undefined`.
    pub fn new(scheme: &str, collector: &str, params: ParamSet, transmit_undefined: bool) -> Self {
        let query = params
            .iter()
            .filter(|(_, value)| transmit_undefined || !value.is_undefined())
            .map(|(key, value)| {
                format!(
                    "{}={}",
                    encode_uri_component(key),
                    encode_uri_component(&value.to_string())
                )
            })
            .collect::<Vec<_>>()
            .join("&");

        let url = format!("{scheme}://{collector}{PIXEL_PATH}?{query}");
        Self { url, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datalayer::ParamValue;

    fn params() -> ParamSet {
        let mut params = ParamSet::new();
        params.insert("ufq".to_string(), ParamValue::Number(2.0));
        params.insert("traffic_history".to_string(), ParamValue::from("google|criteo"));
        params.insert("missing".to_string(), ParamValue::Undefined);
        params.insert("q_a b".to_string(), ParamValue::from("x&y"));
        params
    }

    #[test]
    fn test_url_skips_undefined_by_default() {
        let request = PixelRequest::new("https", "n.254a.com", params(), false);
        assert_eq!(
            request.url,
            "https://n.254a.com/pixel?q_a%20b=x%26y&traffic_history=google%7Ccriteo&ufq=2"
        );
    }

    #[test]
    fn test_url_can_transmit_undefined() {
        let request = PixelRequest::new("http", "collector.test", params(), true);
        assert!(request.url.starts_with("http://collector.test/pixel?missing=undefined&"));
    }

    #[test]
    fn test_empty_params() {
        let request = PixelRequest::new("https", "n.254a.com", ParamSet::new(), false);
        assert_eq!(request.url, "https://n.254a.com/pixel?");
    }
}
