//! HTTP transport used to fetch feature definitions from the server.
use std::time::Duration;

use reqwest::{
    header::{ETAG, IF_NONE_MATCH},
    StatusCode, Url,
};

use crate::{Error, Result};

/// Header carrying the environment API key.
pub const API_KEY_HEADER: &str = "x-environment-key";

/// Path of the endpoint returning all feature definitions, relative to the base URL.
pub const ALL_FEATURES_PATH: &str = "all";

/// Raw response of a conditional fetch.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
    /// Response validator (`ETag`), if the server sent one.
    pub validator: Option<String>,
}

/// Performs conditional GET requests against the FeatureBoard service.
///
/// Implementations must bound the request duration. A timeout is reported as an `Err`.
pub trait Transport: Send + Sync {
    fn conditional_get(&self, path: &str, validator: Option<&str>) -> Result<TransportResponse>;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn conditional_get(&self, path: &str, validator: Option<&str>) -> Result<TransportResponse> {
        (**self).conditional_get(path, validator)
    }
}

/// [`Transport`] backed by a blocking `reqwest` client.
pub struct HttpTransport {
    // Client holds a connection pool internally, so we're reusing the client between requests.
    client: reqwest::blocking::Client,
    base_url: Url,
    api_key: String,
}

impl HttpTransport {
    /// Create a transport for `base_url`.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidBaseUrl`] if `base_url` cannot be parsed.
    /// - [`Error::Network`] if the HTTP client cannot be initialized.
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<HttpTransport> {
        // Ensure a trailing slash so relative paths are joined below the base path instead of
        // replacing its last segment.
        let base_url = Url::parse(&format!("{}/", base_url.trim_end_matches('/')))
            .map_err(Error::InvalidBaseUrl)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("featureboard-rust/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(HttpTransport {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url.join(path).map_err(Error::InvalidBaseUrl)
    }
}

impl Transport for HttpTransport {
    fn conditional_get(&self, path: &str, validator: Option<&str>) -> Result<TransportResponse> {
        let mut request = self
            .client
            .get(self.url(path)?)
            .header(API_KEY_HEADER, &self.api_key);
        if let Some(validator) = validator {
            request = request.header(IF_NONE_MATCH, validator);
        }

        let response = request.send()?;

        let status = response.status();
        let validator = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes()?.to_vec();

        Ok(TransportResponse {
            status,
            body,
            validator,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::{
        net::TcpListener,
        time::{Duration, Instant},
    };

    use super::{HttpTransport, Transport};
    use crate::Error;

    #[test]
    fn joins_path_below_base_path() {
        let transport =
            HttpTransport::new("https://example.com/api", "key", Duration::from_secs(1)).unwrap();

        assert_eq!(
            transport.url("all").unwrap().as_str(),
            "https://example.com/api/all"
        );
    }

    #[test]
    fn request_timeout_bounds_unanswered_request() {
        // Connections complete in the listen backlog but never get a response.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let transport = HttpTransport::new(&base_url, "key", Duration::from_millis(200)).unwrap();

        let started = Instant::now();
        let result = transport.conditional_get("all", None);

        match result {
            Err(Error::Network(err)) => assert!(err.is_timeout(), "{err:?}"),
            other => panic!("expected a timeout, got {other:?}"),
        }
        assert!(started.elapsed() < Duration::from_secs(5));
        drop(listener);
    }

    #[test]
    fn rejects_invalid_base_url() {
        let result = HttpTransport::new("not a url", "key", Duration::from_secs(1));

        assert!(matches!(result, Err(Error::InvalidBaseUrl(_))));
    }
}
