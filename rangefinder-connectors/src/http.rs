//! Remote point-elevation client
//!
//! ## Overview
//!
//! When the ray caster steps outside every cached tile it asks a remote
//! elevation service for the points it needs. The wire format is the
//! Open-Elevation lookup API:
//!
//! ```text
//! POST {base_url}/api/v1/lookup
//! {"locations": [{"latitude": 37.5, "longitude": -121.5}, ...]}
//!
//! 200 OK
//! {"results": [{"latitude": 37.5, "longitude": -121.5, "elevation": 104.0}, ...]}
//! ```
//!
//! Results come back in request order. A `null` elevation means the service
//! has no data for that point.
//!
//! ## Failure Handling
//!
//! The caster runs off the frame path and treats a missing elevation as "no
//! terrain here", so a failed lookup never propagates. It is retried with
//! exponential backoff, logged, and answered with `None` for every point:
//!
//! | outcome              | retried | result           |
//! |----------------------|---------|------------------|
//! | 2xx                  | -       | parsed           |
//! | 5xx, 429             | yes     | `None` when spent|
//! | other 4xx            | no      | `None`           |
//! | transport error      | yes     | `None` when spent|
//! | malformed body       | no      | `None`           |
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use rangefinder_connectors::http::{HttpConfig, RemoteElevationClient};
//! use rangefinder_core::terrain::{LayeredElevation, TileCache};
//!
//! let config = HttpConfig::new("https://api.open-elevation.com")
//!     .timeout_secs(5)
//!     .batch_size(64);
//! let remote = RemoteElevationClient::new(config)?;
//!
//! let elevation = LayeredElevation::new(Arc::new(TileCache::default()))
//!     .with_fallback(Arc::new(remote));
//! # Ok::<(), rangefinder_connectors::http::HttpError>(())
//! ```

use std::collections::HashMap;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use log::{debug, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use rangefinder_core::terrain::PointElevationSource;

use crate::ConnectionStats;

/// Default lookup endpoint
pub const LOOKUP_PATH: &str = "/api/v1/lookup";

/// HTTP-specific errors
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network or request error
    #[error("Request failed: {0}")]
    Request(String),

    /// Server returned error status
    #[error("Server error {status}: {message}")]
    ServerError {
        /// HTTP status code
        status: u16,
        /// Response body
        message: String,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

/// HTTP configuration
#[derive(Clone)]
pub struct HttpConfig {
    /// Base URL of the elevation service
    pub base_url: String,
    /// Lookup endpoint appended to `base_url`
    pub lookup_path: String,
    /// Request timeout
    pub timeout: Duration,
    /// Authentication method
    pub auth: AuthMethod,
    /// Custom headers
    pub headers: HashMap<String, String>,
    /// Points per request
    pub batch_size: usize,
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry, doubled on each further retry
    pub backoff_base: Duration,
    /// Upper bound on a single backoff delay
    pub backoff_max: Duration,
    /// User agent string
    pub user_agent: String,
}

/// Authentication methods
#[derive(Clone)]
pub enum AuthMethod {
    /// No authentication
    None,
    /// Bearer token
    Bearer(String),
    /// Basic authentication
    Basic {
        /// User name
        username: String,
        /// Password
        password: String,
    },
    /// API key in header
    ApiKey {
        /// Header name
        header: String,
        /// Key value
        value: String,
    },
}

impl HttpConfig {
    /// Create new configuration with base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            lookup_path: LOOKUP_PATH.to_string(),
            timeout: Duration::from_secs(10),
            auth: AuthMethod::None,
            headers: HashMap::new(),
            batch_size: 100,
            max_retries: 3,
            backoff_base: Duration::from_millis(200),
            backoff_max: Duration::from_secs(2),
            user_agent: format!("Rangefinder/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Set bearer token authentication
    pub fn bearer_token(mut self, token: impl Into<String>) -> Self {
        self.auth = AuthMethod::Bearer(token.into());
        self
    }

    /// Set basic authentication
    pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = AuthMethod::Basic {
            username: username.into(),
            password: password.into(),
        };
        self
    }

    /// Set API key authentication
    pub fn api_key(mut self, header: impl Into<String>, value: impl Into<String>) -> Self {
        self.auth = AuthMethod::ApiKey {
            header: header.into(),
            value: value.into(),
        };
        self
    }

    /// Set request timeout in seconds
    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }

    /// Set points per request
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Set retry count and backoff
    pub fn retries(mut self, max_retries: u32, backoff_base: Duration) -> Self {
        self.max_retries = max_retries;
        self.backoff_base = backoff_base;
        self
    }

    /// Use a different lookup endpoint
    pub fn lookup_path(mut self, path: impl Into<String>) -> Self {
        self.lookup_path = path.into();
        self
    }

    /// Add custom header
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check the URL scheme and batch size
    pub fn validate(&self) -> Result<(), HttpError> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(HttpError::Config("Base URL must start with http:// or https://".into()));
        }
        if self.batch_size == 0 {
            return Err(HttpError::Config("batch_size must be at least 1".into()));
        }
        Ok(())
    }

    /// Full lookup URL
    pub fn lookup_url(&self) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), self.lookup_path)
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor).min(self.backoff_max)
    }

    /// `Authorization`-style header for the configured method
    fn auth_header(&self) -> Option<(String, String)> {
        match &self.auth {
            AuthMethod::None => None,
            AuthMethod::Bearer(token) => Some(("Authorization".into(), format!("Bearer {}", token))),
            AuthMethod::Basic { username, password } => {
                let credentials = STANDARD.encode(format!("{}:{}", username, password));
                Some(("Authorization".into(), format!("Basic {}", credentials)))
            }
            AuthMethod::ApiKey { header, value } => Some((header.clone(), value.clone())),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Location {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Serialize)]
struct LookupRequest {
    locations: Vec<Location>,
}

impl LookupRequest {
    fn new(points: &[(f64, f64)]) -> Self {
        Self {
            locations: points
                .iter()
                .map(|&(latitude, longitude)| Location { latitude, longitude })
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LookupResponse {
    results: Vec<LookupResult>,
}

#[derive(Debug, Deserialize)]
struct LookupResult {
    #[serde(default)]
    elevation: Option<f64>,
}

fn parse_lookup(body: &str, expected: usize) -> Result<Vec<Option<f64>>, HttpError> {
    let response: LookupResponse = serde_json::from_str(body).map_err(|e| HttpError::Serialization(e.to_string()))?;
    if response.results.len() != expected {
        return Err(HttpError::Serialization(format!(
            "expected {} results, got {}",
            expected,
            response.results.len()
        )));
    }
    Ok(response
        .results
        .into_iter()
        .map(|r| r.elevation.filter(|z| z.is_finite()))
        .collect())
}

/// Open-Elevation style point lookup over blocking HTTP
pub struct RemoteElevationClient {
    config: HttpConfig,
    agent: ureq::Agent,
    stats: Mutex<ConnectionStats>,
}

impl RemoteElevationClient {
    /// Create a client after validating `config`
    pub fn new(config: HttpConfig) -> Result<Self, HttpError> {
        config.validate()?;

        let agent = ureq::AgentBuilder::new()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build();

        Ok(Self {
            config,
            agent,
            stats: Mutex::new(ConnectionStats::default()),
        })
    }

    /// Client configuration
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Snapshot of request statistics
    pub fn stats(&self) -> ConnectionStats {
        self.stats.lock().clone()
    }

    /// Elevation for each `(lat, lon)`, in order
    ///
    /// Points are sent in batches of `batch_size`; the first failing batch
    /// fails the whole lookup.
    pub fn lookup(&self, points: &[(f64, f64)]) -> Result<Vec<Option<f64>>, HttpError> {
        let mut elevations = Vec::with_capacity(points.len());
        for chunk in points.chunks(self.config.batch_size) {
            let body = serde_json::to_string(&LookupRequest::new(chunk))
                .map_err(|e| HttpError::Serialization(e.to_string()))?;
            let text = self.execute_with_retry(&body)?;
            let batch = parse_lookup(&text, chunk.len())?;
            self.stats.lock().points_resolved += batch.iter().filter(|z| z.is_some()).count() as u64;
            elevations.extend(batch);
        }
        Ok(elevations)
    }

    fn build_request(&self) -> ureq::Request {
        let mut request = self.agent.post(&self.config.lookup_url());
        if let Some((name, value)) = self.config.auth_header() {
            request = request.set(&name, &value);
        }
        for (name, value) in &self.config.headers {
            request = request.set(name, value);
        }
        request
            .set("Content-Type", "application/json")
            .set("Accept", "application/json")
    }

    fn execute_with_retry(&self, body: &str) -> Result<String, HttpError> {
        let request = self.build_request();
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                let delay = self.config.backoff_delay(attempt);
                debug!("elevation lookup retry {} in {:?}", attempt, delay);
                self.stats.lock().retries += 1;
                std::thread::sleep(delay);
            }

            match request.clone().send_string(body) {
                Ok(response) => {
                    let text = response.into_string().map_err(|e| HttpError::Request(e.to_string()))?;
                    self.stats.lock().requests_sent += 1;
                    return Ok(text);
                }
                Err(ureq::Error::Status(code, response)) => {
                    let error = HttpError::ServerError {
                        status: code,
                        message: response.into_string().unwrap_or_default(),
                    };
                    if code >= 500 || code == 429 {
                        last_error = Some(error);
                        continue;
                    }
                    return Err(self.record_failure(error));
                }
                Err(ureq::Error::Transport(e)) => {
                    last_error = Some(HttpError::Request(e.to_string()));
                }
            }
        }

        let error = last_error.unwrap_or_else(|| HttpError::Request("no attempt made".into()));
        Err(self.record_failure(error))
    }

    fn record_failure(&self, error: HttpError) -> HttpError {
        let mut stats = self.stats.lock();
        stats.requests_failed += 1;
        stats.last_error = Some(error.to_string());
        error
    }
}

impl PointElevationSource for RemoteElevationClient {
    fn query(&self, points: &[(f64, f64)]) -> Vec<Option<f64>> {
        if points.is_empty() {
            return Vec::new();
        }
        match self.lookup(points) {
            Ok(elevations) => elevations,
            Err(e) => {
                warn!("remote elevation lookup for {} points failed: {}", points.len(), e);
                vec![None; points.len()]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answer one connection per canned response, returning the request bodies
    fn serve(responses: Vec<(u16, String)>) -> (String, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let handle = thread::spawn(move || {
            let mut bodies = Vec::new();
            for (status, body) in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut content_length = 0;
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    let lower = line.to_ascii_lowercase();
                    if let Some(value) = lower.strip_prefix("content-length:") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                let mut request = vec![0u8; content_length];
                reader.read_exact(&mut request).unwrap();
                bodies.push(String::from_utf8(request).unwrap());

                let reply = format!(
                    "HTTP/1.1 {} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    status,
                    body.len(),
                    body
                );
                stream.write_all(reply.as_bytes()).unwrap();
            }
            bodies
        });
        (url, handle)
    }

    fn fast(url: &str) -> HttpConfig {
        HttpConfig::new(url).retries(2, Duration::from_millis(1))
    }

    #[test]
    fn rejects_non_http_url() {
        let result = RemoteElevationClient::new(HttpConfig::new("ftp://elevation.local"));
        assert!(matches!(result, Err(HttpError::Config(_))));
    }

    #[test]
    fn rejects_empty_batches() {
        let result = RemoteElevationClient::new(HttpConfig::new("http://elevation.local").batch_size(0));
        assert!(matches!(result, Err(HttpError::Config(_))));
    }

    #[test]
    fn lookup_url_joins_cleanly() {
        let config = HttpConfig::new("https://elevation.local/");
        assert_eq!(config.lookup_url(), "https://elevation.local/api/v1/lookup");
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let config = HttpConfig::new("http://x").retries(5, Duration::from_millis(200));
        assert_eq!(config.backoff_delay(1), Duration::from_millis(200));
        assert_eq!(config.backoff_delay(2), Duration::from_millis(400));
        assert_eq!(config.backoff_delay(3), Duration::from_millis(800));
        assert_eq!(config.backoff_delay(5), Duration::from_secs(2));
        assert_eq!(config.backoff_delay(40), Duration::from_secs(2));
    }

    #[test]
    fn basic_auth_is_base64() {
        let config = HttpConfig::new("http://x").basic_auth("user", "pass");
        let (name, value) = config.auth_header().unwrap();
        assert_eq!(name, "Authorization");
        assert_eq!(value, "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn request_body_matches_wire_format() {
        let body = serde_json::to_value(LookupRequest::new(&[(37.5, -121.5)])).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"locations": [{"latitude": 37.5, "longitude": -121.5}]})
        );
    }

    #[test]
    fn null_elevation_is_none() {
        let body = r#"{"results":[{"latitude":1.0,"longitude":2.0,"elevation":12.5},{"latitude":1.0,"longitude":2.1,"elevation":null}]}"#;
        assert_eq!(parse_lookup(body, 2).unwrap(), vec![Some(12.5), None]);
        assert!(matches!(parse_lookup(body, 3), Err(HttpError::Serialization(_))));
        assert!(matches!(parse_lookup("<html>", 1), Err(HttpError::Serialization(_))));
    }

    #[test]
    fn queries_local_service() {
        let (url, server) = serve(vec![(
            200,
            r#"{"results":[{"elevation":104.0},{"elevation":null}]}"#.to_string(),
        )]);
        let client = RemoteElevationClient::new(fast(&url)).unwrap();

        let elevations = client.query(&[(37.5, -121.5), (37.6, -121.5)]);
        assert_eq!(elevations, vec![Some(104.0), None]);

        let bodies = server.join().unwrap();
        assert!(bodies[0].contains("\"locations\""));
        assert!(bodies[0].contains("-121.5"));
        assert_eq!(client.stats().points_resolved, 1);
    }

    #[test]
    fn retries_server_errors() {
        let (url, server) = serve(vec![
            (503, "busy".to_string()),
            (200, r#"{"results":[{"elevation":55.0}]}"#.to_string()),
        ]);
        let client = RemoteElevationClient::new(fast(&url)).unwrap();

        assert_eq!(client.query(&[(37.5, -121.5)]), vec![Some(55.0)]);
        server.join().unwrap();

        let stats = client.stats();
        assert_eq!(stats.retries, 1);
        assert_eq!(stats.requests_sent, 1);
        assert_eq!(stats.requests_failed, 0);
    }

    #[test]
    fn client_errors_fail_fast() {
        let (url, server) = serve(vec![(404, "no such endpoint".to_string())]);
        let client = RemoteElevationClient::new(fast(&url)).unwrap();

        assert_eq!(client.query(&[(37.5, -121.5), (37.6, -121.5)]), vec![None, None]);
        server.join().unwrap();

        let stats = client.stats();
        assert_eq!(stats.retries, 0);
        assert_eq!(stats.requests_failed, 1);
        assert!(stats.last_error.unwrap().contains("404"));
    }

    #[test]
    fn splits_points_into_batches() {
        let (url, server) = serve(vec![
            (200, r#"{"results":[{"elevation":1.0},{"elevation":2.0}]}"#.to_string()),
            (200, r#"{"results":[{"elevation":3.0}]}"#.to_string()),
        ]);
        let client = RemoteElevationClient::new(fast(&url).batch_size(2)).unwrap();

        let elevations = client.lookup(&[(0.0, 0.0), (0.0, 0.1), (0.0, 0.2)]).unwrap();
        assert_eq!(elevations, vec![Some(1.0), Some(2.0), Some(3.0)]);
        assert_eq!(server.join().unwrap().len(), 2);
    }
}
