//! Outgoing HTTP client capability
//!
//! Resolved transiently from the container with an options map:
//!
//! ```rust,ignore
//! let options = config.client_options("ledger").unwrap_or_default();
//! let client = ctx.container().resolve::<dyn HttpClient>(&options)?;
//! let response = client.send(OutgoingRequest::get("/balances/7")).await?;
//! ```

use crate::container::Options;
use crate::error::FrameworkError;
use async_trait::async_trait;
use bytes::Bytes;
use http::Method;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Construction options recognised by [`ReqwestClient`]
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientOptions {
    /// Prefix for relative request paths
    pub base_uri: Option<String>,
    /// Total request timeout in seconds
    pub timeout: Option<f64>,
    /// Connect timeout in seconds
    pub connect_timeout: Option<f64>,
    /// Headers sent with every request
    pub headers: BTreeMap<String, String>,
}

impl ClientOptions {
    pub fn from_options(options: &Options) -> Result<Self, FrameworkError> {
        serde_json::from_value(Value::Object(options.clone()))
            .map_err(|e| FrameworkError::config_parse("http client options", e.to_string()))
    }
}

/// A request to another service
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    /// Absolute URL, or a path resolved against `base_uri`
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: BTreeMap<String, String>,
    pub json: Option<Value>,
}

impl OutgoingRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: BTreeMap::new(),
            json: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).json(body)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, body: Value) -> Self {
        self.json = Some(body);
        self
    }
}

/// A response from another service
#[derive(Debug, Clone)]
pub struct OutgoingResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl OutgoingResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FrameworkError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| FrameworkError::http_client(format!("invalid JSON response: {}", e)))
    }
}

/// Sends HTTP requests to other services
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> Result<OutgoingResponse, FrameworkError>;

    /// Base URI relative paths resolve against
    fn base_uri(&self) -> Option<&str> {
        None
    }
}

/// Join a request path onto an optional base URI
pub fn resolve_url(base_uri: Option<&str>, path: &str) -> Result<String, FrameworkError> {
    if path.starts_with("http://") || path.starts_with("https://") {
        return Ok(path.to_string());
    }
    match base_uri {
        Some(base) => Ok(format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )),
        None => Err(FrameworkError::http_client(format!(
            "relative path '{}' without a base_uri",
            path
        ))),
    }
}

/// `reqwest`-backed [`HttpClient`]
pub struct ReqwestClient {
    client: reqwest::Client,
    base_uri: Option<String>,
}

impl ReqwestClient {
    pub fn new(options: ClientOptions) -> Result<Self, FrameworkError> {
        let mut builder = reqwest::Client::builder().default_headers(header_map(&options.headers)?);
        if let Some(timeout) = options.timeout.filter(|t| *t > 0.0) {
            builder = builder.timeout(Duration::from_secs_f64(timeout));
        }
        if let Some(timeout) = options.connect_timeout.filter(|t| *t > 0.0) {
            builder = builder.connect_timeout(Duration::from_secs_f64(timeout));
        }
        let client = builder
            .build()
            .map_err(|e| FrameworkError::http_client(e.to_string()))?;

        Ok(Self {
            client,
            base_uri: options.base_uri,
        })
    }

    /// Container factory: build from an options map
    pub fn from_options(options: &Options) -> Result<Self, FrameworkError> {
        Self::new(ClientOptions::from_options(options)?)
    }
}

fn header_map(headers: &BTreeMap<String, String>) -> Result<HeaderMap, FrameworkError> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FrameworkError::http_client(format!("invalid header name '{}'", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| FrameworkError::http_client(format!("invalid value for header '{}'", name)))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn send(&self, request: OutgoingRequest) -> Result<OutgoingResponse, FrameworkError> {
        let url = resolve_url(self.base_uri.as_deref(), &request.path)?;
        tracing::debug!(method = %request.method, url = %url, "outgoing request");

        let mut builder = self
            .client
            .request(request.method, &url)
            .headers(header_map(&request.headers)?);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            tracing::warn!(url = %url, error = %e, "outgoing request failed");
            FrameworkError::http_client(e.to_string())
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| FrameworkError::http_client(e.to_string()))?;

        Ok(OutgoingResponse { status, headers, body })
    }

    fn base_uri(&self) -> Option<&str> {
        self.base_uri.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn paths_resolve_against_base() {
        assert_eq!(
            resolve_url(Some("http://ledger:8000/api/"), "/balances/7").unwrap(),
            "http://ledger:8000/api/balances/7"
        );
        assert_eq!(
            resolve_url(Some("http://ledger"), "https://odds.example/v1").unwrap(),
            "https://odds.example/v1"
        );
        assert!(resolve_url(None, "/balances").is_err());
    }

    #[test]
    fn options_map_to_client_options() {
        let options = json!({
            "base_uri": "http://ledger:8000",
            "timeout": 2.5,
            "headers": { "x-caller": "vote" },
            "unrelated": true
        });
        let Value::Object(options) = options else { unreachable!() };

        let parsed = ClientOptions::from_options(&options).unwrap();
        assert_eq!(parsed.base_uri.as_deref(), Some("http://ledger:8000"));
        assert_eq!(parsed.timeout, Some(2.5));
        assert_eq!(parsed.connect_timeout, None);
        assert_eq!(parsed.headers["x-caller"], "vote");

        let client = ReqwestClient::new(parsed).unwrap();
        assert_eq!(client.base_uri(), Some("http://ledger:8000"));
    }

    #[test]
    fn bad_options_are_rejected() {
        let Value::Object(options) = json!({ "timeout": "soon" }) else { unreachable!() };
        assert!(matches!(
            ReqwestClient::from_options(&options),
            Err(FrameworkError::ConfigParse { .. })
        ));

        let headers = ClientOptions {
            headers: BTreeMap::from([("bad header".to_string(), "x".to_string())]),
            ..ClientOptions::default()
        };
        assert!(ReqwestClient::new(headers).is_err());
    }

    #[tokio::test]
    async fn transport_failures_are_http_client_errors() {
        let client = ReqwestClient::new(ClientOptions {
            base_uri: Some("http://127.0.0.1:1".into()),
            connect_timeout: Some(1.0),
            ..ClientOptions::default()
        })
        .unwrap();

        let err = client.send(OutgoingRequest::get("/ping")).await.unwrap_err();
        assert!(matches!(err, FrameworkError::HttpClient { .. }));
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn responses_decode_json() {
        let response = OutgoingResponse {
            status: 201,
            headers: BTreeMap::new(),
            body: Bytes::from_static(br#"{"id": 9}"#),
        };
        assert!(response.is_success());
        assert_eq!(response.json::<Value>().unwrap()["id"], 9);
        assert!(response.json::<Vec<u8>>().is_err());
    }
}
