use super::body::{parse_form, parse_json};
use crate::error::FrameworkError;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::SocketAddr;

/// HTTP Request wrapper providing Laravel-like access to request data
///
/// The body is collected before the pipeline runs, so middleware can inspect
/// and rewrite it (see `TrimStrings`, `ConvertEmptyStringsToNull`).
pub struct Request {
    inner: http::Request<Bytes>,
    params: HashMap<String, String>,
    remote_addr: Option<SocketAddr>,
}

impl Request {
    pub fn new(inner: http::Request<Bytes>) -> Self {
        Self {
            inner,
            params: HashMap::new(),
            remote_addr: None,
        }
    }

    pub fn with_params(mut self, params: HashMap<String, String>) -> Self {
        self.params = params;
        self
    }

    pub fn with_remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    /// Get the request method
    pub fn method(&self) -> &http::Method {
        self.inner.method()
    }

    /// Get the request path
    pub fn path(&self) -> &str {
        self.inner.uri().path()
    }

    /// Get the raw query string, if any
    pub fn query(&self) -> Option<&str> {
        self.inner.uri().query()
    }

    /// Address of the connected peer (set by the server)
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote_addr
    }

    /// Get a route parameter by name (e.g., /ballots/{id})
    pub fn param(&self, name: &str) -> Result<&str, FrameworkError> {
        self.params
            .get(name)
            .map(|s| s.as_str())
            .ok_or_else(|| FrameworkError::param(name))
    }

    /// Get a route parameter parsed into `T`
    pub fn param_as<T: std::str::FromStr>(&self, name: &str) -> Result<T, FrameworkError> {
        let raw = self.param(name)?;
        raw.parse()
            .map_err(|_| FrameworkError::param_parse(raw, std::any::type_name::<T>()))
    }

    /// Get all route parameters
    pub fn params(&self) -> &HashMap<String, String> {
        &self.params
    }

    /// Get a header value by name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.inner.headers().get(name).and_then(|v| v.to_str().ok())
    }

    pub fn headers(&self) -> &http::HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut http::HeaderMap {
        self.inner.headers_mut()
    }

    /// Get the Content-Type header
    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// Whether the body is declared as JSON
    pub fn is_json(&self) -> bool {
        self.content_type()
            .map(|ct| ct.starts_with("application/json") || ct.contains("+json"))
            .unwrap_or(false)
    }

    /// Raw body bytes
    pub fn body(&self) -> &Bytes {
        self.inner.body()
    }

    /// Replace the body (used by body-rewriting middleware)
    pub fn set_body(&mut self, body: impl Into<Bytes>) {
        *self.inner.body_mut() = body.into();
    }

    /// Typed per-request values set by middleware (ApiVersion, Locale, Principal, ...)
    pub fn extensions(&self) -> &http::Extensions {
        self.inner.extensions()
    }

    pub fn extensions_mut(&mut self) -> &mut http::Extensions {
        self.inner.extensions_mut()
    }

    /// Shortcut for `extensions().get::<T>()`
    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.inner.extensions().get::<T>()
    }

    /// Parse the request body as JSON
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// #[derive(Deserialize)]
    /// struct CastVote { ballot: u64, choice: String }
    ///
    /// pub async fn store(req: Request) -> Response {
    ///     let data: CastVote = req.json()?;
    ///     // ...
    /// }
    /// ```
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, FrameworkError> {
        parse_json(self.inner.body())
    }

    /// Parse the request body as form-urlencoded
    pub fn form<T: DeserializeOwned>(&self) -> Result<T, FrameworkError> {
        parse_form(self.inner.body())
    }

    /// Parse the request body based on Content-Type header
    ///
    /// - `application/x-www-form-urlencoded` -> Form parsing
    /// - Otherwise -> JSON parsing (default)
    pub fn input<T: DeserializeOwned>(&self) -> Result<T, FrameworkError> {
        match self.content_type() {
            Some(ct) if ct.starts_with("application/x-www-form-urlencoded") => self.form(),
            _ => self.json(),
        }
    }
}

impl From<http::Request<Bytes>> for Request {
    fn from(inner: http::Request<Bytes>) -> Self {
        Self::new(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn request(body: &'static str, content_type: &str) -> Request {
        http::Request::builder()
            .method("POST")
            .uri("/ballots/7?draft=1")
            .header("content-type", content_type)
            .body(Bytes::from_static(body.as_bytes()))
            .unwrap()
            .into()
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Vote {
        choice: String,
    }

    #[test]
    fn input_follows_content_type() {
        let json = request(r#"{"choice":"yes"}"#, "application/json");
        assert!(json.is_json());
        assert_eq!(json.input::<Vote>().unwrap(), Vote { choice: "yes".into() });

        let form = request("choice=no", "application/x-www-form-urlencoded");
        assert_eq!(form.input::<Vote>().unwrap(), Vote { choice: "no".into() });
    }

    #[test]
    fn params_are_typed_on_demand() {
        let mut params = HashMap::new();
        params.insert("id".to_string(), "7".to_string());
        let req = request("", "application/json").with_params(params);

        assert_eq!(req.param_as::<u64>("id").unwrap(), 7);
        assert_eq!(req.path(), "/ballots/7");
        assert_eq!(req.query(), Some("draft=1"));
        assert!(matches!(req.param("missing"), Err(FrameworkError::ParamError { .. })));
    }

    #[test]
    fn invalid_json_is_a_client_error() {
        let req = request("{not json", "application/json");
        let err = req.json::<Vote>().unwrap_err();
        assert_eq!(err.status_code(), 400);
    }
}
