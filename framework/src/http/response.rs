use crate::error::FrameworkError;
use bytes::Bytes;
use http_body_util::Full;

/// HTTP Response builder providing Laravel-like response creation
#[derive(Debug, Clone)]
pub struct HttpResponse {
    status: u16,
    body: String,
    headers: Vec<(String, String)>,
}

/// Response type alias - allows using `?` operator for early returns
pub type Response = Result<HttpResponse, HttpResponse>;

impl HttpResponse {
    pub fn new() -> Self {
        Self {
            status: 200,
            body: String::new(),
            headers: Vec::new(),
        }
    }

    /// Create a response with a string body
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
        }
    }

    /// Create a JSON response from a serde_json::Value
    pub fn json(body: serde_json::Value) -> Self {
        Self {
            status: 200,
            body: body.to_string(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
        }
    }

    /// Set the HTTP status code
    pub fn status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    /// Add a header to the response, replacing an existing header of the same name
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(n, _)| !n.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }

    /// The HTTP status code
    pub fn status_code(&self) -> u16 {
        self.status
    }

    /// The response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Look up a header (case-insensitive)
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Parse the body as JSON (mostly useful in tests)
    pub fn json_body(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }

    /// Wrap this response in Ok() for use as Response type
    pub fn ok(self) -> Response {
        Ok(self)
    }

    /// Convert to hyper response
    pub fn into_hyper(self) -> hyper::Response<Full<Bytes>> {
        let mut builder = hyper::Response::builder().status(self.status);

        for (name, value) in self.headers {
            builder = builder.header(name, value);
        }

        builder
            .body(Full::new(Bytes::from(self.body)))
            .unwrap_or_else(|e| {
                tracing::error!(error = %e, "invalid response parts, sending 500");
                let mut fallback = hyper::Response::new(Full::new(Bytes::from_static(
                    br#"{"error":"server_error","message":"Invalid response"}"#,
                )));
                *fallback.status_mut() = http::StatusCode::INTERNAL_SERVER_ERROR;
                fallback
            })
    }
}

impl Default for HttpResponse {
    fn default() -> Self {
        Self::new()
    }
}

/// Extension trait for Response to enable method chaining on both arms
pub trait ResponseExt {
    fn status(self, code: u16) -> Self;
    fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self;
    /// Collapse `Ok`/`Err` into the response that goes on the wire
    fn into_response(self) -> HttpResponse;
}

impl ResponseExt for Response {
    fn status(self, code: u16) -> Self {
        self.map(|r| r.status(code))
    }

    fn header(self, name: impl Into<String>, value: impl Into<String>) -> Self {
        match self {
            Ok(r) => Ok(r.header(name, value)),
            Err(r) => Err(r.header(name, value)),
        }
    }

    fn into_response(self) -> HttpResponse {
        self.unwrap_or_else(|e| e)
    }
}

/// Auto-convert FrameworkError to HttpResponse
///
/// Produces `{"error": <code>, "message": <text>}` with the error's status.
impl From<FrameworkError> for HttpResponse {
    fn from(err: FrameworkError) -> HttpResponse {
        let status = err.status_code();
        let message = match &err {
            // Internal details stay in the logs
            FrameworkError::ConfigLoad { .. }
            | FrameworkError::ConfigParse { .. }
            | FrameworkError::CapabilityNotFound { .. }
            | FrameworkError::MiddlewareNotFound { .. }
            | FrameworkError::Internal { .. } => {
                tracing::error!(error = %err, "request failed");
                "Server Error".to_string()
            }
            _ => err.to_string(),
        };
        HttpResponse::json(serde_json::json!({
            "error": err.code(),
            "message": message,
        }))
        .status(status)
    }
}

/// Auto-convert AppError to HttpResponse
impl From<crate::error::AppError> for HttpResponse {
    fn from(err: crate::error::AppError) -> HttpResponse {
        let framework_err: FrameworkError = err.into();
        framework_err.into()
    }
}
