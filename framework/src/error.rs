//! Framework-wide error types
//!
//! Every fallible operation in the base module returns [`FrameworkError`].
//! Bootstrap errors (config, bindings, aliases) abort startup; request-time
//! errors convert into JSON responses.

use std::path::Path;
use thiserror::Error;

/// Simple wrapper for creating one-off domain errors
///
/// Use this for inline/ad-hoc errors in handlers when you don't want to
/// create a dedicated error type.
///
/// # Example
///
/// ```rust,ignore
/// use kit::{AppError, Response};
///
/// pub async fn show(req: Request) -> Response {
///     let id = req.param("id")?;
///     if id == "0" {
///         return Err(AppError::not_found("Ballot not found").into());
///     }
///     // ...
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AppError {
    message: String,
    status_code: u16,
}

impl AppError {
    /// Create a new AppError with status 500 (Internal Server Error)
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status_code: 500,
        }
    }

    /// Set the HTTP status code
    pub fn status(mut self, code: u16) -> Self {
        self.status_code = code;
        self
    }

    /// Create a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(message).status(404)
    }

    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(message).status(400)
    }

    /// Create a 409 Conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(message).status(409)
    }

    /// Create a 422 Unprocessable Entity error
    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::new(message).status(422)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

impl From<AppError> for FrameworkError {
    fn from(e: AppError) -> Self {
        FrameworkError::Domain {
            message: e.message,
            status_code: e.status_code,
        }
    }
}

/// Framework-wide error type
///
/// Implements `From<FrameworkError> for HttpResponse`, so handlers and
/// middleware can propagate it with `?` and still produce a JSON response.
#[derive(Debug, Clone, Error)]
pub enum FrameworkError {
    /// A configuration bundle could not be read
    #[error("Failed to load config bundle '{path}': {message}")]
    ConfigLoad {
        /// Path (or embedded origin) of the bundle
        path: String,
        /// Underlying I/O error
        message: String,
    },

    /// A configuration bundle or section has invalid content
    #[error("Failed to parse config '{origin}': {message}")]
    ConfigParse {
        /// Bundle path, embedded origin, or namespace being decoded
        origin: String,
        /// Parser error
        message: String,
    },

    /// No binding registered for the requested capability
    #[error("Capability '{type_name}' not bound in container")]
    CapabilityNotFound {
        /// The type name of the capability that was not found
        type_name: &'static str,
    },

    /// A route referenced a middleware alias that was never registered
    #[error("Middleware alias '{name}' is not registered")]
    MiddlewareNotFound {
        /// The alias as written on the route
        name: String,
    },

    /// A middleware unit rejected the request on purpose
    ///
    /// This is control flow, not a fault: it renders as
    /// `{"error": code, "message": message}` with `status`.
    #[error("{message}")]
    MiddlewareAbort {
        /// HTTP status for the rejection
        status: u16,
        /// Machine readable reason, e.g. `unsupported_version`
        code: &'static str,
        /// Human readable explanation
        message: String,
    },

    /// Missing or invalid credentials (401)
    #[error("{message}")]
    Unauthenticated {
        /// Why authentication failed
        message: String,
    },

    /// Authenticated but not allowed (403)
    #[error("This action is unauthorized.")]
    Unauthorized,

    /// A microservice message could not be delivered
    #[error("Dispatch to '{service}' failed: {message}")]
    Dispatch {
        /// Target service name
        service: String,
        /// Failure reason
        message: String,
    },

    /// Outgoing HTTP call failed at the transport level
    #[error("HTTP client error: {message}")]
    HttpClient {
        /// Failure reason
        message: String,
    },

    /// Parameter extraction failed (missing or invalid parameter)
    #[error("Missing required parameter: {param_name}")]
    ParamError {
        /// The name of the parameter that failed extraction
        param_name: String,
    },

    /// Parameter parse error (400 Bad Request)
    #[error("Invalid parameter '{param}': expected {expected_type}")]
    ParamParse {
        /// The parameter value that failed to parse
        param: String,
        /// The expected type (e.g., "i32")
        expected_type: &'static str,
    },

    /// Generic internal server error
    #[error("Internal server error: {message}")]
    Internal {
        /// The error message
        message: String,
    },

    /// Domain/application error with custom status code
    #[error("{message}")]
    Domain {
        /// The error message
        message: String,
        /// HTTP status code
        status_code: u16,
    },
}

impl FrameworkError {
    /// Create a ConfigLoad error for a bundle path
    pub fn config_load(path: &Path, message: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.display().to_string(),
            message: message.into(),
        }
    }

    /// Create a ConfigParse error
    pub fn config_parse(origin: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            origin: origin.into(),
            message: message.into(),
        }
    }

    /// Create a CapabilityNotFound error for a given type
    pub fn capability_not_found<T: ?Sized>() -> Self {
        Self::CapabilityNotFound {
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Create a MiddlewareNotFound error
    pub fn middleware_not_found(name: impl Into<String>) -> Self {
        Self::MiddlewareNotFound { name: name.into() }
    }

    /// Create a MiddlewareAbort error
    pub fn abort(status: u16, code: &'static str, message: impl Into<String>) -> Self {
        Self::MiddlewareAbort {
            status,
            code,
            message: message.into(),
        }
    }

    /// Create an Unauthenticated error
    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Unauthenticated {
            message: message.into(),
        }
    }

    /// Create a Dispatch error
    pub fn dispatch(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Dispatch {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Create an HttpClient error
    pub fn http_client(message: impl Into<String>) -> Self {
        Self::HttpClient {
            message: message.into(),
        }
    }

    /// Create a ParamError for a missing parameter
    pub fn param(name: impl Into<String>) -> Self {
        Self::ParamError {
            param_name: name.into(),
        }
    }

    /// Create a ParamParse error (400)
    pub fn param_parse(param: impl Into<String>, expected_type: &'static str) -> Self {
        Self::ParamParse {
            param: param.into(),
            expected_type,
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Create a Domain error with custom status code
    pub fn domain(message: impl Into<String>, status_code: u16) -> Self {
        Self::Domain {
            message: message.into(),
            status_code,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::ConfigLoad { .. } => 500,
            Self::ConfigParse { .. } => 500,
            Self::CapabilityNotFound { .. } => 500,
            Self::MiddlewareNotFound { .. } => 500,
            Self::MiddlewareAbort { status, .. } => *status,
            Self::Unauthenticated { .. } => 401,
            Self::Unauthorized => 403,
            Self::Dispatch { .. } => 502,
            Self::HttpClient { .. } => 502,
            Self::ParamError { .. } => 400,
            Self::ParamParse { .. } => 400,
            Self::Internal { .. } => 500,
            Self::Domain { status_code, .. } => *status_code,
        }
    }

    /// Machine readable error code used in JSON error bodies
    pub fn code(&self) -> &'static str {
        match self {
            Self::MiddlewareAbort { code, .. } => code,
            Self::Unauthenticated { .. } => "unauthenticated",
            Self::Unauthorized => "forbidden",
            Self::Dispatch { .. } | Self::HttpClient { .. } => "bad_gateway",
            Self::ParamError { .. } | Self::ParamParse { .. } => "bad_request",
            Self::Domain { .. } => "domain_error",
            _ => "server_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abort_carries_its_own_status_and_code() {
        let err = FrameworkError::abort(400, "unsupported_version", "API version 999 is not supported");
        assert_eq!(err.status_code(), 400);
        assert_eq!(err.code(), "unsupported_version");
        assert_eq!(err.to_string(), "API version 999 is not supported");
    }

    #[test]
    fn capability_not_found_names_the_type() {
        let err = FrameworkError::capability_not_found::<dyn std::fmt::Debug>();
        assert!(err.to_string().contains("Debug"));
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn app_error_converts_to_domain() {
        let err: FrameworkError = AppError::conflict("Vote already cast").into();
        assert_eq!(err.status_code(), 409);
        assert_eq!(err.code(), "domain_error");
    }
}
