//! Middleware installed by the base service provider
//!
//! Global pipeline, in execution order:
//! `BeforeResponse`, `Unacceptable`, `Unsupported`, `ClientPlatform`,
//! `LanguageCode`, `ConvertEmptyStringsToNull`, `CheckForMaintenanceMode`,
//! `TrimStrings`.
//!
//! Route aliases: `versioning` ([`Versioning`]), `auth` ([`Authenticate`]),
//! `authorize` ([`Authorize`]).

mod authenticate;
mod authorize;
mod before_response;
mod convert_empty_strings;
mod language;
mod maintenance;
mod platform;
mod trim_strings;
mod unacceptable;
mod unsupported;
mod versioning;

pub use authenticate::Authenticate;
pub use authorize::Authorize;
pub use before_response::BeforeResponse;
pub use convert_empty_strings::ConvertEmptyStringsToNull;
pub use language::{LanguageCode, Locale};
pub use maintenance::CheckForMaintenanceMode;
pub use platform::{ClientPlatform, Platform};
pub use trim_strings::TrimStrings;
pub use unacceptable::Unacceptable;
pub use unsupported::{ApiVersion, Unsupported};
pub use versioning::Versioning;

use crate::http::Request;
use serde_json::Value;

/// Apply `rewrite` to a JSON request body in place
///
/// Non-JSON and malformed bodies are left for the handler to reject.
pub(crate) fn rewrite_json_body(request: &mut Request, rewrite: impl FnOnce(&mut Value)) {
    if !request.is_json() || request.body().is_empty() {
        return;
    }
    let Ok(mut value) = serde_json::from_slice::<Value>(request.body()) else {
        return;
    };
    rewrite(&mut value);
    match serde_json::to_vec(&value) {
        Ok(body) => request.set_body(body),
        Err(e) => tracing::warn!(error = %e, "could not re-encode request body"),
    }
}
