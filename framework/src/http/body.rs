//! Body parsing utilities for HTTP requests
//!
//! Provides async body collection (with a size cap) and parsing for JSON and
//! form-urlencoded data.

use crate::error::FrameworkError;
use bytes::Bytes;
use http_body_util::{BodyExt, Limited};
use hyper::body::Incoming;
use serde::de::DeserializeOwned;

/// Collect the full body from an Incoming stream, rejecting bodies over `limit` bytes
pub async fn collect_body(body: Incoming, limit: usize) -> Result<Bytes, FrameworkError> {
    Limited::new(body, limit)
        .collect()
        .await
        .map(|collected| collected.to_bytes())
        .map_err(|e| {
            FrameworkError::abort(413, "payload_too_large", format!("Failed to read request body: {}", e))
        })
}

/// Parse bytes as JSON into the target type
pub fn parse_json<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, FrameworkError> {
    serde_json::from_slice(bytes).map_err(|e| {
        FrameworkError::abort(400, "invalid_json", format!("Failed to parse JSON body: {}", e))
    })
}

/// Parse bytes as form-urlencoded into the target type
pub fn parse_form<T: DeserializeOwned>(bytes: &Bytes) -> Result<T, FrameworkError> {
    serde_urlencoded::from_bytes(bytes).map_err(|e| {
        FrameworkError::abort(400, "invalid_form", format!("Failed to parse form body: {}", e))
    })
}
