use kit::middleware::builtin::{ApiVersion, Locale, Platform};
use kit::{HttpResponse, Request, Response};
use serde_json::json;

/// Liveness plus what the global pipeline negotiated for this client
pub async fn show(req: Request) -> Response {
    let version = req.get::<ApiVersion>().map(|v| v.0);
    let locale = req.get::<Locale>().map(|l| l.0.clone());
    let platform = req.get::<Platform>().copied().unwrap_or(Platform::Unknown);

    Ok(HttpResponse::json(json!({
        "status": "ok",
        "version": version,
        "locale": locale,
        "platform": platform.as_str(),
    })))
}
