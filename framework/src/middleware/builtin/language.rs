use crate::config::ApiConfig;
use crate::http::{Request, Response};
use crate::middleware::{Middleware, Next};
use async_trait::async_trait;

/// Negotiated response language, stored on the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale(pub String);

impl Locale {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Picks the request language
///
/// The `language` header wins, then `Accept-Language` by weight. Only
/// languages in `api.languages` are accepted; anything else falls back to
/// `api.default_language`.
pub struct LanguageCode {
    supported: Vec<String>,
    default: String,
}

impl LanguageCode {
    pub fn new(config: &ApiConfig) -> Self {
        Self {
            supported: config.languages.iter().map(|l| l.to_ascii_lowercase()).collect(),
            default: config.default_language.clone(),
        }
    }

    /// The language this request will be answered in
    pub fn negotiate(&self, request: &Request) -> Locale {
        let explicit = request.header("language").map(primary_tag);
        let preferred = request.header("accept-language").map(weighted_tags).unwrap_or_default();

        explicit
            .into_iter()
            .chain(preferred)
            .find(|tag| self.supported.iter().any(|s| s == tag))
            .map(Locale)
            .unwrap_or_else(|| Locale(self.default.clone()))
    }
}

/// `en-US` -> `en`
fn primary_tag(tag: &str) -> String {
    tag.trim()
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// Primary tags from an `Accept-Language` value, highest weight first
fn weighted_tags(header: &str) -> Vec<String> {
    let mut tags: Vec<(String, f32)> = header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let tag = primary_tag(pieces.next()?);
            if tag.is_empty() || tag == "*" {
                return None;
            }
            let weight = pieces
                .find_map(|p| p.trim().strip_prefix("q="))
                .and_then(|q| q.parse().ok())
                .unwrap_or(1.0);
            Some((tag, weight))
        })
        .collect();
    tags.sort_by(|a, b| b.1.total_cmp(&a.1));
    tags.into_iter().map(|(tag, _)| tag).collect()
}

#[async_trait]
impl Middleware for LanguageCode {
    async fn handle(&self, mut request: Request, next: Next) -> Response {
        let locale = self.negotiate(&request);
        request.extensions_mut().insert(locale);
        next.run(request).await
    }

    fn name(&self) -> &'static str {
        "LanguageCode"
    }
}
