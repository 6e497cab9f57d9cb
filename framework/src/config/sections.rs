//! Typed views over the config namespaces merged by the base provider
//!
//! Each struct documents the keys its namespace is guaranteed to contain.
//! Read them with `ctx.config().section::<AuthConfig>("auth")`.

use crate::container::Options;
use crate::error::FrameworkError;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;

/// `time` namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeConfig {
    /// `UTC` or a fixed offset such as `+07:00`
    pub timezone: String,
    /// strftime format for timestamps sent to clients
    pub format: String,
}

impl Default for TimeConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            format: "%Y-%m-%dT%H:%M:%S%:z".to_string(),
        }
    }
}

impl TimeConfig {
    pub fn offset(&self) -> Result<FixedOffset, FrameworkError> {
        parse_offset(&self.timezone)
            .ok_or_else(|| FrameworkError::config_parse("time.timezone", format!("unsupported timezone '{}'", self.timezone)))
    }

    /// Format `at` in the configured timezone and format
    ///
    /// Falls back to RFC 3339 when the format string is invalid.
    pub fn format(&self, at: DateTime<Utc>) -> String {
        use std::fmt::Write;

        let offset = self.offset().unwrap_or_else(|_| Utc.fix());
        let local = at.with_timezone(&offset);
        let mut out = String::new();
        if write!(out, "{}", local.format(&self.format)).is_err() {
            return local.to_rfc3339();
        }
        out
    }
}

fn parse_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("utc") || raw == "Z" {
        return FixedOffset::east_opt(0);
    }
    let (sign, rest) = match raw.as_bytes().first()? {
        b'+' => (1, &raw[1..]),
        b'-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let seconds = hours
        .parse::<i32>()
        .ok()?
        .checked_mul(3600)?
        .checked_add(minutes.parse::<i32>().ok()?.checked_mul(60)?)?;
    FixedOffset::east_opt(sign * seconds)
}

/// Which dispatcher implementation backs `dyn MicroserviceDispatcher`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatcherKind {
    Direct,
    Scheduled,
}

/// `microservices.queue`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Delivery attempts before a message is dropped
    pub max_attempts: u32,
    /// Worker drain interval in milliseconds
    pub interval: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: 1000,
        }
    }
}

/// One entry of `microservices.services`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub base_uri: String,
    #[serde(default)]
    pub timeout: Option<f64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// `microservices` namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MicroservicesConfig {
    pub dispatcher: DispatcherKind,
    /// Request timeout in seconds
    pub timeout: f64,
    /// Connect timeout in seconds
    pub connect_timeout: f64,
    /// Headers sent to every service
    pub headers: BTreeMap<String, String>,
    pub queue: QueueConfig,
    pub services: BTreeMap<String, ServiceEndpoint>,
}

impl Default for MicroservicesConfig {
    fn default() -> Self {
        Self {
            dispatcher: DispatcherKind::Scheduled,
            timeout: 10.0,
            connect_timeout: 3.0,
            headers: BTreeMap::new(),
            queue: QueueConfig::default(),
            services: BTreeMap::new(),
        }
    }
}

impl MicroservicesConfig {
    /// HTTP client options for one service, combining shared and per-service settings
    pub fn client_options(&self, service: &str) -> Option<Options> {
        let endpoint = self.services.get(service)?;
        let mut headers = self.headers.clone();
        headers.extend(endpoint.headers.clone());

        let mut options = Options::new();
        options.insert("base_uri".into(), json!(endpoint.base_uri));
        options.insert("timeout".into(), json!(endpoint.timeout.unwrap_or(self.timeout)));
        options.insert("connect_timeout".into(), json!(self.connect_timeout));
        options.insert("headers".into(), json!(headers));
        Some(options)
    }
}

/// `auth.jwt`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    /// HS256, HS384 or HS512
    pub algorithm: String,
    /// Clock skew tolerance in seconds
    pub leeway: u64,
    pub issuer: Option<String>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            algorithm: "HS256".to_string(),
            leeway: 60,
            issuer: None,
        }
    }
}

/// `auth` namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Header carrying the bearer token
    pub header: String,
    pub jwt: JwtConfig,
    /// Roles that pass every authorization check
    pub super_roles: Vec<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header: "authorization".to_string(),
            jwt: JwtConfig::default(),
            super_roles: vec!["admin".to_string()],
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

/// `logging` namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    pub format: LogFormat,
    /// Include the event target (module path)
    pub target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            target: false,
        }
    }
}

/// One entry of `filesystems.disks`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskConfig {
    /// `local`, `s3`, ...
    pub driver: String,
    #[serde(default)]
    pub root: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub bucket: Option<String>,
}

/// `filesystems` namespace
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesystemsConfig {
    pub default: String,
    pub disks: BTreeMap<String, DiskConfig>,
}

impl Default for FilesystemsConfig {
    fn default() -> Self {
        let mut disks = BTreeMap::new();
        disks.insert(
            "local".to_string(),
            DiskConfig {
                driver: "local".to_string(),
                root: Some("storage/app".to_string()),
                url: None,
                bucket: None,
            },
        );
        Self {
            default: "local".to_string(),
            disks,
        }
    }
}

impl FilesystemsConfig {
    pub fn disk(&self, name: &str) -> Option<&DiskConfig> {
        self.disks.get(name)
    }

    pub fn default_disk(&self) -> Result<&DiskConfig, FrameworkError> {
        self.disk(&self.default).ok_or_else(|| {
            FrameworkError::config_parse("filesystems.default", format!("disk '{}' is not configured", self.default))
        })
    }
}

/// One entry of `external.services`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalService {
    pub base_uri: String,
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub timeout: Option<f64>,
}

/// `external` namespace: third-party APIs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalConfig {
    pub services: BTreeMap<String, ExternalService>,
}

impl ExternalConfig {
    /// HTTP client options for a third-party API; the key goes out as a bearer token
    pub fn client_options(&self, name: &str) -> Option<Options> {
        let service = self.services.get(name)?;
        let mut options = Options::new();
        options.insert("base_uri".into(), json!(service.base_uri));
        if let Some(timeout) = service.timeout {
            options.insert("timeout".into(), json!(timeout));
        }
        if let Some(key) = service.key.as_deref().filter(|k| !k.is_empty()) {
            options.insert("headers".into(), json!({ "authorization": format!("Bearer {}", key) }));
        }
        Some(options)
    }
}

/// `vote` namespace: the betting feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoteConfig {
    pub enabled: bool,
    pub min_stake: u64,
    pub max_stake: u64,
    pub currency: String,
    /// Seconds before a ballot closes after which no stake is accepted
    pub close_before: i64,
}

impl Default for VoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_stake: 1,
            max_stake: 1000,
            currency: "POINT".to_string(),
            close_before: 300,
        }
    }
}

impl VoteConfig {
    pub fn accepts_stake(&self, amount: u64) -> bool {
        self.enabled && (self.min_stake..=self.max_stake).contains(&amount)
    }

    /// Whether a ballot closing at `closes_at` still takes stakes at `now`
    pub fn is_open(&self, closes_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        self.enabled && now + chrono::Duration::seconds(self.close_before) < closes_at
    }
}

/// `api.maintenance`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaintenanceConfig {
    pub enabled: bool,
    /// Seconds sent in `Retry-After`
    pub retry_after: u64,
    /// Paths that stay reachable during maintenance
    pub except: Vec<String>,
}

impl Default for MaintenanceConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            retry_after: 60,
            except: vec!["/health".to_string()],
        }
    }
}

/// `api.trim`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrimConfig {
    /// Body keys whose string values are left untouched
    pub except: Vec<String>,
}

impl Default for TrimConfig {
    fn default() -> Self {
        Self {
            except: vec!["password".to_string(), "password_confirmation".to_string()],
        }
    }
}

/// `api` namespace: request hygiene settings for the global middleware
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub versions: Vec<u32>,
    pub default_version: u32,
    pub version_header: String,
    pub languages: Vec<String>,
    pub default_language: String,
    pub platforms: Vec<String>,
    /// Media types clients may ask for in `Accept`
    pub accept: Vec<String>,
    pub maintenance: MaintenanceConfig,
    pub trim: TrimConfig,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            versions: vec![1],
            default_version: 1,
            version_header: "version".to_string(),
            languages: vec!["en".to_string()],
            default_language: "en".to_string(),
            platforms: vec!["ios".to_string(), "android".to_string(), "web".to_string()],
            accept: vec!["application/json".to_string()],
            maintenance: MaintenanceConfig::default(),
            trim: TrimConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    #[test]
    fn time_formats_in_the_configured_offset() {
        let config = TimeConfig {
            timezone: "+07:00".into(),
            format: "%Y-%m-%d %H:%M".into(),
        };
        let at = Utc.with_ymd_and_hms(2026, 1, 31, 20, 30, 0).unwrap();
        assert_eq!(config.format(at), "2026-02-01 03:30");
    }

    #[test]
    fn bad_time_settings_degrade_gracefully() {
        let config = TimeConfig {
            timezone: "Mars/Olympus".into(),
            format: "%Q nonsense".into(),
        };
        assert!(config.offset().is_err());
        let at = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(config.format(at), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn absurd_offsets_are_rejected() {
        for timezone in ["+999999", "-2147483647:00", "+00:99999999", "+25:00"] {
            let config = TimeConfig {
                timezone: timezone.into(),
                ..TimeConfig::default()
            };
            assert!(config.offset().is_err(), "{}", timezone);
        }
        assert_eq!(parse_offset("-05:30").map(|o| o.local_minus_utc()), Some(-19800));
    }

    #[test]
    fn service_options_merge_shared_headers() {
        let mut config = MicroservicesConfig::default();
        config.headers.insert("x-caller".into(), "base".into());
        config.services.insert(
            "ledger".into(),
            ServiceEndpoint {
                base_uri: "http://ledger:8000/".into(),
                timeout: Some(2.5),
                headers: BTreeMap::from([("x-caller".to_string(), "vote".to_string())]),
            },
        );

        let options = config.client_options("ledger").unwrap();
        assert_eq!(options["base_uri"], "http://ledger:8000/");
        assert_eq!(options["timeout"], 2.5);
        assert_eq!(options["headers"]["x-caller"], "vote");
        assert!(config.client_options("missing").is_none());
    }

    #[test]
    fn vote_limits() {
        let config = VoteConfig {
            enabled: true,
            ..VoteConfig::default()
        };
        assert!(config.accepts_stake(1));
        assert!(!config.accepts_stake(1001));

        let closes = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        assert!(config.is_open(closes, closes - chrono::Duration::minutes(10)));
        assert!(!config.is_open(closes, closes - chrono::Duration::minutes(2)));
        assert!(!VoteConfig::default().accepts_stake(5));
    }

    #[test]
    fn external_key_becomes_bearer_header() {
        let config: ExternalConfig = serde_json::from_value(json!({
            "services": { "odds": { "base_uri": "https://odds.example", "key": "k" } }
        }))
        .unwrap();
        let options = config.client_options("odds").unwrap();
        assert_eq!(options["headers"]["authorization"], "Bearer k");
    }
}
