use std::path::{Path, PathBuf};

/// Deployment environment, from `APP_ENV`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Local,
    Development,
    Staging,
    Production,
    Testing,
    Custom(String),
}

impl Environment {
    /// Detect environment from APP_ENV or default to Local
    pub fn detect() -> Self {
        std::env::var("APP_ENV")
            .map(|name| Self::from_name(&name))
            .unwrap_or(Self::Local)
    }

    /// Parse an environment name; unknown names become `Custom`
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "production" | "prod" => Self::Production,
            "staging" => Self::Staging,
            "development" | "dev" => Self::Development,
            "testing" | "test" => Self::Testing,
            "local" | "" => Self::Local,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The `.env.{suffix}` file name for this environment
    pub fn env_file_suffix(&self) -> &str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
            Self::Staging => "staging",
            Self::Development => "development",
            Self::Testing => "testing",
            Self::Custom(name) => name.as_str(),
        }
    }

    /// Check if this is a production environment
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if this is a development environment (local or development)
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Local | Self::Development)
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.env_file_suffix())
    }
}

/// `.env` files to try, most specific first
fn dotenv_candidates(project_root: &Path, env: &Environment) -> Vec<PathBuf> {
    let suffix = env.env_file_suffix();
    vec![
        project_root.join(format!(".env.{}.local", suffix)),
        project_root.join(format!(".env.{}", suffix)),
        project_root.join(".env.local"),
        project_root.join(".env"),
    ]
}

/// Load environment variables from .env files with proper precedence
///
/// Precedence (earlier wins):
/// 1. Actual process environment variables
/// 2. .env.{environment}.local
/// 3. .env.{environment}
/// 4. .env.local
/// 5. .env
///
/// dotenvy never overwrites a variable that is already set, so files are
/// loaded most specific first.
pub fn load_dotenv(project_root: &Path) -> Environment {
    let env = Environment::detect();

    for path in dotenv_candidates(project_root, &env) {
        if dotenvy::from_path(&path).is_ok() {
            tracing::debug!(path = %path.display(), "loaded env file");
        }
    }

    // APP_ENV may itself come from .env
    Environment::detect()
}

/// Get an environment variable with a default value
///
/// # Example
/// ```
/// use kit::config::env;
///
/// let port: u16 = env("SERVER_PORT", 8080);
/// let host = env("SERVER_HOST", "127.0.0.1".to_string());
/// ```
pub fn env<T: std::str::FromStr>(key: &str, default: T) -> T {
    env_optional(key).unwrap_or(default)
}

/// Get an optional environment variable
///
/// # Example
/// ```
/// use kit::config::env_optional;
///
/// let debug: Option<bool> = env_optional("APP_DEBUG");
/// ```
pub fn env_optional<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
