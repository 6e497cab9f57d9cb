//! Authentication and authorization capabilities
//!
//! `Authenticator` turns a bearer token into a [`Principal`]; `Gate` decides
//! whether a principal may perform a set of permissions. The `auth` and
//! `authorize` route aliases resolve both from the container.

use crate::config::{AuthConfig, JwtConfig};
use crate::error::FrameworkError;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The authenticated caller, stored on the request by the `auth` alias
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub roles: BTreeSet<String>,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            roles: BTreeSet::new(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn with_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.roles.extend(roles.into_iter().map(Into::into));
        self
    }

    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.permissions.extend(permissions.into_iter().map(Into::into));
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// `*` grants every permission
    pub fn can(&self, permission: &str) -> bool {
        self.permissions.contains("*") || self.permissions.contains(permission)
    }
}

/// Validates credentials
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, token: &str) -> Result<Principal, FrameworkError>;
}

/// Decides authorization for an authenticated principal
pub trait Gate: Send + Sync {
    fn allows(&self, principal: &Principal, permissions: &[String]) -> bool;
}

/// Claims accepted in access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub exp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
}

/// HMAC-signed JWT validation from `auth.jwt`
pub struct JwtAuthenticator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtAuthenticator {
    pub fn new(config: &JwtConfig) -> Result<Self, FrameworkError> {
        let algorithm = match config.algorithm.to_ascii_uppercase().as_str() {
            "HS256" => Algorithm::HS256,
            "HS384" => Algorithm::HS384,
            "HS512" => Algorithm::HS512,
            other => {
                return Err(FrameworkError::config_parse(
                    "auth.jwt.algorithm",
                    format!("unsupported algorithm '{}'", other),
                ))
            }
        };
        if config.secret.is_empty() {
            tracing::warn!("auth.jwt.secret is empty, every token will be rejected");
        }

        let mut validation = Validation::new(algorithm);
        validation.leeway = config.leeway;
        if let Some(issuer) = config.issuer.as_deref().filter(|i| !i.is_empty()) {
            validation.set_issuer(&[issuer]);
        }

        Ok(Self {
            key: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
        })
    }
}

impl Authenticator for JwtAuthenticator {
    fn authenticate(&self, token: &str) -> Result<Principal, FrameworkError> {
        if token.is_empty() {
            return Err(FrameworkError::unauthenticated("Missing bearer token"));
        }
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, "rejected access token");
            FrameworkError::unauthenticated("Invalid or expired token")
        })?;

        let claims = data.claims;
        Ok(Principal::new(claims.sub)
            .with_roles(claims.roles)
            .with_permissions(claims.permissions))
    }
}

/// Allows super roles outright, otherwise requires every permission
#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    super_roles: BTreeSet<String>,
}

impl PermissionGate {
    pub fn new(super_roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            super_roles: super_roles.into_iter().collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.super_roles.iter().cloned())
    }
}

impl Gate for PermissionGate {
    fn allows(&self, principal: &Principal, permissions: &[String]) -> bool {
        if principal.roles.iter().any(|role| self.super_roles.contains(role)) {
            return true;
        }
        permissions.iter().all(|permission| principal.can(permission))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value
pub fn bearer_token(header: &str) -> Option<&str> {
    let (scheme, token) = header.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("bearer")
        .then(|| token.trim())
        .filter(|t| !t.is_empty())
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn valid_tokens_become_principals() {
        let auth = JwtAuthenticator::new(&jwt_config()).unwrap();
        let principal = auth
            .authenticate(&mint("user-7", &["member"], &["votes.cast"]))
            .unwrap();

        assert_eq!(principal.id, "user-7");
        assert!(principal.has_role("member"));
        assert!(principal.can("votes.cast"));
        assert!(!principal.can("votes.close"));
    }

    #[test]
    fn wrong_secret_and_expiry_are_rejected() {
        let auth = JwtAuthenticator::new(&jwt_config()).unwrap();

        let forged = mint_with("other", "user-7", &[], &[], 600);
        assert!(matches!(auth.authenticate(&forged), Err(FrameworkError::Unauthenticated { .. })));

        let expired = mint_with(SECRET, "user-7", &[], &[], -3600);
        assert_eq!(auth.authenticate(&expired).unwrap_err().status_code(), 401);
        assert!(auth.authenticate("").is_err());
    }

    #[test]
    fn issuer_is_checked_when_configured() {
        let config = JwtConfig {
            issuer: Some("accounts".into()),
            ..jwt_config()
        };
        let auth = JwtAuthenticator::new(&config).unwrap();
        assert!(auth.authenticate(&mint("user-7", &[], &[])).is_err());
    }

    #[test]
    fn asymmetric_algorithms_are_refused() {
        let config = JwtConfig {
            algorithm: "RS256".into(),
            ..jwt_config()
        };
        assert!(matches!(JwtAuthenticator::new(&config), Err(FrameworkError::ConfigParse { .. })));
    }

    #[test]
    fn gate_requires_every_permission_unless_super() {
        let gate = PermissionGate::new(vec!["admin".to_string()]);
        let required = vec!["votes.read".to_string(), "votes.close".to_string()];

        let reader = Principal::new("1").with_permissions(["votes.read"]);
        assert!(!gate.allows(&reader, &required));
        assert!(gate.allows(&reader, &required[..1]));

        let admin = Principal::new("2").with_roles(["admin"]);
        assert!(gate.allows(&admin, &required));

        let wildcard = Principal::new("3").with_permissions(["*"]);
        assert!(gate.allows(&wildcard, &required));
    }

    #[test]
    fn bearer_tokens_parse() {
        assert_eq!(bearer_token("Bearer abc.def"), Some("abc.def"));
        assert_eq!(bearer_token("bearer  abc "), Some("abc"));
        assert_eq!(bearer_token("Basic abc"), None);
        assert_eq!(bearer_token("Bearer "), None);
    }
}
