use crate::auth::{AuthError, AuthResult};

const DEFAULT_FRONTEND_URL: &str = "http://localhost:4321";

/// Authentication configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub access_token_ttl_secs: i64,
    pub refresh_token_ttl_secs: i64,
    pub frontend_url: String,
    pub google: Option<OAuthProviderConfig>,
    pub github: Option<OAuthProviderConfig>,
}

/// Client credentials for one OAuth2 provider.
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let jwt_secret = std::env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.is_empty())
            .ok_or_else(|| AuthError::Config("JWT_SECRET is required".into()))?;
        let access_token_ttl_secs = std::env::var("ACCESS_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(2 * 60 * 60);
        let refresh_token_ttl_secs = std::env::var("REFRESH_TOKEN_TTL_SECS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(7 * 24 * 60 * 60);
        let frontend_url = std::env::var("FRONTEND_URL")
            .ok()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_FRONTEND_URL.into());

        Ok(Self {
            jwt_secret,
            access_token_ttl_secs,
            refresh_token_ttl_secs,
            frontend_url,
            google: OAuthProviderConfig::from_env("GOOGLE"),
            github: OAuthProviderConfig::from_env("GITHUB"),
        })
    }

    /// Configuration with defaults and no OAuth providers, for tests and tools.
    pub fn with_secret(secret: impl Into<String>) -> Self {
        Self {
            jwt_secret: secret.into(),
            access_token_ttl_secs: 2 * 60 * 60,
            refresh_token_ttl_secs: 7 * 24 * 60 * 60,
            frontend_url: DEFAULT_FRONTEND_URL.into(),
            google: None,
            github: None,
        }
    }
}

impl OAuthProviderConfig {
    /// Reads `{PREFIX}_CLIENT_ID`, `{PREFIX}_CLIENT_SECRET` and
    /// `{PREFIX}_REDIRECT_URL`. A missing client id disables the provider.
    fn from_env(prefix: &str) -> Option<Self> {
        let client_id = std::env::var(format!("{prefix}_CLIENT_ID"))
            .ok()
            .filter(|id| !id.is_empty())?;
        let client_secret = std::env::var(format!("{prefix}_CLIENT_SECRET")).unwrap_or_default();
        let redirect_url = std::env::var(format!("{prefix}_REDIRECT_URL")).unwrap_or_default();

        if client_secret.is_empty() {
            log::warn!("{prefix}_CLIENT_SECRET is empty; token exchange will fail");
        }

        Some(Self {
            client_id,
            client_secret,
            redirect_url,
        })
    }
}
