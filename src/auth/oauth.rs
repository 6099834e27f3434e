//! OAuth2 authorization-code login against Google and GitHub.
//!
//! The `state` parameter is the fixed literal [`OAUTH_STATE`] and is not
//! checked on callback. Completion hands tokens to the frontend as query
//! parameters on a redirect.

use reqwest::{Client, Url};
use serde::Deserialize;

use crate::auth::accounts::Account;
use crate::auth::config::{AuthConfig, OAuthProviderConfig};
use crate::auth::jwt::TokenPair;
use crate::auth::responses::Provider;
use crate::auth::{AuthError, AuthResult};

pub const OAUTH_STATE: &str = "state";

struct ProviderEndpoints {
    authorize_url: &'static str,
    token_url: &'static str,
    profile_url: &'static str,
    scopes: &'static [&'static str],
}

const GOOGLE_ENDPOINTS: ProviderEndpoints = ProviderEndpoints {
    authorize_url: "https://accounts.google.com/o/oauth2/auth",
    token_url: "https://oauth2.googleapis.com/token",
    profile_url: "https://www.googleapis.com/oauth2/v2/userinfo",
    scopes: &[
        "https://www.googleapis.com/auth/userinfo.email",
        "https://www.googleapis.com/auth/userinfo.profile",
    ],
};

const GITHUB_ENDPOINTS: ProviderEndpoints = ProviderEndpoints {
    authorize_url: "https://github.com/login/oauth/authorize",
    token_url: "https://github.com/login/oauth/access_token",
    profile_url: "https://api.github.com/user",
    scopes: &["user:email"],
};

/// Identity fields taken from a provider profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthProfile {
    pub email: String,
    pub name: String,
    pub avatar: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUserInfo {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    picture: Option<String>,
}

impl From<GoogleUserInfo> for OAuthProfile {
    fn from(info: GoogleUserInfo) -> Self {
        Self {
            email: info.email.unwrap_or_default(),
            name: info.name.unwrap_or_default(),
            avatar: info.picture.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    avatar_url: Option<String>,
}

impl From<GithubUser> for OAuthProfile {
    fn from(user: GithubUser) -> Self {
        // Private GitHub emails are not returned; fall back to a login-derived address.
        let email = match (user.email.filter(|e| !e.is_empty()), user.login.as_deref()) {
            (Some(email), _) => email,
            (None, Some(login)) if !login.is_empty() => format!("{login}@github.com"),
            (None, _) => String::new(),
        };
        Self {
            email,
            name: user.name.unwrap_or_default(),
            avatar: user.avatar_url.unwrap_or_default(),
        }
    }
}

#[derive(Clone)]
pub struct OAuthClient {
    http: Client,
    google: Option<OAuthProviderConfig>,
    github: Option<OAuthProviderConfig>,
}

impl OAuthClient {
    pub fn new(config: &AuthConfig) -> AuthResult<Self> {
        let http = Client::builder()
            .user_agent(concat!("forum-api/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            google: config.google.clone(),
            github: config.github.clone(),
        })
    }

    fn provider(
        &self,
        provider: Provider,
    ) -> AuthResult<(&OAuthProviderConfig, &'static ProviderEndpoints)> {
        let (config, endpoints) = match provider {
            Provider::Google => (self.google.as_ref(), &GOOGLE_ENDPOINTS),
            Provider::Github => (self.github.as_ref(), &GITHUB_ENDPOINTS),
            Provider::Local => (None, &GOOGLE_ENDPOINTS),
        };
        config
            .map(|config| (config, endpoints))
            .ok_or(AuthError::ProviderDisabled(provider.as_str()))
    }

    /// URL the browser is sent to in order to start the login.
    pub fn authorize_url(&self, provider: Provider) -> AuthResult<String> {
        let (config, endpoints) = self.provider(provider)?;
        let url = Url::parse_with_params(
            endpoints.authorize_url,
            &[
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", config.redirect_url.as_str()),
                ("response_type", "code"),
                ("scope", endpoints.scopes.join(" ").as_str()),
                ("state", OAUTH_STATE),
            ],
        )
        .map_err(|err| AuthError::Config(format!("bad authorize url: {err}")))?;
        Ok(url.into())
    }

    /// Exchange an authorization code and fetch the caller's profile.
    pub async fn login(&self, provider: Provider, code: &str) -> AuthResult<OAuthProfile> {
        let access_token = self.exchange_code(provider, code).await?;
        self.fetch_profile(provider, &access_token).await
    }

    async fn exchange_code(&self, provider: Provider, code: &str) -> AuthResult<String> {
        let (config, endpoints) = self.provider(provider)?;

        let response: TokenResponse = self
            .http
            .post(endpoints.token_url)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", config.redirect_url.as_str()),
                ("client_id", config.client_id.as_str()),
                ("client_secret", config.client_secret.as_str()),
            ])
            .send()
            .await?
            .json()
            .await?;

        match response {
            TokenResponse {
                access_token: Some(token),
                ..
            } if !token.is_empty() => Ok(token),
            TokenResponse {
                error,
                error_description,
                ..
            } => Err(AuthError::OAuthExchange(
                error_description
                    .or(error)
                    .unwrap_or_else(|| "no access token in response".into()),
            )),
        }
    }

    async fn fetch_profile(&self, provider: Provider, access_token: &str) -> AuthResult<OAuthProfile> {
        let (_, endpoints) = self.provider(provider)?;

        let response = self
            .http
            .get(endpoints.profile_url)
            .bearer_auth(access_token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;

        let profile = match provider {
            Provider::Github => response.json::<GithubUser>().await?.into(),
            _ => response.json::<GoogleUserInfo>().await?.into(),
        };
        Ok(profile)
    }
}

/// Frontend URL that completes an OAuth login, carrying the session in its query.
pub fn completion_redirect(
    frontend_url: &str,
    pair: &TokenPair,
    account: &Account,
) -> AuthResult<String> {
    let base = format!("{}/auth/callback", frontend_url.trim_end_matches('/'));
    let mut url =
        Url::parse(&base).map_err(|err| AuthError::Config(format!("bad FRONTEND_URL: {err}")))?;

    url.query_pairs_mut()
        .append_pair("access_token", &pair.access_token)
        .append_pair("refresh_token", &pair.refresh_token)
        .append_pair("id", &account.id.to_string())
        .append_pair("name", &account.name)
        .append_pair("email", &account.email)
        .append_pair("role", account.role.as_str())
        .append_pair("avatar", &account.avatar);

    Ok(url.into())
}
