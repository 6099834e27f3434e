//! Authentication: configuration, account storage, password hashing, token
//! minting, OAuth login, Rocket request guards and the HTTP handlers.

use std::sync::Arc;

pub mod accounts;
pub mod config;
pub mod credentials;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod oauth;
pub mod passwords;
pub mod responses;
pub mod routes;
pub mod session;

pub use accounts::{AccountStore, PgAccountStore};
pub use config::AuthConfig;
pub use credentials::CredentialService;
pub use error::{AuthError, AuthResult};
pub use guards::{AuthUser, RequireAdmin};
pub use jwt::JwtService;
pub use oauth::OAuthClient;
pub use passwords::PasswordService;
pub use session::SessionService;

/// Everything the auth routes and guards need, managed as Rocket state.
#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub jwt: Arc<JwtService>,
    pub passwords: Arc<PasswordService>,
    pub accounts: Arc<dyn AccountStore>,
    pub credentials: CredentialService,
    pub sessions: SessionService,
    pub oauth: OAuthClient,
}

impl AuthState {
    pub fn new(config: AuthConfig, accounts: Arc<dyn AccountStore>) -> AuthResult<Self> {
        let jwt = Arc::new(JwtService::from_config(&config)?);
        let passwords = Arc::new(PasswordService::new()?);
        let credentials = CredentialService::new(passwords.clone(), accounts.clone());
        let sessions = SessionService::new(jwt.clone(), accounts.clone());
        let oauth = OAuthClient::new(&config)?;

        Ok(Self {
            config,
            jwt,
            passwords,
            accounts,
            credentials,
            sessions,
            oauth,
        })
    }
}
