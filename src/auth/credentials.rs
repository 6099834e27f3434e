use std::sync::Arc;

use crate::auth::accounts::{Account, AccountStore, NewAccount};
use crate::auth::oauth::OAuthProfile;
use crate::auth::passwords::PasswordService;
use crate::auth::responses::{Provider, Role};
use crate::auth::{AuthError, AuthResult};

/// Local registration and login, plus account provisioning for OAuth logins.
#[derive(Clone)]
pub struct CredentialService {
    passwords: Arc<PasswordService>,
    accounts: Arc<dyn AccountStore>,
}

impl CredentialService {
    pub fn new(passwords: Arc<PasswordService>, accounts: Arc<dyn AccountStore>) -> Self {
        Self {
            passwords,
            accounts,
        }
    }

    pub fn accounts(&self) -> &Arc<dyn AccountStore> {
        &self.accounts
    }

    /// Create a local account with role `user`.
    ///
    /// The email pre-check races with concurrent registrations; the loser of
    /// that race still gets [`AuthError::EmailTaken`] from the unique index.
    pub async fn register(&self, name: &str, email: &str, password: &str) -> AuthResult<Account> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        if self.accounts.find_by_email(&email).await?.is_some() {
            return Err(AuthError::EmailTaken);
        }

        let password_hash = self.passwords.hash_password(password)?;
        let account = self
            .accounts
            .insert(NewAccount {
                name: name.trim().to_string(),
                email,
                password_hash: Some(password_hash),
                provider: Provider::Local,
                role: Role::User,
                avatar: String::new(),
            })
            .await?;

        log::info!("registered local account {}", account.id);
        Ok(account)
    }

    /// Check local credentials. Unknown email, an account without a password
    /// (OAuth-only) and a wrong password are indistinguishable to the caller.
    pub async fn authenticate(&self, email: &str, password: &str) -> AuthResult<Account> {
        let email = normalize_email(email);
        let account = self
            .accounts
            .find_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        let Some(hash) = account.password_hash.as_deref() else {
            return Err(AuthError::InvalidCredentials);
        };

        if !self.passwords.verify_password(password, hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        Ok(account)
    }

    /// Find the account for an OAuth profile by email, creating it on first login.
    pub async fn find_or_create_oauth(
        &self,
        provider: Provider,
        profile: OAuthProfile,
    ) -> AuthResult<Account> {
        let email = normalize_email(&profile.email);
        if email.is_empty() {
            return Err(AuthError::OAuthExchange(
                "provider did not return an email address".into(),
            ));
        }

        if let Some(existing) = self.accounts.find_by_email(&email).await? {
            return Ok(existing);
        }

        let account = self
            .accounts
            .insert(NewAccount {
                name: profile.name,
                email,
                password_hash: None,
                provider,
                role: Role::User,
                avatar: profile.avatar,
            })
            .await?;

        log::info!(
            "created {} account {} on first login",
            provider.as_str(),
            account.id
        );
        Ok(account)
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::MemoryAccountStore;

    fn service() -> CredentialService {
        CredentialService::new(
            Arc::new(PasswordService::new().expect("password service")),
            Arc::new(MemoryAccountStore::default()),
        )
    }

    #[tokio::test]
    async fn register_then_login() {
        let creds = service();
        let account = creds.register("A", "a@x.com", "secret").await.expect("register");
        assert_eq!(account.provider, Provider::Local);
        assert_eq!(account.role, Role::User);
        assert!(account.refresh_token.is_none());

        let logged_in = creds.authenticate("a@x.com", "secret").await.expect("login");
        assert_eq!(logged_in.id, account.id);

        let wrong = creds.authenticate("a@x.com", "wrong").await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn register_rejects_blank_fields() {
        let creds = service();
        assert!(matches!(
            creds.register("A", "", "secret").await,
            Err(AuthError::MissingCredentials)
        ));
        assert!(matches!(
            creds.register("A", "a@x.com", "").await,
            Err(AuthError::MissingCredentials)
        ));
    }

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let creds = service();
        creds.register("A", "a@x.com", "secret").await.expect("first");
        let dup = creds.register("B", " A@X.com ", "other").await;
        assert!(matches!(dup, Err(AuthError::EmailTaken)));
    }

    #[tokio::test]
    async fn unknown_email_is_unauthorized() {
        let creds = service();
        let result = creds.authenticate("nobody@x.com", "secret").await;
        assert!(matches!(result, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn oauth_accounts_cannot_use_password_login() {
        let creds = service();
        let profile = OAuthProfile {
            email: "octo@github.com".into(),
            name: "Octo".into(),
            avatar: "https://avatars.example/octo.png".into(),
        };
        let created = creds
            .find_or_create_oauth(Provider::Github, profile.clone())
            .await
            .expect("create");
        assert_eq!(created.provider, Provider::Github);
        assert!(created.password_hash.is_none());

        let again = creds
            .find_or_create_oauth(Provider::Github, profile)
            .await
            .expect("find");
        assert_eq!(again.id, created.id);

        let login = creds.authenticate("octo@github.com", "").await;
        assert!(matches!(login, Err(AuthError::InvalidCredentials)));
    }
}
