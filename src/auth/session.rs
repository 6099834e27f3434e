//! Session lifecycle on top of [`JwtService`] and the account store.
//!
//! An account is logged in while its row carries a refresh token. Issuing a
//! pair overwrites that token, so only the most recently issued refresh token
//! is ever accepted. Logging out clears it. Access tokens are never tracked
//! server-side and stay valid until they expire, even after logout.

use std::sync::Arc;

use crate::auth::accounts::{Account, AccountStore};
use crate::auth::jwt::{JwtService, TokenPair};
use crate::auth::{AuthError, AuthResult};

#[derive(Clone)]
pub struct SessionService {
    jwt: Arc<JwtService>,
    accounts: Arc<dyn AccountStore>,
}

impl SessionService {
    pub fn new(jwt: Arc<JwtService>, accounts: Arc<dyn AccountStore>) -> Self {
        Self { jwt, accounts }
    }

    /// Issue a pair for `account` and make its refresh token the only valid one.
    pub async fn start(&self, account: &Account) -> AuthResult<TokenPair> {
        let pair = self.jwt.issue_pair(account.id, account.role)?;
        self.accounts
            .store_refresh_token(account.id, Some(&pair.refresh_token))
            .await?;
        log::debug!("session started for account {}", account.id);
        Ok(pair)
    }

    /// Exchange a refresh token for a new pair, rotating the stored token.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let account_id = self.jwt.verify_refresh(refresh_token)?;

        let account = self
            .accounts
            .find_by_id(account_id)
            .await?
            .ok_or(AuthError::AccountNotFound)?;

        match account.refresh_token.as_deref() {
            None | Some("") => return Err(AuthError::SessionRevoked),
            Some(stored) if stored != refresh_token => {
                log::info!("stale refresh token presented for account {}", account.id);
                return Err(AuthError::TokenInvalid);
            }
            Some(_) => {}
        }

        let pair = self.jwt.issue_pair(account.id, account.role)?;
        let rotated = self
            .accounts
            .rotate_refresh_token(account.id, refresh_token, &pair.refresh_token)
            .await?;
        if !rotated {
            log::info!("refresh token for account {} was rotated concurrently", account.id);
            return Err(AuthError::TokenInvalid);
        }
        Ok(pair)
    }

    /// Forget the stored refresh token for `account_id`.
    pub async fn end(&self, account_id: i32) -> AuthResult<()> {
        self.accounts.store_refresh_token(account_id, None).await?;
        log::debug!("session ended for account {}", account_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AuthConfig;
    use crate::auth::accounts::NewAccount;
    use crate::auth::responses::{Provider, Role};
    use crate::test_support::MemoryAccountStore;

    struct Harness {
        jwt: Arc<JwtService>,
        store: Arc<MemoryAccountStore>,
        sessions: SessionService,
    }

    fn harness() -> Harness {
        let jwt = Arc::new(
            JwtService::from_config(&AuthConfig::with_secret("session-test-secret"))
                .expect("jwt service"),
        );
        let store = Arc::new(MemoryAccountStore::default());
        let sessions = SessionService::new(jwt.clone(), store.clone());
        Harness {
            jwt,
            store,
            sessions,
        }
    }

    async fn account(store: &MemoryAccountStore, role: Role) -> Account {
        store
            .insert(NewAccount {
                name: "Tester".into(),
                email: "tester@example.com".into(),
                password_hash: None,
                provider: Provider::Local,
                role,
                avatar: String::new(),
            })
            .await
            .expect("insert account")
    }

    #[tokio::test]
    async fn start_persists_latest_refresh_token() {
        let h = harness();
        let acct = account(&h.store, Role::User).await;

        let pair = h.sessions.start(&acct).await.expect("start");

        let stored = h.store.find_by_id(acct.id).await.expect("lookup").expect("row");
        assert_eq!(stored.refresh_token.as_deref(), Some(pair.refresh_token.as_str()));
    }

    #[tokio::test]
    async fn refresh_rotates_and_rejects_previous_token() {
        let h = harness();
        let acct = account(&h.store, Role::User).await;
        let first = h.sessions.start(&acct).await.expect("start");

        let second = h.sessions.refresh(&first.refresh_token).await.expect("refresh");
        assert_ne!(first.refresh_token, second.refresh_token);

        let replay = h.sessions.refresh(&first.refresh_token).await;
        assert!(matches!(replay, Err(AuthError::TokenInvalid)));

        h.sessions.refresh(&second.refresh_token).await.expect("rotated token works");
    }

    #[tokio::test]
    async fn logout_revokes_refresh_but_not_access() {
        let h = harness();
        let acct = account(&h.store, Role::Admin).await;
        let pair = h.sessions.start(&acct).await.expect("start");

        h.sessions.end(acct.id).await.expect("logout");

        let refreshed = h.sessions.refresh(&pair.refresh_token).await;
        assert!(matches!(refreshed, Err(AuthError::SessionRevoked)));

        let verified = h.jwt.verify_access(&pair.access_token).expect("access still valid");
        assert_eq!(verified.account_id, acct.id);
        assert_eq!(verified.role, Role::Admin);
    }

    #[tokio::test]
    async fn concurrent_refreshes_with_one_token_succeed_once() {
        let h = harness();
        let acct = account(&h.store, Role::User).await;
        let pair = h.sessions.start(&acct).await.expect("start");

        let (a, b) = tokio::join!(
            h.sessions.refresh(&pair.refresh_token),
            h.sessions.refresh(&pair.refresh_token),
        );
        let winners: Vec<TokenPair> = [a, b].into_iter().filter_map(Result::ok).collect();
        assert_eq!(winners.len(), 1);

        let stored = h.store.find_by_id(acct.id).await.expect("lookup").expect("row");
        assert_eq!(stored.refresh_token.as_deref(), Some(winners[0].refresh_token.as_str()));
    }

    #[tokio::test]
    async fn rotation_loses_to_logout() {
        let h = harness();
        let acct = account(&h.store, Role::User).await;
        let pair = h.sessions.start(&acct).await.expect("start");

        h.sessions.end(acct.id).await.expect("logout");
        let swapped = h
            .store
            .rotate_refresh_token(acct.id, &pair.refresh_token, "next")
            .await
            .expect("rotate");
        assert!(!swapped);
    }

    #[tokio::test]
    async fn refresh_for_missing_account_is_not_found() {
        let h = harness();
        let orphan = h.jwt.issue_pair(999, Role::User).expect("pair");

        let result = h.sessions.refresh(&orphan.refresh_token).await;
        assert!(matches!(result, Err(AuthError::AccountNotFound)));
    }

    #[tokio::test]
    async fn access_token_cannot_refresh() {
        let h = harness();
        let acct = account(&h.store, Role::User).await;
        let pair = h.sessions.start(&acct).await.expect("start");

        let result = h.sessions.refresh(&pair.access_token).await;
        assert!(matches!(result, Err(AuthError::TokenInvalid)));
    }
}
