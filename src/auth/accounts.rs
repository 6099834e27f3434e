//! Credential store: account records and the single active refresh token
//! each one carries.

use chrono::{DateTime, Utc};
use rocket_db_pools::sqlx::{self, FromRow, PgPool};

use crate::auth::responses::{Provider, Role};
use crate::auth::{AuthError, AuthResult};
use crate::db::is_unique_violation;

#[derive(Debug, Clone)]
pub struct Account {
    pub id: i32,
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub provider: Provider,
    pub role: Role,
    pub avatar: String,
    pub refresh_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub provider: Provider,
    pub role: Role,
    pub avatar: String,
}

/// Storage seam for accounts. The Postgres implementation backs the server;
/// tests use the in-memory one from `test_support`.
#[rocket::async_trait]
pub trait AccountStore: Send + Sync {
    async fn find_by_id(&self, id: i32) -> AuthResult<Option<Account>>;

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>>;

    /// Insert a new account. A duplicate email yields [`AuthError::EmailTaken`].
    async fn insert(&self, account: NewAccount) -> AuthResult<Account>;

    /// Replace the stored refresh token; `None` clears it.
    async fn store_refresh_token(&self, id: i32, token: Option<&str>) -> AuthResult<()>;

    /// Swap `current` for `next` only if `current` is still the stored token.
    /// Returns `false` when another rotation or a logout got there first.
    async fn rotate_refresh_token(&self, id: i32, current: &str, next: &str) -> AuthResult<bool>;
}

#[derive(Debug, FromRow)]
struct AccountRow {
    id: i32,
    name: String,
    email: String,
    password_hash: Option<String>,
    provider: String,
    role: String,
    avatar: String,
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AccountRow> for Account {
    fn from(row: AccountRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password_hash: row.password_hash,
            provider: Provider::from_db(&row.provider),
            role: Role::from_db(&row.role),
            avatar: row.avatar,
            refresh_token: row.refresh_token,
            created_at: row.created_at,
        }
    }
}

const ACCOUNT_COLUMNS: &str =
    "id, name, email, password_hash, provider, role, avatar, refresh_token, created_at";

#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: PgPool,
}

impl PgAccountStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl AccountStore for PgAccountStore {
    async fn find_by_id(&self, id: i32) -> AuthResult<Option<Account>> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Account::from))
    }

    async fn find_by_email(&self, email: &str) -> AuthResult<Option<Account>> {
        let row: Option<AccountRow> =
            sqlx::query_as(&format!("SELECT {ACCOUNT_COLUMNS} FROM users WHERE email = $1"))
                .bind(email)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(Account::from))
    }

    async fn insert(&self, account: NewAccount) -> AuthResult<Account> {
        let result: Result<AccountRow, sqlx::Error> = sqlx::query_as(&format!(
            "INSERT INTO users (name, email, password_hash, provider, role, avatar) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {ACCOUNT_COLUMNS}"
        ))
        .bind(&account.name)
        .bind(&account.email)
        .bind(account.password_hash.as_deref())
        .bind(account.provider.as_str())
        .bind(account.role.as_str())
        .bind(&account.avatar)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(err) if is_unique_violation(&err) => Err(AuthError::EmailTaken),
            Err(err) => Err(err.into()),
        }
    }

    async fn store_refresh_token(&self, id: i32, token: Option<&str>) -> AuthResult<()> {
        let result = sqlx::query("UPDATE users SET refresh_token = $1 WHERE id = $2")
            .bind(token)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AuthError::AccountNotFound);
        }
        Ok(())
    }

    async fn rotate_refresh_token(&self, id: i32, current: &str, next: &str) -> AuthResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET refresh_token = $1 WHERE id = $2 AND refresh_token = $3",
        )
        .bind(next)
        .bind(id)
        .bind(current)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }
}
