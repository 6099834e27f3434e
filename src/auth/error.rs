use rocket::http::Status;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email and password required")]
    MissingCredentials,
    #[error("email already registered")]
    EmailTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("missing token")]
    MissingToken,
    #[error("invalid token format")]
    MalformedHeader,
    #[error("invalid token")]
    TokenInvalid,
    #[error("logged out")]
    SessionRevoked,
    #[error("user not found")]
    AccountNotFound,
    #[error("forbidden")]
    Forbidden,
    #[error("oauth provider '{0}' is not configured")]
    ProviderDisabled(&'static str),
    #[error("oauth exchange failed: {0}")]
    OAuthExchange(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Sqlx(#[from] rocket_db_pools::sqlx::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("http client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::MissingCredentials => Status::BadRequest,
            AuthError::EmailTaken => Status::Conflict,
            AuthError::InvalidCredentials
            | AuthError::MissingToken
            | AuthError::MalformedHeader
            | AuthError::TokenInvalid
            | AuthError::SessionRevoked
            | AuthError::AccountNotFound => Status::Unauthorized,
            AuthError::Forbidden => Status::Forbidden,
            AuthError::ProviderDisabled(_) => Status::NotFound,
            AuthError::OAuthExchange(_) | AuthError::Http(_) => Status::BadRequest,
            AuthError::Config(_)
            | AuthError::Sqlx(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_) => Status::InternalServerError,
        }
    }

    /// Client-facing message. Internal failures collapse to a generic string.
    pub fn public_message(&self) -> String {
        if self.status() == Status::InternalServerError {
            "internal server error".to_string()
        } else {
            self.to_string()
        }
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_failures_share_one_status() {
        for err in [
            AuthError::MissingToken,
            AuthError::MalformedHeader,
            AuthError::TokenInvalid,
            AuthError::SessionRevoked,
        ] {
            assert_eq!(err.status(), Status::Unauthorized);
        }
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AuthError::PasswordHash("salt too short".into());
        assert_eq!(err.status(), Status::InternalServerError);
        assert_eq!(err.public_message(), "internal server error");
        assert_eq!(AuthError::EmailTaken.public_message(), "email already registered");
    }
}
