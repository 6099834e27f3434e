use rocket::Request;
use rocket::State;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;

use crate::auth::responses::Role;
use crate::auth::{AuthError, AuthResult, AuthState};

/// Identity attached to a request by a valid access token.
///
/// Verification is purely cryptographic; the account row is not consulted,
/// so a deleted account keeps working until its access token expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, OpenApiFromRequest)]
pub struct AuthUser {
    pub id: i32,
    pub role: Role,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::Admin)
    }
}

/// An [`AuthUser`] whose role is `admin`.
#[derive(Debug, Clone, Copy, OpenApiFromRequest)]
pub struct RequireAdmin(pub AuthUser);

/// Message of the guard failure for this request, read back by the JSON catchers.
#[derive(Debug, Default)]
pub struct AuthFailure(pub Option<String>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match extract_user(request).await {
            Ok(user) => Outcome::Success(user),
            Err(err) => reject(request, err),
        }
    }
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for RequireAdmin {
    type Error = AuthError;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match AuthUser::from_request(request).await {
            Outcome::Success(user) if user.is_admin() => Outcome::Success(RequireAdmin(user)),
            Outcome::Success(user) => {
                log::debug!("account {} denied admin route {}", user.id, request.uri());
                reject(request, AuthError::Forbidden)
            }
            Outcome::Error(failure) => Outcome::Error(failure),
            Outcome::Forward(status) => Outcome::Forward(status),
        }
    }
}

fn reject<T>(request: &Request<'_>, err: AuthError) -> Outcome<T, AuthError> {
    let status = err.status();
    let message = err.public_message();
    request.local_cache(|| AuthFailure(Some(message)));
    Outcome::Error((status, err))
}

async fn extract_user(request: &Request<'_>) -> AuthResult<AuthUser> {
    let token = bearer_token(request.headers().get_one("Authorization"))?;

    let state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or_else(|| AuthError::Config("AuthState missing from state".into()))?;

    let verified = state.jwt.verify_access(token)?;
    Ok(AuthUser {
        id: verified.account_id,
        role: verified.role,
    })
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
///
/// The header must hold exactly two space-separated parts; the scheme is
/// matched case-insensitively.
pub fn bearer_token(header: Option<&str>) -> AuthResult<&str> {
    let header = header
        .filter(|value| !value.is_empty())
        .ok_or(AuthError::MissingToken)?;

    let parts: Vec<&str> = header.split(' ').collect();
    match parts.as_slice() {
        [scheme, token] if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(*token)
        }
        _ => Err(AuthError::MalformedHeader),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_accepts_any_scheme_case() {
        assert_eq!(bearer_token(Some("Bearer abc")).expect("token"), "abc");
        assert_eq!(bearer_token(Some("bearer abc")).expect("token"), "abc");
    }

    #[test]
    fn bearer_token_requires_header() {
        assert!(matches!(bearer_token(None), Err(AuthError::MissingToken)));
        assert!(matches!(bearer_token(Some("")), Err(AuthError::MissingToken)));
    }

    #[test]
    fn bearer_token_rejects_bad_shapes() {
        for header in ["Bearer", "Token abc", "Bearer a b", "Bearer ", "Bearer  abc"] {
            assert!(
                matches!(bearer_token(Some(header)), Err(AuthError::MalformedHeader)),
                "{header:?} should be malformed"
            );
        }
    }

    #[test]
    fn only_admin_role_is_admin() {
        assert!(AuthUser { id: 1, role: Role::Admin }.is_admin());
        assert!(!AuthUser { id: 1, role: Role::Moderator }.is_admin());
    }
}
