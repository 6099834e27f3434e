use rocket::http::{ContentType, Status};
use rocket::response::{self, Responder};
use rocket::{Request, Response};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::okapi::openapi3::{MediaType, RefOr, Response as OpenApiResponse, Responses};
use rocket_okapi::okapi::schemars::JsonSchema;
use rocket_okapi::response::OpenApiResponderInner;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use thiserror::Error;

use crate::auth::AuthError;
use crate::db::{is_foreign_key_violation, is_unique_violation, is_value_too_long};

const INTERNAL_MESSAGE: &str = "internal server error";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Unauthenticated(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),
    #[error("{0}")]
    Internal(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unauthenticated(_) => Status::Unauthorized,
            ApiError::Forbidden(_) => Status::Forbidden,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::Database(_) | ApiError::Internal(_) => Status::InternalServerError,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "BadRequest",
            ApiError::Unauthenticated(_) => "Unauthenticated",
            ApiError::Forbidden(_) => "Forbidden",
            ApiError::NotFound(_) => "NotFound",
            ApiError::Conflict(_) => "Conflict",
            ApiError::Database(_) | ApiError::Internal(_) => "Internal",
        }
    }

    /// Map a bare status (from a catcher) onto the taxonomy.
    pub fn from_status(status: Status, message: impl Into<String>) -> Self {
        let message = message.into();
        match status.code {
            400 | 422 => ApiError::BadRequest(message),
            401 => ApiError::Unauthenticated(message),
            403 => ApiError::Forbidden(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            _ => ApiError::Internal(message),
        }
    }

    pub fn body(&self) -> ErrorBody {
        let message = match self {
            ApiError::Database(err) => {
                log::error!("database error: {}", err);
                INTERNAL_MESSAGE.to_string()
            }
            ApiError::Internal(msg) => {
                log::error!("internal error: {}", msg);
                INTERNAL_MESSAGE.to_string()
            }
            other => {
                log::debug!("{}: {}", other.kind(), other);
                other.to_string()
            }
        };

        ErrorBody {
            error: self.kind().to_string(),
            message,
        }
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, _: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let json = serde_json::to_string(&self.body()).unwrap_or_else(|_| {
            r#"{"error":"Internal","message":"internal server error"}"#.to_string()
        });

        Response::build()
            .status(status)
            .header(ContentType::JSON)
            .sized_body(json.len(), Cursor::new(json))
            .ok()
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(r#gen: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let schema = r#gen.json_schema::<ErrorBody>();
        let mut responses = Responses::default();

        for (code, description) in [
            ("400", "Malformed body or identifier"),
            ("401", "Missing, malformed or invalid access token"),
            ("403", "Role or ownership check failed"),
            ("404", "Entity not found"),
            ("409", "Duplicate entity"),
            ("500", "Internal failure"),
        ] {
            let mut response = OpenApiResponse {
                description: description.to_string(),
                ..Default::default()
            };
            response.content.insert(
                "application/json".to_string(),
                MediaType {
                    schema: Some(schema.clone()),
                    ..Default::default()
                },
            );
            responses
                .responses
                .insert(code.to_string(), RefOr::Object(response));
        }

        Ok(responses)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("resource not found".to_string()),
            ref e if is_unique_violation(e) => {
                ApiError::Conflict("resource already exists".to_string())
            }
            ref e if is_foreign_key_violation(e) => {
                ApiError::BadRequest("referenced resource does not exist".to_string())
            }
            ref e if is_value_too_long(e) => {
                ApiError::BadRequest("a field exceeds its maximum length".to_string())
            }
            _ => ApiError::Database(err),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        let status = err.status();
        if status == Status::InternalServerError {
            return ApiError::Internal(err.to_string());
        }
        ApiError::from_status(status, err.public_message())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_map_onto_taxonomy() {
        let cases = [
            (AuthError::MissingCredentials, "BadRequest"),
            (AuthError::EmailTaken, "Conflict"),
            (AuthError::TokenInvalid, "Unauthenticated"),
            (AuthError::SessionRevoked, "Unauthenticated"),
            (AuthError::Forbidden, "Forbidden"),
            (AuthError::ProviderDisabled("google"), "NotFound"),
        ];
        for (err, kind) in cases {
            assert_eq!(ApiError::from(err).kind(), kind);
        }
    }

    #[test]
    fn internal_details_are_hidden() {
        let err = ApiError::from(AuthError::Config("JWT_SECRET is required".into()));
        let body = err.body();
        assert_eq!(body.error, "Internal");
        assert_eq!(body.message, "internal server error");
    }

    #[test]
    fn row_not_found_is_not_found() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.status(), Status::NotFound);
    }

    #[test]
    fn unprocessable_entity_is_bad_request() {
        let err = ApiError::from_status(Status::UnprocessableEntity, "bad body");
        assert_eq!(err.status(), Status::BadRequest);
        assert_eq!(err.body().message, "bad body");
    }
}
