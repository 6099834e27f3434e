//! JSON error catchers. Failures raised before a handler runs (guards, body
//! parsing, unknown routes) get the same `{"error", "message"}` body as
//! handler errors.

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Catcher, Request, catch, catchers};

use crate::auth::guards::AuthFailure;
use crate::error::{ApiError, ErrorBody};

/// Message left by a failing auth guard, else the given default.
fn failure_message(request: &Request<'_>, fallback: &str) -> String {
    request
        .local_cache(AuthFailure::default)
        .0
        .clone()
        .unwrap_or_else(|| fallback.to_string())
}

#[catch(400)]
fn bad_request(request: &Request<'_>) -> ApiError {
    ApiError::from_status(Status::BadRequest, failure_message(request, "bad request"))
}

#[catch(401)]
fn unauthorized(request: &Request<'_>) -> ApiError {
    ApiError::from_status(
        Status::Unauthorized,
        failure_message(request, "authentication required"),
    )
}

#[catch(403)]
fn forbidden(request: &Request<'_>) -> ApiError {
    ApiError::from_status(Status::Forbidden, failure_message(request, "forbidden"))
}

#[catch(404)]
fn not_found(request: &Request<'_>) -> ApiError {
    ApiError::from_status(
        Status::NotFound,
        format!("no route for {} {}", request.method(), request.uri().path()),
    )
}

#[catch(409)]
fn conflict() -> ApiError {
    ApiError::from_status(Status::Conflict, "conflict")
}

/// Rocket answers 422 when a JSON body does not match the expected shape.
#[catch(422)]
fn unprocessable() -> ApiError {
    ApiError::from_status(Status::UnprocessableEntity, "invalid request body")
}

#[catch(500)]
fn internal() -> ApiError {
    ApiError::from_status(Status::InternalServerError, "internal server error")
}

/// Anything else keeps its status; the body still follows the error shape.
#[catch(default)]
fn fallback(status: Status, _request: &Request<'_>) -> (Status, Json<ErrorBody>) {
    let reason = status.reason().unwrap_or("request failed");
    let body = match status.code {
        400..=499 => ErrorBody {
            error: "BadRequest".to_string(),
            message: reason.to_lowercase(),
        },
        _ => ApiError::Internal(reason.to_string()).body(),
    };
    (status, Json(body))
}

pub fn all() -> Vec<Catcher> {
    catchers![
        bad_request,
        unauthorized,
        forbidden,
        not_found,
        conflict,
        unprocessable,
        internal,
        fallback
    ]
}
