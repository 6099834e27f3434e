//! HTTP route handlers grouped by resource.
//!
//! Handlers carry their full path (`/categories`, `/api/topics`, ...) so the
//! public, authenticated and admin surfaces can all be mounted at `/` and
//! described by a single OpenAPI document.

pub mod admin;
pub mod catchers;
pub mod categories;
pub mod downloads;
pub mod health;
pub(crate) mod helpers;
pub mod params;
pub mod posts;
pub mod search;
pub mod topics;
