use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Data, Request, Response};
use std::time::Instant;

/// When the request reached the server.
struct RequestStart(Instant);

/// Fairing that writes one access-log line per request.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Request | Kind::Response,
        }
    }

    async fn on_request(&self, request: &mut Request<'_>, _: &mut Data<'_>) {
        request.local_cache(|| RequestStart(Instant::now()));
    }

    async fn on_response<'r>(&self, request: &'r Request<'_>, response: &mut Response<'r>) {
        let elapsed = request.local_cache(|| RequestStart(Instant::now())).0.elapsed();
        let status = response.status();
        let line = format!(
            "{} {} -> {} ({:.2}ms)",
            request.method(),
            request.uri(),
            status.code,
            elapsed.as_secs_f64() * 1000.0
        );

        if status.code >= 500 {
            log::warn!("{}", line);
        } else {
            log::info!("{}", line);
        }
    }
}
