use actix_web::{get, HttpResponse, Responder};
use serde::Serialize;
use tracing::{instrument, Level};

const COMMIT: &str = match option_env!("GIT_COMMIT") {
    Some(commit) => commit,
    None => "unknown",
};

#[derive(Serialize)]
struct VersionInfo {
    commit: &'static str,
    version: &'static str,
}

#[instrument(level = Level::INFO)]
#[get("/_status")]
pub async fn status() -> impl Responder {
    HttpResponse::Ok().body("Healthy")
}

#[instrument(level = Level::INFO)]
#[get("/_version")]
pub async fn version() -> impl Responder {
    HttpResponse::Ok().json(VersionInfo {
        commit: COMMIT,
        version: env!("CARGO_PKG_VERSION"),
    })
}
