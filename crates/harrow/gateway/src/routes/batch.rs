use actix_web::{
    get, http::StatusCode, post, web::Data, web::Json, web::Query, HttpRequest, HttpResponse,
    Responder,
};
use harrow_api::{error::ResolveError, job::JobInfo, principal::DispatchRequest};
use harrow_auth::token::JwksVerifier;
use harrow_provider::{extract_result_line, ActionRegistry, BatchClient};
use serde::{Deserialize, Serialize};
use tracing::{error, instrument, warn, Level};

/// Display name of the caller, forwarded by the fronting proxy.
/// Informational only; authorization always derives from the token.
const HEADER_REMOTE_USER: &str = "REMOTE_USER";

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status_code: StatusCode, error: impl ToString) -> HttpResponse {
    HttpResponse::build(status_code).json(ErrorBody {
        error: error.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct DispatchPayload {
    action: String,
    #[serde(default)]
    input: ::serde_json::Value,
    #[serde(default)]
    access_format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobQuery {
    #[serde(rename = "UID")]
    uid: Option<String>,
}

#[derive(Serialize)]
struct JobListResponse {
    jobs: Vec<JobInfo>,
}

#[derive(Serialize)]
struct JobOutput {
    output: String,
}

#[instrument(level = Level::INFO, skip(request, client, registry, verifier))]
#[post("/dispatch")]
pub async fn dispatch(
    request: HttpRequest,
    payload: Json<DispatchPayload>,
    client: Data<BatchClient>,
    registry: Data<ActionRegistry>,
    verifier: Data<JwksVerifier>,
) -> impl Responder {
    let principal = match verifier.resolve(&request).await {
        Ok(principal) => principal,
        Err(error) => {
            warn!("rejected a dispatch: {error}");
            return error_response(StatusCode::UNAUTHORIZED, error);
        }
    };

    let payload = payload.into_inner();
    let template = match registry.resolve(&payload.action) {
        Ok(template) => template,
        Err(error @ ResolveError::UnknownAction(_)) => {
            return error_response(StatusCode::BAD_REQUEST, error)
        }
        Err(error) => {
            error!("{error}");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, error);
        }
    };

    let caller_user_name = request
        .headers()
        .get(HEADER_REMOTE_USER)
        .and_then(|name| name.to_str().ok())
        .unwrap_or_default()
        .into();
    // resolve() has already proven the token is present
    let access_token = ::harrow_auth::token::get_bearer_token(&request)
        .unwrap_or_default()
        .into();

    let request = DispatchRequest {
        action: payload.action,
        input: payload.input,
        access_format: payload
            .access_format
            .unwrap_or_else(|| DispatchRequest::DEFAULT_ACCESS_FORMAT.into()),
        access_token,
        caller_user_name,
        principal,
    };

    match client.dispatch(&request, template).await {
        Ok(job) => HttpResponse::Ok().json(job),
        Err(error) => {
            error!("failed to dispatch a job: {error}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, error)
        }
    }
}

/// Unscoped by contract: status lookups need no token, and the shared
/// lookup path is the same one the reaper uses.
#[instrument(level = Level::INFO, skip(client))]
#[get("/status")]
pub async fn status(query: Query<JobQuery>, client: Data<BatchClient>) -> impl Responder {
    let uid = match &query.uid {
        Some(uid) => uid,
        None => return error_response(StatusCode::BAD_REQUEST, "Missing UID argument"),
    };

    match client.status(uid, None).await {
        Ok(job) => HttpResponse::Ok().json(job),
        Err(error) => error_response(StatusCode::INTERNAL_SERVER_ERROR, error),
    }
}

#[instrument(level = Level::INFO, skip(request, client, verifier))]
#[get("/list")]
pub async fn list(
    request: HttpRequest,
    client: Data<BatchClient>,
    verifier: Data<JwksVerifier>,
) -> impl Responder {
    let principal = match verifier.resolve(&request).await {
        Ok(principal) => principal,
        Err(error) => {
            warn!("rejected a listing: {error}");
            return error_response(StatusCode::UNAUTHORIZED, error);
        }
    };

    let jobs = client.list(&principal).await;
    HttpResponse::Ok().json(JobListResponse { jobs })
}

#[instrument(level = Level::INFO, skip(request, client, verifier))]
#[get("/output")]
pub async fn output(
    request: HttpRequest,
    query: Query<JobQuery>,
    client: Data<BatchClient>,
    verifier: Data<JwksVerifier>,
) -> impl Responder {
    let principal = match verifier.resolve(&request).await {
        Ok(principal) => principal,
        Err(error) => {
            warn!("rejected an output request: {error}");
            return error_response(StatusCode::UNAUTHORIZED, error);
        }
    };

    let uid = match &query.uid {
        Some(uid) => uid,
        None => return error_response(StatusCode::BAD_REQUEST, "Missing UID argument"),
    };

    match client.logs(uid, Some(&principal)).await {
        Ok(log) => HttpResponse::Ok().json(JobOutput {
            output: extract_result_line(&log).unwrap_or_default(),
        }),
        Err(error) => {
            error!("failed to fetch a job output: {error}");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, error)
        }
    }
}
