//! The user-facing JSON web server that listens for inference requests

use crate::predictor::PredictError;
use actix_cors::Cors;
use actix_web::error::BlockingError;
use actix_web::http::header::ContentType;
use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse};
use protocol::ResponseEnvelope;
use thiserror::Error;
use tracing::warn;

pub mod protocol;
pub mod routes;

/// Largest accepted request body. Base 64 camera frames run to a few MiB
pub const MAX_BODY: usize = 16 * 1024 * 1024;

/// Failures that reach the client as a non-200 `{"error": true}`
#[derive(Debug, Error)]
pub enum WebError {
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Predict(#[from] PredictError),

    #[error("inference task failed: {0}")]
    Blocking(#[from] BlockingError),
}

impl actix_web::error::ResponseError for WebError {
    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .json(ResponseEnvelope::error())
    }

    fn status_code(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::Predict(_) | WebError::Blocking(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Any origin, method and header, with credentials
pub fn cors() -> Cors {
    Cors::permissive()
}

/// Register the inference routes and the JSON extractor config
pub fn configure(cfg: &mut web::ServiceConfig) {
    let json = web::JsonConfig::default()
        .limit(MAX_BODY)
        .error_handler(|err, _req| {
            warn!("rejecting malformed request: {err}");
            WebError::BadRequest(err.to_string()).into()
        });

    cfg.app_data(json)
        .service(routes::predict)
        .service(routes::health);
}
