use super::protocol::{PredictRequest, ResponseEnvelope};
use super::WebError;
use crate::predictor::{PredictError, Predictor};
use actix_web::{get, post, web, Responder};
use serde_json::json;
use tracing::{error, info, warn};

type Result<T> = std::result::Result<T, WebError>;

/// Classify a base 64 image. Undecodable images are answered with
/// `{"error": true}` and status 200
#[post("/")]
pub async fn predict(
    req: web::Json<PredictRequest>,
    state: web::Data<Predictor>,
) -> Result<web::Json<ResponseEnvelope>> {
    let PredictRequest { image } = req.into_inner();
    let predictor = state.into_inner();

    // Inference blocks, keep it off the async workers
    let outcome = web::block(move || predictor.predict(&image)).await?;

    match outcome {
        Ok(predictions) => {
            info!("finished serving inference request");
            Ok(web::Json(predictions.into()))
        }
        Err(PredictError::Decode(e)) => {
            warn!("could not decode image: {e}");
            Ok(web::Json(ResponseEnvelope::error()))
        }
        Err(e) => {
            error!("inference failed: {e}");
            Err(e.into())
        }
    }
}

/// Liveness check
#[get("/health")]
pub async fn health(state: web::Data<Predictor>) -> impl Responder {
    web::Json(json!({
        "status": "ok",
        "labels": state.labels().len(),
        "top_n": state.top_n(),
    }))
}
