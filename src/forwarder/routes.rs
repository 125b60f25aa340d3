//! Webhook surface of the forwarder: the bus delivers the image-capture event
//! by POSTing its data to `/events/<event_type>`

use super::{Forwarder, InboundEvent};
use actix_web::{post, web, HttpResponse};
use serde_json::json;
use tracing::{debug, warn};

#[post("/events/{event_type}")]
pub async fn inbound_event(
    path: web::Path<String>,
    body: web::Bytes,
    state: web::Data<Forwarder>,
) -> HttpResponse {
    let event_type = path.into_inner();
    if event_type != state.trigger_event() {
        debug!("ignoring unknown event {event_type}");
        return HttpResponse::NotFound().json(json!({ "error": "unknown event" }));
    }

    // an empty body is an event without data
    let event = if body.iter().all(u8::is_ascii_whitespace) {
        InboundEvent::default()
    } else {
        match serde_json::from_slice::<InboundEvent>(&body) {
            Ok(event) => event,
            Err(e) => {
                warn!("malformed {event_type} event: {e}");
                return HttpResponse::BadRequest().json(json!({ "error": "malformed event" }));
            }
        }
    };

    match state.handle(event).await {
        Ok(fired) => HttpResponse::Ok().json(json!({ "published": fired.is_some() })),
        Err(_) => HttpResponse::BadGateway().json(json!({ "published": false })),
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::PayloadConfig::new(crate::server::MAX_BODY))
        .service(inbound_event);
}
