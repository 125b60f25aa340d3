//! Entrypoint of the event forwarder

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use camsight::config::Settings;
use camsight::forwarder::events::HomeAssistantPublisher;
use camsight::forwarder::{self, routes, Forwarder};
use camsight::util::init_tracing;
use std::sync::Arc;
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::load().context("invalid configuration")?.forwarder;

    let client = forwarder::build_client(&settings)?;
    let publisher = HomeAssistantPublisher::new(
        client.clone(),
        &settings.bus_url,
        settings.bus_token.clone(),
    );
    let forwarder = web::Data::new(Forwarder::new(client, &settings, Arc::new(publisher)));

    info!(
        "forwarding {} to {}, answering with {}",
        settings.trigger_event, settings.inference_url, settings.response_event
    );
    HttpServer::new(move || {
        App::new()
            .app_data(forwarder.clone())
            .wrap(middleware::Logger::default())
            .configure(routes::configure)
    })
    .bind((settings.host.as_str(), settings.port))?
    .run()
    .await?;

    Ok(())
}
