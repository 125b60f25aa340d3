//! Entrypoint of the inference service

use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use camsight::config::Settings;
use camsight::predictor::Predictor;
use camsight::server;
use camsight::torch::{Labels, TorchModel};
use camsight::util::init_tracing;
use tracing::info;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let settings = Settings::load().context("invalid configuration")?.server;

    let labels = match &settings.labels_file {
        Some(path) => {
            Labels::from_file(path).with_context(|| format!("could not read labels {path}"))?
        }
        None => Labels::imagenet(),
    };

    // Loaded once, then shared read-only by every worker
    let model = TorchModel::new(&settings.model_file, settings.softmax)
        .with_context(|| format!("could not load model {}", settings.model_file))?;
    info!(
        "loaded {} ({} labels, {:?}, {:?})",
        settings.model_file,
        labels.len(),
        settings.preprocessing,
        settings.layout
    );

    let predictor = web::Data::new(
        Predictor::new(
            Box::new(model),
            labels,
            settings.preprocessing,
            settings.layout,
        )
        .with_top_n(settings.top_n),
    );

    info!("listening on {}:{}", settings.host, settings.port);
    HttpServer::new(move || {
        App::new()
            .app_data(predictor.clone())
            .wrap(server::cors())
            .wrap(middleware::Logger::default())
            .configure(server::configure)
    })
    .bind((settings.host.as_str(), settings.port))?
    .run()
    .await?;

    Ok(())
}
