//! The event forwarder bridges an image-capture event from the home-automation
//! bus to the inference service, and fires the result back onto the bus as a
//! new event

use crate::config::ForwarderSettings;
use events::EventPublisher;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

pub mod events;
pub mod routes;

/// Every way the call to the inference service can fail. All of them are
/// reported to the bus the same way
#[derive(Debug, Error)]
pub enum ForwardError {
    #[error("inference request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("inference service answered {0}")]
    Status(reqwest::StatusCode),
}

/// Data of an image-capture event. Fields other than `image` are ignored
#[derive(Debug, Default, Deserialize)]
pub struct InboundEvent {
    pub image: Option<String>,
}

pub struct Forwarder {
    client: reqwest::Client,
    inference_url: String,
    trigger_event: String,
    response_event: String,
    publisher: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for Forwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Forwarder")
            .field("inference_url", &self.inference_url)
            .field("trigger_event", &self.trigger_event)
            .field("response_event", &self.response_event)
            .finish()
    }
}

/// HTTP client for the inference service, with the configured timeout if any
pub fn build_client(settings: &ForwarderSettings) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder();
    if let Some(secs) = settings.timeout_secs {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build()
}

impl Forwarder {
    pub fn new(
        client: reqwest::Client,
        settings: &ForwarderSettings,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Forwarder {
            client,
            inference_url: settings.inference_url.clone(),
            trigger_event: settings.trigger_event.clone(),
            response_event: settings.response_event.clone(),
            publisher,
        }
    }

    pub fn trigger_event(&self) -> &str {
        &self.trigger_event
    }

    /// POST the image to the inference service. The body is read in full and
    /// parsed before it is used
    async fn classify(&self, image: &str) -> Result<Value, ForwardError> {
        let resp = self
            .client
            .post(&self.inference_url)
            .json(&json!({ "image": image }))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ForwardError::Status(status));
        }
        Ok(resp.json::<Value>().await?)
    }

    /// Handle one inbound event. Returns the data fired as the response event,
    /// or `None` when the event carried no image and nothing was fired
    pub async fn handle(&self, event: InboundEvent) -> anyhow::Result<Option<Value>> {
        let Some(image) = event.image else {
            warn!("no image in {} event", self.trigger_event);
            return Ok(None);
        };

        let data = match self.classify(&image).await {
            Ok(data) => {
                info!("classified image from {} event", self.trigger_event);
                data
            }
            Err(e) => {
                warn!("forwarding to {} failed: {e}", self.inference_url);
                json!({ "error": true })
            }
        };

        if let Err(e) = self.publisher.publish(&self.response_event, data.clone()).await {
            error!("could not fire {}: {e}", self.response_event);
            return Err(e);
        }
        Ok(Some(data))
    }
}
