//! Publishing events onto the home-automation bus

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

/// Anything that can fire a named event carrying JSON data
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event_type: &str, data: Value) -> Result<()>;
}

/// Fires events through the Home Assistant REST API
/// (`POST /api/events/<event_type>`)
#[derive(Debug, Clone)]
pub struct HomeAssistantPublisher {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HomeAssistantPublisher {
    pub fn new(client: reqwest::Client, base_url: &str, token: Option<String>) -> Self {
        HomeAssistantPublisher {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    pub fn event_url(&self, event_type: &str) -> String {
        format!("{}/api/events/{event_type}", self.base_url)
    }
}

#[async_trait]
impl EventPublisher for HomeAssistantPublisher {
    async fn publish(&self, event_type: &str, data: Value) -> Result<()> {
        let mut req = self.client.post(self.event_url(event_type)).json(&data);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        req.send().await?.error_for_status()?;
        debug!("fired event {event_type}");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    type Seen = Arc<Mutex<Vec<(String, Option<String>, Value)>>>;

    /// A fake bus recording every fired event with its auth header
    fn spawn_bus(seen: Seen) -> String {
        let server = HttpServer::new(move || {
            let seen = seen.clone();
            App::new().route(
                "/api/events/{event_type}",
                web::post().to(
                    move |req: HttpRequest, path: web::Path<String>, body: web::Json<Value>| {
                        let seen = seen.clone();
                        async move {
                            let auth = req
                                .headers()
                                .get("authorization")
                                .and_then(|h| h.to_str().ok())
                                .map(String::from);
                            seen.lock()
                                .unwrap()
                                .push((path.into_inner(), auth, body.into_inner()));
                            HttpResponse::Ok().json(json!({ "message": "fired" }))
                        }
                    },
                ),
            )
        })
        .workers(1)
        .bind(("127.0.0.1", 0))
        .unwrap();
        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{addr}/")
    }

    #[test]
    fn test_event_url() {
        let publisher =
            HomeAssistantPublisher::new(reqwest::Client::new(), "http://hass.local:8123/", None);
        assert_eq!(
            publisher.event_url("esp32_ai_response"),
            "http://hass.local:8123/api/events/esp32_ai_response"
        );
    }

    #[actix_web::test]
    async fn test_publish_fires_event_with_token() {
        let seen = Seen::default();
        let url = spawn_bus(seen.clone());
        let publisher =
            HomeAssistantPublisher::new(reqwest::Client::new(), &url, Some("abc".into()));

        publisher
            .publish("esp32_ai_response", json!({ "error": true }))
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, "esp32_ai_response");
        assert_eq!(seen[0].1.as_deref(), Some("Bearer abc"));
        assert_eq!(seen[0].2, json!({ "error": true }));
    }

    #[actix_web::test]
    async fn test_publish_unreachable_bus_fails() {
        let publisher =
            HomeAssistantPublisher::new(reqwest::Client::new(), "http://127.0.0.1:1", None);
        assert!(publisher.publish("esp32_ai_response", json!({})).await.is_err());
    }
}
