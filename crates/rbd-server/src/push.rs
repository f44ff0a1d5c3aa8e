use anyhow::{Result, anyhow};
use futures_util::future::BoxFuture;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};

use rbd_core::store::PushDispatcher;
use rbd_types::events::PushMessage;

#[derive(Serialize)]
struct PushRequest<'a> {
    token: &'a str,
    #[serde(flatten)]
    message: &'a PushMessage,
}

/// Posts each notification as JSON to a push gateway.
pub struct HttpPushDispatcher {
    client: Client,
    url: String,
    api_key: Option<String>,
}

impl HttpPushDispatcher {
    pub fn new(url: String, api_key: Option<String>) -> Self {
        Self {
            client: Client::new(),
            url,
            api_key,
        }
    }
}

impl PushDispatcher for HttpPushDispatcher {
    fn send<'a>(&'a self, delivery_token: &'a str, message: &'a PushMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut req = self.client.post(&self.url).json(&PushRequest {
                token: delivery_token,
                message,
            });
            if let Some(key) = &self.api_key {
                req = req.header("Authorization", format!("Bearer {}", key));
            }

            let resp = req.send().await.map_err(|e| anyhow!("Push request failed: {}", e))?;
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(anyhow!("Push gateway rejected notification ({}): {}", status, body));
            }

            debug!("Push delivered: {}", message.title);
            Ok(())
        })
    }
}

/// Used when no gateway is configured.
pub struct LogDispatcher;

impl PushDispatcher for LogDispatcher {
    fn send<'a>(&'a self, _delivery_token: &'a str, message: &'a PushMessage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            info!("Push (not sent, no gateway configured): {} / {}", message.title, message.body);
            Ok(())
        })
    }
}
