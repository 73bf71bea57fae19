use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;

use crate::activity::{self, Kind};
use crate::error::RelayError;
use crate::models::{Method, RelayResult, RequestDescriptor};

/// The only thing in the app allowed to talk to the network. It does exactly
/// what the descriptor says: no retries, no caching, no timeout beyond the
/// HTTP client's own defaults.
#[async_trait]
pub trait Relay: Send + Sync {
    async fn execute(&self, descriptor: RequestDescriptor) -> Result<RelayResult, RelayError>;
}

pub struct HttpRelay {
    client: reqwest::Client,
}

impl HttpRelay {
    pub fn new() -> Self {
        HttpRelay {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for HttpRelay {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Relay for HttpRelay {
    async fn execute(&self, descriptor: RequestDescriptor) -> Result<RelayResult, RelayError> {
        let label = format!("{} {}", descriptor.method.as_str(), descriptor.endpoint);
        activity::log_with(Kind::Request, label.clone());

        let mut request = match descriptor.method {
            Method::Get => self.client.get(&descriptor.endpoint),
            Method::Post => self.client.post(&descriptor.endpoint),
        };
        if let Some(body) = &descriptor.body {
            request = request.header(CONTENT_TYPE, "application/json").json(body);
        }

        let response = request.send().await.map_err(|e| {
            activity::log_with(Kind::Failure, format!("{} failed: {}", label, e));
            RelayError::Network(e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            activity::log_with(Kind::Failure, format!("{} -> {}", label, status));
            return Err(RelayError::Transport { status: status.as_u16() });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| RelayError::Network(e.to_string()))?;
        let data: Value = serde_json::from_slice(&bytes).map_err(|e| {
            activity::log_with(Kind::Failure, format!("{} -> {} with unreadable body", label, status));
            RelayError::Parse(e.to_string())
        })?;

        activity::log_with(Kind::Response, format!("{} -> {}", label, status));
        Ok(RelayResult::Json(data))
    }
}
