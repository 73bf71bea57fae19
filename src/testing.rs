//! Relay doubles for tests.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::RelayError;
use crate::models::{RelayResult, RequestDescriptor};
use crate::relay::Relay;

/// Relay that answers from a queue and records every descriptor it sees.
/// Clones share the same queue and record.
#[derive(Clone, Default)]
pub struct MockRelay {
    responses: Arc<Mutex<VecDeque<Result<RelayResult, RelayError>>>>,
    requests: Arc<Mutex<Vec<RequestDescriptor>>>,
}

impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn queue_json(&self, data: Value) {
        self.responses.lock().unwrap().push_back(Ok(RelayResult::Json(data)));
    }

    pub fn queue_error(&self, error: RelayError) {
        self.responses.lock().unwrap().push_back(Err(error));
    }

    pub fn recorded_descriptors(&self) -> Vec<RequestDescriptor> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Relay for MockRelay {
    async fn execute(&self, descriptor: RequestDescriptor) -> Result<RelayResult, RelayError> {
        self.requests.lock().unwrap().push(descriptor);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(RelayError::Network("No mock response queued".to_string())))
    }
}

/// Relay that dies mid-call, so the reply is never sent.
pub struct PanickingRelay;

#[async_trait]
impl Relay for PanickingRelay {
    async fn execute(&self, _descriptor: RequestDescriptor) -> Result<RelayResult, RelayError> {
        panic!("relay crashed");
    }
}
