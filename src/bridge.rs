use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use crate::error::RelayError;
use crate::models::{RelayResult, RequestDescriptor};
use crate::relay::Relay;

struct Call {
    descriptor: RequestDescriptor,
    reply: oneshot::Sender<Result<RelayResult, RelayError>>,
}

/// Handle to the relay. `invoke` is the whole surface: a descriptor goes in,
/// the relay's answer comes back untouched. Whoever holds a `Bridge` can
/// reach the network only through it.
#[derive(Clone)]
pub struct Bridge {
    sender: mpsc::UnboundedSender<Call>,
}

impl Bridge {
    /// Starts `relay` on a dedicated thread with its own tokio runtime. The
    /// thread stops once every `Bridge` clone has been dropped.
    pub fn spawn<R: Relay + 'static>(relay: R) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("relay-worker")
            .enable_all()
            .build()?;
        let (sender, mut receiver) = mpsc::unbounded_channel::<Call>();
        let relay: Arc<dyn Relay> = Arc::new(relay);

        std::thread::Builder::new()
            .name("relay".to_string())
            .spawn(move || {
                runtime.block_on(async move {
                    while let Some(call) = receiver.recv().await {
                        let relay = relay.clone();
                        // One task per call; the relay itself never serializes work.
                        tokio::spawn(async move {
                            let result = relay.execute(call.descriptor).await;
                            let _ = call.reply.send(result);
                        });
                    }
                });
                debug_eprintln!("[bridge] relay thread exiting");
            })?;

        Ok(Bridge { sender })
    }

    pub async fn invoke(&self, descriptor: RequestDescriptor) -> Result<RelayResult, RelayError> {
        debug_eprintln!("[bridge] invoke {} {}", descriptor.method.as_str(), descriptor.endpoint);
        let (reply, response) = oneshot::channel();
        self.sender
            .send(Call { descriptor, reply })
            .map_err(|_| RelayError::BridgeClosed)?;
        response.await.map_err(|_| RelayError::BridgeClosed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Method;
    use crate::testing::{MockRelay, PanickingRelay};
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Barrier;

    #[tokio::test]
    async fn test_invoke_passes_descriptor_and_result_through() {
        let relay = MockRelay::new();
        relay.queue_json(json!({ "choices": [{ "message": { "content": "hi" } }] }));
        let bridge = Bridge::spawn(relay.clone()).unwrap();

        let descriptor = RequestDescriptor {
            endpoint: "http://x/v1/chat/completions".to_string(),
            method: Method::Post,
            body: Some(json!({ "model": "m", "nested": { "keep": [1, 2, 3] } })),
        };
        let result = bridge.invoke(descriptor.clone()).await.unwrap();

        assert_eq!(result, RelayResult::Json(json!({ "choices": [{ "message": { "content": "hi" } }] })));
        assert_eq!(relay.recorded_descriptors(), vec![descriptor]);
    }

    #[tokio::test]
    async fn test_invoke_propagates_relay_errors() {
        let relay = MockRelay::new();
        relay.queue_error(RelayError::Transport { status: 503 });
        let bridge = Bridge::spawn(relay).unwrap();

        let err = bridge.invoke(RequestDescriptor::models("http://x")).await.unwrap_err();
        assert_eq!(err, RelayError::Transport { status: 503 });
    }

    #[tokio::test]
    async fn test_dropped_reply_is_bridge_closed() {
        let bridge = Bridge::spawn(PanickingRelay).unwrap();

        let err = bridge.invoke(RequestDescriptor::models("http://x")).await.unwrap_err();
        assert_eq!(err, RelayError::BridgeClosed);
    }

    struct RendezvousRelay {
        barrier: Arc<Barrier>,
    }

    #[async_trait]
    impl Relay for RendezvousRelay {
        async fn execute(&self, _descriptor: RequestDescriptor) -> Result<RelayResult, RelayError> {
            self.barrier.wait().await;
            Ok(RelayResult::Json(json!({})))
        }
    }

    #[tokio::test]
    async fn test_relay_processes_calls_concurrently() {
        let bridge = Bridge::spawn(RendezvousRelay { barrier: Arc::new(Barrier::new(2)) }).unwrap();

        // Each call only finishes once the other one has reached the relay.
        let both = async {
            tokio::join!(
                bridge.invoke(RequestDescriptor::models("http://a")),
                bridge.invoke(RequestDescriptor::models("http://b")),
            )
        };
        let (a, b) = tokio::time::timeout(Duration::from_secs(5), both).await.unwrap();
        assert!(a.is_ok());
        assert!(b.is_ok());
    }
}
