//! Transport layer abstraction for sync operations.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::time::Duration;
use syncline_protocol::{
    PullRequest, PullResponse, PushRequest, PushResponse, ResolveRequest, SyncItem,
};

/// A transport handles request/response exchanges with the sync server.
///
/// This trait abstracts the network layer, allowing different
/// implementations (HTTP, mock for testing, in-process loopback).
#[async_trait]
pub trait Transport: Send + Sync {
    /// Pulls changes since the client's last sync time.
    async fn pull(&self, request: &PullRequest) -> EngineResult<PullResponse>;

    /// Pushes a batch of queued entries.
    async fn push(&self, request: &PushRequest) -> EngineResult<PushResponse>;

    /// Fetches the single authoritative record, if it exists.
    async fn fetch_item(&self, collection: &str, id: &str) -> EngineResult<Option<SyncItem>>;

    /// Applies a conflict resolution on the server.
    async fn resolve_item(
        &self,
        collection: &str,
        id: &str,
        request: &ResolveRequest,
    ) -> EngineResult<SyncItem>;
}

/// A scriptable transport for testing.
///
/// Responses are queued per operation; when a queue is empty the mock
/// answers with a benign default (empty pull, fully-successful push).
/// Every push request is recorded for assertions.
#[derive(Default)]
pub struct MockTransport {
    pull_responses: Mutex<VecDeque<EngineResult<PullResponse>>>,
    push_responses: Mutex<VecDeque<EngineResult<PushResponse>>>,
    fetch_responses: Mutex<VecDeque<EngineResult<Option<SyncItem>>>>,
    resolve_responses: Mutex<VecDeque<EngineResult<SyncItem>>>,
    pushed: Mutex<Vec<PushRequest>>,
    resolved: Mutex<Vec<(String, String, ResolveRequest)>>,
    pull_count: Mutex<u64>,
    push_delay: Mutex<Option<Duration>>,
}

impl MockTransport {
    /// Creates a mock with default behavior.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a pull outcome.
    pub fn enqueue_pull(&self, response: EngineResult<PullResponse>) {
        self.pull_responses.lock().push_back(response);
    }

    /// Queues a push outcome.
    pub fn enqueue_push(&self, response: EngineResult<PushResponse>) {
        self.push_responses.lock().push_back(response);
    }

    /// Queues a fetch outcome.
    pub fn enqueue_fetch(&self, response: EngineResult<Option<SyncItem>>) {
        self.fetch_responses.lock().push_back(response);
    }

    /// Queues a resolve outcome.
    pub fn enqueue_resolve(&self, response: EngineResult<SyncItem>) {
        self.resolve_responses.lock().push_back(response);
    }

    /// Delays every push, for exercising cancellation and concurrency.
    pub fn set_push_delay(&self, delay: Duration) {
        *self.push_delay.lock() = Some(delay);
    }

    /// Push requests received so far.
    pub fn pushed_requests(&self) -> Vec<PushRequest> {
        self.pushed.lock().clone()
    }

    /// Resolve calls received so far.
    pub fn resolve_calls(&self) -> Vec<(String, String, ResolveRequest)> {
        self.resolved.lock().clone()
    }

    /// Number of pulls received so far.
    pub fn pull_count(&self) -> u64 {
        *self.pull_count.lock()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn pull(&self, _request: &PullRequest) -> EngineResult<PullResponse> {
        *self.pull_count.lock() += 1;
        match self.pull_responses.lock().pop_front() {
            Some(response) => response,
            None => Ok(PullResponse::empty(Utc::now())),
        }
    }

    async fn push(&self, request: &PushRequest) -> EngineResult<PushResponse> {
        let delay = *self.push_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        self.pushed.lock().push(request.clone());
        match self.push_responses.lock().pop_front() {
            Some(response) => response,
            None => Ok(PushResponse::success(request.items.len() as u32)),
        }
    }

    async fn fetch_item(&self, collection: &str, id: &str) -> EngineResult<Option<SyncItem>> {
        match self.fetch_responses.lock().pop_front() {
            Some(response) => response,
            None => Err(EngineError::Protocol(format!(
                "no mock fetch response for {collection}/{id}"
            ))),
        }
    }

    async fn resolve_item(
        &self,
        collection: &str,
        id: &str,
        request: &ResolveRequest,
    ) -> EngineResult<SyncItem> {
        self.resolved
            .lock()
            .push((collection.to_string(), id.to_string(), request.clone()));

        match self.resolve_responses.lock().pop_front() {
            Some(response) => response,
            None => Ok(SyncItem::new(collection, id, request.data.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use syncline_protocol::ResolutionStrategy;

    #[tokio::test]
    async fn default_pull_is_empty() {
        let transport = MockTransport::new();
        let response = transport
            .pull(&PullRequest::since(Utc::now()))
            .await
            .unwrap();
        assert!(response.changes.is_empty());
        assert_eq!(transport.pull_count(), 1);
    }

    #[tokio::test]
    async fn scripted_push_outcomes_pop_in_order() {
        let transport = MockTransport::new();
        transport.enqueue_push(Err(EngineError::Timeout));
        transport.enqueue_push(Ok(PushResponse::success(2)));

        let request = PushRequest::new(Vec::new(), false);
        assert!(matches!(
            transport.push(&request).await,
            Err(EngineError::Timeout)
        ));
        assert!(transport.push(&request).await.unwrap().success);
        assert_eq!(transport.pushed_requests().len(), 2);
    }

    #[tokio::test]
    async fn resolve_records_calls_and_echoes_data() {
        let transport = MockTransport::new();
        let request = ResolveRequest {
            data: json!({"title": "merged"}),
            resolution: ResolutionStrategy::Merge,
        };

        let item = transport
            .resolve_item("lessons", "L1", &request)
            .await
            .unwrap();
        assert_eq!(item.data, json!({"title": "merged"}));

        let calls = transport.resolve_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "lessons");
        assert_eq!(calls[0].1, "L1");
    }
}
