//! Request/response correlation for IQ-style round trips.
//!
//! Every outgoing request that expects a reply is registered under an
//! id; the reply is routed back to the caller's future through a
//! one-shot channel. Disconnection fails every pending slot instead of
//! leaving them to time out one by one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::sync::oneshot;
use tokio::time::timeout;

use crate::binary::Node;
use crate::error::RequestTimeout;

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Tracks in-flight request ids and their completion channels.
pub struct RequestTracker {
    pending: Arc<RwLock<HashMap<String, oneshot::Sender<Node>>>>,
    counter: AtomicU64,
}

impl RequestTracker {
    pub fn new() -> Self {
        Self {
            pending: Arc::new(RwLock::new(HashMap::new())),
            counter: AtomicU64::new(0),
        }
    }

    /// Generate a unique request id: seconds-since-epoch in hex,
    /// followed by a per-process monotonic counter.
    pub fn next_id(&self) -> String {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let count = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{:X}.{}", secs, count)
    }

    /// Register a pending request and return a receiver that resolves
    /// when `complete` is called with a matching id, or errors after
    /// `timeout` elapses.
    pub async fn wait_for(&self, id: &str, timeout_duration: Duration) -> Result<Node, RequestTimeout> {
        let (tx, rx) = oneshot::channel();
        self.pending.write().unwrap().insert(id.to_string(), tx);

        match timeout(timeout_duration, rx).await {
            Ok(Ok(node)) => Ok(node),
            // Sender dropped (e.g. fail_all ran without a reply) or the
            // timeout elapsed: either way, drop any leftover slot and
            // report a timeout.
            Ok(Err(_)) | Err(_) => {
                self.pending.write().unwrap().remove(id);
                Err(RequestTimeout)
            }
        }
    }

    pub async fn wait(&self, id: &str) -> Result<Node, RequestTimeout> {
        self.wait_for(id, DEFAULT_REQUEST_TIMEOUT).await
    }

    /// Complete a pending request with a response. Returns `false` if
    /// no matching request was pending (a late or duplicate reply).
    pub fn complete(&self, id: &str, response: Node) -> bool {
        if let Some(tx) = self.pending.write().unwrap().remove(id) {
            tx.send(response).is_ok()
        } else {
            false
        }
    }

    /// Drop a pending request without resolving it.
    pub fn cancel(&self, id: &str) {
        self.pending.write().unwrap().remove(id);
    }

    /// Drop every pending request, e.g. on disconnect. Their receivers
    /// observe a dropped sender and return a timeout error.
    pub fn fail_all(&self) {
        self.pending.write().unwrap().clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.read().unwrap().len()
    }
}

impl Default for RequestTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Build an IQ get request.
pub fn build_iq_get(id: &str, xmlns: &str, to: Option<&str>) -> Node {
    let mut node = Node::new("iq");
    node.set_attr("id", id);
    node.set_attr("type", "get");
    node.set_attr("xmlns", xmlns);
    if let Some(to) = to {
        node.set_attr("to", to);
    }
    node
}

/// Build an IQ set request.
pub fn build_iq_set(id: &str, xmlns: &str, to: Option<&str>) -> Node {
    let mut node = Node::new("iq");
    node.set_attr("id", id);
    node.set_attr("type", "set");
    node.set_attr("xmlns", xmlns);
    if let Some(to) = to {
        node.set_attr("to", to);
    }
    node
}

/// Build an IQ result response.
pub fn build_iq_result(id: &str, to: Option<&str>) -> Node {
    let mut node = Node::new("iq");
    node.set_attr("id", id);
    node.set_attr("type", "result");
    if let Some(to) = to {
        node.set_attr("to", to);
    }
    node
}

pub fn is_iq_result(node: &Node) -> bool {
    node.tag == "iq" && node.get_attr_str("type") == Some("result")
}

pub fn is_iq_error(node: &Node) -> bool {
    node.tag == "iq" && node.get_attr_str("type") == Some("error")
}

pub fn get_iq_error(node: &Node) -> Option<String> {
    if !is_iq_error(node) {
        return None;
    }
    node.get_child_by_tag("error")
        .and_then(|e| e.get_attr_str("text"))
        .map(String::from)
        .or_else(|| node.get_child_by_tag("error").map(|e| e.tag.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_request_round_trip() {
        let tracker = Arc::new(RequestTracker::new());
        let id = tracker.next_id();

        let tracker2 = tracker.clone();
        let id2 = id.clone();
        tokio::spawn(async move {
            tracker2.complete(&id2, Node::new("result"));
        });

        let response = tracker.wait(&id).await.unwrap();
        assert_eq!(response.tag, "result");
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_request_timeout() {
        let tracker = RequestTracker::new();
        let id = tracker.next_id();
        let result = tracker.wait_for(&id, Duration::from_millis(20)).await;
        assert!(result.is_err());
        assert_eq!(tracker.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_fail_all_resolves_pending_as_timeout() {
        let tracker = Arc::new(RequestTracker::new());
        let id = tracker.next_id();

        let tracker2 = tracker.clone();
        let id2 = id.clone();
        let handle = tokio::spawn(async move { tracker2.wait(&id2).await });

        tokio::task::yield_now().await;
        tracker.fail_all();

        let result = handle.await.unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_late_reply_after_cancel_is_dropped() {
        let tracker = RequestTracker::new();
        let id = tracker.next_id();
        // no registration/wait in flight — complete should be a no-op
        assert!(!tracker.complete(&id, Node::new("result")));
    }

    #[test]
    fn test_build_iq_get() {
        let node = build_iq_get("123", "w:profile:picture", Some("user@server"));
        assert_eq!(node.tag, "iq");
        assert_eq!(node.get_attr_str("type"), Some("get"));
        assert_eq!(node.get_attr_str("xmlns"), Some("w:profile:picture"));
    }

    #[test]
    fn test_is_iq_result_and_error() {
        let mut result = Node::new("iq");
        result.set_attr("type", "result");
        assert!(is_iq_result(&result));

        let mut error = Node::new("iq");
        error.set_attr("type", "error");
        assert!(!is_iq_result(&error));
        assert!(is_iq_error(&error));
    }
}
