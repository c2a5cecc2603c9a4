// ABOUTME: Shared fixtures for integration tests
// A scriptable in-process host and a session wired to a memory transport

#![allow(dead_code)]

use async_trait::async_trait;
use ide_session::channel::{ClientEvent, MemoryHost, MemoryTransport, SentEvent};
use ide_session::host::{HostApi, HostError};
use ide_session::session::{Session, SessionConfig, SessionNotice};
use ide_session::workspace::WorkspaceNode;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::time::Duration;

pub const DEBOUNCE: Duration = Duration::from_millis(2_000);

/// Host double whose tree, file contents and latencies can be changed mid-test.
#[derive(Default)]
pub struct FakeHost {
    tree: Mutex<Option<WorkspaceNode>>,
    files: Mutex<HashMap<String, String>>,
    content_delays: Mutex<HashMap<String, Duration>>,
    tree_delays: Mutex<VecDeque<Duration>>,
    tree_requests: AtomicUsize,
    content_requests: AtomicUsize,
}

impl FakeHost {
    pub fn new(tree: Value) -> Arc<Self> {
        let host = Self::default();
        host.set_tree(tree);
        Arc::new(host)
    }

    pub fn set_tree(&self, tree: Value) {
        let root = WorkspaceNode::from_json(&tree).expect("fixture tree is valid");
        *self.tree.lock().unwrap() = Some(root);
    }

    /// Make every tree request fail until a tree is set again.
    pub fn fail_tree(&self) {
        *self.tree.lock().unwrap() = None;
    }

    pub fn set_file(&self, path: &str, content: &str) {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), content.to_string());
    }

    pub fn delay_content(&self, path: &str, delay: Duration) {
        self.content_delays
            .lock()
            .unwrap()
            .insert(path.to_string(), delay);
    }

    /// Latency for the next tree requests, in request order.
    pub fn queue_tree_delay(&self, delay: Duration) {
        self.tree_delays.lock().unwrap().push_back(delay);
    }

    pub fn tree_requests(&self) -> usize {
        self.tree_requests.load(Ordering::SeqCst)
    }

    pub fn content_requests(&self) -> usize {
        self.content_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostApi for FakeHost {
    async fn fetch_tree(&self) -> Result<WorkspaceNode, HostError> {
        self.tree_requests.fetch_add(1, Ordering::SeqCst);
        // Snapshot at request time, so a delayed response carries older data
        let snapshot = self.tree.lock().unwrap().clone();
        let delay = self.tree_delays.lock().unwrap().pop_front();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        snapshot.ok_or_else(|| HostError::HostUnreachable("host is down".to_string()))
    }

    async fn fetch_content(&self, path: &str) -> Result<String, HostError> {
        self.content_requests.fetch_add(1, Ordering::SeqCst);
        let delay = self.content_delays.lock().unwrap().get(path).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.files
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| HostError::NotFound(path.to_string()))
    }
}

pub struct Harness {
    pub session: Session,
    pub wire: MemoryHost,
    pub notices: mpsc::UnboundedReceiver<SessionNotice>,
}

impl Harness {
    pub fn start(host: &Arc<FakeHost>) -> Self {
        let (transport, inbound, wire) = MemoryTransport::pair();
        let host: Arc<dyn HostApi> = host.clone();
        let mut session = Session::new(
            host,
            Arc::new(transport),
            inbound,
            SessionConfig {
                persist_debounce: DEBOUNCE,
                request_timeout: Duration::from_secs(10),
            },
        );
        let notices = session.subscribe();
        Self {
            session,
            wire,
            notices,
        }
    }

    pub fn drain_notices(&mut self) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        while let Ok(notice) = self.notices.try_recv() {
            notices.push(notice);
        }
        notices
    }

    pub fn row_paths(&self) -> Vec<String> {
        self.session
            .controller()
            .tree()
            .visible_rows()
            .into_iter()
            .map(|row| row.path)
            .collect()
    }

    /// Every `file:change` sent so far, as (path, content).
    pub fn take_persists(&mut self) -> Vec<(String, String)> {
        persists(&self.wire.take_sent())
    }
}

pub fn persists(sent: &[SentEvent]) -> Vec<(String, String)> {
    sent.iter()
        .filter_map(|sent| match &sent.event {
            ClientEvent::FileChange(change) => Some((change.path.clone(), change.content.clone())),
            ClientEvent::TerminalWrite(_) => None,
        })
        .collect()
}
