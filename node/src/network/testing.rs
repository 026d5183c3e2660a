// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-process transport with canned replies, for connection and scheduler tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;

use super::transport::{Headers, PeerTransport, RawResponse, TransportError};

#[derive(Clone)]
pub enum Reply {
    Status(u16, Vec<u8>),
    Fail(String),
    /// Never answers; only a timeout or cancellation ends the call.
    Hang,
    /// Answers once the gate is notified.
    Gated(Arc<Notify>, u16, Vec<u8>),
    /// Answers after `Duration` of (possibly paused) tokio time.
    Delayed(Duration, u16, Vec<u8>),
}

impl Reply {
    pub fn json<S: serde::Serialize>(value: &S) -> Self {
        Reply::Status(200, serde_json::to_vec(value).unwrap())
    }
}

#[derive(Debug, Clone)]
pub struct Recorded {
    pub base_url: String,
    pub path: String,
    pub headers: Headers,
}

impl Recorded {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, v)| v.as_str())
    }
}

pub struct ScriptedTransport {
    requests: AtomicUsize,
    log: Mutex<Vec<Recorded>>,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    fallback: Reply,
}

impl ScriptedTransport {
    pub fn new(fallback: Reply) -> Self {
        Self {
            requests: AtomicUsize::new(0),
            log: Mutex::new(Vec::new()),
            scripts: Mutex::new(HashMap::new()),
            fallback,
        }
    }

    /// Queues a reply for the next request to `base_url`.
    pub fn push(&self, base_url: &str, reply: Reply) {
        self.scripts
            .lock()
            .unwrap()
            .entry(base_url.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    pub fn requests_to(&self, base_url: &str) -> Vec<Recorded> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.base_url == base_url)
            .cloned()
            .collect()
    }

    fn next_reply(&self, base_url: &str, path: &str, headers: Headers) -> Reply {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.log.lock().unwrap().push(Recorded {
            base_url: base_url.to_string(),
            path: path.to_string(),
            headers,
        });
        self.scripts
            .lock()
            .unwrap()
            .get_mut(base_url)
            .and_then(|q| q.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

async fn play(reply: Reply) -> Result<RawResponse, TransportError> {
    match reply {
        Reply::Status(status, body) => Ok(RawResponse { status, body }),
        Reply::Fail(msg) => Err(TransportError::Failed(msg)),
        Reply::Hang => std::future::pending().await,
        Reply::Gated(gate, status, body) => {
            gate.notified().await;
            Ok(RawResponse { status, body })
        }
        Reply::Delayed(delay, status, body) => {
            tokio::time::sleep(delay).await;
            Ok(RawResponse { status, body })
        }
    }
}

impl PeerTransport for ScriptedTransport {
    async fn get(
        &self,
        base_url: &str,
        path: &str,
        headers: Headers,
    ) -> Result<RawResponse, TransportError> {
        let reply = self.next_reply(base_url, path, headers);
        play(reply).await
    }

    async fn post(
        &self,
        base_url: &str,
        path: &str,
        headers: Headers,
        _body: Vec<u8>,
    ) -> Result<RawResponse, TransportError> {
        let reply = self.next_reply(base_url, path, headers);
        play(reply).await
    }
}
