// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Polling lifecycle of one remote peer.
//!
//! A [`PeerConnection`] owns at most one poll task at a time. The task applies
//! its outcome to the connection status as soon as the network call finishes;
//! the caller harvests the outcome later with [`PeerConnection::try_reap`]
//! without ever blocking. Every task carries its own cancellation token, so an
//! outstanding poll can be cancelled and awaited instead of abandoned.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use ledger_kernel::peer::{Peer, PeerRegistry};
use ledger_kernel::types::id::PeerId;
use ledger_kernel::types::row::ArchiveRow;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::PeerStatusView;
use crate::network::transport::Headers;
use crate::network::{PeerTransport, RawResponse, TransportError, ONPOLL_PATH, REQUEST_TIMEOUT, X_BLOCK_ID, X_FROM, X_PEER_ID};

/// Persistent state of a connection. Independent of any single poll outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Normal,
    NetworkError,
    DataError,
    PeerError,
    InternalError,
}

impl ConnectionStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionStatus::Idle => "idle",
            ConnectionStatus::Normal => "normal",
            ConnectionStatus::NetworkError => "network error",
            ConnectionStatus::DataError => "data error",
            ConnectionStatus::PeerError => "peer error",
            ConnectionStatus::InternalError => "internal error",
        }
    }

    /// Suspended connections issue no polls until cleared.
    pub fn is_suspended(&self) -> bool {
        matches!(self, ConnectionStatus::DataError | ConnectionStatus::InternalError)
    }
}

/// What a single poll produced.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// 200 with a parsed row array.
    Rows(Vec<ArchiveRow>),
    /// 204.
    NoContent,
    /// 500 from the remote.
    PeerFailure,
    /// Transport failure or timeout.
    NetworkFailure(String),
    /// 200 whose body is not a row array.
    Malformed(String),
    /// Any other status code, passed through uninterpreted.
    Other(u16),
    Cancelled,
    /// The poll task itself panicked or was aborted.
    TaskFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reap {
    /// No poll was ever scheduled (or the last one was cleared).
    Idle,
    InFlight,
    /// The last completed poll. Returned again on every call until the next
    /// poll is scheduled.
    Done {
        poll: u64,
        block_id: u64,
        outcome: PollOutcome,
    },
}

#[derive(Debug)]
struct Shared {
    status: ConnectionStatus,
    error: Option<String>,
}

enum PollSlot {
    Empty,
    Running {
        poll: u64,
        block_id: u64,
        handle: JoinHandle<PollOutcome>,
        cancel: CancellationToken,
    },
    Done {
        poll: u64,
        block_id: u64,
        outcome: PollOutcome,
    },
}

pub struct PeerConnection<T: PeerTransport> {
    peer: Peer,
    self_id: PeerId,
    addrs: Vec<IpAddr>,
    transport: Arc<T>,
    shared: Arc<Mutex<Shared>>,
    slot: Mutex<PollSlot>,
    polls: Mutex<u64>,
}

/// Resolves the host part of a peer address (`http://host:port`).
async fn resolve_addrs(address: &str) -> Result<Vec<IpAddr>, String> {
    let url = reqwest::Url::parse(address).map_err(|e| e.to_string())?;
    let host = url.host_str().ok_or_else(|| "address has no host".to_string())?;
    let port = url.port_or_known_default().unwrap_or(80);
    let host = host.trim_start_matches('[').trim_end_matches(']');

    let mut addrs: Vec<IpAddr> = tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| e.to_string())?
        .map(|sa| sa.ip())
        .collect();
    addrs.sort();
    addrs.dedup();
    Ok(addrs)
}

fn classify(result: Result<Result<RawResponse, TransportError>, tokio::time::error::Elapsed>) -> PollOutcome {
    match result {
        Err(_) => PollOutcome::NetworkFailure(format!("no response within {:?}", REQUEST_TIMEOUT)),
        Ok(Err(e)) => PollOutcome::NetworkFailure(e.to_string()),
        Ok(Ok(resp)) => match resp.status {
            200 => match serde_json::from_slice::<Vec<ArchiveRow>>(&resp.body) {
                Ok(rows) => PollOutcome::Rows(rows),
                Err(e) => PollOutcome::Malformed(e.to_string()),
            },
            204 => PollOutcome::NoContent,
            500 => PollOutcome::PeerFailure,
            code => PollOutcome::Other(code),
        },
    }
}

fn lock<V>(m: &Mutex<V>) -> std::sync::MutexGuard<'_, V> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn apply_outcome(shared: &Mutex<Shared>, peer: PeerId, outcome: &PollOutcome) {
    let mut s = lock(shared);
    if s.status.is_suspended() {
        return;
    }
    match outcome {
        PollOutcome::Rows(_) | PollOutcome::NoContent => {
            s.status = ConnectionStatus::Normal;
            s.error = None;
        }
        PollOutcome::PeerFailure => {
            tracing::warn!("Peer {} answered poll with 500", peer);
            metrics::counter!("ledger_poll_failures_total", 1, "kind" => "peer");
            s.status = ConnectionStatus::PeerError;
            s.error = Some("remote returned 500".to_string());
        }
        PollOutcome::NetworkFailure(msg) => {
            tracing::warn!("Poll to peer {} failed: {}", peer, msg);
            metrics::counter!("ledger_poll_failures_total", 1, "kind" => "network");
            s.status = ConnectionStatus::NetworkError;
            s.error = Some(msg.clone());
        }
        PollOutcome::Other(code) => {
            tracing::debug!("Peer {} answered poll with {}", peer, code);
        }
        PollOutcome::Malformed(_) | PollOutcome::Cancelled | PollOutcome::TaskFailed(_) => {}
    }
}

impl<T: PeerTransport> PeerConnection<T> {
    /// Builds a connection and caches the peer's resolved addresses.
    /// Resolution failure is logged and leaves the address set empty, which
    /// rejects every inbound call claiming to be this peer.
    pub async fn connect(peer: Peer, self_id: PeerId, transport: Arc<T>) -> Self {
        let addrs = match resolve_addrs(&peer.address).await {
            Ok(addrs) => addrs,
            Err(e) => {
                tracing::warn!("Could not resolve peer {} at {}: {}", peer.id, peer.address, e);
                Vec::new()
            }
        };
        Self::with_addrs(peer, self_id, transport, addrs)
    }

    pub fn with_addrs(peer: Peer, self_id: PeerId, transport: Arc<T>, addrs: Vec<IpAddr>) -> Self {
        Self {
            peer,
            self_id,
            addrs,
            transport,
            shared: Arc::new(Mutex::new(Shared {
                status: ConnectionStatus::Idle,
                error: None,
            })),
            slot: Mutex::new(PollSlot::Empty),
            polls: Mutex::new(0),
        }
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub fn id(&self) -> PeerId {
        self.peer.id
    }

    pub fn addrs(&self) -> &[IpAddr] {
        &self.addrs
    }

    /// Whether an inbound call from `ip` may claim to be this peer.
    pub fn is_remote_addr(&self, ip: IpAddr) -> bool {
        self.addrs.contains(&ip)
    }

    /// Starts a poll for `block_id`. Returns false without issuing a request
    /// when the connection is suspended or a poll is already in flight.
    /// Must be called from within a tokio runtime.
    pub fn schedule_poll(&self, block_id: u64) -> bool {
        if self.status().is_suspended() {
            return false;
        }

        let mut slot = lock(&self.slot);
        if let PollSlot::Running { handle, .. } = &*slot {
            if !handle.is_finished() {
                return false;
            }
        }

        let poll = {
            let mut n = lock(&self.polls);
            *n += 1;
            *n
        };
        let cancel = CancellationToken::new();
        let headers: Headers = vec![
            (X_FROM, self.self_id.to_string()),
            (X_PEER_ID, self.peer.id.to_string()),
            (X_BLOCK_ID, block_id.to_string()),
        ];

        let transport = self.transport.clone();
        let shared = self.shared.clone();
        let base_url = self.peer.address.clone();
        let peer_id = self.peer.id;
        let token = cancel.clone();

        let handle = tokio::spawn(async move {
            let call = tokio::time::timeout(REQUEST_TIMEOUT, transport.get(&base_url, ONPOLL_PATH, headers));
            let outcome = tokio::select! {
                _ = token.cancelled() => PollOutcome::Cancelled,
                res = call => classify(res),
            };
            apply_outcome(&shared, peer_id, &outcome);
            outcome
        });

        tracing::debug!("Scheduled poll #{} of block {} from peer {}", poll, block_id, self.peer.id);
        metrics::counter!("ledger_polls_scheduled_total", 1);

        *slot = PollSlot::Running {
            poll,
            block_id,
            handle,
            cancel,
        };
        true
    }

    /// Non-blocking look at the current poll.
    pub fn try_reap(&self) -> Reap {
        let mut slot = lock(&self.slot);
        match &mut *slot {
            PollSlot::Empty => Reap::Idle,
            PollSlot::Done {
                poll,
                block_id,
                outcome,
            } => Reap::Done {
                poll: *poll,
                block_id: *block_id,
                outcome: outcome.clone(),
            },
            PollSlot::Running {
                poll,
                block_id,
                handle,
                ..
            } => {
                if !handle.is_finished() {
                    return Reap::InFlight;
                }
                let outcome = match handle.now_or_never() {
                    None => return Reap::InFlight,
                    Some(Ok(outcome)) => outcome,
                    Some(Err(e)) if e.is_cancelled() => PollOutcome::Cancelled,
                    Some(Err(e)) => PollOutcome::TaskFailed(e.to_string()),
                };
                let (poll, block_id) = (*poll, *block_id);
                *slot = PollSlot::Done {
                    poll,
                    block_id,
                    outcome: outcome.clone(),
                };
                Reap::Done {
                    poll,
                    block_id,
                    outcome,
                }
            }
        }
    }

    /// Cancels the outstanding poll, if any, and waits for its task to end.
    /// Any unreaped outcome is discarded.
    pub async fn cancel_poll(&self) {
        let prev = std::mem::replace(&mut *lock(&self.slot), PollSlot::Empty);
        if let PollSlot::Running { poll, handle, cancel, .. } = prev {
            cancel.cancel();
            if let Err(e) = handle.await {
                tracing::warn!("Poll #{} of peer {} ended abnormally: {}", poll, self.peer.id, e);
            }
        }
    }

    /// The operator "clear error" action: drops any poll and returns to idle.
    pub async fn reset(&self) {
        self.cancel_poll().await;
        let mut s = lock(&self.shared);
        s.status = ConnectionStatus::Idle;
        s.error = None;
        tracing::info!("Peer {} connection reset", self.peer.id);
    }

    pub fn set_data_error(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!("Peer {} suspended, data error: {}", self.peer.id, reason);
        metrics::counter!("ledger_data_errors_total", 1);
        let mut s = lock(&self.shared);
        s.status = ConnectionStatus::DataError;
        s.error = Some(reason);
    }

    pub fn set_internal_error(&self, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::error!("Peer {} suspended, internal error: {}", self.peer.id, reason);
        let mut s = lock(&self.shared);
        s.status = ConnectionStatus::InternalError;
        s.error = Some(reason);
    }

    pub fn status(&self) -> ConnectionStatus {
        lock(&self.shared).status
    }

    pub fn last_error(&self) -> Option<String> {
        lock(&self.shared).error.clone()
    }

    pub fn view(&self) -> PeerStatusView {
        let s = lock(&self.shared);
        PeerStatusView {
            id: self.peer.id,
            address: self.peer.address.clone(),
            status: s.status.label().to_string(),
            error: s.error.clone(),
        }
    }
}

/// One connection per remote peer of a registry.
pub struct ConnectionSet<T: PeerTransport> {
    conns: BTreeMap<PeerId, Arc<PeerConnection<T>>>,
}

impl<T: PeerTransport> Clone for ConnectionSet<T> {
    fn clone(&self) -> Self {
        Self {
            conns: self.conns.clone(),
        }
    }
}

impl<T: PeerTransport> ConnectionSet<T> {
    pub async fn connect(registry: &PeerRegistry, transport: Arc<T>) -> Self {
        let mut conns = BTreeMap::new();
        for peer in registry.remotes() {
            let conn = PeerConnection::connect(peer.clone(), registry.self_id(), transport.clone()).await;
            conns.insert(peer.id, Arc::new(conn));
        }
        Self { conns }
    }

    pub fn from_connections(conns: impl IntoIterator<Item = PeerConnection<T>>) -> Self {
        Self {
            conns: conns.into_iter().map(|c| (c.id(), Arc::new(c))).collect(),
        }
    }

    pub fn get(&self, id: PeerId) -> Option<&Arc<PeerConnection<T>>> {
        self.conns.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<PeerConnection<T>>> {
        self.conns.values()
    }

    pub fn len(&self) -> usize {
        self.conns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.is_empty()
    }

    /// Cancels every outstanding poll.
    pub async fn shutdown(&self) {
        for conn in self.conns.values() {
            conn.cancel_poll().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::testing::{Reply, ScriptedTransport};
    use ledger_kernel::types::amount::Amount;
    use std::time::Duration;
    use tokio::sync::Notify;

    const URL: &str = "http://peer-2.test:7000";

    fn peer() -> Peer {
        Peer {
            id: PeerId(2),
            address: URL.to_string(),
        }
    }

    fn conn(transport: &Arc<ScriptedTransport>) -> PeerConnection<ScriptedTransport> {
        PeerConnection::with_addrs(peer(), PeerId(1), transport.clone(), Vec::new())
    }

    fn row(seq: u64) -> ArchiveRow {
        ArchiveRow {
            peer_id: PeerId(2),
            seq,
            typ: 1,
            acct: "a".to_string(),
            name: String::new(),
            remark: String::new(),
            amt: Amount(1),
            stamp: 0,
        }
    }

    async fn reap_done(c: &PeerConnection<ScriptedTransport>) -> Reap {
        for _ in 0..1000 {
            match c.try_reap() {
                Reap::InFlight => tokio::task::yield_now().await,
                other => return other,
            }
        }
        panic!("poll never completed");
    }

    #[tokio::test]
    async fn test_reap_before_any_poll_is_idle() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Status(204, Vec::new())));
        let c = conn(&transport);
        assert_eq!(c.try_reap(), Reap::Idle);
        assert_eq!(c.status(), ConnectionStatus::Idle);
        assert_eq!(transport.request_count(), 0);
    }

    #[tokio::test]
    async fn test_second_schedule_while_in_flight_is_noop() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(ScriptedTransport::new(Reply::Status(204, Vec::new())));
        transport.push(URL, Reply::Gated(gate.clone(), 204, Vec::new()));
        let c = conn(&transport);

        assert!(c.schedule_poll(0));
        assert!(!c.schedule_poll(0));
        assert_eq!(c.try_reap(), Reap::InFlight);

        gate.notify_one();
        let done = reap_done(&c).await;
        assert!(matches!(done, Reap::Done { poll: 1, block_id: 0, outcome: PollOutcome::NoContent }));
        assert_eq!(transport.request_count(), 1);
        assert_eq!(c.status(), ConnectionStatus::Normal);
    }

    #[tokio::test]
    async fn test_data_error_suspends_polling() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Status(204, Vec::new())));
        let c = conn(&transport);

        c.set_data_error("gap");
        assert!(!c.schedule_poll(4));
        assert!(!c.schedule_poll(5));
        tokio::task::yield_now().await;
        assert_eq!(transport.request_count(), 0);
        assert_eq!(c.view().status, "data error");
        assert_eq!(c.last_error().as_deref(), Some("gap"));

        c.reset().await;
        assert_eq!(c.status(), ConnectionStatus::Idle);
        assert!(c.schedule_poll(4));
        reap_done(&c).await;
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test]
    async fn test_poll_sends_routing_headers_and_parses_rows() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Status(204, Vec::new())));
        transport.push(URL, Reply::json(&vec![row(5000), row(5001)]));
        let c = conn(&transport);

        assert!(c.schedule_poll(5));
        match reap_done(&c).await {
            Reap::Done { outcome: PollOutcome::Rows(rows), block_id, .. } => {
                assert_eq!(block_id, 5);
                assert_eq!(rows.iter().map(|r| r.seq).collect::<Vec<_>>(), vec![5000, 5001]);
            }
            other => panic!("unexpected {:?}", other),
        }

        let sent = transport.requests_to(URL);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].path, ONPOLL_PATH);
        assert_eq!(sent[0].header(X_FROM), Some("1"));
        assert_eq!(sent[0].header(X_PEER_ID), Some("2"));
        assert_eq!(sent[0].header(X_BLOCK_ID), Some("5"));
    }

    #[tokio::test]
    async fn test_status_follows_response_codes() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Status(204, Vec::new())));
        transport.push(URL, Reply::Status(500, Vec::new()));
        transport.push(URL, Reply::Status(418, Vec::new()));
        transport.push(URL, Reply::Fail("connection refused".to_string()));
        transport.push(URL, Reply::Status(200, b"not json".to_vec()));
        let c = conn(&transport);

        c.schedule_poll(0);
        assert!(matches!(reap_done(&c).await, Reap::Done { outcome: PollOutcome::PeerFailure, .. }));
        assert_eq!(c.status(), ConnectionStatus::PeerError);

        c.schedule_poll(0);
        assert!(matches!(reap_done(&c).await, Reap::Done { outcome: PollOutcome::Other(418), .. }));
        assert_eq!(c.status(), ConnectionStatus::PeerError);

        c.schedule_poll(0);
        assert!(matches!(reap_done(&c).await, Reap::Done { outcome: PollOutcome::NetworkFailure(_), .. }));
        assert_eq!(c.status(), ConnectionStatus::NetworkError);

        c.schedule_poll(0);
        assert!(matches!(reap_done(&c).await, Reap::Done { outcome: PollOutcome::Malformed(_), .. }));
        assert_eq!(c.status(), ConnectionStatus::NetworkError);
    }

    #[tokio::test]
    async fn test_completed_outcome_is_stable_until_next_schedule() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Status(204, Vec::new())));
        let c = conn(&transport);

        c.schedule_poll(3);
        let first = reap_done(&c).await;
        assert_eq!(c.try_reap(), first);
        assert_eq!(c.try_reap(), first);

        c.schedule_poll(3);
        let second = reap_done(&c).await;
        assert!(matches!(second, Reap::Done { poll: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_network_error_and_recovers() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Status(204, Vec::new())));
        transport.push(URL, Reply::Hang);
        let c = conn(&transport);

        assert!(c.schedule_poll(4));
        tokio::task::yield_now().await;
        assert_eq!(c.try_reap(), Reap::InFlight);

        tokio::time::sleep(REQUEST_TIMEOUT + Duration::from_millis(10)).await;
        assert!(matches!(reap_done(&c).await, Reap::Done { outcome: PollOutcome::NetworkFailure(_), .. }));
        assert_eq!(c.status(), ConnectionStatus::NetworkError);

        assert!(c.schedule_poll(4));
        assert!(matches!(reap_done(&c).await, Reap::Done { poll: 2, outcome: PollOutcome::NoContent, .. }));
        assert_eq!(c.status(), ConnectionStatus::Normal);
        assert_eq!(transport.request_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_reply_within_timeout_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Status(204, Vec::new())));
        transport.push(URL, Reply::Delayed(REQUEST_TIMEOUT / 2, 200, serde_json::to_vec(&vec![row(4000)]).unwrap()));
        let c = conn(&transport);

        assert!(c.schedule_poll(4));
        tokio::task::yield_now().await;
        assert_eq!(c.try_reap(), Reap::InFlight);

        tokio::time::sleep(REQUEST_TIMEOUT / 2 + Duration::from_millis(10)).await;
        match reap_done(&c).await {
            Reap::Done { outcome: PollOutcome::Rows(rows), .. } => assert_eq!(rows, vec![row(4000)]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(c.status(), ConnectionStatus::Normal);
    }

    #[tokio::test]
    async fn test_cancel_poll_awaits_task() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Hang));
        let c = conn(&transport);

        c.schedule_poll(0);
        c.cancel_poll().await;
        assert_eq!(c.try_reap(), Reap::Idle);
        assert_eq!(c.status(), ConnectionStatus::Idle);
        assert!(c.schedule_poll(0));
    }

    #[tokio::test]
    async fn test_completion_does_not_lift_suspension() {
        let gate = Arc::new(Notify::new());
        let transport = Arc::new(ScriptedTransport::new(Reply::Status(204, Vec::new())));
        transport.push(URL, Reply::Gated(gate.clone(), 204, Vec::new()));
        let c = conn(&transport);

        c.schedule_poll(0);
        c.set_internal_error("disk full");
        gate.notify_one();
        reap_done(&c).await;
        assert_eq!(c.status(), ConnectionStatus::InternalError);
    }

    #[test]
    fn test_remote_addr_check() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Hang));
        let unresolved = PeerConnection::with_addrs(peer(), PeerId(1), transport.clone(), Vec::new());
        assert!(!unresolved.is_remote_addr("203.0.113.66".parse().unwrap()));
        assert!(!unresolved.is_remote_addr("127.0.0.1".parse().unwrap()));

        let pinned = PeerConnection::with_addrs(peer(), PeerId(1), transport, vec!["10.0.0.2".parse().unwrap()]);
        assert!(pinned.is_remote_addr("10.0.0.2".parse().unwrap()));
        assert!(!pinned.is_remote_addr("10.0.0.9".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_connect_resolves_literal_address() {
        let transport = Arc::new(ScriptedTransport::new(Reply::Hang));
        let p = Peer {
            id: PeerId(3),
            address: "http://127.0.0.1:7003".to_string(),
        };
        let c = PeerConnection::connect(p, PeerId(1), transport).await;
        assert_eq!(c.addrs(), &["127.0.0.1".parse::<IpAddr>().unwrap()]);
    }
}
