// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Path, Request as AxumRequest, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ledger_kernel::types::amount::Amount;
use ledger_kernel::types::id::PeerId;

use crate::api::{EnterResponse, PeerStatusView};
use crate::connection::ConnectionSet;
use crate::errors::EngineError;
use crate::ledger::Ledger;
use crate::network::{PeerTransport, ENTER_PATH, ONPOLL_PATH, X_ACCOUNT, X_AMOUNT, X_BLOCK_ID, X_FROM, X_NAME, X_PEER_ID, X_REMARK};
use crate::store::LedgerDb;

pub struct AppState<T: PeerTransport, D: LedgerDb> {
    pub ledger: Arc<Ledger<D>>,
    pub conns: ConnectionSet<T>,
}

impl<T: PeerTransport, D: LedgerDb> Clone for AppState<T, D> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            conns: self.conns.clone(),
        }
    }
}

async fn auth_guard(
    State(token): State<Arc<String>>,
    req: AxumRequest,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "));

    match provided {
        Some(p) if p == token.as_str() => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

pub fn build_router<T: PeerTransport, D: LedgerDb>(state: AppState<T, D>, auth_token: Option<String>) -> Router {
    let mut admin = Router::new()
        .route("/peers", get(list_peers::<T, D>))
        .route("/peers/:id/clear", post(clear_peer::<T, D>));

    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required for admin routes");
        admin = admin.route_layer(from_fn_with_state(Arc::new(token), auth_guard));
    } else {
        tracing::warn!("Auth Disabled: No token configured");
    }

    Router::new()
        .route(ONPOLL_PATH, get(onpoll::<T, D>))
        .route(ENTER_PATH, post(enter::<T, D>))
        .route("/metrics", get(metrics_handler))
        .merge(admin)
        .with_state(state)
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn required<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, EngineError> {
    header(headers, name).ok_or_else(|| EngineError::InvalidInput(format!("missing header {}", name)))
}

fn parse_header<V: std::str::FromStr>(headers: &HeaderMap, name: &str) -> Result<V, EngineError> {
    required(headers, name)?
        .trim()
        .parse()
        .map_err(|_| EngineError::InvalidInput(format!("invalid header {}", name)))
}

/// Serves this node's own partition, one block at a time.
async fn onpoll<T: PeerTransport, D: LedgerDb>(
    State(state): State<AppState<T, D>>,
    remote: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Response, EngineError> {
    let from = PeerId(parse_header(&headers, X_FROM)?);
    let target = PeerId(parse_header(&headers, X_PEER_ID)?);
    let block_id: u64 = parse_header(&headers, X_BLOCK_ID)?;

    let self_id = state.ledger.self_id();
    if target != self_id {
        return Err(EngineError::UnknownPeer(target));
    }

    let conn = state
        .conns
        .get(from)
        .ok_or_else(|| EngineError::Forbidden(format!("peer {} is not registered", from)))?;
    if let Some(ConnectInfo(addr)) = remote {
        if !conn.is_remote_addr(addr.ip()) {
            tracing::warn!("Rejected poll claiming to be peer {} from {}", from, addr);
            return Err(EngineError::Forbidden(format!("address {} does not belong to peer {}", addr.ip(), from)));
        }
    }

    let rows = state.ledger.block(self_id, block_id)?;
    tracing::debug!("Serving {} rows of block {} to peer {}", rows.len(), block_id, from);
    if rows.is_empty() {
        Ok(StatusCode::NO_CONTENT.into_response())
    } else {
        Ok(Json(rows).into_response())
    }
}

async fn enter<T: PeerTransport, D: LedgerDb>(
    State(state): State<AppState<T, D>>,
    headers: HeaderMap,
) -> Result<Json<EnterResponse>, EngineError> {
    let acct = required(&headers, X_ACCOUNT)?;
    let name = header(&headers, X_NAME).unwrap_or_default();
    let remark = header(&headers, X_REMARK).unwrap_or_default();
    let amt: Amount = parse_header(&headers, X_AMOUNT)?;

    let id = state.ledger.enter(acct, name, remark, amt)?;
    Ok(Json(EnterResponse { id }))
}

async fn list_peers<T: PeerTransport, D: LedgerDb>(State(state): State<AppState<T, D>>) -> Json<Vec<PeerStatusView>> {
    Json(state.conns.iter().map(|c| c.view()).collect())
}

async fn clear_peer<T: PeerTransport, D: LedgerDb>(
    State(state): State<AppState<T, D>>,
    Path(id): Path<i16>,
) -> Result<Json<PeerStatusView>, EngineError> {
    let conn = state.conns.get(PeerId(id)).ok_or(EngineError::UnknownPeer(PeerId(id)))?;
    conn.reset().await;
    Ok(Json(conn.view()))
}

async fn metrics_handler() -> String {
    crate::telemetry::get_metrics()
}
