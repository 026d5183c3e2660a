// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ledger_kernel::error::KernelError;
use ledger_kernel::types::id::PeerId;
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Kernel error: {0}")]
    Kernel(KernelError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unknown peer {0}")]
    UnknownPeer(PeerId),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Network error: {0}")]
    Network(String),
}

impl IntoResponse for EngineError {
    fn into_response(self) -> Response {
        let status = match &self {
            EngineError::Kernel(_) | EngineError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            EngineError::UnknownPeer(_) => StatusCode::NOT_FOUND,
            EngineError::Forbidden(_) => StatusCode::FORBIDDEN,
            EngineError::Network(_) => StatusCode::BAD_GATEWAY,
            EngineError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("Request failed: {}", self);
        }

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<KernelError> for EngineError {
    fn from(e: KernelError) -> Self {
        EngineError::Kernel(e)
    }
}
