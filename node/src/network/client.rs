// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use ledger_kernel::types::amount::Amount;
use ledger_kernel::types::id::EntryId;

use crate::api::EnterResponse;
use crate::errors::EngineError;
use crate::network::transport::PeerTransport;
use crate::network::{ENTER_PATH, X_ACCOUNT, X_AMOUNT, X_NAME, X_REMARK};

/// Queues an entry on a remote peer and returns the id it assigned.
pub async fn submit_entry<T: PeerTransport>(
    transport: &T,
    base_url: &str,
    acct: &str,
    name: &str,
    remark: &str,
    amount: Amount,
) -> Result<EntryId, EngineError> {
    let headers = vec![
        (X_ACCOUNT, acct.to_string()),
        (X_NAME, name.to_string()),
        (X_REMARK, remark.to_string()),
        (X_AMOUNT, amount.to_string()),
    ];
    let resp = transport
        .post(base_url, ENTER_PATH, headers, Vec::new())
        .await
        .map_err(|e| EngineError::Network(e.to_string()))?;

    if resp.status != 200 {
        return Err(EngineError::Network(format!("Enter request failed: {}", resp.status)));
    }

    let parsed: EnterResponse = serde_json::from_slice(&resp.body)
        .map_err(|e| EngineError::Network(e.to_string()))?;
    Ok(parsed.id)
}
