use alloy_primitives::B256;
use eth_core::SignedTransaction;
use eth_rpc::{ChainClient, RpcError};

use crate::error::TxError;

/// Node messages meaning a transaction with this nonce is already pending.
const REPLACEMENT_MARKERS: &[&str] = &["replacement transaction underpriced", "already known"];

/// Submits `signed` and returns its hash once the node accepts it into the
/// pending pool.
///
/// Transport failures are reported as [`TxError::SubmitUncertain`]: the
/// transaction may have reached the node, so it must not be blindly resent.
pub async fn submit<C>(client: &C, signed: &SignedTransaction) -> Result<B256, TxError>
where
    C: ChainClient + ?Sized,
{
    let local_hash = signed.hash();

    let node_hash = client.submit(signed.raw()).await.map_err(|e| classify(local_hash, e))?;

    if node_hash != local_hash {
        tracing::warn!(%local_hash, %node_hash, "node reported a different transaction hash");
        return Err(TxError::Rejected(format!(
            "node reported hash {node_hash}, expected {local_hash}"
        )));
    }

    tracing::info!(tx_hash = %local_hash, nonce = signed.tx().nonce, "transaction submitted");
    Ok(local_hash)
}

fn classify(hash: B256, err: RpcError) -> TxError {
    let Some(message) = err.node_message().map(str::to_owned) else {
        tracing::error!(tx_hash = %hash, error = %err, "submission outcome unknown");
        return TxError::SubmitUncertain { hash, source: err };
    };
    let lower = message.to_lowercase();
    if REPLACEMENT_MARKERS.iter().any(|m| lower.contains(m)) {
        tracing::warn!(tx_hash = %hash, %message, "replacement rejected");
        TxError::ReplacementRejected(message)
    } else {
        tracing::warn!(tx_hash = %hash, %message, "transaction rejected");
        TxError::Rejected(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn protocol(message: &str) -> RpcError {
        RpcError::Protocol { code: -32000, message: message.into() }
    }

    #[test]
    fn underpriced_replacement_classified() {
        let err = classify(B256::ZERO, protocol("replacement transaction underpriced"));
        assert!(matches!(err, TxError::ReplacementRejected(_)));
    }

    #[test]
    fn already_known_classified_case_insensitively() {
        let err = classify(B256::ZERO, protocol("ALREADY KNOWN"));
        assert!(matches!(err, TxError::ReplacementRejected(m) if m == "ALREADY KNOWN"));
    }

    #[test]
    fn other_rejections_keep_message_verbatim() {
        let err = classify(B256::ZERO, protocol("insufficient funds for gas * price + value"));
        assert!(matches!(err, TxError::Rejected(m) if m == "insufficient funds for gas * price + value"));
    }

    #[test]
    fn transport_failures_are_uncertain() {
        let hash = B256::repeat_byte(7);
        for source in [
            RpcError::Timeout(Duration::from_secs(10)),
            RpcError::Transient("connection reset".into()),
            RpcError::InvalidResponse("truncated".into()),
        ] {
            match classify(hash, source) {
                TxError::SubmitUncertain { hash: h, .. } => assert_eq!(h, hash),
                other => panic!("expected uncertain, got {other:?}"),
            }
        }
    }
}
