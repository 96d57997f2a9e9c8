use alloy_primitives::B256;
use eth_core::EthError;
use eth_rpc::RpcError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::fee::FeeError;

/// Failure of a pipeline operation, named by the step that failed.
#[derive(Debug, Error)]
pub enum TxError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("chain id query failed: {0}")]
    ChainId(RpcError),

    #[error("nonce fetch failed: {0}")]
    NonceFetch(RpcError),

    #[error("fee policy failed: {0}")]
    FeePolicy(#[from] FeeError),

    #[error("gas estimation failed: {0}")]
    GasEstimation(String),

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("decoding failed: {0}")]
    Decoding(String),

    #[error("network error: {0}")]
    Network(RpcError),

    #[error("replacement rejected: {0}")]
    ReplacementRejected(String),

    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// The node may or may not have accepted the transaction.
    #[error("submission of {hash} uncertain: {source}")]
    SubmitUncertain { hash: B256, source: RpcError },

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("transfer watch closed: {0}")]
    WatchClosed(String),
}

/// Stable classification of a [`TxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Configuration,
    InvalidInput,
    ChainId,
    NonceFetch,
    FeePolicy,
    GasEstimation,
    Signing,
    Encoding,
    Decoding,
    Network,
    ReplacementRejected,
    Rejected,
    SubmitUncertain,
    DeadlineExceeded,
    WatchClosed,
}

impl ErrorKind {
    pub const ALL: [ErrorKind; 15] = [
        ErrorKind::Configuration,
        ErrorKind::InvalidInput,
        ErrorKind::ChainId,
        ErrorKind::NonceFetch,
        ErrorKind::FeePolicy,
        ErrorKind::GasEstimation,
        ErrorKind::Signing,
        ErrorKind::Encoding,
        ErrorKind::Decoding,
        ErrorKind::Network,
        ErrorKind::ReplacementRejected,
        ErrorKind::Rejected,
        ErrorKind::SubmitUncertain,
        ErrorKind::DeadlineExceeded,
        ErrorKind::WatchClosed,
    ];

    /// Machine-readable label, stable across releases.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::ChainId => "chain_id",
            ErrorKind::NonceFetch => "nonce_fetch",
            ErrorKind::FeePolicy => "fee_policy",
            ErrorKind::GasEstimation => "gas_estimation",
            ErrorKind::Signing => "signing",
            ErrorKind::Encoding => "encoding",
            ErrorKind::Decoding => "decoding",
            ErrorKind::Network => "network",
            ErrorKind::ReplacementRejected => "replacement_rejected",
            ErrorKind::Rejected => "rejected",
            ErrorKind::SubmitUncertain => "submit_uncertain",
            ErrorKind::DeadlineExceeded => "deadline_exceeded",
            ErrorKind::WatchClosed => "watch_closed",
        }
    }
}

impl TxError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TxError::Configuration(_) => ErrorKind::Configuration,
            TxError::InvalidInput(_) => ErrorKind::InvalidInput,
            TxError::ChainId(_) => ErrorKind::ChainId,
            TxError::NonceFetch(_) => ErrorKind::NonceFetch,
            TxError::FeePolicy(_) => ErrorKind::FeePolicy,
            TxError::GasEstimation(_) => ErrorKind::GasEstimation,
            TxError::Signing(_) => ErrorKind::Signing,
            TxError::Encoding(_) => ErrorKind::Encoding,
            TxError::Decoding(_) => ErrorKind::Decoding,
            TxError::Network(_) => ErrorKind::Network,
            TxError::ReplacementRejected(_) => ErrorKind::ReplacementRejected,
            TxError::Rejected(_) => ErrorKind::Rejected,
            TxError::SubmitUncertain { .. } => ErrorKind::SubmitUncertain,
            TxError::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            TxError::WatchClosed(_) => ErrorKind::WatchClosed,
        }
    }

    /// Whether repeating the whole operation may succeed.
    ///
    /// An uncertain submission is never retryable: the first attempt may
    /// already be pending.
    pub fn is_retryable(&self) -> bool {
        match self {
            TxError::ChainId(e) | TxError::NonceFetch(e) | TxError::Network(e) => e.is_retryable(),
            TxError::FeePolicy(FeeError::BaseFeeUnavailable(e)) => e.is_retryable(),
            TxError::DeadlineExceeded => true,
            _ => false,
        }
    }
}

impl From<EthError> for TxError {
    fn from(e: EthError) -> Self {
        match e {
            EthError::InvalidPrivateKey(_) | EthError::InvalidPublicKey(_) | EthError::SigningError(_) => {
                TxError::Signing(e.to_string())
            }
            EthError::InvalidAddress(_)
            | EthError::InvalidAmount(_)
            | EthError::UnsupportedChain(_)
            | EthError::TransactionBuildError(_) => TxError::InvalidInput(e.to_string()),
            EthError::EncodingError(_) => TxError::Encoding(e.to_string()),
            EthError::DecodingError(_) => TxError::Decoding(e.to_string()),
        }
    }
}

impl From<ConfigError> for TxError {
    fn from(e: ConfigError) -> Self {
        TxError::Configuration(e.to_string())
    }
}
