//! Process exit codes for each error kind.

use std::process::ExitCode;

use tx_engine::{ErrorKind, TxError};

/// Exit code for a failure of `kind`. Codes 1 and 2 stay reserved for panics
/// and argument errors reported by clap.
pub fn code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Configuration => 10,
        ErrorKind::InvalidInput => 11,
        ErrorKind::ChainId => 12,
        ErrorKind::NonceFetch => 13,
        ErrorKind::FeePolicy => 14,
        ErrorKind::GasEstimation => 15,
        ErrorKind::Signing => 16,
        ErrorKind::Encoding => 17,
        ErrorKind::Decoding => 18,
        ErrorKind::Network => 19,
        ErrorKind::ReplacementRejected => 20,
        ErrorKind::Rejected => 21,
        ErrorKind::SubmitUncertain => 22,
        ErrorKind::DeadlineExceeded => 23,
        ErrorKind::WatchClosed => 24,
    }
}

/// Prints `err` with its stable label and returns the matching exit code.
pub fn report(err: &TxError) -> ExitCode {
    let kind = err.kind();
    eprintln!("error[{}]: {err}", kind.code());
    if let TxError::SubmitUncertain { hash, .. } = err {
        eprintln!("note: the transaction may still be mined; check {hash:#x} before resending");
    }
    ExitCode::from(code_for(kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_kind_has_a_distinct_code() {
        let codes: HashSet<u8> = ErrorKind::ALL.iter().map(|k| code_for(*k)).collect();
        assert_eq!(codes.len(), ErrorKind::ALL.len());
        assert!(codes.iter().all(|c| *c > 2));
    }
}
