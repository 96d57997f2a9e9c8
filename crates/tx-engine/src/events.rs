//! Historical lookup and live polling of ERC-20 `Transfer` events.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use eth_core::events::{address_topic, Log, TransferEvent, TRANSFER_TOPIC};
use eth_rpc::{ChainState, LogFilter};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::TxError;

/// Events buffered between the poller and a slow consumer.
const WATCH_CHANNEL_CAPACITY: usize = 256;

fn transfer_filter(token: Address, from: Option<Address>, to: Option<Address>, range: (u64, u64)) -> LogFilter {
    LogFilter::new(range.0, range.1).address(token).topics(vec![
        Some(TRANSFER_TOPIC),
        from.map(address_topic),
        to.map(address_topic),
    ])
}

/// Logs that carry the Transfer topic but not the ERC-20 layout (for example
/// ERC-721 transfers, which index the token id) are skipped.
fn decode_transfers(logs: &[Log]) -> Vec<TransferEvent> {
    logs.iter()
        .filter_map(|log| match TransferEvent::from_log(log) {
            Ok(event) => Some(event),
            Err(e) => {
                tracing::debug!(token = %log.address, error = %e, "skipping non-ERC-20 transfer log");
                None
            }
        })
        .collect()
}

/// Transfers of `token` in the last `lookback_blocks` blocks, optionally
/// filtered by sender and recipient.
pub async fn transfer_history<S>(
    client: &S,
    token: Address,
    from: Option<Address>,
    to: Option<Address>,
    lookback_blocks: u64,
) -> Result<Vec<TransferEvent>, TxError>
where
    S: ChainState + ?Sized,
{
    let head = client.block_number().await.map_err(TxError::Network)?;
    let start = head.saturating_sub(lookback_blocks);

    let logs = client
        .logs(&transfer_filter(token, from, to, (start, head)))
        .await
        .map_err(TxError::Network)?;
    let events = decode_transfers(&logs);

    tracing::info!(%token, from_block = start, to_block = head, count = events.len(), "transfer history fetched");
    Ok(events)
}

/// Narrows which transfers a watch delivers.
///
/// `from` and `to` become topic filters on the node; `min_value` is applied
/// locally since logs cannot be filtered by data.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferFilter {
    pub from: Option<Address>,
    pub to: Option<Address>,
    pub min_value: U256,
}

impl TransferFilter {
    fn admits(&self, event: &TransferEvent) -> bool {
        event.value >= self.min_value
    }
}

/// Handle to a running transfer watch.
///
/// Events arrive through [`TransferWatch::next`]. The channel closes when the
/// watch stops for any reason: [`TransferWatch::unsubscribe`], a remote
/// failure, or dropping the handle.
pub struct TransferWatch {
    events: mpsc::Receiver<TransferEvent>,
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<(), TxError>>,
}

impl TransferWatch {
    /// Next event, or `None` once the watch has stopped.
    pub async fn next(&mut self) -> Option<TransferEvent> {
        self.events.recv().await
    }

    /// Stops polling and waits for the background task to exit.
    ///
    /// Returns the remote error if the watch had already stopped on one.
    pub async fn unsubscribe(mut self) -> Result<(), TxError> {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.events.close();
        join(self.task).await
    }

    /// Waits for the watch to stop on its own and returns why.
    pub async fn closed(self) -> Result<(), TxError> {
        join(self.task).await
    }
}

async fn join(task: JoinHandle<Result<(), TxError>>) -> Result<(), TxError> {
    task.await.map_err(|e| TxError::WatchClosed(format!("watch task ended abnormally: {e}")))?
}

/// Starts polling `token` for transfers matching `filter` in blocks after the
/// current head.
pub fn watch_transfers<S>(
    client: Arc<S>,
    token: Address,
    filter: TransferFilter,
    poll_interval: Duration,
) -> TransferWatch
where
    S: ChainState + ?Sized + 'static,
{
    let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
    let (stop_tx, stop_rx) = oneshot::channel();
    let task = tokio::spawn(poll_loop(client, token, filter, poll_interval, tx, stop_rx));
    TransferWatch { events: rx, stop: Some(stop_tx), task }
}

async fn poll_loop<S>(
    client: Arc<S>,
    token: Address,
    filter: TransferFilter,
    poll_interval: Duration,
    events: mpsc::Sender<TransferEvent>,
    mut stop: oneshot::Receiver<()>,
) -> Result<(), TxError>
where
    S: ChainState + ?Sized,
{
    let mut next_block = match client.block_number().await {
        Ok(head) => head + 1,
        Err(e) => {
            tracing::warn!(%token, error = %e, "transfer watch failed to start");
            return Err(TxError::Network(e));
        }
    };
    tracing::info!(%token, from_block = next_block, ?filter, "transfer watch started");

    loop {
        tokio::select! {
            _ = &mut stop => {
                tracing::info!(%token, "transfer watch unsubscribed");
                return Ok(());
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        let head = client.block_number().await.map_err(|e| {
            tracing::warn!(%token, error = %e, "transfer watch stopped on remote error");
            TxError::Network(e)
        })?;
        if head < next_block {
            continue;
        }

        let logs = client
            .logs(&transfer_filter(token, filter.from, filter.to, (next_block, head)))
            .await
            .map_err(|e| {
                tracing::warn!(%token, error = %e, "transfer watch stopped on remote error");
                TxError::Network(e)
            })?;

        for event in decode_transfers(&logs).into_iter().filter(|e| filter.admits(e)) {
            if events.send(event).await.is_err() {
                tracing::info!(%token, "transfer watch receiver dropped");
                return Ok(());
            }
        }
        next_block = head + 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_positions_optional_topics() {
        let filter = transfer_filter(Address::repeat_byte(1), None, Some(Address::repeat_byte(2)), (5, 9));
        assert_eq!(filter.from_block, 5);
        assert_eq!(filter.to_block, 9);
        assert_eq!(filter.topics[0], Some(TRANSFER_TOPIC));
        assert_eq!(filter.topics[1], None);
        assert_eq!(filter.topics[2], Some(address_topic(Address::repeat_byte(2))));
    }

    #[test]
    fn non_erc20_logs_skipped() {
        let erc721 = Log {
            topics: vec![TRANSFER_TOPIC, Default::default(), Default::default(), Default::default()],
            ..Default::default()
        };
        assert!(decode_transfers(&[erc721]).is_empty());
    }

    #[test]
    fn min_value_is_inclusive() {
        let filter = TransferFilter { min_value: U256::from(100u64), ..Default::default() };
        let event = |value: u64| TransferEvent {
            token: Address::ZERO,
            from: Address::ZERO,
            to: Address::ZERO,
            value: U256::from(value),
            block_number: None,
            tx_hash: None,
            log_index: None,
        };
        assert!(!filter.admits(&event(99)));
        assert!(filter.admits(&event(100)));
        assert!(TransferFilter::default().admits(&event(0)));
    }
}
