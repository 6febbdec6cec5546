//! Drives `solidus_wallet::Wallet` off the chain's connect/disconnect
//! broadcast and the mempool's event channel (`spec.md` §4.10/§5): the
//! wallet itself only exposes synchronous handlers, this task is the
//! subscriber loop that calls them in order as events arrive.

use solidus_consensus::ChainEvent;
use solidus_wallet::Wallet;

use crate::chain_actor::ChainHandle;
use crate::mempool_actor::MempoolHandle;

pub async fn run(wallet: Wallet, chain: ChainHandle, mempool: MempoolHandle) {
    let mut chain_events = chain.subscribe().await;
    let mut mempool_events = mempool.subscribe().await;

    loop {
        tokio::select! {
            event = chain_events.recv() => {
                match event {
                    Ok(ChainEvent::Connected(block)) => {
                        if let Err(err) = wallet.connect(&block) {
                            tracing::error!(error = %err, "wallet failed to index connected block");
                        }
                    }
                    Ok(ChainEvent::Disconnected(block)) => {
                        if let Err(err) = wallet.disconnect(&block) {
                            tracing::error!(error = %err, "wallet failed to unindex disconnected block");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "wallet indexer fell behind the chain event stream");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
            event = mempool_events.recv() => {
                match event {
                    Ok(event) => {
                        if let Err(err) = wallet.on_mempool_event(event) {
                            tracing::error!(error = %err, "wallet failed to record mempool event");
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "wallet indexer fell behind the mempool event stream");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        }
    }
}
