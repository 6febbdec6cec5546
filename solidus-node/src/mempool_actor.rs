//! The same single-writer-task wrapping applied to `Mempool` (`spec.md`
//! §5's table: "Mempool | one mempool task | broadcasters, wallet"), so
//! peer connections and the miner submit transactions through a handle
//! instead of sharing a `&mut Mempool`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use solidus_chain::block::Height;
use solidus_chain::parameters::ChainParams;
use solidus_chain::transaction::{Hash as TxHash, Transaction};
use solidus_mempool::{Mempool, MempoolEntry, MempoolError, MempoolEvent};
use solidus_state::SharedStore;

const COMMAND_CHANNEL_CAPACITY: usize = 512;

enum Command {
    ProcessTx { height: Height, now: DateTime<Utc>, tx: Arc<Transaction>, reply: oneshot::Sender<Result<bool, MempoolError>> },
    RemoveTransaction { tx_hash: TxHash, reply: oneshot::Sender<bool> },
    ExpireOrphans { now: DateTime<Utc>, reply: oneshot::Sender<usize> },
    Subscribe { reply: oneshot::Sender<tokio::sync::broadcast::Receiver<MempoolEvent>> },
    EntriesByFeeRate { reply: oneshot::Sender<Vec<MempoolEntry>> },
    Len { reply: oneshot::Sender<usize> },
}

#[derive(Clone)]
pub struct MempoolHandle {
    commands: mpsc::Sender<Command>,
}

impl MempoolHandle {
    pub fn spawn(params: ChainParams, store: SharedStore) -> MempoolHandle {
        let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        tokio::spawn(run(params, store, Mempool::new(), rx));
        MempoolHandle { commands: tx }
    }

    pub async fn process_tx(&self, height: Height, now: DateTime<Utc>, tx: Arc<Transaction>) -> Result<bool, MempoolError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::ProcessTx { height, now, tx, reply })
            .await
            .expect("mempool task outlives its handles");
        response.await.expect("mempool task never drops a reply without answering")
    }

    pub async fn remove_transaction(&self, tx_hash: TxHash) -> bool {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::RemoveTransaction { tx_hash, reply }).await.expect("mempool task outlives its handles");
        response.await.unwrap_or(false)
    }

    pub async fn expire_orphans(&self, now: DateTime<Utc>) -> usize {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::ExpireOrphans { now, reply }).await.expect("mempool task outlives its handles");
        response.await.unwrap_or(0)
    }

    pub async fn subscribe(&self) -> tokio::sync::broadcast::Receiver<MempoolEvent> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Subscribe { reply }).await.expect("mempool task outlives its handles");
        response.await.expect("mempool task never drops a reply without answering")
    }

    pub async fn entries_by_fee_rate(&self) -> Vec<MempoolEntry> {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::EntriesByFeeRate { reply }).await.expect("mempool task outlives its handles");
        response.await.unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        let (reply, response) = oneshot::channel();
        self.commands.send(Command::Len { reply }).await.expect("mempool task outlives its handles");
        response.await.unwrap_or(0)
    }
}

async fn run(params: ChainParams, store: SharedStore, mut mempool: Mempool, mut commands: mpsc::Receiver<Command>) {
    while let Some(command) = commands.recv().await {
        match command {
            Command::ProcessTx { height, now, tx, reply } => {
                let result = mempool.process_tx(&params, store.as_ref(), height, now, tx);
                if result.is_ok() {
                    metrics::gauge!("mempool.size", mempool.len() as _);
                }
                let _ = reply.send(result);
            }
            Command::RemoveTransaction { tx_hash, reply } => {
                let _ = reply.send(mempool.remove_transaction(&tx_hash));
            }
            Command::ExpireOrphans { now, reply } => {
                let _ = reply.send(mempool.expire_orphans(now));
            }
            Command::Subscribe { reply } => {
                let _ = reply.send(mempool.subscribe());
            }
            Command::EntriesByFeeRate { reply } => {
                let entries = mempool.entries_by_fee_rate().into_iter().cloned().collect();
                let _ = reply.send(entries);
            }
            Command::Len { reply } => {
                let _ = reply.send(mempool.len());
            }
        }
    }
}
