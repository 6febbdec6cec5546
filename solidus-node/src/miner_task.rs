//! The miner (`spec.md` §4.9): rebuilds a template whenever the tip or the
//! mempool changes, then searches for a winning nonce on a blocking task
//! since the PoW loop is CPU-bound rather than suspension-bound (§5).

use std::time::Duration;

use chrono::Utc;

use solidus_chain::parameters::ChainParams;
use solidus_chain::txio::ControlProgram;
use solidus_miner::{pow, WorkQueue};

use crate::chain_actor::ChainHandle;
use crate::mempool_actor::MempoolHandle;

/// How many nonces a single blocking search attempt tries before the task
/// yields back and the loop rebuilds against a fresh tip/mempool snapshot.
const ATTEMPTS_PER_TEMPLATE: u64 = 200_000;

pub async fn run(params: ChainParams, chain: ChainHandle, mempool: MempoolHandle, coinbase_program: ControlProgram, work_queue: std::sync::Arc<tokio::sync::Mutex<WorkQueue>>) {
    let mut chain_events = chain.subscribe().await;

    loop {
        let candidates: Vec<_> = mempool.entries_by_fee_rate().await.into_iter().map(|entry| entry.tx).collect();
        let template = chain.build_template(params, candidates, coinbase_program.clone(), Utc::now()).await;

        for dropped in &template.dropped {
            mempool.remove_transaction(*dropped).await;
        }

        work_queue.lock().await.set_template(template.block.clone());

        let mut block = template.block;
        let solved = tokio::task::spawn_blocking(move || {
            let found = pow::search(&mut block, ATTEMPTS_PER_TEMPLATE);
            found.map(|_| block)
        })
        .await
        .expect("mining task does not panic");

        if let Some(solved_block) = solved {
            match chain.process_block(solved_block, Utc::now()).await {
                Ok(_) => tracing::info!("mined a new block"),
                Err(err) => tracing::warn!(error = %err, "locally mined block was rejected"),
            }
            continue;
        }

        // No solution within this attempt budget: wait for either the tip
        // to move or a short timeout, then rebuild against fresh state.
        tokio::select! {
            _ = chain_events.recv() => {}
            _ = tokio::time::sleep(Duration::from_millis(50)) => {}
        }
    }
}

