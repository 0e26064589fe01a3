//! # Peer Loops
//!
//! The four long-lived tasks of a peer: belief propagation, connection
//! maintenance, transaction buffering and committed-block execution.
//! They communicate only over bounded channels and cooperate on a
//! shutdown flag checked every iteration; there is no shared mutable
//! state beyond the peer core's whole-value record swap.

use crate::core::PeerCore;
use crate::message::{Message, MessageType};
use async_trait::async_trait;
use convex_consensus::peer_stakes;
use convex_types::{AccountKey, Record, Value};
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch, RwLock};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Milliseconds since the epoch; wall-clock input for blocks and order
/// timestamps. Only the peer layer reads the clock, never the core.
#[must_use]
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Outbound connection set shared between the connection manager and
/// the broadcasters.
pub type Connections = Arc<RwLock<HashMap<AccountKey, mpsc::Sender<Message>>>>;

/// Dials peers by key. The concrete transport lives outside the core;
/// tests wire channels directly.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Opens a connection to a peer, yielding its message inbox.
    async fn connect(&self, key: &AccountKey) -> Option<mpsc::Sender<Message>>;
}

async fn broadcast_belief(core: &PeerCore, connections: &Connections) {
    let belief = core.data().belief.clone();
    let message = Message::new(
        MessageType::Belief,
        Value::Record(Record::Belief(belief)),
    );
    let conns = connections.read().await;
    for (key, tx) in conns.iter() {
        if tx.send(message.clone()).await.is_err() {
            debug!(peer = %key, "connection closed during broadcast");
        }
    }
}

/// Belief propagator: drains incoming beliefs, merges, and rebroadcasts
/// with a minimum gap; periodically rebroadcasts the full belief to
/// tolerate lossy transport.
pub async fn run_belief_propagator(
    core: Arc<PeerCore>,
    mut incoming: mpsc::Receiver<convex_types::Belief>,
    connections: Connections,
    executor_notify: mpsc::Sender<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    let min_gap = Duration::from_millis(core.config().belief_broadcast_min_ms);
    let full = Duration::from_millis(core.config().full_broadcast_ms);
    let idle = Duration::from_millis(core.config().rebroadcast_idle_ms);
    let mut last_sent = Instant::now();
    let mut last_change = Instant::now();

    info!("belief propagator started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => continue,
            received = incoming.recv() => {
                let Some(first) = received else { break };
                let mut batch = vec![first];
                while let Ok(more) = incoming.try_recv() {
                    batch.push(more);
                }
                match core.merge_incoming(&batch, now_millis()) {
                    Ok((changed, _novelty)) => {
                        if changed {
                            last_change = Instant::now();
                            let _ = executor_notify.try_send(());
                            let since = last_sent.elapsed();
                            if since < min_gap {
                                sleep(min_gap - since).await;
                            }
                            broadcast_belief(&core, &connections).await;
                            last_sent = Instant::now();
                        }
                    }
                    Err(e) => warn!(error = %e, "belief merge store failure"),
                }
            }
            _ = sleep(idle) => {
                // Idle rebroadcast, and a full broadcast on the longer
                // period even while quiet.
                if last_sent.elapsed() >= idle || last_change.elapsed() >= full {
                    broadcast_belief(&core, &connections).await;
                    last_sent = Instant::now();
                }
            }
        }
    }
    info!("belief propagator stopped");
}

/// Transaction handler: buffers client-signed transactions and folds
/// them into proposed blocks on a fixed cadence.
pub async fn run_transaction_handler(
    core: Arc<PeerCore>,
    mut transactions: mpsc::Receiver<Value>,
    belief_loopback: mpsc::Sender<convex_types::Belief>,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = Duration::from_millis(core.config().block_interval_ms);
    let mut buffer: Vec<Value> = Vec::new();

    info!("transaction handler started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => continue,
            received = transactions.recv() => {
                match received {
                    Some(tx) => buffer.push(tx),
                    None => break,
                }
            }
            _ = sleep(interval) => {
                if buffer.is_empty() {
                    continue;
                }
                let batch = std::mem::take(&mut buffer);
                let count = batch.len();
                if let Err(e) = core.produce_block(batch, now_millis()) {
                    warn!(error = %e, "block production store failure");
                    continue;
                }
                debug!(transactions = count, "block proposed");
                // Trigger a merge round so the proposal enters the own
                // order pipeline immediately.
                let _ = belief_loopback.try_send(core.data().belief.clone());
            }
        }
    }
    info!("transaction handler stopped");
}

/// CVM executor: applies newly committed blocks whenever the consensus
/// point advances.
pub async fn run_executor(
    core: Arc<PeerCore>,
    mut notify: mpsc::Receiver<()>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("executor started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => continue,
            received = notify.recv() => {
                if received.is_none() {
                    break;
                }
                let executed = core.execute_committed();
                if executed > 0 {
                    debug!(executed, "committed blocks applied");
                }
            }
        }
    }
    info!("executor stopped");
}

/// Connection manager: keeps the outbound set close to the target,
/// preferring stake-weighted candidates and randomly dropping the
/// under-staked when over target.
pub async fn run_connection_manager(
    core: Arc<PeerCore>,
    transport: Arc<dyn Transport>,
    connections: Connections,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = Duration::from_millis(core.config().connection_interval_ms);
    let target = core.config().target_connections;
    let own_key = core.keypair().account_key();

    info!("connection manager started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = shutdown.changed() => continue,
            _ = sleep(interval) => {
                let (stakes, total) = peer_stakes(&core.data().state);
                let mut conns = connections.write().await;

                // Drop closed channels and, over target, one random
                // under-staked connection.
                conns.retain(|_, tx| !tx.is_closed());
                if conns.len() > target {
                    let median = median_stake(&stakes);
                    let victims: Vec<AccountKey> = conns
                        .keys()
                        .filter(|k| stakes.get(k).copied().unwrap_or(0) < median)
                        .copied()
                        .collect();
                    if !victims.is_empty() {
                        let pick = rand::thread_rng().gen_range(0..victims.len());
                        conns.remove(&victims[pick]);
                        debug!(peer = %victims[pick], "dropped under-staked connection");
                    }
                }

                // Add a stake-weighted candidate while under target.
                if conns.len() < target && total > 0 {
                    let candidates: Vec<(AccountKey, i64)> = stakes
                        .iter()
                        .filter(|(k, _)| **k != own_key && !conns.contains_key(*k))
                        .map(|(k, s)| (*k, *s))
                        .collect();
                    if let Some(key) = weighted_pick(&candidates) {
                        match transport.connect(&key).await {
                            Some(tx) => {
                                debug!(peer = %key, "connected");
                                conns.insert(key, tx);
                            }
                            None => debug!(peer = %key, "dial failed"),
                        }
                    }
                }
            }
        }
    }
    info!("connection manager stopped");
}

fn median_stake(stakes: &HashMap<AccountKey, i64>) -> i64 {
    if stakes.is_empty() {
        return 0;
    }
    let mut values: Vec<i64> = stakes.values().copied().collect();
    values.sort_unstable();
    values[values.len() / 2]
}

fn weighted_pick(candidates: &[(AccountKey, i64)]) -> Option<AccountKey> {
    let total: i64 = candidates.iter().map(|(_, s)| *s).sum();
    if total <= 0 {
        return None;
    }
    let mut roll = rand::thread_rng().gen_range(0..total);
    for (key, stake) in candidates {
        roll -= stake;
        if roll < 0 {
            return Some(*key);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PeerConfig;
    use convex_crypto::KeyPair;
    use convex_state::{genesis, GenesisConfig};
    use convex_store::MemoryStore;

    fn test_core() -> Arc<PeerCore> {
        let kp = KeyPair::from_seed([1u8; 32]);
        let state = genesis(&GenesisConfig::new(vec![kp.account_key()]));
        Arc::new(
            PeerCore::new(
                KeyPair::from_seed([1u8; 32]),
                Arc::new(MemoryStore::new()),
                state,
                PeerConfig {
                    block_interval_ms: 10,
                    rebroadcast_idle_ms: 20,
                    ..PeerConfig::default()
                },
            )
            .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_shutdown_stops_loops() {
        let core = test_core();
        let (_, shutdown_rx) = watch::channel(true);
        let (_belief_tx, belief_rx) = mpsc::channel(8);
        let (notify_tx, _notify_rx) = mpsc::channel(8);
        let connections: Connections = Arc::new(RwLock::new(HashMap::new()));
        // A loop that observes the raised flag returns promptly.
        tokio::time::timeout(
            Duration::from_secs(1),
            run_belief_propagator(core, belief_rx, connections, notify_tx, shutdown_rx),
        )
        .await
        .expect("propagator must stop on shutdown");
    }

    #[tokio::test]
    async fn test_transaction_handler_produces_block() {
        let core = test_core();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx_in, tx_rx) = mpsc::channel(8);
        let (loopback_tx, mut loopback_rx) = mpsc::channel(8);

        let handle = tokio::spawn(run_transaction_handler(
            core.clone(),
            tx_rx,
            loopback_tx,
            shutdown_rx,
        ));

        tx_in.send(Value::Long(1)).await.unwrap();
        // The handler folds the buffer into a block on its next tick.
        let belief = tokio::time::timeout(Duration::from_secs(1), loopback_rx.recv())
            .await
            .expect("block production")
            .expect("belief");
        assert_eq!(belief.orders().count(), 1);
        assert_eq!(core.own_order().unwrap().block_count(), 1);

        shutdown_tx.send(true).unwrap();
        let _ = handle.await;
    }

    #[tokio::test]
    async fn test_executor_applies_on_notify() {
        let core = test_core();
        core.produce_block(vec![], 1_000).unwrap();
        core.merge_incoming(&[], 1_001).unwrap();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (notify_tx, notify_rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_executor(core.clone(), notify_rx, shutdown_rx));

        notify_tx.send(()).await.unwrap();
        // Wait for the executor to catch up.
        for _ in 0..50 {
            if core.data().executed_point == 1 {
                break;
            }
            sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(core.data().executed_point, 1);

        shutdown_tx.send(true).unwrap();
        drop(notify_tx);
        let _ = handle.await;
    }
}
