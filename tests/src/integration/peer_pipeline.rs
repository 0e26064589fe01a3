//! Two in-process peers wired by channels: block production, belief
//! propagation, consensus and committed-block execution end to end.

use crate::helpers::Net;
use async_trait::async_trait;
use convex_crypto::KeyPair;
use convex_peer::{
    run_belief_propagator, run_connection_manager, run_executor, Connections, Message,
    MessageType, PeerConfig, PeerCore, Transport,
};
use convex_store::MemoryStore;
use convex_types::{AccountKey, Belief, Record, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::time::sleep;

fn fast_config() -> PeerConfig {
    PeerConfig {
        belief_broadcast_min_ms: 1,
        full_broadcast_ms: 100,
        rebroadcast_idle_ms: 15,
        block_interval_ms: 10,
        target_connections: 4,
        connection_interval_ms: 10,
        channel_capacity: 64,
    }
}

/// Pumps belief messages from a connection inbox into a propagator's
/// belief queue.
fn pump(mut rx: mpsc::Receiver<Message>, beliefs: mpsc::Sender<Belief>) {
    tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if msg.kind == MessageType::Belief {
                if let Value::Record(Record::Belief(b)) = msg.payload {
                    let _ = beliefs.send(b).await;
                }
            }
        }
    });
}

#[tokio::test(flavor = "multi_thread")]
async fn test_two_peer_pipeline_reaches_consensus() {
    let net = Net::new(2);
    let cores: Vec<Arc<PeerCore>> = (0..2)
        .map(|i| {
            Arc::new(
                PeerCore::new(
                    KeyPair::from_seed([i as u8 + 1; 32]),
                    Arc::new(MemoryStore::new()),
                    net.state.clone(),
                    fast_config(),
                )
                .unwrap(),
            )
        })
        .collect();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Belief queues and cross-wired connections.
    let (belief_tx_0, belief_rx_0) = mpsc::channel(64);
    let (belief_tx_1, belief_rx_1) = mpsc::channel(64);
    let (wire_tx_to_1, wire_rx_1) = mpsc::channel(64);
    let (wire_tx_to_0, wire_rx_0) = mpsc::channel(64);
    pump(wire_rx_0, belief_tx_0.clone());
    pump(wire_rx_1, belief_tx_1.clone());

    let conns_0: Connections = Arc::new(RwLock::new(HashMap::from([(
        cores[1].keypair().account_key(),
        wire_tx_to_1,
    )])));
    let conns_1: Connections = Arc::new(RwLock::new(HashMap::from([(
        cores[0].keypair().account_key(),
        wire_tx_to_0,
    )])));

    let (notify_tx_0, notify_rx_0) = mpsc::channel(8);
    let (notify_tx_1, notify_rx_1) = mpsc::channel(8);

    tokio::spawn(run_belief_propagator(
        cores[0].clone(),
        belief_rx_0,
        conns_0,
        notify_tx_0,
        shutdown_rx.clone(),
    ));
    tokio::spawn(run_belief_propagator(
        cores[1].clone(),
        belief_rx_1,
        conns_1,
        notify_tx_1,
        shutdown_rx.clone(),
    ));
    tokio::spawn(run_executor(
        cores[0].clone(),
        notify_rx_0,
        shutdown_rx.clone(),
    ));
    tokio::spawn(run_executor(
        cores[1].clone(),
        notify_rx_1,
        shutdown_rx.clone(),
    ));

    // Peer 0 proposes a block carrying a real transfer.
    let tx = net.transfer(0, 1, net.user(1), 500);
    cores[0]
        .produce_block(
            vec![Value::Record(Record::Signed(tx))],
            convex_peer::now_millis(),
        )
        .unwrap();

    // Both peers must commit and execute the block.
    let mut done = false;
    for _ in 0..400 {
        if cores.iter().all(|c| c.data().executed_point >= 1) {
            done = true;
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(done, "peers did not reach executed consensus in time");

    // Replicas agree bit for bit.
    let h0 = Value::Record(Record::State(cores[0].data().state.clone())).cell_hash();
    let h1 = Value::Record(Record::State(cores[1].data().state.clone())).cell_hash();
    assert_eq!(h0, h1, "replica state hashes diverged");

    // The transfer landed.
    let balance = cores[0]
        .data()
        .state
        .get_account(net.user(1))
        .unwrap()
        .balance();
    assert_eq!(
        balance,
        net.state.get_account(net.user(1)).unwrap().balance() + 500
    );

    shutdown_tx.send(true).unwrap();
}

/// A transport that hands out channel senders and parks the receivers.
struct ChannelTransport {
    inboxes: Mutex<Vec<mpsc::Receiver<Message>>>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn connect(&self, _key: &AccountKey) -> Option<mpsc::Sender<Message>> {
        let (tx, rx) = mpsc::channel(16);
        self.inboxes.lock().await.push(rx);
        Some(tx)
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_connection_manager_fills_stake_weighted_set() {
    let net = Net::new(3);
    let core = Arc::new(
        PeerCore::new(
            KeyPair::from_seed([1u8; 32]),
            Arc::new(MemoryStore::new()),
            net.state.clone(),
            fast_config(),
        )
        .unwrap(),
    );
    let transport = Arc::new(ChannelTransport {
        inboxes: Mutex::new(Vec::new()),
    });
    let connections: Connections = Arc::new(RwLock::new(HashMap::new()));
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let handle = tokio::spawn(run_connection_manager(
        core,
        transport,
        connections.clone(),
        shutdown_rx,
    ));

    let mut connected = 0;
    for _ in 0..100 {
        connected = connections.read().await.len();
        // Two other staked peers are available to dial.
        if connected >= 2 {
            break;
        }
        sleep(Duration::from_millis(10)).await;
    }
    assert!(connected >= 2, "expected connections, got {connected}");

    shutdown_tx.send(true).unwrap();
    let _ = handle.await;
}
