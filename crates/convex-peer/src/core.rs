//! # Peer Core
//!
//! The shared state of one peer: key pair, store handle and the
//! current `PeerData` record (state, belief, execution progress),
//! replaced by whole-value swap. All peer loops operate through this
//! type; none of them share any other mutable state.

use crate::config::PeerConfig;
use convex_consensus::{merge_beliefs, propose_block};
use convex_state::MAX_TRANSACTIONS_PER_BLOCK;
use convex_store::{Store, StoreError};
use convex_transition::apply_block;
use convex_types::{
    value_hash, Belief, Block, Map, Order, Record, RefStatus, State, Value, Vector,
};
use convex_crypto::KeyPair;
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// One peer's working record. Immutable; replaced as a whole.
#[derive(Clone, Debug)]
pub struct PeerData {
    /// Latest consensus state after executing committed blocks.
    pub state: State,
    /// Current belief.
    pub belief: Belief,
    /// The genesis state, pinned for status replies.
    pub genesis: State,
    /// Number of committed blocks already executed.
    pub executed_point: u64,
}

/// Shared peer core.
pub struct PeerCore {
    keypair: KeyPair,
    store: Arc<dyn Store>,
    config: PeerConfig,
    data: RwLock<Arc<PeerData>>,
}

impl PeerCore {
    /// A fresh peer at genesis.
    pub fn new(
        keypair: KeyPair,
        store: Arc<dyn Store>,
        genesis: State,
        config: PeerConfig,
    ) -> Result<Self, StoreError> {
        let genesis_value = Value::Record(Record::State(genesis.clone()));
        store.put(&genesis_value, RefStatus::Persisted)?;
        let data = PeerData {
            state: genesis.clone(),
            belief: Belief::empty(),
            genesis,
            executed_point: 0,
        };
        Ok(Self {
            keypair,
            store,
            config,
            data: RwLock::new(Arc::new(data)),
        })
    }

    /// The peer's key pair.
    #[must_use]
    pub fn keypair(&self) -> &KeyPair {
        &self.keypair
    }

    /// The peer's store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Loop configuration.
    #[must_use]
    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    /// Snapshot of the current peer record.
    #[must_use]
    pub fn data(&self) -> Arc<PeerData> {
        self.data.read().expect("peer data lock").clone()
    }

    fn swap_data(&self, next: PeerData) {
        *self.data.write().expect("peer data lock") = Arc::new(next);
    }

    /// The own signed order from the current belief, if present.
    #[must_use]
    pub fn own_order(&self) -> Option<Order> {
        let data = self.data();
        let signed = data.belief.get_order(&self.keypair.account_key())?;
        match signed.value() {
            Value::Record(Record::Order(o)) => Some(o.clone()),
            _ => None,
        }
    }

    /// Merges incoming beliefs, announces novelty to the store, and
    /// swaps the peer record. Returns whether the belief changed and the
    /// novel cells for delta broadcast.
    pub fn merge_incoming(
        &self,
        incoming: &[Belief],
        timestamp: i64,
    ) -> Result<(bool, Vec<Value>), StoreError> {
        let data = self.data();
        let merged = merge_beliefs(&self.keypair, &data.state, &data.belief, incoming, timestamp);
        let changed = merged != data.belief;
        let novelty = if changed {
            let belief_value = Value::Record(Record::Belief(merged.clone()));
            self.store.put(&belief_value, RefStatus::Announced)?
        } else {
            Vec::new()
        };
        if changed {
            self.swap_data(PeerData {
                state: data.state.clone(),
                belief: merged,
                genesis: data.genesis.clone(),
                executed_point: data.executed_point,
            });
        }
        Ok((changed, novelty))
    }

    /// Forms a block from buffered signed transactions, appends it to
    /// the own order, and swaps the belief.
    pub fn produce_block(
        &self,
        mut transactions: Vec<Value>,
        timestamp: i64,
    ) -> Result<(), StoreError> {
        transactions.truncate(MAX_TRANSACTIONS_PER_BLOCK);
        let block = Block::new(timestamp, Vector::from_values(transactions));
        let signed = self
            .keypair
            .sign_cell(Value::Record(Record::Block(block)));
        let signed_value = Value::Record(Record::Signed(signed));
        self.store.put(&signed_value, RefStatus::Announced)?;

        let data = self.data();
        let belief = propose_block(&self.keypair, &data.belief, signed_value, timestamp);
        debug!(timestamp, "proposed block");
        self.swap_data(PeerData {
            state: data.state.clone(),
            belief,
            genesis: data.genesis.clone(),
            executed_point: data.executed_point,
        });
        Ok(())
    }

    /// Applies newly committed blocks from the own order. Returns how
    /// many blocks were executed.
    pub fn execute_committed(&self) -> usize {
        let data = self.data();
        let Some(order) = self.own_order() else {
            return 0;
        };
        let target = order.consensus_point();
        if target <= data.executed_point {
            return 0;
        }
        let mut state = data.state.clone();
        let mut executed = 0;
        for i in data.executed_point..target {
            let Some(Value::Record(Record::Signed(signed_block))) = order.blocks().get(i)
            else {
                break;
            };
            let result = apply_block(&state, &signed_block);
            if result.invalid_reason.is_none() {
                state = result.state;
            }
            executed += 1;
        }
        if executed > 0 {
            info!(executed, point = target, "executed committed blocks");
            self.swap_data(PeerData {
                state,
                belief: data.belief.clone(),
                genesis: data.genesis.clone(),
                executed_point: data.executed_point + executed as u64,
            });
            let _ = self.persist_root();
        }
        executed
    }

    /// Persists the peer-local record map and makes it the store root:
    /// `{:belief, :state, :genesis, :executed-point}`. Recovery reads
    /// the root back and deserializes.
    pub fn persist_root(&self) -> Result<(), StoreError> {
        let data = self.data();
        let map = Map::empty()
            .assoc(
                Value::keyword("belief"),
                Value::Record(Record::Belief(data.belief.clone())),
            )
            .assoc(
                Value::keyword("state"),
                Value::Record(Record::State(data.state.clone())),
            )
            .assoc(
                Value::keyword("genesis"),
                Value::Record(Record::State(data.genesis.clone())),
            )
            .assoc(
                Value::keyword("executed-point"),
                Value::Long(data.executed_point as i64),
            );
        self.store.set_root(&Value::Map(map))
    }

    /// Recovers a peer from the store root written by [`persist_root`].
    /// `Ok(None)` when the store has no usable root.
    pub fn recover(
        keypair: KeyPair,
        store: Arc<dyn Store>,
        config: PeerConfig,
    ) -> Result<Option<Self>, StoreError> {
        let Some(root_hash) = store.root_hash()? else {
            return Ok(None);
        };
        let Some(root) = store.get(&root_hash) else {
            return Err(StoreError::MissingCell(root_hash));
        };
        let Value::Map(map) = root.value else {
            return Ok(None);
        };
        let state = match map.get(&Value::keyword("state")) {
            Some(Value::Record(Record::State(s))) => s,
            _ => return Ok(None),
        };
        let genesis = match map.get(&Value::keyword("genesis")) {
            Some(Value::Record(Record::State(s))) => s,
            _ => return Ok(None),
        };
        let belief = match map.get(&Value::keyword("belief")) {
            Some(Value::Record(Record::Belief(b))) => b,
            _ => Belief::empty(),
        };
        let executed_point = match map.get(&Value::keyword("executed-point")) {
            Some(Value::Long(n)) if n >= 0 => n as u64,
            _ => 0,
        };
        info!(executed_point, "recovered peer from store root");
        Ok(Some(Self {
            keypair,
            store,
            config,
            data: RwLock::new(Arc::new(PeerData {
                state,
                belief,
                genesis,
                executed_point,
            })),
        }))
    }

    /// The 9-element status vector:
    /// `[belief_hash, state_hash, genesis_hash, peer_key,
    /// consensus_state_hash, consensus_point, proposal_point,
    /// block_count, consensus_points]`.
    #[must_use]
    pub fn status(&self) -> Vector {
        let data = self.data();
        let belief_hash = value_hash(&Value::Record(Record::Belief(data.belief.clone())));
        let state_hash = value_hash(&Value::Record(Record::State(data.state.clone())));
        let genesis_hash = value_hash(&Value::Record(Record::State(data.genesis.clone())));
        let order = self.own_order().unwrap_or_else(|| Order::empty(0));
        let consensus_points: Vec<Value> = data
            .belief
            .orders()
            .entries()
            .into_iter()
            .filter_map(|(_, v)| match v {
                Value::Record(Record::Signed(s)) => match s.value() {
                    Value::Record(Record::Order(o)) => {
                        Some(Value::Long(o.consensus_point() as i64))
                    }
                    _ => None,
                },
                _ => None,
            })
            .collect();
        Vector::from_values(vec![
            Value::hash_blob(&belief_hash),
            Value::hash_blob(&state_hash),
            Value::hash_blob(&genesis_hash),
            Value::AccountKey(self.keypair.account_key()),
            Value::hash_blob(&state_hash),
            Value::Long(order.consensus_point() as i64),
            Value::Long(order.proposal_point() as i64),
            Value::Long(order.block_count() as i64),
            Value::Vector(Vector::from_values(consensus_points)),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convex_state::{genesis, GenesisConfig};
    use convex_store::MemoryStore;

    fn core() -> PeerCore {
        let kp = KeyPair::from_seed([1u8; 32]);
        let state = genesis(&GenesisConfig::new(vec![kp.account_key()]));
        PeerCore::new(
            KeyPair::from_seed([1u8; 32]),
            Arc::new(MemoryStore::new()),
            state,
            PeerConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_status_has_nine_elements() {
        let core = core();
        assert_eq!(core.status().count(), 9);
    }

    #[test]
    fn test_produce_and_self_commit() {
        let core = core();
        core.produce_block(vec![], 1_000).unwrap();
        // A single-peer network reaches consensus on its own merge.
        let (changed, _) = core.merge_incoming(&[], 1_001).unwrap();
        assert!(changed);
        let order = core.own_order().unwrap();
        assert_eq!(order.block_count(), 1);
        assert_eq!(order.consensus_point(), 1);
        let executed = core.execute_committed();
        assert_eq!(executed, 1);
        assert_eq!(core.data().state.timestamp(), 1_000);
    }

    #[test]
    fn test_belief_novelty_announced() {
        let core = core();
        core.produce_block(vec![], 1_000).unwrap();
        let (_, novelty) = core.merge_incoming(&[], 1_001).unwrap();
        assert!(!novelty.is_empty());
    }

    #[test]
    fn test_persist_and_recover() {
        let store = Arc::new(MemoryStore::new());
        let kp = KeyPair::from_seed([1u8; 32]);
        let state = genesis(&GenesisConfig::new(vec![kp.account_key()]));
        let core = PeerCore::new(
            KeyPair::from_seed([1u8; 32]),
            store.clone(),
            state,
            PeerConfig::default(),
        )
        .unwrap();
        core.produce_block(vec![], 1_000).unwrap();
        core.merge_incoming(&[], 1_001).unwrap();
        assert_eq!(core.execute_committed(), 1);

        let recovered = PeerCore::recover(
            KeyPair::from_seed([1u8; 32]),
            store,
            PeerConfig::default(),
        )
        .unwrap()
        .expect("root was persisted");
        assert_eq!(recovered.data().executed_point, 1);
        assert_eq!(
            Value::Record(Record::State(recovered.data().state.clone())).cell_hash(),
            Value::Record(Record::State(core.data().state.clone())).cell_hash()
        );
        assert_eq!(recovered.data().belief, core.data().belief);
    }
}
