//! # Genesis
//!
//! Builds the initial world state: the core library account at address
//! zero, a reserve account, and one funded user account plus peer per
//! genesis key. The full supply is distributed exactly: reserve, user
//! balances, peer stakes and the memory pool sum to `MAX_SUPPLY`.

use crate::constants::{
    INITIAL_JUICE_PRICE, INITIAL_POOL_MEMORY, INITIAL_POOL_VALUE, MAX_SUPPLY,
};
use convex_cvm::core_environment;
use convex_types::{
    AccountKey, AccountStatus, Address, BlobMap, Globals, PeerStatus, Record, State, Value,
    Vector,
};
use tracing::info;

/// Parameters for genesis construction.
#[derive(Clone, Debug)]
pub struct GenesisConfig {
    /// Account keys receiving a funded account and a peer each.
    pub keys: Vec<AccountKey>,
    /// Genesis timestamp in milliseconds.
    pub timestamp: i64,
    /// Balance per genesis user account.
    pub user_balance: i64,
    /// Own stake per genesis peer.
    pub peer_stake: i64,
}

impl GenesisConfig {
    /// A config with test-friendly balances for the given keys.
    #[must_use]
    pub fn new(keys: Vec<AccountKey>) -> Self {
        Self {
            keys,
            timestamp: 0,
            user_balance: 100_000_000_000,
            peer_stake: 10_000_000_000,
        }
    }
}

/// Address of the reserve account holding undistributed supply.
pub const RESERVE_ADDRESS: Address = Address::new(1);

/// Builds the genesis state.
///
/// # Panics
///
/// Panics if the configured distribution exceeds `MAX_SUPPLY`; genesis
/// parameters are operator input, not untrusted data.
#[must_use]
pub fn genesis(config: &GenesisConfig) -> State {
    let n = config.keys.len() as i64;
    let distributed =
        n * (config.user_balance + config.peer_stake) + INITIAL_POOL_VALUE;
    assert!(
        distributed <= MAX_SUPPLY,
        "genesis distribution exceeds supply"
    );
    let reserve = MAX_SUPPLY - distributed;

    // Address 0: the core library, a pure actor.
    let core = AccountStatus::new_actor().with_environment(core_environment());
    let mut accounts = vec![
        Value::Record(Record::Account(core)),
        Value::Record(Record::Account(
            AccountStatus::new_actor().with_balance(reserve),
        )),
    ];

    let mut peers = BlobMap::empty();
    for (i, key) in config.keys.iter().enumerate() {
        let addr = Address::new(accounts.len() as u64);
        accounts.push(Value::Record(Record::Account(AccountStatus::new_user(
            *key,
            config.user_balance,
        ))));
        let peer = PeerStatus::new(Value::Address(addr), config.peer_stake);
        peers = peers.assoc_bytes(
            key.as_bytes(),
            Value::AccountKey(*key),
            Value::Record(Record::Peer(peer)),
        );
        info!(peer = i, address = %addr, "genesis peer");
    }

    let globals = Globals {
        timestamp: config.timestamp,
        fees: 0,
        juice_price: INITIAL_JUICE_PRICE,
        pool_memory: INITIAL_POOL_MEMORY,
        pool_value: INITIAL_POOL_VALUE,
        protocol: Value::Nil,
    };

    State::new(
        Vector::from_values(accounts),
        peers,
        globals,
        BlobMap::empty(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute_total_funds;

    fn keys(n: u8) -> Vec<AccountKey> {
        (1..=n).map(|i| AccountKey::new([i; 32])).collect()
    }

    #[test]
    fn test_genesis_conserves_supply() {
        let state = genesis(&GenesisConfig::new(keys(5)));
        assert_eq!(compute_total_funds(&state), MAX_SUPPLY);
    }

    #[test]
    fn test_genesis_layout() {
        let state = genesis(&GenesisConfig::new(keys(3)));
        // Core, reserve, three users.
        assert_eq!(state.accounts().count(), 5);
        assert!(state.get_account(Address::new(0)).unwrap().is_actor());
        assert_eq!(state.peers().entries().len(), 3);
        let key = AccountKey::new([1; 32]);
        let peer = state.get_peer(&key).unwrap();
        assert_eq!(peer.stake(), GenesisConfig::new(keys(3)).peer_stake);
    }

    #[test]
    fn test_genesis_deterministic() {
        let a = genesis(&GenesisConfig::new(keys(4)));
        let b = genesis(&GenesisConfig::new(keys(4)));
        assert_eq!(
            Value::Record(Record::State(a)).cell_hash(),
            Value::Record(Record::State(b)).cell_hash()
        );
    }
}
