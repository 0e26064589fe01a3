//! Shared fixtures: source-form builders (the surface reader stays out
//! of scope, so tests assemble forms as cells directly) and a small
//! in-process network harness.

use convex_crypto::KeyPair;
use convex_state::{genesis, GenesisConfig};
use convex_types::{
    AccountKey, Address, List, Record, SignedData, State, Transaction, TxBody, Value, Vector,
};

/// Builds a list form.
#[must_use]
pub fn lst(items: Vec<Value>) -> Value {
    Value::List(List::from_values(items))
}

/// Builds a symbol.
#[must_use]
pub fn sym(name: &str) -> Value {
    Value::symbol(name)
}

/// Builds a keyword.
#[must_use]
pub fn kw(name: &str) -> Value {
    Value::keyword(name)
}

/// Builds a vector form.
#[must_use]
pub fn vec_form(items: Vec<Value>) -> Value {
    Value::Vector(Vector::from_values(items))
}

/// A network fixture: genesis state plus funded user key pairs, one
/// peer each.
pub struct Net {
    pub state: State,
    pub keypairs: Vec<KeyPair>,
}

impl Net {
    /// Genesis with `n` peers/users on deterministic seeds.
    #[must_use]
    pub fn new(n: u8) -> Self {
        let keypairs: Vec<KeyPair> =
            (1..=n).map(|i| KeyPair::from_seed([i; 32])).collect();
        let keys: Vec<AccountKey> = keypairs.iter().map(KeyPair::account_key).collect();
        let state = genesis(&GenesisConfig::new(keys));
        Self { state, keypairs }
    }

    /// Address of the `i`-th genesis user (after core and reserve).
    #[must_use]
    pub fn user(&self, i: usize) -> Address {
        Address::new(2 + i as u64)
    }

    /// Signs an invoke transaction for user `i`.
    #[must_use]
    pub fn invoke(&self, i: usize, sequence: i64, form: Value) -> SignedData {
        let tx = Transaction::new(self.user(i), sequence, TxBody::Invoke(form));
        self.keypairs[i].sign_cell(Value::Record(Record::Transaction(tx)))
    }

    /// Signs a transfer transaction for user `i`.
    #[must_use]
    pub fn transfer(
        &self,
        i: usize,
        sequence: i64,
        target: Address,
        amount: i64,
    ) -> SignedData {
        let tx = Transaction::new(self.user(i), sequence, TxBody::Transfer { target, amount });
        self.keypairs[i].sign_cell(Value::Record(Record::Transaction(tx)))
    }

    /// Signs a block from peer `i`.
    #[must_use]
    pub fn block(&self, i: usize, timestamp: i64, txs: Vec<SignedData>) -> SignedData {
        let tx_vals: Vec<Value> = txs
            .into_iter()
            .map(|s| Value::Record(Record::Signed(s)))
            .collect();
        let block = convex_types::Block::new(timestamp, Vector::from_values(tx_vals));
        self.keypairs[i].sign_cell(Value::Record(Record::Block(block)))
    }
}

/// State as a cell value, for hashing and memory accounting.
#[must_use]
pub fn state_value(state: &State) -> Value {
    Value::Record(Record::State(state.clone()))
}
