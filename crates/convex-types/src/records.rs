//! # World-State Records
//!
//! Fixed-keyword record cells: the global `State`, per-account and
//! per-peer status, blocks, transactions, results, signed wrappers, and
//! the consensus order/belief pair. Records are immutable; every setter
//! returns a new record sharing unchanged subtrees.

use crate::address::Address;
use crate::blobmap::BlobMap;
use crate::cache::CellMeta;
use crate::hash::{AccountKey, Signature};
use crate::map::Map;
use crate::symbolic::{Keyword, Symbol};
use crate::value::Value;
use crate::vector::Vector;
use std::fmt;
use std::sync::Arc;

/// Total coin supply. Conserved by every state transition.
pub const MAX_SUPPLY: i64 = 1_000_000_000_000_000_000;

// =============================================================================
// GLOBALS
// =============================================================================

/// The fixed-arity globals of a state.
#[derive(Clone, Debug, PartialEq)]
pub struct Globals {
    /// Consensus timestamp in milliseconds.
    pub timestamp: i64,
    /// Accumulated juice fees.
    pub fees: i64,
    /// Coin price per juice unit.
    pub juice_price: i64,
    /// Memory pool allocation in bytes.
    pub pool_memory: i64,
    /// Coin value held by the memory pool.
    pub pool_value: i64,
    /// Protocol payload, opaque to the core.
    pub protocol: Value,
}

/// Coin price for buying `delta` bytes from a constant-product memory
/// pool at `(pool_memory, pool_value)`: `ceil(value * delta / (alloc -
/// delta))`. `None` when the pool cannot cover the request.
#[must_use]
pub fn memory_buy_price(delta: i64, pool_memory: i64, pool_value: i64) -> Option<i64> {
    if delta < 0 || delta >= pool_memory {
        return None;
    }
    if delta == 0 {
        return Some(0);
    }
    let remaining = i128::from(pool_memory) - i128::from(delta);
    // Ceiling division keeps the product invariant from leaking value.
    let price = (i128::from(pool_value) * i128::from(delta) + remaining - 1) / remaining;
    Some(i64::try_from(price).unwrap_or(i64::MAX))
}

/// Coin refund for selling `delta` bytes back into the pool; floor
/// division, the seller absorbs the rounding.
#[must_use]
pub fn memory_sell_refund(delta: i64, pool_memory: i64, pool_value: i64) -> i64 {
    if delta <= 0 {
        return 0;
    }
    let grown = i128::from(pool_memory) + i128::from(delta);
    let refund = i128::from(pool_value) * i128::from(delta) / grown;
    i64::try_from(refund).unwrap_or(i64::MAX)
}

impl Globals {
    /// The globals as their canonical 6-element vector cell.
    #[must_use]
    pub fn to_vector(&self) -> Vector {
        Vector::from_values(vec![
            Value::Long(self.timestamp),
            Value::Long(self.fees),
            Value::Long(self.juice_price),
            Value::Long(self.pool_memory),
            Value::Long(self.pool_value),
            self.protocol.clone(),
        ])
    }
}

// =============================================================================
// ACCOUNT STATUS
// =============================================================================

/// Status record for one account.
#[derive(Clone, Debug)]
pub struct AccountStatus(pub(crate) Arc<AccountRep>);

#[derive(Debug)]
pub(crate) struct AccountRep {
    pub sequence: i64,
    pub balance: i64,
    /// Memory allowance in bytes.
    pub memory: i64,
    /// Null for pure actors.
    pub key: Option<AccountKey>,
    /// `nil`, an address, or a `[address scope]` vector.
    pub controller: Value,
    pub environment: Map,
    pub metadata: Map,
    /// Values attached by other accounts, keyed by observer address.
    pub holdings: BlobMap,
    pub meta: CellMeta,
}

impl AccountStatus {
    fn build(rep: AccountRep) -> Self {
        AccountStatus(Arc::new(rep))
    }

    /// A fresh user account with a signing key and starting balance.
    #[must_use]
    pub fn new_user(key: AccountKey, balance: i64) -> Self {
        Self::build(AccountRep {
            sequence: 0,
            balance,
            memory: 0,
            key: Some(key),
            controller: Value::Nil,
            environment: Map::empty(),
            metadata: Map::empty(),
            holdings: BlobMap::empty(),
            meta: CellMeta::new(),
        })
    }

    /// A fresh actor account: no key, callable only via cross-account call.
    #[must_use]
    pub fn new_actor() -> Self {
        Self::build(AccountRep {
            sequence: 0,
            balance: 0,
            memory: 0,
            key: None,
            controller: Value::Nil,
            environment: Map::empty(),
            metadata: Map::empty(),
            holdings: BlobMap::empty(),
            meta: CellMeta::new(),
        })
    }

    #[must_use]
    pub fn sequence(&self) -> i64 {
        self.0.sequence
    }

    #[must_use]
    pub fn balance(&self) -> i64 {
        self.0.balance
    }

    #[must_use]
    pub fn memory(&self) -> i64 {
        self.0.memory
    }

    #[must_use]
    pub fn key(&self) -> Option<AccountKey> {
        self.0.key
    }

    #[must_use]
    pub fn controller(&self) -> &Value {
        &self.0.controller
    }

    #[must_use]
    pub fn environment(&self) -> &Map {
        &self.0.environment
    }

    #[must_use]
    pub fn metadata(&self) -> &Map {
        &self.0.metadata
    }

    #[must_use]
    pub fn holdings(&self) -> &BlobMap {
        &self.0.holdings
    }

    /// An actor is an account without a signing key.
    #[must_use]
    pub fn is_actor(&self) -> bool {
        self.0.key.is_none()
    }

    /// Whether `sym` is exported for cross-account calls: its metadata map
    /// carries a truthy `:callable?`.
    #[must_use]
    pub fn is_callable(&self, sym: &Symbol) -> bool {
        let sym_val = Value::Symbol(sym.clone());
        match self.0.metadata.get(&sym_val) {
            Some(Value::Map(m)) => m
                .get(&Value::Keyword(Keyword::intern("callable?")))
                .is_some_and(|v| v.is_truthy()),
            _ => false,
        }
    }

    fn update(&self, f: impl FnOnce(&mut AccountRep)) -> Self {
        let mut rep = AccountRep {
            sequence: self.0.sequence,
            balance: self.0.balance,
            memory: self.0.memory,
            key: self.0.key,
            controller: self.0.controller.clone(),
            environment: self.0.environment.clone(),
            metadata: self.0.metadata.clone(),
            holdings: self.0.holdings.clone(),
            meta: CellMeta::new(),
        };
        f(&mut rep);
        Self::build(rep)
    }

    #[must_use]
    pub fn with_sequence(&self, sequence: i64) -> Self {
        self.update(|r| r.sequence = sequence)
    }

    #[must_use]
    pub fn with_balance(&self, balance: i64) -> Self {
        self.update(|r| r.balance = balance)
    }

    #[must_use]
    pub fn with_memory(&self, memory: i64) -> Self {
        self.update(|r| r.memory = memory)
    }

    #[must_use]
    pub fn with_key(&self, key: Option<AccountKey>) -> Self {
        self.update(|r| r.key = key)
    }

    #[must_use]
    pub fn with_controller(&self, controller: Value) -> Self {
        self.update(|r| r.controller = controller)
    }

    #[must_use]
    pub fn with_environment(&self, environment: Map) -> Self {
        self.update(|r| r.environment = environment)
    }

    #[must_use]
    pub fn with_metadata(&self, metadata: Map) -> Self {
        self.update(|r| r.metadata = metadata)
    }

    #[must_use]
    pub fn with_holdings(&self, holdings: BlobMap) -> Self {
        self.update(|r| r.holdings = holdings)
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for AccountStatus {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let (a, b) = (&*self.0, &*other.0);
        a.sequence == b.sequence
            && a.balance == b.balance
            && a.memory == b.memory
            && a.key == b.key
            && a.controller == b.controller
            && a.environment == b.environment
            && a.metadata == b.metadata
            && a.holdings == b.holdings
    }
}

impl Eq for AccountStatus {}

// =============================================================================
// PEER STATUS
// =============================================================================

/// Status record for one peer.
#[derive(Clone, Debug)]
pub struct PeerStatus(pub(crate) Arc<PeerRep>);

#[derive(Debug)]
pub(crate) struct PeerRep {
    /// Controlling account, or `nil`.
    pub controller: Value,
    /// The peer's own stake.
    pub stake: i64,
    /// Delegated stakes keyed by delegator address.
    pub delegated: BlobMap,
    /// Peer metadata, including `:url`.
    pub metadata: Map,
    pub meta: CellMeta,
}

impl PeerStatus {
    /// A new peer with an initial own stake.
    #[must_use]
    pub fn new(controller: Value, stake: i64) -> Self {
        PeerStatus(Arc::new(PeerRep {
            controller,
            stake,
            delegated: BlobMap::empty(),
            metadata: Map::empty(),
            meta: CellMeta::new(),
        }))
    }

    #[must_use]
    pub fn controller(&self) -> &Value {
        &self.0.controller
    }

    #[must_use]
    pub fn stake(&self) -> i64 {
        self.0.stake
    }

    #[must_use]
    pub fn delegated(&self) -> &BlobMap {
        &self.0.delegated
    }

    #[must_use]
    pub fn metadata(&self) -> &Map {
        &self.0.metadata
    }

    /// Delegated stake from one address.
    #[must_use]
    pub fn delegated_stake(&self, addr: Address) -> i64 {
        match self.0.delegated.get(&Value::Address(addr)) {
            Some(Value::Long(v)) => v,
            _ => 0,
        }
    }

    /// Total effective stake: own plus all delegations.
    #[must_use]
    pub fn total_stake(&self) -> i64 {
        let delegated: i64 = self
            .0
            .delegated
            .entries()
            .iter()
            .map(|(_, v)| match v {
                Value::Long(n) => *n,
                _ => 0,
            })
            .sum();
        self.0.stake + delegated
    }

    fn update(&self, f: impl FnOnce(&mut PeerRep)) -> Self {
        let mut rep = PeerRep {
            controller: self.0.controller.clone(),
            stake: self.0.stake,
            delegated: self.0.delegated.clone(),
            metadata: self.0.metadata.clone(),
            meta: CellMeta::new(),
        };
        f(&mut rep);
        PeerStatus(Arc::new(rep))
    }

    #[must_use]
    pub fn with_stake(&self, stake: i64) -> Self {
        self.update(|r| r.stake = stake)
    }

    #[must_use]
    pub fn with_delegated_stake(&self, addr: Address, amount: i64) -> Self {
        self.update(|r| {
            r.delegated = if amount == 0 {
                r.delegated.dissoc(&Value::Address(addr))
            } else {
                r.delegated
                    .assoc(Value::Address(addr), Value::Long(amount))
                    .expect("address is blob-like")
            };
        })
    }

    #[must_use]
    pub fn with_metadata(&self, metadata: Map) -> Self {
        self.update(|r| r.metadata = metadata)
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for PeerStatus {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let (a, b) = (&*self.0, &*other.0);
        a.controller == b.controller
            && a.stake == b.stake
            && a.delegated == b.delegated
            && a.metadata == b.metadata
    }
}

impl Eq for PeerStatus {}

// =============================================================================
// STATE
// =============================================================================

/// The global world state.
#[derive(Clone, Debug)]
pub struct State(pub(crate) Arc<StateRep>);

#[derive(Debug)]
pub(crate) struct StateRep {
    /// Account records indexed by address.
    pub accounts: Vector,
    /// Peer records keyed by account key.
    pub peers: BlobMap,
    pub globals: Globals,
    /// Scheduled ops keyed by 8-byte big-endian timestamps.
    pub schedule: BlobMap,
    pub meta: CellMeta,
}

impl State {
    /// Assembles a state from its four fields.
    #[must_use]
    pub fn new(accounts: Vector, peers: BlobMap, globals: Globals, schedule: BlobMap) -> Self {
        State(Arc::new(StateRep {
            accounts,
            peers,
            globals,
            schedule,
            meta: CellMeta::new(),
        }))
    }

    #[must_use]
    pub fn accounts(&self) -> &Vector {
        &self.0.accounts
    }

    #[must_use]
    pub fn peers(&self) -> &BlobMap {
        &self.0.peers
    }

    #[must_use]
    pub fn globals(&self) -> &Globals {
        &self.0.globals
    }

    #[must_use]
    pub fn schedule(&self) -> &BlobMap {
        &self.0.schedule
    }

    /// Consensus timestamp.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.0.globals.timestamp
    }

    /// The next address to be assigned.
    #[must_use]
    pub fn next_address(&self) -> Address {
        Address::new(self.0.accounts.count())
    }

    /// Account record at an address.
    #[must_use]
    pub fn get_account(&self, addr: Address) -> Option<AccountStatus> {
        match self.0.accounts.get(addr.index()) {
            Some(Value::Record(Record::Account(a))) => Some(a),
            _ => None,
        }
    }

    /// Replaces the account at an existing address.
    #[must_use]
    pub fn put_account(&self, addr: Address, account: AccountStatus) -> Option<State> {
        if addr.index() >= self.0.accounts.count() {
            return None;
        }
        let accounts = self
            .0
            .accounts
            .assoc(addr.index(), Value::Record(Record::Account(account)))?;
        Some(self.with_accounts(accounts))
    }

    /// Appends a new account at the next address.
    #[must_use]
    pub fn add_account(&self, account: AccountStatus) -> (State, Address) {
        let addr = self.next_address();
        let accounts = self
            .0
            .accounts
            .conj(Value::Record(Record::Account(account)));
        (self.with_accounts(accounts), addr)
    }

    /// Peer record for an account key.
    #[must_use]
    pub fn get_peer(&self, key: &AccountKey) -> Option<PeerStatus> {
        match self.0.peers.get_bytes(key.as_bytes()) {
            Some(Value::Record(Record::Peer(p))) => Some(p),
            _ => None,
        }
    }

    /// Inserts or replaces a peer record.
    #[must_use]
    pub fn put_peer(&self, key: AccountKey, peer: PeerStatus) -> State {
        let peers = self.0.peers.assoc_bytes(
            key.as_bytes(),
            Value::AccountKey(key),
            Value::Record(Record::Peer(peer)),
        );
        self.with_peers(peers)
    }

    #[must_use]
    pub fn with_accounts(&self, accounts: Vector) -> State {
        State::new(
            accounts,
            self.0.peers.clone(),
            self.0.globals.clone(),
            self.0.schedule.clone(),
        )
    }

    #[must_use]
    pub fn with_peers(&self, peers: BlobMap) -> State {
        State::new(
            self.0.accounts.clone(),
            peers,
            self.0.globals.clone(),
            self.0.schedule.clone(),
        )
    }

    #[must_use]
    pub fn with_globals(&self, globals: Globals) -> State {
        State::new(
            self.0.accounts.clone(),
            self.0.peers.clone(),
            globals,
            self.0.schedule.clone(),
        )
    }

    #[must_use]
    pub fn with_schedule(&self, schedule: BlobMap) -> State {
        State::new(
            self.0.accounts.clone(),
            self.0.peers.clone(),
            self.0.globals.clone(),
            schedule,
        )
    }

    /// The 8-byte big-endian schedule key for a timestamp.
    #[must_use]
    pub fn schedule_key(time: i64) -> [u8; 8] {
        (time as u64).to_be_bytes()
    }

    /// Schedules `[addr, op]` for execution at or after `time`. Entries at
    /// the same time accumulate in arrival order.
    #[must_use]
    pub fn schedule_op(&self, time: i64, addr: Address, op: Value) -> State {
        let key_bytes = Self::schedule_key(time);
        let key = Value::Blob(crate::blob::Blob::from_bytes(&key_bytes));
        let entry = Value::Vector(Vector::from_values(vec![Value::Address(addr), op]));
        let existing = match self.0.schedule.get_bytes(&key_bytes) {
            Some(Value::Vector(v)) => v,
            _ => Vector::empty(),
        };
        let schedule =
            self.0
                .schedule
                .assoc_bytes(&key_bytes, key, Value::Vector(existing.conj(entry)));
        self.with_schedule(schedule)
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for State {
    fn eq(&self, other: &Self) -> bool {
        if Arc::ptr_eq(&self.0, &other.0) {
            return true;
        }
        let (a, b) = (&*self.0, &*other.0);
        a.accounts == b.accounts
            && a.peers == b.peers
            && a.globals == b.globals
            && a.schedule == b.schedule
    }
}

impl Eq for State {}

// =============================================================================
// BLOCKS AND TRANSACTIONS
// =============================================================================

/// A proposed block: timestamp plus signed transactions in order.
#[derive(Clone, Debug)]
pub struct Block(pub(crate) Arc<BlockRep>);

#[derive(Debug)]
pub(crate) struct BlockRep {
    pub timestamp: i64,
    /// Signed transaction cells in application order.
    pub transactions: Vector,
    pub meta: CellMeta,
}

impl Block {
    #[must_use]
    pub fn new(timestamp: i64, transactions: Vector) -> Self {
        Block(Arc::new(BlockRep {
            timestamp,
            transactions,
            meta: CellMeta::new(),
        }))
    }

    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp
    }

    #[must_use]
    pub fn transactions(&self) -> &Vector {
        &self.0.transactions
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.timestamp == other.0.timestamp
                && self.0.transactions == other.0.transactions)
    }
}

impl Eq for Block {}

/// The program carried by a transaction.
#[derive(Clone, Debug, PartialEq)]
pub enum TxBody {
    /// Evaluate a source form.
    Invoke(Value),
    /// Direct coin transfer.
    Transfer { target: Address, amount: i64 },
    /// Direct cross-account call.
    Call {
        target: Address,
        offer: i64,
        func: Symbol,
        args: Vector,
    },
}

impl TxBody {
    /// Wire sub-tag.
    #[must_use]
    pub fn code(&self) -> u8 {
        match self {
            TxBody::Invoke(_) => 0,
            TxBody::Transfer { .. } => 1,
            TxBody::Call { .. } => 2,
        }
    }
}

/// A transaction: origin, sequence number and program.
#[derive(Clone, Debug)]
pub struct Transaction(pub(crate) Arc<TransactionRep>);

#[derive(Debug)]
pub(crate) struct TransactionRep {
    pub origin: Address,
    pub sequence: i64,
    pub body: TxBody,
    pub meta: CellMeta,
}

impl Transaction {
    #[must_use]
    pub fn new(origin: Address, sequence: i64, body: TxBody) -> Self {
        Transaction(Arc::new(TransactionRep {
            origin,
            sequence,
            body,
            meta: CellMeta::new(),
        }))
    }

    #[must_use]
    pub fn origin(&self) -> Address {
        self.0.origin
    }

    #[must_use]
    pub fn sequence(&self) -> i64 {
        self.0.sequence
    }

    #[must_use]
    pub fn body(&self) -> &TxBody {
        &self.0.body
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.origin == other.0.origin
                && self.0.sequence == other.0.sequence
                && self.0.body == other.0.body)
    }
}

impl Eq for Transaction {}

// =============================================================================
// RESULTS
// =============================================================================

/// Outcome of one transaction or query.
#[derive(Clone, Debug)]
pub struct TxResult(pub(crate) Arc<ResultRep>);

#[derive(Debug)]
pub(crate) struct ResultRep {
    /// Correlation id, when replying to an identified message.
    pub id: Option<i64>,
    /// Result value, or the error message when `error_code` is set.
    pub value: Value,
    /// Error code keyword; `None` on success.
    pub error_code: Option<Value>,
    /// Stack of address/function context at the failure point.
    pub trace: Vector,
    /// Additional info: log entries, juice used.
    pub info: Map,
    pub meta: CellMeta,
}

impl TxResult {
    /// Successful result.
    #[must_use]
    pub fn ok(id: Option<i64>, value: Value) -> Self {
        TxResult(Arc::new(ResultRep {
            id,
            value,
            error_code: None,
            trace: Vector::empty(),
            info: Map::empty(),
            meta: CellMeta::new(),
        }))
    }

    /// Error result with code, message and trace.
    #[must_use]
    pub fn error(id: Option<i64>, code: Value, message: Value, trace: Vector) -> Self {
        TxResult(Arc::new(ResultRep {
            id,
            value: message,
            error_code: Some(code),
            trace,
            info: Map::empty(),
            meta: CellMeta::new(),
        }))
    }

    #[must_use]
    pub fn with_info(&self, info: Map) -> Self {
        TxResult(Arc::new(ResultRep {
            id: self.0.id,
            value: self.0.value.clone(),
            error_code: self.0.error_code.clone(),
            trace: self.0.trace.clone(),
            info,
            meta: CellMeta::new(),
        }))
    }

    #[must_use]
    pub fn id(&self) -> Option<i64> {
        self.0.id
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0.value
    }

    #[must_use]
    pub fn error_code(&self) -> Option<&Value> {
        self.0.error_code.as_ref()
    }

    #[must_use]
    pub fn trace(&self) -> &Vector {
        &self.0.trace
    }

    #[must_use]
    pub fn info(&self) -> &Map {
        &self.0.info
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.0.error_code.is_some()
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for TxResult {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.id == other.0.id
                && self.0.value == other.0.value
                && self.0.error_code == other.0.error_code
                && self.0.trace == other.0.trace
                && self.0.info == other.0.info)
    }
}

impl Eq for TxResult {}

// =============================================================================
// SIGNED DATA
// =============================================================================

/// A payload cell wrapped with its signer key and Ed25519 signature.
///
/// The signature covers the payload's cell hash; verification lives in
/// the crypto crate.
#[derive(Clone, Debug)]
pub struct SignedData(pub(crate) Arc<SignedRep>);

#[derive(Debug)]
pub(crate) struct SignedRep {
    pub key: AccountKey,
    pub signature: Signature,
    pub value: Value,
    pub meta: CellMeta,
}

impl SignedData {
    #[must_use]
    pub fn new(key: AccountKey, signature: Signature, value: Value) -> Self {
        SignedData(Arc::new(SignedRep {
            key,
            signature,
            value,
            meta: CellMeta::new(),
        }))
    }

    #[must_use]
    pub fn key(&self) -> &AccountKey {
        &self.0.key
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.0.signature
    }

    #[must_use]
    pub fn value(&self) -> &Value {
        &self.0.value
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for SignedData {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.key == other.0.key
                && self.0.signature == other.0.signature
                && self.0.value == other.0.value)
    }
}

impl Eq for SignedData {}

// =============================================================================
// CONSENSUS ORDERS AND BELIEFS
// =============================================================================

/// One peer's signed view of the block ordering.
#[derive(Clone, Debug)]
pub struct Order(pub(crate) Arc<OrderRep>);

#[derive(Debug)]
pub(crate) struct OrderRep {
    /// Signed blocks in proposed order.
    pub blocks: Vector,
    /// Blocks before this index are proposed to the network.
    pub proposal_point: u64,
    /// Blocks before this index are committed. Never retreats.
    pub consensus_point: u64,
    /// Wall-clock of the peer when the order was produced.
    pub timestamp: i64,
    pub meta: CellMeta,
}

impl Order {
    /// An empty order.
    #[must_use]
    pub fn empty(timestamp: i64) -> Self {
        Self::new(Vector::empty(), 0, 0, timestamp)
    }

    /// Assembles an order. Clamps points into `0 <= cp <= pp <= count`.
    #[must_use]
    pub fn new(
        blocks: Vector,
        proposal_point: u64,
        consensus_point: u64,
        timestamp: i64,
    ) -> Self {
        let n = blocks.count();
        let pp = proposal_point.min(n);
        let cp = consensus_point.min(pp);
        Order(Arc::new(OrderRep {
            blocks,
            proposal_point: pp,
            consensus_point: cp,
            timestamp,
            meta: CellMeta::new(),
        }))
    }

    #[must_use]
    pub fn blocks(&self) -> &Vector {
        &self.0.blocks
    }

    #[must_use]
    pub fn block_count(&self) -> u64 {
        self.0.blocks.count()
    }

    #[must_use]
    pub fn proposal_point(&self) -> u64 {
        self.0.proposal_point
    }

    #[must_use]
    pub fn consensus_point(&self) -> u64 {
        self.0.consensus_point
    }

    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.0.timestamp
    }

    /// Appends a signed block as a new (unproposed) entry.
    #[must_use]
    pub fn append_block(&self, signed_block: Value) -> Order {
        Order::new(
            self.0.blocks.conj(signed_block),
            self.0.proposal_point,
            self.0.consensus_point,
            self.0.timestamp,
        )
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for Order {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
            || (self.0.blocks == other.0.blocks
                && self.0.proposal_point == other.0.proposal_point
                && self.0.consensus_point == other.0.consensus_point
                && self.0.timestamp == other.0.timestamp)
    }
}

impl Eq for Order {}

/// A peer's belief: the latest signed order seen from every peer.
#[derive(Clone, Debug)]
pub struct Belief(pub(crate) Arc<BeliefRep>);

#[derive(Debug)]
pub(crate) struct BeliefRep {
    /// Signed orders keyed by peer account key.
    pub orders: BlobMap,
    pub meta: CellMeta,
}

impl Belief {
    /// An empty belief.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(BlobMap::empty())
    }

    #[must_use]
    pub fn new(orders: BlobMap) -> Self {
        Belief(Arc::new(BeliefRep {
            orders,
            meta: CellMeta::new(),
        }))
    }

    #[must_use]
    pub fn orders(&self) -> &BlobMap {
        &self.0.orders
    }

    /// The signed order for one peer, if known.
    #[must_use]
    pub fn get_order(&self, key: &AccountKey) -> Option<SignedData> {
        match self.0.orders.get_bytes(key.as_bytes()) {
            Some(Value::Record(Record::Signed(s))) => Some(s),
            _ => None,
        }
    }

    /// Inserts or replaces a peer's signed order.
    #[must_use]
    pub fn put_order(&self, key: AccountKey, signed_order: SignedData) -> Belief {
        let orders = self.0.orders.assoc_bytes(
            key.as_bytes(),
            Value::AccountKey(key),
            Value::Record(Record::Signed(signed_order)),
        );
        Belief::new(orders)
    }

    pub(crate) fn meta(&self) -> &CellMeta {
        &self.0.meta
    }
}

impl PartialEq for Belief {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.0.orders == other.0.orders
    }
}

impl Eq for Belief {}

// =============================================================================
// RECORD UNION
// =============================================================================

/// The closed union of record cells.
#[derive(Clone, Debug, PartialEq)]
pub enum Record {
    State(State),
    Account(AccountStatus),
    Peer(PeerStatus),
    Block(Block),
    Transaction(Transaction),
    Result(TxResult),
    Signed(SignedData),
    Order(Order),
    Belief(Belief),
}

impl Eq for Record {}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Record::State(_) => write!(f, "<state>"),
            Record::Account(_) => write!(f, "<account>"),
            Record::Peer(_) => write!(f, "<peer>"),
            Record::Block(b) => write!(f, "<block t={}>", b.timestamp()),
            Record::Transaction(t) => write!(f, "<tx {}:{}>", t.origin(), t.sequence()),
            Record::Result(_) => write!(f, "<result>"),
            Record::Signed(_) => write!(f, "<signed>"),
            Record::Order(o) => write!(
                f,
                "<order {}/{}/{}>",
                o.consensus_point(),
                o.proposal_point(),
                o.block_count()
            ),
            Record::Belief(_) => write!(f, "<belief>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_setters_share() {
        let key = AccountKey::new([1u8; 32]);
        let a = AccountStatus::new_user(key, 1000);
        let b = a.with_balance(500).with_sequence(1);
        assert_eq!(a.balance(), 1000);
        assert_eq!(b.balance(), 500);
        assert_eq!(b.sequence(), 1);
        assert_eq!(b.key(), Some(key));
    }

    #[test]
    fn test_callable_metadata() {
        let sym = Symbol::intern("receive-coin");
        let mut a = AccountStatus::new_actor();
        assert!(!a.is_callable(&sym));
        let meta = Map::empty().assoc(
            Value::Symbol(sym.clone()),
            Value::Map(Map::empty().assoc(
                Value::Keyword(Keyword::intern("callable?")),
                Value::Bool(true),
            )),
        );
        a = a.with_metadata(meta);
        assert!(a.is_callable(&sym));
    }

    #[test]
    fn test_state_accounts() {
        let g = Globals {
            timestamp: 0,
            fees: 0,
            juice_price: 2,
            pool_memory: 1000,
            pool_value: 1000,
            protocol: Value::Nil,
        };
        let s = State::new(Vector::empty(), BlobMap::empty(), g, BlobMap::empty());
        assert_eq!(s.next_address(), Address::new(0));
        let (s2, addr) = s.add_account(AccountStatus::new_actor());
        assert_eq!(addr, Address::new(0));
        assert_eq!(s2.next_address(), Address::new(1));
        assert!(s2.get_account(addr).unwrap().is_actor());
        // Put at a fresh address fails; accounts are append-only.
        assert!(s2.put_account(Address::new(5), AccountStatus::new_actor()).is_none());
    }

    #[test]
    fn test_peer_total_stake() {
        let p = PeerStatus::new(Value::Nil, 1000)
            .with_delegated_stake(Address::new(3), 500)
            .with_delegated_stake(Address::new(9), 250);
        assert_eq!(p.total_stake(), 1750);
        assert_eq!(p.delegated_stake(Address::new(3)), 500);
        let p2 = p.with_delegated_stake(Address::new(3), 0);
        assert_eq!(p2.total_stake(), 1250);
    }

    #[test]
    fn test_order_invariant_clamp() {
        let o = Order::new(Vector::empty(), 5, 9, 0);
        assert_eq!(o.proposal_point(), 0);
        assert_eq!(o.consensus_point(), 0);
    }
}
