//! # Block Application
//!
//! `apply_block` is the state-transition function: validate the signing
//! peer and block shape, advance time and grow the memory pool, drain
//! and run due scheduled ops, then apply every transaction in order.
//! The result pairs the next state with one result per transaction.

use crate::transaction::apply_transaction;
use convex_cvm::{exec, Context};
use convex_state::{
    drain_schedule, MAX_SCHEDULED_TRANSACTIONS_PER_BLOCK, MAX_TRANSACTIONS_PER_BLOCK,
    MEMORY_POOL_GROWTH, MEMORY_POOL_GROWTH_INTERVAL, MINIMUM_EFFECTIVE_STAKE,
    SCHEDULED_OP_JUICE,
};
use convex_types::{Block, Record, SignedData, State, TxResult, Value};
use tracing::{debug, warn};

/// Outcome of applying one signed block.
#[derive(Clone, Debug)]
pub struct BlockResult {
    /// The next state. Equal to the input state for invalid blocks.
    pub state: State,
    /// One result per transaction, in block order.
    pub results: Vec<TxResult>,
    /// Why the whole block was rejected, if it was.
    pub invalid_reason: Option<String>,
}

impl BlockResult {
    fn invalid(state: &State, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        warn!(reason = %reason, "invalid block");
        Self {
            state: state.clone(),
            results: Vec::new(),
            invalid_reason: Some(reason),
        }
    }
}

/// Applies a signed block to a state.
pub fn apply_block(state: &State, signed_block: &SignedData) -> BlockResult {
    // Block-level checks: signing peer exists with sufficient stake, the
    // signature verifies, the block is within size limits.
    let Value::Record(Record::Block(block)) = signed_block.value() else {
        return BlockResult::invalid(state, "payload is not a block");
    };
    let Some(peer) = state.get_peer(signed_block.key()) else {
        return BlockResult::invalid(state, "unknown block signer");
    };
    if peer.total_stake() < MINIMUM_EFFECTIVE_STAKE {
        return BlockResult::invalid(state, "signer stake below minimum");
    }
    if convex_crypto::verify_signed(signed_block).is_err() {
        return BlockResult::invalid(state, "bad block signature");
    }
    if block.transactions().count() as usize > MAX_TRANSACTIONS_PER_BLOCK {
        return BlockResult::invalid(state, "too many transactions");
    }

    let mut state = prepare(state, block);

    // Scheduled ops run first, as-if from their recorded origin, with a
    // fresh juice budget each. Exceptional outcomes are dropped: a
    // scheduled op can never block the block.
    let (drained_state, due) = drain_schedule(
        &state,
        block.timestamp(),
        MAX_SCHEDULED_TRANSACTIONS_PER_BLOCK,
    );
    state = drained_state;
    for entry in due {
        if state.get_account(entry.origin).is_none() {
            continue;
        }
        let Value::Op(op) = &entry.op else {
            continue;
        };
        let mut ctx = Context::new(state.clone(), entry.origin, SCHEDULED_OP_JUICE);
        exec::execute(&mut ctx, op);
        if ctx.is_live() {
            state = ctx.state().clone();
        } else {
            debug!(origin = %entry.origin, "scheduled op failed; dropped");
        }
    }

    // Transactions in order, each against the accumulated state.
    let mut results = Vec::with_capacity(block.transactions().count() as usize);
    for (i, tx_val) in block.transactions().iter().enumerate() {
        let Value::Record(Record::Signed(signed_tx)) = &tx_val else {
            results.push(TxResult::error(
                Some(i as i64),
                Value::keyword(convex_cvm::codes::ARGUMENT),
                Value::string("not a signed transaction"),
                convex_types::Vector::empty(),
            ));
            continue;
        };
        let (next, result) = apply_transaction(&state, signed_tx, Some(i as i64));
        state = next;
        results.push(result);
    }

    BlockResult {
        state,
        results,
        invalid_reason: None,
    }
}

/// Advances the timestamp and grows the memory pool one increment per
/// completed growth interval crossed.
fn prepare(state: &State, block: &Block) -> State {
    if block.timestamp() <= state.timestamp() {
        return state.clone();
    }
    let mut globals = state.globals().clone();
    let steps = block.timestamp() / MEMORY_POOL_GROWTH_INTERVAL
        - globals.timestamp / MEMORY_POOL_GROWTH_INTERVAL;
    globals.timestamp = block.timestamp();
    if steps > 0 {
        globals.pool_memory += steps * MEMORY_POOL_GROWTH;
    }
    state.with_globals(globals)
}
