//! # Execution Context
//!
//! The mutable view of one in-progress transaction: working state, the
//! executing/caller/origin addresses, juice and depth meters, the local
//! binding frame, the append-only log, and the result-or-exception slot
//! that drives all control flow. Forking for a cross-account call is a
//! cheap field swap; the state itself is an immutable value.

use crate::errors::{codes, ErrorValue, Exceptional};
use crate::juice::MAX_DEPTH;
use convex_types::{AccountStatus, Address, State, Value, Vector};

/// Execution context for one transaction.
#[derive(Clone, Debug)]
pub struct Context {
    pub(crate) state: State,
    pub(crate) origin: Address,
    pub(crate) address: Address,
    pub(crate) caller: Option<Address>,
    pub(crate) offer: i64,
    pub(crate) scope: Value,
    pub(crate) juice_used: u64,
    pub(crate) juice_limit: u64,
    pub(crate) depth: u32,
    pub(crate) locals: Vec<Value>,
    pub(crate) log: Vec<Value>,
    pub(crate) value: Value,
    pub(crate) exception: Option<Exceptional>,
}

impl Context {
    /// A fresh top-level context: executing address is the origin, no
    /// caller, no offer.
    #[must_use]
    pub fn new(state: State, origin: Address, juice_limit: u64) -> Self {
        Self {
            state,
            origin,
            address: origin,
            caller: None,
            offer: 0,
            scope: Value::Nil,
            juice_used: 0,
            juice_limit,
            depth: 0,
            locals: Vec::new(),
            log: Vec::new(),
            value: Value::Nil,
            exception: None,
        }
    }

    /// Working state.
    #[must_use]
    pub fn state(&self) -> &State {
        &self.state
    }

    /// Replaces the working state.
    pub fn set_state(&mut self, state: State) {
        self.state = state;
    }

    /// Transaction signer.
    #[must_use]
    pub fn origin(&self) -> Address {
        self.origin
    }

    /// Currently executing account.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Invoking account, `None` at top level.
    #[must_use]
    pub fn caller(&self) -> Option<Address> {
        self.caller
    }

    /// Coins offered to the current call, not yet accepted.
    #[must_use]
    pub fn offer(&self) -> i64 {
        self.offer
    }

    /// Scope attached to the current call.
    #[must_use]
    pub fn scope(&self) -> &Value {
        &self.scope
    }

    /// Juice consumed so far.
    #[must_use]
    pub fn juice_used(&self) -> u64 {
        self.juice_used
    }

    /// Juice ceiling for this transaction.
    #[must_use]
    pub fn juice_limit(&self) -> u64 {
        self.juice_limit
    }

    /// Current call depth.
    #[must_use]
    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// Current result value.
    #[must_use]
    pub fn result(&self) -> &Value {
        &self.value
    }

    /// Pending exceptional, if any.
    #[must_use]
    pub fn exception(&self) -> Option<&Exceptional> {
        self.exception.as_ref()
    }

    /// Log entries accumulated so far, each `[address values]`.
    #[must_use]
    pub fn log_entries(&self) -> &[Value] {
        &self.log
    }

    /// Whether execution may continue.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.exception.is_none()
    }

    /// Sets the result, leaving any exception untouched.
    pub fn set_result(&mut self, value: Value) {
        self.value = value;
    }

    /// Raises an exceptional result.
    pub fn raise(&mut self, ex: Exceptional) {
        if self.exception.is_none() {
            self.exception = Some(ex);
        }
    }

    /// Raises an error with the executing address attached.
    pub fn fail(&mut self, code: &str, message: Value) {
        let mut err = ErrorValue::new(code, message);
        err.address = Some(self.address);
        self.raise(Exceptional::Error(err));
    }

    /// Clears the exception slot, returning what was there.
    pub fn take_exception(&mut self) -> Option<Exceptional> {
        self.exception.take()
    }

    /// Charges juice. On exhaustion, pins usage at the limit and raises
    /// the uncatchable `:JUICE` error. Returns whether execution may
    /// continue.
    pub fn charge(&mut self, amount: u64) -> bool {
        let next = self.juice_used.saturating_add(amount);
        if next > self.juice_limit {
            self.juice_used = self.juice_limit;
            self.fail(codes::JUICE, Value::string("juice limit exceeded"));
            false
        } else {
            self.juice_used = next;
            true
        }
    }

    /// Enters one call level, raising uncatchable `:DEPTH` past the
    /// bound. Returns whether the level was entered.
    pub fn push_depth(&mut self) -> bool {
        if self.depth >= MAX_DEPTH {
            self.fail(codes::DEPTH, Value::string("call depth exceeded"));
            false
        } else {
            self.depth += 1;
            true
        }
    }

    /// Leaves one call level.
    pub fn pop_depth(&mut self) {
        debug_assert!(self.depth > 0);
        self.depth -= 1;
    }

    /// Account record at an address.
    #[must_use]
    pub fn account(&self, addr: Address) -> Option<AccountStatus> {
        self.state.get_account(addr)
    }

    /// Account record of the executing address.
    #[must_use]
    pub fn current_account(&self) -> AccountStatus {
        self.state
            .get_account(self.address)
            .expect("executing account exists")
    }

    /// Balance of an address, if the account exists.
    #[must_use]
    pub fn balance_of(&self, addr: Address) -> Option<i64> {
        self.state.get_account(addr).map(|a| a.balance())
    }

    /// Replaces an account record, failing `:NOBODY` for fresh addresses.
    pub fn put_account(&mut self, addr: Address, account: AccountStatus) -> bool {
        match self.state.put_account(addr, account) {
            Some(next) => {
                self.state = next;
                true
            }
            None => {
                self.fail(codes::NOBODY, Value::Address(addr));
                false
            }
        }
    }

    /// Credits coins to an account.
    pub fn credit(&mut self, addr: Address, amount: i64) -> bool {
        match self.state.get_account(addr) {
            None => {
                self.fail(codes::NOBODY, Value::Address(addr));
                false
            }
            Some(a) => {
                let next = a.with_balance(a.balance() + amount);
                self.put_account(addr, next)
            }
        }
    }

    /// Debits coins from an account, failing `:FUNDS` when short.
    pub fn debit(&mut self, addr: Address, amount: i64) -> bool {
        match self.state.get_account(addr) {
            None => {
                self.fail(codes::NOBODY, Value::Address(addr));
                false
            }
            Some(a) => {
                if a.balance() < amount {
                    self.fail(codes::FUNDS, Value::Long(amount));
                    return false;
                }
                let next = a.with_balance(a.balance() - amount);
                self.put_account(addr, next)
            }
        }
    }

    /// Appends a log entry `[address values]` for the executing account.
    pub fn append_log(&mut self, values: Vector) {
        let entry = Value::Vector(Vector::from_values(vec![
            Value::Address(self.address),
            Value::Vector(values),
        ]));
        self.log.push(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convex_types::{BlobMap, Globals, Vector};

    fn test_state() -> State {
        let globals = Globals {
            timestamp: 0,
            fees: 0,
            juice_price: 2,
            pool_memory: 1_000_000,
            pool_value: 1_000_000,
            protocol: Value::Nil,
        };
        State::new(Vector::empty(), BlobMap::empty(), globals, BlobMap::empty())
    }

    #[test]
    fn test_juice_exhaustion_pins_usage() {
        let mut ctx = Context::new(test_state(), Address::new(0), 100);
        assert!(ctx.charge(60));
        assert!(!ctx.charge(50));
        assert_eq!(ctx.juice_used(), 100);
        let err = ctx.exception().unwrap().as_error().unwrap();
        assert!(err.is_code(codes::JUICE));
        assert!(err.is_uncatchable());
    }

    #[test]
    fn test_depth_bound() {
        let mut ctx = Context::new(test_state(), Address::new(0), 1000);
        for _ in 0..MAX_DEPTH {
            assert!(ctx.push_depth());
        }
        assert!(!ctx.push_depth());
        let err = ctx.exception().unwrap().as_error().unwrap();
        assert!(err.is_code(codes::DEPTH));
    }

    #[test]
    fn test_first_exception_wins() {
        let mut ctx = Context::new(test_state(), Address::new(0), 1000);
        ctx.fail(codes::CAST, Value::Nil);
        ctx.fail(codes::ARGUMENT, Value::Nil);
        assert!(ctx
            .exception()
            .unwrap()
            .as_error()
            .unwrap()
            .is_code(codes::CAST));
    }
}
