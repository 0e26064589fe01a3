//! # Environments
//!
//! Symbol resolution over account environments. Every account carries a
//! persistent symbol-to-value map; lookups that miss fall back to the
//! core account's environment, which binds the native runtime library.

use crate::context::Context;
use convex_types::{Address, CoreFn, Map, Symbol, Value};

/// Address of the core library account, created at genesis.
pub const CORE_ADDRESS: Address = Address::new(0);

/// The core environment: every native function under its symbol.
#[must_use]
pub fn core_environment() -> Map {
    let mut env = Map::empty();
    for f in CoreFn::ALL {
        env = env.assoc(Value::symbol(f.name()), Value::CoreFn(*f));
    }
    env
}

/// Resolves a symbol in the environment of `addr`, falling back to the
/// core account. `None` means undeclared.
#[must_use]
pub fn lookup_value(ctx: &Context, addr: Address, sym: &Symbol) -> Option<Value> {
    let sym_val = Value::Symbol(sym.clone());
    if let Some(acct) = ctx.account(addr) {
        if let Some(v) = acct.environment().get(&sym_val) {
            return Some(v);
        }
    }
    if addr != CORE_ADDRESS {
        if let Some(core) = ctx.account(CORE_ADDRESS) {
            if let Some(v) = core.environment().get(&sym_val) {
                return Some(v);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_core_environment_complete() {
        let env = core_environment();
        assert_eq!(env.count(), CoreFn::ALL.len() as u64);
        assert_eq!(
            env.get(&Value::symbol("+")),
            Some(Value::CoreFn(CoreFn::Add))
        );
        assert_eq!(
            env.get(&Value::symbol("transfer")),
            Some(Value::CoreFn(CoreFn::Transfer))
        );
    }
}
