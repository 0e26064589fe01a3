//! # Core Runtime
//!
//! Dispatch for the native core function set. Each function receives the
//! evaluated arguments and writes its result or exceptional into the
//! context.

pub mod actors;
pub mod control;
pub mod numerics;
pub mod predicates;
pub mod seqs;
pub mod values;

use crate::context::Context;
use convex_types::{CoreFn, Value};

/// Applies a native core function to evaluated arguments.
pub fn apply_core(ctx: &mut Context, f: CoreFn, args: &[Value]) {
    use CoreFn::*;
    match f {
        // Numeric tower
        Add => numerics::add(ctx, args),
        Sub => numerics::sub(ctx, args),
        Mul => numerics::mul(ctx, args),
        Div => numerics::div(ctx, args),
        Equals => numerics::equals(ctx, args),
        NumEquals => numerics::num_equals(ctx, args),
        Lt => numerics::lt(ctx, args),
        Gt => numerics::gt(ctx, args),
        Le => numerics::le(ctx, args),
        Ge => numerics::ge(ctx, args),
        Min => numerics::min(ctx, args),
        Max => numerics::max(ctx, args),
        Inc => numerics::inc(ctx, args),
        Dec => numerics::dec(ctx, args),
        Abs => numerics::abs(ctx, args),
        Signum => numerics::signum(ctx, args),
        Mod => numerics::modulo(ctx, args),
        Quot => numerics::quot(ctx, args),
        Rem => numerics::rem(ctx, args),

        // Casts
        CastLong => numerics::cast_long(ctx, args),
        CastDouble => numerics::cast_double(ctx, args),
        CastByte => numerics::cast_byte(ctx, args),
        CastChar => numerics::cast_char(ctx, args),
        CastBoolean => numerics::cast_boolean(ctx, args),
        CastBlob => values::cast_blob(ctx, args),
        CastAddress => values::cast_address(ctx, args),
        CastKeyword => values::cast_keyword(ctx, args),
        CastSymbol => values::cast_symbol(ctx, args),
        Str => values::str_fn(ctx, args),
        Name => values::name(ctx, args),
        Not => numerics::not(ctx, args),
        HashFn => values::hash_fn(ctx, args),

        // Predicates
        NilQ => predicates::nil_q(ctx, args),
        BooleanQ => predicates::boolean_q(ctx, args),
        NumberQ => predicates::number_q(ctx, args),
        LongQ => predicates::long_q(ctx, args),
        DoubleQ => predicates::double_q(ctx, args),
        BlobQ => predicates::blob_q(ctx, args),
        StringQ => predicates::string_q(ctx, args),
        SymbolQ => predicates::symbol_q(ctx, args),
        KeywordQ => predicates::keyword_q(ctx, args),
        AddressQ => predicates::address_q(ctx, args),
        VectorQ => predicates::vector_q(ctx, args),
        ListQ => predicates::list_q(ctx, args),
        MapQ => predicates::map_q(ctx, args),
        SetQ => predicates::set_q(ctx, args),
        FnQ => predicates::fn_q(ctx, args),
        CollQ => predicates::coll_q(ctx, args),
        EmptyQ => predicates::empty_q(ctx, args),
        ZeroQ => predicates::zero_q(ctx, args),
        ContainsKeyQ => seqs::contains_key(ctx, args),
        ActorQ => predicates::actor_q(ctx, args),
        AccountQ => predicates::account_q(ctx, args),
        CallableQ => predicates::callable_q(ctx, args),

        // Collections
        VectorFn => seqs::vector(ctx, args),
        ListFn => seqs::list(ctx, args),
        HashMapFn => seqs::hash_map(ctx, args),
        HashSetFn => seqs::hash_set(ctx, args),
        BlobMapFn => seqs::blob_map(ctx, args),
        Conj => seqs::conj(ctx, args),
        Cons => seqs::cons(ctx, args),
        Get => seqs::get(ctx, args),
        Assoc => seqs::assoc(ctx, args),
        Dissoc => seqs::dissoc(ctx, args),
        Count => seqs::count(ctx, args),
        Empty => seqs::empty(ctx, args),
        First => seqs::first(ctx, args),
        Second => seqs::second(ctx, args),
        Last => seqs::last(ctx, args),
        Next => seqs::next(ctx, args),
        Nth => seqs::nth(ctx, args),
        Concat => seqs::concat(ctx, args),
        Into => seqs::into(ctx, args),
        Reduce => seqs::reduce(ctx, args),
        Reduced => control::reduced(ctx, args),
        MapFn => seqs::map_fn(ctx, args),
        Apply => seqs::apply_fn(ctx, args),
        Keys => seqs::keys(ctx, args),
        Vals => seqs::vals(ctx, args),

        // Control
        Fail => control::fail(ctx, args),
        AssertFn => control::assert_fn(ctx, args),
        Halt => control::halt(ctx, args),
        Rollback => control::rollback(ctx, args),
        Return => control::return_fn(ctx, args),
        Recur => control::recur(ctx, args),
        Tailcall => control::tailcall(ctx, args),

        // Accounts and economics
        Transfer => actors::transfer(ctx, args),
        Accept => actors::accept(ctx, args),
        CallFn => actors::call_fn(ctx, args),
        CreateAccount => actors::create_account(ctx, args),
        Deploy => actors::deploy(ctx, args),
        SetKey => actors::set_key(ctx, args),
        SetController => actors::set_controller(ctx, args),
        TransferMemory => actors::transfer_memory(ctx, args),
        SetMemory => actors::set_memory(ctx, args),
        ScheduleStar => actors::schedule_star(ctx, args),
        Eval => actors::eval(ctx, args),
        EvalAs => actors::eval_as(ctx, args),
        Log => actors::log(ctx, args),
        BalanceFn => actors::balance_fn(ctx, args),
        AccountFn => actors::account_fn(ctx, args),
        GetHolding => actors::get_holding(ctx, args),
        SetHolding => actors::set_holding(ctx, args),
        Lookup => actors::lookup_fn(ctx, args),
        LookupMeta => actors::lookup_meta(ctx, args),
        SyntaxFn => values::syntax_fn(ctx, args),
        Meta => values::meta_fn(ctx, args),

        // Peers and staking
        CreatePeer => actors::create_peer(ctx, args),
        SetStake => actors::set_stake(ctx, args),
        Stake => actors::stake_fn(ctx, args),
        SetPeerData => actors::set_peer_data(ctx, args),
    }
}
