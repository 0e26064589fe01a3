//! # Memory Pool
//!
//! A constant-product market making memory bytes tradeable for coins.
//! Buying `delta` bytes at pool `(alloc, value)` costs
//! `ceil(value * delta / (alloc - delta))`; selling refunds the inverse.
//! Intermediates use 128-bit arithmetic so extreme pools cannot
//! overflow.

use thiserror::Error;

/// Errors from pool trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PoolError {
    /// Request exceeds the pool's remaining allocation.
    #[error("pool exhausted: requested {requested} of {available} bytes")]
    Exhausted { requested: i64, available: i64 },

    /// Negative trade size.
    #[error("negative trade: {0}")]
    Negative(i64),
}

/// Coin price for buying `delta` bytes from the pool.
pub fn swap_price(delta: i64, pool_memory: i64, pool_value: i64) -> Result<i64, PoolError> {
    if delta < 0 {
        return Err(PoolError::Negative(delta));
    }
    convex_types::memory_buy_price(delta, pool_memory, pool_value).ok_or(
        PoolError::Exhausted {
            requested: delta,
            available: pool_memory,
        },
    )
}

/// Buys `delta` bytes: returns `(cost, new_pool_memory, new_pool_value)`.
pub fn pool_buy(
    delta: i64,
    pool_memory: i64,
    pool_value: i64,
) -> Result<(i64, i64, i64), PoolError> {
    let cost = swap_price(delta, pool_memory, pool_value)?;
    Ok((cost, pool_memory - delta, pool_value + cost))
}

/// Sells `delta` bytes back: returns `(refund, new_pool_memory,
/// new_pool_value)`.
pub fn pool_sell(
    delta: i64,
    pool_memory: i64,
    pool_value: i64,
) -> Result<(i64, i64, i64), PoolError> {
    if delta < 0 {
        return Err(PoolError::Negative(delta));
    }
    // Floor division: the seller absorbs the rounding.
    let refund = convex_types::memory_sell_refund(delta, pool_memory, pool_value);
    Ok((refund, pool_memory + delta, pool_value - refund))
}
