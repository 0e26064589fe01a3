//! # Schedule Draining
//!
//! Scheduled ops live in the state's schedule blob-map keyed by 8-byte
//! big-endian timestamps, so iteration order is execution order. At
//! block start, every entry at or before the block timestamp is drained
//! (up to the per-block cap) and executed as-if from its recorded
//! origin.

use convex_types::{Address, State, Value};

/// One drained schedule entry.
#[derive(Clone, Debug, PartialEq)]
pub struct ScheduledOp {
    /// Account the op executes as.
    pub origin: Address,
    /// The compiled op.
    pub op: Value,
}

/// Removes due entries from the schedule, in time order, up to `max`.
/// Returns the updated state and the drained ops.
#[must_use]
pub fn drain_schedule(state: &State, timestamp: i64, max: usize) -> (State, Vec<ScheduledOp>) {
    let mut drained = Vec::new();
    let mut schedule = state.schedule().clone();
    let due_key = State::schedule_key(timestamp);

    for (key, entry) in state.schedule().entries() {
        if drained.len() >= max {
            break;
        }
        let Some(key_bytes) = convex_types::blob_key_bytes(&key) else {
            continue;
        };
        if key_bytes.as_slice() > due_key.as_slice() {
            // Keys are ordered; everything later is in the future.
            break;
        }
        let Value::Vector(pairs) = &entry else {
            continue;
        };
        let mut kept = Vec::new();
        for pair in pairs.iter() {
            if drained.len() >= max {
                kept.push(pair);
                continue;
            }
            if let Value::Vector(p) = &pair {
                if let (Some(Value::Address(origin)), Some(op)) = (p.get(0), p.get(1)) {
                    drained.push(ScheduledOp { origin, op });
                    continue;
                }
            }
            kept.push(pair);
        }
        if kept.is_empty() {
            schedule = schedule.dissoc_bytes(&key_bytes);
        } else {
            let kept_vec = convex_types::Vector::from_values(kept);
            schedule = schedule.assoc_bytes(&key_bytes, key, Value::Vector(kept_vec));
        }
    }
    (state.with_schedule(schedule), drained)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genesis::{genesis, GenesisConfig};
    use convex_types::{AccountKey, Op};
    use std::sync::Arc;

    fn base_state() -> State {
        genesis(&GenesisConfig::new(vec![AccountKey::new([1; 32])]))
    }

    fn noop() -> Value {
        Value::Op(Arc::new(Op::Constant(Value::Nil)))
    }

    #[test]
    fn test_drain_in_time_order() {
        let addr = Address::new(2);
        let state = base_state()
            .schedule_op(300, addr, noop())
            .schedule_op(100, addr, noop())
            .schedule_op(200, addr, noop());
        let (next, drained) = drain_schedule(&state, 250, 10);
        // 100 and 200 are due, 300 stays.
        assert_eq!(drained.len(), 2);
        assert_eq!(next.schedule().count(), 1);
        let (next2, drained2) = drain_schedule(&next, 300, 10);
        assert_eq!(drained2.len(), 1);
        assert_eq!(next2.schedule().count(), 0);
    }

    #[test]
    fn test_drain_respects_cap() {
        let addr = Address::new(2);
        let mut state = base_state();
        for t in 1..=10 {
            state = state.schedule_op(t, addr, noop());
        }
        let (next, drained) = drain_schedule(&state, 100, 3);
        assert_eq!(drained.len(), 3);
        // The rest stay scheduled.
        let remaining: u64 = next.schedule().count();
        assert_eq!(remaining, 7);
    }

    #[test]
    fn test_same_timestamp_accumulates() {
        let addr = Address::new(2);
        let state = base_state()
            .schedule_op(100, addr, noop())
            .schedule_op(100, addr, noop());
        assert_eq!(state.schedule().count(), 1);
        let (_, drained) = drain_schedule(&state, 100, 10);
        assert_eq!(drained.len(), 2);
    }

    #[test]
    fn test_nothing_due() {
        let addr = Address::new(2);
        let state = base_state().schedule_op(500, addr, noop());
        let (next, drained) = drain_schedule(&state, 100, 10);
        assert!(drained.is_empty());
        assert_eq!(next.schedule().count(), 1);
    }
}
