//! Balance reading shared between the link task and the sensing loop

use crate::core::BalanceState;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Single-slot, lock-free holder of the latest balance reading.
///
/// Clones share the same slot. Every store replaces the whole value, so a
/// reader always observes one of the three states and never a torn write.
#[derive(Debug, Clone)]
pub struct SharedBalance {
    slot: Arc<AtomicU8>,
}

impl SharedBalance {
    /// New slot holding `Balanced`
    pub fn new() -> Self {
        Self {
            slot: Arc::new(AtomicU8::new(BalanceState::Balanced as u8)),
        }
    }

    /// Latest committed reading
    pub fn load(&self) -> BalanceState {
        BalanceState::from_u8(self.slot.load(Ordering::Acquire))
    }

    pub fn store(&self, state: BalanceState) {
        self.slot.store(state as u8, Ordering::Release);
    }

    /// Store `state` and return the reading it replaced
    pub fn swap(&self, state: BalanceState) -> BalanceState {
        BalanceState::from_u8(self.slot.swap(state as u8, Ordering::AcqRel))
    }

    /// Fall back to `Balanced`
    pub fn reset(&self) {
        self.store(BalanceState::Balanced);
    }
}

impl Default for SharedBalance {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_balanced() {
        assert_eq!(SharedBalance::new().load(), BalanceState::Balanced);
    }

    #[test]
    fn test_clones_share_slot() {
        let writer = SharedBalance::new();
        let reader = writer.clone();
        writer.store(BalanceState::Left);
        assert_eq!(reader.load(), BalanceState::Left);
        assert_eq!(writer.swap(BalanceState::Right), BalanceState::Left);
        reader.reset();
        assert_eq!(writer.load(), BalanceState::Balanced);
    }

    #[test]
    fn test_concurrent_readers_see_valid_states() {
        let balance = SharedBalance::new();
        let writer = {
            let balance = balance.clone();
            std::thread::spawn(move || {
                for i in 0..10_000 {
                    let state = match i % 3 {
                        0 => BalanceState::Left,
                        1 => BalanceState::Right,
                        _ => BalanceState::Balanced,
                    };
                    balance.store(state);
                }
            })
        };
        for _ in 0..10_000 {
            let seen = balance.load();
            assert!(matches!(
                seen,
                BalanceState::Left | BalanceState::Right | BalanceState::Balanced
            ));
        }
        writer.join().unwrap();
    }
}
