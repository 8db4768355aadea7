//! The fungible token the aggregator pays oracles in.
use anchor_lang::prelude::Pubkey;

use std::collections::BTreeMap;

pub trait TokenLedger {
    fn balance_of(&self, owner: &Pubkey) -> u64;

    /// Moves `amount` from `from` to `to`. Returns false and moves nothing when
    /// `from` cannot cover the amount.
    fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> bool;
}

/// In-process balances, used for simulations and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryLedger {
    balances: BTreeMap<Pubkey, u64>,
}

impl MemoryLedger {
    pub fn mint(&mut self, to: &Pubkey, amount: u64) {
        let balance = self.balances.entry(*to).or_default();
        *balance = balance.saturating_add(amount);
    }
}

impl TokenLedger for MemoryLedger {
    fn balance_of(&self, owner: &Pubkey) -> u64 {
        self.balances.get(owner).copied().unwrap_or_default()
    }

    fn transfer(&mut self, from: &Pubkey, to: &Pubkey, amount: u64) -> bool {
        let from_balance = self.balance_of(from);
        let remaining = match from_balance.checked_sub(amount) {
            Some(remaining) => remaining,
            None => return false,
        };
        let to_balance = self.balance_of(to);
        if from != to && to_balance.checked_add(amount).is_none() {
            return false;
        }

        self.balances.insert(*from, remaining);
        let to_balance = self.balance_of(to);
        self.balances.insert(*to, to_balance + amount);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_moves_balance() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut ledger = MemoryLedger::default();
        ledger.mint(&a, 100);

        assert!(ledger.transfer(&a, &b, 40));
        assert_eq!(ledger.balance_of(&a), 60);
        assert_eq!(ledger.balance_of(&b), 40);
    }

    #[test]
    fn insufficient_balance_moves_nothing() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());
        let mut ledger = MemoryLedger::default();
        ledger.mint(&a, 10);

        assert!(!ledger.transfer(&a, &b, 11));
        assert_eq!(ledger.balance_of(&a), 10);
        assert_eq!(ledger.balance_of(&b), 0);
    }

    #[test]
    fn self_transfer_keeps_balance() {
        let a = Pubkey::new_unique();
        let mut ledger = MemoryLedger::default();
        ledger.mint(&a, 10);

        assert!(ledger.transfer(&a, &a, 10));
        assert_eq!(ledger.balance_of(&a), 10);
    }
}
