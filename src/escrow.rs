// Copyright 2026 Hypermesh Foundation. All rights reserved.
// Arena Match Engine - Stake Escrow
//
//! Conservation of play money across the match lifecycle:
//!
//! ```text
//! Σ agent coins + escrow held == constant
//! ```
//!
//! Stakes move into escrow at create/accept and leave it exactly once, as a
//! pot to the winner or as refunds on void. A release that would overdraw
//! the escrow is rejected before any balance moves.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::LedgerError;
use crate::types::Coins;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Escrow {
    held: Decimal,
    total_deposited: Decimal,
    total_released: Decimal,
}

impl Escrow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposit(&mut self, amount: Coins) {
        self.held += amount.0;
        self.total_deposited += amount.0;
    }

    /// Checks a release without performing it.
    pub fn check_release(&self, amount: Coins) -> Result<(), LedgerError> {
        if amount.0 > self.held {
            return Err(LedgerError::EscrowShortfall {
                held: Coins(self.held),
                requested: amount,
            });
        }
        Ok(())
    }

    pub fn release(&mut self, amount: Coins) -> Result<Coins, LedgerError> {
        self.check_release(amount)?;
        self.held -= amount.0;
        self.total_released += amount.0;
        Ok(amount)
    }

    pub fn held(&self) -> Coins {
        Coins(self.held)
    }

    /// `deposited - released - held`; zero while the books balance.
    pub fn imbalance(&self) -> Decimal {
        self.total_deposited - self.total_released - self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn c(d: Decimal) -> Coins {
        Coins::from_decimal(d)
    }

    #[test]
    fn deposit_then_release_balances() {
        let mut e = Escrow::new();
        e.deposit(c(dec!(0.0001)));
        e.deposit(c(dec!(0.0001)));
        assert_eq!(e.held(), c(dec!(0.0002)));
        let paid = e.release(c(dec!(0.0002))).expect("test: pot fits escrow");
        assert_eq!(paid, c(dec!(0.0002)));
        assert!(e.held().is_zero());
        assert_eq!(e.imbalance(), Decimal::ZERO);
    }

    #[test]
    fn overdraw_rejected_without_mutation() {
        let mut e = Escrow::new();
        e.deposit(c(dec!(5)));
        let err = e.release(c(dec!(6))).expect_err("test: overdraw must fail");
        assert!(
            matches!(err, LedgerError::EscrowShortfall { .. }),
            "expected EscrowShortfall, got: {err}"
        );
        assert_eq!(e.held(), c(dec!(5)));
        assert_eq!(e.imbalance(), Decimal::ZERO);
    }
}
