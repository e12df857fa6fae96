//! A ring-fenced pool of credits reserved to pay for the terminal lucidity
//! window and the gas fees of executing bequests.
//!
//! `funded` and `unlocked` are monotone: once set they never clear. Funding
//! must happen before unlocking — the reserve exists to guarantee those
//! final turns are paid for, so it cannot be spent from before it's
//! confirmed funded.

use error_types::{LifecycleError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LifecycleReserve {
    pub total_cents: u64,
    pub spent_cents: u64,
    pub funded: bool,
    pub unlocked: bool,
}

impl LifecycleReserve {
    pub fn new(total_cents: u64) -> Self {
        LifecycleReserve {
            total_cents,
            spent_cents: 0,
            funded: false,
            unlocked: false,
        }
    }

    /// Mark the reserve as funded. Idempotent.
    pub fn fund(&mut self) {
        self.funded = true;
    }

    /// Unlock the reserve for spending. Requires funding to have happened
    /// first; idempotent once unlocked.
    pub fn unlock(&mut self) -> Result<()> {
        if !self.funded {
            return Err(LifecycleError::invariant(
                "cannot unlock an unfunded lifecycle reserve",
            ));
        }
        self.unlocked = true;
        Ok(())
    }

    /// Spendable balance right now: zero while locked, otherwise the
    /// remaining unspent total.
    pub fn effective_balance_cents(&self) -> u64 {
        if self.unlocked {
            self.total_cents.saturating_sub(self.spent_cents)
        } else {
            0
        }
    }

    /// How much of an external, raw account balance `external_balance_cents`
    /// is actually free to spend once this reserve's `total_cents` has been
    /// set aside out of it: `max(0, b - total(r))`. Distinct from
    /// [`LifecycleReserve::effective_balance_cents`], which reports the
    /// reserve's own ring-fenced spendable amount post-unlock — this instead
    /// tells a caller holding some larger balance (e.g. bequest principal)
    /// how much of *that* balance remains after this reserve's carve-out,
    /// regardless of whether the reserve itself is funded or unlocked.
    pub fn external_effective_balance_cents(&self, external_balance_cents: u64) -> u64 {
        external_balance_cents.saturating_sub(self.total_cents)
    }

    pub fn spend(&mut self, amount_cents: u64) -> Result<()> {
        if !self.unlocked {
            return Err(LifecycleError::invariant(
                "cannot spend from a locked lifecycle reserve",
            ));
        }
        if amount_cents > self.effective_balance_cents() {
            return Err(LifecycleError::invariant(format!(
                "insufficient reserve balance: requested {} cents, have {} cents",
                amount_cents,
                self.effective_balance_cents()
            )));
        }
        self.spent_cents += amount_cents;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_locked_and_unfunded_with_zero_effective_balance() {
        let reserve = LifecycleReserve::new(325);
        assert!(!reserve.funded);
        assert!(!reserve.unlocked);
        assert_eq!(reserve.effective_balance_cents(), 0);
    }

    #[test]
    fn cannot_unlock_before_funding() {
        let mut reserve = LifecycleReserve::new(325);
        assert!(reserve.unlock().is_err());
    }

    #[test]
    fn fund_then_unlock_exposes_full_balance() {
        let mut reserve = LifecycleReserve::new(325);
        reserve.fund();
        reserve.unlock().unwrap();
        assert_eq!(reserve.effective_balance_cents(), 325);
    }

    #[test]
    fn spend_reduces_effective_balance_and_rejects_overdraw() {
        let mut reserve = LifecycleReserve::new(100);
        reserve.fund();
        reserve.unlock().unwrap();
        reserve.spend(40).unwrap();
        assert_eq!(reserve.effective_balance_cents(), 60);
        assert!(reserve.spend(61).is_err());
    }

    #[test]
    fn external_effective_balance_subtracts_total_and_floors_at_zero() {
        let reserve = LifecycleReserve::new(325);
        assert_eq!(reserve.external_effective_balance_cents(1_000), 675);
        assert_eq!(reserve.external_effective_balance_cents(325), 0);
        assert_eq!(reserve.external_effective_balance_cents(100), 0);
    }

    #[test]
    fn flags_are_monotone_and_idempotent() {
        let mut reserve = LifecycleReserve::new(100);
        reserve.fund();
        reserve.fund();
        reserve.unlock().unwrap();
        reserve.unlock().unwrap();
        assert!(reserve.funded);
        assert!(reserve.unlocked);
    }
}
