use log::warn;
use num_bigint::BigInt;
use num_traits::Zero;

use crate::errors::{ContextError, ContextResult};

/// Running total of every value transfer. Each transfer is recorded as a
/// `+amount` on one side and a `-amount` on the other, so the total is zero
/// at every conservation checkpoint unless value was created or destroyed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceAccumulator {
    total: BigInt,
}

impl BalanceAccumulator {
    pub fn record_transfer(&mut self, amount: &BigInt) {
        self.total += amount;
    }

    pub fn total(&self) -> &BigInt {
        &self.total
    }

    pub fn check_zero(&self) -> bool {
        self.total.is_zero()
    }

    /// Fails with the residual if transfers do not net to zero.
    pub fn checkpoint(&self) -> ContextResult<()> {
        if self.check_zero() {
            return Ok(());
        }
        warn!("Balance conservation violated, residual {}", self.total);
        Err(ContextError::BalanceConservationViolation {
            residual: self.total.clone(),
        })
    }

    pub fn reset(&mut self) {
        self.total.set_zero();
    }
}
