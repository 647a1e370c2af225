//! Minor-unit amount type
//!
//! All funds in AgentMarket are integer minor currency units (cents). The
//! engine assumes a single currency from its host ledger, so `Amount` is a
//! plain `u64` newtype with overflow-checked arithmetic. Fractional values
//! never enter the system.

use serde::{Deserialize, Serialize};
use std::fmt;

/// An amount in minor currency units
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(pub u64);

impl Amount {
    /// Create a new amount from minor units
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// The zero amount
    pub fn zero() -> Self {
        Self(0)
    }

    /// Raw value in minor units
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Check if the amount is zero
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// Truncating percentage of this amount (`pct` in 0-100)
    ///
    /// Computed in u128 so the intermediate product cannot overflow; the
    /// result never exceeds the original amount.
    pub fn percentage(self, pct: u8) -> Self {
        Self((self.0 as u128 * pct as u128 / 100) as u64)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Display as major units with 2 decimal places (assuming cents)
        write!(f, "${:.2}", self.0 as f64 / 100.0)
    }
}

impl From<u64> for Amount {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_arithmetic() {
        let a = Amount::new(100);
        let b = Amount::new(40);

        assert_eq!(a.checked_add(b), Some(Amount::new(140)));
        assert_eq!(a.checked_sub(b), Some(Amount::new(60)));
        assert_eq!(b.checked_sub(a), None);
        assert_eq!(Amount::new(u64::MAX).checked_add(Amount::new(1)), None);
    }

    #[test]
    fn test_percentage_truncates() {
        assert_eq!(Amount::new(100).percentage(85), Amount::new(85));
        assert_eq!(Amount::new(7).percentage(85), Amount::new(5));
        assert_eq!(Amount::new(7).percentage(10), Amount::new(0));
    }

    #[test]
    fn test_percentage_no_overflow() {
        // Intermediate product exceeds u64 but the result must not.
        assert_eq!(Amount::new(u64::MAX).percentage(100), Amount::new(u64::MAX));
    }

    #[test]
    fn test_display() {
        assert_eq!(Amount::new(12345).to_string(), "$123.45");
    }
}
