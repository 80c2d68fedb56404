//! Plan Pricing
//!
//! Server-side price list used to verify the total a client submits.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::error::{PaymentError, Result};

/// Premium prices in USD, keyed by duration in months
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlanCatalog {
    prices: BTreeMap<u32, Decimal>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::new([
            (1, dec!(4.99)),
            (3, dec!(12.99)),
            (6, dec!(23.99)),
            (12, dec!(44.99)),
        ])
    }
}

impl PlanCatalog {
    pub fn new(prices: impl IntoIterator<Item = (u32, Decimal)>) -> Self {
        Self {
            prices: prices.into_iter().collect(),
        }
    }

    /// Parse `"1:4.99,3:12.99"`
    pub fn parse(raw: &str) -> Result<Self> {
        let mut prices = BTreeMap::new();
        for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (months, price) = entry
                .split_once(':')
                .ok_or_else(|| PaymentError::Config(format!("bad plan entry '{entry}'")))?;
            let months: u32 = months
                .trim()
                .parse()
                .map_err(|_| PaymentError::Config(format!("bad plan duration '{months}'")))?;
            let price: Decimal = price
                .trim()
                .parse()
                .map_err(|_| PaymentError::Config(format!("bad plan price '{price}'")))?;
            if months == 0 || price <= Decimal::ZERO {
                return Err(PaymentError::Config(format!("bad plan entry '{entry}'")));
            }
            prices.insert(months, price);
        }

        if prices.is_empty() {
            return Err(PaymentError::Config("PLAN_PRICES is empty".into()));
        }
        Ok(Self { prices })
    }

    /// Expected total for a duration
    pub fn price_for(&self, months: u32) -> Option<Decimal> {
        self.prices.get(&months).copied()
    }

    /// Durations on sale
    pub fn durations(&self) -> impl Iterator<Item = u32> + '_ {
        self.prices.keys().copied()
    }

    /// Reject a submitted total that differs from the plan price (to the cent)
    pub fn verify(&self, months: u32, submitted: Decimal) -> Result<()> {
        let expected = self
            .price_for(months)
            .ok_or(PaymentError::UnknownPlan(months))?;

        if submitted.round_dp(2) == expected.round_dp(2) {
            Ok(())
        } else {
            Err(PaymentError::AmountMismatch {
                months,
                expected,
                submitted,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog() {
        let catalog = PlanCatalog::default();
        assert_eq!(catalog.price_for(3), Some(dec!(12.99)));
        assert_eq!(catalog.durations().collect::<Vec<_>>(), vec![1, 3, 6, 12]);
    }

    #[test]
    fn test_verify_accepts_exact_price() {
        let catalog = PlanCatalog::default();
        assert!(catalog.verify(1, dec!(4.99)).is_ok());
        assert!(catalog.verify(1, dec!(4.990)).is_ok());
    }

    #[test]
    fn test_verify_rejects_mismatch() {
        let catalog = PlanCatalog::default();
        let err = catalog.verify(12, dec!(0.01)).unwrap_err();
        assert!(matches!(err, PaymentError::AmountMismatch { months: 12, .. }));

        let err = catalog.verify(2, dec!(9.98)).unwrap_err();
        assert!(matches!(err, PaymentError::UnknownPlan(2)));
    }

    #[test]
    fn test_parse() {
        let catalog = PlanCatalog::parse("1:5, 12:50.00").unwrap();
        assert_eq!(catalog.price_for(12), Some(dec!(50.00)));
        assert!(PlanCatalog::parse("1-5").is_err());
        assert!(PlanCatalog::parse("0:5").is_err());
        assert!(PlanCatalog::parse("").is_err());
    }
}
