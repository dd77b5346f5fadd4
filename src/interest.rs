//! # Interest Rate Model
//!
//! Pure pricing math for the lease pool. The per-block lease rate is a linear
//! function of pool utilization: `rate = base_rate + multiplier * utilization`,
//! where utilization is the leased share of total supply. Rates are quoted in
//! currency per share per block.

use scrypto::prelude::*;

/// Utilization-linear per-block rate model.
///
/// Both parameters are fixed at instantiation. The model itself holds no pool
/// state; callers pass the supply and lease totals (plus hypothetical deltas)
/// at every quote.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct InterestRateModel {
    /// Rate charged at zero utilization, per share per block.
    pub base_rate: Decimal,
    /// Additional rate at full utilization, per share per block.
    pub multiplier: Decimal,
}

impl InterestRateModel {
    pub fn new(base_rate: Decimal, multiplier: Decimal) -> Self {
        assert!(
            base_rate >= Decimal::ZERO && multiplier >= Decimal::ZERO,
            "Invalid argument: rate parameters must be non-negative."
        );
        Self {
            base_rate,
            multiplier,
        }
    }

    /// Quotes the per-block rate for the pool state that would result from
    /// applying the given deltas. With both deltas zero this is the current
    /// lease price.
    ///
    /// An empty pool quotes the base rate. Utilization is clamped to [0, 1] so
    /// that a quote never extrapolates past the full-utilization rate.
    pub fn rate_per_block(
        &self,
        total_supply: Decimal,
        total_lease_amount: Decimal,
        supply_delta: Decimal,
        lease_delta: Decimal,
    ) -> Decimal {
        assert!(
            supply_delta >= Decimal::ZERO && lease_delta >= Decimal::ZERO,
            "Invalid argument: deltas must be non-negative."
        );

        let supplied = total_supply + supply_delta;
        let leased = total_lease_amount + lease_delta;

        if supplied == Decimal::ZERO {
            return self.base_rate;
        }

        let utilization = (leased / supplied)
            .max(Decimal::ZERO)
            .min(Decimal::ONE);

        self.base_rate + self.multiplier * utilization
    }
}
