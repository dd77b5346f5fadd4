//! # Pool State
//!
//! The aggregate ledger of the lease pool: total shares outstanding, total
//! shares under lease, the summed per-block margin debit of all active leases,
//! and the profit-per-share accumulator that distributes consumed margin
//! pro-rata to suppliers.
//!
//! All mutations assert their invariants; a failed assert aborts the whole
//! transaction, so the aggregates can never be observed mid-update.

use scrypto::prelude::*;

/// Aggregate pool accounting.
///
/// `acc_profit_per_share` only ever grows. A supply lot's claimable profit is
/// `shares * (acc_profit_per_share - profit_debt)`, where `profit_debt` is the
/// accumulator value snapshotted when the lot last settled.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct PoolState {
    /// Total pool shares outstanding (18 decimals).
    pub total_supply: Decimal,
    /// Shares currently under active lease. Never exceeds `total_supply`.
    pub total_lease_amount: Decimal,
    /// Sum of `rate_at_open * shares` over all active leases: the currency
    /// debited from margins per block.
    pub debit_per_block: Decimal,
    /// Cumulative profit distributed per pool share.
    pub acc_profit_per_share: Decimal,
    /// Block up to which profit has been credited.
    pub last_accrual_block: u64,
}

impl PoolState {
    pub fn new(at_block: u64) -> Self {
        Self {
            total_supply: Decimal::ZERO,
            total_lease_amount: Decimal::ZERO,
            debit_per_block: Decimal::ZERO,
            acc_profit_per_share: Decimal::ZERO,
            last_accrual_block: at_block,
        }
    }

    /// Advances the accumulator to `to_block` and returns the currency amount
    /// debited from lease margins over the elapsed blocks.
    ///
    /// When the pool holds no shares there is nobody to credit, and no active
    /// lease can exist either, so the elapsed blocks are simply skipped.
    pub fn credit(&mut self, to_block: u64) -> Decimal {
        if to_block <= self.last_accrual_block {
            return Decimal::ZERO;
        }
        let blocks = Decimal::from(to_block - self.last_accrual_block);
        self.last_accrual_block = to_block;

        let profit = blocks * self.debit_per_block;
        if profit > Decimal::ZERO && self.total_supply > Decimal::ZERO {
            self.acc_profit_per_share += profit / self.total_supply;
        }
        profit
    }

    pub fn mint_shares(&mut self, amount: Decimal) {
        assert!(
            amount > Decimal::ZERO,
            "Invalid argument: share amount must be positive."
        );
        self.total_supply += amount;
    }

    /// Burns shares, refusing any burn that would leave fewer shares than are
    /// currently under lease.
    pub fn burn_shares(&mut self, amount: Decimal) {
        assert!(
            amount > Decimal::ZERO,
            "Invalid argument: share amount must be positive."
        );
        assert!(
            amount <= self.total_supply,
            "Insufficient shares: burn exceeds total supply."
        );
        assert!(
            self.total_supply - amount >= self.total_lease_amount,
            "Pool over-leased: redeeming these shares would leave the pool with fewer shares than are under lease."
        );
        self.total_supply -= amount;
    }

    /// Registers a newly opened lease at the rate it was priced at.
    pub fn open_lease(&mut self, shares: Decimal, rate_per_block: Decimal) {
        assert!(
            shares > Decimal::ZERO,
            "Invalid argument: share amount must be positive."
        );
        assert!(
            self.total_lease_amount + shares <= self.total_supply,
            "Insufficient liquidity: lease exceeds available pool shares."
        );
        self.total_lease_amount += shares;
        self.debit_per_block += rate_per_block * shares;
    }

    /// Releases a lease closed before its scheduled expiry.
    pub fn close_lease(&mut self, shares: Decimal, rate_per_block: Decimal) {
        self.total_lease_amount -= shares;
        self.debit_per_block -= rate_per_block * shares;
        assert!(
            self.total_lease_amount >= Decimal::ZERO && self.debit_per_block >= Decimal::ZERO,
            "Invalid argument: lease aggregates underflowed."
        );
    }

    /// Releases an expiry slot's worth of leases in one step, after their
    /// final block has been credited.
    pub fn expire_slot(&mut self, lease_shares: Decimal, debit_per_block: Decimal) {
        self.total_lease_amount -= lease_shares;
        self.debit_per_block -= debit_per_block;
        assert!(
            self.total_lease_amount >= Decimal::ZERO && self.debit_per_block >= Decimal::ZERO,
            "Invalid argument: lease aggregates underflowed."
        );
    }

    /// Profit claimable by `shares` whose last settlement snapshotted the
    /// accumulator at `profit_debt`.
    pub fn pending_profit(&self, shares: Decimal, profit_debt: Decimal) -> Decimal {
        shares * (self.acc_profit_per_share - profit_debt)
    }
}
