//! # Shared Structs
//! Houses the structs used by multiple blueprints / tests / frontends.

use scrypto::prelude::*;

/// Status a lease position can be in.
///
/// A position is `Active` from open until it reaches a terminal status. All
/// other variants are terminal: `Cancelled` (closed by the borrower or forced
/// by the pool owner before expiry), `Expired` (ran to the end of its period
/// with margin to spare), `Liquidated` (margin fully consumed).
#[derive(ScryptoSbor, PartialEq, Clone, Debug)]
pub enum LeaseStatus {
    Active,
    Cancelled,
    Expired,
    Liquidated,
}

/// Receipt data for a supply lot, minted when collateral is deposited.
///
/// The lot tracks which collateral NFTs back it, the pool shares it minted,
/// and the accumulator snapshot from its last profit settlement.
#[derive(ScryptoSbor, NonFungibleData, Clone, Debug)]
pub struct SupplyLot {
    #[mutable]
    pub key_image_url: Url,
    /// Local ids of the collateral NFTs this lot deposited.
    #[mutable]
    pub collateral_ids: Vec<NonFungibleLocalId>,
    /// Pool shares minted against this lot's collateral.
    #[mutable]
    pub shares: Decimal,
    /// `acc_profit_per_share` at the lot's last settlement.
    #[mutable]
    pub profit_debt: Decimal,
}

/// Receipt data for a lease position.
///
/// The rate is fixed at open; the margin escrowed at open covers the full
/// period at that rate. `margin` is zeroed when the position is finalized and
/// its refund (if any) paid out or parked.
#[derive(ScryptoSbor, NonFungibleData, Clone, Debug)]
pub struct LeasePosition {
    #[mutable]
    pub key_image_url: Url,
    /// Pool shares under this lease.
    #[mutable]
    pub share_amount: Decimal,
    /// Margin escrowed, in currency.
    #[mutable]
    pub margin: Decimal,
    /// Per-block rate locked in at open, per share.
    #[mutable]
    pub rate_per_block: Decimal,
    /// Block at which the lease opened.
    #[mutable]
    pub start_block: u64,
    /// Lease length in blocks.
    #[mutable]
    pub period: u64,
    #[mutable]
    pub status: LeaseStatus,
}

impl LeasePosition {
    /// First block at which the lease is no longer active.
    pub fn expiry_block(&self) -> u64 {
        self.start_block + self.period
    }

    /// Margin remaining at `at_block`: the escrowed margin minus the per-block
    /// burn over the elapsed blocks, floored at zero. Consumption stops at the
    /// end of the period. Terminal positions hold no margin.
    pub fn margin_left(&self, at_block: u64) -> Decimal {
        if self.status != LeaseStatus::Active {
            return Decimal::ZERO;
        }
        let elapsed = at_block.saturating_sub(self.start_block).min(self.period);
        let consumed = Decimal::from(elapsed) * self.rate_per_block * self.share_amount;
        (self.margin - consumed).max(Decimal::ZERO)
    }
}

/// Adjustable pool parameters, settable by the pool owner.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct LeasePoolParameters {
    /// Pool shares minted per deposited collateral NFT.
    pub share_per_collateral: Decimal,
    /// Shortest accepted lease period, in blocks.
    pub minimum_period: u64,
    /// Longest accepted lease period, in blocks.
    pub maximum_period: u64,
    /// When true, new supplies are rejected.
    pub stop_supplies: bool,
    /// When true, new leases and upward resizes are rejected.
    pub stop_leases: bool,
    /// Most collateral ids / receipt ids accepted in one call.
    pub max_batch_size: u64,
}

/// Pool-wide info returned by the `get_pool_info` method.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct PoolInfoReturn {
    pub collateral_address: ResourceAddress,
    pub currency_address: ResourceAddress,
    pub total_supply: Decimal,
    pub total_lease_amount: Decimal,
    pub debit_per_block: Decimal,
    pub acc_profit_per_share: Decimal,
    pub last_accrual_block: u64,
    pub current_rate_per_block: Decimal,
    pub collateral_amount: Decimal,
    pub margin_balance: Decimal,
    pub profit_balance: Decimal,
    pub parameters: LeasePoolParameters,
}

/// One block's worth of scheduled lease expiries.
///
/// Keyed by expiry block in the pool's schedule; when accrual walks past the
/// key, these aggregates are released from the pool totals.
#[derive(ScryptoSbor, Clone, Debug)]
pub struct ExpirySlot {
    /// Shares whose leases end at this block.
    pub lease_shares: Decimal,
    /// Summed `rate * shares` of those leases.
    pub debit_per_block: Decimal,
}
