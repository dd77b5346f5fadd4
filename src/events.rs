//! # Events
//! Events emitted by the lease pool, allowing off-ledger services to track
//! state changes.

use crate::shared_structs::LeaseStatus;
use scrypto::prelude::*;

/// Emitted when collateral is supplied and a new supply lot is minted.
#[derive(ScryptoSbor, ScryptoEvent)]
pub struct EventSupply {
    pub lot_id: NonFungibleLocalId,
    pub collateral_ids: Vec<NonFungibleLocalId>,
    pub shares_minted: Decimal,
}

/// Emitted when collateral is redeemed against a supply lot.
#[derive(ScryptoSbor, ScryptoEvent)]
pub struct EventRedeem {
    pub lot_id: NonFungibleLocalId,
    pub collateral_ids: Vec<NonFungibleLocalId>,
    pub shares_burned: Decimal,
    pub profit_paid: Decimal,
    /// True when the lot was emptied and its receipt burned.
    pub closed: bool,
}

/// Emitted when a supply lot claims its accrued profit.
#[derive(ScryptoSbor, ScryptoEvent)]
pub struct EventClaimProfit {
    pub lot_id: NonFungibleLocalId,
    pub profit_paid: Decimal,
}

/// Emitted when a new lease position is opened.
#[derive(ScryptoSbor, ScryptoEvent)]
pub struct EventOpenLease {
    pub position_id: NonFungibleLocalId,
    pub share_amount: Decimal,
    pub period: u64,
    pub rate_per_block: Decimal,
    pub margin: Decimal,
}

/// Emitted when an active lease is resized. A resize closes the old terms and
/// re-prices the position at the current rate.
#[derive(ScryptoSbor, ScryptoEvent)]
pub struct EventResizeLease {
    pub position_id: NonFungibleLocalId,
    pub share_amount: Decimal,
    pub period: u64,
    pub rate_per_block: Decimal,
    pub margin: Decimal,
}

/// Emitted when a lease position reaches a terminal status, whether closed by
/// the borrower, swept after expiry or exhaustion, or force-closed by the
/// pool owner.
#[derive(ScryptoSbor, ScryptoEvent)]
pub struct EventCloseLease {
    pub position_id: NonFungibleLocalId,
    pub status: LeaseStatus,
    pub margin_refunded: Decimal,
}

/// Emitted when a parked margin refund is retrieved by the position holder.
#[derive(ScryptoSbor, ScryptoEvent)]
pub struct EventRetrieveMargin {
    pub position_id: NonFungibleLocalId,
    pub amount: Decimal,
}

/// Emitted when the pool owner changes the pool parameters.
#[derive(ScryptoSbor, ScryptoEvent)]
pub struct EventSetParameters {
    pub share_per_collateral: Decimal,
    pub minimum_period: u64,
    pub maximum_period: u64,
    pub max_batch_size: u64,
}
