//! # Lease Pool Crate
//!
//! This crate contains the Scrypto blueprints for an NFT-collateralized lease pool.
//! Suppliers deposit non-fungible collateral from a configured collection and receive
//! fungible pool shares, recorded on a supply-lot receipt NFT. Borrowers lease pooled
//! shares by escrowing margin, priced per block by a utilization-sensitive interest
//! rate model. Consumed margin streams pro-rata to suppliers through a
//! profit-per-share accumulator.
//!
//! ## Modules
//!
//! The crate is organized into the following modules:
//!
//! - `pool_component`: Defines the main `LeasePool` component, which holds the
//!   collateral, margin, and profit vaults, manages supply lots and lease positions,
//!   and accrues supplier profit per block. This is the heart of the pool's logic.
//! - `pool_state`: The aggregate ledger of the pool: total shares, total leased
//!   shares, the per-block margin debit, and the profit-per-share accumulator,
//!   together with the accounting math that keeps them consistent.
//! - `interest`: The interest rate model, a pure function from pool utilization to a
//!   per-block lease rate.
//! - `shared_structs`: Data structures shared across the blueprint and its callers,
//!   such as `SupplyLot`, `LeasePosition`, and the info-return structs.
//! - `events`: Defines the events emitted by the pool, allowing off-ledger services
//!   to track state changes.

pub mod events;
pub mod interest;
pub mod pool_component;
pub mod pool_state;
pub mod shared_structs;
