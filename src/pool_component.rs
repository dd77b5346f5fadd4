//! # The Lease Pool Blueprint
//!
//! This blueprint defines the core component of the lease pool, responsible for holding
//! deposited collateral NFTs, minting pool shares against them, pricing and escrowing
//! lease margins, and streaming consumed margin to suppliers as profit.
//!
//! ## Overview
//! - **Supply:** Deposit NFTs from the accepted collection and receive a supply-lot
//!   receipt recording the pool shares minted against them.
//! - **Redeem:** Present the supply-lot receipt to withdraw collateral and burn the
//!   matching shares. Redemption fails while it would leave the pool with fewer shares
//!   than are under lease.
//! - **Lease:** Escrow margin to lease pooled shares for a fixed period. The per-block
//!   rate is locked at open, priced by the utilization-linear rate model, and the
//!   escrowed margin covers the full period at that rate.
//! - **Accrual:** Every mutating entry point first credits elapsed blocks: margin is
//!   consumed at the summed open-time rates of all active leases and distributed to
//!   suppliers through a profit-per-share accumulator. Leases that reached their expiry
//!   block are released from the pool totals during the same walk, so no supplier is
//!   ever credited for blocks past a lease's end.
//! - **Close / Sweep:** Borrowers close their own positions early for a refund of
//!   unconsumed margin. Anyone may sweep positions that ran to expiry; their refunds
//!   (if any) are parked for the position holder to retrieve.
//!
//! ## Key Concepts
//! - **Pool shares:** Fungible 18-decimal claims on the pooled collateral and its
//!   profit stream, recorded on supply-lot receipts.
//! - **Supply lot:** NFT receipt for a deposit, tracking its collateral ids, shares,
//!   and last profit settlement.
//! - **Lease position:** NFT receipt for a lease, fixing shares, rate, margin, start
//!   block, and period.
//! - **Profit-per-share accumulator:** Monotone counter of profit distributed per pool
//!   share. A lot's claim is its shares times the accumulator growth since the lot
//!   last settled.

use crate::events::*;
use crate::interest::InterestRateModel;
use crate::pool_state::PoolState;
use crate::shared_structs::*;
use scrypto::prelude::*;
use scrypto_avltree::AvlTree;

#[blueprint]
#[types(u64, Decimal, NonFungibleLocalId, Vault, ExpirySlot, SupplyLot, LeasePosition, AvlTree<u64, ExpirySlot>)]
#[events(
    EventSupply,
    EventRedeem,
    EventClaimProfit,
    EventOpenLease,
    EventResizeLease,
    EventCloseLease,
    EventRetrieveMargin,
    EventSetParameters,
)]
mod pool_component {
    enable_method_auth! {
        methods {
            cancel_lease => restrict_to: [OWNER];
            set_parameters => restrict_to: [OWNER];
            set_stops => restrict_to: [OWNER];
            mint_controller_badge => restrict_to: [OWNER];
            supply => PUBLIC;
            redeem => PUBLIC;
            claim_supply_profit => PUBLIC;
            lease => PUBLIC;
            resize_lease => PUBLIC;
            close_position => PUBLIC;
            sweep_positions => PUBLIC;
            retrieve_margin => PUBLIC;
            get_lease_price => PUBLIC;
            pending_profit => PUBLIC;
            margin_left => PUBLIC;
            total_supply => PUBLIC;
            total_lease_amount => PUBLIC;
            get_pool_info => PUBLIC;
            get_lots_info => PUBLIC;
            get_positions_info => PUBLIC;
            get_lot_of_collateral => PUBLIC;
        }
    }
    struct LeasePool {
        /// The NFT collection accepted as collateral.
        collateral_address: ResourceAddress,
        /// The fungible currency margins and profit are denominated in.
        currency_address: ResourceAddress,
        /// Holds all deposited collateral NFTs.
        collateral_vault: NonFungibleVault,
        /// Escrowed margin of active leases and not-yet-paid expiry leftovers.
        margin_vault: Vault,
        /// Credited profit, claimable by supply lots.
        profit_vault: Vault,
        /// Margin refunds parked by sweeps and forced cancels, keyed by position id.
        refunds: KeyValueStore<NonFungibleLocalId, Vault>,
        /// Maps each deposited collateral id to the supply lot holding it.
        deposited: KeyValueStore<NonFungibleLocalId, NonFungibleLocalId>,
        /// The `ResourceManager` for supply-lot receipt NFTs (`SupplyLot` struct).
        lot_manager: ResourceManager,
        /// The `ResourceManager` for lease position NFTs (`LeasePosition` struct).
        position_manager: ResourceManager,
        /// The `ResourceManager` for the controller badge, used for authorization.
        controller_badge_manager: ResourceManager,
        /// Aggregate share / lease / profit accounting.
        pool_state: PoolState,
        /// The utilization-linear rate model, fixed at instantiation.
        rate_model: InterestRateModel,
        /// Scheduled lease expiries, keyed by expiry block.
        expiries: AvlTree<u64, ExpirySlot>,
        /// Counter generating unique supply lot ids.
        lot_counter: u64,
        /// Counter generating unique lease position ids.
        position_counter: u64,
        /// Configurable pool parameters.
        parameters: LeasePoolParameters,
    }

    impl LeasePool {
        /// Instantiates a `LeasePool` component and its associated resources.
        ///
        /// # Arguments
        /// * `collateral_address`: The NFT collection accepted as collateral.
        /// * `currency_address`: The fungible resource margins are paid in.
        /// * `base_rate`: Per-block rate at zero utilization.
        /// * `multiplier`: Additional per-block rate at full utilization.
        /// * `dapp_def_address`: The `GlobalAddress` of the DApp Definition account for metadata linkage.
        ///
        /// # Returns
        /// A tuple containing:
        /// * `Global<LeasePool>`: A global reference to the newly instantiated component.
        /// * `Bucket`: The initially minted controller badges (supply: 10).
        /// * `ResourceAddress`: The supply-lot receipt NFT address.
        /// * `ResourceAddress`: The lease position NFT address.
        ///
        /// # Logic
        /// 1. Creates the controller badge, mintable only by the component, and mints 10.
        /// 2. Creates the supply-lot and lease-position NFT managers. Minting, burning and
        ///    data updates require the component itself or 0.75 of a controller badge.
        /// 3. Instantiates the component with empty vaults and default parameters and
        ///    globalizes it with the controller badge as owner.
        pub fn instantiate(
            collateral_address: ResourceAddress,
            currency_address: ResourceAddress,
            base_rate: Decimal,
            multiplier: Decimal,
            dapp_def_address: GlobalAddress,
        ) -> (Global<LeasePool>, Bucket, ResourceAddress, ResourceAddress) {
            assert!(
                !collateral_address.is_fungible(),
                "Invalid argument: collateral must be a non-fungible collection."
            );
            assert!(
                currency_address.is_fungible(),
                "Invalid argument: currency must be a fungible resource."
            );

            let parameters = LeasePoolParameters {
                share_per_collateral: Decimal::ONE,
                minimum_period: 1,
                maximum_period: 5_256_000,
                stop_supplies: false,
                stop_leases: false,
                max_batch_size: 250,
            };

            let (address_reservation, component_address) =
                Runtime::allocate_component_address(LeasePool::blueprint_id());

            let controller_role: Bucket = ResourceBuilder::new_fungible(OwnerRole::Fixed(rule!(
                require(global_caller(component_address))
            )))
            .divisibility(DIVISIBILITY_MAXIMUM)
            .metadata(metadata! (
                init {
                    "name" => "controller badge lease pool", locked;
                    "symbol" => "leaseCTRL", locked;
                }
            ))
            .mint_roles(mint_roles!(
                minter => rule!(require(global_caller(component_address)));
                minter_updater => rule!(deny_all);
            ))
            .mint_initial_supply(10)
            .into();

            let controller_badge_manager: ResourceManager = controller_role.resource_manager();

            let lot_manager: ResourceManager =
                ResourceBuilder::new_integer_non_fungible_with_registered_type::<SupplyLot>(OwnerRole::Fixed(rule!(
                    require_amount(dec!("0.75"), controller_role.resource_address())
                )))
                .metadata(metadata!(
                    init {
                        "name" => "Lease Pool Supply Lot", locked;
                        "symbol" => "poolSUP", locked;
                        "description" => "A receipt for collateral supplied to the lease pool.", locked;
                        "dapp_definitions" => vec![dapp_def_address], updatable;
                    }
                ))
                .non_fungible_data_update_roles(non_fungible_data_update_roles!(
                    non_fungible_data_updater => rule!(require(global_caller(component_address))
                        || require_amount(
                            dec!("0.75"),
                            controller_role.resource_address()
                        ));
                    non_fungible_data_updater_updater => rule!(require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                ))
                .mint_roles(mint_roles!(
                    minter => rule!(require(global_caller(component_address))
                    || require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                    minter_updater => rule!(require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                ))
                .burn_roles(burn_roles!(
                    burner => rule!(require(global_caller(component_address))
                    || require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                    burner_updater => rule!(require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                ))
                .create_with_no_initial_supply()
                .into();

            let position_manager: ResourceManager =
                ResourceBuilder::new_integer_non_fungible_with_registered_type::<LeasePosition>(OwnerRole::Fixed(rule!(
                    require_amount(dec!("0.75"), controller_role.resource_address())
                )))
                .metadata(metadata!(
                    init {
                        "name" => "Lease Pool Position", locked;
                        "symbol" => "poolLEASE", locked;
                        "description" => "A receipt for a lease of pooled shares.", locked;
                        "dapp_definitions" => vec![dapp_def_address], updatable;
                    }
                ))
                .non_fungible_data_update_roles(non_fungible_data_update_roles!(
                    non_fungible_data_updater => rule!(require(global_caller(component_address))
                        || require_amount(
                            dec!("0.75"),
                            controller_role.resource_address()
                        ));
                    non_fungible_data_updater_updater => rule!(require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                ))
                .mint_roles(mint_roles!(
                    minter => rule!(require(global_caller(component_address))
                    || require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                    minter_updater => rule!(require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                ))
                .burn_roles(burn_roles!(
                    burner => rule!(require(global_caller(component_address))
                    || require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                    burner_updater => rule!(require_amount(
                        dec!("0.75"),
                        controller_role.resource_address()
                    ));
                ))
                .create_with_no_initial_supply()
                .into();

            let pool = Self {
                collateral_address,
                currency_address,
                collateral_vault: NonFungibleVault::new(collateral_address),
                margin_vault: Vault::new(currency_address),
                profit_vault: Vault::new(currency_address),
                refunds: KeyValueStore::new_with_registered_type(),
                deposited: KeyValueStore::new_with_registered_type(),
                lot_manager,
                position_manager,
                controller_badge_manager,
                pool_state: PoolState::new(Runtime::current_epoch().number()),
                rate_model: InterestRateModel::new(base_rate, multiplier),
                expiries: AvlTree::new(),
                lot_counter: 0,
                position_counter: 0,
                parameters,
            }
            .instantiate()
            .prepare_to_globalize(OwnerRole::Fixed(rule!(require_amount(
                dec!("0.75"),
                controller_role.resource_address()
            ))))
            .with_address(address_reservation)
            .metadata(metadata! {
                init {
                    "name" => "Lease Pool".to_string(), updatable;
                    "description" => "An NFT-collateralized lease pool.".to_string(), updatable;
                    "dapp_definition" => dapp_def_address, updatable;
                }
            })
            .globalize();

            (
                pool,
                controller_role,
                lot_manager.address(),
                position_manager.address(),
            )
        }

        /// Deposits collateral NFTs and mints a supply lot receipt.
        ///
        /// Shares are minted at `share_per_collateral` per NFT and the lot's profit
        /// settlement starts at the current accumulator, so a new supplier earns
        /// nothing for blocks before the deposit.
        ///
        /// # Panics
        /// * If supplies are stopped.
        /// * If the bucket is not from the accepted collection, is empty, or exceeds the batch size.
        pub fn supply(&mut self, collateral: NonFungibleBucket) -> Bucket {
            self.accrue();

            assert!(
                !self.parameters.stop_supplies,
                "Not allowed to supply right now."
            );
            assert!(
                collateral.resource_address() == self.collateral_address,
                "Not owner or not approved: supplied collateral is not from the accepted collection."
            );

            let ids: Vec<NonFungibleLocalId> =
                collateral.non_fungible_local_ids().into_iter().collect();
            assert!(
                !ids.is_empty(),
                "Invalid argument: empty collateral bucket."
            );
            assert!(
                ids.len() as u64 <= self.parameters.max_batch_size,
                "Invalid argument: too many collateral NFTs in one call."
            );

            let shares = self.parameters.share_per_collateral * Decimal::from(ids.len() as u64);
            self.pool_state.mint_shares(shares);

            self.lot_counter += 1;
            let lot_id = NonFungibleLocalId::integer(self.lot_counter);

            for id in &ids {
                self.deposited.insert(id.clone(), lot_id.clone());
            }

            let lot = SupplyLot {
                key_image_url: Url::of("https://leasepool.example/lot.png"),
                collateral_ids: ids.clone(),
                shares,
                profit_debt: self.pool_state.acc_profit_per_share,
            };

            let receipt = self.lot_manager.mint_non_fungible(&lot_id, lot);

            self.collateral_vault.put(collateral);

            Runtime::emit_event(EventSupply {
                lot_id,
                collateral_ids: ids,
                shares_minted: shares,
            });

            receipt
        }

        /// Redeems collateral against a supply lot receipt, burning the matching shares.
        ///
        /// Passing `None` for `collateral_ids` redeems the whole lot and burns the
        /// receipt; passing a subset withdraws only those NFTs and updates the receipt.
        /// Accrued profit is settled and paid out alongside.
        ///
        /// # Returns
        /// * The withdrawn collateral NFTs.
        /// * The lot's settled profit.
        /// * The updated receipt, or `None` when the lot was emptied.
        ///
        /// # Panics
        /// * If the receipt bucket does not hold exactly one supply lot receipt.
        /// * If a requested collateral id is not part of the lot.
        /// * If burning the shares would leave the pool with fewer shares than are under lease.
        pub fn redeem(
            &mut self,
            lot_receipt: NonFungibleBucket,
            collateral_ids: Option<Vec<NonFungibleLocalId>>,
        ) -> (NonFungibleBucket, Bucket, Option<NonFungibleBucket>) {
            self.accrue();

            assert!(
                lot_receipt.resource_address() == self.lot_manager.address(),
                "Invalid argument: not a supply lot receipt."
            );
            assert!(
                lot_receipt.amount() == Decimal::ONE,
                "Invalid argument: provide exactly one supply lot receipt."
            );

            let lot_id = lot_receipt.non_fungible_local_id();
            let lot: SupplyLot = self.lot_manager.get_non_fungible_data(&lot_id);

            let withdraw_ids: Vec<NonFungibleLocalId> = match collateral_ids {
                Some(ids) => {
                    assert!(
                        !ids.is_empty(),
                        "Invalid argument: empty collateral id list."
                    );
                    for id in &ids {
                        assert!(
                            lot.collateral_ids.contains(id),
                            "Not found: collateral is not part of this supply lot."
                        );
                    }
                    ids
                }
                None => lot.collateral_ids.clone(),
            };

            let profit = self.settle_lot_profit(&lot_id);

            // shares are burned at the lot's own mint ratio, so later parameter
            // changes never strand collateral
            let shares_per_nft = lot.shares / Decimal::from(lot.collateral_ids.len() as u64);
            let full_redemption = withdraw_ids.len() == lot.collateral_ids.len();
            let shares_to_burn = if full_redemption {
                lot.shares
            } else {
                shares_per_nft * Decimal::from(withdraw_ids.len() as u64)
            };

            self.pool_state.burn_shares(shares_to_burn);

            let mut id_set: IndexSet<NonFungibleLocalId> = IndexSet::new();
            for id in &withdraw_ids {
                id_set.insert(id.clone());
                self.deposited.remove(id);
            }
            let collateral = self.collateral_vault.take_non_fungibles(&id_set);

            let returned_receipt = if full_redemption {
                lot_receipt.burn();
                None
            } else {
                let remaining_ids: Vec<NonFungibleLocalId> = lot
                    .collateral_ids
                    .iter()
                    .filter(|id| !withdraw_ids.contains(id))
                    .cloned()
                    .collect();
                self.lot_manager.update_non_fungible_data(
                    &lot_id,
                    "collateral_ids",
                    remaining_ids,
                );
                self.lot_manager.update_non_fungible_data(
                    &lot_id,
                    "shares",
                    lot.shares - shares_to_burn,
                );
                Some(lot_receipt)
            };

            Runtime::emit_event(EventRedeem {
                lot_id,
                collateral_ids: withdraw_ids,
                shares_burned: shares_to_burn,
                profit_paid: profit.amount(),
                closed: full_redemption,
            });

            (collateral, profit, returned_receipt)
        }

        /// Pays out a supply lot's accrued profit and snapshots its settlement.
        pub fn claim_supply_profit(&mut self, lot_proof: NonFungibleProof) -> Bucket {
            self.accrue();

            let lot_proof = lot_proof.check_with_message(
                self.lot_manager.address(),
                "Incorrect proof! Are you sure this is a supply lot receipt?",
            );
            let lot_id = lot_proof.non_fungible::<SupplyLot>().local_id().clone();

            let profit = self.settle_lot_profit(&lot_id);

            Runtime::emit_event(EventClaimProfit {
                lot_id,
                profit_paid: profit.amount(),
            });

            profit
        }

        /// Opens a lease on pooled shares.
        ///
        /// The per-block rate is quoted at the utilization that includes this lease
        /// and locked in for its lifetime. The required margin, `rate * shares *
        /// period`, is taken from the payment and the change returned.
        ///
        /// # Returns
        /// * The lease position receipt.
        /// * The unused remainder of the margin payment.
        ///
        /// # Panics
        /// * If leases are stopped.
        /// * If the payment is not in the pool currency or does not cover the period.
        /// * If the period is out of bounds or the pool lacks unleased shares.
        pub fn lease(
            &mut self,
            mut margin_payment: Bucket,
            share_amount: Decimal,
            period: u64,
        ) -> (Bucket, Bucket) {
            self.accrue();

            assert!(
                !self.parameters.stop_leases,
                "Not allowed to lease right now."
            );
            assert!(
                margin_payment.resource_address() == self.currency_address,
                "Invalid argument: margin must be paid in the pool currency."
            );
            assert!(
                share_amount > Decimal::ZERO,
                "Invalid argument: share amount must be positive."
            );
            assert!(
                period >= self.parameters.minimum_period
                    && period <= self.parameters.maximum_period,
                "Invalid argument: lease period out of bounds."
            );

            let rate = self.rate_model.rate_per_block(
                self.pool_state.total_supply,
                self.pool_state.total_lease_amount,
                Decimal::ZERO,
                share_amount,
            );

            self.pool_state.open_lease(share_amount, rate);

            let margin = rate * share_amount * Decimal::from(period);
            assert!(
                margin_payment.amount() >= margin,
                "Invalid argument: margin payment does not cover the lease period."
            );
            self.margin_vault.put(margin_payment.take(margin));

            let now = Runtime::current_epoch().number();
            self.schedule_expiry(now + period, share_amount, rate * share_amount);

            self.position_counter += 1;
            let position_id = NonFungibleLocalId::integer(self.position_counter);

            let position = LeasePosition {
                key_image_url: Url::of("https://leasepool.example/lease.png"),
                share_amount,
                margin,
                rate_per_block: rate,
                start_block: now,
                period,
                status: LeaseStatus::Active,
            };

            let receipt = self
                .position_manager
                .mint_non_fungible(&position_id, position);

            Runtime::emit_event(EventOpenLease {
                position_id,
                share_amount,
                period,
                rate_per_block: rate,
                margin,
            });

            (receipt, margin_payment)
        }

        /// Resizes an active lease to new terms, re-priced at the current rate.
        ///
        /// The old terms are closed as of the current block: consumed margin stays
        /// with the pool, the remainder funds the new margin together with the
        /// payment. Resizing to zero shares closes the position.
        ///
        /// # Returns
        /// The currency left over after funding the new margin.
        pub fn resize_lease(
            &mut self,
            position_proof: NonFungibleProof,
            new_share_amount: Decimal,
            new_period: u64,
            payment: Bucket,
        ) -> Bucket {
            self.accrue();

            assert!(
                payment.resource_address() == self.currency_address,
                "Invalid argument: margin must be paid in the pool currency."
            );
            assert!(
                new_share_amount >= Decimal::ZERO,
                "Invalid argument: share amount must be non-negative."
            );

            let position_proof = position_proof.check_with_message(
                self.position_manager.address(),
                "Incorrect proof! Are you sure this is a lease position?",
            );
            let position_id = position_proof
                .non_fungible::<LeasePosition>()
                .local_id()
                .clone();
            let position: LeasePosition =
                self.position_manager.get_non_fungible_data(&position_id);

            let now = Runtime::current_epoch().number();
            assert!(
                position.status == LeaseStatus::Active && now < position.expiry_block(),
                "Not found: lease position is not active."
            );

            // release the old terms; the slot walk above has not touched them
            // since the expiry block is still in the future
            self.pool_state
                .close_lease(position.share_amount, position.rate_per_block);
            self.unschedule_expiry(
                position.expiry_block(),
                position.share_amount,
                position.rate_per_block * position.share_amount,
            );

            let mut returned = self.margin_vault.take(position.margin_left(now));
            returned.put(payment);

            if new_share_amount == Decimal::ZERO {
                self.position_manager.update_non_fungible_data(
                    &position_id,
                    "status",
                    LeaseStatus::Cancelled,
                );
                self.position_manager
                    .update_non_fungible_data(&position_id, "margin", Decimal::ZERO);

                Runtime::emit_event(EventCloseLease {
                    position_id,
                    status: LeaseStatus::Cancelled,
                    margin_refunded: returned.amount(),
                });

                return returned;
            }

            assert!(
                !self.parameters.stop_leases,
                "Not allowed to lease right now."
            );
            assert!(
                new_period >= self.parameters.minimum_period
                    && new_period <= self.parameters.maximum_period,
                "Invalid argument: lease period out of bounds."
            );

            let rate = self.rate_model.rate_per_block(
                self.pool_state.total_supply,
                self.pool_state.total_lease_amount,
                Decimal::ZERO,
                new_share_amount,
            );

            self.pool_state.open_lease(new_share_amount, rate);

            let margin = rate * new_share_amount * Decimal::from(new_period);
            assert!(
                returned.amount() >= margin,
                "Invalid argument: margin payment does not cover the lease period."
            );
            self.margin_vault.put(returned.take(margin));

            self.schedule_expiry(now + new_period, new_share_amount, rate * new_share_amount);

            self.position_manager.update_non_fungible_data(
                &position_id,
                "share_amount",
                new_share_amount,
            );
            self.position_manager
                .update_non_fungible_data(&position_id, "margin", margin);
            self.position_manager
                .update_non_fungible_data(&position_id, "rate_per_block", rate);
            self.position_manager
                .update_non_fungible_data(&position_id, "start_block", now);
            self.position_manager
                .update_non_fungible_data(&position_id, "period", new_period);

            Runtime::emit_event(EventResizeLease {
                position_id,
                share_amount: new_share_amount,
                period: new_period,
                rate_per_block: rate,
                margin,
            });

            returned
        }

        /// Closes a lease position held by the caller and refunds unconsumed margin.
        ///
        /// Before expiry this cancels the lease; at or past expiry it settles the
        /// terminal status. A position already finalized by a sweep or forced cancel
        /// pays out its parked refund instead.
        pub fn close_position(&mut self, position_proof: NonFungibleProof) -> Bucket {
            self.accrue();

            let position_proof = position_proof.check_with_message(
                self.position_manager.address(),
                "Incorrect proof! Are you sure this is a lease position?",
            );
            let position_id = position_proof
                .non_fungible::<LeasePosition>()
                .local_id()
                .clone();
            let position: LeasePosition =
                self.position_manager.get_non_fungible_data(&position_id);

            if position.status != LeaseStatus::Active {
                return self.take_parked_refund(position_id);
            }

            let now = Runtime::current_epoch().number();
            let refund = self.finalize_position(&position_id, &position, now);

            self.margin_vault.take(refund)
        }

        /// Finalizes lease positions that ran to their expiry block. Callable by
        /// anyone; refunds (if any) are parked for the position holders.
        ///
        /// # Panics
        /// * If a position is not active or has not yet reached expiry.
        pub fn sweep_positions(&mut self, position_ids: Vec<NonFungibleLocalId>) {
            self.accrue();

            assert!(
                !position_ids.is_empty()
                    && position_ids.len() as u64 <= self.parameters.max_batch_size,
                "Invalid argument: invalid number of position ids."
            );

            let now = Runtime::current_epoch().number();

            for position_id in position_ids {
                let position: LeasePosition =
                    self.position_manager.get_non_fungible_data(&position_id);
                assert!(
                    position.status == LeaseStatus::Active,
                    "Not found: lease position is not active."
                );
                assert!(
                    now >= position.expiry_block(),
                    "Invalid argument: lease position has not yet expired."
                );

                let refund = self.finalize_position(&position_id, &position, now);
                self.park_refund(position_id, refund);
            }
        }

        /// Force-closes lease positions. Refunds of unconsumed margin are parked for
        /// the position holders to retrieve.
        pub fn cancel_lease(&mut self, position_ids: Vec<NonFungibleLocalId>) {
            self.accrue();

            assert!(
                !position_ids.is_empty()
                    && position_ids.len() as u64 <= self.parameters.max_batch_size,
                "Invalid argument: invalid number of position ids."
            );

            let now = Runtime::current_epoch().number();

            for position_id in position_ids {
                let position: LeasePosition =
                    self.position_manager.get_non_fungible_data(&position_id);
                assert!(
                    position.status == LeaseStatus::Active,
                    "Not found: lease position is not active."
                );

                let refund = self.finalize_position(&position_id, &position, now);
                self.park_refund(position_id, refund);
            }
        }

        /// Pays out a margin refund parked by a sweep or forced cancel.
        pub fn retrieve_margin(&mut self, position_proof: NonFungibleProof) -> Bucket {
            let position_proof = position_proof.check_with_message(
                self.position_manager.address(),
                "Incorrect proof! Are you sure this is a lease position?",
            );
            let position_id = position_proof
                .non_fungible::<LeasePosition>()
                .local_id()
                .clone();

            self.take_parked_refund(position_id)
        }

        //////////////////////////////////////////////////////////////////////
        /////////////////////////////// ADMIN ////////////////////////////////
        //////////////////////////////////////////////////////////////////////

        /// Sets the adjustable pool parameters. Active leases keep the terms they
        /// opened with.
        pub fn set_parameters(
            &mut self,
            share_per_collateral: Decimal,
            minimum_period: u64,
            maximum_period: u64,
            max_batch_size: u64,
        ) {
            assert!(
                share_per_collateral > Decimal::ZERO,
                "Invalid argument: shares per collateral must be positive."
            );
            assert!(
                minimum_period > 0 && minimum_period <= maximum_period,
                "Invalid argument: invalid period bounds."
            );
            assert!(
                max_batch_size > 0,
                "Invalid argument: batch size must be positive."
            );

            self.parameters.share_per_collateral = share_per_collateral;
            self.parameters.minimum_period = minimum_period;
            self.parameters.maximum_period = maximum_period;
            self.parameters.max_batch_size = max_batch_size;

            Runtime::emit_event(EventSetParameters {
                share_per_collateral,
                minimum_period,
                maximum_period,
                max_batch_size,
            });
        }

        /// Stops or resumes supplies and leases. Redemptions and closes always work.
        pub fn set_stops(&mut self, stop_supplies: bool, stop_leases: bool) {
            self.parameters.stop_supplies = stop_supplies;
            self.parameters.stop_leases = stop_leases;
        }

        /// Mints additional controller badges.
        pub fn mint_controller_badge(&self, amount: Decimal) -> Bucket {
            self.controller_badge_manager.mint(amount)
        }

        //////////////////////////////////////////////////////////////////////
        /////////////////////////////// GETTERS //////////////////////////////
        //////////////////////////////////////////////////////////////////////

        /// Quotes the per-block lease rate for the pool state that would result from
        /// supplying `supply_delta` shares worth of collateral and leasing
        /// `lease_delta` additional shares.
        pub fn get_lease_price(&self, supply_delta: Decimal, lease_delta: Decimal) -> Decimal {
            let state = self.preview_accrual();
            self.rate_model.rate_per_block(
                state.total_supply,
                state.total_lease_amount,
                supply_delta,
                lease_delta,
            )
        }

        /// Profit currently claimable by a supply lot.
        pub fn pending_profit(&self, lot_id: NonFungibleLocalId) -> Decimal {
            assert!(
                self.lot_manager.non_fungible_exists(&lot_id),
                "Not found: unknown supply lot."
            );
            let lot: SupplyLot = self.lot_manager.get_non_fungible_data(&lot_id);
            let state = self.preview_accrual();
            state.pending_profit(lot.shares, lot.profit_debt)
        }

        /// Margin a lease position still holds at the current block.
        pub fn margin_left(&self, position_id: NonFungibleLocalId) -> Decimal {
            assert!(
                self.position_manager.non_fungible_exists(&position_id),
                "Not found: unknown lease position."
            );
            let position: LeasePosition =
                self.position_manager.get_non_fungible_data(&position_id);
            position.margin_left(Runtime::current_epoch().number())
        }

        pub fn total_supply(&self) -> Decimal {
            self.pool_state.total_supply
        }

        /// Shares under active lease at the current block, with elapsed expiries
        /// already released.
        pub fn total_lease_amount(&self) -> Decimal {
            self.preview_accrual().total_lease_amount
        }

        pub fn get_pool_info(&self) -> PoolInfoReturn {
            let state = self.preview_accrual();
            let current_rate_per_block = self.rate_model.rate_per_block(
                state.total_supply,
                state.total_lease_amount,
                Decimal::ZERO,
                Decimal::ZERO,
            );

            PoolInfoReturn {
                collateral_address: self.collateral_address,
                currency_address: self.currency_address,
                total_supply: state.total_supply,
                total_lease_amount: state.total_lease_amount,
                debit_per_block: state.debit_per_block,
                acc_profit_per_share: state.acc_profit_per_share,
                last_accrual_block: state.last_accrual_block,
                current_rate_per_block,
                collateral_amount: self.collateral_vault.amount(),
                margin_balance: self.margin_vault.amount(),
                profit_balance: self.profit_vault.amount(),
                parameters: self.parameters.clone(),
            }
        }

        /// Returns each requested supply lot together with its pending profit.
        pub fn get_lots_info(
            &self,
            lot_ids: Vec<NonFungibleLocalId>,
        ) -> Vec<(NonFungibleLocalId, SupplyLot, Decimal)> {
            let state = self.preview_accrual();
            lot_ids
                .into_iter()
                .map(|lot_id| {
                    assert!(
                        self.lot_manager.non_fungible_exists(&lot_id),
                        "Not found: unknown supply lot."
                    );
                    let lot: SupplyLot = self.lot_manager.get_non_fungible_data(&lot_id);
                    let pending = state.pending_profit(lot.shares, lot.profit_debt);
                    (lot_id, lot, pending)
                })
                .collect()
        }

        /// Returns each requested lease position together with its effective status
        /// and remaining margin at the current block. A position past its expiry
        /// block reads as terminal even before it is swept.
        pub fn get_positions_info(
            &self,
            position_ids: Vec<NonFungibleLocalId>,
        ) -> Vec<(NonFungibleLocalId, LeasePosition, LeaseStatus, Decimal)> {
            let now = Runtime::current_epoch().number();
            position_ids
                .into_iter()
                .map(|position_id| {
                    assert!(
                        self.position_manager.non_fungible_exists(&position_id),
                        "Not found: unknown lease position."
                    );
                    let position: LeasePosition =
                        self.position_manager.get_non_fungible_data(&position_id);
                    let effective_status = Self::effective_status(&position, now);
                    let margin_left = position.margin_left(now);
                    (position_id, position, effective_status, margin_left)
                })
                .collect()
        }

        /// Resolves which supply lot holds a deposited collateral NFT.
        pub fn get_lot_of_collateral(
            &self,
            collateral_id: NonFungibleLocalId,
        ) -> NonFungibleLocalId {
            self.deposited
                .get(&collateral_id)
                .map(|lot_id| lot_id.clone())
                .unwrap_or_else(|| {
                    panic!("Not found: collateral is not deposited in the pool.")
                })
        }

        //////////////////////////////////////////////////////////////////////
        /////////////////////////////// HELPERS //////////////////////////////
        //////////////////////////////////////////////////////////////////////

        /// Credits elapsed blocks to the profit accumulator and releases expired
        /// leases, walking expiry slots in block order so every lease is debited up
        /// to its final block and not one block further. Credited margin moves from
        /// the margin vault to the profit vault.
        fn accrue(&mut self) {
            let now = Runtime::current_epoch().number();

            let mut elapsed_slots: Vec<(u64, ExpirySlot)> = Vec::new();
            for (block, slot, _next) in self.expiries.range(0..now + 1) {
                elapsed_slots.push((block, slot.clone()));
            }

            let mut credited = Decimal::ZERO;
            for (block, slot) in elapsed_slots {
                credited += self.pool_state.credit(block);
                self.pool_state
                    .expire_slot(slot.lease_shares, slot.debit_per_block);
                self.expiries.remove(&block);
            }
            credited += self.pool_state.credit(now);

            if credited > Decimal::ZERO {
                // accumulator division can leave the claimable total a hair
                // above what margins paid in
                let amount = credited.min(self.margin_vault.amount());
                self.profit_vault.put(self.margin_vault.take(amount));
            }
        }

        /// Simulates `accrue` without mutating, for a consistent read snapshot.
        fn preview_accrual(&self) -> PoolState {
            let now = Runtime::current_epoch().number();
            let mut state = self.pool_state.clone();
            for (block, slot, _next) in self.expiries.range(0..now + 1) {
                state.credit(block);
                state.expire_slot(slot.lease_shares, slot.debit_per_block);
            }
            state.credit(now);
            state
        }

        fn schedule_expiry(&mut self, block: u64, lease_shares: Decimal, debit_per_block: Decimal) {
            let slot = match self.expiries.get(&block) {
                Some(slot) => ExpirySlot {
                    lease_shares: slot.lease_shares + lease_shares,
                    debit_per_block: slot.debit_per_block + debit_per_block,
                },
                None => ExpirySlot {
                    lease_shares,
                    debit_per_block,
                },
            };
            self.expiries.insert(block, slot);
        }

        fn unschedule_expiry(
            &mut self,
            block: u64,
            lease_shares: Decimal,
            debit_per_block: Decimal,
        ) {
            let slot = self
                .expiries
                .get(&block)
                .map(|slot| ExpirySlot {
                    lease_shares: slot.lease_shares - lease_shares,
                    debit_per_block: slot.debit_per_block - debit_per_block,
                })
                .unwrap_or_else(|| panic!("Not found: no expiry slot at block {}.", block));

            if slot.lease_shares == Decimal::ZERO {
                self.expiries.remove(&block);
            } else {
                self.expiries.insert(block, slot);
            }
        }

        /// Pays out a lot's pending profit and snapshots the accumulator on the
        /// receipt. Must run after `accrue`.
        fn settle_lot_profit(&mut self, lot_id: &NonFungibleLocalId) -> Bucket {
            let lot: SupplyLot = self.lot_manager.get_non_fungible_data(lot_id);
            let pending = self
                .pool_state
                .pending_profit(lot.shares, lot.profit_debt)
                .min(self.profit_vault.amount());

            self.lot_manager.update_non_fungible_data(
                lot_id,
                "profit_debt",
                self.pool_state.acc_profit_per_share,
            );

            self.profit_vault.take(pending)
        }

        /// Moves an active position to its terminal status and returns the margin
        /// refund still sitting in the margin vault. Must run after `accrue`, so an
        /// elapsed expiry slot has already released the lease from the pool totals.
        fn finalize_position(
            &mut self,
            position_id: &NonFungibleLocalId,
            position: &LeasePosition,
            now: u64,
        ) -> Decimal {
            let (status, refund) = if now >= position.expiry_block() {
                let consumed = Decimal::from(position.period)
                    * position.rate_per_block
                    * position.share_amount;
                let refund = (position.margin - consumed).max(Decimal::ZERO);
                let status = if refund == Decimal::ZERO {
                    LeaseStatus::Liquidated
                } else {
                    LeaseStatus::Expired
                };
                (status, refund)
            } else {
                self.pool_state
                    .close_lease(position.share_amount, position.rate_per_block);
                self.unschedule_expiry(
                    position.expiry_block(),
                    position.share_amount,
                    position.rate_per_block * position.share_amount,
                );
                (LeaseStatus::Cancelled, position.margin_left(now))
            };

            self.position_manager
                .update_non_fungible_data(position_id, "status", status.clone());
            self.position_manager
                .update_non_fungible_data(position_id, "margin", Decimal::ZERO);

            Runtime::emit_event(EventCloseLease {
                position_id: position_id.clone(),
                status,
                margin_refunded: refund,
            });

            refund
        }

        fn park_refund(&mut self, position_id: NonFungibleLocalId, refund: Decimal) {
            if refund == Decimal::ZERO {
                return;
            }
            let bucket = self.margin_vault.take(refund);
            if self.refunds.get(&position_id).is_some() {
                self.refunds.get_mut(&position_id).unwrap().put(bucket);
            } else {
                self.refunds.insert(position_id, Vault::with_bucket(bucket));
            }
        }

        fn take_parked_refund(&mut self, position_id: NonFungibleLocalId) -> Bucket {
            let refund = {
                let mut vault = self
                    .refunds
                    .get_mut(&position_id)
                    .unwrap_or_else(|| {
                        panic!("Not found: no margin refund parked for this position.")
                    });
                vault.take_all()
            };

            Runtime::emit_event(EventRetrieveMargin {
                position_id,
                amount: refund.amount(),
            });

            refund
        }

        fn effective_status(position: &LeasePosition, now: u64) -> LeaseStatus {
            if position.status != LeaseStatus::Active {
                return position.status.clone();
            }
            if now >= position.expiry_block() {
                let consumed = Decimal::from(position.period)
                    * position.rate_per_block
                    * position.share_amount;
                if position.margin <= consumed {
                    LeaseStatus::Liquidated
                } else {
                    LeaseStatus::Expired
                }
            } else {
                LeaseStatus::Active
            }
        }
    }
}
