use helper::Helper;
use lease_pool::shared_structs::*;

use dummy_collection_component::collection_test::*;
use scrypto_test::prelude::*;

#[test]
fn test_supply_mints_shares_and_tracks_collateral() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();

    let receipt = helper.supply(2)?;
    let lot_address = helper.lot_address;
    helper.assert_bucket_eq(&receipt, lot_address, dec!(1))?;

    assert_eq!(helper.pool.total_supply(&mut helper.env)?, dec!(2));

    let (lot_id, lot, pending) = helper.get_lot_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(lot_id, NonFungibleLocalId::integer(1));
    assert_eq!(lot.shares, dec!(2));
    assert_eq!(lot.collateral_ids.len(), 2);
    assert_eq!(pending, dec!(0));

    // deposited collateral resolves back to its lot
    assert_eq!(
        helper
            .pool
            .get_lot_of_collateral(NonFungibleLocalId::integer(1), &mut helper.env)?,
        NonFungibleLocalId::integer(1)
    );

    let info = helper.pool.get_pool_info(&mut helper.env)?;
    assert_eq!(info.collateral_amount, dec!(2));
    assert_eq!(info.total_lease_amount, dec!(0));

    Ok(())
}

#[test]
fn test_empty_pool_quotes_base_rate() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();

    assert_eq!(
        helper.pool.get_lease_price(dec!(0), dec!(0), &mut helper.env)?,
        dec!("0.001")
    );
    // a hypothetical supply of 10 and lease of 1 prices at u = 0.1
    assert_eq!(
        helper.pool.get_lease_price(dec!(10), dec!(1), &mut helper.env)?,
        dec!("0.002")
    );

    Ok(())
}

#[test]
fn test_lease_price_tracks_utilization() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;

    assert_eq!(
        helper.pool.get_lease_price(dec!(0), dec!(0), &mut helper.env)?,
        dec!("0.001")
    );

    // leasing 5 of 10 shares moves utilization to 0.5
    helper.open_lease(dec!(5), 100, dec!(10))?;
    assert_eq!(
        helper.pool.get_lease_price(dec!(0), dec!(0), &mut helper.env)?,
        dec!("0.006")
    );

    Ok(())
}

#[test]
fn test_open_lease_escrows_exact_margin() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;

    // rate including the new lease: 0.001 + 0.01 * 0.1 = 0.002, margin = 0.002 * 1 * 100
    let payment = helper.currency.take(dec!(1), &mut helper.env)?;
    let (receipt, change) = helper.pool.lease(payment, dec!(1), 100, &mut helper.env)?;

    let position_address = helper.position_address;
    helper.assert_bucket_eq(&receipt, position_address, dec!(1))?;
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&change, currency_address, dec!("0.8"))?;

    assert_eq!(
        helper
            .pool
            .margin_left(NonFungibleLocalId::integer(1), &mut helper.env)?,
        dec!("0.2")
    );
    assert_eq!(helper.pool.total_lease_amount(&mut helper.env)?, dec!(1));

    let (_, position, status, margin_left) =
        helper.get_position_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(status, LeaseStatus::Active);
    assert_eq!(position.share_amount, dec!(1));
    assert_eq!(position.rate_per_block, dec!("0.002"));
    assert_eq!(position.margin, dec!("0.2"));
    assert_eq!(position.period, 100);
    assert_eq!(margin_left, dec!("0.2"));

    let info = helper.pool.get_pool_info(&mut helper.env)?;
    assert_eq!(info.margin_balance, dec!("0.2"));

    Ok(())
}

#[test]
fn test_margin_decays_per_block_until_liquidation() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;
    helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.advance_blocks(50);
    assert_eq!(
        helper
            .pool
            .margin_left(NonFungibleLocalId::integer(1), &mut helper.env)?,
        dec!("0.1")
    );

    helper.advance_blocks(50);
    assert_eq!(
        helper
            .pool
            .margin_left(NonFungibleLocalId::integer(1), &mut helper.env)?,
        dec!(0)
    );

    // the exhausted lease reads as liquidated and no longer encumbers the pool
    let (_, _, status, _) = helper.get_position_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(status, LeaseStatus::Liquidated);
    assert_eq!(helper.pool.total_lease_amount(&mut helper.env)?, dec!(0));

    // the freed shares can be leased again at the same utilization price
    assert_eq!(
        helper.pool.get_lease_price(dec!(0), dec!(1), &mut helper.env)?,
        dec!("0.002")
    );
    helper.open_lease(dec!(1), 100, dec!(1))?;
    assert_eq!(helper.pool.total_lease_amount(&mut helper.env)?, dec!(1));

    Ok(())
}

#[test]
fn test_close_position_refunds_unconsumed_margin() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;
    let receipt = helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.advance_blocks(50);

    let proof = helper.proof_of(&receipt)?;
    let refund = helper.pool.close_position(proof, &mut helper.env)?;
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&refund, currency_address, dec!("0.1"))?;

    let (_, _, status, margin_left) = helper.get_position_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(status, LeaseStatus::Cancelled);
    assert_eq!(margin_left, dec!(0));
    assert_eq!(helper.pool.total_lease_amount(&mut helper.env)?, dec!(0));

    // consumed half went to suppliers
    let info = helper.pool.get_pool_info(&mut helper.env)?;
    assert_eq!(info.margin_balance, dec!(0));
    assert_eq!(info.profit_balance, dec!("0.1"));

    Ok(())
}

#[test]
fn test_profit_accrues_and_second_claim_is_zero() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    let lot_receipt = helper.supply(10)?;
    helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.advance_blocks(50);

    assert_eq!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(1), &mut helper.env)?,
        dec!("0.1")
    );

    let proof = helper.proof_of(&lot_receipt)?;
    let profit = helper.pool.claim_supply_profit(proof, &mut helper.env)?;
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&profit, currency_address, dec!("0.1"))?;

    // settled: nothing pending until more blocks pass
    let proof = helper.proof_of(&lot_receipt)?;
    let profit = helper.pool.claim_supply_profit(proof, &mut helper.env)?;
    helper.assert_bucket_eq(&profit, currency_address, dec!(0))?;

    Ok(())
}

#[test]
fn test_profit_splits_pro_rata_between_lots() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(4)?;
    helper.supply(6)?;

    // rate including the lease: 0.001 + 0.01 * 0.5 = 0.006, debit 0.03 per block
    helper.open_lease(dec!(5), 100, dec!(5))?;

    helper.advance_blocks(10);

    assert_eq!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(1), &mut helper.env)?,
        dec!("0.12")
    );
    assert_eq!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(2), &mut helper.env)?,
        dec!("0.18")
    );

    Ok(())
}

#[test]
fn test_late_supplier_earns_nothing_retroactively() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;

    // rate 0.001 + 0.01 * 0.2 = 0.003, debit 0.006 per block
    helper.open_lease(dec!(2), 100, dec!(1))?;

    helper.advance_blocks(10);
    helper.supply(10)?;

    assert_eq!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(1), &mut helper.env)?,
        dec!("0.06")
    );
    assert_eq!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(2), &mut helper.env)?,
        dec!(0)
    );

    // from here the same debit is split across twice the shares
    helper.advance_blocks(10);
    assert_eq!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(1), &mut helper.env)?,
        dec!("0.09")
    );
    assert_eq!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(2), &mut helper.env)?,
        dec!("0.03")
    );

    Ok(())
}

#[test]
fn test_redeem_fails_while_pool_over_leased() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    let small_lot = helper.supply(1)?;
    helper.supply(9)?;

    helper.open_lease(dec!("9.5"), 100, dec!(20))?;

    // only 0.5 shares are unleased; burning 1 must fail even though the
    // redeemer's own collateral is not leased out individually
    let result = helper
        .pool
        .redeem(NonFungibleBucket(small_lot), None, &mut helper.env);
    assert!(result.is_err(), "Over-leased redemption should fail");

    Ok(())
}

#[test]
fn test_redeem_returns_collateral_and_profit() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    let lot_receipt = helper.supply(2)?;

    // rate 0.001 + 0.01 * 0.5 = 0.006, margin = 0.006 * 1 * 10 = 0.06
    helper.open_lease(dec!(1), 10, dec!(1))?;

    helper.advance_blocks(5);

    // partial redemption: one NFT out, full lot profit settled
    let (collateral, profit, receipt) = helper.pool.redeem(
        NonFungibleBucket(lot_receipt),
        Some(vec![NonFungibleLocalId::integer(1)]),
        &mut helper.env,
    )?;
    assert_eq!(collateral.amount(&mut helper.env)?, dec!(1));
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&profit, currency_address, dec!("0.03"))?;
    let lot_receipt = receipt.expect("Partial redemption should return the receipt");

    let (_, lot, _) = helper.get_lot_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(lot.shares, dec!(1));
    assert_eq!(lot.collateral_ids, vec![NonFungibleLocalId::integer(2)]);
    assert_eq!(helper.pool.total_supply(&mut helper.env)?, dec!(1));

    // run the lease to expiry, then the rest of the lot can leave
    helper.advance_blocks(5);
    let (collateral, profit, receipt) =
        helper.pool.redeem(lot_receipt, None, &mut helper.env)?;
    assert_eq!(collateral.amount(&mut helper.env)?, dec!(1));
    helper.assert_bucket_eq(&profit, currency_address, dec!("0.03"))?;
    assert!(receipt.is_none());

    assert_eq!(helper.pool.total_supply(&mut helper.env)?, dec!(0));
    let info = helper.pool.get_pool_info(&mut helper.env)?;
    assert_eq!(info.collateral_amount, dec!(0));
    assert_eq!(info.margin_balance, dec!(0));
    assert_eq!(info.profit_balance, dec!(0));

    Ok(())
}

#[test]
fn test_unknown_identifiers_fail() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(1)?;

    assert!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(99), &mut helper.env)
            .is_err(),
        "Unknown lot should fail"
    );
    assert!(
        helper
            .pool
            .margin_left(NonFungibleLocalId::integer(99), &mut helper.env)
            .is_err(),
        "Unknown position should fail"
    );
    assert!(
        helper
            .pool
            .get_lot_of_collateral(NonFungibleLocalId::integer(99), &mut helper.env)
            .is_err(),
        "Undeposited collateral should fail"
    );

    Ok(())
}

#[test]
fn test_foreign_collateral_is_rejected() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();

    let mut other_collection =
        Collection::instantiate_collection(helper.collection_package_address, &mut helper.env)?;
    let foreign = other_collection.mint(1, &mut helper.env)?;

    let result = helper.pool.supply(foreign, &mut helper.env);
    assert!(result.is_err(), "Foreign collection should be rejected");

    Ok(())
}

#[test]
fn test_resize_lease_reprices_at_current_rate() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;
    let receipt = helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.advance_blocks(10);

    // old terms close with 0.18 unconsumed; new terms: rate 0.003, margin 0.6
    let proof = helper.proof_of(&receipt)?;
    let payment = helper.currency.take(dec!(1), &mut helper.env)?;
    let change = helper
        .pool
        .resize_lease(proof, dec!(2), 100, payment, &mut helper.env)?;
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&change, currency_address, dec!("0.58"))?;

    let (_, position, status, margin_left) =
        helper.get_position_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(status, LeaseStatus::Active);
    assert_eq!(position.share_amount, dec!(2));
    assert_eq!(position.rate_per_block, dec!("0.003"));
    assert_eq!(position.start_block, 11);
    assert_eq!(position.period, 100);
    assert_eq!(margin_left, dec!("0.6"));
    assert_eq!(helper.pool.total_lease_amount(&mut helper.env)?, dec!(2));

    Ok(())
}

#[test]
fn test_resize_to_zero_closes_the_position() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;
    let receipt = helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.advance_blocks(10);

    let proof = helper.proof_of(&receipt)?;
    let payment = helper.currency.take(dec!(0), &mut helper.env)?;
    let refund = helper
        .pool
        .resize_lease(proof, dec!(0), 0, payment, &mut helper.env)?;
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&refund, currency_address, dec!("0.18"))?;

    let (_, _, status, _) = helper.get_position_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(status, LeaseStatus::Cancelled);
    assert_eq!(helper.pool.total_lease_amount(&mut helper.env)?, dec!(0));

    Ok(())
}

#[test]
fn test_lease_rejects_zero_shares() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;

    let payment = helper.currency.take(dec!(1), &mut helper.env)?;
    let result = helper.pool.lease(payment, dec!(0), 100, &mut helper.env);
    assert!(result.is_err(), "Zero-share lease should fail");

    Ok(())
}

#[test]
fn test_lease_rejects_zero_period() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;

    let payment = helper.currency.take(dec!(1), &mut helper.env)?;
    let result = helper.pool.lease(payment, dec!(1), 0, &mut helper.env);
    assert!(result.is_err(), "Zero-period lease should fail");

    Ok(())
}

#[test]
fn test_lease_rejects_insufficient_margin_payment() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;

    // required margin is 0.2
    let payment = helper.currency.take(dec!("0.1"), &mut helper.env)?;
    let result = helper.pool.lease(payment, dec!(1), 100, &mut helper.env);
    assert!(result.is_err(), "Underfunded lease should fail");

    Ok(())
}

#[test]
fn test_lease_rejects_insufficient_liquidity() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(2)?;

    let payment = helper.currency.take(dec!(10), &mut helper.env)?;
    let result = helper.pool.lease(payment, dec!(3), 10, &mut helper.env);
    assert!(result.is_err(), "Lease beyond pool supply should fail");

    Ok(())
}

#[test]
fn test_sweep_finalizes_expired_positions() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;
    helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.advance_blocks(101);

    helper
        .pool
        .sweep_positions(vec![NonFungibleLocalId::integer(1)], &mut helper.env)?;

    let (_, _, status, _) = helper.get_position_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(status, LeaseStatus::Liquidated);
    assert_eq!(helper.pool.total_lease_amount(&mut helper.env)?, dec!(0));

    // the full margin was consumed, so nothing is parked for retrieval and the
    // whole 0.2 is supplier profit
    assert_eq!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(1), &mut helper.env)?,
        dec!("0.2")
    );

    Ok(())
}

#[test]
fn test_sweep_rejects_unexpired_positions() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;
    helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.advance_blocks(50);

    let result = helper
        .pool
        .sweep_positions(vec![NonFungibleLocalId::integer(1)], &mut helper.env);
    assert!(result.is_err(), "Sweeping an unexpired position should fail");

    Ok(())
}

#[test]
fn test_admin_cancel_parks_refund_for_retrieval() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;
    let receipt = helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.advance_blocks(50);
    helper.cancel_lease(vec![NonFungibleLocalId::integer(1)])?;

    let (_, _, status, margin_left) = helper.get_position_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(status, LeaseStatus::Cancelled);
    assert_eq!(margin_left, dec!(0));

    let proof = helper.proof_of(&receipt)?;
    let refund = helper.pool.retrieve_margin(proof, &mut helper.env)?;
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&refund, currency_address, dec!("0.1"))?;

    let info = helper.pool.get_pool_info(&mut helper.env)?;
    assert_eq!(info.margin_balance, dec!(0));

    Ok(())
}

#[test]
fn test_close_position_pays_parked_refund() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;
    let receipt = helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.advance_blocks(50);
    helper.cancel_lease(vec![NonFungibleLocalId::integer(1)])?;

    // closing an already-cancelled position falls through to the parked refund
    let proof = helper.proof_of(&receipt)?;
    let refund = helper.pool.close_position(proof, &mut helper.env)?;
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&refund, currency_address, dec!("0.1"))?;

    Ok(())
}

#[test]
fn test_owner_methods_require_badge() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();

    let result = helper.pool.set_stops(true, true, &mut helper.env);
    assert!(result.is_err(), "Unbadged stop change should fail");

    Ok(())
}

#[test]
fn test_stops_block_supplies() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.set_stops(true, false)?;

    let collateral = helper.mint_collateral(1)?;
    let result = helper.pool.supply(collateral, &mut helper.env);
    assert!(result.is_err(), "Supply should be stopped");

    Ok(())
}

#[test]
fn test_stops_block_leases_but_not_closes() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.supply(10)?;
    let receipt = helper.open_lease(dec!(1), 100, dec!(1))?;

    helper.set_stops(true, true)?;

    // existing positions can always exit
    let proof = helper.proof_of(&receipt)?;
    let refund = helper.pool.close_position(proof, &mut helper.env)?;
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&refund, currency_address, dec!("0.2"))?;

    let payment = helper.currency.take(dec!(1), &mut helper.env)?;
    let result = helper.pool.lease(payment, dec!(1), 100, &mut helper.env);
    assert!(result.is_err(), "Lease should be stopped");

    Ok(())
}

#[test]
fn test_set_parameters_changes_mint_ratio() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    helper.set_parameters(dec!(2), 5, 1000, 10)?;

    helper.supply(3)?;
    assert_eq!(helper.pool.total_supply(&mut helper.env)?, dec!(6));

    let (_, lot, _) = helper.get_lot_info(NonFungibleLocalId::integer(1))?;
    assert_eq!(lot.shares, dec!(6));

    // periods below the new minimum are rejected
    let payment = helper.currency.take(dec!(1), &mut helper.env)?;
    let result = helper.pool.lease(payment, dec!(1), 4, &mut helper.env);
    assert!(result.is_err(), "Period below minimum should fail");

    Ok(())
}

#[test]
fn test_margin_conservation_across_lifecycle() -> Result<(), RuntimeError> {
    let mut helper = Helper::new().unwrap();
    let lot_receipt = helper.supply(10)?;

    // lease A: rate 0.002, margin 0.02; lease B: rate 0.004, margin 0.16
    helper.open_lease(dec!(1), 10, dec!(1))?;
    helper.open_lease(dec!(2), 20, dec!(1))?;

    // run past both expiries: blocks 1-11 debit 0.01, blocks 11-21 debit 0.008
    helper.advance_blocks(30);

    assert_eq!(helper.pool.total_lease_amount(&mut helper.env)?, dec!(0));
    assert_eq!(
        helper
            .pool
            .pending_profit(NonFungibleLocalId::integer(1), &mut helper.env)?,
        dec!("0.18")
    );

    // every margin unit paid in is claimed back out by the supplier
    let proof = helper.proof_of(&lot_receipt)?;
    let profit = helper.pool.claim_supply_profit(proof, &mut helper.env)?;
    let currency_address = helper.currency_address;
    helper.assert_bucket_eq(&profit, currency_address, dec!("0.18"))?;

    let info = helper.pool.get_pool_info(&mut helper.env)?;
    assert_eq!(info.margin_balance, dec!(0));
    assert_eq!(info.profit_balance, dec!(0));

    Ok(())
}
