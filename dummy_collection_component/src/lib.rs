//! # Dummy Collection Blueprint
//! A mintable NFT collection for testing the lease pool without external dependencies.

use scrypto::prelude::*;

#[derive(ScryptoSbor, NonFungibleData, Clone)]
pub struct CollateralData {
    pub name: String,
}

#[blueprint]
mod collection {
    enable_method_auth! {
        methods {
            mint => PUBLIC;
            next_id => PUBLIC;
            address => PUBLIC;
        }
    }

    struct Collection {
        manager: ResourceManager,
        counter: u64,
    }

    impl Collection {
        pub fn instantiate_collection() -> Global<Collection> {
            let (address_reservation, component_address) =
                Runtime::allocate_component_address(Collection::blueprint_id());

            let manager: ResourceManager =
                ResourceBuilder::new_integer_non_fungible::<CollateralData>(OwnerRole::None)
                    .metadata(metadata!(
                        init {
                            "name" => "Dummy Collection", locked;
                            "symbol" => "DUMMY", locked;
                        }
                    ))
                    .mint_roles(mint_roles!(
                        minter => rule!(require(global_caller(component_address)));
                        minter_updater => rule!(deny_all);
                    ))
                    .create_with_no_initial_supply()
                    .into();

            Self {
                manager,
                counter: 0,
            }
            .instantiate()
            .prepare_to_globalize(OwnerRole::None)
            .with_address(address_reservation)
            .metadata(metadata! {
                init {
                    "name" => "Dummy Collection".to_string(), updatable;
                    "description" => "A dummy NFT collection used for testing the lease pool".to_string(), updatable;
                }
            })
            .globalize()
        }

        /// Mints `amount` NFTs with sequential integer ids, starting at 1.
        pub fn mint(&mut self, amount: u64) -> NonFungibleBucket {
            let mut minted = NonFungibleBucket::new(self.manager.address());
            for _ in 0..amount {
                self.counter += 1;
                let bucket = self.manager.mint_non_fungible(
                    &NonFungibleLocalId::integer(self.counter),
                    CollateralData {
                        name: format!("Dummy #{}", self.counter),
                    },
                );
                minted.put(bucket.as_non_fungible());
            }
            minted
        }

        /// The id the next minted NFT will get.
        pub fn next_id(&self) -> u64 {
            self.counter + 1
        }

        pub fn address(&self) -> ResourceAddress {
            self.manager.address()
        }
    }
}
