use std::collections::HashMap;

use log::{debug, error};
use web3::{ethabi::Contract, types::Address};

use crate::{apis::abi_from_sourcify_api, client::GovernanceClient, types::Mode, types::VisitNote};

#[derive(Debug, Default, Clone)]
/// A store of things that have been obtained externally, that may arise more than once.
///
/// Each value has a note of whether the lookup worked, so failures are not retried.
pub struct Cache {
    /// Maps addresses to parsed ABIs.
    ///
    /// 20 byte addresses "abcd...1234" -> ABI of the contract (or its implementation)
    pub abis: HashMap<Address, (VisitNote, Option<Contract>)>,
}

impl Cache {
    /// Attempt to obtain the ABI of a contract without an embedded one, if not in cache.
    ///
    /// Proxies are followed to their implementation first.
    pub async fn try_abi(
        &mut self,
        address: &Address,
        mode: &Mode,
        client: &dyn GovernanceClient,
    ) -> Option<Contract> {
        match self.abis.get(address) {
            Some((VisitNote::PriorSuccess, value)) => {
                debug!("Using cached abi: {:?}", address);
                return value.clone();
            }
            Some((VisitNote::PriorFailure, _)) => {
                debug!("(skipping) Prior failure for abi: {:?}", address);
                return None;
            }
            _ => {}
        }
        if let Mode::AvoidApis = mode {
            return None;
        }

        let lookup = async {
            let target = client.implementation(*address).await?.unwrap_or(*address);
            let chain_id = client.chain_id().await?;
            abi_from_sourcify_api(chain_id, &target).await
        };
        let abi = match lookup.await {
            Ok(Some(json)) => Contract::load(json.as_bytes()).map_err(anyhow::Error::from),
            Ok(None) => Err(anyhow::anyhow!("not verified on Sourcify")),
            Err(e) => Err(e),
        };

        match abi {
            Ok(contract) => {
                self.abis.insert(
                    address.to_owned(),
                    (VisitNote::PriorSuccess, Some(contract.clone())),
                );
                Some(contract)
            }
            Err(e) => {
                error!("Couldn't get abi for address: {:?} ({})", address, e);
                self.abis
                    .insert(address.to_owned(), (VisitNote::PriorFailure, None));
                None
            }
        }
    }
    /// A previously fetched ABI.
    pub fn abi(&self, address: &Address) -> Option<&Contract> {
        match self.abis.get(address) {
            Some((VisitNote::PriorSuccess, Some(c))) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::mock::MockGovernance;

    #[tokio::test]
    async fn avoid_apis_never_fetches() {
        let mut cache = Cache::default();
        let client = MockGovernance::default();
        let address = Address::from_low_u64_be(7);
        assert!(cache
            .try_abi(&address, &Mode::AvoidApis, &client)
            .await
            .is_none());
        assert!(cache.abis.is_empty());
    }

    #[tokio::test]
    async fn prior_failure_is_not_retried() {
        let address = Address::from_low_u64_be(7);
        let mut cache = Cache::default();
        cache
            .abis
            .insert(address, (VisitNote::PriorFailure, None));
        let client = MockGovernance::default();
        // Would hit the network if the note were ignored.
        assert!(cache
            .try_abi(&address, &Mode::UseApis, &client)
            .await
            .is_none());
        assert!(cache.abi(&address).is_none());
    }
}
