//! Named-contract resolution against the automation network's address registry.
//!
//! Lookups are batched into a single `batchGetAddress` read and memoized per registry: a name
//! resolved once is never fetched again.

use std::{collections::HashMap, sync::Arc};

use alloy_primitives::Address;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    errors::{AutomationError, Result},
    ledger::LedgerReader,
};

/// Contracts of the automation network known to the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContractName {
    Core,
    Provider,
    ProviderModule,
    TimeCondition,
    WithdrawAction,
    Executor,
}

impl ContractName {
    pub const ALL: [ContractName; 6] = [
        ContractName::Core,
        ContractName::Provider,
        ContractName::ProviderModule,
        ContractName::TimeCondition,
        ContractName::WithdrawAction,
        ContractName::Executor,
    ];

    /// Registry key for this contract.
    pub const fn key(self) -> &'static str {
        match self {
            ContractName::Core => "gelatoCore",
            ContractName::Provider => "gelatoProvider",
            ContractName::ProviderModule => "providerModuleGnosisSafe",
            ContractName::TimeCondition => "conditionTime",
            ContractName::WithdrawAction => "actionWithdrawLiquidityOmen",
            ContractName::Executor => "gelatoExecutor",
        }
    }
}

/// Result of a `resolve` call; contains every requested name.
#[derive(Debug, Clone, Default)]
pub struct ResolvedAddresses(HashMap<ContractName, Address>);

impl ResolvedAddresses {
    pub fn get(&self, name: ContractName) -> Result<Address> {
        self.0
            .get(&name)
            .copied()
            .ok_or_else(|| AutomationError::AddressNotFound(name.key().to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContractName, Address)> + '_ {
        self.0.iter().map(|(n, a)| (*n, *a))
    }
}

pub struct AddressRegistry {
    ledger: Arc<dyn LedgerReader>,
    storage: Address,
    cache: RwLock<HashMap<ContractName, Address>>,
}

impl AddressRegistry {
    pub fn new(ledger: Arc<dyn LedgerReader>, storage: Address) -> Self {
        Self {
            ledger,
            storage,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn storage_address(&self) -> Address {
        self.storage
    }

    /// Resolve every name in `names`, fetching the uncached ones in one batched lookup.
    ///
    /// Fails with `AddressNotFound` on the first requested name the registry does not know
    /// (a zero address counts as unknown). There is no fallback value.
    pub async fn resolve(&self, names: &[ContractName]) -> Result<ResolvedAddresses> {
        let mut resolved = HashMap::with_capacity(names.len());
        let mut missing: Vec<ContractName> = Vec::new();
        {
            let cache = self.cache.read().await;
            for name in names {
                match cache.get(name) {
                    Some(address) => {
                        resolved.insert(*name, *address);
                    }
                    None if !missing.contains(name) => missing.push(*name),
                    None => {}
                }
            }
        }

        if missing.is_empty() {
            return Ok(ResolvedAddresses(resolved));
        }

        let keys: Vec<String> = missing.iter().map(|n| n.key().to_string()).collect();
        debug!(storage = %self.storage, ?keys, "resolving registry names");
        let entries = self.ledger.batch_get_address(self.storage, &keys).await?;

        let mut cache = self.cache.write().await;
        for name in missing {
            let address = entries
                .iter()
                .find(|(key, _)| key == name.key())
                .map(|(_, address)| *address)
                .filter(|address| *address != Address::ZERO)
                .ok_or_else(|| AutomationError::AddressNotFound(name.key().to_string()))?;
            cache.insert(name, address);
            resolved.insert(name, address);
        }

        Ok(ResolvedAddresses(resolved))
    }

    pub async fn address(&self, name: ContractName) -> Result<Address> {
        self.resolve(&[name]).await?.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockLedger;

    fn registry(ledger: &Arc<MockLedger>) -> AddressRegistry {
        AddressRegistry::new(ledger.clone(), Address::repeat_byte(0x51))
    }

    #[tokio::test]
    async fn test_resolve_batches_and_memoizes() {
        let ledger = Arc::new(MockLedger::with_automation_registry());
        let registry = registry(&ledger);

        let first = registry
            .resolve(&[ContractName::Core, ContractName::TimeCondition])
            .await
            .unwrap();
        assert_eq!(first.get(ContractName::Core).unwrap(), MockLedger::CORE);
        assert_eq!(ledger.registry_lookups(), 1);

        registry.address(ContractName::Core).await.unwrap();
        assert_eq!(ledger.registry_lookups(), 1);

        registry.address(ContractName::WithdrawAction).await.unwrap();
        assert_eq!(ledger.registry_lookups(), 2);
    }

    #[tokio::test]
    async fn test_missing_name_is_fatal() {
        let ledger = Arc::new(MockLedger::with_automation_registry());
        ledger.remove_registry_entry(ContractName::Provider.key());
        let registry = registry(&ledger);

        let err = registry
            .resolve(&[ContractName::Core, ContractName::Provider])
            .await
            .unwrap_err();
        assert!(matches!(err, AutomationError::AddressNotFound(key) if key == "gelatoProvider"));
    }
}
