//! Which index and explorer serve a given chain.

use alloy_primitives::B256;
use serde::{Deserialize, Serialize};

pub const MAINNET_CHAIN_ID: u64 = 1;

const INDEX_ENDPOINT: &str = "https://api.thegraph.com/subgraphs/name/gelatodigital/gelato-network";
const TESTNET_INDEX_SUFFIX: &str = "-rinkeby";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub name: String,
    pub chain_id: u64,
    /// GraphQL endpoint of the automation task index.
    pub index_endpoint: String,
    /// Block explorer base URL (no trailing slash).
    pub explorer_url: String,
}

impl NetworkConfig {
    /// Mainnet gets the production index and explorer; every other chain is served by the
    /// testnet deployment.
    pub fn for_chain(chain_id: u64) -> Self {
        if chain_id == MAINNET_CHAIN_ID {
            Self {
                name: "mainnet".to_string(),
                chain_id,
                index_endpoint: INDEX_ENDPOINT.to_string(),
                explorer_url: "https://etherscan.io".to_string(),
            }
        } else {
            Self {
                name: "rinkeby".to_string(),
                chain_id,
                index_endpoint: format!("{INDEX_ENDPOINT}{TESTNET_INDEX_SUFFIX}"),
                explorer_url: "https://rinkeby.etherscan.io".to_string(),
            }
        }
    }

    #[must_use]
    pub fn with_index_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.index_endpoint = endpoint.into();
        self
    }

    #[must_use]
    pub fn with_explorer_url(mut self, url: impl Into<String>) -> Self {
        self.explorer_url = url.into().trim_end_matches('/').to_string();
        self
    }

    /// Explorer link for a transaction hash.
    pub fn tx_link(&self, hash: B256) -> String {
        format!("{}/tx/0x{}", self.explorer_url, hex::encode(hash))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mainnet_and_testnet_endpoints() {
        let mainnet = NetworkConfig::for_chain(1);
        assert!(mainnet.index_endpoint.ends_with("/gelato-network"));
        assert_eq!(mainnet.explorer_url, "https://etherscan.io");

        let rinkeby = NetworkConfig::for_chain(4);
        assert!(rinkeby.index_endpoint.ends_with("/gelato-network-rinkeby"));
    }

    #[test]
    fn test_tx_link() {
        let network = NetworkConfig::for_chain(1).with_explorer_url("https://explorer.example/");
        let link = network.tx_link(B256::repeat_byte(0xab));
        assert_eq!(link, format!("https://explorer.example/tx/0x{}", "ab".repeat(32)));
    }
}
