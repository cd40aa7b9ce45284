//! Acting identities and collaborator contract addresses.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// Who acts: the signing user and the proxy account that executes batches on their behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub account: Address,
    pub proxy: Address,
    pub chain_id: u64,
}

/// Contracts a market-creation or redemption batch talks to besides the market itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketContracts {
    pub conditional_tokens: Address,
    pub realitio: Address,
    /// Oracle adapter that reports realitio answers to the conditional tokens ledger.
    pub oracle: Address,
    pub factory: Address,
    pub arbitrator: Address,
}
