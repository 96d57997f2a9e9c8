use alloy_primitives::B256;
use serde::Serialize;

use crate::error::EthError;

/// A known EVM network with an EIP-1559 fee market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Network {
    pub chain_id: u64,
    pub name: &'static str,
    /// Native currency symbol.
    pub symbol: &'static str,
    pub decimals: u8,
    pub explorer_url: &'static str,
    pub is_testnet: bool,
}

impl Network {
    /// Explorer page of a transaction on this network.
    pub fn explorer_tx_url(&self, hash: &B256) -> String {
        format!("{}/tx/{hash}", self.explorer_url)
    }
}

const fn network(
    chain_id: u64,
    name: &'static str,
    symbol: &'static str,
    explorer_url: &'static str,
    is_testnet: bool,
) -> Network {
    Network { chain_id, name, symbol, decimals: 18, explorer_url, is_testnet }
}

pub const ETHEREUM: Network = network(1, "Ethereum", "ETH", "https://etherscan.io", false);
pub const OPTIMISM: Network = network(10, "Optimism", "ETH", "https://optimistic.etherscan.io", false);
pub const BSC: Network = network(56, "BNB Smart Chain", "BNB", "https://bscscan.com", false);
pub const POLYGON: Network = network(137, "Polygon", "POL", "https://polygonscan.com", false);
pub const BASE: Network = network(8453, "Base", "ETH", "https://basescan.org", false);
pub const ARBITRUM: Network = network(42161, "Arbitrum One", "ETH", "https://arbiscan.io", false);
pub const AVALANCHE: Network = network(43114, "Avalanche C-Chain", "AVAX", "https://snowtrace.io", false);
pub const SEPOLIA: Network = network(11155111, "Sepolia", "ETH", "https://sepolia.etherscan.io", true);
pub const POLYGON_AMOY: Network = network(80002, "Polygon Amoy", "POL", "https://amoy.polygonscan.com", true);
/// Local development node (anvil/hardhat).
pub const LOCAL: Network = network(31337, "Local", "ETH", "http://localhost", true);

const ALL_NETWORKS: &[&Network] = &[
    &ETHEREUM,
    &OPTIMISM,
    &BSC,
    &POLYGON,
    &BASE,
    &ARBITRUM,
    &AVALANCHE,
    &SEPOLIA,
    &POLYGON_AMOY,
    &LOCAL,
];

/// Returns the network for `chain_id`, or `None` if unknown.
pub fn get_network(chain_id: u64) -> Option<&'static Network> {
    ALL_NETWORKS.iter().find(|n| n.chain_id == chain_id).copied()
}

/// Like [`get_network`] but unknown ids are an error.
pub fn require_network(chain_id: u64) -> Result<&'static Network, EthError> {
    get_network(chain_id).ok_or(EthError::UnsupportedChain(chain_id))
}

pub fn known_networks() -> Vec<&'static Network> {
    ALL_NETWORKS.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_ethereum() {
        let net = get_network(1).expect("Ethereum should be known");
        assert_eq!(net.name, "Ethereum");
        assert_eq!(net.symbol, "ETH");
        assert!(!net.is_testnet);
    }

    #[test]
    fn get_polygon() {
        assert_eq!(get_network(137).unwrap().name, "Polygon");
    }

    #[test]
    fn unknown_chain() {
        assert!(get_network(999_999).is_none());
        assert_eq!(require_network(999_999).unwrap_err(), EthError::UnsupportedChain(999_999));
    }

    #[test]
    fn chain_ids_are_unique() {
        let mut ids: Vec<_> = known_networks().iter().map(|n| n.chain_id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), known_networks().len());
    }

    #[test]
    fn testnets_flagged() {
        let testnets: Vec<_> = known_networks().into_iter().filter(|n| n.is_testnet).collect();
        assert_eq!(testnets.len(), 3);
    }

    #[test]
    fn explorer_tx_link() {
        let url = SEPOLIA.explorer_tx_url(&B256::ZERO);
        assert_eq!(url, format!("https://sepolia.etherscan.io/tx/0x{}", "0".repeat(64)));
    }
}
