//! Known-network table and EIP-1559 support classification.
//!
//! Named networks resolve to a chain id, a default public RPC endpoint,
//! and (where a managed provider serves them) the Infura/Alchemy host
//! fragments used by the connection resolver to build endpoint URLs.

use crate::types::Network;

/// Static description of a network the resolver knows locally.
///
/// Knowing the chain id locally lets the resolver hand out a connection
/// whose identity can be reported without a round trip to the node.
#[derive(Debug, Clone, Copy)]
pub struct KnownNetwork {
    pub name: &'static str,
    pub chain_id: u64,
    /// Default public JSON-RPC endpoint used when no explicit URL or
    /// managed-provider credentials are given.
    pub rpc_url: &'static str,
    /// Infura subdomain, when Infura serves this network.
    pub infura_host: Option<&'static str>,
    /// Alchemy subdomain, when Alchemy serves this network.
    pub alchemy_host: Option<&'static str>,
}

/// Chain id of the default public network (Ethereum mainnet).
pub const DEFAULT_CHAIN_ID: u64 = 1;

const KNOWN_NETWORKS: &[KnownNetwork] = &[
    KnownNetwork {
        name: "mainnet",
        chain_id: 1,
        rpc_url: "https://cloudflare-eth.com",
        infura_host: Some("mainnet"),
        alchemy_host: Some("eth-mainnet"),
    },
    KnownNetwork {
        name: "goerli",
        chain_id: 5,
        rpc_url: "https://rpc.ankr.com/eth_goerli",
        infura_host: Some("goerli"),
        alchemy_host: Some("eth-goerli"),
    },
    KnownNetwork {
        name: "sepolia",
        chain_id: 11_155_111,
        rpc_url: "https://rpc.sepolia.org",
        infura_host: Some("sepolia"),
        alchemy_host: Some("eth-sepolia"),
    },
    KnownNetwork {
        name: "gnosis",
        chain_id: 100,
        rpc_url: "https://rpc.gnosischain.com",
        infura_host: None,
        alchemy_host: None,
    },
    KnownNetwork {
        name: "polygon",
        chain_id: 137,
        rpc_url: "https://polygon-rpc.com",
        infura_host: Some("polygon-mainnet"),
        alchemy_host: Some("polygon-mainnet"),
    },
    KnownNetwork {
        name: "moonriver",
        chain_id: 1285,
        rpc_url: "https://rpc.api.moonriver.moonbeam.network",
        infura_host: None,
        alchemy_host: None,
    },
    KnownNetwork {
        name: "avalanche",
        chain_id: 43_114,
        rpc_url: "https://api.avax.network/ext/bc/C/rpc",
        infura_host: Some("avalanche-mainnet"),
        alchemy_host: None,
    },
    KnownNetwork {
        name: "fuji",
        chain_id: 43_113,
        rpc_url: "https://api.avax-test.network/ext/bc/C/rpc",
        infura_host: Some("avalanche-fuji"),
        alchemy_host: None,
    },
];

/// Chain ids of main networks with EIP-1559 fee markets.
const EIP1559_MAIN_CHAINS: &[u64] = &[1, 100, 137, 1285, 43_114];

/// Chain ids of test networks with EIP-1559 fee markets.
const EIP1559_TEST_CHAINS: &[u64] = &[3, 4, 5, 42, 43_113, 11_155_111];

/// Looks up a network by name. `"homestead"` is accepted as an alias for
/// mainnet, matching common provider libraries.
#[must_use]
pub fn by_name(name: &str) -> Option<&'static KnownNetwork> {
    let name = if name.eq_ignore_ascii_case("homestead") { "mainnet" } else { name };
    KNOWN_NETWORKS.iter().find(|n| n.name.eq_ignore_ascii_case(name))
}

/// Looks up a network by chain id.
#[must_use]
pub fn by_chain_id(chain_id: u64) -> Option<&'static KnownNetwork> {
    KNOWN_NETWORKS.iter().find(|n| n.chain_id == chain_id)
}

/// Returns the [`Network`] identity for a chain id, naming unrecognized
/// chains `"unknown"`.
#[must_use]
pub fn identify(chain_id: u64) -> Network {
    let name = by_chain_id(chain_id).map_or("unknown", |n| n.name);
    Network { name: name.to_string(), chain_id }
}

/// Returns whether the chain runs an EIP-1559 fee market.
#[must_use]
pub fn supports_eip1559(chain_id: u64) -> bool {
    EIP1559_MAIN_CHAINS.contains(&chain_id) || EIP1559_TEST_CHAINS.contains(&chain_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_by_name_homestead_alias() {
        let mainnet = by_name("homestead").expect("alias resolves");
        assert_eq!(mainnet.chain_id, 1);
        assert_eq!(by_name("Mainnet").map(|n| n.chain_id), Some(1));
    }

    #[test]
    fn test_by_name_unknown() {
        assert!(by_name("atlantis").is_none());
    }

    #[test]
    fn test_by_chain_id() {
        assert_eq!(by_chain_id(11_155_111).map(|n| n.name), Some("sepolia"));
        assert!(by_chain_id(999_999).is_none());
    }

    #[test]
    fn test_identify_unknown_chain() {
        let net = identify(424_242);
        assert_eq!(net.name, "unknown");
        assert_eq!(net.chain_id, 424_242);
    }

    #[test]
    fn test_supports_eip1559() {
        for chain in [1, 100, 137, 1285, 43_114, 3, 4, 5, 42, 43_113, 11_155_111] {
            assert!(supports_eip1559(chain), "chain {chain} should support EIP-1559");
        }
        assert!(!supports_eip1559(56));
        assert!(!supports_eip1559(0));
    }
}
