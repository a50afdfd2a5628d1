//! Contract interfaces used by the terminal.

use alloy::primitives::{address, keccak256, Address, B256};
use alloy::sol;

/// ENS registry, same address on mainnet and testnets.
pub const ENS_REGISTRY: Address = address!("00000000000C2E074eC69A0dFb2997BA6C7d2e1e");

sol! {
    /// Minimal ERC-20 surface.
    interface IERC20 {
        function balanceOf(address account) external view returns (uint256);
        function transfer(address to, uint256 amount) external returns (bool);
    }

    interface IEnsRegistry {
        function resolver(bytes32 node) external view returns (address);
    }

    interface IEnsResolver {
        function addr(bytes32 node) external view returns (address);
    }
}

/// ENS namehash (EIP-137).
pub fn namehash(name: &str) -> B256 {
    let mut node = B256::ZERO;
    if name.is_empty() {
        return node;
    }
    for label in name.rsplit('.') {
        let label_hash = keccak256(label.as_bytes());
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(node.as_slice());
        buf[32..].copy_from_slice(label_hash.as_slice());
        node = keccak256(buf);
    }
    node
}

/// Decode a single ABI word returned by `eth_call` as an address.
pub fn decode_address_word(data: &[u8]) -> Option<Address> {
    (data.len() >= 32).then(|| Address::from_slice(&data[12..32]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::b256;

    #[test]
    fn test_namehash_vectors() {
        assert_eq!(namehash(""), B256::ZERO);
        assert_eq!(
            namehash("eth"),
            b256!("93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae")
        );
        assert_eq!(
            namehash("foo.eth"),
            b256!("de9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f")
        );
    }

    #[test]
    fn test_decode_address_word() {
        let mut word = [0u8; 32];
        word[31] = 0x01;
        assert_eq!(decode_address_word(&word), Some(Address::with_last_byte(1)));
        assert_eq!(decode_address_word(&word[..20]), None);
    }
}
