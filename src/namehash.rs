//! Name-registry node hashing
//!
//! ENS-style namehash over a label path, used to key the compatibility
//! name records kept for legacy consumers.

use ethers::utils::keccak256;

/// Hash an ordered label path (most-specific label first) into a
/// name-registry node, rendered as lowercase hex with the `0x` prefix.
///
/// `namehash(["aggregator", "dai-eth", "data", "eth"])` is the node for
/// `aggregator.dai-eth.data.eth`.
pub fn namehash<S: AsRef<str>>(labels: &[S]) -> String {
    let mut node = [0u8; 32];
    for label in labels.iter().rev() {
        let label_hash = keccak256(label.as_ref().as_bytes());
        let mut buf = [0u8; 64];
        buf[..32].copy_from_slice(&node);
        buf[32..].copy_from_slice(&label_hash);
        node = keccak256(buf);
    }
    format!("0x{}", hex::encode(node))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namehash_empty_path_is_zero_node() {
        let labels: [&str; 0] = [];
        assert_eq!(namehash(&labels), format!("0x{}", "00".repeat(32)));
    }

    #[test]
    fn test_namehash_eth() {
        // EIP-137 published vector for "eth"
        assert_eq!(
            namehash(&["eth"]),
            "0x93cdeb708b7545dc668eb9280176169d1c33cfd8ed6f04690a0bcc88a93fc4ae"
        );
    }

    #[test]
    fn test_namehash_foo_eth() {
        // EIP-137 published vector for "foo.eth"
        assert_eq!(
            namehash(&["foo", "eth"]),
            "0xde9b09fd7c5f901e23a3f19fecc54828e9c848539801e86591bd9801b019f84f"
        );
    }

    #[test]
    fn test_namehash_depends_on_label_order() {
        assert_ne!(namehash(&["data", "eth"]), namehash(&["eth", "data"]));
    }
}
