use sha3::{Digest, Keccak256};

pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Folds leaf hashes into a binary merkle root. An odd node at any level is
/// paired with itself; an empty leaf set hashes the empty string.
pub fn merkle_root(leaves: &[[u8; 32]]) -> [u8; 32] {
    if leaves.is_empty() {
        return keccak256(b"");
    }

    let mut level = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut joined = [0u8; 64];
                joined[..32].copy_from_slice(&left);
                joined[32..].copy_from_slice(&right);
                keccak256(&joined)
            })
            .collect();
    }
    level[0]
}
