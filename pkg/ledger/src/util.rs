use ethereum_types::H256;
use primitives::CryptoHash;

pub fn hash_to_h256(hash: &CryptoHash) -> H256 {
    H256::from_slice(hash.inner())
}

pub fn h256_to_hash(h: H256) -> CryptoHash {
    CryptoHash::new(h.0)
}
