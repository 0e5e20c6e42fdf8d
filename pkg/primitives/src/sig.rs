use crate::{hash::CryptoHash, Address};
use borsh::{BorshDeserialize, BorshSerialize};
use secp256k1::{
    ecdsa::{self, RecoveryId},
    Message, PublicKey, SECP256K1,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Prefix applied to every signed digest, matching the ledger verifier's
/// personal-message convention.
const MESSAGE_PREFIX: &[u8] = b"\x19Ethereum Signed Message:\n32";

/// A 65-byte recoverable ECDSA signature: `r || s || v`.
///
/// The recovery byte `v` is accepted in either raw (0/1) or legacy (27/28)
/// form, since external signers differ on this.
#[derive(Debug, Clone, PartialEq, Eq, Hash, BorshSerialize, BorshDeserialize, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Signature(#[serde(with = "hex::serde")] pub [u8; 65]);

/// The digest that is actually signed: `keccak256(prefix || msg)`.
pub fn signed_message_digest(msg: &CryptoHash) -> CryptoHash {
    let mut hasher = Keccak256::new();
    hasher.update(MESSAGE_PREFIX);
    hasher.update(msg.inner());
    CryptoHash::new(hasher.finalize().into())
}

impl Signature {
    pub const SIZE: usize = 65;

    pub fn new(bytes: [u8; 65]) -> Self {
        Self(bytes)
    }

    pub fn inner(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn recovery_id(&self) -> Option<RecoveryId> {
        let v = self.0[64];
        let v = if v >= 27 { v - 27 } else { v };
        RecoveryId::from_i32(i32::from(v)).ok()
    }

    fn recover_key(&self, msg: &CryptoHash) -> Option<PublicKey> {
        let digest = signed_message_digest(msg);
        let msg = Message::from_digest(digest.into_inner());

        let sig =
            ecdsa::RecoverableSignature::from_compact(&self.0[0..64], self.recovery_id()?).ok()?;

        SECP256K1.recover_ecdsa(&msg, &sig).ok()
    }

    /// Recover the signer's address for `msg`, or `None` if the signature is
    /// malformed.
    pub fn recover(&self, msg: &CryptoHash) -> Option<Address> {
        Some(Address::from_public_key(self.recover_key(msg)?))
    }

    /// Recover the x coordinate of the signer's public key for `msg`.
    ///
    /// Notes carry x-only owner keys, so this is the form input ownership is
    /// checked against.
    pub fn recover_pubkey_x(&self, msg: &CryptoHash) -> Option<[u8; 32]> {
        let key = self.recover_key(msg)?;
        let compressed = key.serialize();
        let mut x = [0u8; 32];
        x.copy_from_slice(&compressed[1..33]);
        Some(x)
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 65])
    }
}
