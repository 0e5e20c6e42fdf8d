use crate::{hash::CryptoHash, sig::signed_message_digest, Address, Signature};
use secp256k1::{Message, PublicKey, SecretKey, SECP256K1};
use std::str::FromStr;

/// Signing capability for a wallet.
///
/// Key custody itself is external; the engine only requires the ability to
/// produce recoverable signatures over 32-byte digests.
pub trait Signer: Send + Sync {
    fn address(&self) -> Address;

    /// The x coordinate of the public key, as embedded in notes.
    fn public_key_x(&self) -> [u8; 32];

    fn sign(&self, msg: &CryptoHash) -> Signature;
}

/// In-process secp256k1 signer.
#[derive(Debug, Clone)]
pub struct SecpSigner {
    secret_key: SecretKey,
    public_key: PublicKey,
    address: Address,
}

impl SecpSigner {
    pub fn new(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(SECP256K1, &secret_key);
        Self {
            address: Address::from_public_key(public_key),
            secret_key,
            public_key,
        }
    }

    pub fn random() -> Self {
        Self::new(SecretKey::new(&mut rand::thread_rng()))
    }

    pub fn from_hex(secret_key: &str) -> Result<Self, secp256k1::Error> {
        let secret_key = secret_key.strip_prefix("0x").unwrap_or(secret_key);
        Ok(Self::new(SecretKey::from_str(secret_key)?))
    }

    pub fn secret_key(&self) -> SecretKey {
        self.secret_key
    }
}

impl Signer for SecpSigner {
    fn address(&self) -> Address {
        self.address
    }

    fn public_key_x(&self) -> [u8; 32] {
        let compressed = self.public_key.serialize();
        let mut x = [0u8; 32];
        x.copy_from_slice(&compressed[1..33]);
        x
    }

    fn sign(&self, msg: &CryptoHash) -> Signature {
        let digest = signed_message_digest(msg);
        let message = Message::from_digest(digest.into_inner());

        let signature = SECP256K1.sign_ecdsa_recoverable(&message, &self.secret_key);
        let (recovery_id, compact) = signature.serialize_compact();

        let mut bytes = [0u8; 65];
        bytes[0..64].copy_from_slice(&compact);
        bytes[64] = recovery_id.to_i32() as u8;
        Signature(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_is_deterministic() {
        let signer = SecpSigner::new(SecretKey::from_slice(&[0x42; 32]).unwrap());
        let msg = CryptoHash::new([5u8; 32]);

        // RFC 6979 nonces make the signature (and so the nullifier derived
        // from it) stable across calls
        assert_eq!(signer.sign(&msg), signer.sign(&msg));
    }

    #[test]
    fn from_hex_accepts_0x_prefix() {
        let hex = format!("0x{}", "11".repeat(32));
        let signer = SecpSigner::from_hex(&hex).unwrap();
        assert_eq!(signer.address(), SecpSigner::from_hex(&"11".repeat(32)).unwrap().address());
    }
}
