use crate::{hash::CryptoHash, sig::Signature};
use borsh::{BorshDeserialize, BorshSerialize};
use secp256k1::{PublicKey, SecretKey, SECP256K1};
use serde::{Deserialize, Deserializer, Serialize};
use sha3::{Digest, Keccak256};
use std::{fmt::Display, str::FromStr};

#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, BorshSerialize, BorshDeserialize,
)]
pub struct Address([u8; 20]);

impl Address {
    pub fn new(bytes: [u8; 20]) -> Self {
        Self(bytes)
    }

    /// First 4 bytes as hex, for log lines
    pub fn prefix(&self) -> String {
        hex::encode(&self.0[..4])
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_public_key(public_key: PublicKey) -> Address {
        let serialized_pubkey = public_key.serialize_uncompressed();

        // Start from the 1st byte, to strip the 0x04 prefix from the public key.
        let hashed_pubkey = Keccak256::digest(&serialized_pubkey[1..]);

        // Get the last 20 bytes from the Keccak-256 hash. These last 20 bytes are the Ethereum-style address.
        let address_bytes = &hashed_pubkey[hashed_pubkey.len() - 20..];

        let mut address = [0u8; 20];
        address.copy_from_slice(address_bytes);
        Self(address)
    }

    pub fn from_secret_key(secret_key: &SecretKey) -> Address {
        let public_key = PublicKey::from_secret_key(SECP256K1, secret_key);
        Self::from_public_key(public_key)
    }

    pub fn verify(&self, sig: &Signature, msg: &CryptoHash) -> bool {
        sig.recover(msg).as_ref() == Some(self)
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl Serialize for Address {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serde::Serialize::serialize(&self.to_string(), serializer)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = <std::string::String as serde::Deserialize>::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

impl AsRef<[u8]> for Address {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let bytes = hex::decode(s)?;
        let bytes: [u8; 20] = bytes
            .try_into()
            .map_err(|_| hex::FromHexError::InvalidStringLength)?;
        Ok(Self(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_round_trip() {
        let secret_key = SecretKey::new(&mut rand::thread_rng());
        let address = Address::from_secret_key(&secret_key);

        let parsed: Address = address.to_hex().parse().unwrap();
        assert_eq!(address, parsed);
    }

    #[test]
    fn address_is_stable_for_key() {
        let secret_key = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let a = Address::from_secret_key(&secret_key);
        let b = Address::from_secret_key(&secret_key);
        assert_eq!(a, b);
    }
}
