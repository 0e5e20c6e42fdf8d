mod address;
mod hash;
mod sig;
mod signer;
pub mod worker;

pub use address::Address;
pub use hash::CryptoHash;
pub use sig::{signed_message_digest, Signature};
pub use signer::{SecpSigner, Signer};

pub use secp256k1::SecretKey;
