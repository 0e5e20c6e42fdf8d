use crate::{Error, Result};
use primitives::CryptoHash;
use serde::{Deserialize, Serialize};

/// The decoded public values of a transfer proof.
///
/// This is the wire contract between the prover and the ledger verifier: the
/// prover commits exactly these values, the verifier decodes them from the
/// raw bytes it receives. The engine treats the raw bytes as opaque and only
/// works with this decoded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicOutputs {
    pub old_root: CryptoHash,
    pub new_root: CryptoHash,
    pub nullifiers: Vec<CryptoHash>,
    pub output_commitments: Vec<CryptoHash>,
}

impl PublicOutputs {
    /// Encode to the raw byte form carried in a transaction payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(Error::SerdeJson)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let outputs = PublicOutputs {
            old_root: CryptoHash::new([1; 32]),
            new_root: CryptoHash::new([2; 32]),
            nullifiers: vec![CryptoHash::new([3; 32])],
            output_commitments: vec![CryptoHash::new([4; 32]), CryptoHash::new([5; 32])],
        };

        let decoded = PublicOutputs::decode(&outputs.encode().unwrap()).unwrap();
        assert_eq!(decoded, outputs);
    }
}
