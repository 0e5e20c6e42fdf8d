use std::time::Duration;

use crate::util::{h256_to_hash, hash_to_h256};
use crate::{
    Client, CommitmentEntry, Error, Ledger, Result, TransactionPayload,
};
use async_trait::async_trait;
use ethereum_types::{H256, U256, U64};
use primitives::CryptoHash;
use sha3::{Digest, Keccak256};
use web3::contract::tokens::Tokenize;
use web3::ethabi::Token;
use web3::signing::{Key, SecretKey, SecretKeyRef};
use web3::transports::Http;
use web3::types::{Address, BlockNumber, FilterBuilder};
use web3::contract::Contract;

/// ABI surface of the shielded pool contract, limited to what the engine
/// calls.
const POOL_ABI: &[u8] = br#"[
  {
    "name": "submitTransfer",
    "type": "function",
    "stateMutability": "nonpayable",
    "inputs": [
      {"name": "proof", "type": "bytes"},
      {"name": "publicValues", "type": "bytes"},
      {"name": "sealedOutputs", "type": "bytes[]"}
    ],
    "outputs": []
  },
  {
    "name": "currentRootHash",
    "type": "function",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [{"name": "", "type": "bytes32"}]
  },
  {
    "name": "nullifierUsed",
    "type": "function",
    "stateMutability": "view",
    "inputs": [{"name": "nullifier", "type": "bytes32"}],
    "outputs": [{"name": "", "type": "bool"}]
  },
  {
    "name": "deploymentBlock",
    "type": "function",
    "stateMutability": "view",
    "inputs": [],
    "outputs": [{"name": "", "type": "uint256"}]
  }
]"#;

/// The deployed shielded pool, driven over JSON-RPC.
#[derive(Debug, Clone)]
pub struct PoolContract {
    pub client: Client,
    pub contract: Contract<Http>,
    signer: SecretKey,
    signer_address: Address,
    /// First block the contract could have emitted events in; commitment-log
    /// replay starts here
    deployed_at: U64,
    confirm_interval: Duration,
}

impl PoolContract {
    pub async fn load(client: Client, contract_addr: &str, signer: SecretKey) -> Result<Self> {
        let contract = client.load_contract_from_abi(contract_addr, POOL_ABI)?;
        let signer_address = Key::address(&SecretKeyRef::new(&signer));

        let deployed_at: U256 = client.query(&contract, "deploymentBlock", ()).await?;

        Ok(Self {
            client,
            contract,
            signer,
            signer_address,
            deployed_at: U64::from(deployed_at.as_u64()),
            confirm_interval: Duration::from_secs(2),
        })
    }

    pub fn address(&self) -> Address {
        self.contract.address()
    }

    pub async fn call(&self, func: &str, params: impl Tokenize + Clone) -> Result<H256> {
        self.client
            .call(
                &self.contract,
                func,
                params,
                &self.signer,
                self.signer_address,
            )
            .await
    }

    #[tracing::instrument(err, ret, skip(self, tx))]
    pub async fn submit_transfer(&self, tx: &TransactionPayload) -> Result<H256> {
        let sealed_outputs = tx
            .sealed_outputs
            .iter()
            .map(|sealed| Ok(Token::Bytes(serde_json::to_vec(sealed)?)))
            .collect::<Result<Vec<Token>>>()?;

        let call_tx = self
            .call(
                "submitTransfer",
                (
                    web3::types::Bytes::from(tx.proof.clone()),
                    web3::types::Bytes::from(tx.public_values.clone()),
                    Token::Array(sealed_outputs),
                ),
            )
            .await?;

        Ok(call_tx)
    }

    #[tracing::instrument(err, ret, skip(self))]
    pub async fn root_hash(&self) -> Result<H256> {
        let root_hash = self.client.query(&self.contract, "currentRootHash", ()).await?;
        Ok(root_hash)
    }

    #[tracing::instrument(err, ret, skip(self))]
    pub async fn nullifier_used(&self, nullifier: &CryptoHash) -> Result<bool> {
        let used = self
            .client
            .query(&self.contract, "nullifierUsed", (hash_to_h256(nullifier),))
            .await?;
        Ok(used)
    }

    /// Replay every `CommitmentAdded(bytes32,uint256)` event from the
    /// deployment block to latest, in emission order.
    #[tracing::instrument(err, skip(self))]
    pub async fn commitment_events(&self) -> Result<Vec<CommitmentEntry>> {
        let topic = H256::from_slice(&Keccak256::digest(
            "CommitmentAdded(bytes32,uint256)".as_bytes(),
        ));

        let filter = FilterBuilder::default()
            .address(vec![self.contract.address()])
            .from_block(BlockNumber::Number(self.deployed_at))
            .to_block(BlockNumber::Latest)
            .topics(Some(vec![topic]), None, None, None)
            .build();

        let logs = self.client.client().eth().logs(filter).await?;

        let mut entries = Vec::with_capacity(logs.len());
        for log in logs {
            if log.data.0.len() != 64 {
                return Err(Error::MalformedLog(format!(
                    "commitment event data has {} bytes, expected 64",
                    log.data.0.len()
                )));
            }

            let mut commitment = [0u8; 32];
            commitment.copy_from_slice(&log.data.0[0..32]);
            let commitment = CryptoHash::new(commitment);
            let index = U256::from_big_endian(&log.data.0[32..64]);
            entries.push(CommitmentEntry {
                commitment,
                index: index.as_u64(),
            });
        }

        Ok(entries)
    }
}

#[async_trait]
impl Ledger for PoolContract {
    async fn current_root(&self) -> Result<CryptoHash> {
        Ok(h256_to_hash(self.root_hash().await?))
    }

    async fn commitment_log(&self) -> Result<Vec<CommitmentEntry>> {
        self.commitment_events().await
    }

    async fn is_nullifier_spent(&self, nullifier: &CryptoHash) -> Result<bool> {
        self.nullifier_used(nullifier).await
    }

    async fn submit_transaction(&self, tx: TransactionPayload) -> Result<CryptoHash> {
        let tx_hash = self.submit_transfer(&tx).await?;

        // The ledger has only accepted the transfer once it lands in a block
        self.client
            .wait_for_confirm(tx_hash, self.confirm_interval)
            .await?;

        Ok(h256_to_hash(tx_hash))
    }
}
