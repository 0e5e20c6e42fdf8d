use ethereum_types::H256;
use primitives::CryptoHash;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown transaction: {0}")]
    UnknownTransaction(H256),

    #[error("transaction rejected: {reason}")]
    Rejected { reason: String },

    #[error("commitment log is malformed: {0}")]
    MalformedLog(String),

    #[error(
        "synced tree root {local} diverges from ledger-reported root {reported}; \
         witnesses generated from this tree would be meaningless"
    )]
    RootDivergence {
        local: CryptoHash,
        reported: CryptoHash,
    },

    #[error("accumulator error")]
    Accumulator(#[from] accumulator::Error),

    #[error("web3 error")]
    Web3(#[from] web3::Error),

    #[error("web3 contract error")]
    Web3Contract(#[from] web3::contract::Error),

    #[error("abi error")]
    Abi(#[from] web3::ethabi::Error),

    #[error("from hex error")]
    FromHex(#[from] rustc_hex::FromHexError),

    #[error("serde_json error")]
    SerdeJson(#[from] serde_json::Error),

    #[error("tokio task join error")]
    TokioJoin(#[from] tokio::task::JoinError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
